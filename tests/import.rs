use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use treelox::import::resolve_imports;
use treelox::interpreter::Interpreter;
use treelox::parser::Parser;
use treelox::resolver::Resolver;
use treelox::scanner::Scanner;
use treelox::token::Token;

#[derive(Clone, Default)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("interpreter wrote invalid UTF-8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A throwaway directory for the import fixtures of one test.
struct Fixture {
    dir: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("treelox-import-{}-{}", name, std::process::id()));

        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("failed to create fixture directory");

        Self { dir }
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.dir.join(name), contents).expect("failed to write fixture file");
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

/// Run `source` as if it were a file living inside `fixture`, imports and all.
fn run_in(fixture: &Fixture, source: &str) -> Result<String, Vec<treelox::error::LoxError>> {
    let tokens: Vec<Token<'_>> = Scanner::new(source.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| vec![e])?;

    let mut parser = Parser::new(&tokens);
    let mut statements = parser.parse()?;

    resolve_imports(&mut statements, &fixture.dir, parser.next_free_id())?;

    let locals = Resolver::new().resolve(&statements)?;

    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    interpreter.note_locals(locals);

    interpreter.interpret(&statements).map_err(|e| vec![e])?;

    Ok(buf.contents())
}

#[test]
fn imported_declarations_precede_the_importing_file() {
    let fixture = Fixture::new("basic");
    fixture.write("helper.lox", "var imported = 42;\n");

    let output = run_in(&fixture, "import \"helper.lox\";\nprint imported;")
        .expect("import failed");

    assert_eq!(output, "42\n");
}

#[test]
fn imports_splice_in_declaration_order() {
    let fixture = Fixture::new("order");
    fixture.write("one.lox", "print \"one\";\n");
    fixture.write("two.lox", "print \"two\";\n");

    let output = run_in(
        &fixture,
        "import \"one.lox\";\nimport \"two.lox\";\nprint \"main\";",
    )
    .expect("import failed");

    assert_eq!(output, "one\ntwo\nmain\n");
}

#[test]
fn transitive_imports_come_first() {
    let fixture = Fixture::new("transitive");
    fixture.write("base.lox", "var base = \"base\";\n");
    fixture.write(
        "middle.lox",
        "import \"base.lox\";\nvar middle = base + \"+middle\";\n",
    );

    let output = run_in(&fixture, "import \"middle.lox\";\nprint middle;")
        .expect("import failed");

    assert_eq!(output, "base+middle\n");
}

#[test]
fn repeated_imports_are_deduplicated() {
    let fixture = Fixture::new("dedup");
    fixture.write("once.lox", "print \"loaded\";\n");

    let output = run_in(
        &fixture,
        "import \"once.lox\";\nimport \"once.lox\";\nprint \"main\";",
    )
    .expect("import failed");

    assert_eq!(output, "loaded\nmain\n");
}

#[test]
fn import_cycles_collapse_to_a_no_op() {
    let fixture = Fixture::new("cycle");
    fixture.write("a.lox", "import \"b.lox\";\nvar a = 1;\n");
    fixture.write("b.lox", "import \"a.lox\";\nvar b = 2;\n");

    // entering through a file that imports into the cycle must terminate
    let output = run_in(&fixture, "import \"a.lox\";\nprint a + b;")
        .expect("cyclic import failed");

    assert_eq!(output, "3\n");
}

#[test]
fn import_below_other_statements_is_rejected() {
    let fixture = Fixture::new("misplaced");
    fixture.write("late.lox", "var x = 1;\n");

    let errors = run_in(&fixture, "print 1;\nimport \"late.lox\";")
        .expect_err("misplaced import must fail");

    assert!(errors[0]
        .to_string()
        .contains("Import must occur at the top of the file"));
}

#[test]
fn unreadable_imports_are_reported() {
    let fixture = Fixture::new("missing");

    let errors = run_in(&fixture, "import \"missing.lox\";")
        .expect_err("missing import must fail");

    assert!(
        errors[0]
            .to_string()
            .contains("Unable to import 'missing.lox'"),
        "got: {}",
        errors[0]
    );
}

#[test]
fn import_statements_are_stripped_before_execution() {
    let fixture = Fixture::new("stripped");
    fixture.write("lib.lox", "var marker = true;\n");

    let tokens: Vec<Token<'_>> = Scanner::new(b"import \"lib.lox\";\nprint marker;" as &[u8])
        .collect::<Result<_, _>>()
        .expect("failed to scan");

    let mut parser = Parser::new(&tokens);
    let mut statements = parser.parse().expect("failed to parse");

    resolve_imports(&mut statements, &fixture.dir, parser.next_free_id())
        .expect("failed to splice");

    assert!(
        !statements
            .iter()
            .any(|s| matches!(s, treelox::parser::Stmt::Import(_))),
        "import statements must not survive splicing"
    );
}
