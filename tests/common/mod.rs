//! Shared pipeline harness for the integration tests: source in, printed
//! output (or the collected errors) out.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use treelox::error::LoxError;
use treelox::interpreter::Interpreter;
use treelox::parser::Parser;
use treelox::resolver::Resolver;
use treelox::scanner::Scanner;
use treelox::token::Token;

/// An output sink the test can keep reading while the interpreter owns a
/// clone of it.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
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

/// Run `source` through the full scan → parse → resolve → interpret pipeline
/// and return everything it printed.
pub fn run(source: &str) -> Result<String, Vec<LoxError>> {
    let tokens: Vec<Token<'_>> = Scanner::new(source.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| vec![e])?;

    let mut parser = Parser::new(&tokens);
    let statements = parser.parse()?;

    let locals = Resolver::new().resolve(&statements)?;

    let buf = SharedBuf::default();
    let mut interpreter = Interpreter::with_output(Box::new(buf.clone()));
    interpreter.note_locals(locals);

    interpreter.interpret(&statements).map_err(|e| vec![e])?;

    Ok(buf.contents())
}

/// Convenience wrapper asserting the program runs cleanly.
#[allow(dead_code)]
pub fn run_ok(source: &str) -> String {
    match run(source) {
        Ok(output) => output,
        Err(errors) => panic!("program failed: {:?}", errors),
    }
}

/// Convenience wrapper asserting the program fails, returning the first
/// error's rendered form.
#[allow(dead_code)]
pub fn run_err(source: &str) -> String {
    match run(source) {
        Ok(output) => panic!("program unexpectedly succeeded with output {:?}", output),
        Err(errors) => errors[0].to_string(),
    }
}
