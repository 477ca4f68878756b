use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use treelox as lox;

use lox::ast_printer::AstPrinter;
use lox::error::LoxError;
use lox::import;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Emit the token stream as JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints it back
    Parse { filename: PathBuf },

    /// Runs a script, or starts the REPL when no file is given
    Run { filename: Option<PathBuf> },
}

/// Memory‑map a script.  Zero‑length files cannot be mapped, so they fall
/// back to an empty slice.
fn map_file(path: &Path) -> Result<Option<Mmap>> {
    let file = File::open(path).context(format!("Failed to open file {:?}", path))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", path))?
        .len();

    if len == 0 {
        return Ok(None);
    }

    let mmap =
        unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", path))?;

    info!("Mapped {} bytes from {:?}", len, path);

    Ok(Some(mmap))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'treelox::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("treelox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Scan the whole buffer, reporting lexical errors as they stream out.
/// Returns the tokens that did scan plus whether anything failed.
fn scan_all<'a>(src: &'a [u8]) -> (Vec<Token<'a>>, bool) {
    let mut tokens: Vec<Token<'a>> = Vec::new();
    let mut had_error = false;

    for item in Scanner::new(src) {
        match item {
            Ok(token) => tokens.push(token),

            Err(e) => {
                debug!("Lex error: {}", e);
                eprintln!("{}", e);
                had_error = true;
            }
        }
    }

    (tokens, had_error)
}

fn report_all(errors: &[LoxError]) {
    for e in errors {
        eprintln!("{}", e);
    }
}

fn run_file(path: PathBuf) -> Result<()> {
    info!("Running file {:?}", path);

    let mapped = map_file(&path)?;
    let src: &[u8] = mapped.as_deref().unwrap_or(&[]);

    let (tokens, mut had_error) = scan_all(src);

    let mut parser = Parser::new(&tokens);

    let mut statements = match parser.parse() {
        Ok(statements) => statements,
        Err(errors) => {
            report_all(&errors);
            process::exit(65);
        }
    };

    let cwd: &Path = path.parent().unwrap_or(Path::new("."));

    if let Err(errors) = import::resolve_imports(&mut statements, cwd, parser.next_free_id()) {
        report_all(&errors);
        had_error = true;
    }

    if had_error {
        process::exit(65);
    }

    let locals = match Resolver::new().resolve(&statements) {
        Ok(locals) => locals,
        Err(errors) => {
            report_all(&errors);
            process::exit(65);
        }
    };

    let mut interpreter = Interpreter::new();
    interpreter.note_locals(locals);

    if let Err(e) = interpreter.interpret(&statements) {
        debug!("Runtime error: {}", e);
        eprintln!("{}", e);
        process::exit(70);
    }

    Ok(())
}

/// Interactive prompt sharing one interpreter across lines: globals, the
/// resolver side‑table, and the id watermark survive; error state resets per
/// line.  Each line (and its token buffer) is leaked so closures defined at
/// the prompt stay valid for the rest of the session.
fn run_repl() -> Result<()> {
    info!("Starting REPL");

    let cwd: PathBuf = std::env::current_dir().context("Failed to read current directory")?;

    let mut interpreter: Interpreter<'static> = Interpreter::new();
    let mut next_id: u32 = 0;

    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();

        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let src: &'static str = Box::leak(line.into_boxed_str());

        let (tokens, had_lex_error) = scan_all(src.as_bytes());
        let tokens: &'static [Token<'static>] = Vec::leak(tokens);

        let mut parser = Parser::with_first_id(tokens, next_id);

        let mut statements = match parser.parse() {
            Ok(statements) => statements,
            Err(errors) => {
                report_all(&errors);
                continue;
            }
        };

        next_id = parser.next_free_id();

        match import::resolve_imports(&mut statements, &cwd, next_id) {
            Ok(id) => next_id = id,
            Err(errors) => {
                report_all(&errors);
                continue;
            }
        }

        if had_lex_error {
            continue;
        }

        match Resolver::new().resolve(&statements) {
            Ok(locals) => interpreter.note_locals(locals),
            Err(errors) => {
                report_all(&errors);
                continue;
            }
        }

        if let Err(e) = interpreter.interpret(&statements) {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

fn tokenize_file(path: PathBuf, json: bool) -> Result<()> {
    info!("Tokenizing {:?}", path);

    let mapped = map_file(&path)?;
    let src: &[u8] = mapped.as_deref().unwrap_or(&[]);

    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut had_error = false;

    for item in Scanner::new(src) {
        match item {
            Ok(token) => {
                if !json {
                    println!("{}", token);
                }

                tokens.push(token);
            }

            Err(e) => {
                eprintln!("{}", e);
                had_error = true;
            }
        }
    }

    if json {
        let dump = serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", dump);
    }

    if had_error {
        debug!("Tokenization failed, exiting with code 65");
        process::exit(65);
    }

    Ok(())
}

fn parse_file(path: PathBuf) -> Result<()> {
    info!("Parsing {:?}", path);

    let mapped = map_file(&path)?;
    let src: &[u8] = mapped.as_deref().unwrap_or(&[]);

    let (tokens, had_error) = scan_all(src);

    if had_error {
        process::exit(65);
    }

    let mut parser = Parser::new(&tokens);

    match parser.parse_expression() {
        Ok(expr) => {
            println!("{}", AstPrinter::print(&expr));
        }

        Err(errors) => {
            report_all(&errors);
            process::exit(65);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize_file(filename, json),

        Commands::Parse { filename } => parse_file(filename),

        Commands::Run { filename } => match filename {
            Some(filename) => run_file(filename),
            None => run_repl(),
        },
    }
}
