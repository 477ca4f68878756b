//! Source‑file import splicing.
//!
//! `import "path";` statements pull another file's declarations into the
//! current program. They must sit contiguously at the top of a file; each
//! imported file is read relative to its importer's directory, lexed and
//! parsed on the spot, recursively spliced the same way, and its statements
//! inserted *before* the importing file's own. Files are deduplicated by
//! canonical path, which also collapses import cycles into no‑ops. All
//! import statements are stripped before resolution and interpretation.
//!
//! Imported buffers are leaked (`Box::leak`) so their ASTs can be spliced
//! into — and outlive — the importing unit. Imports are a load‑time
//! construct; the handful of files a program pulls in live for the whole
//! session anyway.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::LoxError;
use crate::parser::{Parser, Stmt};
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};

/// Splice every import reachable from `statements` (in place), then strip
/// the import statements themselves. `cwd` is the directory relative paths
/// resolve against; `first_id` seeds the [`crate::parser::ExprId`] range for
/// imported units. Returns the next free id on success, otherwise every
/// error found along the way.
pub fn resolve_imports<'a>(
    statements: &mut Vec<Stmt<'a>>,
    cwd: &Path,
    first_id: u32,
) -> Result<u32, Vec<LoxError>> {
    let mut splicer = Splicer {
        resolved: HashSet::new(),
        next_id: first_id,
        errors: Vec::new(),
    };

    let unit: Vec<Stmt<'a>> = statements.clone();
    splicer.splice_level(statements, &unit, cwd);

    statements.retain(|stmt| !matches!(stmt, Stmt::Import(_)));

    if splicer.errors.is_empty() {
        Ok(splicer.next_id)
    } else {
        Err(splicer.errors)
    }
}

struct Splicer {
    /// Canonical paths already spliced; re‑imports are no‑ops.
    resolved: HashSet<PathBuf>,
    next_id: u32,
    errors: Vec<LoxError>,
}

impl Splicer {
    /// Handle the import prefix of one parsed unit, inserting everything it
    /// pulls in at the *front* of `dest`.
    fn splice_level<'a>(&mut self, dest: &mut Vec<Stmt<'a>>, unit: &[Stmt<'a>], cwd: &Path) {
        let leading: usize = unit
            .iter()
            .take_while(|stmt| matches!(stmt, Stmt::Import(_)))
            .count();

        // an import below any other statement is malformed
        if let Some(stray) = unit[leading..]
            .iter()
            .find_map(|stmt| match stmt {
                Stmt::Import(filename) => Some(*filename),
                _ => None,
            })
        {
            self.errors.push(LoxError::parse(
                stray,
                "Import must occur at the top of the file",
            ));
            return;
        }

        // reversed so the first import's statements end up first in dest
        for stmt in unit[..leading].iter().rev() {
            if let Stmt::Import(filename) = stmt {
                self.splice_one(dest, filename, cwd);
            }
        }
    }

    fn splice_one<'a>(&mut self, dest: &mut Vec<Stmt<'a>>, filename: &Token<'_>, cwd: &Path) {
        let TokenType::STRING(ref name) = filename.token_type else {
            self.errors
                .push(LoxError::parse(filename, "Import must be followed by a string"));
            return;
        };

        let path: PathBuf = cwd.join(name);

        let canonical: PathBuf = match fs::canonicalize(&path) {
            Ok(p) => p,
            Err(_) => {
                self.errors.push(LoxError::parse(
                    filename,
                    format!("Unable to import '{}'", name),
                ));
                return;
            }
        };

        if !self.resolved.insert(canonical.clone()) {
            debug!("Skipping already-imported {:?}", canonical);
            return; // already spliced (or currently being spliced: cycle)
        }

        info!("Importing {:?}", canonical);

        let buf: Vec<u8> = match fs::read(&canonical) {
            Ok(b) => b,
            Err(_) => {
                self.errors.push(LoxError::parse(
                    filename,
                    format!("Unable to import '{}'", name),
                ));
                return;
            }
        };

        let src: &'static [u8] = Box::leak(buf.into_boxed_slice());

        let mut tokens: Vec<Token<'static>> = Vec::new();
        let mut had_lex_error = false;

        for item in Scanner::new(src) {
            match item {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    self.errors.push(e);
                    had_lex_error = true;
                }
            }
        }

        if had_lex_error {
            return;
        }

        let tokens: &'static [Token<'static>] = Vec::leak(tokens);

        let mut parser = Parser::with_first_id(tokens, self.next_id);

        // leaked buffers make the imported AST 'static, which coerces into
        // the importing unit's lifetime
        let imported: Vec<Stmt<'a>> = match parser.parse() {
            Ok(stmts) => stmts,
            Err(errors) => {
                self.errors.extend(errors);
                return;
            }
        };

        self.next_id = parser.next_free_id();

        // the imported unit lands in front of everything spliced so far;
        // its own imports then land in front of it
        dest.splice(0..0, imported.iter().cloned());

        let parent: &Path = canonical.parent().unwrap_or(cwd);
        self.splice_level(dest, &imported, parent);
    }
}
