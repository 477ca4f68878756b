//! Static resolver pass.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<&str,bool>` tracking
//!    declared/defined).
//! 2. Report static errors (redeclaration, forward‑read in initializer,
//!    invalid `return`/`this`/`super` placement, self‑inheritance).
//! 3. Record, for *each* binding occurrence, the lexical distance from its
//!    use to its declaring scope, keyed by the node's [`ExprId`].
//!
//! Errors are batched: the walk always finishes the whole tree, so one bad
//! declaration never hides later diagnostics. Names found in no scope are
//! deliberately left out of the side‑table — the interpreter falls back to a
//! global lookup for those at execution time.

use crate::error::LoxError;
use crate::parser::{Expr, ExprId, FunctionDecl, Stmt};
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of function body are we inside?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we inside a class body (and does it have a superclass)?  Used to
/// validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances into an explicit side‑table handed to the interpreter.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>, // false=declared, true=defined
    locals: HashMap<ExprId, usize>,
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Default for Resolver<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements.  Returns the `ExprId → depth`
    /// side‑table when the program is statically sound, otherwise every
    /// recorded resolution error.
    pub fn resolve(
        mut self,
        statements: &[Stmt<'a>],
    ) -> Result<HashMap<ExprId, usize>, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if self.errors.is_empty() {
            Ok(self.locals)
        } else {
            Err(self.errors)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so a variable can
                // never read itself while being initialized
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);
            }

            Stmt::Function(decl) => {
                // the name is visible *inside* its own body (recursion)
                self.declare(decl.name);
                self.define(decl.name);

                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors
                        .push(LoxError::resolve(keyword, "Can't return from top-level code"));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(LoxError::resolve(
                            keyword,
                            "Can't return a value from an initializer",
                        ));
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                self.resolve_class(name, superclass.as_ref(), methods);
            }

            // Stripped by the import splicer before this pass; inert if a
            // caller skipped splicing.
            Stmt::Import(_) => {}
        }
    }

    fn resolve_class(
        &mut self,
        name: &'a Token<'a>,
        superclass: Option<&Expr<'a>>,
        methods: &[std::rc::Rc<FunctionDecl<'a>>],
    ) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(sc) = superclass {
            if let Expr::Variable { name: sc_name, .. } = sc {
                if sc_name.lexeme == name.lexeme {
                    self.errors
                        .push(LoxError::resolve(sc_name, "A class can't inherit from itself"));
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(sc);

            // synthetic scope binding 'super' around every method body
            self.begin_scope();
            self.scope_insert("super");
        }

        // synthetic scope binding 'this'
        self.begin_scope();
        self.scope_insert("this");

        for method in methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, declaration);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                // Cannot read in own initializer
                if let Some(scope) = self.scopes.last() {
                    if scope.get(name.lexeme) == Some(&false) {
                        self.errors.push(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer",
                        ));
                    }
                }

                self.resolve_local(*id, name.lexeme);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name.lexeme);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.errors
                        .push(LoxError::resolve(keyword, "Can't use 'this' outside of a class"));
                    return;
                }

                self.resolve_local(*id, keyword.lexeme);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.errors.push(LoxError::resolve(
                            keyword,
                            "Can't use 'super' outside of a class",
                        ));
                        return;
                    }

                    ClassType::Class => {
                        self.errors.push(LoxError::resolve(
                            keyword,
                            "Can't use 'super' in a class with no superclass",
                        ));
                        return;
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword.lexeme);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, decl: &FunctionDecl<'a>, ftype: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = ftype;

        self.begin_scope();

        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }

        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Insert a synthetic, always‑defined binding into the innermost scope.
    fn scope_insert(&mut self, name: &'a str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, true);
        }
    }

    /// Mark `name` as present‑but‑uninitialized in the innermost scope.
    /// Re‑declaring a name in the same *block* scope is an error; the global
    /// scope (empty stack) stays permissive.
    fn declare(&mut self, name: &'a Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(name.lexeme) {
                self.errors.push(LoxError::resolve(
                    name,
                    "Already a variable with this name in this scope",
                ));
            }

            scope.insert(name.lexeme, false);
        }
    }

    fn define(&mut self, name: &'a Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme, true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at its depth, or leave it for the
    /// interpreter's global fallback when no scope declares it.
    fn resolve_local(&mut self, id: ExprId, name: &str) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name) {
                debug!("Resolved '{}' at depth {}", name, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
    }
}
