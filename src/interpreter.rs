//! Tree‑walking evaluator.
//!
//! The interpreter owns one persistent global environment, a swappable
//! current environment (saved and restored around every block and call
//! body), and the resolver's `ExprId → depth` side‑table.  Bindings with a
//! recorded depth use the exact‑hop environment path; everything else falls
//! back to the globals.
//!
//! `return` is *not* an error: it is the second arm of [`InterpretError`],
//! a checked unwind signal that every caller propagates until the nearest
//! function‑call boundary consumes it.  Exactly one such signal can be in
//! flight at a time and it never leaks past the call that catches it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};
use thiserror::Error;

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::parser::{Expr, ExprId, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Outcome channel of statement execution: ordinary completion (`Ok`), a
/// runtime failure, or an early `return` in flight toward its call boundary.
#[derive(Debug, Error)]
pub enum InterpretError<'a> {
    #[error(transparent)]
    Runtime(#[from] LoxError),

    #[error("return signal carrying {0}")]
    ReturnSignal(Value<'a>),
}

/// Convenient alias for interpreter results.
pub type IResult<'a, T> = std::result::Result<T, InterpretError<'a>>;

pub struct Interpreter<'a> {
    /// Fixed for the interpreter's lifetime; the fallback for unresolved
    /// names.
    globals: Rc<RefCell<Environment<'a>>>,

    /// The innermost frame of the currently executing scope chain.
    environment: Rc<RefCell<Environment<'a>>>,

    /// Resolver‑computed lexical distances, keyed by node identity.
    locals: HashMap<ExprId, usize>,

    /// Where `print` writes.  Stdout normally, a buffer in tests.
    output: Box<dyn Write>,
}

impl<'a> Default for Interpreter<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Interpreter<'a> {
    /// Creates a new Interpreter and defines native functions such as `clock`.
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Same as [`Interpreter::new`] but with a caller‑supplied output sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args| {
                    let seconds: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;
                    Ok(Value::Number(seconds))
                },
            },
        );

        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Merge a resolver side‑table into this interpreter.  Ids are unique per
    /// parsed unit, so successive REPL lines only ever add entries.
    pub fn note_locals(&mut self, locals: HashMap<ExprId, usize>) {
        debug!("Absorbing {} resolved binding(s)", locals.len());

        self.locals.extend(locals);
    }

    /// Interprets a list of statements (a "program").  A runtime error
    /// abandons the remaining statements of this call but leaves the
    /// interpreter usable for the next one (REPL semantics).
    pub fn interpret(&mut self, statements: &[Stmt<'a>]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(InterpretError::Runtime(e)) => return Err(e),

                // The resolver rejects top-level 'return'; reaching this arm
                // means a caller skipped resolution.
                Err(InterpretError::ReturnSignal(_)) => {
                    return Err(LoxError::runtime(
                        0,
                        "Internal error: 'return' escaped the top level",
                    ));
                }
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Evaluate a single expression to a value (used by the round‑trip
    /// self‑check and debug tooling).
    pub fn evaluate_expression(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match self.evaluate(expr) {
            Ok(value) => Ok(value),
            Err(InterpretError::Runtime(e)) => Err(e),
            Err(InterpretError::ReturnSignal(_)) => Err(LoxError::runtime(
                0,
                "Internal error: 'return' escaped the top level",
            )),
        }
    }

    // ─────────────────────────── statements ───────────────────────────

    fn execute(&mut self, stmt: &Stmt<'a>) -> IResult<'a, ()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)
                    .map_err(|e| InterpretError::Runtime(LoxError::Io(e)))?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Variable '{}' defined", name.lexeme);

                self.environment.borrow_mut().define(name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let child = Environment::with_enclosing(self.environment.clone());
                self.execute_block(statements, Rc::new(RefCell::new(child)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.evaluate(condition)?;

                if is_truthy(&cond) {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While { condition, body } => {
                loop {
                    let cond = self.evaluate(condition)?;

                    if !is_truthy(&cond) {
                        break;
                    }

                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);

                // capture the environment active *now* as the closure
                let function =
                    LoxFunction::new(decl.clone(), self.environment.clone(), false);

                self.environment
                    .borrow_mut()
                    .define(decl.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Return in flight: {}", value);

                Err(InterpretError::ReturnSignal(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),

            // Stripped by the import splicer before execution.
            Stmt::Import(_) => Ok(()),
        }
    }

    /// Run `statements` inside `environment`, restoring the previous frame on
    /// **every** exit path — normal completion, early return, or error.
    fn execute_block(
        &mut self,
        statements: &[Stmt<'a>],
        environment: Rc<RefCell<Environment<'a>>>,
    ) -> IResult<'a, ()> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result: IResult<'a, ()> = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &'a Token<'a>,
        superclass: Option<&Expr<'a>>,
        methods: &[Rc<crate::parser::FunctionDecl<'a>>],
    ) -> IResult<'a, ()> {
        let superclass_value: Option<Rc<LoxClass<'a>>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    let line = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class").into());
                }
            },

            None => None,
        };

        // placeholder so method bodies that name the class resolve to the
        // finished value once it is assigned below
        self.environment.borrow_mut().define(name.lexeme, Value::Nil);

        // methods close over a synthetic frame binding 'super' when there is
        // a superclass, matching the resolver's depth bookkeeping
        let method_closure = match &superclass_value {
            Some(sc) => {
                let mut frame = Environment::with_enclosing(self.environment.clone());
                frame.define("super", Value::Class(sc.clone()));
                Rc::new(RefCell::new(frame))
            }

            None => self.environment.clone(),
        };

        let mut table: HashMap<&'a str, Rc<LoxFunction<'a>>> = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == "init";

            table.insert(
                method.name.lexeme,
                Rc::new(LoxFunction::new(
                    method.clone(),
                    method_closure.clone(),
                    is_initializer,
                )),
            );
        }

        let class = LoxClass::new(name.lexeme, superclass_value, table);

        debug!("Class '{}' declared", name.lexeme);

        self.environment
            .borrow_mut()
            .assign(name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    // ─────────────────────────── expressions ──────────────────────────

    fn evaluate(&mut self, expr: &Expr<'a>) -> IResult<'a, Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    Environment::assign_at(
                        &self.environment,
                        distance,
                        name.lexeme,
                        value.clone(),
                        name.line,
                    )?;
                } else {
                    self.globals
                        .borrow_mut()
                        .assign(name.lexeme, value.clone(), name.line)?;
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut args: Vec<Value<'a>> = Vec::with_capacity(arguments.len());

                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(callee_val, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),

                _ => Err(LoxError::runtime(name.line, "Only instances have properties").into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value = self.evaluate(value)?;
                    instance.set(name.lexeme, value.clone());
                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields").into()),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(
        &mut self,
        operator: &'a Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let right_val = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&right_val))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator").into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'a>,
        operator: &'a Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        let numbers = |l: &Value<'a>, r: &Value<'a>| -> IResult<'a, (f64, f64)> {
            match (l, r) {
                (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

                _ => Err(LoxError::runtime(operator.line, "Operands must be numbers").into()),
            }
        };

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            // ordinary IEEE division: x / 0 is ±inf (or NaN), not an error
            TokenType::SLASH => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = numbers(&left_val, &right_val)?;
                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator").into()),
        }
    }

    /// `and` / `or` short‑circuit and yield one of the *operand values*, not
    /// a coerced boolean.
    fn evaluate_logical(
        &mut self,
        left: &Expr<'a>,
        operator: &'a Token<'a>,
        right: &Expr<'a>,
    ) -> IResult<'a, Value<'a>> {
        let left_val = self.evaluate(left)?;

        match operator.token_type {
            TokenType::OR => {
                if is_truthy(&left_val) {
                    return Ok(left_val);
                }
            }

            _ => {
                if !is_truthy(&left_val) {
                    return Ok(left_val);
                }
            }
        }

        self.evaluate(right)
    }

    fn look_up_variable(&mut self, id: ExprId, name: &'a Token<'a>) -> IResult<'a, Value<'a>> {
        if let Some(&distance) = self.locals.get(&id) {
            Ok(Environment::get_at(
                &self.environment,
                distance,
                name.lexeme,
                name.line,
            )?)
        } else {
            Ok(self.globals.borrow().get(name.lexeme, name.line)?)
        }
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    ) -> IResult<'a, Value<'a>> {
        let distance = *self.locals.get(&id).ok_or_else(|| {
            LoxError::runtime(keyword.line, "Internal error: unresolved 'super' expression")
        })?;

        let superclass = Environment::get_at(&self.environment, distance, "super", keyword.line)?;

        // 'this' lives one frame closer than the synthetic 'super' frame
        let instance = Environment::get_at(&self.environment, distance - 1, "this", keyword.line)?;

        let (Value::Class(superclass), Value::Instance(instance)) = (superclass, instance) else {
            return Err(LoxError::runtime(
                keyword.line,
                "Internal error: malformed 'super' bindings",
            )
            .into());
        };

        // lookup starts at the superclass: the current class's own override
        // is never considered
        let found = superclass.find_method(method.lexeme).ok_or_else(|| {
            LoxError::runtime(
                method.line,
                format!("Undefined property '{}'", method.lexeme),
            )
        })?;

        Ok(Value::Function(Rc::new(found.bind(instance))))
    }

    // ───────────────────────────── calls ──────────────────────────────

    /// Uniform calling convention for the three callable forms; everything
    /// else is a runtime error.
    fn call_value(
        &mut self,
        callee: Value<'a>,
        paren: &'a Token<'a>,
        args: Vec<Value<'a>>,
    ) -> IResult<'a, Value<'a>> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                debug!("Calling native function '{}'", name);

                self.check_arity(arity, args.len(), paren)?;

                func(&args).map_err(|msg| LoxError::runtime(paren.line, msg).into())
            }

            Value::Function(function) => {
                debug!("Calling function '{}'", function.name());

                self.check_arity(function.arity(), args.len(), paren)?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                debug!("Instantiating class '{}'", class.name);

                self.check_arity(class.arity(), args.len(), paren)?;

                self.instantiate(class, args)
            }

            _ => Err(LoxError::runtime(paren.line, "Can only call functions and classes").into()),
        }
    }

    fn check_arity(&self, expected: usize, got: usize, paren: &Token<'_>) -> IResult<'a, ()> {
        if expected == got {
            Ok(())
        } else {
            Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}", expected, got),
            )
            .into())
        }
    }

    /// Invoke a user function: fresh frame over its closure, parameters bound
    /// positionally, body executed as a block.  Yields nil if no `return`
    /// fired.  An initializer always yields its receiver, taken from the
    /// `this` slot of its own closure, no matter what was returned.
    fn call_function(
        &mut self,
        function: &LoxFunction<'a>,
        args: Vec<Value<'a>>,
    ) -> IResult<'a, Value<'a>> {
        let mut frame = Environment::with_enclosing(function.closure.clone());

        for (param, arg) in function.declaration.params.iter().zip(args) {
            frame.define(param.lexeme, arg);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(frame)));

        let line = function.declaration.name.line;

        match result {
            Ok(()) => {
                if function.is_initializer {
                    Ok(Environment::get_at(&function.closure, 0, "this", line)?)
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(InterpretError::ReturnSignal(value)) => {
                if function.is_initializer {
                    Ok(Environment::get_at(&function.closure, 0, "this", line)?)
                } else {
                    Ok(value)
                }
            }

            Err(e) => Err(e),
        }
    }

    /// Calling a class produces a new instance; a present `init` method is
    /// bound to it and run, its return value discarded.
    fn instantiate(
        &mut self,
        class: Rc<LoxClass<'a>>,
        args: Vec<Value<'a>>,
    ) -> IResult<'a, Value<'a>> {
        let instance = Rc::new(LoxInstance::new(class.clone()));

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(instance.clone());
            self.call_function(&bound, args)?;
        }

        Ok(Value::Instance(instance))
    }
}

// ───────────────────────── value predicates ─────────────────────────

/// `nil` and `false` are falsy; every other value (including `0` and the
/// empty string) is truthy.
fn is_truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Nil => false,
        Value::Bool(b) => *b,
        _ => true,
    }
}

/// Equality is kind‑first: different kinds are never equal, instances and
/// callables compare by identity, everything else structurally.
fn is_equal<'a>(left: &Value<'a>, right: &Value<'a>) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,

        (Value::Bool(a), Value::Bool(b)) => a == b,

        (Value::Number(a), Value::Number(b)) => a == b,

        (Value::String(a), Value::String(b)) => a == b,

        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

        (
            Value::NativeFunction { name: a, .. },
            Value::NativeFunction { name: b, .. },
        ) => a == b,

        _ => false,
    }
}
