//! Runtime scope chain.
//!
//! Each frame maps names to values and optionally links to an enclosing
//! frame. Frames are shared (`Rc<RefCell<…>>`) because closures keep their
//! defining chain alive after the declaring block has exited, and because two
//! closures created in the same block intentionally see each other's
//! mutations of that block's frame.
//!
//! `get`/`assign` walk the chain dynamically and are the global‑fallback
//! path; `get_at`/`assign_at` hop exactly `distance` links and are the fast
//! path driven by resolver‑computed depths.

use crate::error::{LoxError, Result};
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    pub enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite a binding in *this* frame only.  Redeclaration is
    /// allowed at this layer; the resolver owns redeclaration rules.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        debug!("Defining '{}'", name);

        self.values.insert(name, value);
    }

    /// Look `name` up in this frame, then outward through the chain.
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Assign to an *existing* binding in this frame or outward through the
    /// chain.
    pub fn assign(&mut self, name: &str, value: Value<'a>, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Walk exactly `distance` enclosing links.
    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment<'a>>>> {
        let mut frame: Rc<RefCell<Environment<'a>>> = env.clone();

        for _ in 0..distance {
            let next = frame.borrow().enclosing.clone()?;
            frame = next;
        }

        Some(frame)
    }

    /// Read `name` from the frame exactly `distance` links out.  The resolver
    /// has proven the binding exists there; if that guarantee is ever broken
    /// this reports an internal error instead of panicking or silently
    /// re‑searching sibling scopes.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value<'a>> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| {
            LoxError::runtime(
                line,
                format!("Internal error: no scope at depth {} for '{}'", distance, name),
            )
        })?;

        let value = frame.borrow().values.get(name).cloned();

        value.ok_or_else(|| {
            LoxError::runtime(
                line,
                format!(
                    "Internal error: variable '{}' missing at resolved depth {}",
                    name, distance
                ),
            )
        })
    }

    /// Write `name` in the frame exactly `distance` links out.  Same
    /// invariant (and same defensive failure mode) as [`Environment::get_at`].
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &'a str,
        value: Value<'a>,
        line: usize,
    ) -> Result<()> {
        let frame = Self::ancestor(env, distance).ok_or_else(|| {
            LoxError::runtime(
                line,
                format!("Internal error: no scope at depth {} for '{}'", distance, name),
            )
        })?;

        frame.borrow_mut().values.insert(name, value);

        Ok(())
    }
}
