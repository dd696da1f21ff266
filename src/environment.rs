use crate::ast::Ident;
use crate::error::RuntimeError;
use crate::value::Value;

use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope. Closures, call frames and child scopes all hold
/// one of these, and the scope lives as long as any of them does.
pub type EnvRef = Rc<RefCell<Environment>>;

/// One lexical scope: its bindings plus the scope it is nested in. Links only
/// ever point outward, so chains of `Rc`s never form a cycle.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    /// A root scope, used for globals.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Convenience for the common `Rc::new(RefCell::new(..))` dance.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    /// Insert or overwrite `name` in this scope only.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("define '{}' = {}", name, value);
        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up here, then outward.
    pub fn get(&self, name: &Ident) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeError::UnboundName {
                name: name.lexeme.clone(),
                line: name.line,
            })
        }
    }

    /// Overwrite the nearest existing binding of `name`. Never creates one.
    pub fn assign(&mut self, name: &Ident, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeError::UndefinedTarget {
                name: name.lexeme.clone(),
                line: name.line,
            })
        }
    }

    /// Read `name` from the scope exactly `depth` links out (0 = this one),
    /// without searching.
    pub fn get_at(&self, depth: usize, name: &Ident) -> Result<Value, RuntimeError> {
        if depth == 0 {
            return self.values.get(&name.lexeme).cloned().ok_or_else(|| {
                warn!("'{}' missing at its resolved scope", name.lexeme);
                RuntimeError::UnboundName {
                    name: name.lexeme.clone(),
                    line: name.line,
                }
            });
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get_at(depth - 1, name),
            None => Err(chain_too_short(depth, name)),
        }
    }

    /// Overwrite `name` in the scope exactly `depth` links out.
    pub fn assign_at(&mut self, depth: usize, name: &Ident, value: Value) -> Result<(), RuntimeError> {
        if depth == 0 {
            self.values.insert(name.lexeme.clone(), value);
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign_at(depth - 1, name, value),
            None => Err(chain_too_short(depth, name)),
        }
    }
}

/// The resolver promised a scope that is not there. Surface it as an unbound
/// name rather than tearing the host down.
fn chain_too_short(depth: usize, name: &Ident) -> RuntimeError {
    warn!(
        "environment chain ended {} scope(s) short while resolving '{}'",
        depth, name.lexeme
    );

    RuntimeError::UnboundName {
        name: name.lexeme.clone(),
        line: name.line,
    }
}
