//! Runtime representations of invocable and instantiable values: user
//! functions (closures), classes, their instances, and host natives.

use crate::ast::{FunctionDecl, Ident};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::interpreter::{ControlFlow, Interpreter};
use crate::value::Value;

use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Anything a call expression can invoke. The interpreter checks the argument
/// count against [`Callable::arity`] before calling.
pub trait Callable {
    fn arity(&self) -> usize;

    /// `paren_line` is the line of the call's closing parenthesis.
    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
        paren_line: usize,
    ) -> Result<Value, RuntimeError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Functions
// ─────────────────────────────────────────────────────────────────────────────

/// A function declaration paired with the environment it was declared in.
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure has `this` bound to `instance`.
    /// The body and parameters are shared, not cloned.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: environment.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    fn bound_this(&self) -> Result<Value, RuntimeError> {
        let this = Ident::new("this", self.declaration.name.line);
        self.closure.borrow().get_at(0, &this)
    }
}

impl Callable for LoxFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
        _paren_line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling user-defined function '{}'", self.name());

        let mut environment = Environment::with_enclosing(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, environment.into_ref())?;

        // `init` always hands back the instance, even on a bare `return;`.
        if self.is_initializer {
            return self.bound_this();
        }

        match flow {
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Normal => Ok(Value::Nil),
        }
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes and instances
// ─────────────────────────────────────────────────────────────────────────────

pub struct LoxClass {
    name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own methods first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }
}

impl Callable for LoxClass {
    /// The initializer's arity, or zero without one.
    fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    fn call(
        self: Rc<Self>,
        interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
        paren_line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Instantiating class '{}'", self.name);

        let instance = Rc::new(LoxInstance::new(self.clone()));

        if let Some(initializer) = self.find_method("init") {
            Rc::new(initializer.bind(instance.clone())).call(interpreter, arguments, paren_line)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class(&self) -> &Rc<LoxClass> {
        &self.class
    }

    /// Fields shadow methods; a method comes back bound to this instance.
    pub fn get(self: &Rc<Self>, name: &Ident) -> Result<Value, RuntimeError> {
        if let Some(value) = self.fields.borrow().get(&name.lexeme) {
            return Ok(value.clone());
        }

        match self.class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(self.clone())))),
            None => Err(RuntimeError::UnknownProperty {
                name: name.lexeme.clone(),
                line: name.line,
            }),
        }
    }

    /// Always writes a field, creating it if needed.
    pub fn set(&self, name: &Ident, value: Value) {
        self.fields.borrow_mut().insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host functions
// ─────────────────────────────────────────────────────────────────────────────

/// A function implemented by the host. A returned `Err` message becomes a
/// [`RuntimeError::Native`] at the call site.
#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value, String>,
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(
        self: Rc<Self>,
        _interpreter: &mut Interpreter<'_>,
        arguments: Vec<Value>,
        paren_line: usize,
    ) -> Result<Value, RuntimeError> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|message| RuntimeError::Native {
            name: self.name.clone(),
            line: paren_line,
            message,
        })
    }
}
