use crate::callable::{Callable, LoxClass, LoxFunction, LoxInstance, NativeFunction};

use std::fmt;
use std::rc::Rc;

/// A runtime value.
///
/// Strings are immutable and shared; functions, classes and instances are
/// reference types compared by identity.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Function(Rc<LoxFunction>),
    Native(Rc<NativeFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<LoxInstance>),

    /// Held by a variable declared without an initializer. Reading it is a
    /// runtime error, so it never escapes into an expression result.
    Uninitialized,
}

impl Value {
    /// `nil` and `false` are falsy; everything else, `0` and `""` included, is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// The value's callable capability, if it has one.
    pub fn as_callable(&self) -> Option<Rc<dyn Callable>> {
        match self {
            Value::Function(f) => Some(f.clone() as Rc<dyn Callable>),
            Value::Native(n) => Some(n.clone() as Rc<dyn Callable>),
            Value::Class(c) => Some(c.clone() as Rc<dyn Callable>),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Uninitialized => "uninitialized",
        }
    }
}

impl PartialEq for Value {
    /// Value equality for primitives, identity for reference types. No
    /// coercion between kinds, and the uninitialized marker equals nothing.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // 3.0 → "3", 2.5 → "2.5"
            Value::Number(n) if n.fract() == 0.0 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),

            Value::String(s) => write!(f, "{}", s),

            Value::Function(func) => write!(f, "<fn {}>", func.name()),

            Value::Native(native) => write!(f, "<native fn {}>", native.name),

            Value::Class(class) => write!(f, "{}", class.name()),

            Value::Instance(instance) => write!(f, "{} instance", instance.class().name()),

            Value::Uninitialized => write!(f, "<uninitialized>"),
        }
    }
}
