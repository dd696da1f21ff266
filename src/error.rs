//! Centralised error hierarchy for the interpreter.
//!
//! Static failures (scanner, parser, resolver) are `LoxError::{Lex, Parse,
//! Resolve}`. Runtime faults have their own enum, [`RuntimeError`], because
//! the evaluator passes them around on every expression and they carry the
//! fault taxonomy the host can match on. Both convert into [`LoxError`] so the
//! pipeline and the CLI deal with a single `Result<T>`.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical error type used throughout the crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex { message: String, line: usize },

    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static‑analysis failure found by the resolver, located at a lexeme.
    #[error("[line {line}] Error at '{lexeme}': {message}")]
    Resolve {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Every static error found in one program. Nothing was executed.
    #[error("{}", join_lines(.0))]
    Static(Vec<LoxError>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent). Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting source files.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl LoxError {
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    pub fn resolve<L: Into<String>, S: Into<String>>(line: usize, lexeme: L, msg: S) -> Self {
        let message: String = msg.into();
        let lexeme: String = lexeme.into();

        info!(
            "Creating Resolve error: line={}, at={}, msg={}",
            line, lexeme, message
        );

        LoxError::Resolve {
            message,
            lexeme,
            line,
        }
    }

    /// Collapse a batch of static errors; a single error is returned as is.
    pub fn from_batch(mut errors: Vec<LoxError>) -> Self {
        if errors.len() == 1 {
            if let Some(only) = errors.pop() {
                return only;
            }
        }

        LoxError::Static(errors)
    }

    /// True for errors found before execution started.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. }
                | LoxError::Parse { .. }
                | LoxError::Resolve { .. }
                | LoxError::Static(_)
        )
    }
}

fn join_lines(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A fault raised while evaluating a program. Each variant records the line
/// and lexeme of the token that caused it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// Read of a name absent from the whole environment chain.
    #[error("[line {line}] Error at '{name}': Undefined variable '{name}'.")]
    UnboundName { name: String, line: usize },

    /// Assignment to a name absent from the whole environment chain.
    #[error("[line {line}] Error at '{name}': Cannot assign to undefined variable '{name}'.")]
    UndefinedTarget { name: String, line: usize },

    #[error("[line {line}] Error at '{name}': Variable '{name}' is used before being initialized.")]
    UninitializedAccess { name: String, line: usize },

    #[error("[line {line}] Error at '{lexeme}': {message}")]
    TypeMismatch {
        lexeme: String,
        line: usize,
        message: String,
    },

    #[error("[line {line}] Error at ')': Expected {expected} arguments but got {got}.")]
    ArityMismatch {
        expected: usize,
        got: usize,
        line: usize,
    },

    #[error("[line {line}] Error at ')': Can only call functions and classes.")]
    NotCallable { line: usize },

    #[error("[line {line}] Error at '{name}': {message}")]
    NotAnInstance {
        name: String,
        line: usize,
        message: &'static str,
    },

    #[error("[line {line}] Error at '{name}': Undefined property '{name}'.")]
    UnknownProperty { name: String, line: usize },

    /// Failure reported by a host-provided function.
    #[error("[line {line}] Error at '{name}': {message}")]
    Native {
        name: String,
        line: usize,
        message: String,
    },
}

impl RuntimeError {
    pub fn type_mismatch<L: Into<String>, M: Into<String>>(lexeme: L, line: usize, msg: M) -> Self {
        RuntimeError::TypeMismatch {
            lexeme: lexeme.into(),
            line,
            message: msg.into(),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            RuntimeError::UnboundName { line, .. }
            | RuntimeError::UndefinedTarget { line, .. }
            | RuntimeError::UninitializedAccess { line, .. }
            | RuntimeError::TypeMismatch { line, .. }
            | RuntimeError::ArityMismatch { line, .. }
            | RuntimeError::NotCallable { line }
            | RuntimeError::NotAnInstance { line, .. }
            | RuntimeError::UnknownProperty { line, .. }
            | RuntimeError::Native { line, .. } => *line,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
