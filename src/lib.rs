//! A tree-walking interpreter for Lox: closures, classes with single
//! inheritance, and a static resolver that pins every local variable
//! reference to its scope before anything runs.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`].
//! [`run_source`] wires them together for one program; [`Session`] keeps the
//! globals alive across several (a REPL).

pub mod ast;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use ast::IdGen;
use environment::EnvRef;
use error::{LoxError, Result};
use interpreter::Interpreter;
use output::Output;
use parser::Parser;
use resolver::{Locals, Resolver};
use scanner::Scanner;

use log::info;

/// Scan, parse, resolve and run one program. Every static error is written
/// to `output`'s error channel and nothing runs; a runtime error stops the
/// program after whatever it already printed.
pub fn run_source(source: &str, output: &mut dyn Output) -> Result<()> {
    Session::new().run(source, output)
}

/// Successive programs sharing one global scope.
///
/// Expression ids come from one generator and the depth tables are merged,
/// so functions declared by an earlier program still resolve their locals
/// when a later one calls them.
pub struct Session {
    ids: IdGen,
    locals: Locals,
    globals: EnvRef,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        info!("Starting session");

        Self {
            ids: IdGen::new(),
            locals: Locals::default(),
            globals: interpreter::default_globals(),
        }
    }

    pub fn globals(&self) -> EnvRef {
        self.globals.clone()
    }

    pub fn run(&mut self, source: &str, output: &mut dyn Output) -> Result<()> {
        let (tokens, mut errors) = Scanner::new(source).scan_all();

        let parsed = Parser::new(&tokens, &mut self.ids).parse();

        let statements = match parsed {
            Ok(statements) if errors.is_empty() => statements,
            Ok(_) => return Err(report_static(errors, output)),
            Err(e) => {
                errors.push(e);
                return Err(report_static(errors, output));
            }
        };

        let locals = Resolver::new()
            .resolve(&statements)
            .map_err(|e| report_static(vec![e], output))?;
        self.locals.extend(locals);

        let mut interpreter = Interpreter::with_globals(self.globals.clone(), &self.locals, output);
        interpreter.interpret(&statements)?;

        Ok(())
    }
}

/// Emit each static error on its own line and fold them into one error.
fn report_static(errors: Vec<LoxError>, output: &mut dyn Output) -> LoxError {
    let flat: Vec<LoxError> = errors
        .into_iter()
        .flat_map(|e| match e {
            LoxError::Static(inner) => inner,
            other => vec![other],
        })
        .collect();

    info!("Reporting {} static error(s)", flat.len());

    for e in &flat {
        output.emit_error(&e.to_string());
    }

    LoxError::from_batch(flat)
}
