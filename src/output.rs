//! Where `print` output and runtime error reports go.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use log::warn;

pub trait Output {
    /// One line produced by a `print` statement.
    fn emit_line(&mut self, text: &str);

    /// One diagnostic (static or runtime error).
    fn emit_error(&mut self, text: &str);
}

/// Writes to the process's stdout / stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn emit_line(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", text) {
            warn!("failed to write to stdout: {}", e);
        }
    }

    fn emit_error(&mut self, text: &str) {
        let mut stderr = io::stderr().lock();
        if let Err(e) = writeln!(stderr, "{}", text) {
            warn!("failed to write to stderr: {}", e);
        }
    }
}

/// In-memory sink. Clones share the same buffers, so a caller can keep one
/// handle and give the other to the interpreter.
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    lines: Rc<RefCell<Vec<String>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    /// All printed lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.borrow().join("\n")
    }
}

impl Output for BufferOutput {
    fn emit_line(&mut self, text: &str) {
        self.lines.borrow_mut().push(text.to_owned());
    }

    fn emit_error(&mut self, text: &str) {
        self.errors.borrow_mut().push(text.to_owned());
    }
}
