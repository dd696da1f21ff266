//! Static resolver pass.
//!
//! One walk over the tree that:
//! 1. Builds lexical scopes (a stack of `HashMap<&str, bool>`, `false` meaning
//!    declared and `true` defined).
//! 2. Reports static errors: redeclaration in a scope, reading a variable in
//!    its own initializer, `return` outside a function, a value returned from
//!    `init`, `this`/`super` outside a class, and a class inheriting from
//!    itself. Every error is collected; resolution carries on after each one.
//! 3. Records, for each variable occurrence that binds to a local, how many
//!    scopes out its declaration lives. Occurrences left out of the table are
//!    globals.

use crate::ast::{ClassDecl, Expr, ExprId, ExprKind, FunctionDecl, Ident, Stmt};
use crate::error::{LoxError, Result};

use log::{debug, info};
use std::collections::HashMap;

/// Side-table from expression id to the number of scopes between the
/// expression and its binding. Produced once by [`Resolver`] and only read
/// afterwards.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Locals {
    depths: HashMap<ExprId, usize>,
}

impl Locals {
    /// `None` means "look in the globals", not "zero hops".
    pub fn depth(&self, id: ExprId) -> Option<usize> {
        self.depths.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.depths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }

    /// Merge the table of a later program resolved against the same ids.
    pub fn extend(&mut self, other: Locals) {
        self.depths.extend(other.depths);
    }

    fn insert(&mut self, id: ExprId, depth: usize) {
        self.depths.insert(id, depth);
    }
}

/// What kind of function body are we in? Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we in a class body, and does it have a superclass? Validates `this`
/// and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, bool>>,
    /// Top-level declarations, only consulted for the own-initializer check.
    globals: HashMap<&'a str, bool>,
    locals: Locals,
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Default for Resolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            globals: HashMap::new(),
            locals: Locals::default(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk the whole program. Yields the depth table, or every static error
    /// found if there was at least one.
    pub fn resolve(mut self, statements: &'a [Stmt]) -> Result<Locals> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if !self.errors.is_empty() {
            info!("Resolve pass found {} error(s)", self.errors.len());
            return Err(LoxError::from_batch(self.errors));
        }

        info!("Resolved {} local reference(s)", self.locals.len());
        Ok(self.locals)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(decl) => {
                // Defined before the body so the function can recurse.
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Class(decl) => self.resolve_class(decl),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

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
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_class(&mut self, decl: &'a ClassDecl) {
        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(&decl.name);
        self.define(&decl.name);

        if let Some(superclass) = &decl.superclass {
            if let ExprKind::Variable(sup) = &superclass.kind {
                if sup.lexeme == decl.name.lexeme {
                    self.error(sup, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.bind_keyword("super");
        }

        self.begin_scope();
        self.bind_keyword("this");

        for method in &decl.methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if decl.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}

            ExprKind::Grouping(inner) => self.resolve_expr(inner),

            ExprKind::Unary { right, .. } => self.resolve_expr(right),

            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            ExprKind::Variable(name) => {
                if self.innermost().get(name.lexeme.as_str()) == Some(&false) {
                    let message = if self.scopes.is_empty() {
                        "Can't read global variable in its own initializer."
                    } else {
                        "Can't read local variable in its own initializer."
                    };
                    self.error(name, message);
                }
                self.resolve_local(expr.id, name);
            }

            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }

            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            ExprKind::Get { object, .. } => self.resolve_expr(object),

            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            ExprKind::This(keyword) => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(expr.id, keyword);
            }

            ExprKind::Super { keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.");
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.");
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(expr.id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, decl: &'a FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;

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

    /// The innermost scope; the globals at top level.
    fn innermost(&self) -> &HashMap<&'a str, bool> {
        self.scopes.last().unwrap_or(&self.globals)
    }

    fn declare(&mut self, name: &'a Ident) {
        let duplicate = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name.lexeme.as_str()));

        if duplicate {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(&name.lexeme, false);
            }
            // A redeclared global keeps its earlier binding readable.
            None => {
                self.globals.entry(&name.lexeme).or_insert(false);
            }
        }
    }

    fn define(&mut self, name: &'a Ident) {
        match self.scopes.last_mut() {
            Some(scope) => scope.insert(&name.lexeme, true),
            None => self.globals.insert(&name.lexeme, true),
        };
    }

    /// Bind `this` / `super` in the scope just opened for a class body.
    fn bind_keyword(&mut self, keyword: &'static str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(keyword, true);
        }
    }

    fn error(&mut self, at: &Ident, message: &str) {
        debug!("Resolve error at '{}': {}", at.lexeme, message);
        self.errors
            .push(LoxError::resolve(at.line, at.lexeme.as_str(), message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of the
    /// table if no local scope declares it (a global).
    fn resolve_local(&mut self, id: ExprId, name: &Ident) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme.as_str()) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
