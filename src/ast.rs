//! Owned, immutable syntax tree consumed by the resolver and the interpreter.
//!
//! Every expression node carries an [`ExprId`] handed out by an [`IdGen`]. The
//! resolver keys its depth table by that id, so two syntactically identical
//! expressions at different places in the program never share an entry.
//! Function declarations sit behind an `Rc` so closures created at runtime
//! share the body with the tree instead of copying it.

use std::fmt;
use std::rc::Rc;

/// Stable identity of one expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Monotonic source of [`ExprId`]s. One generator must be used for every tree
/// whose ids end up in the same resolver table.
#[derive(Debug, Default)]
pub struct IdGen {
    next: u32,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }

    /// Wrap `kind` in a node with a fresh id.
    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.next_id(),
            kind,
        }
    }
}

/// An identifier (or keyword such as `this`) together with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub lexeme: String,
    pub line: usize,
}

impl Ident {
    pub fn new<S: Into<String>>(lexeme: S, line: usize) -> Self {
        Self {
            lexeme: lexeme.into(),
            line,
        }
    }
}

/// A literal constant that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integral lexemes such as `"3"` are still `3.0`.
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    EqualEqual,
    BangEqual,
}

impl BinaryOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Star => "*",
            BinaryOp::Slash => "/",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::EqualEqual => "==",
            BinaryOp::BangEqual => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `+x`, a numeric no-op
    Plus,
    /// `!x`
    Not,
}

impl UnaryOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lexeme())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Infix arithmetic, comparison or equality: `a + b`, `x <= y`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        line: usize,
        right: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },

    Grouping(Box<Expr>),

    Literal(Literal),

    Variable(Ident),

    Unary {
        op: UnaryOp,
        line: usize,
        right: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// Line of the closing `)`, used for call-site errors.
        paren_line: usize,
        arguments: Vec<Expr>,
    },

    /// `object.name`
    Get { object: Box<Expr>, name: Ident },

    /// `object.name = value`
    Set {
        object: Box<Expr>,
        name: Ident,
        value: Box<Expr>,
    },

    This(Ident),

    /// `super.method`
    Super { keyword: Ident, method: Ident },

    /// `name = value`
    Assign { name: Ident, value: Box<Expr> },
}

/// `fun name(params) { body }`, also used for methods.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Ident,
    /// Always an `ExprKind::Variable` when present.
    pub superclass: Option<Expr>,
    pub methods: Vec<Rc<FunctionDecl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    /// `var name (= initializer)?;`
    Var {
        name: Ident,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Function(Rc<FunctionDecl>),

    Class(ClassDecl),

    Return {
        keyword: Ident,
        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },
}
