use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::Instant;

use log::{debug, info, warn};

use crate::ast::{
    BinaryOp, ClassDecl, Expr, ExprId, ExprKind, Ident, Literal, LogicalOp, Stmt, UnaryOp,
};
use crate::callable::{Callable, LoxClass, LoxFunction, NativeFunction};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::output::Output;
use crate::resolver::Locals;
use crate::value::Value;

/// How a statement finished. `Return` unwinds to the nearest call boundary
/// and is never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Return(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

/// Tree-walking evaluator. Reads the resolver's depth table to jump straight
/// to a variable's scope instead of searching the chain.
pub struct Interpreter<'l> {
    globals: EnvRef,
    environment: EnvRef,
    locals: &'l Locals,
    output: &'l mut dyn Output,
}

impl<'l> Interpreter<'l> {
    /// A fresh interpreter over [`default_globals`].
    pub fn new(locals: &'l Locals, output: &'l mut dyn Output) -> Self {
        info!("Initializing Interpreter");

        Self::with_globals(default_globals(), locals, output)
    }

    /// Run against an existing global scope, e.g. one kept alive by a REPL
    /// session. Natives are expected to be defined there already.
    pub fn with_globals(globals: EnvRef, locals: &'l Locals, output: &'l mut dyn Output) -> Self {
        Self {
            environment: globals.clone(),
            globals,
            locals,
            output,
        }
    }

    pub fn globals(&self) -> EnvRef {
        self.globals.clone()
    }

    /// Expose a host function to programs under `name`.
    pub fn define_native(
        &mut self,
        name: &str,
        arity: usize,
        func: fn(&[Value]) -> Result<Value, String>,
    ) {
        define_native(&self.globals, name, arity, func);
    }

    /// Runs a program. The first runtime error stops execution, is written to
    /// the output's error channel, and is returned.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(ControlFlow::Normal) => {}

                Ok(ControlFlow::Return(value)) => {
                    // The resolver rejects top-level `return`.
                    warn!("return reached top level with {}; stopping", value);
                    return Ok(());
                }

                Err(e) => {
                    debug!("Runtime error: {}", e);
                    self.output.emit_error(&e.to_string());
                    return Err(e);
                }
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> IResult<ControlFlow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.output.emit_line(&value.to_string());
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Uninitialized,
                };
                self.environment.borrow_mut().define(&name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(self.environment.clone());
                return self.execute_block(statements, scope.into_ref());
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let ControlFlow::Return(value) = self.execute(body)? {
                        return Ok(ControlFlow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                let function = LoxFunction::new(decl.clone(), self.environment.clone(), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }

            Stmt::Class(decl) => self.execute_class(decl)?,

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(ControlFlow::Return(value));
            }
        }

        Ok(ControlFlow::Normal)
    }

    /// Run `statements` inside `environment`, then put the previous scope back
    /// whether they finished, returned, or failed.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<ControlFlow> {
        let previous = std::mem::replace(&mut self.environment, environment);

        let result = self.run_statements(statements);

        self.environment = previous;
        result
    }

    fn run_statements(&mut self, statements: &[Stmt]) -> IResult<ControlFlow> {
        for stmt in statements {
            if let ControlFlow::Return(value) = self.execute(stmt)? {
                return Ok(ControlFlow::Return(value));
            }
        }

        Ok(ControlFlow::Normal)
    }

    fn execute_class(&mut self, decl: &ClassDecl) -> IResult<()> {
        debug!("Defining class '{}'", decl.name.lexeme);

        let superclass = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let at = match &expr.kind {
                        ExprKind::Variable(name) => name,
                        _ => &decl.name,
                    };
                    return Err(RuntimeError::type_mismatch(
                        at.lexeme.as_str(),
                        at.line,
                        "Superclass must be a class.",
                    ));
                }
            },
            None => None,
        };

        // Bound up front so methods can refer to their own class.
        self.environment
            .borrow_mut()
            .define(&decl.name.lexeme, Value::Nil);

        let method_scope = match &superclass {
            Some(superclass) => {
                let mut scope = Environment::with_enclosing(self.environment.clone());
                scope.define("super", Value::Class(superclass.clone()));
                scope.into_ref()
            }
            None => self.environment.clone(),
        };

        let methods: HashMap<String, Rc<LoxFunction>> = decl
            .methods
            .iter()
            .map(|method| {
                let is_initializer = method.name.lexeme == "init";
                let function = LoxFunction::new(method.clone(), method_scope.clone(), is_initializer);
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = LoxClass::new(decl.name.lexeme.clone(), superclass, methods);

        self.environment
            .borrow_mut()
            .assign(&decl.name, Value::Class(Rc::new(class)))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::from(s.as_str()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Nil => Value::Nil,
            }),

            ExprKind::Grouping(inner) => self.evaluate(inner),

            ExprKind::Unary { op, line, right } => {
                let right = self.evaluate(right)?;
                evaluate_unary(*op, *line, right)
            }

            ExprKind::Binary {
                left,
                op,
                line,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                evaluate_binary(*op, *line, left, right)
            }

            ExprKind::Logical { left, op, right } => {
                let left = self.evaluate(left)?;
                let short_circuits = match op {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            ExprKind::Variable(name) => self.look_up_variable(name, expr.id),

            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.depth(expr.id) {
                    Some(depth) => {
                        self.environment
                            .borrow_mut()
                            .assign_at(depth, name, value.clone())?;
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            ExprKind::Call {
                callee,
                paren_line,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                let callable = callee
                    .as_callable()
                    .ok_or(RuntimeError::NotCallable { line: *paren_line })?;

                if args.len() != callable.arity() {
                    return Err(RuntimeError::ArityMismatch {
                        expected: callable.arity(),
                        got: args.len(),
                        line: *paren_line,
                    });
                }

                debug!("Calling {} with {} argument(s)", callee, args.len());
                callable.call(self, args, *paren_line)
            }

            ExprKind::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => instance.get(name),
                _ => Err(RuntimeError::NotAnInstance {
                    name: name.lexeme.clone(),
                    line: name.line,
                    message: "Only instances have properties.",
                }),
            },

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::NotAnInstance {
                        name: name.lexeme.clone(),
                        line: name.line,
                        message: "Only instances have fields.",
                    });
                };

                let value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            ExprKind::This(keyword) => self.look_up_variable(keyword, expr.id),

            ExprKind::Super { keyword, method } => self.evaluate_super(expr.id, keyword, method),
        }
    }

    fn look_up_variable(&self, name: &Ident, id: ExprId) -> IResult<Value> {
        let value = match self.locals.depth(id) {
            Some(depth) => self.environment.borrow().get_at(depth, name)?,
            None => self.globals.borrow().get(name)?,
        };

        if let Value::Uninitialized = value {
            return Err(RuntimeError::UninitializedAccess {
                name: name.lexeme.clone(),
                line: name.line,
            });
        }

        debug!("Variable '{}' evaluated to: {}", name.lexeme, value);
        Ok(value)
    }

    /// `super.method`: look the method up on the superclass captured when the
    /// class was declared, and bind it to the current `this`, which lives one
    /// scope inside the one holding `super`.
    fn evaluate_super(&self, id: ExprId, keyword: &Ident, method: &Ident) -> IResult<Value> {
        let depth = self.locals.depth(id).ok_or_else(|| RuntimeError::UnboundName {
            name: keyword.lexeme.clone(),
            line: keyword.line,
        })?;

        let environment = self.environment.borrow();

        let Value::Class(superclass) = environment.get_at(depth, keyword)? else {
            return Err(RuntimeError::type_mismatch(
                keyword.lexeme.as_str(),
                keyword.line,
                "Superclass must be a class.",
            ));
        };

        let this = Ident::new("this", keyword.line);
        let Value::Instance(instance) = environment.get_at(depth.saturating_sub(1), &this)? else {
            return Err(RuntimeError::type_mismatch(
                "this",
                keyword.line,
                "'this' must be an instance.",
            ));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(RuntimeError::UnknownProperty {
                name: method.lexeme.clone(),
                line: method.line,
            }),
        }
    }
}

fn evaluate_unary(op: UnaryOp, line: usize, right: Value) -> IResult<Value> {
    match (op, right) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(n)),
        (op, _) => Err(RuntimeError::type_mismatch(
            op.lexeme(),
            line,
            "Operand must be a number.",
        )),
    }
}

/// Arithmetic and comparison take numbers only; `+` does not concatenate.
fn evaluate_binary(op: BinaryOp, line: usize, left: Value, right: Value) -> IResult<Value> {
    match op {
        BinaryOp::EqualEqual => return Ok(Value::Bool(left == right)),
        BinaryOp::BangEqual => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        debug!(
            "'{}' applied to {} and {}",
            op,
            left.type_name(),
            right.type_name()
        );
        return Err(RuntimeError::type_mismatch(
            op.lexeme(),
            line,
            "Operands must be numbers.",
        ));
    };
    let (a, b) = (*a, *b);

    Ok(match op {
        BinaryOp::Plus => Value::Number(a + b),
        BinaryOp::Minus => Value::Number(a - b),
        BinaryOp::Star => Value::Number(a * b),
        BinaryOp::Slash => Value::Number(a / b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::EqualEqual | BinaryOp::BangEqual => unreachable!("handled above"),
    })
}

/// A global scope holding the built-in natives (`clock`).
pub fn default_globals() -> EnvRef {
    let globals = Environment::new().into_ref();
    define_native(&globals, "clock", 0, clock);
    globals
}

fn define_native(
    globals: &EnvRef,
    name: &str,
    arity: usize,
    func: fn(&[Value]) -> Result<Value, String>,
) {
    debug!("Defining native function '{}'", name);

    let native = NativeFunction {
        name: name.to_string(),
        arity,
        func,
    };
    globals
        .borrow_mut()
        .define(name, Value::Native(Rc::new(native)));
}

static CLOCK_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Seconds on a monotonic clock since the first call in this process.
fn clock(_args: &[Value]) -> Result<Value, String> {
    let epoch = CLOCK_EPOCH.get_or_init(Instant::now);
    Ok(Value::Number(epoch.elapsed().as_secs_f64()))
}
