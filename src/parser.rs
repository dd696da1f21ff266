/*!
Recursive‑descent parser: token slice → owned [`Stmt`] list.

Grammar (condensed)
-------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT ( "<" IDENT )? "{" function* "}" ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | forStmt | ifStmt | printStmt
               | returnStmt | whileStmt | block ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
assignment     → ( call "." )? IDENT "=" assignment | logic_or ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality  ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" | "+" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "super" "." IDENT ;
```

`for` has no node of its own: it is rewritten here into a block holding the
initializer and a `while` whose body runs the increment after the loop body.

After a syntax error the parser records it, discards tokens up to the next
statement boundary and carries on, so one run reports every error it can.
*/

use crate::ast::{
    BinaryOp, ClassDecl, Expr, ExprKind, FunctionDecl, Ident, IdGen, Literal, LogicalOp, Stmt,
    UnaryOp,
};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

use log::{debug, info};
use std::rc::Rc;

const MAX_ARITY: usize = 255;

/// Parser over an immutable slice of tokens terminated by `EOF`.
pub struct Parser<'t, 'a, 'g> {
    tokens: &'t [Token<'a>],
    current: usize,
    ids: &'g mut IdGen,
    errors: Vec<LoxError>,
}

impl<'t, 'a, 'g> Parser<'t, 'a, 'g> {
    /// Expression ids are drawn from `ids`, so trees parsed with the same
    /// generator never collide.
    pub fn new(tokens: &'t [Token<'a>], ids: &'g mut IdGen) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            ids,
            errors: Vec::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program. Fails with every syntax error found.
    pub fn parse(mut self) -> Result<Vec<Stmt>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        if !self.errors.is_empty() {
            info!("Parse finished with {} error(s)", self.errors.len());
            return Err(LoxError::from_batch(self.errors));
        }

        info!("Parsed {} top-level statement(s)", statements.len());
        Ok(statements)
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        debug!("Entering declaration");

        let result = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.matches(TokenType::FUN) {
            self.function("function").map(Stmt::Function)
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Recovering from parse error: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.ident(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass = if self.matches(TokenType::LESS) {
            let sup = self.ident(TokenType::IDENTIFIER, "Expect superclass name.")?;
            Some(self.ids.expr(ExprKind::Variable(sup)))
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class(ClassDecl {
            name,
            superclass,
            methods,
        }))
    }

    /// `kind` is "function" or "method", only used in messages.
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name = self.ident(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?;

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<Ident> = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    // Reported, but the parameter list itself is still well formed.
                    self.errors.push(LoxError::parse(
                        self.peek().line,
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(self.ident(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.ident(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition =
            condition.unwrap_or_else(|| self.ids.expr(ExprKind::Literal(Literal::Bool(true))));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        debug!("Desugared for loop into while");
        Ok(body)
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = to_ident(self.previous());
        let value = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;
        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.logical_or()?;

        if self.matches(TokenType::EQUAL) {
            let equals_line = self.previous().line;
            let value = Box::new(self.assignment()?);

            return match expr.kind {
                ExprKind::Variable(name) => Ok(self.ids.expr(ExprKind::Assign { name, value })),

                ExprKind::Get { object, name } => Ok(self.ids.expr(ExprKind::Set {
                    object,
                    name,
                    value,
                })),

                kind => {
                    // Not worth synchronizing over: the tokens are consumed fine.
                    self.errors
                        .push(LoxError::parse(equals_line, "Invalid assignment target."));
                    Ok(Expr { id: expr.id, kind })
                }
            };
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let right = self.logical_and()?;
            expr = self.ids.expr(ExprKind::Logical {
                left: Box::new(expr),
                op: LogicalOp::Or,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let right = self.equality()?;
            expr = self.ids.expr(ExprKind::Logical {
                left: Box::new(expr),
                op: LogicalOp::And,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::BANG_EQUAL, BinaryOp::BangEqual),
                (TokenType::EQUAL_EQUAL, BinaryOp::EqualEqual),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::GREATER, BinaryOp::Greater),
                (TokenType::GREATER_EQUAL, BinaryOp::GreaterEqual),
                (TokenType::LESS, BinaryOp::Less),
                (TokenType::LESS_EQUAL, BinaryOp::LessEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::MINUS, BinaryOp::Minus),
                (TokenType::PLUS, BinaryOp::Plus),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenType::SLASH, BinaryOp::Slash),
                (TokenType::STAR, BinaryOp::Star),
            ],
            Self::unary,
        )
    }

    /// One left-associative precedence level: `next ( op next )*`.
    fn binary_level(
        &mut self,
        operators: &[(TokenType, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr = next(self)?;

        while let Some(op) = self.match_operator(operators) {
            let line = self.previous().line;
            let right = next(self)?;
            expr = self.ids.expr(ExprKind::Binary {
                left: Box::new(expr),
                op,
                line,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = if self.matches(TokenType::BANG) {
            Some(UnaryOp::Not)
        } else if self.matches(TokenType::MINUS) {
            Some(UnaryOp::Negate)
        } else if self.matches(TokenType::PLUS) {
            Some(UnaryOp::Plus)
        } else {
            None
        };

        if let Some(op) = op {
            let line = self.previous().line;
            let right = self.unary()?;
            return Ok(self.ids.expr(ExprKind::Unary {
                op,
                line,
                right: Box::new(right),
            }));
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name = self.ident(TokenType::IDENTIFIER, "Expect property name after '.'.")?;
                expr = self.ids.expr(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    self.errors.push(LoxError::parse(
                        self.peek().line,
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(self.ids.expr(ExprKind::Call {
            callee: Box::new(callee),
            paren_line: paren.line,
            arguments,
        }))
    }

    fn primary(&mut self) -> Result<Expr> {
        let literal = if self.matches(TokenType::FALSE) {
            Some(Literal::Bool(false))
        } else if self.matches(TokenType::TRUE) {
            Some(Literal::Bool(true))
        } else if self.matches(TokenType::NIL) {
            Some(Literal::Nil)
        } else if let TokenType::NUMBER(n) = self.peek().token_type {
            self.advance();
            Some(Literal::Number(n))
        } else if let TokenType::STRING(ref s) = self.peek().token_type {
            let s = s.clone();
            self.advance();
            Some(Literal::Str(s))
        } else {
            None
        };

        if let Some(literal) = literal {
            return Ok(self.ids.expr(ExprKind::Literal(literal)));
        }

        if self.matches(TokenType::THIS) {
            let keyword = to_ident(self.previous());
            return Ok(self.ids.expr(ExprKind::This(keyword)));
        }

        if self.matches(TokenType::SUPER) {
            let keyword = to_ident(self.previous());
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method = self.ident(TokenType::IDENTIFIER, "Expect superclass method name.")?;
            return Ok(self.ids.expr(ExprKind::Super { keyword, method }));
        }

        if self.matches(TokenType::IDENTIFIER) {
            let name = to_ident(self.previous());
            return Ok(self.ids.expr(ExprKind::Variable(name)));
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(self.ids.expr(ExprKind::Grouping(Box::new(expr))));
        }

        Err(LoxError::parse(self.peek().line, "Expect expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            return true;
        }

        false
    }

    fn match_operator(&mut self, operators: &[(TokenType, BinaryOp)]) -> Option<BinaryOp> {
        let op = operators
            .iter()
            .find(|(ttype, _)| self.check(ttype.clone()))
            .map(|(_, op)| *op)?;

        self.advance();
        Some(op)
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'t Token<'a>> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        debug!("Expected token missing: {}", message);
        Err(LoxError::parse(self.peek().line, message))
    }

    fn ident(&mut self, ttype: TokenType, message: &str) -> Result<Ident> {
        self.consume(ttype, message).map(to_ident)
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    #[inline(always)]
    fn advance(&mut self) -> &'t Token<'a> {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    /// A slice without a trailing `EOF` is treated as ending after its last token.
    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
            || matches!(self.tokens[self.current].token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'t Token<'a> {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    #[inline(always)]
    fn previous(&self) -> &'t Token<'a> {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,
                _ => {}
            }

            self.advance();
        }
    }
}

fn to_ident(token: &Token<'_>) -> Ident {
    Ident::new(token.lexeme, token.line)
}
