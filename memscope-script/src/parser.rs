//! Recursive-descent parser for memscope scripts.
//!
//! Produces a [`Program`] from source text, failing fast with the position
//! of the first offending token. Precedence is handled by one level of
//! descent per operator tier; postfix forms (calls, indexing, member
//! access) are folded in a single loop.

use crate::ast::{
    Annotation, AssignTarget, BinaryOp, Block, Expr, ExprKind, FnDecl, ImportDecl, Item,
    ModulePath, Program, Stmt, StmtKind, UnaryOp, UseDecl,
};
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::{LineIndex, Span};
use smol_str::SmolStr;

/// Parse one source unit.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    Parser::new(source).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    lines: LineIndex,
    prev_span: Span,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            lines: LineIndex::new(source),
            prev_span: Span::empty(0),
        }
    }

    fn parse_program(mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while !self.at_eof() {
            items.push(self.parse_item()?);
        }
        Ok(Program { items })
    }

    // ── Items ───────────────────────────────────────────────────────────

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        match self.peek().kind {
            TokenKind::Use => Ok(Item::Use(self.parse_use()?)),
            TokenKind::Import => Ok(Item::Import(self.parse_import()?)),
            TokenKind::At | TokenKind::Async | TokenKind::Fn => {
                Ok(Item::Fn(self.parse_fn_decl()?))
            }
            _ => Ok(Item::Stmt(self.parse_stmt()?)),
        }
    }

    fn parse_use(&mut self) -> Result<UseDecl, ParseError> {
        let start = self.peek().span;
        self.advance(); // `use`
        let mut segments = self.parse_dotted_path()?;
        if segments.len() < 2 {
            return Err(self.error_at(
                start,
                "`use` needs a module path and a member, like `use util.math.add`",
            ));
        }
        let name = segments.pop().unwrap_or_default();
        let alias = if self.eat(&TokenKind::As) { Some(self.expect_ident("alias")?) } else { None };
        self.expect(&TokenKind::Semi, "`;` after `use`")?;
        Ok(UseDecl {
            module: ModulePath::new(segments),
            name,
            alias,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_import(&mut self) -> Result<ImportDecl, ParseError> {
        let start = self.peek().span;
        self.advance(); // `import`
        let segments = self.parse_dotted_path()?;
        self.expect(&TokenKind::Semi, "`;` after `import`")?;
        Ok(ImportDecl { module: ModulePath::new(segments), span: start.merge(self.prev_span) })
    }

    fn parse_dotted_path(&mut self) -> Result<Vec<SmolStr>, ParseError> {
        let mut segments = vec![self.expect_ident("module path")?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.expect_ident("module path segment")?);
        }
        Ok(segments)
    }

    fn parse_fn_decl(&mut self) -> Result<FnDecl, ParseError> {
        let start = self.peek().span;
        let annotations = self.parse_annotations()?;
        let is_async = self.eat(&TokenKind::Async);
        let fn_span = self.peek().span;
        self.expect(&TokenKind::Fn, "`fn`")?;
        let line = self.lines.line(fn_span.start);
        let name = self.expect_ident("function name")?;

        self.expect(&TokenKind::LParen, "`(` after function name")?;
        let mut params = Vec::new();
        if !matches!(self.peek().kind, TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`)` after parameters")?;

        let body = self.parse_block()?;
        Ok(FnDecl {
            name,
            params,
            annotations,
            body,
            is_async,
            line,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>, ParseError> {
        let mut annotations = Vec::new();
        while matches!(self.peek().kind, TokenKind::At) {
            let at_span = self.peek().span;
            self.advance();
            let name = self.expect_ident("annotation name")?;
            annotations.push(Annotation { name, span: at_span.merge(self.prev_span) });
        }
        Ok(annotations)
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RBrace) {
            if self.at_eof() {
                return Err(self.error_here("unexpected end of input, expected `}`"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.advance(); // `}`
        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().span;
        let line = self.lines.line(start.start);
        let kind = match self.peek().kind {
            TokenKind::Let => self.parse_let()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                self.advance();
                let value = if matches!(self.peek().kind, TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&TokenKind::Semi, "`;` after `return`")?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semi, "`;` after `break`")?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semi, "`;` after `continue`")?;
                StmtKind::Continue
            }
            TokenKind::At | TokenKind::Async | TokenKind::Fn => {
                StmtKind::Fn(self.parse_fn_decl()?)
            }
            _ => self.parse_assign_or_expr()?,
        };
        Ok(Stmt { kind, line, span: start.merge(self.prev_span) })
    }

    fn parse_let(&mut self) -> Result<StmtKind, ParseError> {
        self.advance(); // `let`
        let name = self.expect_ident("variable name")?;
        self.expect(&TokenKind::Eq, "`=` in `let`")?;
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semi, "`;` after `let`")?;
        Ok(StmtKind::Let { name, value })
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        self.advance(); // `if`
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if matches!(self.peek().kind, TokenKind::If) {
                // `else if` chains nest as a single-statement else block.
                let start = self.peek().span;
                let line = self.lines.line(start.start);
                let kind = self.parse_if()?;
                Some(Block { stmts: vec![Stmt { kind, line, span: start.merge(self.prev_span) }] })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(StmtKind::If { cond, then_block, else_block })
    }

    fn parse_while(&mut self) -> Result<StmtKind, ParseError> {
        self.advance(); // `while`
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<StmtKind, ParseError> {
        self.advance(); // `for`
        let var = self.expect_ident("loop variable")?;
        self.expect(&TokenKind::In, "`in`")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(StmtKind::For { var, iter, body })
    }

    fn parse_assign_or_expr(&mut self) -> Result<StmtKind, ParseError> {
        let expr = self.parse_expr()?;
        if self.eat(&TokenKind::Eq) {
            let target = match expr.kind {
                ExprKind::Ident(name) => AssignTarget::Name(name),
                ExprKind::Index { target, index } => {
                    AssignTarget::Index { target: *target, index: *index }
                }
                _ => return Err(self.error_at(expr.span, "invalid assignment target")),
            };
            let value = self.parse_expr()?;
            self.expect(&TokenKind::Semi, "`;` after assignment")?;
            return Ok(StmtKind::Assign { target, value });
        }
        self.expect(&TokenKind::Semi, "`;` after expression")?;
        Ok(StmtKind::Expr(expr))
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.peek().span;
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr { kind: ExprKind::Unary { op, operand: Box::new(operand) }, span });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args(&TokenKind::RParen, "`)` after arguments")?;
                    let span = expr.span.merge(self.prev_span);
                    expr = Expr {
                        kind: ExprKind::Call { callee: Box::new(expr), args },
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket, "`]` after index")?;
                    let span = expr.span.merge(self.prev_span);
                    expr = Expr {
                        kind: ExprKind::Index { target: Box::new(expr), index: Box::new(index) },
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident("member name")?;
                    let span = expr.span.merge(self.prev_span);
                    expr = Expr { kind: ExprKind::Field { target: Box::new(expr), name }, span };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(
        &mut self,
        close: &TokenKind,
        expected: &str,
    ) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if std::mem::discriminant(&self.peek().kind) != std::mem::discriminant(close) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(close, expected)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(n) => {
                self.advance();
                ExprKind::Float(n)
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Nil => {
                self.advance();
                ExprKind::Nil
            }
            TokenKind::Ident(ref name) => {
                let name = name.clone();
                self.advance();
                ExprKind::Ident(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(Expr { kind: inner.kind, span: token.span.merge(self.prev_span) });
            }
            TokenKind::LBracket => {
                self.advance();
                let elems = self.parse_args(&TokenKind::RBracket, "`]` after array elements")?;
                ExprKind::Array(elems)
            }
            TokenKind::Eof => return Err(self.error_here("unexpected end of input")),
            _ => {
                return Err(self.error_here(&format!(
                    "unexpected token {}",
                    describe(&token.kind)
                )))
            }
        };
        Ok(Expr { kind, span: token.span.merge(self.prev_span) })
    }

    // ── Token cursor ────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.prev_span = token.span;
        if !matches!(token.kind, TokenKind::Eof) {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token if it has the same kind, ignoring payloads.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!(
                "expected {expected}, found {}",
                describe(&self.peek().kind)
            )))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<SmolStr, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_here(&format!("expected {what}, found {}", describe(&other)))),
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        self.error_at(self.peek().span, message)
    }

    fn error_at(&self, span: Span, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            line: self.lines.line(span.start),
            column: self.lines.column(span.start),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr { kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Ident(name) => format!("`{name}`"),
        TokenKind::Int(n) => format!("`{n}`"),
        TokenKind::Float(n) => format!("`{n}`"),
        TokenKind::Str(_) => "string literal".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Error => "unrecognized input".to_string(),
        other => format!("`{other:?}`"),
    }
}
