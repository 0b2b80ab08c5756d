//! Syntax tree for memscope scripts.
//!
//! The tree is deliberately mutable: the instrumentation pass rewrites
//! `items` (inserting imports, attaching annotations) before execution.
//! Every statement records its 1-based source line so runtime hooks can
//! report positions without re-scanning the source. Nodes synthesized by
//! rewriting carry [`Span::dummy`] spans and line 0.

use crate::span::Span;
use smol_str::SmolStr;
use std::fmt;

/// One parsed source unit, directly executable by the interpreter.
#[derive(Debug, Clone)]
pub struct Program {
    pub items: Vec<Item>,
}

/// A top-level element of a program.
#[derive(Debug, Clone)]
pub enum Item {
    Use(UseDecl),
    Import(ImportDecl),
    Fn(FnDecl),
    Stmt(Stmt),
}

/// `use module.path.name [as alias];` — bind one member of a module.
#[derive(Debug, Clone)]
pub struct UseDecl {
    pub module: ModulePath,
    pub name: SmolStr,
    pub alias: Option<SmolStr>,
    pub span: Span,
}

/// `import module.path;` — bind the module itself under its last segment.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub module: ModulePath,
    pub span: Span,
}

/// Dot-separated module path, e.g. `util.math`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModulePath {
    pub segments: Vec<SmolStr>,
}

impl ModulePath {
    pub fn new(segments: Vec<SmolStr>) -> Self {
        Self { segments }
    }

    pub fn from_dotted(path: &str) -> Self {
        Self { segments: path.split('.').map(SmolStr::new).collect() }
    }

    /// Last segment; the default binding name for `import`.
    pub fn leaf(&self) -> &SmolStr {
        self.segments.last().expect("module path has at least one segment")
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// A function declaration, top-level or nested.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    /// Applied bottom-up at definition time: the annotation written
    /// closest to `fn` wraps first.
    pub annotations: Vec<Annotation>,
    pub body: Block,
    pub is_async: bool,
    /// 1-based line of the `fn` keyword; 0 for synthesized declarations.
    pub line: u32,
    pub span: Span,
}

/// `@name` attached to a function declaration.
#[derive(Debug, Clone)]
pub struct Annotation {
    pub name: SmolStr,
    pub span: Span,
}

impl Annotation {
    /// Annotation attached during rewriting rather than written in source.
    pub fn synthesized(name: &str) -> Self {
        Self { name: SmolStr::new(name), span: Span::dummy() }
    }
}

/// A braced statement sequence.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

/// A statement with position metadata.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    /// 1-based source line; 0 for synthesized statements.
    pub line: u32,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Let { name: SmolStr, value: Expr },
    Assign { target: AssignTarget, value: Expr },
    If { cond: Expr, then_block: Block, else_block: Option<Block> },
    While { cond: Expr, body: Block },
    For { var: SmolStr, iter: Expr, body: Block },
    Return(Option<Expr>),
    Break,
    Continue,
    /// Nested function declaration; visible in the enclosing scope.
    Fn(FnDecl),
    Expr(Expr),
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(SmolStr),
    Index { target: Expr, index: Expr },
}

/// An expression with its source span.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(SmolStr),
    Ident(SmolStr),
    Array(Vec<Expr>),
    Field { target: Box<Expr>, name: SmolStr },
    Index { target: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Source spelling, as written between operands.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
