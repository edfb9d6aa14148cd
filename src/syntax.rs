//! Syntax module for the Python subset understood by the editor
//!
//! The parser turns source text into a [`Module`]: a closed tree of statement
//! and expression nodes, each carrying its byte span in the source. Every
//! statement form the grammar accepts has a variant here, whether or not the
//! block translator or the interpreter supports it; unsupported forms are
//! dropped or rejected downstream, never at parse time.

use serde::Serialize;

pub mod layout;
pub mod parser;

pub use parser::{parse, parse_str};

/// Represents a span in the source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

pub type StmtNode = Spanned<Stmt>;
pub type ExprNode = Spanned<Expr>;

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Module {
    pub body: Vec<StmtNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Expr(ExprNode),
    Assign {
        targets: Vec<ExprNode>,
        value: ExprNode,
    },
    AugAssign {
        target: ExprNode,
        op: BinOp,
        value: ExprNode,
    },
    AnnAssign {
        target: ExprNode,
        annotation: ExprNode,
        value: Option<ExprNode>,
    },
    /// `elif` chains are nested `If` statements in `orelse`.
    If {
        test: ExprNode,
        body: Vec<StmtNode>,
        orelse: Vec<StmtNode>,
    },
    While {
        test: ExprNode,
        body: Vec<StmtNode>,
        orelse: Vec<StmtNode>,
    },
    For {
        target: ExprNode,
        iter: ExprNode,
        body: Vec<StmtNode>,
        orelse: Vec<StmtNode>,
        is_async: bool,
    },
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<StmtNode>,
        decorators: Vec<ExprNode>,
        is_async: bool,
    },
    ClassDef {
        name: String,
        bases: Vec<ExprNode>,
        body: Vec<StmtNode>,
        decorators: Vec<ExprNode>,
    },
    Try {
        body: Vec<StmtNode>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<StmtNode>,
        finalbody: Vec<StmtNode>,
    },
    With {
        items: Vec<ExprNode>,
        body: Vec<StmtNode>,
        is_async: bool,
    },
    Return(Option<ExprNode>),
    Raise(Option<ExprNode>),
    Assert {
        test: ExprNode,
        msg: Option<ExprNode>,
    },
    Delete(Vec<ExprNode>),
    Global(Vec<String>),
    Import(Vec<String>),
    ImportFrom {
        module: String,
        names: Vec<String>,
    },
    Pass,
    Break,
    Continue,
}

impl Stmt {
    /// Python's name for the statement form, used in diagnostics.
    pub fn form_name(&self) -> &'static str {
        match self {
            Stmt::Expr(_) => "expression statement",
            Stmt::Assign { .. } => "assignment",
            Stmt::AugAssign { .. } => "augmented assignment",
            Stmt::AnnAssign { .. } => "annotated assignment",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::For { is_async: true, .. } => "async for",
            Stmt::For { .. } => "for",
            Stmt::FunctionDef { is_async: true, .. } => "async def",
            Stmt::FunctionDef { .. } => "def",
            Stmt::ClassDef { .. } => "class",
            Stmt::Try { .. } => "try",
            Stmt::With { is_async: true, .. } => "async with",
            Stmt::With { .. } => "with",
            Stmt::Return(_) => "return",
            Stmt::Raise(_) => "raise",
            Stmt::Assert { .. } => "assert",
            Stmt::Delete(_) => "del",
            Stmt::Global(_) => "global",
            Stmt::Import(_) => "import",
            Stmt::ImportFrom { .. } => "from-import",
            Stmt::Pass => "pass",
            Stmt::Break => "break",
            Stmt::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptHandler {
    pub kind: Option<ExprNode>,
    pub name: Option<String>,
    pub body: Vec<StmtNode>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Constant(Constant),
    Name(String),
    BinOp {
        left: Box<ExprNode>,
        op: BinOp,
        right: Box<ExprNode>,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<ExprNode>,
    },
    BoolOp {
        op: BoolOp,
        values: Vec<ExprNode>,
    },
    Compare {
        left: Box<ExprNode>,
        ops: Vec<CmpOp>,
        comparators: Vec<ExprNode>,
    },
    IfExp {
        test: Box<ExprNode>,
        body: Box<ExprNode>,
        orelse: Box<ExprNode>,
    },
    Call {
        func: Box<ExprNode>,
        args: Vec<ExprNode>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<ExprNode>,
        attr: String,
    },
    Subscript {
        value: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    Slice {
        lower: Option<Box<ExprNode>>,
        upper: Option<Box<ExprNode>>,
        step: Option<Box<ExprNode>>,
    },
    Starred(Box<ExprNode>),
    Tuple(Vec<ExprNode>),
    List(Vec<ExprNode>),
    Set(Vec<ExprNode>),
    Dict(Vec<(ExprNode, ExprNode)>),
    Comprehension {
        kind: ComprehensionKind,
        element: Box<ExprNode>,
        clauses: Vec<ComprehensionClause>,
    },
    /// f-strings are kept as raw template text; nothing downstream evaluates them.
    FormattedString(String),
    Lambda {
        params: Vec<String>,
        body: Box<ExprNode>,
    },
    /// `target := value`
    NamedExpr {
        target: Box<ExprNode>,
        value: Box<ExprNode>,
    },
    Yield(Option<Box<ExprNode>>),
    YieldFrom(Box<ExprNode>),
    Await(Box<ExprNode>),
}

impl Expr {
    pub fn form_name(&self) -> &'static str {
        match self {
            Expr::Constant(_) => "literal",
            Expr::Name(_) => "name",
            Expr::BinOp { .. } => "binary operation",
            Expr::UnaryOp { .. } => "unary operation",
            Expr::BoolOp { .. } => "boolean operation",
            Expr::Compare { .. } => "comparison",
            Expr::IfExp { .. } => "conditional expression",
            Expr::Call { .. } => "call",
            Expr::Attribute { .. } => "attribute",
            Expr::Subscript { .. } => "subscript",
            Expr::Slice { .. } => "slice",
            Expr::Starred(_) => "starred expression",
            Expr::Tuple(_) => "tuple",
            Expr::List(_) => "list",
            Expr::Set(_) => "set",
            Expr::Dict(_) => "dict",
            Expr::Comprehension { .. } => "comprehension",
            Expr::FormattedString(_) => "f-string",
            Expr::Lambda { .. } => "lambda",
            Expr::NamedExpr { .. } => "assignment expression",
            Expr::Yield(_) => "yield",
            Expr::YieldFrom(_) => "yield from",
            Expr::Await(_) => "await",
        }
    }

    /// The identifier if this is a bare name reference.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    /// Imaginary part of a literal such as `3j`
    Imaginary(f64),
    Str(String),
    Bytes(Vec<u8>),
    Bool(bool),
    None,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    /// `None` for `**kwargs` unpacking
    pub arg: Option<String>,
    pub value: ExprNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComprehensionKind {
    List,
    Set,
    Generator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensionClause {
    pub target: ExprNode,
    pub iter: ExprNode,
    pub conditions: Vec<ExprNode>,
}
