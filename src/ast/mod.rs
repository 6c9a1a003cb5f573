//! Syntax tree consumed by the executor
//!
//! Nodes are arena-allocated (`bumpalo`) and referenced by `&'ast` pointers,
//! so a whole program is freed at once when its arena is dropped. Nothing in
//! this crate parses source text; a front end (or [`builder::AstBuilder`])
//! produces these nodes.
//!
//! Names are raw bytes without the `$` sigil.

use crate::core::value::Visibility;
use serde::Serialize;

pub mod builder;

pub type ExprId<'ast> = &'ast Expr<'ast>;
pub type StmtId<'ast> = &'ast Stmt<'ast>;

/// Source location of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
}

#[derive(Debug, Serialize)]
pub struct Program<'ast> {
    pub statements: &'ast [StmtId<'ast>],
    pub span: Span,
}

#[derive(Debug, Serialize)]
pub enum Stmt<'ast> {
    Echo {
        exprs: &'ast [ExprId<'ast>],
        span: Span,
    },
    Expression {
        expr: ExprId<'ast>,
        span: Span,
    },
    Return {
        expr: Option<ExprId<'ast>>,
        span: Span,
    },
    If {
        condition: ExprId<'ast>,
        then_block: &'ast [StmtId<'ast>],
        else_block: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    While {
        condition: ExprId<'ast>,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    DoWhile {
        body: &'ast [StmtId<'ast>],
        condition: ExprId<'ast>,
        span: Span,
    },
    For {
        init: &'ast [ExprId<'ast>],
        condition: &'ast [ExprId<'ast>], // empty means always true; the last one decides
        loop_expr: &'ast [ExprId<'ast>],
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Foreach {
        expr: ExprId<'ast>,
        key_var: Option<ExprId<'ast>>,
        value_var: ExprId<'ast>,
        by_ref: bool,
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Block {
        statements: &'ast [StmtId<'ast>],
        span: Span,
    },
    Switch {
        condition: ExprId<'ast>,
        cases: &'ast [Case<'ast>],
        span: Span,
    },
    Break {
        level: u32,
        span: Span,
    },
    Continue {
        level: u32,
        span: Span,
    },
    Goto {
        label: &'ast [u8],
        span: Span,
    },
    Label {
        name: &'ast [u8],
        span: Span,
    },
    Try {
        body: &'ast [StmtId<'ast>],
        finally: Option<&'ast [StmtId<'ast>]>,
        span: Span,
    },
    Const {
        consts: &'ast [ConstItem<'ast>],
        span: Span,
    },
    Global {
        vars: &'ast [&'ast [u8]],
        span: Span,
    },
    Static {
        vars: &'ast [StaticVar<'ast>],
        span: Span,
    },
    Unset {
        vars: &'ast [ExprId<'ast>],
        span: Span,
    },
    InlineHtml {
        value: &'ast [u8],
        span: Span,
    },
    Function {
        decl: &'ast FunctionDecl<'ast>,
        span: Span,
    },
    Class {
        decl: &'ast ClassDecl<'ast>,
        span: Span,
    },
    HaltCompiler {
        span: Span,
    },
    Nop {
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Case<'ast> {
    pub condition: Option<ExprId<'ast>>, // None for default
    pub body: &'ast [StmtId<'ast>],
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConstItem<'ast> {
    pub name: &'ast [u8],
    pub value: ExprId<'ast>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StaticVar<'ast> {
    pub name: &'ast [u8],
    pub default: Option<ExprId<'ast>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Param<'ast> {
    pub name: &'ast [u8],
    pub default: Option<ExprId<'ast>>,
    pub by_ref: bool,
}

#[derive(Debug, Serialize)]
pub struct FunctionDecl<'ast> {
    pub name: &'ast [u8],
    pub params: &'ast [Param<'ast>],
    pub body: &'ast [StmtId<'ast>],
    pub by_ref: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClassModifiers {
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_interface: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassDecl<'ast> {
    pub name: &'ast [u8],
    pub parent: Option<&'ast [u8]>,
    pub modifiers: ClassModifiers,
    pub members: &'ast [ClassMember<'ast>],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ClassMember<'ast> {
    Property {
        name: &'ast [u8],
        default: Option<ExprId<'ast>>,
        visibility: Visibility,
        is_static: bool,
        is_readonly: bool,
    },
    Method {
        name: &'ast [u8],
        params: &'ast [Param<'ast>],
        body: &'ast [StmtId<'ast>],
        visibility: Visibility,
        is_static: bool,
    },
    Const {
        name: &'ast [u8],
        value: ExprId<'ast>,
        visibility: Visibility,
    },
}

#[derive(Debug, Serialize)]
pub enum Expr<'ast> {
    Null {
        span: Span,
    },
    Boolean {
        value: bool,
        span: Span,
    },
    Integer {
        value: i64,
        span: Span,
    },
    Float {
        value: f64,
        span: Span,
    },
    String {
        value: &'ast [u8],
        span: Span,
    },
    Array {
        items: &'ast [ArrayItem<'ast>],
        span: Span,
    },
    Variable {
        name: &'ast [u8],
        span: Span,
    },
    ArrayDimFetch {
        array: ExprId<'ast>,
        dim: Option<ExprId<'ast>>, // None for $a[]
        span: Span,
    },
    PropertyFetch {
        target: ExprId<'ast>,
        property: &'ast [u8],
        span: Span,
    },
    StaticPropertyFetch {
        class: ClassRef<'ast>,
        property: &'ast [u8],
        span: Span,
    },
    ClassConstFetch {
        class: ClassRef<'ast>,
        constant: &'ast [u8],
        span: Span,
    },
    ConstFetch {
        name: &'ast [u8],
        span: Span,
    },
    Assign {
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
        span: Span,
    },
    AssignRef {
        var: ExprId<'ast>,
        expr: ExprId<'ast>,
        span: Span,
    },
    AssignOp {
        var: ExprId<'ast>,
        op: AssignOp,
        expr: ExprId<'ast>,
        span: Span,
    },
    Binary {
        left: ExprId<'ast>,
        op: BinaryOp,
        right: ExprId<'ast>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: ExprId<'ast>,
        span: Span,
    },
    IncDec {
        var: ExprId<'ast>,
        kind: IncDecKind,
        span: Span,
    },
    Cast {
        kind: CastKind,
        expr: ExprId<'ast>,
        span: Span,
    },
    Isset {
        vars: &'ast [ExprId<'ast>],
        span: Span,
    },
    Empty {
        expr: ExprId<'ast>,
        span: Span,
    },
    InstanceOf {
        expr: ExprId<'ast>,
        class: ClassRef<'ast>,
        span: Span,
    },
    Call {
        func: &'ast [u8],
        args: &'ast [ExprId<'ast>],
        span: Span,
    },
    MethodCall {
        target: ExprId<'ast>,
        method: &'ast [u8],
        args: &'ast [ExprId<'ast>],
        span: Span,
    },
    StaticCall {
        class: ClassRef<'ast>,
        method: &'ast [u8],
        args: &'ast [ExprId<'ast>],
        span: Span,
    },
    New {
        class: ClassRef<'ast>,
        args: &'ast [ExprId<'ast>],
        span: Span,
    },
    Clone {
        expr: ExprId<'ast>,
        span: Span,
    },
    Ternary {
        condition: ExprId<'ast>,
        if_true: Option<ExprId<'ast>>,
        if_false: ExprId<'ast>,
        span: Span,
    },
    List {
        items: &'ast [Option<ListItem<'ast>>],
        span: Span,
    },
    Print {
        expr: ExprId<'ast>,
        span: Span,
    },
    Throw {
        expr: ExprId<'ast>,
        span: Span,
    },
    Exit {
        expr: Option<ExprId<'ast>>,
        span: Span,
    },
    ErrorSuppress {
        expr: ExprId<'ast>,
        span: Span,
    },
    MagicConst {
        kind: MagicConstKind,
        span: Span,
    },
    Closure {
        params: &'ast [Param<'ast>],
        body: &'ast [StmtId<'ast>],
        span: Span,
    },
    Yield {
        value: Option<ExprId<'ast>>,
        span: Span,
    },
}

/// Class named in `new`, `::`, `instanceof`
#[derive(Debug, Clone, Copy, Serialize)]
pub enum ClassRef<'ast> {
    Named(&'ast [u8]),
    SelfRef,
    Parent,
    Static,
    Dynamic(ExprId<'ast>),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ArrayItem<'ast> {
    pub key: Option<ExprId<'ast>>,
    pub value: ExprId<'ast>,
    pub by_ref: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ListItem<'ast> {
    pub key: Option<ExprId<'ast>>,
    pub value: ExprId<'ast>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CastKind {
    Int,
    Bool,
    Float,
    String,
    Array,
    Object,
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncDecKind {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MagicConstKind {
    Line,
    Function,
    Class,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Pow,
    Concat, // .
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Spaceship,
    And,
    Or,
    LogicalXor,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Plus,       // +=
    Minus,      // -=
    Mul,        // *=
    Div,        // /=
    Mod,        // %=
    Pow,        // **=
    Concat,     // .=
    BitAnd,     // &=
    BitOr,      // |=
    BitXor,     // ^=
    ShiftLeft,  // <<=
    ShiftRight, // >>=
    Coalesce,   // ??=
}

impl AssignOp {
    /// Binary operator applied by a compound assignment (`??=` has none)
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Plus => BinaryOp::Plus,
            AssignOp::Minus => BinaryOp::Minus,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => BinaryOp::Mod,
            AssignOp::Pow => BinaryOp::Pow,
            AssignOp::Concat => BinaryOp::Concat,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::ShiftLeft => BinaryOp::ShiftLeft,
            AssignOp::ShiftRight => BinaryOp::ShiftRight,
            AssignOp::Coalesce => return None,
        })
    }
}

impl BinaryOp {
    /// Operator symbol as printed in "Unsupported operand types: array + int"
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Concat => ".",
            BinaryOp::EqEq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::EqEqEq => "===",
            BinaryOp::NotEqEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Spaceship => "<=>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::LogicalXor => "xor",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Coalesce => "??",
        }
    }
}

impl<'ast> Expr<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Expr::Null { span }
            | Expr::Boolean { span, .. }
            | Expr::Integer { span, .. }
            | Expr::Float { span, .. }
            | Expr::String { span, .. }
            | Expr::Array { span, .. }
            | Expr::Variable { span, .. }
            | Expr::ArrayDimFetch { span, .. }
            | Expr::PropertyFetch { span, .. }
            | Expr::StaticPropertyFetch { span, .. }
            | Expr::ClassConstFetch { span, .. }
            | Expr::ConstFetch { span, .. }
            | Expr::Assign { span, .. }
            | Expr::AssignRef { span, .. }
            | Expr::AssignOp { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::IncDec { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Isset { span, .. }
            | Expr::Empty { span, .. }
            | Expr::InstanceOf { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::StaticCall { span, .. }
            | Expr::New { span, .. }
            | Expr::Clone { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::List { span, .. }
            | Expr::Print { span, .. }
            | Expr::Throw { span, .. }
            | Expr::Exit { span, .. }
            | Expr::ErrorSuppress { span, .. }
            | Expr::MagicConst { span, .. }
            | Expr::Closure { span, .. }
            | Expr::Yield { span, .. } => *span,
        }
    }

    /// Whether this expression names a storage location (`$a`, `$a[1]`, `$o->p`, `A::$p`)
    pub fn is_place(&self) -> bool {
        matches!(
            self,
            Expr::Variable { .. }
                | Expr::ArrayDimFetch { .. }
                | Expr::PropertyFetch { .. }
                | Expr::StaticPropertyFetch { .. }
        )
    }
}

impl<'ast> Stmt<'ast> {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Echo { span, .. }
            | Stmt::Expression { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Foreach { span, .. }
            | Stmt::Block { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Break { span, .. }
            | Stmt::Continue { span, .. }
            | Stmt::Goto { span, .. }
            | Stmt::Label { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Const { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Static { span, .. }
            | Stmt::Unset { span, .. }
            | Stmt::InlineHtml { span, .. }
            | Stmt::Function { span, .. }
            | Stmt::Class { span, .. }
            | Stmt::HaltCompiler { span }
            | Stmt::Nop { span } => *span,
        }
    }
}
