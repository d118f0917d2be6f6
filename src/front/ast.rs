//! The abstract syntax tree for Patito.

use crate::common::Id;

#[derive(Debug)]
pub struct Program {
    pub name: Id,
    pub globals: Vec<VarDecl>,
    pub functions: Vec<FuncDef>,
    pub body: Block,
}

/// One `vars a, b, c : type;` group.
#[derive(Debug)]
pub struct VarDecl {
    pub names: Vec<Id>,
    pub ty: TypeName,
}

/// A declared scalar type, as written in source (`void` is only legal as a
/// function return type and is tracked separately via [`ReturnType`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Scalar(TypeName),
}

#[derive(Debug)]
pub struct Param {
    pub name: Id,
    pub ty: TypeName,
}

#[derive(Debug)]
pub struct FuncDef {
    pub name: Id,
    pub return_type: ReturnType,
    pub params: Vec<Param>,
    pub locals: Vec<VarDecl>,
    pub body: Block,
    pub line: usize,
}

pub type Block = Vec<Stmt>;

#[derive(Debug)]
pub enum Stmt {
    Assign {
        name: Id,
        expr: Expr,
        line: usize,
    },
    Write {
        items: Vec<WriteItem>,
        line: usize,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        line: usize,
    },
    While {
        cond: Expr,
        body: Block,
        line: usize,
    },
    Return {
        expr: Option<Expr>,
        line: usize,
    },
    Call {
        name: Id,
        args: Vec<Expr>,
        line: usize,
    },
}

#[derive(Debug)]
pub enum WriteItem {
    Expr(Expr),
    Str(String),
}

#[derive(Debug)]
pub enum Expr {
    Var(Id, usize),
    IntLit(i64),
    FloatLit(f64),
    Negate(Box<Expr>, usize),
    Binary {
        op: BOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: usize,
    },
    Call {
        name: Id,
        args: Vec<Expr>,
        line: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Eq,
    Ne,
}

impl BOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BOp::Add => "+",
            BOp::Sub => "-",
            BOp::Mul => "*",
            BOp::Div => "/",
            BOp::Lt => "<",
            BOp::Gt => ">",
            BOp::Eq => "==",
            BOp::Ne => "!=",
        }
    }
}
