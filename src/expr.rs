use std::rc::Rc;

use crate::{
    parser::Syntax,
    primitives::{BinaryOp, UnaryOp, VariadicOp},
};


/// The analyzed form of a program. Built once by the analyzer and never
/// changed afterwards; every node owns its children.
#[derive(Debug, Clone)]
pub enum Expr {
    Fixnum(i64),
    RationalNum(i64, i64),
    StringExpr(Rc<str>),
    True,
    False,
    MakeVoid,
    Exit,

    Var(String),

    // Primitive applications, specialized by argument count at analysis time
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Variadic(VariadicOp, Vec<Expr>),

    Begin(Vec<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Cond(Vec<Clause>),
    Lambda(Rc<Lambda>),
    Define(String, Box<Expr>),
    Let(Vec<Binding>, Box<Expr>),
    Letrec(Vec<Binding>, Box<Expr>),
    Set(String, Box<Expr>),
    Apply(Box<Expr>, Vec<Expr>),
    Quote(Syntax),
}

/// One `cond` clause. `else` has already been rewritten to a `#t` test.
#[derive(Debug, Clone)]
pub struct Clause {
    pub test: Expr,
    pub body: Vec<Expr>,
}

/// One `(name value)` pair of a `let` or `letrec`.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: Expr,
}

/// Parameter list and body shared by a `lambda` node and every procedure
/// value it produces.
#[derive(Debug, Clone)]
pub struct Lambda {
    pub parameters: Vec<String>,
    pub body: Expr,
}

impl Expr {
    pub(crate) fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::Unary(op, Box::new(operand))
    }

    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary(op, Box::new(left), Box::new(right))
    }

    pub(crate) fn var(name: &str) -> Self {
        Self::Var(name.to_owned())
    }

    pub(crate) fn lambda(parameters: Vec<String>, body: Expr) -> Self {
        Self::Lambda(Rc::new(Lambda { parameters, body }))
    }
}
