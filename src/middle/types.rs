//! Scalar types and the type compatibility matrix (the "semantic cube").

use std::fmt;

use crate::front::ast::BOp;

/// The closed set of scalar types, plus the `Error` sentinel the matrix
/// returns for any invalid combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Type {
    Integer,
    Float,
    Bool,
    String,
    Error,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Integer => "integer",
            Type::Float => "float",
            Type::Bool => "bool",
            Type::String => "string",
            Type::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl Type {
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Integer | Type::Float)
    }
}

/// Operators the matrix is defined over: the four arithmetic operators, the
/// two relational operators, the two equality operators, and assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Eq,
    Ne,
    Assign,
}

impl From<BOp> for Operator {
    fn from(op: BOp) -> Self {
        match op {
            BOp::Add => Operator::Add,
            BOp::Sub => Operator::Sub,
            BOp::Mul => Operator::Mul,
            BOp::Div => Operator::Div,
            BOp::Lt => Operator::Lt,
            BOp::Gt => Operator::Gt,
            BOp::Eq => Operator::Eq,
            BOp::Ne => Operator::Ne,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Assign => "=",
        };
        write!(f, "{s}")
    }
}

/// The sole authority on type correctness: `(left, op, right) -> result`.
/// Everything else in the compiler consults this instead of hand-rolling
/// the rules it encodes.
pub fn result_type(left: Type, op: Operator, right: Type) -> Type {
    use Operator::*;
    use Type::*;

    match op {
        Add | Sub | Mul | Div => match (left, right) {
            (Integer, Integer) => Integer,
            (Integer, Float) | (Float, Integer) | (Float, Float) => Float,
            _ => Error,
        },
        Lt | Gt => match (left, right) {
            (Integer, Integer) | (Integer, Float) | (Float, Integer) | (Float, Float) => Bool,
            _ => Error,
        },
        Eq | Ne => match (left, right) {
            (Integer, Integer) | (Integer, Float) | (Float, Integer) | (Float, Float) => Bool,
            (Bool, Bool) => Bool,
            (String, String) => Bool,
            _ => Error,
        },
        Assign => match (left, right) {
            (Integer, Integer) => Integer,
            (Float, Float) => Float,
            // widening: a float destination may take an integer source.
            (Float, Integer) => Float,
            (Bool, Bool) => Bool,
            (String, String) => String,
            // integer <- float is rejected: narrowing is never implicit.
            _ => Error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Type::*;

    #[test]
    fn arithmetic_promotes_to_float_if_either_side_is_float() {
        assert_eq!(result_type(Integer, Operator::Add, Integer), Integer);
        assert_eq!(result_type(Integer, Operator::Add, Float), Float);
        assert_eq!(result_type(Float, Operator::Mul, Integer), Float);
    }

    #[test]
    fn relational_requires_numeric_operands() {
        assert_eq!(result_type(Integer, Operator::Lt, Float), Bool);
        assert_eq!(result_type(Bool, Operator::Lt, Bool), Error);
    }

    #[test]
    fn equality_allows_numeric_bool_or_string_pairs() {
        assert_eq!(result_type(Bool, Operator::Eq, Bool), Bool);
        assert_eq!(result_type(String, Operator::Ne, String), Bool);
        assert_eq!(result_type(String, Operator::Eq, Integer), Error);
    }

    #[test]
    fn assignment_allows_widening_but_not_narrowing() {
        assert_eq!(result_type(Float, Operator::Assign, Integer), Float);
        assert_eq!(result_type(Integer, Operator::Assign, Float), Error);
        assert_eq!(result_type(Integer, Operator::Assign, Integer), Integer);
    }
}
