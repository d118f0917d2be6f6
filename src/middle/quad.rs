//! Quadruples: the linear three-address IR the generator emits and the VM
//! executes.

use std::fmt;

use crate::common::Id;
use crate::middle::memory::VirtAddr;
use crate::middle::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Eq,
    Ne,
    UMinus,
    Assign,
    Print,
    Goto,
    GotoF,
    Era,
    Param,
    Gosub,
    Ret,
    FetchRet,
    EndFunc,
    End,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::UMinus => "UMINUS",
            Op::Assign => "=",
            Op::Print => "PRINT",
            Op::Goto => "GOTO",
            Op::GotoF => "GOTOF",
            Op::Era => "ERA",
            Op::Param => "PARAM",
            Op::Gosub => "GOSUB",
            Op::Ret => "RET",
            Op::FetchRet => "FETCH_RET",
            Op::EndFunc => "ENDFUNC",
            Op::End => "END",
        };
        write!(f, "{s}")
    }
}

/// One field of a [`Quad`]: absent, a virtual address, an immediate integer
/// (jump target or activation size), or a function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    None,
    Addr(VirtAddr),
    Imm(i64),
    Func(Id),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::None => write!(f, "_"),
            Arg::Addr(a) => write!(f, "{a}"),
            Arg::Imm(i) => write!(f, "{i}"),
            Arg::Func(name) => write!(f, "{name}"),
        }
    }
}

/// `(op, arg1, arg2, result)`. The list is 0-indexed; indices are stable
/// once assigned and are used as jump targets.
#[derive(Debug, Clone)]
pub struct Quad {
    pub op: Op,
    pub arg1: Arg,
    pub arg2: Arg,
    pub result: Arg,
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.op, self.arg1, self.arg2, self.result)
    }
}

/// Interns `(type, literal value)` pairs to `CONST`-segment addresses.
/// Requesting an already-seen pair returns the prior address.
#[derive(Debug, Default)]
pub struct ConstTable {
    entries: Vec<(Type, ConstValue, VirtAddr)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    /// Compared bitwise, since Patito floats have no NaN-bearing syntax and
    /// bitwise equality is exactly "the same literal was written twice".
    Float(u64),
    Bool(bool),
    Str(String),
}

impl ConstValue {
    pub fn float(v: f64) -> Self {
        ConstValue::Float(v.to_bits())
    }
}

impl ConstTable {
    pub fn new() -> Self {
        ConstTable { entries: Vec::new() }
    }

    /// An already-interned constant's address, if this exact `(type, value)`
    /// pair has been seen before.
    pub fn lookup(&self, ty: Type, value: &ConstValue) -> Option<VirtAddr> {
        self.entries.iter().find(|(t, v, _)| *t == ty && v == value).map(|(_, _, addr)| *addr)
    }

    /// Record a freshly allocated constant. Callers must check [`lookup`]
    /// first; this does not itself check for duplicates.
    ///
    /// [`lookup`]: ConstTable::lookup
    pub fn insert(&mut self, ty: Type, value: ConstValue, addr: VirtAddr) {
        self.entries.push((ty, value, addr));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Type, ConstValue, VirtAddr)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_value_twice_returns_the_same_address() {
        let mut table = ConstTable::new();
        assert_eq!(table.lookup(Type::Integer, &ConstValue::Int(7)), None);
        table.insert(Type::Integer, ConstValue::Int(7), 40_000);
        assert_eq!(table.lookup(Type::Integer, &ConstValue::Int(7)), Some(40_000));
        assert_eq!(table.lookup(Type::Integer, &ConstValue::Int(8)), None);
    }
}
