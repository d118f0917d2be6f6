//! The stack-machine interpreter that executes a [`CompiledUnit`]'s quads.

use std::fmt;
use std::io::Write;

use crate::common::{Id, Map};
use crate::middle::irgen::CompiledUnit;
use crate::middle::memory::{MemoryManager, Segment, VirtAddr};
use crate::middle::quad::{Arg, ConstValue, Op, Quad};
use crate::middle::types::Type;

#[derive(Debug, PartialEq)]
pub enum RuntimeError {
    DivisionByZero,
    /// The instruction pointer ran past the end of the quad list without
    /// hitting `END`. The typed [`Op`] enum rules out a genuinely unknown
    /// mnemonic, so this is the closed-world stand-in for it.
    UnknownOpcode,
    ConstWriteRejected(VirtAddr),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DivisionByZero => write!(f, "division-by-zero"),
            RuntimeError::UnknownOpcode => write!(f, "unknown-opcode: instruction pointer left the program"),
            RuntimeError::ConstWriteRejected(addr) => write!(f, "write to read-only const address {addr}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    fn zero(ty: Type) -> Self {
        match ty {
            Type::Integer => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Bool => Value::Bool(false),
            Type::String => Value::Str(String::new()),
            Type::Error => unreachable!("the Error sentinel is never given an address"),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => *b as i64 as f64,
            Value::Str(_) => 0.0,
        }
    }

    fn is_falsy(&self) -> bool {
        match self {
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Bool(b) => !b,
            Value::Str(s) => s.is_empty(),
        }
    }
}

impl From<&ConstValue> for Value {
    fn from(c: &ConstValue) -> Self {
        match c {
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::Float(bits) => Value::Float(f64::from_bits(*bits)),
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => l.as_f64() == r.as_f64(),
        _ => false,
    }
}

/// One activation's local/temp memory, keyed by virtual address.
type Frame = Map<VirtAddr, Value>;

pub struct VirtualMachine<'a> {
    unit: &'a CompiledUnit,
    ip: usize,
    frames: Vec<Frame>,
    globals: Frame,
    consts: Frame,
    call_stack: Vec<(usize, Id)>,
    pending_params: Vec<Value>,
    last_return: Map<Id, Value>,
}

impl<'a> VirtualMachine<'a> {
    pub fn new(unit: &'a CompiledUnit) -> Self {
        let mut consts = Map::new();
        for (ty, value, addr) in unit.consts.iter() {
            let _ = ty;
            consts.insert(*addr, Value::from(value));
        }
        VirtualMachine {
            unit,
            ip: 0,
            frames: vec![Frame::new()],
            globals: Frame::new(),
            consts,
            call_stack: Vec::new(),
            pending_params: Vec::new(),
            last_return: Map::new(),
        }
    }

    fn load(&self, addr: VirtAddr) -> Value {
        match MemoryManager::segment_of(addr) {
            Some(Segment::Const) => self.consts.get(&addr).cloned().expect("consts are pre-populated"),
            Some(Segment::Global) => self
                .globals
                .get(&addr)
                .cloned()
                .unwrap_or_else(|| Value::zero(MemoryManager::type_of(addr).expect("routed address has a type"))),
            Some(Segment::Local) | Some(Segment::Temp) => self
                .frames
                .last()
                .expect("at least the base frame is always present")
                .get(&addr)
                .cloned()
                .unwrap_or_else(|| Value::zero(MemoryManager::type_of(addr).expect("routed address has a type"))),
            None => unreachable!("every address generated by the compiler falls in a known range"),
        }
    }

    fn store(&mut self, addr: VirtAddr, value: Value) -> Result<(), RuntimeError> {
        match MemoryManager::segment_of(addr) {
            Some(Segment::Const) => Err(RuntimeError::ConstWriteRejected(addr)),
            Some(Segment::Global) => {
                self.globals.insert(addr, value);
                Ok(())
            }
            Some(Segment::Local) | Some(Segment::Temp) => {
                self.frames.last_mut().expect("at least the base frame is always present").insert(addr, value);
                Ok(())
            }
            None => unreachable!("every address generated by the compiler falls in a known range"),
        }
    }

    fn addr(arg: &Arg) -> VirtAddr {
        match arg {
            Arg::Addr(a) => *a,
            other => panic!("expected an address argument, found {other:?}"),
        }
    }

    fn imm(arg: &Arg) -> i64 {
        match arg {
            Arg::Imm(i) => *i,
            other => panic!("expected an immediate argument, found {other:?}"),
        }
    }

    fn func(arg: &Arg) -> Id {
        match arg {
            Arg::Func(name) => *name,
            other => panic!("expected a function-name argument, found {other:?}"),
        }
    }

    pub fn run(&mut self, out: &mut impl Write) -> Result<(), RuntimeError> {
        loop {
            let quad = self.unit.quads.get(self.ip).cloned().ok_or(RuntimeError::UnknownOpcode)?;
            match quad.op {
                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.exec_arith(&quad)?;
                    self.ip += 1;
                }
                Op::Lt | Op::Gt | Op::Eq | Op::Ne => {
                    self.exec_compare(&quad);
                    self.ip += 1;
                }
                Op::UMinus => {
                    self.exec_uminus(&quad);
                    self.ip += 1;
                }
                Op::Assign => {
                    let val = self.load(Self::addr(&quad.arg1));
                    self.store(Self::addr(&quad.result), val)?;
                    self.ip += 1;
                }
                Op::Print => {
                    let val = self.load(Self::addr(&quad.arg1));
                    let _ = writeln!(out, "{val}");
                    self.ip += 1;
                }
                Op::Goto => {
                    self.ip = Self::imm(&quad.result) as usize;
                }
                Op::GotoF => {
                    let cond = self.load(Self::addr(&quad.arg1));
                    if cond.is_falsy() {
                        self.ip = Self::imm(&quad.result) as usize;
                    } else {
                        self.ip += 1;
                    }
                }
                Op::Era => {
                    self.pending_params.clear();
                    self.ip += 1;
                }
                Op::Param => {
                    let val = self.load(Self::addr(&quad.arg1));
                    self.pending_params.push(val);
                    self.ip += 1;
                }
                Op::Gosub => {
                    self.exec_gosub(&quad);
                }
                Op::Ret => {
                    self.exec_ret(&quad);
                }
                Op::FetchRet => {
                    let name = Self::func(&quad.arg1);
                    let dest = Self::addr(&quad.result);
                    let val = self
                        .last_return
                        .get(&name)
                        .cloned()
                        .unwrap_or_else(|| Value::zero(MemoryManager::type_of(dest).expect("fetch target has a type")));
                    self.store(dest, val)?;
                    self.ip += 1;
                }
                Op::EndFunc => {
                    if self.frames.len() > 1 {
                        self.frames.pop();
                    }
                    let (return_ip, _name) = self.call_stack.pop().expect("ENDFUNC without a matching GOSUB");
                    self.ip = return_ip;
                }
                Op::End => return Ok(()),
            }
        }
    }

    fn exec_arith(&mut self, quad: &Quad) -> Result<(), RuntimeError> {
        let l = self.load(Self::addr(&quad.arg1));
        let r = self.load(Self::addr(&quad.arg2));
        let dest = Self::addr(&quad.result);
        let result_ty = MemoryManager::type_of(dest).expect("arithmetic target has a type");
        let result = if result_ty == Type::Float {
            let (a, b) = (l.as_f64(), r.as_f64());
            match quad.op {
                Op::Add => Value::Float(a + b),
                Op::Sub => Value::Float(a - b),
                Op::Mul => Value::Float(a * b),
                Op::Div => {
                    if b == 0.0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Value::Float(a / b)
                }
                _ => unreachable!(),
            }
        } else {
            let (a, b) = (l.as_f64() as i64, r.as_f64() as i64);
            match quad.op {
                Op::Add => Value::Int(a + b),
                Op::Sub => Value::Int(a - b),
                Op::Mul => Value::Int(a * b),
                Op::Div => {
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Value::Int(a / b)
                }
                _ => unreachable!(),
            }
        };
        self.store(dest, result)
    }

    fn exec_compare(&mut self, quad: &Quad) {
        let l = self.load(Self::addr(&quad.arg1));
        let r = self.load(Self::addr(&quad.arg2));
        let dest = Self::addr(&quad.result);
        let result = match quad.op {
            Op::Lt => Value::Bool(l.as_f64() < r.as_f64()),
            Op::Gt => Value::Bool(l.as_f64() > r.as_f64()),
            Op::Eq => Value::Bool(values_equal(&l, &r)),
            Op::Ne => Value::Bool(!values_equal(&l, &r)),
            _ => unreachable!(),
        };
        self.store(dest, result).expect("comparison targets are never const");
    }

    fn exec_uminus(&mut self, quad: &Quad) {
        let v = self.load(Self::addr(&quad.arg1));
        let dest = Self::addr(&quad.result);
        let negated = match v {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            other => other,
        };
        self.store(dest, negated).expect("UMINUS targets are never const");
    }

    fn exec_gosub(&mut self, quad: &Quad) {
        let name = Self::func(&quad.arg1);
        let entry = Self::imm(&quad.result) as usize;
        self.call_stack.push((self.ip + 1, name));

        let frec = self.unit.functions.get(name).expect("call site targets a registered function");
        let mut frame = Frame::new();
        for (value, &(_, _, param_addr)) in self.pending_params.drain(..).zip(frec.parameters.iter()) {
            frame.insert(param_addr, value);
        }
        self.frames.push(frame);

        self.ip = entry;
    }

    fn exec_ret(&mut self, quad: &Quad) {
        if let Arg::Addr(addr) = quad.arg1 {
            let val = self.load(addr);
            if let Some((_, name)) = self.call_stack.last() {
                self.last_return.insert(*name, val);
            }
        }
        let mut j = self.ip + 1;
        while self.unit.quads[j].op != Op::EndFunc {
            j += 1;
        }
        self.ip = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_and_run;

    fn run(src: &str) -> String {
        let mut out = Vec::new();
        compile_and_run(src, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(run("program p; vars x: integer; begin x = 3 + 4 * 2; write(x); end"), "11\n");
    }

    #[test]
    fn while_loop_counts_up() {
        assert_eq!(
            run("program p; vars i: integer; begin i = 0; while (i < 3) do { write(i); i = i + 1; }; end"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn if_else_branches_on_condition() {
        assert_eq!(
            run("program p; vars x: integer; begin x = 2; if (x > 0) { write(\"pos\"); } else { write(\"neg\"); }; end"),
            "pos\n"
        );
    }

    #[test]
    fn recursive_fibonacci() {
        let src = "program p; \
             integer fib(n: integer) { { if (n < 2) { return n; }; return fib(n - 1) + fib(n - 2); } }; \
             vars x: integer; \
             begin x = fib(5); write(x); end";
        assert_eq!(run(src), "5\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let mut out = Vec::new();
        let err = compile_and_run("program p; vars x: integer; begin x = 1 / 0; end", &mut out).unwrap_err();
        assert!(matches!(err, crate::PatitoError::Runtime(RuntimeError::DivisionByZero)));
    }

    #[test]
    fn reading_an_uninitialized_global_yields_the_zero_value() {
        assert_eq!(run("program p; vars x: integer; begin write(x); end"), "0\n");
    }
}
