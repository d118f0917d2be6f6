//! The semantic analyzer and intermediate-code generator.
//!
//! Walks the AST once, in the same order the grammar's mid-rule actions
//! would fire during parsing, consulting the type compatibility matrix and
//! driving the virtual memory allocator to emit a flat [`Quad`] list. A
//! single `jump_stack` models the backpatching protocol for `if`/`while`;
//! expression operand/type stacks are implicit in the recursive descent of
//! [`IrGen::gen_expr`] rather than materialized, since the call stack
//! already enforces the same LIFO reduction order.

use std::fmt;

use crate::common::Id;
use crate::front::ast::{self, BOp, Expr, ReturnType, Stmt, TypeName};
use crate::middle::memory::{MemoryManager, Segment, VirtAddr};
use crate::middle::quad::{Arg, ConstTable, ConstValue, Op, Quad};
use crate::middle::symbols::{FunctionDirectory, VariableTable};
use crate::middle::types::{result_type, Operator, Type};
use crate::PatitoError;

#[derive(Debug, PartialEq)]
pub enum SemanticError {
    DuplicateDeclaration(Id),
    DuplicateFunction(Id),
    UndeclaredVariable(Id),
    UndeclaredFunction(Id),
    TypeMismatch { left: Type, op: &'static str, right: Type },
    NonBooleanCondition { found: Type },
    ArityMismatch { function: Id, expected: usize, found: usize },
    ParameterTypeMismatch { function: Id, index: usize, expected: Type, found: Type },
    VoidCallInExpression(Id),
    ReturnOutsideFunction,
    ReturnValueInVoid(Id),
    MissingReturnValue(Id),
    WrongReturnType { function: Id, expected: Type, found: Type },
    UnarySignOnNonNumeric(Type),
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticError::DuplicateDeclaration(name) => write!(f, "duplicate-declaration: '{name}' is already declared in this scope"),
            SemanticError::DuplicateFunction(name) => write!(f, "duplicate-function: '{name}' is already declared"),
            SemanticError::UndeclaredVariable(name) => write!(f, "undeclared-variable: '{name}'"),
            SemanticError::UndeclaredFunction(name) => write!(f, "undeclared-function: '{name}'"),
            SemanticError::TypeMismatch { left, op, right } => write!(f, "type-mismatch: {left} {op} {right}"),
            SemanticError::NonBooleanCondition { found } => write!(f, "non-boolean-condition: guard is {found}, not bool"),
            SemanticError::ArityMismatch { function, expected, found } => {
                write!(f, "arity-mismatch: '{function}' takes {expected} argument(s), found {found}")
            }
            SemanticError::ParameterTypeMismatch { function, index, expected, found } => {
                write!(f, "parameter-type-mismatch: '{function}' argument {index} expects {expected}, found {found}")
            }
            SemanticError::VoidCallInExpression(name) => write!(f, "void-call-in-expression: '{name}' returns void"),
            SemanticError::ReturnOutsideFunction => write!(f, "return-outside-function"),
            SemanticError::ReturnValueInVoid(name) => write!(f, "return-value-in-void: '{name}' is void"),
            SemanticError::MissingReturnValue(name) => write!(f, "missing-return-value: '{name}' must return a value"),
            SemanticError::WrongReturnType { function, expected, found } => {
                write!(f, "wrong-return-type: '{function}' expects {expected}, found {found}")
            }
            SemanticError::UnarySignOnNonNumeric(ty) => write!(f, "unary-sign-on-non-numeric: {ty}"),
        }
    }
}

impl std::error::Error for SemanticError {}

/// Everything the virtual machine needs: the quad list, interned constants,
/// the function directory (for parameter addresses and entry points), and
/// the global variable table (for diagnostics/dumps).
#[derive(Debug)]
pub struct CompiledUnit {
    pub quads: Vec<Quad>,
    pub consts: ConstTable,
    pub functions: FunctionDirectory,
    pub globals: VariableTable,
}

pub fn generate(program: &ast::Program) -> Result<CompiledUnit, PatitoError> {
    let mut g = IrGen::new();
    g.gen_program(program)?;
    Ok(CompiledUnit { quads: g.quads, consts: g.consts, functions: g.functions, globals: g.globals })
}

fn scalar_type(ty: TypeName) -> Type {
    match ty {
        TypeName::Integer => Type::Integer,
        TypeName::Float => Type::Float,
    }
}

struct IrGen {
    quads: Vec<Quad>,
    consts: ConstTable,
    functions: FunctionDirectory,
    globals: VariableTable,
    mem: MemoryManager,
    jump_stack: Vec<usize>,
    /// `None` while generating the global/main scope.
    current_function: Option<Id>,
}

impl IrGen {
    fn new() -> Self {
        IrGen {
            quads: Vec::new(),
            consts: ConstTable::new(),
            functions: FunctionDirectory::new(),
            globals: VariableTable::new(),
            mem: MemoryManager::new(),
            jump_stack: Vec::new(),
            current_function: None,
        }
    }

    fn emit(&mut self, op: Op, arg1: Arg, arg2: Arg, result: Arg) -> usize {
        self.quads.push(Quad { op, arg1, arg2, result });
        self.quads.len() - 1
    }

    fn next_index(&self) -> usize {
        self.quads.len()
    }

    fn backpatch(&mut self, quad_index: usize, target: usize) {
        self.quads[quad_index].result = Arg::Imm(target as i64);
    }

    fn intern_const(&mut self, ty: Type, value: ConstValue) -> Result<VirtAddr, PatitoError> {
        if let Some(addr) = self.consts.lookup(ty, &value) {
            return Ok(addr);
        }
        let addr = self.mem.allocate(Segment::Const, ty)?;
        self.consts.insert(ty, value, addr);
        Ok(addr)
    }

    /// Current-function-then-global scope chain.
    fn lookup_variable(&self, name: Id) -> Option<(VirtAddr, Type)> {
        if let Some(fname) = self.current_function {
            if let Some(frec) = self.functions.get(fname) {
                if let Some(v) = frec.locals.lookup(name) {
                    return Some((v.address, v.ty));
                }
            }
        }
        self.globals.lookup(name).map(|v| (v.address, v.ty))
    }

    // ---- program / function skeletons ----------------------------------

    fn gen_program(&mut self, program: &ast::Program) -> Result<(), PatitoError> {
        let goto_main = self.emit(Op::Goto, Arg::None, Arg::None, Arg::None);

        for decl in &program.globals {
            self.declare_global(decl)?;
        }

        for f in &program.functions {
            self.gen_func_def(f)?;
        }

        let main_start = self.next_index();
        self.backpatch(goto_main, main_start);

        self.current_function = None;
        for stmt in &program.body {
            self.gen_stmt(stmt)?;
        }
        self.emit(Op::End, Arg::None, Arg::None, Arg::None);
        Ok(())
    }

    fn declare_global(&mut self, decl: &ast::VarDecl) -> Result<(), PatitoError> {
        let ty = scalar_type(decl.ty);
        for &name in &decl.names {
            let addr = self.mem.allocate(Segment::Global, ty)?;
            self.globals.add(name, ty, addr, false).map_err(SemanticError::DuplicateDeclaration)?;
        }
        Ok(())
    }

    fn gen_func_def(&mut self, f: &ast::FuncDef) -> Result<(), PatitoError> {
        self.mem.reset_locals();
        self.mem.reset_temps();

        let entry = self.next_index();
        self.functions.add(f.name, f.return_type, entry).map_err(SemanticError::DuplicateFunction)?;
        self.current_function = Some(f.name);

        for p in &f.params {
            let ty = scalar_type(p.ty);
            let addr = self.mem.allocate(Segment::Local, ty)?;
            let frec = self.functions.get_mut(f.name).expect("just inserted");
            frec.locals.add(p.name, ty, addr, true).map_err(SemanticError::DuplicateDeclaration)?;
            frec.parameters.push((p.name, ty, addr));
        }

        for decl in &f.locals {
            let ty = scalar_type(decl.ty);
            for &name in &decl.names {
                let addr = self.mem.allocate(Segment::Local, ty)?;
                let frec = self.functions.get_mut(f.name).expect("just inserted");
                frec.locals.add(name, ty, addr, false).map_err(SemanticError::DuplicateDeclaration)?;
            }
        }

        for stmt in &f.body {
            self.gen_stmt(stmt)?;
        }

        let locals_usage = self.mem.usage(Segment::Local);
        let temps_usage = self.mem.usage(Segment::Temp);
        let frec = self.functions.get_mut(f.name).expect("just inserted");
        frec.locals_size = locals_usage;
        frec.temps_size = temps_usage;

        self.emit(Op::EndFunc, Arg::None, Arg::None, Arg::None);
        self.current_function = None;
        Ok(())
    }

    // ---- statements ------------------------------------------------------

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), PatitoError> {
        match stmt {
            Stmt::Assign { name, expr, .. } => {
                let (dst_addr, dst_ty) =
                    self.lookup_variable(*name).ok_or(SemanticError::UndeclaredVariable(*name))?;
                let (val_addr, val_ty) = self.gen_expr(expr)?;
                if result_type(dst_ty, Operator::Assign, val_ty) == Type::Error {
                    return Err(SemanticError::TypeMismatch { left: dst_ty, op: "=", right: val_ty }.into());
                }
                self.emit(Op::Assign, Arg::Addr(val_addr), Arg::None, Arg::Addr(dst_addr));
                Ok(())
            }
            Stmt::Write { items, .. } => {
                for item in items {
                    let addr = match item {
                        ast::WriteItem::Expr(e) => self.gen_expr(e)?.0,
                        ast::WriteItem::Str(s) => self.intern_const(Type::String, ConstValue::Str(s.clone()))?,
                    };
                    self.emit(Op::Print, Arg::Addr(addr), Arg::None, Arg::None);
                }
                Ok(())
            }
            Stmt::If { cond, then_block, else_block, .. } => {
                let (cond_addr, cond_ty) = self.gen_expr(cond)?;
                if cond_ty != Type::Bool {
                    return Err(SemanticError::NonBooleanCondition { found: cond_ty }.into());
                }
                let gotof = self.emit(Op::GotoF, Arg::Addr(cond_addr), Arg::None, Arg::None);
                self.jump_stack.push(gotof);

                for stmt in then_block {
                    self.gen_stmt(stmt)?;
                }

                if let Some(else_block) = else_block {
                    let goto_end = self.emit(Op::Goto, Arg::None, Arg::None, Arg::None);
                    let gotof = self.jump_stack.pop().expect("pushed above");
                    let else_start = self.next_index();
                    self.backpatch(gotof, else_start);
                    self.jump_stack.push(goto_end);

                    for stmt in else_block {
                        self.gen_stmt(stmt)?;
                    }

                    let goto_end = self.jump_stack.pop().expect("pushed above");
                    let after = self.next_index();
                    self.backpatch(goto_end, after);
                } else {
                    let gotof = self.jump_stack.pop().expect("pushed above");
                    let after = self.next_index();
                    self.backpatch(gotof, after);
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                let start = self.next_index();
                let (cond_addr, cond_ty) = self.gen_expr(cond)?;
                if cond_ty != Type::Bool {
                    return Err(SemanticError::NonBooleanCondition { found: cond_ty }.into());
                }
                let gotof = self.emit(Op::GotoF, Arg::Addr(cond_addr), Arg::None, Arg::None);
                self.jump_stack.push(gotof);

                for stmt in body {
                    self.gen_stmt(stmt)?;
                }

                self.emit(Op::Goto, Arg::None, Arg::None, Arg::Imm(start as i64));
                let gotof = self.jump_stack.pop().expect("pushed above");
                let after = self.next_index();
                self.backpatch(gotof, after);
                Ok(())
            }
            Stmt::Return { expr, .. } => self.gen_return(expr.as_ref()),
            Stmt::Call { name, args, .. } => {
                self.gen_call(*name, args)?;
                Ok(())
            }
        }
    }

    fn gen_return(&mut self, expr: Option<&Expr>) -> Result<(), PatitoError> {
        let fname = self.current_function.ok_or(SemanticError::ReturnOutsideFunction)?;
        let return_type = self.functions.get(fname).expect("current function is registered").return_type;
        match (return_type, expr) {
            (ReturnType::Void, None) => {
                self.emit(Op::Ret, Arg::None, Arg::None, Arg::None);
                Ok(())
            }
            (ReturnType::Void, Some(_)) => Err(SemanticError::ReturnValueInVoid(fname).into()),
            (ReturnType::Scalar(_), None) => Err(SemanticError::MissingReturnValue(fname).into()),
            (ReturnType::Scalar(ret_ty), Some(e)) => {
                let ret_ty = scalar_type(ret_ty);
                let (addr, ty) = self.gen_expr(e)?;
                if ty != ret_ty {
                    return Err(SemanticError::WrongReturnType { function: fname, expected: ret_ty, found: ty }.into());
                }
                self.emit(Op::Ret, Arg::Addr(addr), Arg::None, Arg::None);
                Ok(())
            }
        }
    }

    fn gen_call(&mut self, name: Id, args: &[Expr]) -> Result<Option<(VirtAddr, Type)>, PatitoError> {
        let frec = self.functions.get(name).ok_or(SemanticError::UndeclaredFunction(name))?;
        let expected = frec.parameters.len();
        if args.len() != expected {
            return Err(SemanticError::ArityMismatch { function: name, expected, found: args.len() }.into());
        }
        let size = frec.activation_size();
        let entry = frec.entry_quad;
        let return_type = frec.return_type;
        let params: Vec<(Type, VirtAddr)> = frec.parameters.iter().map(|&(_, ty, addr)| (ty, addr)).collect();

        self.emit(Op::Era, Arg::Imm(size as i64), Arg::None, Arg::Func(name));
        for (i, arg) in args.iter().enumerate() {
            let (addr, arg_ty) = self.gen_expr(arg)?;
            let (param_ty, _) = params[i];
            if result_type(param_ty, Operator::Assign, arg_ty) == Type::Error {
                return Err(SemanticError::ParameterTypeMismatch {
                    function: name,
                    index: i + 1,
                    expected: param_ty,
                    found: arg_ty,
                }
                .into());
            }
            self.emit(Op::Param, Arg::Addr(addr), Arg::None, Arg::Imm((i + 1) as i64));
        }
        self.emit(Op::Gosub, Arg::Func(name), Arg::None, Arg::Imm(entry as i64));

        match return_type {
            ReturnType::Void => Ok(None),
            ReturnType::Scalar(ty) => {
                let ty = scalar_type(ty);
                let temp = self.mem.allocate(Segment::Temp, ty)?;
                self.emit(Op::FetchRet, Arg::Func(name), Arg::None, Arg::Addr(temp));
                Ok(Some((temp, ty)))
            }
        }
    }

    // ---- expressions -------------------------------------------------

    fn gen_expr(&mut self, expr: &Expr) -> Result<(VirtAddr, Type), PatitoError> {
        match expr {
            Expr::IntLit(v) => {
                let addr = self.intern_const(Type::Integer, ConstValue::Int(*v))?;
                Ok((addr, Type::Integer))
            }
            Expr::FloatLit(v) => {
                let addr = self.intern_const(Type::Float, ConstValue::float(*v))?;
                Ok((addr, Type::Float))
            }
            Expr::Var(name, _line) => {
                self.lookup_variable(*name).ok_or_else(|| SemanticError::UndeclaredVariable(*name).into())
            }
            Expr::Negate(inner, _line) => {
                let (addr, ty) = self.gen_expr(inner)?;
                if !ty.is_numeric() {
                    return Err(SemanticError::UnarySignOnNonNumeric(ty).into());
                }
                let temp = self.mem.allocate(Segment::Temp, ty)?;
                self.emit(Op::UMinus, Arg::Addr(addr), Arg::None, Arg::Addr(temp));
                Ok((temp, ty))
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let (laddr, lty) = self.gen_expr(lhs)?;
                let (raddr, rty) = self.gen_expr(rhs)?;
                let operator = Operator::from(*op);
                let result = result_type(lty, operator, rty);
                if result == Type::Error {
                    return Err(SemanticError::TypeMismatch { left: lty, op: op.as_str(), right: rty }.into());
                }
                let temp = self.mem.allocate(Segment::Temp, result)?;
                let quad_op = match op {
                    BOp::Add => Op::Add,
                    BOp::Sub => Op::Sub,
                    BOp::Mul => Op::Mul,
                    BOp::Div => Op::Div,
                    BOp::Lt => Op::Lt,
                    BOp::Gt => Op::Gt,
                    BOp::Eq => Op::Eq,
                    BOp::Ne => Op::Ne,
                };
                self.emit(quad_op, Arg::Addr(laddr), Arg::Addr(raddr), Arg::Addr(temp));
                Ok((temp, result))
            }
            Expr::Call { name, args, .. } => match self.gen_call(*name, args)? {
                Some((addr, ty)) => Ok((addr, ty)),
                None => Err(SemanticError::VoidCallInExpression(*name).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;

    fn compile(src: &str) -> Result<CompiledUnit, PatitoError> {
        let program = parse(src)?;
        generate(&program)
    }

    #[test]
    fn arithmetic_precedence_emits_a_single_well_typed_temp_chain() {
        let unit = compile("program p; vars x: integer; begin x = 3 + 4 * 2; write(x); end").unwrap();
        assert!(unit.quads.iter().any(|q| q.op == Op::Mul));
        assert!(unit.quads.iter().any(|q| q.op == Op::Add));
        assert!(unit.quads.last().map(|q| q.op == Op::End).unwrap_or(false));
    }

    #[test]
    fn every_goto_and_gotof_is_backpatched_to_a_real_index() {
        let unit = compile(
            "program p; vars x: integer; begin if (x < 1) { x = 1; } else { x = 2; }; write(x); end",
        )
        .unwrap();
        for q in &unit.quads {
            if q.op == Op::Goto || q.op == Op::GotoF {
                match &q.result {
                    Arg::Imm(i) => assert!((*i as usize) < unit.quads.len()),
                    other => panic!("unfilled jump target: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn undeclared_variable_is_a_semantic_error() {
        let err = compile("program p; begin write(y); end").unwrap_err();
        assert!(matches!(err, PatitoError::Semantic(SemanticError::UndeclaredVariable(_))));
    }

    #[test]
    fn assigning_float_into_integer_is_a_type_mismatch() {
        let err = compile("program p; vars x: integer; begin x = 1.5; end").unwrap_err();
        assert!(matches!(err, PatitoError::Semantic(SemanticError::TypeMismatch { .. })));
    }

    #[test]
    fn non_bool_condition_is_rejected() {
        let err = compile("program p; vars x: integer; begin while (x + 1) do { x = 1; }; end").unwrap_err();
        assert!(matches!(err, PatitoError::Semantic(SemanticError::NonBooleanCondition { .. })));
    }

    #[test]
    fn calling_void_function_inside_an_expression_is_rejected() {
        let err = compile(
            "program p; void f() { { return; } }; vars x: integer; begin x = f(); end",
        )
        .unwrap_err();
        assert!(matches!(err, PatitoError::Semantic(SemanticError::VoidCallInExpression(_))));
    }

    #[test]
    fn recursive_call_sees_its_own_function_record() {
        let unit = compile(
            "program p; integer fact(n: integer) { { if (n < 1) { return 1; }; return n * fact(n - 1); } }; vars x: integer; begin x = fact(5); write(x); end",
        )
        .unwrap();
        assert!(unit.quads.iter().any(|q| matches!(&q.arg1, Arg::Func(name) if name.to_string() == "fact") && q.op == Op::Gosub));
    }
}
