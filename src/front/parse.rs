//! The parser.
//!
//! Recursive-descent with one token of lookahead and precedence climbing for
//! binary expressions (relational/equality lowest, additive next,
//! multiplicative highest, unary minus tightest). The parser only builds the
//! AST; feeding it to `middle::irgen` is a separate pass, which keeps the
//! grammar (an external collaborator, per the module docs) testable apart
//! from the semantic-action layer.

use std::fmt::Debug;

use crate::common::Id;
use crate::error::PatitoError;

use super::ast::*;
use super::lex::*;

#[derive(derive_more::Display)]
#[display("{}", self.0)]
pub struct ParseError(String, Option<usize>);

impl ParseError {
    fn new(line: Option<usize>, message: impl Into<String>) -> Self {
        ParseError(message.into(), line)
    }

    pub fn line(&self) -> Option<usize> {
        self.1
    }
}

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ParseError {}

pub fn parse(input: &str) -> Result<Program, PatitoError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next()? {
        tokens.push(tok);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let program = parser.parse_program()?;
    Ok(program)
}

struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token<'src>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn current_line(&self) -> Option<usize> {
        self.peek().map(|t| t.line).or_else(|| self.tokens.last().map(|t| t.line))
    }

    fn bump(&mut self) -> Option<Token<'src>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(ParseError::new(
                Some(tok.line),
                format!("expected {kind}, found {} '{}'", tok.kind, tok.text),
            )),
            None => Err(ParseError::new(
                self.current_line(),
                format!("expected {kind}, found end of input"),
            )),
        }
    }

    fn expect_id(&mut self) -> Result<Id, ParseError> {
        let tok = self.expect(TokenKind::Id)?;
        Ok(Id::new(tok.text.to_string()))
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected_end(&self, what: &str) -> ParseError {
        ParseError::new(self.current_line(), format!("unexpected end of input, expected {what}"))
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        self.expect(TokenKind::Program)?;
        let name = self.expect_id()?;
        self.expect(TokenKind::Semicolon)?;

        let globals = self.parse_var_decls()?;

        let mut functions = Vec::new();
        while matches!(self.peek_kind(), Some(TokenKind::Void | TokenKind::Integer | TokenKind::FloatKw)) {
            functions.push(self.parse_func_def()?);
        }

        self.expect(TokenKind::Begin)?;
        let body = self.parse_main_body()?;
        self.expect(TokenKind::End)?;

        Ok(Program { name, globals, functions, body })
    }

    /// Zero or more `vars` groups: `vars a, b : type ; c : type ; ...`
    fn parse_var_decls(&mut self) -> Result<Vec<VarDecl>, ParseError> {
        let mut decls = Vec::new();
        if !self.eat(TokenKind::Vars) {
            return Ok(decls);
        }
        loop {
            let mut names = vec![self.expect_id()?];
            while self.eat(TokenKind::Comma) {
                names.push(self.expect_id()?);
            }
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Semicolon)?;
            decls.push(VarDecl { names, ty });
            if !self.at(TokenKind::Id) {
                break;
            }
        }
        Ok(decls)
    }

    fn parse_type(&mut self) -> Result<TypeName, ParseError> {
        if self.eat(TokenKind::Integer) {
            Ok(TypeName::Integer)
        } else if self.eat(TokenKind::FloatKw) {
            Ok(TypeName::Float)
        } else {
            Err(self.unexpected_end("a type"))
        }
    }

    fn parse_func_def(&mut self) -> Result<FuncDef, ParseError> {
        let line = self.current_line().unwrap_or(0);
        let return_type = if self.eat(TokenKind::Void) {
            ReturnType::Void
        } else {
            ReturnType::Scalar(self.parse_type()?)
        };
        let name = self.expect_id()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            params.push(self.parse_param()?);
            while self.eat(TokenKind::Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::LBrace)?;
        let locals = self.parse_var_decls()?;
        let body = self.parse_block()?;
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(FuncDef { name, return_type, params, locals, body, line })
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let name = self.expect_id()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(stmts)
    }

    /// The program's top-level body, delimited by `begin`/`end` themselves
    /// rather than a brace pair the way function/if/while blocks are.
    fn parse_main_body(&mut self) -> Result<Block, ParseError> {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::End) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.current_line().unwrap_or(0);
        match self.peek_kind() {
            Some(TokenKind::Write) => self.parse_write(line),
            Some(TokenKind::If) => self.parse_if(line),
            Some(TokenKind::While) => self.parse_while(line),
            Some(TokenKind::Return) => self.parse_return(line),
            Some(TokenKind::Id) => self.parse_assign_or_call(line),
            Some(_) => Err(self.peek_error("a statement")),
            None => Err(self.unexpected_end("a statement")),
        }
    }

    fn peek_error(&self, expected: &str) -> ParseError {
        let tok = self.peek().unwrap();
        ParseError::new(Some(tok.line), format!("expected {expected}, found {} '{}'", tok.kind, tok.text))
    }

    fn parse_assign_or_call(&mut self, line: usize) -> Result<Stmt, ParseError> {
        let name = self.expect_id()?;
        if self.at(TokenKind::LParen) {
            let args = self.parse_arg_list()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Stmt::Call { name, args, line })
        } else {
            self.expect(TokenKind::Assign)?;
            let expr = self.parse_expr()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Stmt::Assign { name, expr, line })
        }
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.eat(TokenKind::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_write(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Write)?;
        self.expect(TokenKind::LParen)?;
        let mut items = vec![self.parse_write_item()?];
        while self.eat(TokenKind::Comma) {
            items.push(self.parse_write_item()?);
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Write { items, line })
    }

    fn parse_write_item(&mut self) -> Result<WriteItem, ParseError> {
        if self.at(TokenKind::StrLit) {
            let tok = self.bump().unwrap();
            Ok(WriteItem::Str(unescape(tok.text)))
        } else {
            Ok(WriteItem::Expr(self.parse_expr()?))
        }
    }

    fn parse_if(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::If { cond, then_block, else_block, line })
    }

    fn parse_while(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_block()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::While { cond, body, line })
    }

    fn parse_return(&mut self, line: usize) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::Return)?;
        let expr = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Return { expr, line })
    }

    // expr ::= rel
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_rel()
    }

    // rel ::= add (op add)?   -- relational/equality operators don't chain
    fn parse_rel(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_add()?;
        let op = match self.peek_kind() {
            Some(TokenKind::Lt) => BOp::Lt,
            Some(TokenKind::Gt) => BOp::Gt,
            Some(TokenKind::EqEq) => BOp::Eq,
            Some(TokenKind::NotEq) => BOp::Ne,
            _ => return Ok(lhs),
        };
        let line = self.current_line().unwrap_or(0);
        self.bump();
        let rhs = self.parse_add()?;
        Ok(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line })
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BOp::Add,
                Some(TokenKind::Minus) => BOp::Sub,
                _ => return Ok(lhs),
            };
            let line = self.current_line().unwrap_or(0);
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BOp::Mul,
                Some(TokenKind::Slash) => BOp::Div,
                _ => return Ok(lhs),
            };
            let line = self.current_line().unwrap_or(0);
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Minus) {
            let line = self.current_line().unwrap_or(0);
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(operand), line));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().ok_or_else(|| self.unexpected_end("an expression"))?;
        match tok.kind {
            TokenKind::IntLit => {
                self.bump();
                let value: i64 = tok.text.parse().map_err(|_| {
                    ParseError::new(Some(tok.line), format!("invalid integer literal '{}'", tok.text))
                })?;
                Ok(Expr::IntLit(value))
            }
            TokenKind::FloatLit => {
                self.bump();
                let value: f64 = tok.text.parse().map_err(|_| {
                    ParseError::new(Some(tok.line), format!("invalid float literal '{}'", tok.text))
                })?;
                Ok(Expr::FloatLit(value))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Id => {
                let name = self.expect_id()?;
                if self.at(TokenKind::LParen) {
                    let args = self.parse_arg_list()?;
                    Ok(Expr::Call { name, args, line: tok.line })
                } else {
                    Ok(Expr::Var(name, tok.line))
                }
            }
            _ => Err(ParseError::new(
                Some(tok.line),
                format!("expected an expression, found {} '{}'", tok.kind, tok.text),
            )),
        }
    }
}
