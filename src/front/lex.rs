//! The lexer.
//!
//! A hand-rolled scanner over a fixed list of anchored regexes, tried in
//! order at the current position.  Two-character operators are listed before
//! their one-character prefixes so they win the match.  Patito has no
//! comments, so whitespace skipping only has to track newlines for line
//! numbers.

use derive_more::Display;
use regex::Regex;
use std::sync::OnceLock;

/// A single lexical token.  `text` is the raw source slice that produced it
/// (for `StrLit`, this includes the surrounding quotes; callers that need
/// the literal's value use [`unescape`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
#[display("kind: '{kind}', text: '{text}', line: {line}")]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: usize,
}

/// Token classes, covering keywords, operators, delimiters and the three
/// literal/identifier classes from the surface grammar.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display, Debug)]
pub enum TokenKind {
    #[display("id")]
    Id,
    #[display("int")]
    IntLit,
    #[display("float")]
    FloatLit,
    #[display("string")]
    StrLit,

    #[display("program")]
    Program,
    #[display("begin")]
    Begin,
    #[display("end")]
    End,
    #[display("vars")]
    Vars,
    #[display("integer")]
    Integer,
    #[display("float")]
    FloatKw,
    #[display("void")]
    Void,
    #[display("if")]
    If,
    #[display("else")]
    Else,
    #[display("while")]
    While,
    #[display("do")]
    Do,
    #[display("write")]
    Write,
    #[display("return")]
    Return,

    #[display("==")]
    EqEq,
    #[display("!=")]
    NotEq,
    #[display(">=")]
    GtEq,
    #[display("<=")]
    LtEq,
    #[display("=")]
    Assign,
    #[display(">")]
    Gt,
    #[display("<")]
    Lt,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,

    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display(",")]
    Comma,
    #[display(":")]
    Colon,
    #[display(";")]
    Semicolon,
}

fn keyword(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "program" => Program,
        "begin" => Begin,
        "end" => End,
        "vars" => Vars,
        "integer" => Integer,
        "float" => FloatKw,
        "void" => Void,
        "if" => If,
        "else" => Else,
        "while" => While,
        "do" => Do,
        "write" => Write,
        "return" => Return,
        _ => return None,
    })
}

#[derive(Debug, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub ch: char,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal character {:?}", self.ch)
    }
}

impl std::error::Error for LexError {}

/// Strip the surrounding quotes from a `StrLit` token's raw text and resolve
/// `\\` escapes, matching the scanner's "letrero" contract: the interior is
/// kept, quotes are stripped.
pub fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

static WHITESPACE: OnceLock<Regex> = OnceLock::new();
static FLOAT: OnceLock<Regex> = OnceLock::new();
static INT: OnceLock<Regex> = OnceLock::new();
static STRING: OnceLock<Regex> = OnceLock::new();
static IDENT: OnceLock<Regex> = OnceLock::new();

fn re<'a>(cell: &'a OnceLock<Regex>, pattern: &str) -> &'a Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    line: usize,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Has the lexer reached the end of input?
    pub fn end_of_input(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    // Skip whitespace; Patito has no comments.
    fn skip_whitespace(&mut self) {
        let ws = re(&WHITESPACE, r"\A[ \t\r\n\x0c\x0b]*");
        if let Some(m) = ws.find(self.rest()) {
            self.line += m.as_str().matches('\n').count();
            self.pos += m.end();
        }
    }

    fn match_literal(&self, lit: &str) -> bool {
        self.rest().starts_with(lit)
    }

    fn advance(&mut self, n: usize) -> &'input str {
        let text = &self.input[self.pos..self.pos + n];
        self.pos += n;
        text
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let line = self.line;

        // Float before int: digits alone are a valid prefix of a float
        // literal, so trying int first would strand the `.` as its own
        // token.
        if let Some(m) = re(&FLOAT, r"\A[0-9]+\.[0-9]+").find(self.rest()) {
            let text = self.advance(m.end());
            return Ok(Some(Token { kind: TokenKind::FloatLit, text, line }));
        }
        if let Some(m) = re(&INT, r"\A[0-9]+").find(self.rest()) {
            let text = self.advance(m.end());
            return Ok(Some(Token { kind: TokenKind::IntLit, text, line }));
        }
        if let Some(m) = re(&STRING, r#"\A"([^\\"\n]|\\.)*""#).find(self.rest()) {
            let text = self.advance(m.end());
            return Ok(Some(Token { kind: TokenKind::StrLit, text, line }));
        }
        if let Some(m) = re(&IDENT, r"\A[A-Za-z][A-Za-z0-9_]*").find(self.rest()) {
            let text = self.advance(m.end());
            let kind = keyword(text).unwrap_or(TokenKind::Id);
            return Ok(Some(Token { kind, text, line }));
        }

        const TWO_CHAR: &[(&str, TokenKind)] = &[
            ("==", TokenKind::EqEq),
            ("!=", TokenKind::NotEq),
            (">=", TokenKind::GtEq),
            ("<=", TokenKind::LtEq),
        ];
        for (lit, kind) in TWO_CHAR {
            if self.match_literal(lit) {
                let text = self.advance(lit.len());
                return Ok(Some(Token { kind: *kind, text, line }));
            }
        }

        const ONE_CHAR: &[(&str, TokenKind)] = &[
            ("=", TokenKind::Assign),
            (">", TokenKind::Gt),
            ("<", TokenKind::Lt),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            (",", TokenKind::Comma),
            (":", TokenKind::Colon),
            (";", TokenKind::Semicolon),
        ];
        for (lit, kind) in ONE_CHAR {
            if self.match_literal(lit) {
                let text = self.advance(lit.len());
                return Ok(Some(Token { kind: *kind, text, line }));
            }
        }

        let ch = self.rest().chars().next().unwrap();
        Err(LexError { line, ch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = vec![];
        while let Some(tok) = lexer.next().unwrap() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(kinds("program vars x integer"), vec![Program, Vars, Id, Integer]);
    }

    #[test]
    fn lexes_two_char_before_one_char_operators() {
        use TokenKind::*;
        assert_eq!(kinds("== != >= <= = > <"), vec![EqEq, NotEq, GtEq, LtEq, Assign, Gt, Lt]);
    }

    #[test]
    fn lexes_numeric_literals() {
        use TokenKind::*;
        assert_eq!(kinds("3 4.5 10"), vec![IntLit, FloatLit, IntLit]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let mut lexer = Lexer::new("x\ny\n\nz");
        let t1 = lexer.next().unwrap().unwrap();
        let t2 = lexer.next().unwrap().unwrap();
        let t3 = lexer.next().unwrap().unwrap();
        assert_eq!((t1.line, t2.line, t3.line), (1, 2, 4));
    }

    #[test]
    fn string_literal_keeps_escapes_for_unescape() {
        let mut lexer = Lexer::new(r#""hi \"there\"""#);
        let tok = lexer.next().unwrap().unwrap();
        assert_eq!(tok.kind, TokenKind::StrLit);
        assert_eq!(unescape(tok.text), "hi \"there\"");
    }

    #[test]
    fn illegal_character_is_reported_with_line() {
        let mut lexer = Lexer::new("@");
        let err = lexer.next().unwrap_err();
        assert_eq!(err, LexError { line: 1, ch: '@' });
    }
}
