//! Tokenizer for the submission language: numbers, strings, identifiers,
//! keywords, operators, with `//` and `/* */` comments skipped as trivia.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Ident(String),

    // Keywords
    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    Of,
    Break,
    Continue,
    True,
    False,
    Null,
    Undefined,
    Typeof,
    New,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Arrow,
    Question,

    // Operators
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    Lt,
    Gt,
    Le,
    Ge,
    AndAnd,
    OrOr,
    Not,
}

/// Token plus the 1-based source line it started on.
#[derive(Clone, Debug, PartialEq)]
pub struct SpannedTok {
    pub tok: Tok,
    pub line: usize,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("line {line}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize },
    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: usize },
    #[error("line {line}: unterminated block comment")]
    UnterminatedComment { line: usize },
    #[error("line {line}: malformed number literal")]
    BadNumber { line: usize },
}

/// Tokenize the whole source up front. The parser walks the resulting vec.
pub fn tokenize(source: &str) -> Result<Vec<SpannedTok>, LexError> {
    let mut lx = Lexer::new(source);
    let mut out = Vec::new();
    while let Some(t) = lx.next_token()? {
        out.push(t);
    }
    Ok(out)
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { chars: source.chars().peekable(), line: 1 }
    }

    pub fn next_token(&mut self) -> Result<Option<SpannedTok>, LexError> {
        self.skip_trivia()?;
        let line = self.line;
        let c = match self.chars.peek() {
            Some(c) => *c,
            None => return Ok(None),
        };
        let tok = if c.is_ascii_digit() {
            self.lex_number()?
        } else if c == '"' || c == '\'' {
            self.lex_string()?
        } else if is_ident_start(c) {
            self.lex_ident_or_keyword()
        } else {
            self.lex_operator()?
        };
        Ok(Some(SpannedTok { tok, line }))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn eat(&mut self, want: char) -> bool {
        if self.chars.peek() == Some(&want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    // Lookahead one more char to tell comments from division.
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            self.bump();
                            self.bump();
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            let start = self.line;
                            self.bump();
                            self.bump();
                            loop {
                                match self.bump() {
                                    Some('*') if self.eat('/') => break,
                                    Some(_) => {}
                                    None => {
                                        return Err(LexError::UnterminatedComment { line: start })
                                    }
                                }
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_number(&mut self) -> Result<Tok, LexError> {
        let line = self.line;
        let mut raw = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
            if let Some(c) = self.bump() {
                raw.push(c);
            }
        }
        // Fraction, only when a digit follows the dot ("1.toFixed" stays Num + Dot).
        if self.chars.peek() == Some(&'.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if matches!(ahead.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
                raw.push('.');
                while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                    if let Some(c) = self.bump() {
                        raw.push(c);
                    }
                }
            }
        }
        // Optional exponent.
        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            let mut ahead = self.chars.clone();
            ahead.next();
            let signed = matches!(ahead.peek(), Some('+') | Some('-'));
            if signed {
                ahead.next();
            }
            if matches!(ahead.peek(), Some(c) if c.is_ascii_digit()) {
                if let Some(c) = self.bump() {
                    raw.push(c);
                }
                if signed {
                    if let Some(c) = self.bump() {
                        raw.push(c);
                    }
                }
                while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                    if let Some(c) = self.bump() {
                        raw.push(c);
                    }
                }
            }
        }
        raw.parse::<f64>()
            .map(Tok::Num)
            .map_err(|_| LexError::BadNumber { line })
    }

    fn lex_string(&mut self) -> Result<Tok, LexError> {
        let start = self.line;
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(LexError::UnterminatedString { line: start }),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString { line: start }),
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    None => return Err(LexError::UnterminatedString { line: start }),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('\\') => out.push('\\'),
                    // Unknown escapes keep the escaped char itself.
                    Some(c) => out.push(c),
                },
                Some(c) => out.push(c),
            }
        }
        Ok(Tok::Str(out))
    }

    fn lex_ident_or_keyword(&mut self) -> Tok {
        let mut name = String::new();
        while matches!(self.chars.peek(), Some(&c) if is_ident_continue(c)) {
            if let Some(c) = self.bump() {
                name.push(c);
            }
        }
        match keyword(&name) {
            Some(t) => t,
            None => Tok::Ident(name),
        }
    }

    fn lex_operator(&mut self) -> Result<Tok, LexError> {
        let line = self.line;
        let c = match self.bump() {
            Some(c) => c,
            None => return Err(LexError::UnexpectedChar { ch: ' ', line }),
        };
        let tok = match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            ',' => Tok::Comma,
            ';' => Tok::Semi,
            ':' => Tok::Colon,
            '.' => Tok::Dot,
            '?' => Tok::Question,
            '=' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Tok::EqEqEq
                    } else {
                        Tok::EqEq
                    }
                } else if self.eat('>') {
                    Tok::Arrow
                } else {
                    Tok::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Tok::NotEqEq
                    } else {
                        Tok::NotEq
                    }
                } else {
                    Tok::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    Tok::Le
                } else {
                    Tok::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            '&' => {
                if self.eat('&') {
                    Tok::AndAnd
                } else {
                    return Err(LexError::UnexpectedChar { ch: '&', line });
                }
            }
            '|' => {
                if self.eat('|') {
                    Tok::OrOr
                } else {
                    return Err(LexError::UnexpectedChar { ch: '|', line });
                }
            }
            '+' => {
                if self.eat('+') {
                    Tok::PlusPlus
                } else if self.eat('=') {
                    Tok::PlusAssign
                } else {
                    Tok::Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    Tok::MinusMinus
                } else if self.eat('=') {
                    Tok::MinusAssign
                } else {
                    Tok::Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    Tok::StarAssign
                } else {
                    Tok::Star
                }
            }
            '/' => {
                if self.eat('=') {
                    Tok::SlashAssign
                } else {
                    Tok::Slash
                }
            }
            '%' => Tok::Percent,
            other => return Err(LexError::UnexpectedChar { ch: other, line }),
        };
        Ok(tok)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn keyword(name: &str) -> Option<Tok> {
    Some(match name {
        "let" => Tok::Let,
        "const" => Tok::Const,
        "var" => Tok::Var,
        "function" => Tok::Function,
        "return" => Tok::Return,
        "if" => Tok::If,
        "else" => Tok::Else,
        "while" => Tok::While,
        "for" => Tok::For,
        "of" => Tok::Of,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "true" => Tok::True,
        "false" => Tok::False,
        "null" => Tok::Null,
        "undefined" => Tok::Undefined,
        "typeof" => Tok::Typeof,
        "new" => Tok::New,
        _ => return None,
    })
}
