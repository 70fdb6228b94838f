//! Statement and expression parser producing the AST walked by `interp`.
//!
//! Supported statements: let/const/var (multiple declarators), function
//! declarations, return, if/else, while, classic for, for-of, break/continue,
//! blocks, expression statements. Semicolons are optional separators.
//!
//! Expressions use precedence climbing: assignment (incl. compound), ternary,
//! `||`, `&&`, equality, relational, additive, multiplicative, unary
//! (`!` `-` `typeof` and prefix `++`/`--`), then postfix member/index/call and
//! postfix `++`/`--`. Arrow functions and anonymous `function` expressions are
//! first-class.

use thiserror::Error;

use super::lexer::{tokenize, LexError, SpannedTok, Tok};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Typeof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Cond { cond: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    /// `op` is None for plain `=`, or the arithmetic op of a compound assignment.
    Assign { target: Box<Expr>, op: Option<BinaryOp>, value: Box<Expr> },
    Update { target: Box<Expr>, increment: bool, prefix: bool },
    Member { object: Box<Expr>, property: String },
    Index { object: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Function expression or arrow function; arrow expression bodies are
    /// normalized to a single `return` statement.
    Function { name: Option<String>, params: Vec<String>, body: Vec<Stmt> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    VarDecl { decls: Vec<Declarator> },
    FunctionDecl { name: String, params: Vec<String>, body: Vec<Stmt> },
    Return(Option<Expr>),
    If { cond: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>> },
    While { cond: Expr, body: Vec<Stmt> },
    For { init: Option<Box<Stmt>>, cond: Option<Expr>, step: Option<Expr>, body: Vec<Stmt> },
    ForOf { name: String, iterable: Expr, body: Vec<Stmt> },
    Break,
    Continue,
    Block(Vec<Stmt>),
    Expr(Expr),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("line {line}: unexpected {found}, expected {expected}")]
    Unexpected { found: String, expected: String, line: usize },
    #[error("unexpected end of input, expected {expected}")]
    Eof { expected: String },
    #[error("line {line}: invalid assignment target")]
    BadAssignTarget { line: usize },
    #[error("line {line}: the 'new' operator is not supported in this environment")]
    NewUnsupported { line: usize },
    #[error("line {line}: nesting is too deep")]
    TooDeep { line: usize },
}

/// Caps statement and expression nesting. The parser recurses per level, so
/// without a cap a pathological input like ten thousand opening parens would
/// blow the native stack.
const MAX_NEST_DEPTH: usize = 200;

/// Parse a full program (top-level statement list).
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let toks = tokenize(source)?;
    let mut p = Parser { toks, pos: 0, depth: 0 };
    let mut stmts = Vec::new();
    while p.peek().is_some() {
        stmts.push(p.parse_stmt()?);
    }
    Ok(stmts)
}

struct Parser {
    toks: Vec<SpannedTok>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|s| &s.tok)
    }

    fn peek_at(&self, n: usize) -> Option<&Tok> {
        self.toks.get(self.pos + n).map(|s| &s.tok)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<&Tok> {
        let t = self.toks.get(self.pos).map(|s| &s.tok);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: &Tok, expected: &str) -> Result<(), ParseError> {
        if self.eat(want) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.toks.get(self.pos) {
            Some(st) => ParseError::Unexpected {
                found: describe(&st.tok),
                expected: expected.to_string(),
                line: st.line,
            },
            None => ParseError::Eof { expected: expected.to_string() },
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_NEST_DEPTH {
            return Err(ParseError::TooDeep { line: self.line() });
        }
        Ok(())
    }

    // ----- statements -----

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.enter()?;
        let stmt = self.parse_stmt_inner();
        self.depth -= 1;
        stmt
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Tok::Let) | Some(Tok::Const) | Some(Tok::Var) => {
                let decl = self.parse_var_decl_core()?;
                self.eat(&Tok::Semi);
                Ok(decl)
            }
            Some(Tok::Function) => self.parse_function_decl(),
            Some(Tok::Return) => {
                self.pos += 1;
                let value = if self.stmt_ended() { None } else { Some(self.parse_expr()?) };
                self.eat(&Tok::Semi);
                Ok(Stmt::Return(value))
            }
            Some(Tok::If) => self.parse_if(),
            Some(Tok::While) => self.parse_while(),
            Some(Tok::For) => self.parse_for(),
            Some(Tok::Break) => {
                self.pos += 1;
                self.eat(&Tok::Semi);
                Ok(Stmt::Break)
            }
            Some(Tok::Continue) => {
                self.pos += 1;
                self.eat(&Tok::Semi);
                Ok(Stmt::Continue)
            }
            Some(Tok::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Tok::Semi) => {
                self.pos += 1;
                Ok(Stmt::Block(Vec::new()))
            }
            Some(_) => {
                let e = self.parse_expr()?;
                self.eat(&Tok::Semi);
                Ok(Stmt::Expr(e))
            }
            None => Err(self.unexpected("a statement")),
        }
    }

    fn stmt_ended(&self) -> bool {
        matches!(self.peek(), None | Some(Tok::Semi) | Some(Tok::RBrace))
    }

    fn parse_var_decl_core(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // let / const / var
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident("a variable name")?;
            let init = if self.eat(&Tok::Assign) { Some(self.parse_expr()?) } else { None };
            decls.push(Declarator { name, init });
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(Stmt::VarDecl { decls })
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // function
        let name = self.expect_ident("a function name")?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDecl { name, params, body })
    }

    fn parse_params(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.expect_ident("a parameter name")?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(&Tok::RParen, "')'")?;
            return Ok(params);
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Tok::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.eat(&Tok::RBrace) {
            if self.peek().is_none() {
                return Err(ParseError::Eof { expected: "'}'".to_string() });
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    fn parse_block_or_single(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if matches!(self.peek(), Some(Tok::LBrace)) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // if
        self.expect(&Tok::LParen, "'(' after if")?;
        let cond = self.parse_expr()?;
        self.expect(&Tok::RParen, "')'")?;
        let then = self.parse_block_or_single()?;
        let otherwise = if self.eat(&Tok::Else) {
            Some(self.parse_block_or_single()?)
        } else {
            None
        };
        Ok(Stmt::If { cond, then, otherwise })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // while
        self.expect(&Tok::LParen, "'(' after while")?;
        let cond = self.parse_expr()?;
        self.expect(&Tok::RParen, "')'")?;
        let body = self.parse_block_or_single()?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1; // for
        self.expect(&Tok::LParen, "'(' after for")?;

        // for (let x of xs) / for (x of xs)
        let declared_of = matches!(self.peek(), Some(Tok::Let) | Some(Tok::Const) | Some(Tok::Var))
            && matches!(self.peek_at(2), Some(Tok::Of));
        let plain_of =
            matches!(self.peek(), Some(Tok::Ident(_))) && matches!(self.peek_at(1), Some(Tok::Of));
        if declared_of || plain_of {
            if declared_of {
                self.pos += 1;
            }
            let name = self.expect_ident("a loop variable")?;
            self.expect(&Tok::Of, "'of'")?;
            let iterable = self.parse_expr()?;
            self.expect(&Tok::RParen, "')'")?;
            let body = self.parse_block_or_single()?;
            return Ok(Stmt::ForOf { name, iterable, body });
        }

        let init = if self.eat(&Tok::Semi) {
            None
        } else {
            let stmt = if matches!(self.peek(), Some(Tok::Let) | Some(Tok::Const) | Some(Tok::Var)) {
                self.parse_var_decl_core()?
            } else {
                Stmt::Expr(self.parse_expr()?)
            };
            self.expect(&Tok::Semi, "';' after for-loop initializer")?;
            Some(Box::new(stmt))
        };
        let cond = if matches!(self.peek(), Some(Tok::Semi)) { None } else { Some(self.parse_expr()?) };
        self.expect(&Tok::Semi, "';' after for-loop condition")?;
        let step = if matches!(self.peek(), Some(Tok::RParen)) { None } else { Some(self.parse_expr()?) };
        self.expect(&Tok::RParen, "')'")?;
        let body = self.parse_block_or_single()?;
        Ok(Stmt::For { init, cond, step, body })
    }

    // ----- expressions -----

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_conditional()?;
        let op = match self.peek() {
            Some(Tok::Assign) => Some(None),
            Some(Tok::PlusAssign) => Some(Some(BinaryOp::Add)),
            Some(Tok::MinusAssign) => Some(Some(BinaryOp::Sub)),
            Some(Tok::StarAssign) => Some(Some(BinaryOp::Mul)),
            Some(Tok::SlashAssign) => Some(Some(BinaryOp::Div)),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.line();
            self.pos += 1;
            if !is_assign_target(&target) {
                return Err(ParseError::BadAssignTarget { line });
            }
            let value = self.parse_assign()?;
            return Ok(Expr::Assign { target: Box::new(target), op, value: Box::new(value) });
        }
        Ok(target)
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.eat(&Tok::Question) {
            let then = self.parse_assign()?;
            self.expect(&Tok::Colon, "':' in conditional expression")?;
            let otherwise = self.parse_assign()?;
            return Ok(Expr::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Tok::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Logical { op: LogicalOp::Or, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Tok::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Logical { op: LogicalOp::And, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Tok::EqEqEq) => BinaryOp::StrictEq,
                Some(Tok::NotEqEq) => BinaryOp::StrictNotEq,
                Some(Tok::EqEq) => BinaryOp::Eq,
                Some(Tok::NotEq) => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Lt) => BinaryOp::Lt,
                Some(Tok::Gt) => BinaryOp::Gt,
                Some(Tok::Le) => BinaryOp::Le,
                Some(Tok::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinaryOp::Add,
                Some(Tok::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinaryOp::Mul,
                Some(Tok::Slash) => BinaryOp::Div,
                Some(Tok::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_unary_inner();
        self.depth -= 1;
        expr
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Tok::Not) => {
                self.pos += 1;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Not, expr: Box::new(expr) })
            }
            Some(Tok::Minus) => {
                self.pos += 1;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Neg, expr: Box::new(expr) })
            }
            Some(Tok::Typeof) => {
                self.pos += 1;
                let expr = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Typeof, expr: Box::new(expr) })
            }
            Some(Tok::PlusPlus) | Some(Tok::MinusMinus) => {
                let increment = matches!(self.peek(), Some(Tok::PlusPlus));
                let line = self.line();
                self.pos += 1;
                let target = self.parse_unary()?;
                if !is_assign_target(&target) {
                    return Err(ParseError::BadAssignTarget { line });
                }
                Ok(Expr::Update { target: Box::new(target), increment, prefix: true })
            }
            Some(Tok::New) => Err(ParseError::NewUnsupported { line: self.line() }),
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let property = self.expect_ident("a property name")?;
                    expr = Expr::Member { object: Box::new(expr), property };
                }
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&Tok::RBracket, "']'")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index) };
                }
                Some(Tok::LParen) => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Tok::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.eat(&Tok::Comma) {
                                continue;
                            }
                            self.expect(&Tok::RParen, "')'")?;
                            break;
                        }
                    }
                    expr = Expr::Call { callee: Box::new(expr), args };
                }
                Some(Tok::PlusPlus) | Some(Tok::MinusMinus) => {
                    let increment = matches!(self.peek(), Some(Tok::PlusPlus));
                    let line = self.line();
                    self.pos += 1;
                    if !is_assign_target(&expr) {
                        return Err(ParseError::BadAssignTarget { line });
                    }
                    expr = Expr::Update { target: Box::new(expr), increment, prefix: false };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(Tok::Num(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Expr::Num(n))
            }
            Some(Tok::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Some(Tok::True) => {
                self.pos += 1;
                Ok(Expr::Bool(true))
            }
            Some(Tok::False) => {
                self.pos += 1;
                Ok(Expr::Bool(false))
            }
            Some(Tok::Null) => {
                self.pos += 1;
                Ok(Expr::Null)
            }
            Some(Tok::Undefined) => {
                self.pos += 1;
                Ok(Expr::Undefined)
            }
            Some(Tok::Ident(name)) => {
                // Single-parameter arrow: `x => body`.
                if matches!(self.peek_at(1), Some(Tok::Arrow)) {
                    let param = name.clone();
                    self.pos += 2;
                    let body = self.parse_arrow_body()?;
                    return Ok(Expr::Function { name: None, params: vec![param], body });
                }
                let name = name.clone();
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Some(Tok::LParen) => {
                if self.paren_starts_arrow() {
                    let params = self.parse_params()?;
                    self.expect(&Tok::Arrow, "'=>'")?;
                    let body = self.parse_arrow_body()?;
                    return Ok(Expr::Function { name: None, params, body });
                }
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Some(Tok::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.eat(&Tok::Comma) {
                            // Allow trailing comma.
                            if self.eat(&Tok::RBracket) {
                                break;
                            }
                            continue;
                        }
                        self.expect(&Tok::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Some(Tok::LBrace) => self.parse_object_literal(),
            Some(Tok::Function) => {
                self.pos += 1;
                let name = match self.peek() {
                    Some(Tok::Ident(n)) => {
                        let n = n.clone();
                        self.pos += 1;
                        Some(n)
                    }
                    _ => None,
                };
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                Ok(Expr::Function { name, params, body })
            }
            Some(Tok::New) => Err(ParseError::NewUnsupported { line: self.line() }),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(&Tok::LBrace, "'{'")?;
        let mut props = Vec::new();
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::Object(props));
        }
        loop {
            let key = match self.peek() {
                Some(Tok::Ident(k)) => {
                    let k = k.clone();
                    self.pos += 1;
                    k
                }
                Some(Tok::Str(k)) => {
                    let k = k.clone();
                    self.pos += 1;
                    k
                }
                _ => return Err(self.unexpected("a property key")),
            };
            if self.eat(&Tok::Colon) {
                let value = self.parse_expr()?;
                props.push((key, value));
            } else {
                // Shorthand `{ a }` binds the identifier of the same name.
                let value = Expr::Ident(key.clone());
                props.push((key, value));
            }
            if self.eat(&Tok::Comma) {
                if self.eat(&Tok::RBrace) {
                    break;
                }
                continue;
            }
            self.expect(&Tok::RBrace, "'}'")?;
            break;
        }
        Ok(Expr::Object(props))
    }

    fn parse_arrow_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if matches!(self.peek(), Some(Tok::LBrace)) {
            self.parse_block()
        } else {
            let expr = self.parse_expr()?;
            Ok(vec![Stmt::Return(Some(expr))])
        }
    }

    /// Bounded lookahead from an opening paren: does the matching close paren
    /// lead straight into `=>`?
    fn paren_starts_arrow(&self) -> bool {
        let mut depth = 0usize;
        let mut i = self.pos;
        while let Some(st) = self.toks.get(i) {
            match st.tok {
                Tok::LParen => depth += 1,
                Tok::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return matches!(self.toks.get(i + 1).map(|s| &s.tok), Some(Tok::Arrow));
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }
}

fn is_assign_target(e: &Expr) -> bool {
    matches!(e, Expr::Ident(_) | Expr::Member { .. } | Expr::Index { .. })
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(n) => format!("identifier '{}'", n),
        Tok::Num(n) => format!("number {}", n),
        Tok::Str(_) => "string literal".to_string(),
        other => format!("'{}'", token_text(other)),
    }
}

fn token_text(tok: &Tok) -> &'static str {
    match tok {
        Tok::Num(_) | Tok::Str(_) | Tok::Ident(_) => "",
        Tok::Let => "let",
        Tok::Const => "const",
        Tok::Var => "var",
        Tok::Function => "function",
        Tok::Return => "return",
        Tok::If => "if",
        Tok::Else => "else",
        Tok::While => "while",
        Tok::For => "for",
        Tok::Of => "of",
        Tok::Break => "break",
        Tok::Continue => "continue",
        Tok::True => "true",
        Tok::False => "false",
        Tok::Null => "null",
        Tok::Undefined => "undefined",
        Tok::Typeof => "typeof",
        Tok::New => "new",
        Tok::LParen => "(",
        Tok::RParen => ")",
        Tok::LBrace => "{",
        Tok::RBrace => "}",
        Tok::LBracket => "[",
        Tok::RBracket => "]",
        Tok::Comma => ",",
        Tok::Semi => ";",
        Tok::Colon => ":",
        Tok::Dot => ".",
        Tok::Arrow => "=>",
        Tok::Question => "?",
        Tok::Assign => "=",
        Tok::PlusAssign => "+=",
        Tok::MinusAssign => "-=",
        Tok::StarAssign => "*=",
        Tok::SlashAssign => "/=",
        Tok::Plus => "+",
        Tok::Minus => "-",
        Tok::Star => "*",
        Tok::Slash => "/",
        Tok::Percent => "%",
        Tok::PlusPlus => "++",
        Tok::MinusMinus => "--",
        Tok::EqEq => "==",
        Tok::NotEq => "!=",
        Tok::EqEqEq => "===",
        Tok::NotEqEq => "!==",
        Tok::Lt => "<",
        Tok::Gt => ">",
        Tok::Le => "<=",
        Tok::Ge => ">=",
        Tok::AndAnd => "&&",
        Tok::OrOr => "||",
        Tok::Not => "!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_declaration_shape() {
        let prog = parse_program("function sum(a, b) { return a + b; }").expect("parse");
        assert_eq!(prog.len(), 1);
        match &prog[0] {
            Stmt::FunctionDecl { name, params, body } => {
                assert_eq!(name, "sum");
                assert_eq!(params, &["a".to_string(), "b".to_string()]);
                assert_eq!(body.len(), 1);
                assert!(matches!(&body[0], Stmt::Return(Some(Expr::Binary { op: BinaryOp::Add, .. }))));
            }
            other => panic!("expected function decl, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let prog = parse_program("1 + 2 * 3").expect("parse");
        match &prog[0] {
            Stmt::Expr(Expr::Binary { op: BinaryOp::Add, left, right }) => {
                assert_eq!(**left, Expr::Num(1.0));
                assert!(matches!(**right, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn arrow_functions_single_and_parenthesized() {
        let prog = parse_program("const f = x => x * 2; const g = (a, b) => { return a; };")
            .expect("parse");
        match &prog[0] {
            Stmt::VarDecl { decls } => match &decls[0].init {
                Some(Expr::Function { name: None, params, body }) => {
                    assert_eq!(params, &["x".to_string()]);
                    assert!(matches!(&body[0], Stmt::Return(Some(_))));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        match &prog[1] {
            Stmt::VarDecl { decls } => {
                assert!(matches!(&decls[0].init, Some(Expr::Function { params, .. }) if params.len() == 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        let prog = parse_program("(1 + 2) * 3").expect("parse");
        assert!(matches!(&prog[0], Stmt::Expr(Expr::Binary { op: BinaryOp::Mul, .. })));
    }

    #[test]
    fn classic_for_loop_pieces() {
        let prog = parse_program("for (let i = 0; i < 3; i++) { total += i; }").expect("parse");
        match &prog[0] {
            Stmt::For { init, cond, step, body } => {
                assert!(matches!(init.as_deref(), Some(Stmt::VarDecl { .. })));
                assert!(matches!(cond, Some(Expr::Binary { op: BinaryOp::Lt, .. })));
                assert!(matches!(step, Some(Expr::Update { prefix: false, increment: true, .. })));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn for_of_with_and_without_declaration() {
        let prog = parse_program("for (const x of xs) {} for (y of ys) {}").expect("parse");
        assert!(matches!(&prog[0], Stmt::ForOf { name, .. } if name == "x"));
        assert!(matches!(&prog[1], Stmt::ForOf { name, .. } if name == "y"));
    }

    #[test]
    fn object_literal_with_shorthand_and_trailing_comma() {
        let prog = parse_program("const o = { a: 1, b, 'c d': 3, };").expect("parse");
        match &prog[0] {
            Stmt::VarDecl { decls } => match &decls[0].init {
                Some(Expr::Object(props)) => {
                    assert_eq!(props.len(), 3);
                    assert_eq!(props[0].0, "a");
                    assert_eq!(props[1], ("b".to_string(), Expr::Ident("b".to_string())));
                    assert_eq!(props[2].0, "c d");
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn chained_member_index_call() {
        let prog = parse_program("rows[0].cells.map(render)").expect("parse");
        match &prog[0] {
            Stmt::Expr(Expr::Call { callee, args }) => {
                assert_eq!(args.len(), 1);
                assert!(matches!(**callee, Expr::Member { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn assignment_targets_are_validated() {
        assert!(matches!(
            parse_program("1 = 2"),
            Err(ParseError::BadAssignTarget { .. })
        ));
        assert!(matches!(
            parse_program("(a + b)++"),
            Err(ParseError::BadAssignTarget { .. })
        ));
        assert!(parse_program("a.b = 2; a[0] = 3; a += 4;").is_ok());
    }

    #[test]
    fn new_operator_is_rejected_with_a_dedicated_error() {
        assert!(matches!(
            parse_program("const d = new Date();"),
            Err(ParseError::NewUnsupported { .. })
        ));
    }

    #[test]
    fn unexpected_token_names_line_and_token() {
        match parse_program("let = 4;") {
            Err(ParseError::Unexpected { found, line, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(found, "'='");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ternary_and_logical_operators() {
        let prog = parse_program("a && b || c ? 1 : 2").expect("parse");
        match &prog[0] {
            Stmt::Expr(Expr::Cond { cond, .. }) => {
                assert!(matches!(**cond, Expr::Logical { op: LogicalOp::Or, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pathological_nesting_is_rejected() {
        let src = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse_program(&src), Err(ParseError::TooDeep { .. })));
    }

    #[test]
    fn function_expression_with_optional_name() {
        let prog = parse_program("const f = function(x) { return x; };").expect("parse");
        match &prog[0] {
            Stmt::VarDecl { decls } => {
                assert!(matches!(&decls[0].init, Some(Expr::Function { name: None, .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
