//! Tree-walking evaluator with a deterministic step budget.
//!
//! Every statement, expression, and function call decrements the budget; when
//! it reaches zero evaluation stops with [`EvalError::Budget`]. That is what
//! bounds runaway submissions: the same program always stops at the same
//! point, independent of host load. The global environment holds builtins
//! only (`console`, `Math`, `JSON`, `Object`, a few casts, and array / string
//! methods). There is no host access, no `this`, and thrown errors are plain
//! messages.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use thiserror::Error;

use super::parser::{BinaryOp, Expr, LogicalOp, Stmt, UnaryOp};
use super::value::{fmt_num, Value};

const MAX_CALL_DEPTH: usize = 200;
const MAX_ARRAY_LEN: usize = 100_000;
const MAX_REPEAT_LEN: usize = 1 << 20;

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "filter", "map", "forEach", "reduce", "find", "findIndex",
    "some", "every", "includes", "indexOf", "join", "slice", "concat", "reverse", "sort",
];
const STRING_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "split", "includes", "indexOf", "charAt", "slice",
    "repeat", "startsWith", "endsWith", "replace", "replaceAll", "toString",
];
const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("{0}")]
    Thrown(String),
    #[error("step budget of {0} exhausted")]
    Budget(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
}

/// Lexical scope chain. Function declarations are hoisted into the scope
/// before its statements run.
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<ScopeRef>,
}

pub type ScopeRef = Rc<Scope>;

impl Scope {
    fn root() -> ScopeRef {
        Rc::new(Scope { vars: RefCell::new(HashMap::new()), parent: None })
    }

    fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(Scope { vars: RefCell::new(HashMap::new()), parent: Some(parent.clone()) })
    }

    fn declare(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Assign to an existing binding somewhere up the chain. Returns false if
    /// the name was never declared (assignment to undeclared names is an
    /// error, not an implicit global).
    fn set(&self, name: &str, value: Value) -> bool {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.parent {
            Some(p) => p.set(name, value),
            None => false,
        }
    }
}

/// A user function together with its captured environment.
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub env: ScopeRef,
}

/// Builtin functions. All of them are dispatched through one match in
/// [`Interp::call_native`], so adding one is a variant plus an arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Native {
    ConsoleLog,
    ConsoleInfo,
    ConsoleWarn,
    ConsoleError,
    MathAbs,
    MathFloor,
    MathCeil,
    MathRound,
    MathTrunc,
    MathSqrt,
    MathPow,
    MathMax,
    MathMin,
    MathRandom,
    JsonParse,
    JsonStringify,
    ParseInt,
    ParseFloat,
    IsNan,
    NumberCast,
    StringCast,
    BooleanCast,
    ArrayIsArray,
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    DateNow,
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interp {
    globals: ScopeRef,
    console: Vec<ConsoleLine>,
    console_truncated: bool,
    max_console: usize,
    budget: u64,
    steps_left: u64,
    depth: usize,
}

impl Interp {
    pub fn new(step_budget: u64, max_console_lines: usize) -> Interp {
        let globals = Scope::root();
        install_globals(&globals);
        Interp {
            globals,
            console: Vec::new(),
            console_truncated: false,
            max_console: max_console_lines,
            budget: step_budget,
            steps_left: step_budget,
            depth: 0,
        }
    }

    /// Run a whole program in the global scope. The result is the value of a
    /// top-level `return` if there is one, otherwise the value of the last
    /// expression statement.
    pub fn run_program(&mut self, program: &[Stmt]) -> Result<Value, EvalError> {
        let scope = self.globals.clone();
        hoist_functions(program, &scope);
        let mut last = Value::Undefined;
        for stmt in program {
            if let Stmt::Expr(e) = stmt {
                self.step()?;
                last = self.eval_expr(e, &scope)?;
                continue;
            }
            match self.exec_stmt(stmt, &scope)? {
                Flow::Normal => {}
                Flow::Return(v) => return Ok(v),
                Flow::Break => return Err(EvalError::Thrown("Illegal break statement".to_string())),
                Flow::Continue => {
                    return Err(EvalError::Thrown("Illegal continue statement".to_string()))
                }
            }
        }
        Ok(last)
    }

    /// Look up a global binding, e.g. an entry-point function a program just
    /// defined.
    pub fn global_get(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    /// Call a callable value. Used for entry-point invocation after
    /// [`run_program`](Interp::run_program).
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, EvalError> {
        self.call_value(callee, args, "value")
    }

    pub fn take_console(&mut self) -> Vec<ConsoleLine> {
        std::mem::take(&mut self.console)
    }

    fn step(&mut self) -> Result<(), EvalError> {
        if self.steps_left == 0 {
            return Err(EvalError::Budget(self.budget));
        }
        self.steps_left -= 1;
        Ok(())
    }

    fn run_block(&mut self, stmts: &[Stmt], scope: &ScopeRef) -> Result<Flow, EvalError> {
        hoist_functions(stmts, scope);
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<Flow, EvalError> {
        self.step()?;
        match stmt {
            Stmt::VarDecl { decls } => {
                for d in decls {
                    let value = match &d.init {
                        Some(e) => self.eval_expr(e, scope)?,
                        None => Value::Undefined,
                    };
                    scope.declare(&d.name, value);
                }
                Ok(Flow::Normal)
            }
            // Hoisted by run_block.
            Stmt::FunctionDecl { .. } => Ok(Flow::Normal),
            Stmt::Return(e) => {
                let value = match e {
                    Some(e) => self.eval_expr(e, scope)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If { cond, then, otherwise } => {
                if self.eval_expr(cond, scope)?.truthy() {
                    self.run_block(then, &Scope::child(scope))
                } else if let Some(stmts) = otherwise {
                    self.run_block(stmts, &Scope::child(scope))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(cond, scope)?.truthy() {
                    self.step()?;
                    match self.run_block(body, &Scope::child(scope))? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { init, cond, step, body } => {
                let scope = Scope::child(scope);
                if let Some(init) = init {
                    self.exec_stmt(init, &scope)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_expr(cond, &scope)?.truthy() {
                            break;
                        }
                    }
                    self.step()?;
                    match self.run_block(body, &Scope::child(&scope))? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    if let Some(step) = step {
                        self.eval_expr(step, &scope)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForOf { name, iterable, body } => {
                let iterable = self.eval_expr(iterable, scope)?;
                let items: Vec<Value> = match &iterable {
                    Value::Array(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    other => {
                        return Err(EvalError::Thrown(format!(
                            "{} is not iterable",
                            other.render_plain()
                        )))
                    }
                };
                for item in items {
                    self.step()?;
                    let scope = Scope::child(scope);
                    scope.declare(name, item);
                    match self.run_block(body, &scope)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Block(stmts) => self.run_block(stmts, &Scope::child(scope)),
            Stmt::Expr(e) => {
                self.eval_expr(e, scope)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value, EvalError> {
        self.step()?;
        match expr {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => scope
                .get(name)
                .ok_or_else(|| EvalError::Thrown(format!("{} is not defined", name))),
            Expr::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval_expr(item, scope)?);
                }
                Ok(Value::array(out))
            }
            Expr::Object(props) => {
                let mut out: Vec<(String, Value)> = Vec::with_capacity(props.len());
                for (key, e) in props {
                    let value = self.eval_expr(e, scope)?;
                    set_prop(&mut out, key, value);
                }
                Ok(Value::object(out))
            }
            Expr::Unary { op, expr } => match op {
                UnaryOp::Typeof => {
                    // `typeof missing` answers "undefined" instead of throwing.
                    if let Expr::Ident(name) = expr.as_ref() {
                        let type_name = match scope.get(name) {
                            Some(v) => v.type_name(),
                            None => "undefined",
                        };
                        return Ok(Value::Str(type_name.to_string()));
                    }
                    let v = self.eval_expr(expr, scope)?;
                    Ok(Value::Str(v.type_name().to_string()))
                }
                UnaryOp::Not => Ok(Value::Bool(!self.eval_expr(expr, scope)?.truthy())),
                UnaryOp::Neg => {
                    let n = as_number(&self.eval_expr(expr, scope)?);
                    Ok(Value::Num(-n))
                }
            },
            Expr::Binary { op, left, right } => {
                let l = self.eval_expr(left, scope)?;
                let r = self.eval_expr(right, scope)?;
                binary_op(*op, &l, &r)
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval_expr(left, scope)?;
                match op {
                    LogicalOp::And => {
                        if l.truthy() {
                            self.eval_expr(right, scope)
                        } else {
                            Ok(l)
                        }
                    }
                    LogicalOp::Or => {
                        if l.truthy() {
                            Ok(l)
                        } else {
                            self.eval_expr(right, scope)
                        }
                    }
                }
            }
            Expr::Cond { cond, then, otherwise } => {
                if self.eval_expr(cond, scope)?.truthy() {
                    self.eval_expr(then, scope)
                } else {
                    self.eval_expr(otherwise, scope)
                }
            }
            Expr::Assign { target, op, value } => {
                let new = match op {
                    None => self.eval_expr(value, scope)?,
                    Some(bin) => {
                        let current = self.eval_expr(target, scope)?;
                        let rhs = self.eval_expr(value, scope)?;
                        binary_op(*bin, &current, &rhs)?
                    }
                };
                self.store(target, new.clone(), scope)?;
                Ok(new)
            }
            Expr::Update { target, increment, prefix } => {
                let old = as_number(&self.eval_expr(target, scope)?);
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.store(target, Value::Num(new), scope)?;
                Ok(Value::Num(if *prefix { new } else { old }))
            }
            Expr::Member { object, property } => {
                let obj = self.eval_expr(object, scope)?;
                get_member(&obj, property)
            }
            Expr::Index { object, index } => {
                let obj = self.eval_expr(object, scope)?;
                let idx = self.eval_expr(index, scope)?;
                match &obj {
                    Value::Array(items) if is_index(&idx) => {
                        let i = as_number(&idx) as usize;
                        Ok(items.borrow().get(i).cloned().unwrap_or(Value::Undefined))
                    }
                    Value::Str(s) if is_index(&idx) => {
                        let i = as_number(&idx) as usize;
                        Ok(s.chars()
                            .nth(i)
                            .map(|c| Value::Str(c.to_string()))
                            .unwrap_or(Value::Undefined))
                    }
                    _ => get_member(&obj, &idx.render_plain()),
                }
            }
            Expr::Call { callee, args } => {
                let f = self.eval_expr(callee, scope)?;
                let mut arg_vals = Vec::with_capacity(args.len());
                for a in args {
                    arg_vals.push(self.eval_expr(a, scope)?);
                }
                self.call_value(&f, &arg_vals, &callee_label(callee))
            }
            Expr::Function { name, params, body } => {
                let closure = Closure {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    env: scope.clone(),
                };
                Ok(Value::Function(Rc::new(closure)))
            }
        }
    }

    fn store(&mut self, target: &Expr, value: Value, scope: &ScopeRef) -> Result<(), EvalError> {
        match target {
            Expr::Ident(name) => {
                if scope.set(name, value) {
                    Ok(())
                } else {
                    Err(EvalError::Thrown(format!("{} is not defined", name)))
                }
            }
            Expr::Member { object, property } => {
                let obj = self.eval_expr(object, scope)?;
                assign_property(&obj, property, value)
            }
            Expr::Index { object, index } => {
                let obj = self.eval_expr(object, scope)?;
                let idx = self.eval_expr(index, scope)?;
                if let (Value::Array(items), true) = (&obj, is_index(&idx)) {
                    let i = as_number(&idx) as usize;
                    if i >= MAX_ARRAY_LEN {
                        return Err(EvalError::Thrown("Invalid array length".to_string()));
                    }
                    let mut items = items.borrow_mut();
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                    return Ok(());
                }
                assign_property(&obj, &idx.render_plain(), value)
            }
            _ => Err(EvalError::Thrown("Invalid assignment target".to_string())),
        }
    }

    fn call_value(&mut self, f: &Value, args: &[Value], label: &str) -> Result<Value, EvalError> {
        match f {
            Value::Function(closure) => self.call_closure(closure.clone(), args),
            Value::Native(native) => self.call_native(*native, args),
            Value::Method { recv, name } => self.call_method(recv, name, args),
            _ => Err(EvalError::Thrown(format!("{} is not a function", label))),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, args: &[Value]) -> Result<Value, EvalError> {
        self.step()?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::Thrown("Maximum call stack size exceeded".to_string()));
        }
        let scope = Scope::child(&closure.env);
        if let Some(name) = &closure.name {
            scope.declare(name, Value::Function(closure.clone()));
        }
        for (i, param) in closure.params.iter().enumerate() {
            scope.declare(param, args.get(i).cloned().unwrap_or(Value::Undefined));
        }
        self.depth += 1;
        let flow = self.run_block(&closure.body, &scope);
        self.depth -= 1;
        match flow? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::Undefined),
        }
    }

    fn call_native(&mut self, native: Native, args: &[Value]) -> Result<Value, EvalError> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
        match native {
            Native::ConsoleLog | Native::ConsoleInfo => {
                self.log_args(ConsoleLevel::Info, args);
                Ok(Value::Undefined)
            }
            Native::ConsoleWarn => {
                self.log_args(ConsoleLevel::Warn, args);
                Ok(Value::Undefined)
            }
            Native::ConsoleError => {
                self.log_args(ConsoleLevel::Error, args);
                Ok(Value::Undefined)
            }
            Native::MathAbs => Ok(Value::Num(as_number(&arg(0)).abs())),
            Native::MathFloor => Ok(Value::Num(as_number(&arg(0)).floor())),
            Native::MathCeil => Ok(Value::Num(as_number(&arg(0)).ceil())),
            // Half-way values round toward positive infinity, as in scripts.
            Native::MathRound => Ok(Value::Num((as_number(&arg(0)) + 0.5).floor())),
            Native::MathTrunc => Ok(Value::Num(as_number(&arg(0)).trunc())),
            Native::MathSqrt => Ok(Value::Num(as_number(&arg(0)).sqrt())),
            Native::MathPow => Ok(Value::Num(as_number(&arg(0)).powf(as_number(&arg(1))))),
            Native::MathMax => {
                let mut best = f64::NEG_INFINITY;
                for a in args {
                    let n = as_number(a);
                    if n.is_nan() {
                        return Ok(Value::Num(f64::NAN));
                    }
                    if n > best {
                        best = n;
                    }
                }
                Ok(Value::Num(best))
            }
            Native::MathMin => {
                let mut best = f64::INFINITY;
                for a in args {
                    let n = as_number(a);
                    if n.is_nan() {
                        return Ok(Value::Num(f64::NAN));
                    }
                    if n < best {
                        best = n;
                    }
                }
                Ok(Value::Num(best))
            }
            Native::MathRandom => Ok(Value::Num(rand::random::<f64>())),
            Native::JsonParse => {
                let text = match arg(0) {
                    Value::Str(s) => s,
                    other => other.render_plain(),
                };
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(v) => Ok(Value::from_json(&v)),
                    Err(e) => Err(EvalError::Thrown(format!("JSON.parse: {}", e))),
                }
            }
            Native::JsonStringify => match arg(0) {
                Value::Undefined | Value::Function(_) | Value::Native(_) | Value::Method { .. } => {
                    Ok(Value::Undefined)
                }
                other => match serde_json::to_string(&other.to_json()) {
                    Ok(s) => Ok(Value::Str(s)),
                    Err(e) => Err(EvalError::Thrown(format!("JSON.stringify: {}", e))),
                },
            },
            Native::ParseInt => {
                let s = match arg(0) {
                    Value::Str(s) => s,
                    other => other.render_plain(),
                };
                Ok(Value::Num(parse_leading_int(&s)))
            }
            Native::ParseFloat => {
                let s = match arg(0) {
                    Value::Str(s) => s,
                    other => other.render_plain(),
                };
                Ok(Value::Num(parse_leading_float(&s)))
            }
            Native::IsNan => Ok(Value::Bool(as_number(&arg(0)).is_nan())),
            Native::NumberCast => Ok(Value::Num(as_number(&arg(0)))),
            Native::StringCast => Ok(Value::Str(arg(0).render_plain())),
            Native::BooleanCast => Ok(Value::Bool(arg(0).truthy())),
            Native::ArrayIsArray => Ok(Value::Bool(matches!(arg(0), Value::Array(_)))),
            Native::ObjectKeys => match arg(0) {
                Value::Object(props) => Ok(Value::array(
                    props.borrow().iter().map(|(k, _)| Value::Str(k.clone())).collect(),
                )),
                Value::Array(items) => Ok(Value::array(
                    (0..items.borrow().len()).map(|i| Value::Str(i.to_string())).collect(),
                )),
                _ => Ok(Value::array(Vec::new())),
            },
            Native::ObjectValues => match arg(0) {
                Value::Object(props) => Ok(Value::array(
                    props.borrow().iter().map(|(_, v)| v.clone()).collect(),
                )),
                Value::Array(items) => Ok(Value::array(items.borrow().clone())),
                _ => Ok(Value::array(Vec::new())),
            },
            Native::ObjectEntries => match arg(0) {
                Value::Object(props) => Ok(Value::array(
                    props
                        .borrow()
                        .iter()
                        .map(|(k, v)| Value::array(vec![Value::Str(k.clone()), v.clone()]))
                        .collect(),
                )),
                _ => Ok(Value::array(Vec::new())),
            },
            Native::DateNow => {
                let millis = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as f64)
                    .unwrap_or(0.0);
                Ok(Value::Num(millis))
            }
        }
    }

    fn call_method(&mut self, recv: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match recv {
            Value::Array(items) => self.call_array_method(items, name, args),
            Value::Str(s) => self.call_string_method(s, name, args),
            Value::Num(n) => call_number_method(*n, name, args),
            _ => Err(EvalError::Thrown(format!("{} is not a function", name))),
        }
    }

    fn call_array_method(
        &mut self,
        items_rc: &Rc<RefCell<Vec<Value>>>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        match name {
            "push" => {
                let mut items = items_rc.borrow_mut();
                if items.len() + args.len() > MAX_ARRAY_LEN {
                    return Err(EvalError::Thrown("Invalid array length".to_string()));
                }
                for a in args {
                    items.push(a.clone());
                }
                Ok(Value::Num(items.len() as f64))
            }
            "pop" => Ok(items_rc.borrow_mut().pop().unwrap_or(Value::Undefined)),
            "shift" => {
                let mut items = items_rc.borrow_mut();
                if items.is_empty() {
                    Ok(Value::Undefined)
                } else {
                    Ok(items.remove(0))
                }
            }
            "unshift" => {
                let mut items = items_rc.borrow_mut();
                for (i, a) in args.iter().enumerate() {
                    items.insert(i, a.clone());
                }
                Ok(Value::Num(items.len() as f64))
            }
            "includes" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                Ok(Value::Bool(items_rc.borrow().iter().any(|v| v.strict_eq(&needle))))
            }
            "indexOf" => {
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                let found = items_rc.borrow().iter().position(|v| v.strict_eq(&needle));
                Ok(Value::Num(found.map(|i| i as f64).unwrap_or(-1.0)))
            }
            "join" => {
                let sep = match args.first() {
                    Some(Value::Str(s)) => s.clone(),
                    Some(other) => other.render_plain(),
                    None => ",".to_string(),
                };
                let parts: Vec<String> = items_rc
                    .borrow()
                    .iter()
                    .map(|v| match v {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.render_plain(),
                    })
                    .collect();
                Ok(Value::Str(parts.join(&sep)))
            }
            "slice" => {
                let items = items_rc.borrow();
                let (start, end) = slice_bounds(args, items.len());
                Ok(Value::array(items[start..end].to_vec()))
            }
            "concat" => {
                let mut out = items_rc.borrow().clone();
                for a in args {
                    match a {
                        Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::array(out))
            }
            "reverse" => {
                items_rc.borrow_mut().reverse();
                Ok(Value::Array(items_rc.clone()))
            }
            "map" => {
                let f = require_callback(args, "map")?;
                let snapshot = items_rc.borrow().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for (i, item) in snapshot.into_iter().enumerate() {
                    let mapped = self.call_value(
                        &f,
                        &[item, Value::Num(i as f64), Value::Array(items_rc.clone())],
                        "callback",
                    )?;
                    out.push(mapped);
                }
                Ok(Value::array(out))
            }
            "filter" => {
                let f = require_callback(args, "filter")?;
                let snapshot = items_rc.borrow().clone();
                let mut out = Vec::new();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let keep = self.call_value(
                        &f,
                        &[item.clone(), Value::Num(i as f64), Value::Array(items_rc.clone())],
                        "callback",
                    )?;
                    if keep.truthy() {
                        out.push(item);
                    }
                }
                Ok(Value::array(out))
            }
            "forEach" => {
                let f = require_callback(args, "forEach")?;
                let snapshot = items_rc.borrow().clone();
                for (i, item) in snapshot.into_iter().enumerate() {
                    self.call_value(
                        &f,
                        &[item, Value::Num(i as f64), Value::Array(items_rc.clone())],
                        "callback",
                    )?;
                }
                Ok(Value::Undefined)
            }
            "find" | "findIndex" => {
                let f = require_callback(args, name)?;
                let snapshot = items_rc.borrow().clone();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let hit = self.call_value(
                        &f,
                        &[item.clone(), Value::Num(i as f64), Value::Array(items_rc.clone())],
                        "callback",
                    )?;
                    if hit.truthy() {
                        return Ok(if name == "find" { item } else { Value::Num(i as f64) });
                    }
                }
                Ok(if name == "find" { Value::Undefined } else { Value::Num(-1.0) })
            }
            "some" | "every" => {
                let f = require_callback(args, name)?;
                let snapshot = items_rc.borrow().clone();
                for (i, item) in snapshot.into_iter().enumerate() {
                    let hit = self
                        .call_value(
                            &f,
                            &[item, Value::Num(i as f64), Value::Array(items_rc.clone())],
                            "callback",
                        )?
                        .truthy();
                    if name == "some" && hit {
                        return Ok(Value::Bool(true));
                    }
                    if name == "every" && !hit {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(name == "every"))
            }
            "reduce" => {
                let f = require_callback(args, "reduce")?;
                let snapshot = items_rc.borrow().clone();
                let mut iter = snapshot.into_iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(init) => init.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first,
                        None => {
                            return Err(EvalError::Thrown(
                                "Reduce of empty array with no initial value".to_string(),
                            ))
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call_value(
                        &f,
                        &[acc, item, Value::Num(i as f64), Value::Array(items_rc.clone())],
                        "callback",
                    )?;
                }
                Ok(acc)
            }
            "sort" => {
                // Insertion sort on a detached copy, so a comparator that
                // throws (or exhausts the budget) leaves no half-borrowed
                // state behind.
                let mut items = items_rc.borrow().clone();
                let cmp = args.first().cloned();
                for i in 1..items.len() {
                    let mut j = i;
                    while j > 0 {
                        self.step()?;
                        let swap = match &cmp {
                            Some(f) => {
                                let ordering = self.call_value(
                                    f,
                                    &[items[j - 1].clone(), items[j].clone()],
                                    "comparator",
                                )?;
                                as_number(&ordering) > 0.0
                            }
                            None => items[j - 1].render_plain() > items[j].render_plain(),
                        };
                        if !swap {
                            break;
                        }
                        items.swap(j - 1, j);
                        j -= 1;
                    }
                }
                *items_rc.borrow_mut() = items;
                Ok(Value::Array(items_rc.clone()))
            }
            _ => Err(EvalError::Thrown(format!("array.{} is not a function", name))),
        }
    }

    fn call_string_method(
        &mut self,
        s: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let arg_str = |i: usize| -> String {
            match args.get(i) {
                Some(Value::Str(x)) => x.clone(),
                Some(other) => other.render_plain(),
                None => "undefined".to_string(),
            }
        };
        match name {
            "toUpperCase" => Ok(Value::Str(s.to_uppercase())),
            "toLowerCase" => Ok(Value::Str(s.to_lowercase())),
            "trim" => Ok(Value::Str(s.trim().to_string())),
            "toString" => Ok(Value::Str(s.to_string())),
            "includes" => Ok(Value::Bool(s.contains(&arg_str(0)))),
            "startsWith" => Ok(Value::Bool(s.starts_with(&arg_str(0)))),
            "endsWith" => Ok(Value::Bool(s.ends_with(&arg_str(0)))),
            "indexOf" => {
                let needle = arg_str(0);
                match s.find(&needle) {
                    Some(byte) => Ok(Value::Num(s[..byte].chars().count() as f64)),
                    None => Ok(Value::Num(-1.0)),
                }
            }
            "charAt" => {
                let i = as_number(&args.first().cloned().unwrap_or(Value::Num(0.0)));
                if i.is_nan() || i < 0.0 {
                    return Ok(Value::Str(String::new()));
                }
                Ok(Value::Str(
                    s.chars().nth(i as usize).map(|c| c.to_string()).unwrap_or_default(),
                ))
            }
            "slice" => {
                let chars: Vec<char> = s.chars().collect();
                let (start, end) = slice_bounds(args, chars.len());
                Ok(Value::Str(chars[start..end].iter().collect()))
            }
            "split" => match args.first() {
                None => Ok(Value::array(vec![Value::Str(s.to_string())])),
                Some(sep) => {
                    let sep = match sep {
                        Value::Str(x) => x.clone(),
                        other => other.render_plain(),
                    };
                    if sep.is_empty() {
                        Ok(Value::array(s.chars().map(|c| Value::Str(c.to_string())).collect()))
                    } else {
                        Ok(Value::array(
                            s.split(sep.as_str()).map(|p| Value::Str(p.to_string())).collect(),
                        ))
                    }
                }
            },
            "repeat" => {
                let n = as_number(&args.first().cloned().unwrap_or(Value::Num(0.0)));
                if !n.is_finite() || n < 0.0 {
                    return Err(EvalError::Thrown("Invalid count value".to_string()));
                }
                let n = n as usize;
                if s.len().saturating_mul(n) > MAX_REPEAT_LEN {
                    return Err(EvalError::Thrown("Invalid count value".to_string()));
                }
                Ok(Value::Str(s.repeat(n)))
            }
            // `replace` swaps the first occurrence, `replaceAll` every one.
            "replace" => Ok(Value::Str(s.replacen(arg_str(0).as_str(), &arg_str(1), 1))),
            "replaceAll" => Ok(Value::Str(s.replace(arg_str(0).as_str(), &arg_str(1)))),
            _ => Err(EvalError::Thrown(format!("string.{} is not a function", name))),
        }
    }

    fn log_args(&mut self, level: ConsoleLevel, args: &[Value]) {
        let text = args.iter().map(|v| v.render()).collect::<Vec<_>>().join(" ");
        self.push_console(level, text);
    }

    fn push_console(&mut self, level: ConsoleLevel, text: String) {
        if self.console.len() < self.max_console {
            self.console.push(ConsoleLine { level, text });
            return;
        }
        if !self.console_truncated {
            self.console_truncated = true;
            self.console.push(ConsoleLine {
                level: ConsoleLevel::Warn,
                text: "(console output truncated)".to_string(),
            });
        }
    }
}

fn hoist_functions(stmts: &[Stmt], scope: &ScopeRef) {
    for stmt in stmts {
        if let Stmt::FunctionDecl { name, params, body } = stmt {
            let closure = Closure {
                name: Some(name.clone()),
                params: params.clone(),
                body: body.clone(),
                env: scope.clone(),
            };
            scope.declare(name, Value::Function(Rc::new(closure)));
        }
    }
}

fn install_globals(scope: &ScopeRef) {
    scope.declare(
        "console",
        Value::object(vec![
            ("log".to_string(), Value::Native(Native::ConsoleLog)),
            ("info".to_string(), Value::Native(Native::ConsoleInfo)),
            ("warn".to_string(), Value::Native(Native::ConsoleWarn)),
            ("error".to_string(), Value::Native(Native::ConsoleError)),
        ]),
    );
    scope.declare(
        "Math",
        Value::object(vec![
            ("abs".to_string(), Value::Native(Native::MathAbs)),
            ("floor".to_string(), Value::Native(Native::MathFloor)),
            ("ceil".to_string(), Value::Native(Native::MathCeil)),
            ("round".to_string(), Value::Native(Native::MathRound)),
            ("trunc".to_string(), Value::Native(Native::MathTrunc)),
            ("sqrt".to_string(), Value::Native(Native::MathSqrt)),
            ("pow".to_string(), Value::Native(Native::MathPow)),
            ("max".to_string(), Value::Native(Native::MathMax)),
            ("min".to_string(), Value::Native(Native::MathMin)),
            ("random".to_string(), Value::Native(Native::MathRandom)),
            ("PI".to_string(), Value::Num(std::f64::consts::PI)),
            ("E".to_string(), Value::Num(std::f64::consts::E)),
        ]),
    );
    scope.declare(
        "JSON",
        Value::object(vec![
            ("parse".to_string(), Value::Native(Native::JsonParse)),
            ("stringify".to_string(), Value::Native(Native::JsonStringify)),
        ]),
    );
    scope.declare(
        "Array",
        Value::object(vec![("isArray".to_string(), Value::Native(Native::ArrayIsArray))]),
    );
    scope.declare(
        "Object",
        Value::object(vec![
            ("keys".to_string(), Value::Native(Native::ObjectKeys)),
            ("values".to_string(), Value::Native(Native::ObjectValues)),
            ("entries".to_string(), Value::Native(Native::ObjectEntries)),
        ]),
    );
    scope.declare(
        "Date",
        Value::object(vec![("now".to_string(), Value::Native(Native::DateNow))]),
    );
    scope.declare("parseInt", Value::Native(Native::ParseInt));
    scope.declare("parseFloat", Value::Native(Native::ParseFloat));
    scope.declare("isNaN", Value::Native(Native::IsNan));
    scope.declare("Number", Value::Native(Native::NumberCast));
    scope.declare("String", Value::Native(Native::StringCast));
    scope.declare("Boolean", Value::Native(Native::BooleanCast));
    scope.declare("NaN", Value::Num(f64::NAN));
    scope.declare("Infinity", Value::Num(f64::INFINITY));
}

fn get_member(obj: &Value, name: &str) -> Result<Value, EvalError> {
    match obj {
        Value::Undefined | Value::Null => Err(EvalError::Thrown(format!(
            "Cannot read properties of {} (reading '{}')",
            if matches!(obj, Value::Undefined) { "undefined" } else { "null" },
            name
        ))),
        Value::Array(items) => {
            if name == "length" {
                return Ok(Value::Num(items.borrow().len() as f64));
            }
            if ARRAY_METHODS.contains(&name) {
                return Ok(Value::Method { recv: Box::new(obj.clone()), name: name.to_string() });
            }
            Ok(Value::Undefined)
        }
        Value::Str(s) => {
            if name == "length" {
                return Ok(Value::Num(s.chars().count() as f64));
            }
            if STRING_METHODS.contains(&name) {
                return Ok(Value::Method { recv: Box::new(obj.clone()), name: name.to_string() });
            }
            Ok(Value::Undefined)
        }
        Value::Num(_) => {
            if NUMBER_METHODS.contains(&name) {
                return Ok(Value::Method { recv: Box::new(obj.clone()), name: name.to_string() });
            }
            Ok(Value::Undefined)
        }
        Value::Object(props) => {
            if let Some((_, v)) = props.borrow().iter().find(|(k, _)| k == name) {
                return Ok(v.clone());
            }
            Ok(Value::Undefined)
        }
        Value::Bool(_) | Value::Function(_) | Value::Native(_) | Value::Method { .. } => {
            Ok(Value::Undefined)
        }
    }
}

fn assign_property(obj: &Value, key: &str, value: Value) -> Result<(), EvalError> {
    match obj {
        Value::Object(props) => {
            set_prop(&mut props.borrow_mut(), key, value);
            Ok(())
        }
        Value::Array(items) => {
            if key == "length" {
                let n = as_number(&value);
                if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && (n as usize) <= MAX_ARRAY_LEN {
                    items.borrow_mut().resize(n as usize, Value::Undefined);
                    return Ok(());
                }
                return Err(EvalError::Thrown("Invalid array length".to_string()));
            }
            Err(EvalError::Thrown(format!("Cannot set property '{}' of an array", key)))
        }
        Value::Undefined | Value::Null => Err(EvalError::Thrown(format!(
            "Cannot set properties of {} (setting '{}')",
            obj.render_plain(),
            key
        ))),
        other => Err(EvalError::Thrown(format!(
            "Cannot set property '{}' of a {}",
            key,
            other.type_name()
        ))),
    }
}

fn set_prop(props: &mut Vec<(String, Value)>, key: &str, value: Value) {
    if let Some(slot) = props.iter_mut().find(|(k, _)| k == key) {
        slot.1 = value;
    } else {
        props.push((key.to_string(), value));
    }
}

fn binary_op(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let numeric = |f: fn(f64, f64) -> f64| Ok(Value::Num(f(as_number(l), as_number(r))));
    match op {
        BinaryOp::Add => {
            if is_stringish(l) || is_stringish(r) {
                Ok(Value::Str(format!("{}{}", l.render_plain(), r.render_plain())))
            } else {
                numeric(|a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Rem => numeric(|a, b| a % b),
        BinaryOp::StrictEq | BinaryOp::Eq => Ok(Value::Bool(l.strict_eq(r))),
        BinaryOp::StrictNotEq | BinaryOp::NotEq => Ok(Value::Bool(!l.strict_eq(r))),
        BinaryOp::Lt => Ok(Value::Bool(matches!(loose_cmp(l, r), Some(std::cmp::Ordering::Less)))),
        BinaryOp::Gt => {
            Ok(Value::Bool(matches!(loose_cmp(l, r), Some(std::cmp::Ordering::Greater))))
        }
        BinaryOp::Le => Ok(Value::Bool(matches!(
            loose_cmp(l, r),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ))),
        BinaryOp::Ge => Ok(Value::Bool(matches!(
            loose_cmp(l, r),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ))),
    }
}

fn is_stringish(v: &Value) -> bool {
    matches!(
        v,
        Value::Str(_)
            | Value::Array(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Native(_)
            | Value::Method { .. }
    )
}

/// Strings compare lexicographically when both sides are strings, everything
/// else numerically. `None` means a NaN was involved, which makes every
/// comparison false.
fn loose_cmp(l: &Value, r: &Value) -> Option<std::cmp::Ordering> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Some(a.cmp(b));
    }
    as_number(l).partial_cmp(&as_number(r))
}

fn as_number(v: &Value) -> f64 {
    as_number_at(v, 0)
}

fn as_number_at(v: &Value, depth: usize) -> f64 {
    match v {
        Value::Num(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        Value::Str(s) => {
            let t = s.trim();
            if t.is_empty() {
                0.0
            } else {
                t.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) => {
            if depth > 32 {
                return f64::NAN;
            }
            let items = items.borrow();
            match items.len() {
                0 => 0.0,
                1 => as_number_at(&items[0], depth + 1),
                _ => f64::NAN,
            }
        }
        Value::Object(_) | Value::Function(_) | Value::Native(_) | Value::Method { .. } => f64::NAN,
    }
}

fn is_index(v: &Value) -> bool {
    match v {
        Value::Num(n) => n.is_finite() && *n >= 0.0 && n.fract() == 0.0,
        // Numeric strings index arrays, e.g. `a["0"]`.
        Value::Str(s) => s.parse::<usize>().is_ok(),
        _ => false,
    }
}

fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let len_f = len as f64;
    let norm = |v: Option<&Value>, default: f64| -> f64 {
        match v {
            Some(v) => {
                let n = as_number(v);
                if n.is_nan() {
                    0.0
                } else if n < 0.0 {
                    (len_f + n).max(0.0)
                } else {
                    n.min(len_f)
                }
            }
            None => default,
        }
    };
    let start = (norm(args.first(), 0.0) as usize).min(len);
    let end = (norm(args.get(1), len_f) as usize).clamp(start, len);
    (start, end)
}

fn require_callback(args: &[Value], method: &str) -> Result<Value, EvalError> {
    match args.first() {
        Some(v @ (Value::Function(_) | Value::Native(_) | Value::Method { .. })) => Ok(v.clone()),
        _ => Err(EvalError::Thrown(format!("{} requires a callback function", method))),
    }
}

fn call_number_method(n: f64, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "toFixed" => {
            let digits = args.first().map(as_number).unwrap_or(0.0);
            let digits = if digits.is_finite() && digits >= 0.0 {
                (digits as usize).min(100)
            } else {
                0
            };
            Ok(Value::Str(format!("{:.*}", digits, n)))
        }
        "toString" => Ok(Value::Str(fmt_num(n))),
        _ => Err(EvalError::Thrown(format!("number.{} is not a function", name))),
    }
}

fn callee_label(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property } => match object.as_ref() {
            Expr::Ident(obj) => format!("{}.{}", obj, property),
            _ => property.clone(),
        },
        _ => "expression".to_string(),
    }
}

fn parse_leading_int(s: &str) -> f64 {
    let t = s.trim();
    let mut chars = t.chars().peekable();
    let mut digits = String::new();
    if let Some(&c) = chars.peek() {
        if c == '+' || c == '-' {
            digits.push(c);
            chars.next();
        }
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if digits.is_empty() || digits == "+" || digits == "-" {
        return f64::NAN;
    }
    digits.parse::<f64>().unwrap_or(f64::NAN)
}

/// Longest numeric prefix of the trimmed input, NaN if there is none.
fn parse_leading_float(s: &str) -> f64 {
    let t = s.trim();
    let mut end = t.len();
    while end > 0 {
        if t.is_char_boundary(end) {
            if let Ok(n) = t[..end].parse::<f64>() {
                return n;
            }
        }
        end -= 1;
    }
    f64::NAN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_program;
    use serde_json::json;

    fn run(src: &str) -> Result<Value, EvalError> {
        let prog = parse_program(src).expect("parse");
        let mut interp = Interp::new(200_000, 50);
        interp.run_program(&prog)
    }

    fn run_json(src: &str) -> serde_json::Value {
        run(src).expect("eval").to_json()
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(run_json("1 + 2 * 3"), json!(7));
        assert_eq!(run_json("(1 + 2) * 3"), json!(9));
        assert_eq!(run_json("10 % 4"), json!(2));
        assert_eq!(run_json("-2 * 3"), json!(-6));
    }

    #[test]
    fn variables_scopes_and_compound_assignment() {
        assert_eq!(run_json("let x = 2; x += 3; x * 2"), json!(10));
        assert_eq!(run_json("let a = 1; { let a = 2; } a"), json!(1));
        assert_eq!(run_json("let b = 1; { b = 5; } b"), json!(5));
    }

    #[test]
    fn assignment_to_undeclared_name_throws() {
        assert_eq!(
            run("ghost = 1;"),
            Err(EvalError::Thrown("ghost is not defined".to_string()))
        );
    }

    #[test]
    fn functions_close_over_their_environment() {
        let src = "function make(n) { return (x) => x + n; } const add2 = make(2); add2(40)";
        assert_eq!(run_json(src), json!(42));
    }

    #[test]
    fn hoisted_functions_and_recursion() {
        let src = "const r = fib(10);\nfunction fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }\nr";
        assert_eq!(run_json(src), json!(55));
    }

    #[test]
    fn deep_recursion_is_cut_off() {
        let src = "function r(n) { return r(n + 1); } r(0)";
        assert_eq!(
            run(src),
            Err(EvalError::Thrown("Maximum call stack size exceeded".to_string()))
        );
    }

    #[test]
    fn array_pipeline() {
        let src = "[1, 2, 3, 4].filter(x => x % 2 === 0).map(x => x * 2).reduce((a, b) => a + b, 0)";
        assert_eq!(run_json(src), json!(12));
    }

    #[test]
    fn reduce_of_empty_array_without_seed_throws() {
        assert_eq!(
            run("[].reduce((a, b) => a + b)"),
            Err(EvalError::Thrown("Reduce of empty array with no initial value".to_string()))
        );
    }

    #[test]
    fn loops_with_break_and_continue() {
        let src = "let total = 0;\nfor (let i = 0; i < 10; i++) {\n  if (i === 3) { continue; }\n  if (i === 6) { break; }\n  total += i;\n}\ntotal";
        assert_eq!(run_json(src), json!(12));
    }

    #[test]
    fn for_of_walks_arrays_and_strings() {
        assert_eq!(run_json("let s = 0; for (const n of [1, 2, 3]) { s += n; } s"), json!(6));
        assert_eq!(
            run_json("let out = ''; for (const c of 'abc') { out += c; } out"),
            json!("abc")
        );
    }

    #[test]
    fn objects_and_object_helpers() {
        assert_eq!(run_json("const o = { a: 1 }; o.b = 2; o['c'] = 3; o"), json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(run_json("Object.keys({ x: 1, y: 2 })"), json!(["x", "y"]));
        assert_eq!(run_json("Object.values({ x: 1, y: 2 })"), json!([1, 2]));
    }

    #[test]
    fn sparse_index_assignment_pads_with_undefined() {
        assert_eq!(run_json("const a = []; a[2] = 9; a"), json!([null, null, 9]));
        assert_eq!(run_json("const a = [1, 2, 3]; a.length = 1; a"), json!([1]));
    }

    #[test]
    fn string_methods() {
        assert_eq!(run_json("'Hello World'.toUpperCase()"), json!("HELLO WORLD"));
        assert_eq!(run_json("'a,b,c'.split(',')"), json!(["a", "b", "c"]));
        assert_eq!(run_json("'abc'.split('')"), json!(["a", "b", "c"]));
        assert_eq!(run_json("['a', 'b'].join('-')"), json!("a-b"));
        assert_eq!(run_json("'banana'.replace('an', 'AN')"), json!("bANana"));
        assert_eq!(run_json("'banana'.replaceAll('an', 'AN')"), json!("bANANa"));
        assert_eq!(run_json("'héllo'.length"), json!(5));
    }

    #[test]
    fn equality_is_strict() {
        assert_eq!(run_json("1 === '1'"), json!(false));
        assert_eq!(run_json("1 == '1'"), json!(false));
        assert_eq!(run_json("[1] === [1]"), json!(false));
        assert_eq!(run_json("const a = [1]; const b = a; a === b"), json!(true));
        assert_eq!(run_json("NaN === NaN"), json!(false));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(run_json("0 || 'fallback'"), json!("fallback"));
        assert_eq!(run_json("1 && 2"), json!(2));
        assert_eq!(run_json("null && explode()"), json!(null));
        assert_eq!(run_json("true ? 'yes' : 'no'"), json!("yes"));
    }

    #[test]
    fn typeof_never_throws_on_unknown_names() {
        assert_eq!(run_json("typeof missing"), json!("undefined"));
        assert_eq!(run_json("typeof 'x'"), json!("string"));
        assert_eq!(run_json("typeof (() => 1)"), json!("function"));
    }

    #[test]
    fn string_concatenation_and_coercion() {
        assert_eq!(run_json("'Hello, ' + 'World' + '!'"), json!("Hello, World!"));
        assert_eq!(run_json("'n = ' + 5"), json!("n = 5"));
        assert_eq!(run_json("1 + true"), json!(2));
        assert_eq!(run_json("Number('12') + Number('')"), json!(12));
        assert_eq!(run_json("parseInt('42px')"), json!(42));
        assert_eq!(run_json("parseFloat('3.14 rad')"), json!(3.14));
        assert_eq!(run_json("isNaN(parseInt('px'))"), json!(true));
    }

    #[test]
    fn update_expressions_pre_and_post() {
        assert_eq!(run_json("let i = 0; [i++, i, ++i]"), json!([0, 1, 2]));
    }

    #[test]
    fn sort_defaults_to_string_order() {
        assert_eq!(run_json("[10, 9, 1].sort()"), json!([1, 10, 9]));
        assert_eq!(run_json("[10, 9, 1].sort((a, b) => a - b)"), json!([1, 9, 10]));
    }

    #[test]
    fn json_builtins() {
        assert_eq!(run_json("JSON.stringify({ a: 1 })"), json!("{\"a\":1}"));
        assert_eq!(run_json("JSON.parse('{\"a\": [1, 2]}').a[1]"), json!(2));
    }

    #[test]
    fn member_access_on_undefined_throws() {
        assert_eq!(
            run("let o; o.field"),
            Err(EvalError::Thrown(
                "Cannot read properties of undefined (reading 'field')".to_string()
            ))
        );
    }

    #[test]
    fn calling_a_non_function_names_the_callee() {
        assert_eq!(
            run("const x = 4; x()"),
            Err(EvalError::Thrown("x is not a function".to_string()))
        );
        assert_eq!(
            run("[1].explode()"),
            Err(EvalError::Thrown("explode is not a function".to_string()))
        );
    }

    #[test]
    fn step_budget_stops_endless_loops() {
        let prog = parse_program("let i = 0; while (i >= 0) { i += 1; }").expect("parse");
        let mut interp = Interp::new(500, 10);
        assert_eq!(interp.run_program(&prog), Err(EvalError::Budget(500)));
    }

    #[test]
    fn console_output_is_captured_with_levels() {
        let prog = parse_program("console.log('hi', [1]); console.error('bad');").expect("parse");
        let mut interp = Interp::new(10_000, 10);
        interp.run_program(&prog).expect("eval");
        let lines = interp.take_console();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ConsoleLine { level: ConsoleLevel::Info, text: "\"hi\" [1]".to_string() });
        assert_eq!(lines[1].level, ConsoleLevel::Error);
    }

    #[test]
    fn console_output_is_capped_with_a_marker() {
        let prog =
            parse_program("for (let i = 0; i < 20; i++) { console.log(i); }").expect("parse");
        let mut interp = Interp::new(10_000, 5);
        interp.run_program(&prog).expect("eval");
        let lines = interp.take_console();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[5].text, "(console output truncated)");
        assert_eq!(lines[5].level, ConsoleLevel::Warn);
    }

    #[test]
    fn entry_point_lookup_and_call() {
        let prog = parse_program("function sum(a, b) { return a + b; }").expect("parse");
        let mut interp = Interp::new(10_000, 10);
        interp.run_program(&prog).expect("eval");
        let f = interp.global_get("sum").expect("entry point");
        let out = interp.call(&f, &[Value::Num(2.0), Value::Num(3.0)]).expect("call");
        assert_eq!(out.to_json(), json!(5));
        assert!(interp.global_get("nope").is_none());
    }

    #[test]
    fn last_expression_and_top_level_return() {
        assert_eq!(run_json("1; 2; 3"), json!(3));
        assert_eq!(run_json("return 7; 9"), json!(7));
    }

    #[test]
    fn shared_array_references_alias() {
        let src = "const a = [1]; const b = a; b.push(2); a.length";
        assert_eq!(run_json(src), json!(2));
    }
}
