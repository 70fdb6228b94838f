//! Bounded execution wrapper around the script engine.
//!
//! A [`Sandbox`] is a cheap handle carrying the limits; every `run` /
//! `call_function` builds a fresh interpreter, so nothing leaks between
//! executions and test cases stay isolated. Failures come back as data in
//! [`SandboxFailure`], never as Rust errors across this boundary.

use serde::Serialize;
use thiserror::Error;

use crate::script::{parse_program, EvalError, Interp, Value};
pub use crate::script::{ConsoleLevel, ConsoleLine};

#[derive(Clone, Copy, Debug)]
pub struct SandboxLimits {
  /// Sources longer than this are refused before any parse.
  pub max_source_len: usize,
  /// Interpreter steps before execution stops deterministically.
  pub step_budget: u64,
  /// Captured console lines before output is truncated.
  pub max_console_lines: usize,
}

impl Default for SandboxLimits {
  fn default() -> Self {
    SandboxLimits { max_source_len: 64 * 1024, step_budget: 2_000_000, max_console_lines: 200 }
  }
}

/// Why an execution produced no (or only partial) results.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SandboxFailure {
  /// Constructed by callers from a guard hit; the sandbox itself never
  /// produces this variant.
  #[error("blocked by rule '{rule}'")]
  Blocked { rule: String },
  #[error("compile error: {message}")]
  Compile { message: String },
  #[error("runtime error: {message}")]
  Runtime { message: String },
  #[error("step budget of {steps} exhausted")]
  BudgetExhausted { steps: u64 },
}

/// Outcome of a free-form run.
#[derive(Clone, Debug, Serialize)]
pub struct SandboxRun {
  /// Value of a top-level `return`, or of the last expression statement.
  /// `None` when the program produced `undefined`.
  #[serde(rename = "returnValue")]
  pub return_value: Option<serde_json::Value>,
  #[serde(rename = "consoleLines")]
  pub console: Vec<ConsoleLine>,
  pub error: Option<SandboxFailure>,
}

impl SandboxRun {
  pub fn from_blocked(rule: &str) -> SandboxRun {
    SandboxRun {
      return_value: None,
      console: Vec::new(),
      error: Some(SandboxFailure::Blocked { rule: rule.to_string() }),
    }
  }
}

/// Outcome of a single entry-point invocation.
#[derive(Clone, Debug)]
pub struct CallOutcome {
  pub result: Result<serde_json::Value, SandboxFailure>,
  pub console: Vec<ConsoleLine>,
}

#[derive(Clone, Debug, Default)]
pub struct Sandbox {
  limits: SandboxLimits,
}

impl Sandbox {
  pub fn new(limits: SandboxLimits) -> Sandbox {
    Sandbox { limits }
  }

  pub fn limits(&self) -> &SandboxLimits {
    &self.limits
  }

  /// Execute a whole program and capture whatever it produced.
  pub fn run(&self, source: &str) -> SandboxRun {
    if let Some(failure) = self.check_size(source) {
      return SandboxRun { return_value: None, console: Vec::new(), error: Some(failure) };
    }
    let program = match parse_program(source) {
      Ok(p) => p,
      Err(e) => {
        return SandboxRun {
          return_value: None,
          console: Vec::new(),
          error: Some(SandboxFailure::Compile { message: e.to_string() }),
        }
      }
    };
    let mut interp = Interp::new(self.limits.step_budget, self.limits.max_console_lines);
    let outcome = interp.run_program(&program);
    let console = interp.take_console();
    match outcome {
      Ok(Value::Undefined) => SandboxRun { return_value: None, console, error: None },
      Ok(value) => SandboxRun { return_value: Some(value.to_json()), console, error: None },
      Err(e) => SandboxRun { return_value: None, console, error: Some(failure_from(e)) },
    }
  }

  /// Run a program, then invoke the named entry-point function with the given
  /// arguments. A fresh interpreter per call keeps cases independent.
  pub fn call_function(
    &self,
    source: &str,
    entry: &str,
    args: &[serde_json::Value],
  ) -> CallOutcome {
    if let Some(failure) = self.check_size(source) {
      return CallOutcome { result: Err(failure), console: Vec::new() };
    }
    let program = match parse_program(source) {
      Ok(p) => p,
      Err(e) => {
        return CallOutcome {
          result: Err(SandboxFailure::Compile { message: e.to_string() }),
          console: Vec::new(),
        }
      }
    };
    let mut interp = Interp::new(self.limits.step_budget, self.limits.max_console_lines);
    if let Err(e) = interp.run_program(&program) {
      let console = interp.take_console();
      return CallOutcome { result: Err(failure_from(e)), console };
    }
    let callee = match interp.global_get(entry) {
      Some(v @ Value::Function(_)) => v,
      _ => {
        let console = interp.take_console();
        return CallOutcome {
          result: Err(SandboxFailure::Runtime {
            message: format!("{} is not a function", entry),
          }),
          console,
        };
      }
    };
    let arg_values: Vec<Value> = args.iter().map(Value::from_json).collect();
    let result = interp.call(&callee, &arg_values);
    let console = interp.take_console();
    match result {
      Ok(value) => CallOutcome { result: Ok(value.to_json()), console },
      Err(e) => CallOutcome { result: Err(failure_from(e)), console },
    }
  }

  fn check_size(&self, source: &str) -> Option<SandboxFailure> {
    if source.len() > self.limits.max_source_len {
      return Some(SandboxFailure::Compile {
        message: format!(
          "source is {} bytes, the limit is {}",
          source.len(),
          self.limits.max_source_len
        ),
      });
    }
    None
  }
}

fn failure_from(e: EvalError) -> SandboxFailure {
  match e {
    EvalError::Thrown(message) => SandboxFailure::Runtime { message },
    EvalError::Budget(steps) => SandboxFailure::BudgetExhausted { steps },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn run_captures_return_value_and_console() {
    let run = Sandbox::default().run("console.log('hey'); 1 + 2");
    assert_eq!(run.return_value, Some(json!(3)));
    assert_eq!(run.console.len(), 1);
    assert_eq!(run.console[0].text, "\"hey\"");
    assert!(run.error.is_none());
  }

  #[test]
  fn undefined_result_is_absent() {
    let run = Sandbox::default().run("let x = 1;");
    assert_eq!(run.return_value, None);
    assert!(run.error.is_none());
  }

  #[test]
  fn syntax_errors_surface_as_compile_failures() {
    let run = Sandbox::default().run("function (");
    assert!(matches!(run.error, Some(SandboxFailure::Compile { .. })));
    assert_eq!(run.return_value, None);
  }

  #[test]
  fn oversized_sources_are_refused_before_parsing() {
    let sandbox = Sandbox::new(SandboxLimits { max_source_len: 8, ..Default::default() });
    let run = sandbox.run("console.log('way past the limit')");
    match run.error {
      Some(SandboxFailure::Compile { message }) => assert!(message.contains("limit is 8")),
      other => panic!("expected compile failure, got {:?}", other),
    }
  }

  #[test]
  fn endless_loops_exhaust_the_step_budget() {
    let sandbox = Sandbox::new(SandboxLimits { step_budget: 1_000, ..Default::default() });
    let run = sandbox.run("let i = 0;\nwhile (i >= 0) { i += 1; }");
    assert_eq!(run.error, Some(SandboxFailure::BudgetExhausted { steps: 1_000 }));
  }

  #[test]
  fn thrown_errors_are_runtime_failures_with_console_kept() {
    let run = Sandbox::default().run("console.log('before'); nope();");
    assert!(matches!(run.error, Some(SandboxFailure::Runtime { ref message }) if message.contains("nope")));
    assert_eq!(run.console.len(), 1);
  }

  #[test]
  fn call_function_invokes_the_entry_point() {
    let out = Sandbox::default().call_function(
      "function sum(a, b) { return a + b; }",
      "sum",
      &[json!(2), json!(3)],
    );
    assert_eq!(out.result, Ok(json!(5)));
    assert!(out.console.is_empty());
  }

  #[test]
  fn call_function_reports_a_missing_entry_point() {
    let out = Sandbox::default().call_function("const x = 1;", "sum", &[]);
    assert_eq!(
      out.result,
      Err(SandboxFailure::Runtime { message: "sum is not a function".to_string() })
    );
  }

  #[test]
  fn call_function_keeps_console_output_from_the_call() {
    let out = Sandbox::default().call_function(
      "function noisy(x) { console.log('got', x); return x; }",
      "noisy",
      &[json!(7)],
    );
    assert_eq!(out.result, Ok(json!(7)));
    assert_eq!(out.console.len(), 1);
    assert_eq!(out.console[0].text, "\"got\" 7");
  }

  #[test]
  fn blocked_runs_serialize_with_their_rule() {
    let run = SandboxRun::from_blocked("network-fetch");
    let wire = serde_json::to_value(&run).expect("serialize");
    assert_eq!(
      wire,
      json!({
        "returnValue": null,
        "consoleLines": [],
        "error": { "kind": "blocked", "rule": "network-fetch" }
      })
    );
  }
}
