//! Runs a submission against a challenge's test cases.
//!
//! Each case gets its own sandboxed call, so one crashing case cannot take
//! the later ones with it. A value mismatch is a plain failure (`error:
//! None`); `error` is only set when the sandbox itself reported a failure.

use std::time::Instant;

use serde::Serialize;

use crate::compare::values_equal;
use crate::domain::TestCase;
use crate::sandbox::Sandbox;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
  pub test_index: usize,
  pub input: Vec<serde_json::Value>,
  pub expected: serde_json::Value,
  pub actual: Option<serde_json::Value>,
  pub passed: bool,
  pub error: Option<String>,
  pub duration_ms: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseReport {
  pub results: Vec<CaseResult>,
  pub passed_count: usize,
  pub total_count: usize,
  /// True only when every case passed AND there was at least one case.
  pub all_passed: bool,
}

impl CaseReport {
  fn from_results(results: Vec<CaseResult>) -> CaseReport {
    let passed_count = results.iter().filter(|r| r.passed).count();
    let total_count = results.len();
    CaseReport {
      all_passed: total_count > 0 && passed_count == total_count,
      passed_count,
      total_count,
      results,
    }
  }
}

/// Invoke `entry` once per test case and compare structurally.
pub fn run_cases(sandbox: &Sandbox, source: &str, entry: &str, cases: &[TestCase]) -> CaseReport {
  let mut results = Vec::with_capacity(cases.len());
  for (i, case) in cases.iter().enumerate() {
    let started = Instant::now();
    let outcome = sandbox.call_function(source, entry, &case.input);
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let result = match outcome.result {
      Ok(actual) => {
        let passed = values_equal(&actual, &case.expected);
        CaseResult {
          test_index: i,
          input: case.input.clone(),
          expected: case.expected.clone(),
          actual: Some(actual),
          passed,
          error: None,
          duration_ms,
        }
      }
      Err(failure) => CaseResult {
        test_index: i,
        input: case.input.clone(),
        expected: case.expected.clone(),
        actual: None,
        passed: false,
        error: Some(failure.to_string()),
        duration_ms,
      },
    };
    results.push(result);
  }
  CaseReport::from_results(results)
}

/// Uniform all-failed report for submissions that never reach the sandbox,
/// e.g. a guard hit.
pub fn failed_for_all(cases: &[TestCase], message: &str) -> CaseReport {
  let results = cases
    .iter()
    .enumerate()
    .map(|(i, case)| CaseResult {
      test_index: i,
      input: case.input.clone(),
      expected: case.expected.clone(),
      actual: None,
      passed: false,
      error: Some(message.to_string()),
      duration_ms: 0.0,
    })
    .collect();
  CaseReport::from_results(results)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn cases(specs: &[(&[serde_json::Value], serde_json::Value)]) -> Vec<TestCase> {
    specs
      .iter()
      .map(|(input, expected)| TestCase { input: input.to_vec(), expected: expected.clone() })
      .collect()
  }

  #[test]
  fn sum_passes_all_three_cases() {
    let cases = cases(&[
      (&[json!(2), json!(3)], json!(5)),
      (&[json!(0), json!(0)], json!(0)),
      (&[json!(-1), json!(1)], json!(0)),
    ]);
    let report = run_cases(
      &Sandbox::default(),
      "function sum(a, b) { return a + b; }",
      "sum",
      &cases,
    );
    assert_eq!(report.passed_count, 3);
    assert_eq!(report.total_count, 3);
    assert!(report.all_passed);
    assert!(report.results.iter().all(|r| r.error.is_none()));
  }

  #[test]
  fn value_mismatch_fails_without_an_error() {
    let cases = cases(&[(&[json!(2), json!(3)], json!(5))]);
    let report = run_cases(
      &Sandbox::default(),
      "function sum(a, b) { return a - b; }",
      "sum",
      &cases,
    );
    assert!(!report.all_passed);
    let r = &report.results[0];
    assert!(!r.passed);
    assert_eq!(r.actual, Some(json!(-1)));
    assert_eq!(r.error, None);
  }

  #[test]
  fn a_throwing_case_does_not_stop_the_others() {
    // Case 2 trips a runtime error; cases 1 and 3 still run and pass.
    let source = "function pick(x) { if (x === 2) { return x.boom.bam; } return x; }";
    let cases = cases(&[
      (&[json!(1)], json!(1)),
      (&[json!(2)], json!(2)),
      (&[json!(3)], json!(3)),
    ]);
    let report = run_cases(&Sandbox::default(), source, "pick", &cases);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.passed_count, 2);
    assert!(report.results[0].passed);
    assert!(!report.results[1].passed);
    assert!(report.results[1].error.as_deref().is_some_and(|e| e.contains("runtime error")));
    assert!(report.results[2].passed);
  }

  #[test]
  fn an_empty_case_list_never_counts_as_passing() {
    let report = run_cases(&Sandbox::default(), "function f() {}", "f", &[]);
    assert_eq!(report.total_count, 0);
    assert!(!report.all_passed);
  }

  #[test]
  fn missing_entry_point_fails_every_case() {
    let cases = cases(&[(&[json!(1)], json!(1)), (&[json!(2)], json!(2))]);
    let report = run_cases(&Sandbox::default(), "const sum = 4;", "sum", &cases);
    assert_eq!(report.passed_count, 0);
    assert!(report
      .results
      .iter()
      .all(|r| r.error.as_deref().is_some_and(|e| e.contains("sum is not a function"))));
  }

  #[test]
  fn failed_for_all_marks_every_case_with_the_message() {
    let cases = cases(&[(&[json!(1)], json!(1)), (&[json!(2)], json!(4))]);
    let report = failed_for_all(&cases, "blocked by rule 'network-fetch'");
    assert_eq!(report.total_count, 2);
    assert_eq!(report.passed_count, 0);
    assert!(!report.all_passed);
    for r in &report.results {
      assert_eq!(r.error.as_deref(), Some("blocked by rule 'network-fetch'"));
      assert_eq!(r.actual, None);
      assert_eq!(r.duration_ms, 0.0);
    }
  }

  #[test]
  fn reports_serialize_in_camel_case() {
    let cases = cases(&[(&[json!(2), json!(3)], json!(5))]);
    let report = run_cases(
      &Sandbox::default(),
      "function sum(a, b) { return a + b; }",
      "sum",
      &cases,
    );
    let wire = serde_json::to_value(&report).expect("serialize");
    assert!(wire["results"][0].get("testIndex").is_some());
    assert!(wire["results"][0].get("durationMs").is_some());
    assert!(wire.get("passedCount").is_some());
    assert!(wire.get("allPassed").is_some());
  }
}
