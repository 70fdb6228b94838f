//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Free-form runs (guard scan, then the sandbox off-thread)
//!   - Submitting solutions against test cases (XP awarded on a full pass)
//!   - Rubric grading
//!   - Hint lookup
//!
//! Every evaluation goes through `spawn_blocking` so a submission spending its
//! whole step budget never stalls the event loop.

use tracing::{error, info, instrument};

use crate::domain::ChallengeKind;
use crate::grader::{grade, GradingReport};
use crate::runner::{failed_for_all, run_cases, CaseReport};
use crate::sandbox::{SandboxFailure, SandboxRun};
use crate::state::AppState;

/// Run free-form code and report whatever it produced. Blocked code never
/// reaches the sandbox.
#[instrument(level = "info", skip(state, code), fields(code_len = code.len()))]
pub async fn run_free_form(state: &AppState, code: &str) -> SandboxRun {
  if let Some(hit) = state.guard.scan(code) {
    info!(target: "sandbox", rule = %hit.rule, "Blocked free-form run");
    return SandboxRun::from_blocked(&hit.rule);
  }
  let sandbox = state.sandbox.clone();
  let source = code.to_string();
  match tokio::task::spawn_blocking(move || sandbox.run(&source)).await {
    Ok(run) => run,
    Err(e) => {
      error!(target: "sandbox", error = %e, "Sandboxed run task failed");
      SandboxRun {
        return_value: None,
        console: Vec::new(),
        error: Some(SandboxFailure::Runtime { message: "evaluation task failed".into() }),
      }
    }
  }
}

/// Run a submission against its challenge's test cases. On a full pass the
/// challenge is recorded solved and XP is awarded, at most once; repeats
/// return the report with zero awarded XP. Returns the report, the XP awarded
/// by this call, and the resulting XP total.
#[instrument(level = "info", skip(state, code), fields(%challenge_id, code_len = code.len()))]
pub async fn submit_solution(
  state: &AppState,
  challenge_id: &str,
  code: &str,
) -> Result<(CaseReport, u32, u64), String> {
  let Some(ch) = state.get_challenge(challenge_id).await else {
    return Err(format!("Unknown challengeId: {}", challenge_id));
  };
  if ch.entry_point.is_empty() || ch.test_cases.is_empty() {
    return Err(format!("Challenge '{}' has no test cases to run.", challenge_id));
  }

  let report = if let Some(hit) = state.guard.scan(code) {
    info!(target: "sandbox", rule = %hit.rule, id = %ch.id, "Blocked submission");
    failed_for_all(&ch.test_cases, &format!("Blocked by rule '{}'.", hit.rule))
  } else {
    let sandbox = state.sandbox.clone();
    let source = code.to_string();
    let entry = ch.entry_point.clone();
    let cases = ch.test_cases.clone();
    match tokio::task::spawn_blocking(move || run_cases(&sandbox, &source, &entry, &cases)).await
    {
      Ok(report) => report,
      Err(e) => {
        error!(target: "sandbox", error = %e, "Case run task failed");
        failed_for_all(&ch.test_cases, "evaluation task failed")
      }
    }
  };

  let mut awarded = 0u32;
  let total_xp = if report.all_passed {
    match state.record_solved(&ch.id, ch.xp_reward).await {
      Some(total) => {
        awarded = ch.xp_reward;
        info!(target: "challenge", id = %ch.id, xp = ch.xp_reward, total_xp = total, "Challenge solved");
        total
      }
      None => state.progress_snapshot().await.0,
    }
  } else {
    state.progress_snapshot().await.0
  };
  Ok((report, awarded, total_xp))
}

/// Grade a submission against its challenge's rubric. Blocked code earns a
/// zero report without running; grading never awards XP.
#[instrument(level = "info", skip(state, code), fields(%challenge_id, code_len = code.len()))]
pub async fn grade_submission(
  state: &AppState,
  challenge_id: &str,
  code: &str,
) -> Result<GradingReport, String> {
  let Some(ch) = state.get_challenge(challenge_id).await else {
    return Err(format!("Unknown challengeId: {}", challenge_id));
  };
  if ch.rubric.is_empty() {
    return Err(format!("Challenge '{}' has no rubric.", challenge_id));
  }
  if let Some(hit) = state.guard.scan(code) {
    info!(target: "sandbox", rule = %hit.rule, id = %ch.id, "Blocked grading submission");
    return Ok(GradingReport::blocked(&ch.rubric, &hit.rule));
  }
  let sandbox = state.sandbox.clone();
  let source = code.to_string();
  let rubric = ch.rubric.clone();
  match tokio::task::spawn_blocking(move || grade(&sandbox, &source, &rubric)).await {
    Ok(report) => Ok(report),
    Err(e) => {
      error!(target: "sandbox", error = %e, "Grading task failed");
      Err("Grading task failed.".into())
    }
  }
}

/// The challenge's own hint, or a generic per-kind nudge when the author
/// wrote none.
#[instrument(level = "info", skip(state), fields(%challenge_id))]
pub async fn hint_text(state: &AppState, challenge_id: &str) -> String {
  if let Some(ch) = state.get_challenge(challenge_id).await {
    if !ch.hint.is_empty() {
      return ch.hint;
    }
    match ch.kind {
      ChallengeKind::FunctionTests => format!(
        "Start from the template and make `{}` return the expected value for each case.",
        ch.entry_point
      ),
      ChallengeKind::RubricGraded => {
        "Re-read the description; each rubric criterion checks one concrete thing.".into()
      }
      ChallengeKind::WebPreview => {
        "Work pane by pane: structure in HTML, look in CSS, behavior in JS.".into()
      }
    }
  } else {
    "No hint: unknown challenge.".into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn full_pass_awards_xp_once_then_never_again() {
    let state = AppState::new();
    let code = "function sum(a, b) { return a + b; }";

    let (report, awarded, total) =
      submit_solution(&state, "sum-two-numbers", code).await.expect("known challenge");
    assert!(report.all_passed);
    assert_eq!(awarded, 50);
    assert_eq!(total, 50);

    let (report, awarded, total) =
      submit_solution(&state, "sum-two-numbers", code).await.expect("known challenge");
    assert!(report.all_passed);
    assert_eq!(awarded, 0);
    assert_eq!(total, 50);
  }

  #[tokio::test]
  async fn wrong_solution_earns_nothing() {
    let state = AppState::new();
    let (report, awarded, total) =
      submit_solution(&state, "sum-two-numbers", "function sum(a, b) { return a - b; }")
        .await
        .expect("known challenge");
    assert!(!report.all_passed);
    // a - b still passes the [0,0] case.
    assert_eq!(report.passed_count, 1);
    assert_eq!(awarded, 0);
    assert_eq!(total, 0);
  }

  #[tokio::test]
  async fn blocked_submission_fails_every_case_without_xp() {
    let state = AppState::new();
    let (report, awarded, _) =
      submit_solution(&state, "sum-two-numbers", "function sum(a, b) { return eval('a + b'); }")
        .await
        .expect("known challenge");
    assert!(!report.all_passed);
    assert_eq!(report.passed_count, 0);
    assert_eq!(report.results.len(), 3);
    for case in &report.results {
      assert_eq!(case.error.as_deref(), Some("Blocked by rule 'dynamic-eval'."));
    }
    assert_eq!(awarded, 0);
  }

  #[tokio::test]
  async fn submitting_against_an_unknown_id_is_an_error() {
    let state = AppState::new();
    assert!(submit_solution(&state, "nope", "function f() {}").await.is_err());
    assert!(grade_submission(&state, "nope", "let x = 1;").await.is_err());
  }

  #[tokio::test]
  async fn grading_a_challenge_without_a_rubric_is_an_error() {
    let state = AppState::new();
    assert!(grade_submission(&state, "sum-two-numbers", "let x = 1;").await.is_err());
  }

  #[tokio::test]
  async fn grading_blocked_code_returns_the_zero_report() {
    let state = AppState::new();
    let report = grade_submission(
      &state,
      "evens-doubled",
      "function evensDoubled(xs) { while(true) {} }",
    )
    .await
    .expect("known challenge with rubric");
    assert_eq!(report.total_score, 0);
    assert!(report.criteria.is_empty());
    assert!(report.suggestions[0].contains("loop-while-true"));
  }

  #[tokio::test]
  async fn free_form_run_reports_console_and_value() {
    let state = AppState::new();
    let run = run_free_form(&state, "console.log('hi'); 1 + 2;").await;
    assert!(run.error.is_none());
    assert_eq!(run.return_value, Some(serde_json::json!(3)));
    assert_eq!(run.console.len(), 1);
  }

  #[tokio::test]
  async fn hints_fall_back_per_kind() {
    let state = AppState::new();
    let text = hint_text(&state, "sum-two-numbers").await;
    assert!(text.contains('+'));
    assert_eq!(hint_text(&state, "missing").await, "No hint: unknown challenge.");
  }
}
