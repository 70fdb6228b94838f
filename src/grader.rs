//! Rubric grading for open-ended challenges.
//!
//! Criteria are independent: each one is checked on its own and scored on its
//! own, so one broken criterion never contaminates the others. A passed check
//! earns full points; a failed one earns partial credit strictly below the
//! maximum, so a full score always means every check actually passed.

use rand::seq::SliceRandom;
use regex::Regex;
use serde::Serialize;
use tracing::error;

use crate::domain::{CriterionCheck, RubricCriterion};
use crate::runner::run_cases;
use crate::sandbox::Sandbox;
use crate::seeds::CELEBRATIONS;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionResult {
  pub id: String,
  pub name: String,
  pub earned_points: u32,
  pub max_points: u32,
  pub passed: bool,
  pub feedback: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
  Excellent,
  Good,
  Fair,
  Poor,
  Failing,
}

impl ScoreBand {
  pub fn from_percentage(percentage: u8) -> ScoreBand {
    match percentage {
      90..=u8::MAX => ScoreBand::Excellent,
      75..=89 => ScoreBand::Good,
      60..=74 => ScoreBand::Fair,
      40..=59 => ScoreBand::Poor,
      _ => ScoreBand::Failing,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingReport {
  pub criteria: Vec<CriterionResult>,
  pub total_score: u32,
  pub max_score: u32,
  pub percentage: u8,
  pub band: ScoreBand,
  pub suggestions: Vec<String>,
}

impl GradingReport {
  /// Report for a submission the guard stopped: nothing ran, nothing earned.
  pub fn blocked(rubric: &[RubricCriterion], rule: &str) -> GradingReport {
    let max_score = rubric.iter().fold(0u32, |acc, c| acc.saturating_add(c.max_points));
    GradingReport {
      criteria: Vec::new(),
      total_score: 0,
      max_score,
      percentage: 0,
      band: ScoreBand::Failing,
      suggestions: vec![format!("Submission was blocked by rule '{}' before grading.", rule)],
    }
  }
}

/// Grade `code` against a rubric. The scored content is deterministic for a
/// given submission; only the celebratory line on a full pass is sampled.
pub fn grade(sandbox: &Sandbox, code: &str, rubric: &[RubricCriterion]) -> GradingReport {
  let mut criteria = Vec::with_capacity(rubric.len());
  let mut suggestions = Vec::new();
  let mut total_score = 0u32;
  let mut max_score = 0u32;

  for criterion in rubric {
    let (passed, case_ratio) = evaluate_check(sandbox, code, criterion);
    let (earned, feedback) = if passed {
      (criterion.max_points, criterion.pass_feedback.clone())
    } else {
      suggestions.push(criterion.fail_feedback.clone());
      (partial_credit(criterion, code, case_ratio), criterion.fail_feedback.clone())
    };
    total_score = total_score.saturating_add(earned);
    max_score = max_score.saturating_add(criterion.max_points);
    criteria.push(CriterionResult {
      id: criterion.id.clone(),
      name: criterion.name.clone(),
      earned_points: earned,
      max_points: criterion.max_points,
      passed,
      feedback,
    });
  }

  if suggestions.is_empty() && !criteria.is_empty() {
    suggestions.push(celebration());
  }

  let percentage = percentage_of(total_score, max_score);
  GradingReport {
    criteria,
    total_score,
    max_score,
    percentage,
    band: ScoreBand::from_percentage(percentage),
    suggestions,
  }
}

/// Returns whether the check passed, plus (passed, total) case counts for
/// behavioral checks so partial credit can be proportional.
fn evaluate_check(
  sandbox: &Sandbox,
  code: &str,
  criterion: &RubricCriterion,
) -> (bool, Option<(usize, usize)>) {
  match &criterion.check {
    CriterionCheck::Contains { needle } => (code.contains(needle.as_str()), None),
    CriterionCheck::Matches { pattern } => match Regex::new(pattern) {
      Ok(re) => (re.is_match(code), None),
      Err(e) => {
        error!(target: "challenge", criterion = %criterion.id, error = %e, "invalid rubric regex, criterion counts as failed");
        (false, None)
      }
    },
    CriterionCheck::Behavioral { entry_point, cases } => {
      let report = run_cases(sandbox, code, entry_point, cases);
      (report.all_passed, Some((report.passed_count, report.total_count)))
    }
  }
}

/// Partial credit for a failed criterion: the best matching partial rule, or
/// for behavioral checks the passed-case fraction of the maximum, whichever
/// is higher. Always strictly below the criterion maximum.
fn partial_credit(
  criterion: &RubricCriterion,
  code: &str,
  case_ratio: Option<(usize, usize)>,
) -> u32 {
  let cap = criterion.max_points.saturating_sub(1);
  let mut best = 0u32;
  for rule in &criterion.partial {
    if rule.points > best && code.contains(rule.contains.as_str()) {
      best = rule.points;
    }
  }
  if let Some((passed, total)) = case_ratio {
    if total > 0 {
      let scaled = (criterion.max_points as u64 * passed as u64 / total as u64) as u32;
      if scaled > best {
        best = scaled;
      }
    }
  }
  best.min(cap)
}

fn percentage_of(total: u32, max: u32) -> u8 {
  if max == 0 {
    return 0;
  }
  (total as f64 / max as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

fn celebration() -> String {
  let mut rng = rand::thread_rng();
  CELEBRATIONS.choose(&mut rng).copied().unwrap_or(CELEBRATIONS[0]).to_string()
}
