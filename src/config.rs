//! Loading the optional challenge bank (limits + guard rules + challenges) from TOML.
//!
//! See `BankConfig` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{ChallengeKind, RubricCriterion, TestCase};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BankConfig {
  #[serde(default)]
  pub limits: LimitsCfg,
  #[serde(default)]
  pub guard_rules: Vec<GuardRuleCfg>,
  #[serde(default)]
  pub challenges: Vec<ChallengeCfg>,
}

/// Sandbox limit overrides. Absent fields keep the built-in defaults.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct LimitsCfg {
  #[serde(default)] pub max_source_len: Option<usize>,
  #[serde(default)] pub step_budget: Option<u64>,
  #[serde(default)] pub max_console_lines: Option<usize>,
}

/// Extra guard rule appended after the built-in set.
#[derive(Clone, Debug, Deserialize)]
pub struct GuardRuleCfg {
  pub name: String,
  pub pattern: String,
}

/// Challenge entry accepted in TOML configuration.
/// Fill the branch matching `kind` (tests vs rubric vs web panes);
/// bank loading validates the rest.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeCfg {
  #[serde(default)] pub id: Option<String>,
  pub track: String,
  #[serde(default)] pub kind: Option<ChallengeKind>,
  pub title: String,
  #[serde(default)] pub description: String,
  // function_tests
  #[serde(default)] pub template_code: String,
  #[serde(default)] pub entry_point: Option<String>,
  #[serde(default)] pub test_cases: Vec<TestCase>,
  // rubric_graded
  #[serde(default)] pub rubric: Vec<RubricCriterion>,
  // web_preview
  #[serde(default)] pub template_html: String,
  #[serde(default)] pub template_css: String,
  #[serde(default)] pub template_js: String,
  #[serde(default)] pub xp_reward: Option<u32>,
  #[serde(default)] pub hint: String,
}

/// Attempt to load `BankConfig` from BANK_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_bank_config_from_env() -> Option<BankConfig> {
  let path = std::env::var("BANK_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<BankConfig>(&s) {
      Ok(cfg) => {
        info!(target: "katalab_backend", %path, "Loaded challenge bank (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "katalab_backend", %path, error = %e, "Failed to parse TOML bank config");
        None
      }
    },
    Err(e) => {
      error!(target: "katalab_backend", %path, error = %e, "Failed to read TOML bank config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::CriterionCheck;

  #[test]
  fn full_bank_parses() {
    let src = r#"
      [limits]
      step_budget = 500000
      max_console_lines = 80

      [[guard_rules]]
      name = "no-with"
      pattern = "\\bwith\\s*\\("

      [[challenges]]
      id = "double"
      track = "js-basics"
      kind = "function_tests"
      title = "Double it"
      entry_point = "double"
      xp_reward = 30
      test_cases = [
        { input = [2], expected = 4 },
        { input = [0], expected = 0 },
      ]

      [[challenges]]
      track = "js-arrays"
      kind = "rubric_graded"
      title = "Sum with reduce"

      [[challenges.rubric]]
      id = "uses-reduce"
      name = "Uses reduce"
      max_points = 40
      pass_feedback = "yes"
      fail_feedback = "no"
      partial = [{ contains = "for", points = 10 }]

      [challenges.rubric.check]
      type = "contains"
      needle = ".reduce("
    "#;
    let cfg = toml::from_str::<BankConfig>(src).expect("bank should parse");
    assert_eq!(cfg.limits.step_budget, Some(500_000));
    assert_eq!(cfg.limits.max_source_len, None);
    assert_eq!(cfg.guard_rules.len(), 1);
    assert_eq!(cfg.guard_rules[0].name, "no-with");
    assert_eq!(cfg.challenges.len(), 2);
    assert_eq!(cfg.challenges[0].entry_point.as_deref(), Some("double"));
    assert_eq!(cfg.challenges[0].test_cases.len(), 2);
    assert_eq!(cfg.challenges[1].id, None);
    let crit = &cfg.challenges[1].rubric[0];
    assert_eq!(crit.partial[0].points, 10);
    match &crit.check {
      CriterionCheck::Contains { needle } => assert_eq!(needle, ".reduce("),
      other => panic!("unexpected check: {other:?}"),
    }
  }

  #[test]
  fn empty_bank_is_all_defaults() {
    let cfg = toml::from_str::<BankConfig>("").expect("empty bank should parse");
    assert!(cfg.limits.max_source_len.is_none());
    assert!(cfg.guard_rules.is_empty());
    assert!(cfg.challenges.is_empty());
  }
}
