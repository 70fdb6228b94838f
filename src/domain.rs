//! Domain models used by the backend: challenge kinds/sources, test cases, rubric, and challenge itself.

use serde::{Deserialize, Serialize};

/// What kind of challenge is presented to the user?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
  /// User implements a named function; it is run against literal input/output cases.
  FunctionTests,
  /// User submits free-form code; a weighted rubric of pattern/behavioral criteria scores it.
  RubricGraded,
  /// Three-pane HTML/CSS/JS exercise rendered through the live preview composer.
  WebPreview,
}
impl Default for ChallengeKind {
  fn default() -> Self { ChallengeKind::FunctionTests }
}

/// Where did we get the challenge from?
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeSource {
  LocalBank,   // from user-provided TOML bank
  Seed,  // built-in seeds (last resort)
}

/// One literal input/output pair for a FunctionTests challenge.
/// `input` is spread as positional arguments; `expected` is plain data
/// (JSON cannot express functions, so expected values stay structurally comparable).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TestCase {
  pub input: Vec<serde_json::Value>,
  pub expected: serde_json::Value,
}

/// How a rubric criterion decides pass/fail.
/// Textual checks only inspect the source; behavioral checks actually run it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionCheck {
  /// Source text contains the needle verbatim.
  Contains { needle: String },
  /// Source text matches the regex pattern.
  Matches { pattern: String },
  /// Run the submission's entry point against cases; passes only when all cases pass.
  Behavioral { entry_point: String, cases: Vec<TestCase> },
}

/// Lesser award applied when the main check fails. `points` must stay below
/// the criterion's `max_points`; bank loading clamps offenders.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartialRule {
  pub contains: String,
  pub points: u32,
}

/// One weighted grading criterion. Criteria are independent: no criterion's
/// outcome feeds another's check or partial-credit computation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RubricCriterion {
  pub id: String,
  pub name: String,
  pub max_points: u32,
  pub check: CriterionCheck,
  #[serde(default)] pub partial: Vec<PartialRule>,
  pub pass_feedback: String,
  pub fail_feedback: String,
}

/// Core challenge structure persisted in-memory.
/// Immutable once inserted into the catalog; graders never mutate it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
  pub id: String,
  pub track: String,   // free-form (e.g., "js-basics", "js-arrays")
  pub kind: ChallengeKind,
  pub source: ChallengeSource,

  pub title: String,
  #[serde(default)] pub description: String,

  // FunctionTests fields
  #[serde(default)] pub template_code: String,
  #[serde(default)] pub entry_point: String,
  #[serde(default)] pub test_cases: Vec<TestCase>,

  // RubricGraded fields
  #[serde(default)] pub rubric: Vec<RubricCriterion>,

  // WebPreview fields
  #[serde(default)] pub template_html: String,
  #[serde(default)] pub template_css: String,
  #[serde(default)] pub template_js: String,

  #[serde(default)] pub xp_reward: u32,
  #[serde(default)] pub hint: String,
}
