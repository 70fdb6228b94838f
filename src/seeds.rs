//! Seed data and small utilities related to default content.

use serde_json::json;
use uuid::Uuid;

use crate::domain::{
  Challenge, ChallengeKind, ChallengeSource, CriterionCheck, PartialRule, RubricCriterion,
  TestCase,
};

/// Minimal set of built-in challenges that guarantee the app
/// is useful even without an external bank config.
pub fn seed_challenges() -> Vec<Challenge> {
  vec![
    Challenge {
      id: "sum-two-numbers".into(),
      track: "js-basics".into(),
      kind: ChallengeKind::FunctionTests,
      source: ChallengeSource::Seed,
      title: "Sum two numbers".into(),
      description: "Implement `sum(a, b)` so that it returns the sum of its arguments.".into(),
      template_code: "function sum(a, b) {\n  // your code here\n}\n".into(),
      entry_point: "sum".into(),
      test_cases: vec![
        TestCase { input: vec![json!(2), json!(3)], expected: json!(5) },
        TestCase { input: vec![json!(0), json!(0)], expected: json!(0) },
        TestCase { input: vec![json!(-1), json!(1)], expected: json!(0) },
      ],
      rubric: Vec::new(),
      template_html: String::new(),
      template_css: String::new(),
      template_js: String::new(),
      xp_reward: 50,
      hint: "Add the two parameters with `+` and return the result.".into(),
    },
    Challenge {
      id: "greet".into(),
      track: "js-strings".into(),
      kind: ChallengeKind::FunctionTests,
      source: ChallengeSource::Seed,
      title: "Greet by name".into(),
      description: "Implement `greet(name)` returning `Hello, <name>!`.".into(),
      template_code: "function greet(name) {\n  // your code here\n}\n".into(),
      entry_point: "greet".into(),
      test_cases: vec![
        TestCase { input: vec![json!("World")], expected: json!("Hello, World!") },
        TestCase { input: vec![json!("Ada")], expected: json!("Hello, Ada!") },
      ],
      rubric: Vec::new(),
      template_html: String::new(),
      template_css: String::new(),
      template_js: String::new(),
      xp_reward: 40,
      hint: "Concatenate with `+`: 'Hello, ' + name + '!'.".into(),
    },
    Challenge {
      id: "evens-doubled".into(),
      track: "js-arrays".into(),
      kind: ChallengeKind::RubricGraded,
      source: ChallengeSource::Seed,
      title: "Evens, doubled".into(),
      description:
        "Write `evensDoubled(numbers)` that keeps the even numbers and doubles each of them."
          .into(),
      template_code: "function evensDoubled(numbers) {\n  return numbers;\n}\n".into(),
      entry_point: "evensDoubled".into(),
      test_cases: Vec::new(),
      rubric: vec![
        RubricCriterion {
          id: "uses-filter".into(),
          name: "Uses Array.filter".into(),
          max_points: 30,
          check: CriterionCheck::Contains { needle: ".filter(".into() },
          partial: vec![PartialRule { contains: "for".into(), points: 10 }],
          pass_feedback: "Good: filtering keeps the selection logic declarative.".into(),
          fail_feedback: "Try `.filter(...)` to keep only the even numbers.".into(),
        },
        RubricCriterion {
          id: "uses-map".into(),
          name: "Uses Array.map".into(),
          max_points: 30,
          check: CriterionCheck::Contains { needle: ".map(".into() },
          partial: vec![PartialRule { contains: "for".into(), points: 10 }],
          pass_feedback: "Good: mapping expresses the transformation directly.".into(),
          fail_feedback: "Use `.map(...)` to double each remaining number.".into(),
        },
        RubricCriterion {
          id: "returns-result".into(),
          name: "Returns the result".into(),
          max_points: 20,
          check: CriterionCheck::Matches { pattern: r"\breturn\b".into() },
          partial: Vec::new(),
          pass_feedback: "The function returns its result.".into(),
          fail_feedback: "Remember to `return` the resulting array.".into(),
        },
        RubricCriterion {
          id: "behavior".into(),
          name: "Behaves correctly".into(),
          max_points: 20,
          check: CriterionCheck::Behavioral {
            entry_point: "evensDoubled".into(),
            cases: vec![
              TestCase { input: vec![json!([1, 2, 3, 4])], expected: json!([4, 8]) },
              TestCase { input: vec![json!([])], expected: json!([]) },
              TestCase { input: vec![json!([5, 7])], expected: json!([]) },
            ],
          },
          partial: Vec::new(),
          pass_feedback: "All behavior cases pass.".into(),
          fail_feedback: "Check the edge cases: empty input and all-odd input.".into(),
        },
      ],
      template_html: String::new(),
      template_css: String::new(),
      template_js: String::new(),
      xp_reward: 80,
      hint: "Chain `.filter(...)` then `.map(...)`, and return the array.".into(),
    },
    Challenge {
      id: "web-card".into(),
      track: "web-basics".into(),
      kind: ChallengeKind::WebPreview,
      source: ChallengeSource::Seed,
      title: "Profile card".into(),
      description: "Build a small profile card. Style it in the CSS pane and add a click \
                    interaction in the JS pane."
        .into(),
      template_code: String::new(),
      entry_point: String::new(),
      test_cases: Vec::new(),
      rubric: Vec::new(),
      template_html: "<div class=\"card\">\n  <h2>Your name</h2>\n  <p>A short tagline goes here.</p>\n</div>\n".into(),
      template_css: ".card {\n  max-width: 260px;\n  padding: 16px;\n  border-radius: 12px;\n  box-shadow: 0 2px 12px rgba(0, 0, 0, 0.15);\n  font-family: sans-serif;\n}\n".into(),
      template_js: "const card = document.querySelector('.card');\ncard.addEventListener('click', () => {\n  card.classList.toggle('active');\n});\n".into(),
      xp_reward: 60,
      hint: "Start from `.card` in the CSS pane; the JS pane can toggle a class on click.".into(),
    },
  ]
}

/// Absolute last-resort fallback: if every pool is empty for a track, we
/// inject this.
pub fn hard_fallback_challenge(track: String) -> Challenge {
  Challenge {
    id: Uuid::new_v4().to_string(),
    track,
    kind: ChallengeKind::FunctionTests,
    source: ChallengeSource::Seed,
    title: "Echo".into(),
    description: "Write `echo(value)` that returns its argument unchanged.".into(),
    template_code: "function echo(value) {\n  // your code here\n}\n".into(),
    entry_point: "echo".into(),
    test_cases: vec![
      TestCase { input: vec![json!(42)], expected: json!(42) },
      TestCase { input: vec![json!("hi")], expected: json!("hi") },
    ],
    rubric: Vec::new(),
    template_html: String::new(),
    template_css: String::new(),
    template_js: String::new(),
    xp_reward: 10,
    hint: "Return the parameter as-is.".into(),
  }
}

/// Closing lines for a flawless rubric run; the grader samples one.
pub const CELEBRATIONS: &[&str] = &[
  "Flawless run. Every criterion passed.",
  "Clean sweep! This rubric has nothing left to teach you.",
  "All checks green. On to the next one.",
  "Perfect score. Try a harder track for a real fight.",
  "Nothing to suggest: the solution covers every criterion.",
];
