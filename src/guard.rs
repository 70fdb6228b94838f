//! Pre-execution denylist scan over submitted source text.
//!
//! This is a best-effort text filter, NOT a security boundary: it is trivially
//! bypassable (string concatenation can reconstruct any banned token) and must
//! never be presented as sandboxing. Actual containment comes from the
//! capability-restricted interpreter in `script`/`sandbox`; this scan exists to
//! give fast, named feedback for the obvious cases before anything runs.

use regex::Regex;
use serde::Serialize;
use tracing::error;

/// Built-in rules, checked in order; the first match wins.
const DEFAULT_RULES: &[(&str, &str)] = &[
  ("dynamic-eval", r"\beval\s*\("),
  ("function-constructor", r"\bnew\s+Function\b|\bFunction\s*\("),
  ("timer-set-timeout", r"\bsetTimeout\s*\("),
  ("timer-set-interval", r"\bsetInterval\s*\("),
  ("browser-document", r"\bdocument\b"),
  ("browser-window", r"\bwindow\b"),
  ("browser-navigator", r"\bnavigator\b"),
  ("browser-location", r"\blocation\b"),
  ("storage-local", r"\blocalStorage\b"),
  ("storage-session", r"\bsessionStorage\b"),
  ("network-fetch", r"\bfetch\s*\("),
  ("network-xhr", r"\bXMLHttpRequest\b"),
  ("global-this", r"\bglobalThis\b"),
  ("node-process", r"\bprocess\b"),
  ("node-require", r"\brequire\s*\("),
  ("dynamic-import", r"\bimport\s*\("),
  ("loop-while-true", r"while\s*\(\s*true\s*\)"),
  ("loop-for-ever", r"for\s*\(\s*;\s*;\s*\)"),
  ("proto-escape", r"__proto__"),
];

#[derive(Clone, Debug)]
struct DenyRule {
  name: String,
  pattern: Regex,
}

/// Result of a denylist hit: names the matched rule, nothing more.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BlockedPattern {
  pub rule: String,
}

/// Ordered denylist over source text. Owns its compiled rules; no ambient
/// global tables.
#[derive(Clone, Debug)]
pub struct Guard {
  rules: Vec<DenyRule>,
}

impl Guard {
  /// Guard with the built-in rule set only.
  pub fn new() -> Self {
    Self { rules: compile_rules(DEFAULT_RULES.iter().map(|(n, p)| (*n, *p))) }
  }

  /// Guard with the built-in rules plus bank-supplied extras (appended after
  /// the defaults, preserving order). Invalid patterns are skipped with an
  /// error log, never fatal.
  pub fn with_extra_rules<'a>(extra: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    let mut rules = compile_rules(DEFAULT_RULES.iter().map(|(n, p)| (*n, *p)));
    rules.extend(compile_rules(extra));
    Self { rules }
  }

  /// Scan source text against the ordered rule list. Returns the first match,
  /// or None when the text is clean. Empty source is never blocked; callers
  /// handle empty submissions separately. Pure and total.
  pub fn scan(&self, source: &str) -> Option<BlockedPattern> {
    if source.is_empty() {
      return None;
    }
    self
      .rules
      .iter()
      .find(|r| r.pattern.is_match(source))
      .map(|r| BlockedPattern { rule: r.name.clone() })
  }
}

impl Default for Guard {
  fn default() -> Self {
    Self::new()
  }
}

fn compile_rules<'a>(defs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<DenyRule> {
  let mut out = Vec::new();
  for (name, pattern) in defs {
    match Regex::new(pattern) {
      Ok(re) => out.push(DenyRule { name: name.to_string(), pattern: re }),
      Err(e) => {
        error!(target: "sandbox", rule = name, error = %e, "Skipping invalid denylist pattern");
      }
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timer_scheduling_is_blocked() {
    let g = Guard::new();
    let hit = g.scan("setInterval(f, 10)").expect("should block");
    assert_eq!(hit.rule, "timer-set-interval");
    assert!(g.scan("setTimeout(step, 0)").is_some());
  }

  #[test]
  fn plain_arithmetic_is_not_blocked() {
    let g = Guard::new();
    assert_eq!(g.scan("let x = 1 + 2;"), None);
    assert_eq!(g.scan("function sum(a, b) { return a + b; }"), None);
  }

  #[test]
  fn empty_source_is_never_blocked() {
    assert_eq!(Guard::new().scan(""), None);
  }

  #[test]
  fn literal_infinite_loops_are_blocked() {
    let g = Guard::new();
    assert!(g.scan("while (true) {}").is_some());
    assert!(g.scan("while(true){}").is_some());
    assert!(g.scan("for (;;) {}").is_some());
    assert!(g.scan("for(;;){}").is_some());
    // A bounded loop is fine.
    assert_eq!(g.scan("for (let i = 0; i < 3; i++) {}"), None);
  }

  #[test]
  fn browser_globals_and_dynamic_eval_are_blocked() {
    let g = Guard::new();
    assert_eq!(g.scan("eval('1+1')").map(|b| b.rule), Some("dynamic-eval".into()));
    assert!(g.scan("document.title = 'x'").is_some());
    assert!(g.scan("window.open('/')").is_some());
    assert!(g.scan("localStorage.setItem('k', 'v')").is_some());
    assert!(g.scan("fetch('/api')").is_some());
    assert!(g.scan("new Function('return 1')()").is_some());
  }

  #[test]
  fn first_matching_rule_names_the_block() {
    // "eval(" appears after "document" in the source but "dynamic-eval"
    // precedes "browser-document" in rule order.
    let g = Guard::new();
    let hit = g.scan("document; eval('x')").expect("should block");
    assert_eq!(hit.rule, "dynamic-eval");
  }

  #[test]
  fn extra_rules_extend_the_defaults() {
    let g = Guard::with_extra_rules([("no-alert", r"\balert\s*\(")]);
    assert_eq!(g.scan("alert('hi')").map(|b| b.rule), Some("no-alert".into()));
    assert!(g.scan("let ok = true;").is_none());
  }

  #[test]
  fn invalid_extra_rule_is_skipped() {
    let g = Guard::with_extra_rules([("broken", "(unclosed")]);
    // Defaults still apply; the broken rule is simply absent.
    assert!(g.scan("eval('x')").is_some());
    assert!(g.scan("perfectly fine text").is_none());
  }
}
