//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge code/console payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let cut = s
      .char_indices()
      .take_while(|(i, _)| *i <= max)
      .last()
      .map(|(i, _)| i)
      .unwrap_or(0);
    format!("{}… ({} bytes total)", &s[..cut], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_strings_pass_through() {
    assert_eq!(trunc_for_log("let x = 1;", 64), "let x = 1;");
  }

  #[test]
  fn long_strings_cut_on_a_char_boundary() {
    let s = "éééééééé";
    let out = trunc_for_log(s, 5);
    assert!(out.starts_with("éé"));
    assert!(out.contains("16 bytes total"));
  }
}
