//! Live preview documents for web challenges.
//!
//! `compose` folds the three editor panes into one self-contained HTML
//! document. The script pane runs inside a try/catch that surfaces errors as
//! a visible banner instead of a silent white page. Published documents are
//! addressed by a throwaway id; every recomposition revokes the previous id,
//! so stale preview URLs stop resolving instead of showing old content.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

/// Compose a full preview document from the html/css/js panes.
pub fn compose(html: &str, css: &str, js: &str) -> String {
  let css = defuse(css, "style");
  let js = defuse(js, "script");
  format!(
    "<!doctype html>\n\
     <html>\n\
     <head>\n\
     <meta charset=\"utf-8\">\n\
     <style>\n{css}\n</style>\n\
     </head>\n\
     <body>\n\
     {html}\n\
     <script>\n\
     try {{\n{js}\n}} catch (err) {{\n\
     \x20 var banner = document.createElement('div');\n\
     \x20 banner.style.cssText = 'position:fixed;left:8px;right:8px;bottom:8px;padding:8px 12px;background:#7f1d1d;color:#fff;font:13px/1.4 monospace;border-radius:6px;z-index:9999';\n\
     \x20 banner.textContent = 'Script error: ' + (err && err.message ? err.message : err);\n\
     \x20 document.body.appendChild(banner);\n\
     }}\n\
     </script>\n\
     </body>\n\
     </html>\n"
  )
}

/// Break `</style` / `</script` sequences (any case) inside embedded panes so
/// user content cannot close its host block early. The escaped form parses
/// back to the same text inside CSS and JS strings.
fn defuse(content: &str, tag: &str) -> String {
  let needle = format!("</{}", tag);
  let needle = needle.as_bytes();
  let bytes = content.as_bytes();
  let mut out = Vec::with_capacity(bytes.len());
  let mut i = 0;
  while i < bytes.len() {
    if i + needle.len() <= bytes.len() && bytes[i..i + needle.len()].eq_ignore_ascii_case(needle) {
      out.extend_from_slice(b"<\\/");
      out.extend_from_slice(&bytes[i + 2..i + needle.len()]);
      i += needle.len();
    } else {
      out.push(bytes[i]);
      i += 1;
    }
  }
  String::from_utf8(out).unwrap_or_else(|_| content.to_string())
}

/// Published preview documents, one current handle per session.
#[derive(Clone, Default)]
pub struct PreviewStore {
  docs: Arc<RwLock<HashMap<String, String>>>,
  current: Arc<RwLock<HashMap<String, (String, u64)>>>,
}

impl PreviewStore {
  pub fn new() -> PreviewStore {
    PreviewStore::default()
  }

  /// Compose and publish a document for a session, revoking the session's
  /// previous handle. Returns the fresh preview id and a monotonically
  /// increasing revision for the session.
  pub async fn publish(&self, session: &str, html: &str, css: &str, js: &str) -> (String, u64) {
    let doc = compose(html, css, js);
    let preview_id = Uuid::new_v4().to_string();
    let mut docs = self.docs.write().await;
    let mut current = self.current.write().await;
    let revision = match current.get(session) {
      Some((old_id, revision)) => {
        docs.remove(old_id);
        revision + 1
      }
      None => 1,
    };
    docs.insert(preview_id.clone(), doc);
    current.insert(session.to_string(), (preview_id.clone(), revision));
    (preview_id, revision)
  }

  pub async fn fetch(&self, preview_id: &str) -> Option<String> {
    self.docs.read().await.get(preview_id).cloned()
  }

  /// Forget everything a session published. Called on disconnect.
  pub async fn drop_session(&self, session: &str) {
    let mut docs = self.docs.write().await;
    let mut current = self.current.write().await;
    if let Some((preview_id, _)) = current.remove(session) {
      docs.remove(&preview_id);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compose_embeds_all_three_panes() {
    let doc = compose("<h1>Card</h1>", "h1 { color: teal; }", "console.log('ready');");
    assert!(doc.contains("<h1>Card</h1>"));
    assert!(doc.contains("h1 { color: teal; }"));
    assert!(doc.contains("console.log('ready');"));
    assert!(doc.contains("try {"));
    assert!(doc.contains("'Script error: '"));
  }

  #[test]
  fn closing_tags_inside_panes_are_defused() {
    let doc = compose("", "body {} </style><b>bad</b>", "let s = '</script></ScRiPt>';");
    // Only the document's own closing tags survive.
    assert_eq!(doc.matches("</style>").count(), 1);
    assert_eq!(doc.matches("</script>").count(), 1);
    assert!(doc.contains("<\\/style>"));
    assert!(doc.contains("<\\/script>"));
    assert!(doc.contains("<\\/ScRiPt>"));
  }

  #[tokio::test]
  async fn publishing_revokes_the_previous_handle() {
    let store = PreviewStore::new();
    let (first, rev1) = store.publish("s1", "<p>1</p>", "", "").await;
    assert_eq!(rev1, 1);
    assert!(store.fetch(&first).await.is_some());

    let (second, rev2) = store.publish("s1", "<p>2</p>", "", "").await;
    assert_eq!(rev2, 2);
    assert_ne!(first, second);
    assert!(store.fetch(&first).await.is_none());
    let doc = store.fetch(&second).await.expect("current doc");
    assert!(doc.contains("<p>2</p>"));
  }

  #[tokio::test]
  async fn sessions_publish_independently() {
    let store = PreviewStore::new();
    let (a, _) = store.publish("alice", "<p>a</p>", "", "").await;
    let (b, _) = store.publish("bob", "<p>b</p>", "", "").await;
    store.publish("alice", "<p>a2</p>", "", "").await;
    assert!(store.fetch(&a).await.is_none());
    assert!(store.fetch(&b).await.is_some());
  }

  #[tokio::test]
  async fn drop_session_clears_documents_and_resets_revisions() {
    let store = PreviewStore::new();
    let (id, _) = store.publish("s1", "<p>x</p>", "", "").await;
    store.drop_session("s1").await;
    assert!(store.fetch(&id).await.is_none());
    let (_, revision) = store.publish("s1", "<p>y</p>", "", "").await;
    assert_eq!(revision, 1);
  }
}
