//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic; a request can yield more than one reply (a result
//! plus a follow-up notice for the toast rail).
//!
//! Preview updates are debounced per connection: keystroke-driven updates are
//! staged and published only after a quiet period, while `immediate` ones
//! (explicit run) publish at once. The connection owns a preview session whose
//! documents are dropped on disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::logic::*;
use crate::protocol::{to_out, ClientWsMessage, NoticeKind, ServerWsMessage};
use crate::runner::CaseReport;
use crate::state::AppState;
use crate::util::trunc_for_log;

const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(500);

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let session = Uuid::new_v4().to_string();
  info!(target: "katalab_backend", %session, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, session))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, session: String) {
  info!(target: "katalab_backend", "WebSocket connected");
  let mut pending: Option<(String, String, String)> = None;
  let mut deadline = Instant::now();

  'conn: loop {
    tokio::select! {
      maybe = socket.recv() => {
        let Some(Ok(msg)) = maybe else { break 'conn };
        match msg {
          Message::Text(txt) => {
            match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(ClientWsMessage::PreviewUpdate { html, css, js, immediate: false }) => {
                pending = Some((html, css, js));
                deadline = Instant::now() + PREVIEW_DEBOUNCE;
              }
              Ok(incoming) => {
                debug!(target: "katalab_backend", "WS received: {:?}", &incoming);
                for reply in handle_client_ws(incoming, &state, &session).await {
                  if let Err(e) = send_msg(&mut socket, &reply).await {
                    error!(target: "katalab_backend", error = %e, "WS send error");
                    break 'conn;
                  }
                }
              }
              Err(e) => {
                debug!(target: "katalab_backend", raw = %trunc_for_log(&txt, 256), "WS parse failure");
                let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
                if send_msg(&mut socket, &reply).await.is_err() {
                  break 'conn;
                }
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break 'conn,
          _ => {}
        }
      }
      _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
        if let Some((html, css, js)) = pending.take() {
          let (preview_id, revision) = state.previews.publish(&session, &html, &css, &js).await;
          debug!(target: "katalab_backend", %session, %preview_id, revision, "Debounced preview published");
          let reply = ServerWsMessage::PreviewReady { preview_id, revision };
          if send_msg(&mut socket, &reply).await.is_err() {
            break 'conn;
          }
        }
      }
    }
  }

  state.previews.drop_session(&session).await;
  info!(target: "katalab_backend", %session, "WebSocket disconnected");
}

async fn send_msg(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  session: &str,
) -> Vec<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

    ClientWsMessage::NewChallenge { track } => {
      let (ch, origin) = state.choose_challenge(&track).await;
      info!(target: "challenge", %track, id = %ch.id, %origin, "WS new_challenge served");
      vec![ServerWsMessage::Challenge { challenge: to_out(&ch) }]
    }

    ClientWsMessage::RunCode { code } => {
      let run = run_free_form(state, &code).await;
      let notice = run.error.as_ref().map(|failure| ServerWsMessage::Notice {
        kind: NoticeKind::Error,
        message: failure.to_string(),
      });
      let mut replies = vec![ServerWsMessage::RunResult { run }];
      replies.extend(notice);
      replies
    }

    ClientWsMessage::SubmitSolution { challenge_id, code } => {
      match submit_solution(state, &challenge_id, &code).await {
        Ok((report, awarded_xp, total_xp)) => {
          info!(target: "challenge", id = %challenge_id, all_passed = report.all_passed, awarded_xp, "WS submit evaluated");
          let notice = verdict_notice(&report, awarded_xp);
          vec![
            ServerWsMessage::Verdict { challenge_id, report, awarded_xp, total_xp },
            notice,
          ]
        }
        Err(message) => vec![ServerWsMessage::Error { message }],
      }
    }

    ClientWsMessage::GradeCode { challenge_id, code } => {
      match grade_submission(state, &challenge_id, &code).await {
        Ok(report) => {
          info!(target: "challenge", id = %challenge_id, score = report.total_score, "WS grading evaluated");
          let notice = ServerWsMessage::Notice {
            kind: NoticeKind::Info,
            message: format!(
              "Score {}/{} ({}%).",
              report.total_score, report.max_score, report.percentage
            ),
          };
          vec![ServerWsMessage::Grading { report }, notice]
        }
        Err(message) => vec![ServerWsMessage::Error { message }],
      }
    }

    ClientWsMessage::PreviewUpdate { html, css, js, .. } => {
      let (preview_id, revision) = state.previews.publish(session, &html, &css, &js).await;
      info!(target: "katalab_backend", %session, %preview_id, revision, "Preview published");
      vec![ServerWsMessage::PreviewReady { preview_id, revision }]
    }

    ClientWsMessage::SaveCode { key, code } => {
      state.save_code(&key, code).await;
      vec![ServerWsMessage::CodeSaved { key }]
    }

    ClientWsMessage::LoadCode { key } => {
      let code = state.load_code(&key).await;
      vec![ServerWsMessage::CodeLoaded { key, code }]
    }

    ClientWsMessage::Hint { challenge_id } => {
      let text = hint_text(state, &challenge_id).await;
      info!(target: "challenge", id = %challenge_id, "WS hint served");
      vec![ServerWsMessage::Hint { text }]
    }

    ClientWsMessage::Progress => {
      let (xp, solved) = state.progress_snapshot().await;
      vec![ServerWsMessage::Progress { xp, solved }]
    }
  }
}

fn verdict_notice(report: &CaseReport, awarded_xp: u32) -> ServerWsMessage {
  if report.all_passed {
    let message = if awarded_xp > 0 {
      format!("All {} tests passed! +{} XP", report.total_count, awarded_xp)
    } else {
      format!("All {} tests passed!", report.total_count)
    };
    ServerWsMessage::Notice { kind: NoticeKind::Success, message }
  } else {
    ServerWsMessage::Notice {
      kind: NoticeKind::Info,
      message: format!("{} of {} tests passed.", report.passed_count, report.total_count),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn submit_yields_a_verdict_then_a_success_notice() {
    let state = AppState::new();
    let replies = handle_client_ws(
      ClientWsMessage::SubmitSolution {
        challenge_id: "sum-two-numbers".into(),
        code: "function sum(a, b) { return a + b; }".into(),
      },
      &state,
      "test-session",
    )
    .await;
    assert_eq!(replies.len(), 2);
    match &replies[0] {
      ServerWsMessage::Verdict { awarded_xp, total_xp, report, .. } => {
        assert!(report.all_passed);
        assert_eq!(*awarded_xp, 50);
        assert_eq!(*total_xp, 50);
      }
      other => panic!("expected verdict, got {other:?}"),
    }
    match &replies[1] {
      ServerWsMessage::Notice { kind: NoticeKind::Success, message } => {
        assert!(message.contains("+50 XP"));
      }
      other => panic!("expected success notice, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn failed_run_carries_an_error_notice() {
    let state = AppState::new();
    let replies = handle_client_ws(
      ClientWsMessage::RunCode { code: "let x =".into() },
      &state,
      "test-session",
    )
    .await;
    assert_eq!(replies.len(), 2);
    assert!(matches!(&replies[0], ServerWsMessage::RunResult { run } if run.error.is_some()));
    assert!(matches!(
      &replies[1],
      ServerWsMessage::Notice { kind: NoticeKind::Error, .. }
    ));
  }

  fn preview_update(html: &str) -> ClientWsMessage {
    ClientWsMessage::PreviewUpdate {
      html: html.into(),
      css: String::new(),
      js: String::new(),
      immediate: true,
    }
  }

  fn preview_handle(replies: &[ServerWsMessage]) -> (String, u64) {
    match &replies[0] {
      ServerWsMessage::PreviewReady { preview_id, revision } => (preview_id.clone(), *revision),
      other => panic!("expected preview_ready, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn preview_updates_replace_the_previous_handle() {
    let state = AppState::new();
    let first = handle_client_ws(preview_update("<b>one</b>"), &state, "s1").await;
    let (id1, rev1) = preview_handle(&first);
    let second = handle_client_ws(preview_update("<b>two</b>"), &state, "s1").await;
    let (id2, rev2) = preview_handle(&second);
    assert_eq!(rev1, 1);
    assert_eq!(rev2, 2);
    assert_ne!(id1, id2);
    assert!(state.previews.fetch(&id1).await.is_none());
    assert!(state.previews.fetch(&id2).await.is_some());
  }

  #[tokio::test]
  async fn unknown_challenge_comes_back_as_a_transport_error() {
    let state = AppState::new();
    let replies = handle_client_ws(
      ClientWsMessage::GradeCode { challenge_id: "missing".into(), code: "let x = 1;".into() },
      &state,
      "test-session",
    )
    .await;
    assert!(matches!(&replies[0], ServerWsMessage::Error { message } if message.contains("missing")));
  }
}
