//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Failures in user code stay inside the JSON payloads; only the preview
//! document endpoint uses an HTTP status (404 for a revoked handle).

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::{Html, IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state), fields(track = %q.track.clone().unwrap_or_else(|| "js-basics".into())))]
pub async fn http_get_challenge(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ChallengeQuery>,
) -> impl IntoResponse {
  let track = q.track.unwrap_or_else(|| "js-basics".into());
  let (ch, origin) = state.choose_challenge(&track).await;
  info!(target: "challenge", %track, id = %ch.id, %origin, "HTTP challenge served");
  Json(to_out(&ch))
}

#[instrument(level = "info", skip(state, body), fields(code_len = body.code.len()))]
pub async fn http_post_run(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RunIn>,
) -> impl IntoResponse {
  let run = run_free_form(&state, &body.code).await;
  Json(run)
}

#[instrument(level = "info", skip(state, body), fields(%body.challenge_id, code_len = body.code.len()))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SubmitIn>,
) -> impl IntoResponse {
  match submit_solution(&state, &body.challenge_id, &body.code).await {
    Ok((report, awarded_xp, total_xp)) => {
      info!(target: "challenge", id = %body.challenge_id, all_passed = report.all_passed, awarded_xp, "HTTP submit evaluated");
      Json(SubmitOut { report: Some(report), awarded_xp, total_xp, error: None })
    }
    Err(e) => {
      let (total_xp, _) = state.progress_snapshot().await;
      Json(SubmitOut { report: None, awarded_xp: 0, total_xp, error: Some(e) })
    }
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.challenge_id, code_len = body.code.len()))]
pub async fn http_post_grade(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GradeIn>,
) -> impl IntoResponse {
  match grade_submission(&state, &body.challenge_id, &body.code).await {
    Ok(report) => {
      info!(target: "challenge", id = %body.challenge_id, score = report.total_score, "HTTP grading evaluated");
      Json(GradeOut { report: Some(report), error: None })
    }
    Err(e) => Json(GradeOut { report: None, error: Some(e) }),
  }
}

#[instrument(level = "info", skip(state), fields(%q.challenge_id))]
pub async fn http_get_hint(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HintQuery>,
) -> impl IntoResponse {
  let text = hint_text(&state, &q.challenge_id).await;
  info!(target: "challenge", id = %q.challenge_id, "HTTP hint served");
  Json(HintOut { text })
}

#[instrument(level = "info", skip(state, body), fields(%body.key, code_len = body.code.len()))]
pub async fn http_post_save_code(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SaveCodeIn>,
) -> impl IntoResponse {
  state.save_code(&body.key, body.code).await;
  Json(SaveCodeOut { ok: true })
}

#[instrument(level = "info", skip(state), fields(%q.key))]
pub async fn http_get_load_code(
  State(state): State<Arc<AppState>>,
  Query(q): Query<LoadCodeQuery>,
) -> impl IntoResponse {
  let code = state.load_code(&q.key).await;
  Json(LoadCodeOut { code })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (xp, solved) = state.progress_snapshot().await;
  Json(ProgressOut { xp, solved })
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session, html_len = body.html.len(), css_len = body.css.len(), js_len = body.js.len()))]
pub async fn http_post_preview(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PreviewIn>,
) -> impl IntoResponse {
  let (preview_id, revision) = state.previews.publish(&body.session, &body.html, &body.css, &body.js).await;
  info!(target: "katalab_backend", session = %body.session, %preview_id, revision, "Preview published");
  Json(PreviewOut { preview_id, revision })
}

/// Serve a published preview document. The CSP sandbox forces an opaque
/// origin, so the document cannot reach the host SPA's state.
#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_preview_doc(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match state.previews.fetch(&id).await {
    Some(doc) => (
      [
        (header::CONTENT_SECURITY_POLICY, "sandbox allow-scripts"),
        (header::CACHE_CONTROL, "no-store"),
      ],
      Html(doc),
    )
      .into_response(),
    None => StatusCode::NOT_FOUND.into_response(),
  }
}
