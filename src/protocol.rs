//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! Failures in user code (blocked/compile/runtime) are data inside result
//! payloads; the transport-level `error` message is reserved for malformed
//! requests and unknown ids.

use serde::{Deserialize, Serialize};

use crate::domain::{Challenge, ChallengeKind, ChallengeSource, TestCase};
use crate::grader::GradingReport;
use crate::runner::CaseReport;
use crate::sandbox::SandboxRun;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewChallenge {
        track: String,
    },
    RunCode {
        code: String,
    },
    SubmitSolution {
        #[serde(rename = "challengeId")]
        challenge_id: String,
        code: String,
    },
    GradeCode {
        #[serde(rename = "challengeId")]
        challenge_id: String,
        code: String,
    },
    PreviewUpdate {
        html: String,
        css: String,
        js: String,
        /// Skip the debounce (explicit "run" button press).
        #[serde(default)]
        immediate: bool,
    },
    SaveCode {
        key: String,
        code: String,
    },
    LoadCode {
        key: String,
    },
    Hint {
        #[serde(rename = "challengeId")]
        challenge_id: String,
    },
    Progress,
}

/// Kind of toast the frontend should show for a notice.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Challenge {
        challenge: ChallengeOut,
    },
    RunResult {
        run: SandboxRun,
    },
    Verdict {
        #[serde(rename = "challengeId")]
        challenge_id: String,
        report: CaseReport,
        #[serde(rename = "awardedXp")]
        awarded_xp: u32,
        #[serde(rename = "totalXp")]
        total_xp: u64,
    },
    Grading {
        report: GradingReport,
    },
    PreviewReady {
        #[serde(rename = "previewId")]
        preview_id: String,
        revision: u64,
    },
    CodeSaved {
        key: String,
    },
    CodeLoaded {
        key: String,
        code: Option<String>,
    },
    Hint {
        text: String,
    },
    Progress {
        xp: u64,
        solved: Vec<String>,
    },
    Notice {
        kind: NoticeKind,
        message: String,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for challenge delivery. Omits the rubric
/// (grading patterns would leak the answers) and the hint (requested
/// separately).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeOut {
    pub id: String,
    pub track: String,
    pub kind: ChallengeKind,
    pub source: ChallengeSource,
    pub title: String,
    pub description: String,
    pub template_code: String,
    pub entry_point: String,
    pub test_cases: Vec<TestCase>,
    pub template_html: String,
    pub template_css: String,
    pub template_js: String,
    pub xp_reward: u32,
}

/// Convert full `Challenge` (internal) to the public DTO.
pub fn to_out(c: &Challenge) -> ChallengeOut {
    ChallengeOut {
        id: c.id.clone(),
        track: c.track.clone(),
        kind: c.kind.clone(),
        source: c.source.clone(),
        title: c.title.clone(),
        description: c.description.clone(),
        template_code: c.template_code.clone(),
        entry_point: c.entry_point.clone(),
        test_cases: c.test_cases.clone(),
        template_html: c.template_html.clone(),
        template_css: c.template_css.clone(),
        template_js: c.template_js.clone(),
        xp_reward: c.xp_reward,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub track: Option<String>,
}

#[derive(Deserialize)]
pub struct RunIn {
    pub code: String,
}

#[derive(Deserialize)]
pub struct SubmitIn {
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
    pub code: String,
}
#[derive(Serialize)]
pub struct SubmitOut {
    pub report: Option<CaseReport>,
    #[serde(rename = "awardedXp")]
    pub awarded_xp: u32,
    #[serde(rename = "totalXp")]
    pub total_xp: u64,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct GradeIn {
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
    pub code: String,
}
#[derive(Serialize)]
pub struct GradeOut {
    pub report: Option<GradingReport>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HintQuery {
    #[serde(rename = "challengeId")]
    pub challenge_id: String,
}
#[derive(Serialize)]
pub struct HintOut {
    pub text: String,
}

#[derive(Deserialize)]
pub struct SaveCodeIn {
    pub key: String,
    pub code: String,
}
#[derive(Serialize)]
pub struct SaveCodeOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoadCodeQuery {
    pub key: String,
}
#[derive(Serialize)]
pub struct LoadCodeOut {
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct ProgressOut {
    pub xp: u64,
    pub solved: Vec<String>,
}

#[derive(Deserialize)]
pub struct PreviewIn {
    #[serde(default = "default_session")]
    pub session: String,
    pub html: String,
    pub css: String,
    pub js: String,
}
#[derive(Serialize)]
pub struct PreviewOut {
    #[serde(rename = "previewId")]
    pub preview_id: String,
    pub revision: u64,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

fn default_session() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_envelope_parses_tagged_snake_case_with_camel_fields() {
        let msg: ClientWsMessage = serde_json::from_value(json!({
            "type": "submit_solution",
            "challengeId": "sum-two-numbers",
            "code": "function sum(a, b) { return a + b; }",
        }))
        .expect("valid client message");
        match msg {
            ClientWsMessage::SubmitSolution { challenge_id, code } => {
                assert_eq!(challenge_id, "sum-two-numbers");
                assert!(code.starts_with("function sum"));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let msg: ClientWsMessage =
            serde_json::from_value(json!({ "type": "preview_update", "html": "", "css": "", "js": "" }))
                .expect("immediate defaults to false");
        match msg {
            ClientWsMessage::PreviewUpdate { immediate, .. } => assert!(!immediate),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn notice_serializes_lowercase_kind() {
        let v = serde_json::to_value(ServerWsMessage::Notice {
            kind: NoticeKind::Success,
            message: "All 3 tests passed!".into(),
        })
        .expect("serializable");
        assert_eq!(v["type"], "notice");
        assert_eq!(v["kind"], "success");
        assert_eq!(v["message"], "All 3 tests passed!");
    }
}
