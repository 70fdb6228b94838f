//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter; the default keeps the app's own targets
//!   ("katalab_backend", "challenge", "sandbox") at debug and the HTTP
//!   layers at info.
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets and source locations are included in the output; the sandbox logs
//! read very differently from the HTTP layer's request spans and this keeps
//! them apart.

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVES: &str =
    "info,challenge=debug,katalab_backend=debug,sandbox=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    // Single fmt builder with the filter attached directly.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
