//! Guest Feedback Analyzer — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the store, brand voice, and the
//! configured classification client.

use std::sync::{Arc, RwLock};

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guest_feedback_analyzer::analyze::guardrails::MAX_REPLY_CHARS;
use guest_feedback_analyzer::api::{create_router, AppState};
use guest_feedback_analyzer::config::llm::LlmConfig;
use guest_feedback_analyzer::config::voice::BrandVoice;
use guest_feedback_analyzer::metrics::Metrics;
use guest_feedback_analyzer::store::MemoryStore;
use guest_feedback_analyzer::{analyze, build_client};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - FEEDBACK_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("FEEDBACK_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("guest_feedback_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments. This enables the
    // LLM_* and BRAND_VOICE_PATH variables below.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    // Classification client: config file first, env fallback.
    let llm_config = LlmConfig::load_from_file("config/llm.json")
        .unwrap_or_else(|_| LlmConfig::from_env());
    tracing::info!(
        dry_run = llm_config.dry_run,
        model = %llm_config.model,
        "classification client configured"
    );
    let client: analyze::DynLlmClient = build_client(&llm_config);

    let voice = BrandVoice::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "brand voice config unusable; using seed");
        BrandVoice::default_seed()
    });

    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        voice: Arc::new(RwLock::new(voice)),
        client,
    };

    let metrics = Metrics::init(MAX_REPLY_CHARS);
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
