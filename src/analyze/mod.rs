// src/analyze/mod.rs
//! Analysis pipeline entry: one classification call per pending batch, then
//! per-candidate validation and guardrail enforcement.

pub mod client;
pub mod guardrails;
pub mod heuristics;
pub mod validator;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

// Re-export convenient types.
pub use crate::analyze::client::{
    build_client, DynLlmClient, FallbackClient, LlmClient, ModelProvider, RetryPolicy,
    RetryingClient, TransportFailure,
};
pub use crate::analyze::guardrails::{detect_banned_terms, enforce_reply_limits};
pub use crate::analyze::validator::{validate, SchemaViolation};

use crate::analysis::{Analysis, AnalysisStatus};
use crate::config::voice::BrandVoice;
use crate::review::Review;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "analysis_saved_total",
            "Analyses that passed validation and guardrails."
        );
        describe_counter!(
            "analysis_dropped_total",
            "Candidates dropped for schema violations."
        );
        describe_counter!(
            "analysis_flagged_total",
            "Analyses stored as draft due to banned-term hits."
        );
        describe_counter!("llm_calls_total", "Classification attempts issued.");
        describe_counter!("llm_retries_total", "Classification attempts retried.");
        describe_counter!(
            "llm_failures_total",
            "Batches failed after exhausting the retry budget."
        );
    });
}

/// Run the analysis pipeline over a pending batch.
///
/// The caller is responsible for excluding reviews that already have a
/// stored analysis; this function does not deduplicate. A transport failure
/// is terminal for the whole batch: nothing is returned, nothing partial
/// was committed, and the same batch is safe to retry on the next run.
///
/// Individual malformed candidates are dropped (logged + counted) and the
/// rest of the batch continues; that per-item policy is the only place a
/// problem is absorbed rather than propagated.
pub async fn run_analysis(
    voice: &BrandVoice,
    reviews: &[Review],
    client: &dyn LlmClient,
) -> Result<Vec<Analysis>, TransportFailure> {
    ensure_metrics_described();

    if reviews.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = client.classify(voice, reviews).await?;
    tracing::info!(
        provider = client.provider_name(),
        batch = reviews.len(),
        returned = candidates.len(),
        "classification batch returned"
    );

    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let dropped_id = candidate.id.clone();
        let mut analysis = match validator::validate(candidate) {
            Ok(a) => a,
            Err(violation) => {
                tracing::warn!(
                    id = dropped_id.as_deref().unwrap_or("<missing>"),
                    cause = %violation,
                    "dropping malformed candidate"
                );
                counter!("analysis_dropped_total").increment(1);
                continue;
            }
        };

        let hits_en = guardrails::detect_banned_terms(&analysis.reply_en, &voice.banned);
        let hits_id = guardrails::detect_banned_terms(&analysis.reply_id, &voice.banned);
        analysis.reply_en = guardrails::enforce_reply_limits(&analysis.reply_en);
        analysis.reply_id = guardrails::enforce_reply_limits(&analysis.reply_id);

        if hits_en.is_empty() && hits_id.is_empty() {
            analysis.status = AnalysisStatus::Approved;
        } else {
            tracing::warn!(
                id = %analysis.id,
                hits = ?hits_en.iter().chain(&hits_id).collect::<Vec<_>>(),
                "banned term in drafted reply; holding as draft"
            );
            counter!("analysis_flagged_total").increment(1);
            analysis.status = AnalysisStatus::Draft;
        }

        counter!("analysis_saved_total").increment(1);
        out.push(analysis);
    }

    Ok(out)
}
