// tests/orchestrator.rs
//
// Pipeline-level behavior: status assignment from guardrail hits, per-item
// drops for malformed candidates, terminal transport failures, and the
// caller-side dedup that makes re-runs no-ops.

use guest_feedback_analyzer::analysis::{AnalysisCandidate, AnalysisStatus};
use guest_feedback_analyzer::analyze::{
    run_analysis, FallbackClient, LlmClient, RetryPolicy, RetryingClient, TransportFailure,
};
use guest_feedback_analyzer::config::voice::BrandVoice;
use guest_feedback_analyzer::review::Review;
use guest_feedback_analyzer::store::{FeedbackStore, MemoryStore};

fn review(id: &str, text: &str, rating: Option<i32>) -> Review {
    Review {
        id: id.into(),
        outlet: "Central Park".into(),
        brand: "Kopi Kita".into(),
        platform: "gofood".into(),
        rating,
        text: text.into(),
        language: None,
        timestamp: "2025-06-01 10:00:00".into(),
        username: None,
        order_type: Some("delivery".into()),
    }
}

fn candidate(id: &str, reply_en: &str) -> AnalysisCandidate {
    AnalysisCandidate {
        id: Some(id.into()),
        language: Some("en".into()),
        sentiment: Some("neutral".into()),
        topics: vec!["service".into()],
        severity: Some(3),
        reply_en: Some(reply_en.into()),
        reply_id: Some("Terima kasih atas masukannya.".into()),
    }
}

/// Client returning a fixed candidate list, for shaping edge cases.
struct FixedClient {
    candidates: Vec<AnalysisCandidate>,
}

#[async_trait::async_trait]
impl LlmClient for FixedClient {
    async fn classify(
        &self,
        _voice: &BrandVoice,
        _reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        Ok(self.candidates.clone())
    }
    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

/// Client that always fails, for exercising the terminal path.
struct DownClient;

#[async_trait::async_trait]
impl LlmClient for DownClient {
    async fn classify(
        &self,
        _voice: &BrandVoice,
        _reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        Err(TransportFailure::HttpStatus(503))
    }
    fn provider_name(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn clean_replies_come_back_approved() {
    let voice = BrandVoice::default_seed();
    let reviews = vec![review("rvw_0001", "Makanan enak sekali, pelayanan ramah", Some(5))];
    let out = run_analysis(&voice, &reviews, &FallbackClient).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].status, AnalysisStatus::Approved);
    assert!(out[0].reply_en.chars().count() <= 220);
}

#[tokio::test]
async fn banned_term_in_either_reply_forces_draft() {
    let voice = BrandVoice::default_seed();
    let reviews = vec![review("rvw_0001", "ok", None)];
    let client = FixedClient {
        candidates: vec![candidate(
            "rvw_0001",
            "We guarantee this never happens again.",
        )],
    };
    let out = run_analysis(&voice, &reviews, &client).await.unwrap();
    assert_eq!(out[0].status, AnalysisStatus::Draft);
}

#[tokio::test]
async fn overlong_replies_are_truncated_before_storage() {
    let voice = BrandVoice::default_seed();
    let reviews = vec![review("rvw_0001", "ok", None)];
    let long = "a ".repeat(300);
    let client = FixedClient {
        candidates: vec![candidate("rvw_0001", &long)],
    };
    let out = run_analysis(&voice, &reviews, &client).await.unwrap();
    assert_eq!(out[0].reply_en.chars().count(), 220);
    assert_eq!(out[0].status, AnalysisStatus::Approved);
}

#[tokio::test]
async fn malformed_candidates_are_dropped_and_batch_continues() {
    let voice = BrandVoice::default_seed();
    let reviews = vec![
        review("rvw_0001", "ok", None),
        review("rvw_0002", "ok", None),
        review("rvw_0003", "ok", None),
    ];
    let mut bad_severity = candidate("rvw_0002", "Thanks!");
    bad_severity.severity = Some(9);
    let mut missing_reply = candidate("rvw_0003", "Thanks!");
    missing_reply.reply_id = None;
    let client = FixedClient {
        candidates: vec![candidate("rvw_0001", "Thanks!"), bad_severity, missing_reply],
    };
    let out = run_analysis(&voice, &reviews, &client).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "rvw_0001");
}

#[tokio::test]
async fn transport_failure_is_terminal_and_leaves_no_partial_state() {
    let voice = BrandVoice::default_seed();
    let store = MemoryStore::new();
    store.insert_review(review("rvw_0001", "Paket tumpah semua", Some(1)));

    let retrying = RetryingClient::new(DownClient, RetryPolicy::immediate(2));
    let result = run_analysis(&voice, &store.reviews(), &retrying).await;
    assert!(result.is_err());
    assert!(store.analyses().is_empty());

    // Nothing was committed, so the same batch is safe to retry later.
    let out = run_analysis(&voice, &store.reviews(), &FallbackClient)
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
}

#[tokio::test]
async fn rerun_with_caller_side_dedup_is_a_noop() {
    let voice = BrandVoice::default_seed();
    let store = MemoryStore::new();
    store.insert_review(review("rvw_0001", "Makanan enak", Some(5)));

    let first = run_analysis(&voice, &store.reviews(), &FallbackClient)
        .await
        .unwrap();
    for a in first {
        assert!(store.insert_analysis(a));
    }
    store.update_status("rvw_0001", AnalysisStatus::Exported);

    // The caller excludes ids that already have an analysis.
    let analyzed: Vec<String> = store.analyses().into_iter().map(|a| a.id).collect();
    let pending: Vec<Review> = store
        .reviews()
        .into_iter()
        .filter(|r| !analyzed.contains(&r.id))
        .collect();
    assert!(pending.is_empty());

    let second = run_analysis(&voice, &pending, &FallbackClient).await.unwrap();
    assert!(second.is_empty());
    // Existing record untouched, including its operator-set status.
    assert_eq!(
        store.analysis_by_id("rvw_0001").unwrap().status,
        AnalysisStatus::Exported
    );
}
