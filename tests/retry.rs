// tests/retry.rs
//
// Bounded retry loop with injectable (zero-delay) backoff.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use guest_feedback_analyzer::analysis::AnalysisCandidate;
use guest_feedback_analyzer::analyze::{LlmClient, RetryPolicy, RetryingClient, TransportFailure};
use guest_feedback_analyzer::config::voice::BrandVoice;
use guest_feedback_analyzer::review::Review;

/// Fails the first `fail_times` calls, then succeeds. The call counter is
/// shared so tests can observe attempts after the client moves into the
/// retry wrapper.
struct FlakyClient {
    fail_times: usize,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl LlmClient for FlakyClient {
    async fn classify(
        &self,
        _voice: &BrandVoice,
        _reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_times {
            Err(TransportFailure::HttpStatus(500))
        } else {
            Ok(Vec::new())
        }
    }
    fn provider_name(&self) -> &'static str {
        "flaky"
    }
}

fn flaky(fail_times: usize) -> (FlakyClient, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        FlakyClient {
            fail_times,
            calls: calls.clone(),
        },
        calls,
    )
}

#[tokio::test]
async fn recovers_within_the_retry_budget() {
    let (client, calls) = flaky(2);
    let client = RetryingClient::new(client, RetryPolicy::immediate(2));
    let out = client.classify(&BrandVoice::default_seed(), &[]).await;
    assert!(out.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stops_after_budget_exhaustion() {
    let (client, calls) = flaky(usize::MAX);
    let client = RetryingClient::new(client, RetryPolicy::immediate(2));
    let out = client.classify(&BrandVoice::default_seed(), &[]).await;
    assert!(matches!(out, Err(TransportFailure::HttpStatus(500))));
    // A budget of 2 additional attempts means exactly 3 calls total.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn first_success_skips_the_retry_machinery() {
    let (client, calls) = flaky(0);
    let client = RetryingClient::new(client, RetryPolicy::immediate(2));
    let out = client.classify(&BrandVoice::default_seed(), &[]).await;
    assert!(out.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
