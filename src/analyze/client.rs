//! Classification client: provider abstraction + bounded retry.
//!
//! Two providers expose the identical contract so the surrounding pipeline
//! cannot tell them apart: a deterministic offline fallback (dry-run) and a
//! remote OpenAI-compatible chat-completions endpoint. The remote provider
//! is wrapped in a retry loop with a linear, injectable backoff so tests
//! run it with zero delay.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::analysis::AnalysisCandidate;
use crate::analyze::heuristics;
use crate::config::llm::LlmConfig;
use crate::config::voice::BrandVoice;
use crate::review::Review;

/// Terminal failure of a whole batch call. Per-item problems are not
/// represented here; they surface later as validator drops.
#[derive(Debug, Error)]
pub enum TransportFailure {
    #[error("request failed: {0}")]
    Request(String),
    #[error("endpoint returned status {0}")]
    HttpStatus(u16),
    #[error("unusable response body: {0}")]
    MalformedBody(String),
}

/// Batch classification contract shared by both modes.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn classify(
        &self,
        voice: &BrandVoice,
        reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure>;
    /// Provider name for diagnostics/headers.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: fallback client in dry-run mode, otherwise the remote provider
/// wrapped with the configured retry policy.
pub fn build_client(config: &LlmConfig) -> DynLlmClient {
    if config.dry_run {
        return Arc::new(FallbackClient);
    }
    let provider = ModelProvider::new(config);
    Arc::new(RetryingClient::new(provider, RetryPolicy::from_config(config)))
}

// ------------------------------------------------------------
// Fallback provider (deterministic, no network)
// ------------------------------------------------------------

/// Keyword-heuristic provider; never fails and never blocks.
pub struct FallbackClient;

#[async_trait::async_trait]
impl LlmClient for FallbackClient {
    async fn classify(
        &self,
        _voice: &BrandVoice,
        reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        Ok(heuristics::classify_batch(reviews))
    }
    fn provider_name(&self) -> &'static str {
        "fallback"
    }
}

// ------------------------------------------------------------
// Remote provider (OpenAI-compatible chat completions)
// ------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You are a hospitality guest-experience analyst. \
Return STRICT JSON (no extra text): an array with one object per input item, each with: \
id, language, sentiment (positive|neutral|negative), \
topics (from: taste,service,wait_time,cleanliness,value,staff,delivery,packaging,ambience,noise,portion,payment), \
severity (1-5), reply_en (<=220 chars), reply_id (<=220 chars). \
Decide SENTIMENT primarily from the review TEXT; treat rating as a weak prior. \
If text and rating conflict, follow the TEXT. \
Always return at least one topic from the taxonomy.";

pub struct ModelProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    json_mode: bool,
}

impl ModelProvider {
    pub fn new(config: &LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("guest-feedback-analyzer/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            json_mode: config.json_mode,
        }
    }

    async fn call_once(
        &self,
        voice: &BrandVoice,
        reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<Value>,
        }
        #[derive(serde::Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(serde::Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(serde::Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let items: Vec<Value> = reviews.iter().map(Review::classification_item).collect();
        let user = serde_json::json!({ "brand_voice": voice, "items": items }).to_string();

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg { role: "system", content: SYSTEM_PROMPT },
                Msg { role: "user", content: &user },
            ],
            temperature: 0.2,
            response_format: self
                .json_mode
                .then(|| serde_json::json!({ "type": "json_object" })),
        };

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| TransportFailure::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportFailure::HttpStatus(status.as_u16()));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| TransportFailure::MalformedBody(e.to_string()))?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        parse_candidates(content)
    }
}

#[async_trait::async_trait]
impl LlmClient for ModelProvider {
    async fn classify(
        &self,
        voice: &BrandVoice,
        reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        self.call_once(voice, reviews).await
    }
    fn provider_name(&self) -> &'static str {
        "model"
    }
}

/// Parse the model's content string into candidates. The content must be a
/// JSON array; a `{"results": [...]}` / `{"items": [...]}` wrapper (common
/// under forced json_object mode) is tolerated. Per-item field problems are
/// deliberately NOT errors here: each element converts leniently and the
/// validator decides what to drop.
pub fn parse_candidates(content: &str) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| TransportFailure::MalformedBody(e.to_string()))?;
    let arr = match &value {
        Value::Array(a) => a.clone(),
        Value::Object(map) => match map.get("results").or_else(|| map.get("items")) {
            Some(Value::Array(a)) => a.clone(),
            _ => {
                return Err(TransportFailure::MalformedBody(
                    "expected a JSON array of analysis objects".into(),
                ))
            }
        },
        _ => {
            return Err(TransportFailure::MalformedBody(
                "expected a JSON array of analysis objects".into(),
            ))
        }
    };
    Ok(arr.iter().map(lenient_candidate).collect())
}

/// Total conversion: wrong-typed fields become absent ones, so they fall out
/// at validation as per-item schema violations instead of failing the batch.
fn lenient_candidate(v: &Value) -> AnalysisCandidate {
    let s = |key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);
    AnalysisCandidate {
        id: s("id"),
        language: s("language"),
        sentiment: s("sentiment"),
        topics: v
            .get("topics")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        severity: v.get("severity").and_then(Value::as_i64),
        reply_en: s("reply_en"),
        reply_id: s("reply_id"),
    }
}

// ------------------------------------------------------------
// Retry wrapper
// ------------------------------------------------------------

/// Bounded retry with linear backoff: attempt i sleeps `base * (i + 1)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first (2 => 3 attempts total).
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Zero-delay policy for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(800),
        }
    }
}

/// Wraps a provider with the retry policy. A timed-out attempt is just a
/// failed attempt within the budget; exhaustion returns the last failure
/// and the whole batch yields zero candidates.
pub struct RetryingClient<C: LlmClient> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: LlmClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl<C: LlmClient> LlmClient for RetryingClient<C> {
    async fn classify(
        &self,
        voice: &BrandVoice,
        reviews: &[Review],
    ) -> Result<Vec<AnalysisCandidate>, TransportFailure> {
        let mut attempt = 0u32;
        loop {
            counter!("llm_calls_total").increment(1);
            match self.inner.classify(voice, reviews).await {
                Ok(out) => return Ok(out),
                Err(err) if attempt < self.policy.max_retries => {
                    tracing::warn!(error = %err, attempt, "classification attempt failed; retrying");
                    counter!("llm_retries_total").increment(1);
                    tokio::time::sleep(self.policy.delay(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "classification failed; retries exhausted");
                    counter!("llm_failures_total").increment(1);
                    return Err(err);
                }
            }
        }
    }
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}
