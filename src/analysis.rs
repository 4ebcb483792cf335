//! analysis.rs — Shapes for the classification output: the untrusted
//! candidate coming back from the model, and the validated, guardrail-
//! enforced record that gets stored and aggregated.

use serde::{Deserialize, Serialize};

/// Sentiment of one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Parse the wire form ("positive" | "neutral" | "negative").
    /// Anything else is rejected by the validator, so no lenient matching.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Reply lifecycle. `Draft` means an operator must look before sending
/// (a banned term hit the drafted reply); `Approved` replies are safe to
/// auto-send; `Exported` is the terminal bulk-export marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Draft,
    Approved,
    Exported,
}

/// Untrusted structured output of the classification step. Every field is
/// optional at parse time so one malformed item surfaces as a per-item
/// schema violation instead of failing the whole batch deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisCandidate {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub severity: Option<i64>,
    #[serde(default)]
    pub reply_en: Option<String>,
    #[serde(default)]
    pub reply_id: Option<String>,
}

/// Validated, guardrail-enforced analysis keyed by review id.
/// Created once per review; only `status` changes afterwards, and only
/// through operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Review id this analysis belongs to (one-to-one).
    pub id: String,
    pub language: String,
    pub sentiment: Sentiment,
    /// Non-empty, taxonomy-only labels.
    pub topics: Vec<String>,
    /// 1 (benign) .. 5 (critical).
    pub severity: u8,
    pub reply_en: String,
    pub reply_id: String,
    pub status: AnalysisStatus,
}

impl Analysis {
    /// Comma-joined topic string, the shape the aggregation engine explodes.
    pub fn topics_joined(&self) -> String {
        self.topics.join(",")
    }
}
