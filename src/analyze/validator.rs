//! Typed parse-then-validate step for classification output.
//!
//! The model's JSON is deserialized into [`AnalysisCandidate`] (all fields
//! optional), then checked rule by rule. Each rule has its own explicit
//! violation variant so a dropped item can be logged with a precise cause.
//! One malformed item never fails the batch: callers drop it and continue.

use thiserror::Error;

use crate::analysis::{Analysis, AnalysisCandidate, AnalysisStatus, Sentiment};
use crate::taxonomy;

/// Why a candidate was rejected. Per-item, never batch-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    /// Required string field absent or empty.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// Sentiment outside {positive, neutral, negative}.
    #[error("invalid sentiment `{0}`")]
    InvalidSentiment(String),
    /// Severity absent, non-integer, or outside [1, 5].
    #[error("severity out of range: {0}")]
    InvalidSeverity(i64),
}

/// Validate and normalize one candidate into a storable [`Analysis`].
///
/// Rule order: required fields (id, language, reply_en, reply_id) first,
/// then sentiment, then severity. Unknown topics are silently filtered to
/// the taxonomy intersection; an empty result defaults to `["service"]`.
///
/// The returned record starts as `Approved`; the orchestrator downgrades it
/// to `Draft` after the guardrail scan when a banned term hit either reply.
pub fn validate(candidate: AnalysisCandidate) -> Result<Analysis, SchemaViolation> {
    let id = required(candidate.id, "id")?;
    let language = required(candidate.language, "language")?;
    let reply_en = required(candidate.reply_en, "reply_en")?;
    let reply_id = required(candidate.reply_id, "reply_id")?;

    let sentiment = match candidate.sentiment {
        Some(ref s) => Sentiment::parse(s)
            .ok_or_else(|| SchemaViolation::InvalidSentiment(s.clone()))?,
        None => return Err(SchemaViolation::MissingField("sentiment")),
    };

    let severity = match candidate.severity {
        Some(v) if (1..=5).contains(&v) => v as u8,
        Some(v) => return Err(SchemaViolation::InvalidSeverity(v)),
        None => return Err(SchemaViolation::MissingField("severity")),
    };

    Ok(Analysis {
        id,
        language,
        sentiment,
        topics: taxonomy::filter_topics(candidate.topics),
        severity,
        reply_en,
        reply_id,
        status: AnalysisStatus::Approved,
    })
}

fn required(field: Option<String>, name: &'static str) -> Result<String, SchemaViolation> {
    match field {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(SchemaViolation::MissingField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> AnalysisCandidate {
        AnalysisCandidate {
            id: Some("rvw_0001".into()),
            language: Some("en".into()),
            sentiment: Some("negative".into()),
            topics: vec!["taste".into(), "unknown_topic".into()],
            severity: Some(5),
            reply_en: Some("We're sorry.".into()),
            reply_id: Some("Mohon maaf.".into()),
        }
    }

    #[test]
    fn well_formed_candidate_passes_with_filtered_topics() {
        let a = validate(candidate()).unwrap();
        assert_eq!(a.id, "rvw_0001");
        assert_eq!(a.sentiment, Sentiment::Negative);
        assert_eq!(a.topics, vec!["taste".to_string()]);
        assert_eq!(a.severity, 5);
        assert_eq!(a.status, AnalysisStatus::Approved);
    }

    #[test]
    fn unknown_only_topics_default_to_service() {
        let mut c = candidate();
        c.topics = vec!["unknown_only".into()];
        assert_eq!(validate(c).unwrap().topics, vec!["service".to_string()]);
    }

    #[test]
    fn bad_sentiment_is_rejected() {
        let mut c = candidate();
        c.sentiment = Some("furious".into());
        assert_eq!(
            validate(c),
            Err(SchemaViolation::InvalidSentiment("furious".into()))
        );
    }

    #[test]
    fn severity_bounds_are_inclusive() {
        for (v, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let mut c = candidate();
            c.severity = Some(v);
            assert_eq!(validate(c).is_ok(), ok, "severity {v}");
        }
    }

    #[test]
    fn missing_fields_beat_sentiment_and_severity_checks() {
        let mut c = candidate();
        c.reply_id = None;
        c.sentiment = Some("furious".into());
        // Field presence is checked first.
        assert_eq!(validate(c), Err(SchemaViolation::MissingField("reply_id")));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let mut c = candidate();
        c.language = Some(String::new());
        assert_eq!(validate(c), Err(SchemaViolation::MissingField("language")));
    }
}
