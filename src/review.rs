//! # Review
//! One guest feedback record as ingested from an external source (platform
//! export, CSV upload, API push). Created once at ingestion and never
//! mutated; analyses are stored separately and joined by id.

use serde::{Deserialize, Serialize};

/// Immutable guest feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique id, e.g. "rvw_0001".
    pub id: String,
    pub outlet: String,
    pub brand: String,
    pub platform: String,
    /// Star rating 1–5 where the platform provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    /// Raw review text (non-empty after ingest normalization).
    pub text: String,
    /// ISO-ish language code when known ("en", "id", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Timestamp string as delivered by the platform; parsed permissively
    /// by the aggregation engine, kept verbatim here.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
}

impl Review {
    /// Payload sent to the classification backend, one object per review.
    /// Only the fields the model needs; username/order_type stay local.
    pub fn classification_item(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "outlet": self.outlet,
            "brand": self.brand,
            "platform": self.platform,
            "rating": self.rating,
            "text": self.text,
            "language": self.language,
        })
    }
}
