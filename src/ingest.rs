// src/ingest.rs
//! Ingestion contract for review uploads.
//!
//! Rows arrive as already-parsed JSON objects (the CSV/file mechanics live
//! with the collaborator that produced them). Before anything is stored the
//! column contract is checked and a missing column is surfaced immediately;
//! after that, text is normalized, ids are assigned, and inserts go through
//! the store's insert-if-absent so re-uploads are harmless.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::review::Review;
use crate::store::FeedbackStore;

/// Columns every upload must carry (the original ops export format).
pub const REQUIRED_COLUMNS: &[&str] = &[
    "timestamp",
    "outlet",
    "brand",
    "platform",
    "rating",
    "text",
    "language",
    "username",
    "order_type",
];

/// One uploaded row, keyed by column name.
pub type IngestRow = Map<String, Value>;

/// Configuration gap in the upload itself; raised before any processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("missing column: {0}")]
    MissingColumn(String),
}

/// Outcome of one upload batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IngestSummary {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub dropped_empty: usize,
    pub total: usize,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_rows_total", "Rows received in upload batches.");
        describe_counter!("ingest_inserted_total", "New reviews stored.");
        describe_counter!(
            "ingest_dropped_total",
            "Rows dropped for empty text after normalization."
        );
    });
}

/// Normalize review text: decode HTML entities, strip tags, normalize
/// typographic quotes, collapse whitespace, cap at 1500 chars. Guest prose
/// is otherwise left alone.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Verify the column contract. Every row must carry every required column
/// (a null value is fine; a missing key is not).
pub fn check_columns(rows: &[IngestRow]) -> Result<(), IngestError> {
    for col in REQUIRED_COLUMNS {
        if rows.iter().any(|row| !row.contains_key(*col)) {
            return Err(IngestError::MissingColumn((*col).to_string()));
        }
    }
    Ok(())
}

/// Build reviews from uploaded rows. Ids are `rvw_0001`-style sequentials
/// by row position unless the row carries an explicit non-empty `id`.
/// Rows whose text normalizes to empty are dropped (counted, not fatal).
pub fn rows_to_reviews(rows: &[IngestRow]) -> Result<(Vec<Review>, usize), IngestError> {
    check_columns(rows)?;

    let mut dropped_empty = 0usize;
    let mut reviews = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let text = normalize_text(&str_field(row, "text").unwrap_or_default());
        if text.is_empty() {
            dropped_empty += 1;
            continue;
        }
        let id = str_field(row, "id")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("rvw_{:04}", i + 1));
        reviews.push(Review {
            id,
            outlet: str_field(row, "outlet").unwrap_or_default(),
            brand: str_field(row, "brand").unwrap_or_default(),
            platform: str_field(row, "platform").unwrap_or_default(),
            rating: int_field(row, "rating"),
            text,
            language: str_field(row, "language").filter(|s| !s.is_empty()),
            timestamp: str_field(row, "timestamp").unwrap_or_default(),
            username: str_field(row, "username").filter(|s| !s.is_empty()),
            order_type: str_field(row, "order_type").filter(|s| !s.is_empty()),
        });
    }
    Ok((reviews, dropped_empty))
}

/// Check the contract, build reviews, and store them insert-if-absent.
pub fn ingest_rows(
    store: &dyn FeedbackStore,
    rows: &[IngestRow],
) -> Result<IngestSummary, IngestError> {
    ensure_metrics_described();
    counter!("ingest_rows_total").increment(rows.len() as u64);

    let (reviews, dropped_empty) = rows_to_reviews(rows)?;
    let mut inserted = 0usize;
    let mut skipped_existing = 0usize;
    for review in reviews {
        if store.insert_review(review) {
            inserted += 1;
        } else {
            skipped_existing += 1;
        }
    }

    counter!("ingest_inserted_total").increment(inserted as u64);
    counter!("ingest_dropped_total").increment(dropped_empty as u64);
    tracing::info!(inserted, skipped_existing, dropped_empty, "ingest batch done");

    Ok(IngestSummary {
        inserted,
        skipped_existing,
        dropped_empty,
        total: rows.len(),
    })
}

fn str_field(row: &IngestRow, key: &str) -> Option<String> {
    match row.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(row: &IngestRow, key: &str) -> Option<i32> {
    match row.get(key) {
        Some(Value::Number(n)) => n.as_i64().map(|v| v as i32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
