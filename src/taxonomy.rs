//! # Topic Taxonomy
//! The fixed set of topic labels every component agrees on. Validation,
//! the fallback classifier, and the aggregation engine all reference this
//! same list; labels outside of it are dropped, never stored.

/// Allowed topic labels, in canonical order.
pub const TOPIC_TAXONOMY: &[&str] = &[
    "taste",
    "service",
    "wait_time",
    "cleanliness",
    "value",
    "staff",
    "delivery",
    "packaging",
    "ambience",
    "noise",
    "portion",
    "payment",
];

/// Topic used when a review matches nothing in the taxonomy.
pub const DEFAULT_TOPIC: &str = "service";

/// Exact (case-sensitive) membership test.
pub fn is_known_topic(label: &str) -> bool {
    TOPIC_TAXONOMY.contains(&label)
}

/// Keep only taxonomy labels, preserving first-seen order and dropping
/// duplicates. An empty result falls back to `[DEFAULT_TOPIC]`.
pub fn filter_topics<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for l in labels {
        let l = l.as_ref();
        if is_known_topic(l) && !out.iter().any(|seen| seen == l) {
            out.push(l.to_string());
        }
    }
    if out.is_empty() {
        out.push(DEFAULT_TOPIC.to_string());
    }
    out
}
