//! Deterministic offline classifier (dry-run mode).
//!
//! Keyword-driven stand-in for the model backend, exposing the exact same
//! candidate contract so callers cannot tell the modes apart. Sentiment is
//! decided from the review text first; the numeric rating is only a prior
//! for when the text carries no signal. Mixed English/Indonesian keyword
//! lists reflect the review corpus this runs on.

use crate::analysis::AnalysisCandidate;
use crate::review::Review;
use crate::taxonomy::DEFAULT_TOPIC;

const NEGATIVE_KEYWORDS: &[&str] = &[
    "late", "spill", "tumpah", "dirty", "kotor", "rude", "kasar", "refund", "cold", "uncooked",
    "poison", "telat", "very late",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "enak",
    "great",
    "love",
    "mantap",
    "lezat",
    "awesome",
    "fast service",
    "puas",
    "worth",
    "terima kasih",
];

/// Topic → trigger keywords, checked in this order.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("wait_time", &["queue", "wait", "lama", "nunggu", "antri", "antre"]),
    ("packaging", &["tumpah", "spill", "kemasan", "bungkus", "bocor", "packag"]),
    (
        "taste",
        &["enak", "great", "love", "mantap", "lezat", "nice", "asin", "pahit", "asam", "gurih", "awesome"],
    ),
    (
        "service",
        &["service", "pelayan", "pramusaji", "ramah", "kasir", "barista", "staff"],
    ),
    ("cleanliness", &["kotor", "kebersihan", "bersih", "clean"]),
    ("portion", &["portion", "porsi", "kecil", "besar", "cukup"]),
    ("ambience", &["ambience", "suasana", "ramai", "noisy", "berisik"]),
    ("delivery", &["delivery", "telat", "terlambat", "late", "driver"]),
    ("value", &["mahal", "murah", "value", "worth"]),
];

/// Classify one review without touching the network.
pub fn classify_review(review: &Review) -> AnalysisCandidate {
    let text = review.text.to_lowercase();
    let rating = review.rating.unwrap_or(3);

    let sentiment = derive_sentiment(&text, rating);
    let topics = derive_topics(&text);
    let severity = match sentiment {
        "positive" => 1,
        "negative" => 5,
        _ => 3,
    };
    let language = detect_language(&review.text);
    let (reply_en, reply_id) = reply_templates(sentiment);

    AnalysisCandidate {
        id: Some(review.id.clone()),
        language: Some(language.to_string()),
        sentiment: Some(sentiment.to_string()),
        topics,
        severity: Some(severity),
        reply_en: Some(reply_en.to_string()),
        reply_id: Some(reply_id.to_string()),
    }
}

/// Batch form, same ordering as the input.
pub fn classify_batch(reviews: &[Review]) -> Vec<AnalysisCandidate> {
    reviews.iter().map(classify_review).collect()
}

/// Text signal wins; a tie (both polarities present) or no keyword hit
/// falls back to the rating prior: >=4 positive, <=2 negative, else neutral.
fn derive_sentiment(text_lower: &str, rating: i32) -> &'static str {
    let mut score = 0i32;
    if POSITIVE_KEYWORDS.iter().any(|k| text_lower.contains(k)) {
        score += 1;
    }
    if NEGATIVE_KEYWORDS.iter().any(|k| text_lower.contains(k)) {
        score -= 1;
    }
    if score <= -1 {
        "negative"
    } else if score >= 1 {
        "positive"
    } else if rating >= 4 {
        "positive"
    } else if rating <= 2 {
        "negative"
    } else {
        "neutral"
    }
}

/// A review may hit zero, one, or several topics; zero maps to the default.
fn derive_topics(text_lower: &str) -> Vec<String> {
    let mut topics: Vec<String> = TOPIC_KEYWORDS
        .iter()
        .filter(|(_, kws)| kws.iter().any(|k| text_lower.contains(k)))
        .map(|(t, _)| t.to_string())
        .collect();
    if topics.is_empty() {
        topics.push(DEFAULT_TOPIC.to_string());
    }
    topics
}

/// Any non-ASCII character marks the text as Indonesian for reply routing.
fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| !c.is_ascii()) {
        "id"
    } else {
        "en"
    }
}

fn reply_templates(sentiment: &str) -> (&'static str, &'static str) {
    match sentiment {
        "negative" => (
            "We're sorry for the experience. Please DM your order details so we can make this right.",
            "Mohon maaf atas pengalaman Anda. Silakan DM detail pesanan, kami akan tindak lanjuti.",
        ),
        "positive" => (
            "Thank you for the great review! We're glad you enjoyed your visit and hope to see you again.",
            "Terima kasih atas ulasannya! Senang Anda menikmati kunjungannya, sampai jumpa lagi.",
        ),
        _ => (
            "Thanks for the feedback. We'll share this with the team and keep improving.",
            "Terima kasih atas masukannya, kami akan terus perbaiki.",
        ),
    }
}
