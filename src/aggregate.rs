//! # Aggregation Engine
//! Windowed operational metrics over joined (Review, Analysis) rows:
//! KPI summary, topic frequencies, outlet risk leaderboard, topic heatmap,
//! week-over-week topic growth, and critical incidents.
//!
//! Everything here is a pure function of (rows, filter criteria): no store
//! access, no ambient state, no mutation of the inputs. Timestamps are
//! parsed permissively; rows whose timestamp cannot be parsed are excluded
//! from date-bounded views but stay in the data set otherwise.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, AnalysisStatus, Sentiment};
use crate::review::Review;

/// Read-only joined view of one review and its analysis. Topics travel as
/// the comma-joined string the store keeps; [`split_topics`] explodes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRow {
    pub id: String,
    pub timestamp: String,
    pub outlet: String,
    pub brand: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    pub sentiment: Sentiment,
    pub severity: u8,
    pub topics: String,
    pub status: AnalysisStatus,
    pub text: String,
}

/// Inner-join reviews with their analyses by id, preserving review order.
pub fn join_rows(reviews: &[Review], analyses: &[Analysis]) -> Vec<JoinedRow> {
    let by_id: BTreeMap<&str, &Analysis> =
        analyses.iter().map(|a| (a.id.as_str(), a)).collect();
    reviews
        .iter()
        .filter_map(|r| {
            by_id.get(r.id.as_str()).map(|a| JoinedRow {
                id: r.id.clone(),
                timestamp: r.timestamp.clone(),
                outlet: r.outlet.clone(),
                brand: r.brand.clone(),
                platform: r.platform.clone(),
                order_type: r.order_type.clone(),
                language: r.language.clone(),
                rating: r.rating,
                sentiment: a.sentiment,
                severity: a.severity,
                topics: a.topics_joined(),
                status: a.status,
                text: r.text.clone(),
            })
        })
        .collect()
}

/// Filter criteria passed in explicitly; empty set filters mean "no
/// restriction". Dates are inclusive on both ends, like the ops console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default)]
    pub outlets: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub order_types: Vec<String>,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub negative_share: f64,
    pub avg_severity: f64,
    /// Volume vs. the 7 days preceding the window start.
    pub volume_delta: f64,
    /// Approved share among positive/neutral rows.
    pub auto_reply_coverage: f64,
    pub reviews_in_range: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutletRisk {
    pub outlet: String,
    pub avg_severity: f64,
    pub negative_share: f64,
    pub volume: usize,
    pub volume_z: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub outlet: String,
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicGrowth {
    pub topic: String,
    pub this_window: usize,
    pub prev_window: usize,
    pub wow_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub sentiment_by_brand: BTreeMap<String, BTreeMap<String, usize>>,
    pub top_topics: Vec<(String, usize)>,
    pub severity_by_outlet: Vec<(String, f64)>,
    pub leaderboard: Vec<OutletRisk>,
    pub heatmap: Vec<HeatmapCell>,
    pub emerging_topics: Vec<TopicGrowth>,
    pub critical_incidents: Vec<JoinedRow>,
}

/// Permissive timestamp parsing for the formats review platforms emit.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Explode a comma-joined topic string: split, trim, drop empties.
pub fn split_topics(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compute the full dashboard for the given rows and criteria.
pub fn dashboard(rows: &[JoinedRow], filter: &FilterCriteria) -> Dashboard {
    let parsed: Vec<Option<NaiveDateTime>> =
        rows.iter().map(|r| parse_timestamp(&r.timestamp)).collect();

    // Window anchor: an explicit range bounds the view; otherwise the
    // whole set is used and the anchor derives from min/max timestamps.
    let bounded = filter.date_from.is_some() && filter.date_to.is_some();
    let window = resolve_window(filter, &parsed);

    let current: Vec<&JoinedRow> = rows
        .iter()
        .zip(parsed.iter())
        .filter(|&(r, ts)| {
            if !matches_sets(r, filter) {
                return false;
            }
            if bounded {
                match (*ts, window) {
                    (Some(t), Some((start, end))) => t >= start && t < end,
                    _ => false,
                }
            } else {
                true
            }
        })
        .map(|(r, _)| r)
        .collect();

    // Previous 7-day window counts run over the full, unfiltered set.
    let prev_count = match window {
        Some((start, _)) => parsed
            .iter()
            .flatten()
            .filter(|t| **t >= start - Duration::days(7) && **t < start)
            .count(),
        None => 0,
    };

    let total = current.len();
    let negatives = current
        .iter()
        .filter(|r| r.sentiment == Sentiment::Negative)
        .count();
    let negative_share = if total > 0 {
        negatives as f64 / total as f64
    } else {
        0.0
    };
    let avg_severity = if total > 0 {
        current.iter().map(|r| r.severity as f64).sum::<f64>() / total as f64
    } else {
        0.0
    };
    let volume_delta = (total as f64 - prev_count as f64) / prev_count.max(1) as f64;

    let pn: Vec<&&JoinedRow> = current
        .iter()
        .filter(|r| matches!(r.sentiment, Sentiment::Positive | Sentiment::Neutral))
        .collect();
    let approved = pn
        .iter()
        .filter(|r| r.status == AnalysisStatus::Approved)
        .count();
    let auto_reply_coverage = approved as f64 / pn.len().max(1) as f64;

    let mut sentiment_by_brand: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for r in &current {
        *sentiment_by_brand
            .entry(r.brand.clone())
            .or_default()
            .entry(r.sentiment.as_str().to_string())
            .or_default() += 1;
    }

    Dashboard {
        summary: DashboardSummary {
            negative_share,
            avg_severity,
            volume_delta,
            auto_reply_coverage,
            reviews_in_range: total,
        },
        sentiment_by_brand,
        top_topics: top_topics(&current, 12),
        severity_by_outlet: severity_by_outlet(&current, 12),
        leaderboard: outlet_leaderboard(&current),
        heatmap: topic_heatmap(&current),
        emerging_topics: topic_growth(rows, &parsed, window, 10),
        critical_incidents: critical_incidents(&current, &parsed_of(&current)),
    }
}

fn matches_sets(r: &JoinedRow, f: &FilterCriteria) -> bool {
    let hit = |set: &[String], v: &str| set.is_empty() || set.iter().any(|s| s == v);
    hit(&f.brands, &r.brand)
        && hit(&f.outlets, &r.outlet)
        && hit(&f.platforms, &r.platform)
        && (f.order_types.is_empty()
            || r.order_type
                .as_deref()
                .is_some_and(|o| f.order_types.iter().any(|s| s == o)))
}

fn resolve_window(
    filter: &FilterCriteria,
    parsed: &[Option<NaiveDateTime>],
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
        let start = from.and_time(NaiveTime::MIN);
        let end = to.and_time(NaiveTime::MIN) + Duration::days(1);
        return Some((start, end));
    }
    let min = parsed.iter().flatten().min()?;
    let max = parsed.iter().flatten().max()?;
    Some((*min, *max + Duration::days(1)))
}

fn top_topics(rows: &[&JoinedRow], cap: usize) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in rows {
        for t in split_topics(&r.topics) {
            *counts.entry(t).or_default() += 1;
        }
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(cap);
    out
}

fn severity_by_outlet(rows: &[&JoinedRow], cap: usize) -> Vec<(String, f64)> {
    let mut acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in rows {
        let e = acc.entry(r.outlet.clone()).or_insert((0.0, 0));
        e.0 += r.severity as f64;
        e.1 += 1;
    }
    let mut out: Vec<(String, f64)> = acc
        .into_iter()
        .map(|(outlet, (sum, n))| (outlet, sum / n as f64))
        .collect();
    out.sort_by(|a, b| desc(a.1, b.1).then_with(|| a.0.cmp(&b.0)));
    out.truncate(cap);
    out
}

/// Risk = 0.5*avg_severity + 0.4*negative_share + 0.1*clip(z(volume), >=0),
/// z-score over outlets with population std-dev (a zero spread counts as 1).
fn outlet_leaderboard(rows: &[&JoinedRow]) -> Vec<OutletRisk> {
    let mut acc: BTreeMap<String, (f64, usize, usize)> = BTreeMap::new();
    for r in rows {
        let e = acc.entry(r.outlet.clone()).or_insert((0.0, 0, 0));
        e.0 += r.severity as f64;
        e.1 += 1;
        if r.sentiment == Sentiment::Negative {
            e.2 += 1;
        }
    }
    if acc.is_empty() {
        return Vec::new();
    }

    let n = acc.len() as f64;
    let mean_v = acc.values().map(|(_, v, _)| *v as f64).sum::<f64>() / n;
    let var = acc
        .values()
        .map(|(_, v, _)| (*v as f64 - mean_v).powi(2))
        .sum::<f64>()
        / n;
    let std = var.sqrt();
    let std_v = if std == 0.0 { 1.0 } else { std };

    let mut out: Vec<OutletRisk> = acc
        .into_iter()
        .map(|(outlet, (sev_sum, volume, neg))| {
            let avg_severity = sev_sum / volume as f64;
            let negative_share = neg as f64 / volume as f64;
            let volume_z = ((volume as f64 - mean_v) / std_v).max(0.0);
            OutletRisk {
                outlet,
                avg_severity,
                negative_share,
                volume,
                volume_z,
                risk: 0.5 * avg_severity + 0.4 * negative_share + 0.1 * volume_z,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        desc(a.risk, b.risk)
            .then_with(|| desc(a.avg_severity, b.avg_severity))
            .then_with(|| desc(a.negative_share, b.negative_share))
            .then_with(|| a.outlet.cmp(&b.outlet))
    });
    out
}

fn topic_heatmap(rows: &[&JoinedRow]) -> Vec<HeatmapCell> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for r in rows {
        for t in split_topics(&r.topics) {
            *counts.entry((r.outlet.clone(), t)).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((outlet, topic), count)| HeatmapCell {
            outlet,
            topic,
            count,
        })
        .collect()
}

/// Week-over-week topic growth over the FULL history (the set filters do
/// not apply here), windowed by the current/previous 7-day pair.
fn topic_growth(
    rows: &[JoinedRow],
    parsed: &[Option<NaiveDateTime>],
    window: Option<(NaiveDateTime, NaiveDateTime)>,
    cap: usize,
) -> Vec<TopicGrowth> {
    let Some((start, end)) = window else {
        return Vec::new();
    };
    let prev_start = start - Duration::days(7);

    let mut this_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut prev_counts: BTreeMap<String, usize> = BTreeMap::new();
    for (r, ts) in rows.iter().zip(parsed) {
        let Some(t) = ts else { continue };
        let bucket = if *t >= start && *t < end {
            &mut this_counts
        } else if *t >= prev_start && *t < start {
            &mut prev_counts
        } else {
            continue;
        };
        for topic in split_topics(&r.topics) {
            *bucket.entry(topic).or_default() += 1;
        }
    }

    let mut topics: Vec<String> = this_counts.keys().cloned().collect();
    for t in prev_counts.keys() {
        if !this_counts.contains_key(t) {
            topics.push(t.clone());
        }
    }

    let mut out: Vec<TopicGrowth> = topics
        .into_iter()
        .map(|topic| {
            let this_window = this_counts.get(&topic).copied().unwrap_or(0);
            let prev_window = prev_counts.get(&topic).copied().unwrap_or(0);
            let wow_growth =
                (this_window as f64 - prev_window as f64) / prev_window.max(1) as f64;
            TopicGrowth {
                topic,
                this_window,
                prev_window,
                wow_growth,
            }
        })
        .collect();
    out.sort_by(|a, b| desc(a.wow_growth, b.wow_growth).then_with(|| a.topic.cmp(&b.topic)));
    out.truncate(cap);
    out
}

/// Negative sentiment OR severity >= 4, newest first, 15 most recent.
/// Rows with unparseable timestamps sort last.
fn critical_incidents(
    rows: &[&JoinedRow],
    parsed: &[Option<NaiveDateTime>],
) -> Vec<JoinedRow> {
    let mut crit: Vec<(&JoinedRow, Option<NaiveDateTime>)> = rows
        .iter()
        .zip(parsed)
        .filter(|(r, _)| r.sentiment == Sentiment::Negative || r.severity >= 4)
        .map(|(r, ts)| (*r, *ts))
        .collect();
    crit.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.0.id.cmp(&b.0.id),
    });
    crit.into_iter().take(15).map(|(r, _)| r.clone()).collect()
}

fn parsed_of(rows: &[&JoinedRow]) -> Vec<Option<NaiveDateTime>> {
    rows.iter().map(|r| parse_timestamp(&r.timestamp)).collect()
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
