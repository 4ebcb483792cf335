use std::sync::{Arc, RwLock};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::aggregate::{self, Dashboard, FilterCriteria};
use crate::analysis::AnalysisStatus;
use crate::analyze::{self, DynLlmClient};
use crate::config::voice::BrandVoice;
use crate::ingest::{self, IngestRow, IngestSummary};
use crate::store::FeedbackStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FeedbackStore>,
    pub voice: Arc<RwLock<BrandVoice>>,
    pub client: DynLlmClient,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/reviews", post(ingest_reviews))
        .route("/analyze", post(run_pending))
        .route("/replies", get(reply_queue))
        .route("/replies/approve", post(approve_replies))
        .route("/export", post(export_approved))
        .route("/dashboard", post(dashboard))
        .route("/voice", get(get_voice).post(set_voice))
        .route("/admin/reload-voice", get(admin_reload_voice))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

async fn ingest_reviews(
    State(state): State<AppState>,
    Json(rows): Json<Vec<IngestRow>>,
) -> Result<Json<IngestSummary>, ApiError> {
    ingest::ingest_rows(state.store.as_ref(), &rows)
        .map(Json)
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

#[derive(serde::Serialize)]
struct AnalyzeResp {
    pending: usize,
    saved: usize,
}

/// Run the pipeline over reviews with no stored analysis yet. Excluding
/// already-analyzed ids here is what makes re-runs no-ops: the orchestrator
/// itself never deduplicates.
async fn run_pending(State(state): State<AppState>) -> Result<Json<AnalyzeResp>, ApiError> {
    let analyzed: std::collections::BTreeSet<String> = state
        .store
        .analyses()
        .into_iter()
        .map(|a| a.id)
        .collect();
    let pending: Vec<_> = state
        .store
        .reviews()
        .into_iter()
        .filter(|r| !analyzed.contains(&r.id))
        .collect();

    let voice = state.voice.read().expect("voice rwlock poisoned").clone();
    let results = analyze::run_analysis(&voice, &pending, state.client.as_ref())
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    let mut saved = 0usize;
    for analysis in results {
        if state.store.insert_analysis(analysis) {
            saved += 1;
        }
    }
    Ok(Json(AnalyzeResp {
        pending: pending.len(),
        saved,
    }))
}

#[derive(serde::Serialize)]
struct ReplyRow {
    id: String,
    outlet: String,
    brand: String,
    platform: String,
    rating: Option<i32>,
    sentiment: String,
    severity: u8,
    topics: String,
    reply_en: String,
    reply_id: String,
    status: AnalysisStatus,
}

fn reply_rows(state: &AppState, only: Option<AnalysisStatus>) -> Vec<ReplyRow> {
    let analyses = state.store.analyses();
    state
        .store
        .reviews()
        .into_iter()
        .filter_map(|r| {
            let a = analyses.iter().find(|a| a.id == r.id)?;
            if let Some(want) = only {
                if a.status != want {
                    return None;
                }
            }
            Some(ReplyRow {
                id: r.id,
                outlet: r.outlet,
                brand: r.brand,
                platform: r.platform,
                rating: r.rating,
                sentiment: a.sentiment.as_str().to_string(),
                severity: a.severity,
                topics: a.topics_joined(),
                reply_en: a.reply_en.clone(),
                reply_id: a.reply_id.clone(),
                status: a.status,
            })
        })
        .collect()
}

async fn reply_queue(State(state): State<AppState>) -> Json<Vec<ReplyRow>> {
    Json(reply_rows(&state, None))
}

#[derive(serde::Deserialize)]
struct ApproveReq {
    ids: Vec<String>,
}

#[derive(serde::Serialize)]
struct ApproveResp {
    approved: usize,
}

async fn approve_replies(
    State(state): State<AppState>,
    Json(req): Json<ApproveReq>,
) -> Json<ApproveResp> {
    let mut approved = 0usize;
    for id in &req.ids {
        if state.store.update_status(id, AnalysisStatus::Approved) {
            approved += 1;
        }
    }
    Json(ApproveResp { approved })
}

/// Bulk export: return every approved reply row and mark it exported
/// (the terminal status).
async fn export_approved(State(state): State<AppState>) -> Json<Vec<ReplyRow>> {
    let rows = reply_rows(&state, Some(AnalysisStatus::Approved));
    for row in &rows {
        state.store.update_status(&row.id, AnalysisStatus::Exported);
    }
    Json(rows)
}

async fn dashboard(
    State(state): State<AppState>,
    Json(filter): Json<FilterCriteria>,
) -> Json<Dashboard> {
    let rows = aggregate::join_rows(&state.store.reviews(), &state.store.analyses());
    Json(aggregate::dashboard(&rows, &filter))
}

async fn get_voice(State(state): State<AppState>) -> Json<BrandVoice> {
    Json(state.voice.read().expect("voice rwlock poisoned").clone())
}

async fn set_voice(
    State(state): State<AppState>,
    Json(voice): Json<BrandVoice>,
) -> Json<BrandVoice> {
    let mut guard = state.voice.write().expect("voice rwlock poisoned");
    *guard = voice;
    Json(guard.clone())
}

async fn admin_reload_voice(State(state): State<AppState>) -> String {
    match BrandVoice::load_default() {
        Ok(fresh) => match state.voice.write() {
            Ok(mut v) => {
                *v = fresh;
                "reloaded".to_string()
            }
            Err(_) => "failed: lock poisoned".to_string(),
        },
        Err(e) => format!("failed: {e}"),
    }
}
