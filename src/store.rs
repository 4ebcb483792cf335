//! store.rs — keyed record store for reviews and analyses.
//!
//! The core only needs four operations: insert-if-absent by id, fetch-all,
//! fetch-by-id, and update-status-by-id. The concrete storage technology is
//! a collaborator concern; the in-memory implementation below is what the
//! service runs with and what tests exercise.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::analysis::{Analysis, AnalysisStatus};
use crate::review::Review;

/// Storage contract between the pipeline and whatever persists records.
pub trait FeedbackStore: Send + Sync {
    /// Insert unless the id is already present. Returns true when inserted.
    fn insert_review(&self, review: Review) -> bool;
    fn insert_analysis(&self, analysis: Analysis) -> bool;

    fn reviews(&self) -> Vec<Review>;
    fn analyses(&self) -> Vec<Analysis>;

    fn review_by_id(&self, id: &str) -> Option<Review>;
    fn analysis_by_id(&self, id: &str) -> Option<Analysis>;

    /// Operator-driven status transition. Returns false for unknown ids.
    fn update_status(&self, id: &str, status: AnalysisStatus) -> bool;
}

/// In-memory store. BTreeMap keeps fetch-all in stable id order, which the
/// sequential `rvw_NNNN` ids sort naturally.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reviews: Mutex<BTreeMap<String, Review>>,
    analyses: Mutex<BTreeMap<String, Analysis>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedbackStore for MemoryStore {
    fn insert_review(&self, review: Review) -> bool {
        let mut g = self.reviews.lock().expect("store mutex poisoned");
        if g.contains_key(&review.id) {
            return false;
        }
        g.insert(review.id.clone(), review);
        true
    }

    fn insert_analysis(&self, analysis: Analysis) -> bool {
        let mut g = self.analyses.lock().expect("store mutex poisoned");
        if g.contains_key(&analysis.id) {
            return false;
        }
        g.insert(analysis.id.clone(), analysis);
        true
    }

    fn reviews(&self) -> Vec<Review> {
        self.reviews
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn analyses(&self) -> Vec<Analysis> {
        self.analyses
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn review_by_id(&self, id: &str) -> Option<Review> {
        self.reviews
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
    }

    fn analysis_by_id(&self, id: &str) -> Option<Analysis> {
        self.analyses
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
    }

    fn update_status(&self, id: &str, status: AnalysisStatus) -> bool {
        let mut g = self.analyses.lock().expect("store mutex poisoned");
        match g.get_mut(id) {
            Some(a) => {
                a.status = status;
                true
            }
            None => false,
        }
    }
}
