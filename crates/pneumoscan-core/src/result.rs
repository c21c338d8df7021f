//! Inference results and history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::{ImageHandle, ImageView};

/// Probability of the positive class (COVID pneumonia) for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// In `[0, 1]`.
    pub probability: f32,
}

impl InferenceResult {
    pub fn new(probability: f32) -> Self {
        Self { probability }
    }

    /// Probability as a percentage, e.g. `73.11`.
    pub fn percent(&self) -> f32 {
        self.probability * 100.0
    }
}

/// An image that has been the current selection at some point.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub handle: ImageHandle,
    pub selected_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(handle: ImageHandle) -> Self {
        Self {
            handle,
            selected_at: Utc::now(),
        }
    }
}

/// Serializable view of a history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    #[serde(flatten)]
    pub image: ImageView,
    pub selected_at: DateTime<Utc>,
}

impl From<&HistoryEntry> for HistoryView {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            image: ImageView::from(&entry.handle),
            selected_at: entry.selected_at,
        }
    }
}
