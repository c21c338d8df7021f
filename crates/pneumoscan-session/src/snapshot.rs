//! Read-only view of the session handed to the display layer.

use pneumoscan_core::{HistoryView, ImageView, InferenceResult, ModelStatus};
use serde::{Deserialize, Serialize};

/// Everything the display needs to render one frame.
///
/// A fresh snapshot is published after every transition; the display never
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_model_loading: bool,
    pub model_state: ModelStatus,
    /// Reason for the last failed model load, while the model is `Failed`.
    pub model_error: Option<String>,
    pub current_image: Option<ImageView>,
    pub current_result: Option<InferenceResult>,
    /// An identify request for the current image is in flight.
    pub identifying: bool,
    /// A current image exists and the model is ready.
    pub can_identify: bool,
    /// Message for the most recent failed request, shown to the user.
    pub last_error: Option<String>,
    /// Most recent first.
    pub history: Vec<HistoryView>,
}
