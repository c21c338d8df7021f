//! Session state controller.
//!
//! Owns the current image, the current result, and the history, and is the
//! only thing that mutates them. Identify requests are split in three so that
//! several can be in flight at once without clobbering each other:
//!
//! 1. [`SessionController::begin_identify`] checks the gate and hands out an
//!    [`IdentifyJob`] tagged with the current generation;
//! 2. [`IdentifyJob::run`] does the slow work without touching session state;
//! 3. [`SessionController::complete_identify`] applies the outcome only if no
//!    newer request, selection, or clear has happened since.

use std::collections::VecDeque;
use std::sync::Arc;

use pneumoscan_ai::{ClassifyError, ModelState, Preprocessor, infer};
use pneumoscan_core::{
    HistoryEntry, HistoryView, ImageHandle, ImageInput, ImageView, InferenceResult,
    SessionConfig, SourceError, resolve,
};
use pneumoscan_fetch::Fetch;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::SessionSnapshot;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no history entry at index {index} (history has {len})")]
    NoSuchEntry { index: usize, len: usize },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Work for one identify request, detached from the session.
pub struct IdentifyJob {
    generation: u64,
    handle: ImageHandle,
    model: ModelState,
    preprocessor: Preprocessor,
    fetcher: Arc<dyn Fetch>,
}

/// Result of an [`IdentifyJob`], to be fed back to the controller.
pub struct IdentifyOutcome {
    generation: u64,
    handle: ImageHandle,
    result: Result<InferenceResult, ClassifyError>,
}

impl IdentifyJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self) -> &ImageHandle {
        &self.handle
    }

    /// Preprocess and infer. Touches no session state.
    pub async fn run(self) -> IdentifyOutcome {
        let result = match self
            .preprocessor
            .preprocess(&self.handle, self.fetcher.as_ref())
            .await
        {
            Ok(tensor) => infer(&self.model, &tensor).await,
            Err(e) => Err(e),
        };
        IdentifyOutcome {
            generation: self.generation,
            handle: self.handle,
            result,
        }
    }
}

impl IdentifyOutcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self) -> &ImageHandle {
        &self.handle
    }
}

/// What [`SessionController::complete_identify`] did with an outcome.
#[derive(Debug)]
pub enum Completion {
    /// Stored as the current result.
    Applied(InferenceResult),
    /// The request failed; the result is cleared and the error surfaced.
    Failed(ClassifyError),
    /// Superseded by a later request or selection; discarded.
    Stale,
}

pub struct SessionController {
    preprocessor: Preprocessor,
    fetcher: Arc<dyn Fetch>,
    model: watch::Receiver<ModelState>,
    history_limit: Option<usize>,

    current: Option<ImageHandle>,
    result: Option<InferenceResult>,
    history: VecDeque<HistoryEntry>,
    last_error: Option<String>,
    /// Bumped by every selection, clear, reset, and identify request.
    generation: u64,
    /// Generation of the identify request whose outcome is still awaited.
    pending: Option<u64>,

    observers: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        config: &SessionConfig,
        fetcher: Arc<dyn Fetch>,
        model: watch::Receiver<ModelState>,
    ) -> Result<Self, ClassifyError> {
        let preprocessor = Preprocessor::new(config.input_shape(), config.pixel_scale)?;
        let mut session = Self {
            preprocessor,
            fetcher,
            model,
            history_limit: config.history_limit,
            current: None,
            result: None,
            history: VecDeque::new(),
            last_error: None,
            generation: 0,
            pending: None,
            observers: watch::Sender::new(empty_snapshot()),
        };
        session.publish();
        Ok(session)
    }

    // ── Observation ──

    pub fn snapshot(&self) -> SessionSnapshot {
        let model = self.model.borrow();
        let status = model.status();
        SessionSnapshot {
            is_model_loading: matches!(*model, ModelState::Loading),
            model_state: status,
            model_error: model.failure().map(str::to_string),
            current_image: self.current.as_ref().map(ImageView::from),
            current_result: self.result,
            identifying: self.pending.is_some(),
            can_identify: self.current.is_some() && model.is_ready(),
            last_error: self.last_error.clone(),
            history: self.history.iter().map(HistoryView::from).collect(),
        }
    }

    /// Subscribe to snapshots published after each transition.
    pub fn observe(&self) -> watch::Receiver<SessionSnapshot> {
        self.observers.subscribe()
    }

    /// Republish the snapshot, e.g. after the model state changed.
    pub fn refresh(&mut self) {
        self.publish();
    }

    pub fn current_image(&self) -> Option<&ImageHandle> {
        self.current.as_ref()
    }

    pub fn current_result(&self) -> Option<InferenceResult> {
        self.result
    }

    pub fn history(&self) -> impl Iterator<Item = &ImageHandle> {
        self.history.iter().map(|entry| &entry.handle)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn publish(&mut self) {
        self.observers.send_replace(self.snapshot());
    }

    // ── Selection ──

    /// Make `handle` current, clear the result, and prepend it to history.
    ///
    /// Re-selecting an image already in history prepends it again.
    pub fn select_image(&mut self, handle: ImageHandle) {
        info!(image = %handle, origin = ?handle.origin(), "image selected");
        self.supersede();
        self.result = None;
        self.last_error = None;
        self.current = Some(handle.clone());

        self.history.push_front(HistoryEntry::new(handle));
        if let Some(limit) = self.history_limit {
            while self.history.len() > limit {
                if let Some(evicted) = self.history.pop_back() {
                    debug!(image = %evicted.handle, "evicted oldest history entry");
                }
            }
        }
        self.publish();
    }

    /// Clear the current image, its result, and any error. History is untouched.
    pub fn clear_image(&mut self) {
        if self.current.is_some() || self.pending.is_some() {
            debug!("image cleared");
            self.supersede();
        }
        self.current = None;
        self.result = None;
        self.last_error = None;
        self.publish();
    }

    /// Resolve raw input and select it, or clear on an empty selection.
    pub fn apply_input(&mut self, input: ImageInput) -> Result<(), SourceError> {
        match resolve(input)? {
            Some(handle) => self.select_image(handle),
            None => self.clear_image(),
        }
        Ok(())
    }

    /// Select the history entry at `index` (0 = most recent).
    pub fn select_history_entry(&mut self, index: usize) -> Result<(), SessionError> {
        let handle = self
            .history
            .get(index)
            .map(|entry| entry.handle.clone())
            .ok_or(SessionError::NoSuchEntry {
                index,
                len: self.history.len(),
            })?;
        self.select_image(handle);
        Ok(())
    }

    /// Drop everything, history included.
    pub fn reset(&mut self) {
        info!(history = self.history.len(), "session reset");
        self.supersede();
        self.current = None;
        self.result = None;
        self.last_error = None;
        self.history.clear();
        self.publish();
    }

    fn supersede(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    // ── Identify ──

    /// Start an identify request for the current image.
    ///
    /// Returns `Ok(None)` when there is no current image. Fails with
    /// [`ClassifyError::ModelNotReady`] when the model is not `Ready`; the
    /// current result is left as it was.
    pub fn begin_identify(&mut self) -> Result<Option<IdentifyJob>, ClassifyError> {
        let Some(handle) = self.current.clone() else {
            debug!("identify requested without an image, ignoring");
            return Ok(None);
        };

        let model = self.model.borrow().clone();
        if !model.is_ready() {
            let err = ClassifyError::ModelNotReady(model.status());
            warn!(error = %err, "identify refused");
            self.last_error = Some(err.to_string());
            self.publish();
            return Err(err);
        }

        self.generation += 1;
        self.pending = Some(self.generation);
        self.last_error = None;
        info!(image = %handle, generation = self.generation, "identify started");
        let job = IdentifyJob {
            generation: self.generation,
            handle,
            model,
            preprocessor: self.preprocessor.clone(),
            fetcher: Arc::clone(&self.fetcher),
        };
        self.publish();
        Ok(Some(job))
    }

    /// Apply a finished job if it is still the latest request.
    pub fn complete_identify(&mut self, outcome: IdentifyOutcome) -> Completion {
        if outcome.generation != self.generation {
            debug!(
                image = %outcome.handle,
                generation = outcome.generation,
                latest = self.generation,
                "discarding stale identify result"
            );
            return Completion::Stale;
        }

        self.pending = None;
        let completion = match outcome.result {
            Ok(result) => {
                info!(image = %outcome.handle, probability = result.probability, "identify complete");
                self.result = Some(result);
                self.last_error = None;
                Completion::Applied(result)
            }
            Err(e) => {
                warn!(image = %outcome.handle, error = %e, "identify failed");
                self.result = None;
                self.last_error = Some(e.to_string());
                Completion::Failed(e)
            }
        };
        self.publish();
        completion
    }

    /// Identify the current image and wait for the result.
    ///
    /// `Ok(None)` means there was no current image.
    pub async fn request_identify(&mut self) -> Result<Option<InferenceResult>, ClassifyError> {
        let Some(job) = self.begin_identify()? else {
            return Ok(None);
        };
        let outcome = job.run().await;
        match self.complete_identify(outcome) {
            Completion::Applied(result) => Ok(Some(result)),
            Completion::Failed(e) => Err(e),
            Completion::Stale => Ok(None),
        }
    }
}

fn empty_snapshot() -> SessionSnapshot {
    SessionSnapshot {
        is_model_loading: false,
        model_state: pneumoscan_core::ModelStatus::Unloaded,
        model_error: None,
        current_image: None,
        current_result: None,
        identifying: false,
        can_identify: false,
        last_error: None,
        history: Vec::new(),
    }
}
