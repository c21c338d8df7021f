//! Model acquisition: fetch the artifact, instantiate it, publish readiness.
//!
//! The loader owns the only [`watch::Sender`] for the model state; every other
//! component holds a receiver and can only read it.

use std::fmt;
use std::sync::Arc;

use pneumoscan_core::{InputShape, ModelStatus};
use pneumoscan_fetch::Fetch;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::ModelLoadError;
use crate::{Classifier, ModelBackend};

/// Current model, as seen by everyone except the loader.
#[derive(Clone, Default)]
pub enum ModelState {
    #[default]
    Unloaded,
    Loading,
    Ready(Arc<dyn Classifier>),
    /// Load failed; holds the reason. Terminal until the next explicit load.
    Failed(String),
}

impl ModelState {
    pub fn status(&self) -> ModelStatus {
        match self {
            Self::Unloaded => ModelStatus::Unloaded,
            Self::Loading => ModelStatus::Loading,
            Self::Ready(_) => ModelStatus::Ready,
            Self::Failed(_) => ModelStatus::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Debug for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(c) => write!(f, "Ready({})", c.describe()),
            Self::Failed(reason) => write!(f, "Failed({reason:?})"),
            other => f.write_str(other.status().as_str()),
        }
    }
}

/// Loads the classifier artifact and tracks its lifecycle.
///
/// `Unloaded → Loading → {Ready, Failed}`. Only one load runs at a time; a
/// load requested while another is in flight does nothing. Nothing is retried
/// automatically: after `Failed`, call [`load`](Self::load) again.
pub struct ModelLoader {
    fetcher: Arc<dyn Fetch>,
    backend: Arc<dyn ModelBackend>,
    shape: InputShape,
    state: watch::Sender<ModelState>,
}

impl ModelLoader {
    pub fn new(fetcher: Arc<dyn Fetch>, backend: Arc<dyn ModelBackend>, shape: InputShape) -> Self {
        let (state, _) = watch::channel(ModelState::Unloaded);
        Self {
            fetcher,
            backend,
            shape,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ModelState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> ModelStatus {
        self.state.borrow().status()
    }

    /// Fetch and instantiate the artifact at `location`.
    ///
    /// Returns the resulting status. Errors are logged and recorded as
    /// `Failed`, never returned. If a load is already in flight this returns
    /// `Loading` immediately without starting a second one. Dropping the
    /// returned future mid-load records `Failed`, so a later load can start.
    pub async fn load(&self, location: &str) -> ModelStatus {
        let started = self.state.send_if_modified(|state| {
            if matches!(state, ModelState::Loading) {
                false
            } else {
                *state = ModelState::Loading;
                true
            }
        });
        if !started {
            warn!(location, "model load already in flight, ignoring");
            return ModelStatus::Loading;
        }

        let mut guard = InFlight {
            state: &self.state,
            location,
            finished: false,
        };
        info!(location, shape = %self.shape, "loading model");
        let next = match self.fetch_and_build(location).await {
            Ok(classifier) => {
                info!(location, model = %classifier.describe(), "model ready");
                ModelState::Ready(classifier)
            }
            Err(e) => {
                error!(location, error = %e, "model load failed");
                ModelState::Failed(e.to_string())
            }
        };
        let status = next.status();
        guard.finished = true;
        self.state.send_replace(next);
        status
    }

    async fn fetch_and_build(&self, location: &str) -> Result<Arc<dyn Classifier>, ModelLoadError> {
        let artifact = self.fetcher.fetch(location).await?;
        info!(location, len = artifact.len(), "fetched model artifact");

        let backend = Arc::clone(&self.backend);
        let shape = self.shape;
        let classifier = tokio::task::spawn_blocking(move || backend.instantiate(&artifact, shape))
            .await
            .map_err(|e| ModelLoadError::Aborted(e.to_string()))?
            .map_err(ModelLoadError::Instantiate)?;

        let actual = classifier.input_shape();
        if actual != shape {
            return Err(ModelLoadError::ShapeMismatch {
                expected: shape,
                actual,
            });
        }
        Ok(Arc::from(classifier))
    }
}

/// Records `Failed` if the load future is dropped before it finishes.
struct InFlight<'a> {
    state: &'a watch::Sender<ModelState>,
    location: &'a str,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(location = self.location, "model load cancelled");
        self.state
            .send_replace(ModelState::Failed("model load cancelled".into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageTensor;
    use async_trait::async_trait;
    use pneumoscan_fetch::FetchError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Serves artifacts from memory, optionally holding every fetch until released.
    #[derive(Default)]
    struct MemoryHost {
        artifacts: HashMap<String, Vec<u8>>,
        gate: Option<Arc<Notify>>,
        fetches: AtomicUsize,
    }

    impl MemoryHost {
        fn with(mut self, location: &str, artifact: &[u8]) -> Self {
            self.artifacts.insert(location.into(), artifact.to_vec());
            self
        }
    }

    #[async_trait]
    impl Fetch for MemoryHost {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.artifacts
                .get(location)
                .cloned()
                .ok_or_else(|| FetchError::Server {
                    status: 404,
                    body: format!("{location} not found"),
                })
        }
    }

    struct Constant {
        shape: InputShape,
    }

    impl Classifier for Constant {
        fn input_shape(&self) -> InputShape {
            self.shape
        }

        fn predict(&self, _input: &ImageTensor) -> anyhow::Result<Vec<f32>> {
            Ok(vec![0.5])
        }
    }

    /// Artifact format: `ok` or `size=<n>`; anything else fails to parse.
    struct TextBackend;

    impl ModelBackend for TextBackend {
        fn instantiate(
            &self,
            artifact: &[u8],
            shape: InputShape,
        ) -> anyhow::Result<Box<dyn Classifier>> {
            let text = std::str::from_utf8(artifact)?;
            let shape = match text.strip_prefix("size=") {
                Some(n) => InputShape::square(n.parse()?),
                None if text == "ok" => shape,
                None => anyhow::bail!("unrecognized artifact {text:?}"),
            };
            Ok(Box::new(Constant { shape }))
        }
    }

    fn loader(host: MemoryHost) -> ModelLoader {
        ModelLoader::new(Arc::new(host), Arc::new(TextBackend), InputShape::square(200))
    }

    #[tokio::test]
    async fn starts_unloaded() {
        let loader = loader(MemoryHost::default());
        assert_eq!(loader.status(), ModelStatus::Unloaded);
        assert!(!loader.subscribe().borrow().is_ready());
    }

    #[tokio::test]
    async fn successful_load_is_ready() {
        let loader = loader(MemoryHost::default().with("m.onnx", b"ok"));
        let rx = loader.subscribe();
        assert_eq!(loader.load("m.onnx").await, ModelStatus::Ready);
        assert!(rx.borrow().is_ready());
    }

    #[tokio::test]
    async fn missing_artifact_fails_and_is_not_retried() {
        let loader = loader(MemoryHost::default());
        assert_eq!(loader.load("missing.onnx").await, ModelStatus::Failed);
        let state = loader.state();
        assert!(state.failure().unwrap().contains("404"));
        // Still failed: no automatic retry.
        tokio::task::yield_now().await;
        assert_eq!(loader.status(), ModelStatus::Failed);
    }

    #[tokio::test]
    async fn corrupt_artifact_fails() {
        let loader = loader(MemoryHost::default().with("m.onnx", b"garbage"));
        assert_eq!(loader.load("m.onnx").await, ModelStatus::Failed);
        assert!(loader.state().failure().unwrap().contains("unrecognized"));
    }

    #[tokio::test]
    async fn declared_shape_must_match_configuration() {
        let loader = loader(MemoryHost::default().with("m.onnx", b"size=224"));
        assert_eq!(loader.load("m.onnx").await, ModelStatus::Failed);
        assert!(loader.state().failure().unwrap().contains("224"));
    }

    #[tokio::test]
    async fn explicit_reload_recovers_from_failure() {
        let loader = loader(MemoryHost::default().with("good.onnx", b"ok"));
        assert_eq!(loader.load("bad.onnx").await, ModelStatus::Failed);
        assert_eq!(loader.load("good.onnx").await, ModelStatus::Ready);
    }

    #[tokio::test]
    async fn concurrent_load_is_ignored_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let host = Arc::new(MemoryHost {
            gate: Some(gate.clone()),
            ..MemoryHost::default().with("m.onnx", b"ok")
        });
        let loader = Arc::new(ModelLoader::new(
            host.clone(),
            Arc::new(TextBackend),
            InputShape::square(200),
        ));
        let mut rx = loader.subscribe();

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.load("m.onnx").await }
        });
        rx.wait_for(|s| matches!(s, ModelState::Loading))
            .await
            .unwrap();

        // A second request while loading starts nothing.
        assert_eq!(loader.load("m.onnx").await, ModelStatus::Loading);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), ModelStatus::Ready);
        assert_eq!(host.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(loader.status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn dropped_load_can_be_reloaded() {
        let gate = Arc::new(Notify::new());
        let host = Arc::new(MemoryHost {
            gate: Some(gate.clone()),
            ..MemoryHost::default().with("m.onnx", b"ok")
        });
        let loader = ModelLoader::new(host.clone(), Arc::new(TextBackend), InputShape::square(200));

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), loader.load("m.onnx")).await;
        assert!(abandoned.is_err());
        assert_eq!(loader.status(), ModelStatus::Failed);
        assert!(loader.state().failure().unwrap().contains("cancelled"));

        gate.notify_one();
        assert_eq!(loader.load("m.onnx").await, ModelStatus::Ready);
        assert_eq!(host.fetches.load(Ordering::SeqCst), 2);
    }
}
