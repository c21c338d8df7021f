//! Model status and input geometry shared between the loader and the display layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the classifier: `Unloaded → Loading → {Ready, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial input size of the classifier. The tensor layout is always
/// `[1, height, width, 1]` (batch of one, single grayscale channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
}

impl InputShape {
    pub const BATCH: usize = 1;
    pub const CHANNELS: usize = 1;

    pub fn square(size: usize) -> Self {
        Self {
            height: size,
            width: size,
        }
    }

    pub fn is_square(&self) -> bool {
        self.height == self.width
    }

    /// `[1, H, W, 1]`.
    pub fn dims(&self) -> [usize; 4] {
        [Self::BATCH, self.height, self.width, Self::CHANNELS]
    }

    /// Number of elements in a tensor of this shape.
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check a model-declared shape against this one.
    ///
    /// Negative (dynamic) dimensions in `declared` match anything.
    pub fn accepts(&self, declared: &[i64]) -> bool {
        declared.len() == 4
            && declared
                .iter()
                .zip(self.dims())
                .all(|(&d, expected)| d < 0 || d as usize == expected)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [b, h, w, c] = self.dims();
        write!(f, "[{b}, {h}, {w}, {c}]")
    }
}
