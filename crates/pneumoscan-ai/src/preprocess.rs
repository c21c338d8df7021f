//! Image → tensor preprocessing.
//!
//! Decodes the image, converts it to a single grayscale channel, resizes it
//! bilinearly to the model's square input, and lays it out as `[1, H, W, 1]`.

use image::GrayImage;
use image::imageops::{self, FilterType};
use pneumoscan_core::{ImageHandle, InputShape, PixelScale};
use pneumoscan_fetch::Fetch;
use tracing::debug;

use crate::ClassifyError;

/// Fixed-shape model input: `[1, H, W, 1]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    shape: InputShape,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn new(shape: InputShape, data: Vec<f32>) -> Result<Self, ClassifyError> {
        if data.len() != shape.len() {
            return Err(ClassifyError::InvalidShape(format!(
                "{} values cannot be reshaped to {shape}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    /// `[1, H, W, 1]`.
    pub fn dims(&self) -> [usize; 4] {
        self.shape.dims()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }
}

/// Turns image handles into model input tensors of one fixed shape.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    shape: InputShape,
    scale: PixelScale,
}

impl Preprocessor {
    /// The target must be square and non-empty; a rectangular target would
    /// feed the model distorted geometry.
    pub fn new(shape: InputShape, scale: PixelScale) -> Result<Self, ClassifyError> {
        if shape.is_empty() {
            return Err(ClassifyError::InvalidShape(format!(
                "input shape {shape} is empty"
            )));
        }
        if !shape.is_square() {
            return Err(ClassifyError::InvalidShape(format!(
                "input shape {shape} is not square"
            )));
        }
        Ok(Self { shape, scale })
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    /// Obtain the handle's bytes (fetching remote URLs) and build a tensor.
    ///
    /// Any failure to get or decode the bytes, including an unreachable URL,
    /// is a [`ClassifyError::Decode`].
    pub async fn preprocess(
        &self,
        handle: &ImageHandle,
        fetcher: &dyn Fetch,
    ) -> Result<ImageTensor, ClassifyError> {
        match handle {
            ImageHandle::Uploaded(img) => self.tensor_from_bytes(img.bytes(), &handle.locator()),
            ImageHandle::Remote(url) => {
                let bytes = fetcher
                    .fetch(url)
                    .await
                    .map_err(|e| ClassifyError::decode(url.as_str(), e))?;
                self.tensor_from_bytes(&bytes, url)
            }
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, ...) into a tensor.
    pub fn tensor_from_bytes(
        &self,
        bytes: &[u8],
        source_name: &str,
    ) -> Result<ImageTensor, ClassifyError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| ClassifyError::decode(source_name, e))?;
        debug!(
            source = source_name,
            width = decoded.width(),
            height = decoded.height(),
            "decoded image"
        );
        self.tensor_from_gray(&decoded.to_luma8())
    }

    /// Resize a grayscale image and reshape it to `[1, H, W, 1]`.
    pub fn tensor_from_gray(&self, gray: &GrayImage) -> Result<ImageTensor, ClassifyError> {
        let (w, h) = (self.shape.width as u32, self.shape.height as u32);
        let resized;
        let grid = if gray.dimensions() == (w, h) {
            gray
        } else {
            resized = imageops::resize(gray, w, h, FilterType::Triangle);
            &resized
        };

        if grid.dimensions() != (w, h) {
            return Err(ClassifyError::InvalidShape(format!(
                "resized grid is {}x{}, model expects {w}x{h}",
                grid.width(),
                grid.height()
            )));
        }

        let data = grid.as_raw().iter().map(|&p| self.scale.apply(p)).collect();
        ImageTensor::new(self.shape, data)
    }
}
