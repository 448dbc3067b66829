use image::RgbImage;
use ndarray::ArrayView3;

use super::transform_matrix::TransformMatrix;
use crate::shared::error::DetectionError;

/// An upright RGB8 image derived from a host frame.
///
/// Carries the transform from its own pixel space back to the frame it came
/// from, so later stages never need to know the frame's orientation.
#[derive(Clone, Debug)]
pub struct NormalizedImage {
    image: RgbImage,
    to_source: TransformMatrix,
}

impl NormalizedImage {
    pub fn new(image: RgbImage, to_source: TransformMatrix) -> Self {
        Self { image, to_source }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn to_source(&self) -> &TransformMatrix {
        &self.to_source
    }

    /// `[height, width, 3]` view over the pixel data.
    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, DetectionError> {
        let shape = (self.height() as usize, self.width() as usize, 3);
        ArrayView3::from_shape(shape, self.image.as_raw()).map_err(|e| {
            DetectionError::Preprocess(format!("image buffer does not match {shape:?}: {e}"))
        })
    }
}
