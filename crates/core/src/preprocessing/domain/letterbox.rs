//! Fits an image into the detector's fixed input shape.
//!
//! Both resize policies are a uniform scale followed by a translation, so a
//! single affine transform describes the mapping and its inverse is exact.

use serde::Deserialize;

use super::normalized_image::NormalizedImage;
use super::transform_matrix::TransformMatrix;
use crate::shared::error::DetectionError;

/// NCHW float tensor `[1, 3, height, width]`.
pub type Tensor = ndarray::Array4<f32>;

/// How the image is fitted into a model input of a different aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizePolicy {
    /// Scale to fit entirely, pad the remainder.
    #[default]
    Letterbox,
    /// Scale to fill entirely, crop the overflow evenly on both sides.
    CenterCrop,
}

/// Numeric range the model expects pixel values in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationRange {
    ZeroToOne,
    MinusOneToOne,
}

impl NormalizationRange {
    pub fn normalize(self, value: u8) -> f32 {
        match self {
            Self::ZeroToOne => value as f32 / 255.0,
            Self::MinusOneToOne => value as f32 / 127.5 - 1.0,
        }
    }
}

/// Fixed input geometry and value range of a detection model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub range: NormalizationRange,
    /// Raw value written into letterbox padding before normalization.
    pub pad_value: u8,
}

impl InputSpec {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }
}

/// Resize and normalize `image` to `spec`.
///
/// Returns the tensor and the transform from tensor coordinates back to the
/// original host frame (orientation included).
pub fn prepare(
    image: &NormalizedImage,
    spec: &InputSpec,
    policy: ResizePolicy,
) -> Result<(Tensor, TransformMatrix), DetectionError> {
    let src_w = image.width() as usize;
    let src_h = image.height() as usize;
    if src_w == 0 || src_h == 0 {
        return Err(DetectionError::Preprocess(format!(
            "zero-area frame ({src_w}x{src_h})"
        )));
    }
    if spec.width == 0 || spec.height == 0 {
        return Err(DetectionError::Preprocess(format!(
            "model input must be non-empty, got {}x{}",
            spec.width, spec.height
        )));
    }

    let forward = fit_transform(src_w as f64, src_h as f64, spec, policy);
    let [scale, _, offset_x, _, _, offset_y] = forward.coefficients();

    let pad = spec.range.normalize(spec.pad_value);
    let tw = spec.width as usize;
    let th = spec.height as usize;
    let mut tensor = Tensor::from_elem((1, 3, th, tw), pad);
    let src = image.as_ndarray()?;

    // Nearest-neighbour sampling at tensor pixel centres.
    let src_xs: Vec<Option<usize>> = (0..tw)
        .map(|x| source_index(x, offset_x, scale, src_w))
        .collect();
    for y in 0..th {
        let Some(sy) = source_index(y, offset_y, scale, src_h) else {
            continue;
        };
        for (x, sx) in src_xs.iter().enumerate() {
            let Some(sx) = *sx else {
                continue;
            };
            for c in 0..3 {
                tensor[[0, c, y, x]] = spec.range.normalize(src[[sy, sx, c]]);
            }
        }
    }

    let to_image = forward.inverse().ok_or_else(|| {
        DetectionError::Preprocess("resize transform is not invertible".into())
    })?;
    Ok((tensor, to_image.then(image.to_source())))
}

/// Image → tensor transform for the given policy.
pub fn fit_transform(
    src_w: f64,
    src_h: f64,
    spec: &InputSpec,
    policy: ResizePolicy,
) -> TransformMatrix {
    let tw = spec.width as f64;
    let th = spec.height as f64;
    match policy {
        ResizePolicy::Letterbox => {
            let scale = (tw / src_w).min(th / src_h);
            let new_w = (src_w * scale).round().min(tw);
            let new_h = (src_h * scale).round().min(th);
            let pad_x = ((tw - new_w) / 2.0).floor();
            let pad_y = ((th - new_h) / 2.0).floor();
            TransformMatrix::scale_translate(scale, scale, pad_x, pad_y)
        }
        ResizePolicy::CenterCrop => {
            let scale = (tw / src_w).max(th / src_h);
            let crop_x = (src_w * scale - tw) / 2.0;
            let crop_y = (src_h * scale - th) / 2.0;
            TransformMatrix::scale_translate(scale, scale, -crop_x, -crop_y)
        }
    }
}

fn source_index(t: usize, offset: f64, scale: f64, len: usize) -> Option<usize> {
    let s = ((t as f64 + 0.5) - offset) / scale;
    if s < 0.0 || s >= len as f64 {
        None
    } else {
        Some((s as usize).min(len - 1))
    }
}
