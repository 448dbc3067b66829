/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Runs the short-range model and decodes its anchor-relative regressors into
/// boxes and six keypoints in model-input pixels. Thresholding and NMS happen
/// later in the decoder.
use std::path::Path;

use crate::detection::domain::inference_backend::InferenceBackend;
use crate::detection::domain::raw_output::{RawCandidate, RawOutput};
use crate::preprocessing::domain::letterbox::{InputSpec, NormalizationRange, Tensor};
use crate::shared::error::DetectionError;
use crate::shared::geometry::{BoundingBox, Point};

use super::execution_provider::build_session;

/// Fallback input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 128;

/// Values per anchor: box (4) + 6 keypoints × (x, y).
const NUM_REGRESSORS: usize = 16;

const NUM_KEYPOINTS: usize = 6;

/// Raw logits are clipped before the sigmoid to keep it finite.
const SCORE_CLIP: f32 = 100.0;

/// BlazeFace backend backed by an ONNX Runtime session.
pub struct OnnxBlazefaceBackend {
    session: ort::session::Session,
    input_size: u32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceBackend {
    /// Load a BlazeFace ONNX model.
    ///
    /// The input resolution is read from the model's input shape (NCHW),
    /// falling back to 128 when the shape is dynamic.
    pub fn new(model_path: &Path) -> Result<Self, DetectionError> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let anchors = generate_anchors(input_size);
        log::debug!(
            "BlazeFace model {} ready: {input_size}x{input_size}, {} anchors",
            model_path.display(),
            anchors.len()
        );
        Ok(Self {
            session,
            input_size,
            anchors,
        })
    }

    fn run(&mut self, tensor: &Tensor) -> Result<(Vec<f32>, Vec<f32>), Box<dyn std::error::Error>> {
        let input_value = ort::value::Tensor::from_array(tensor.clone())?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors, in either order depending on export:
        // - regressors: [1, N, 16] (box deltas + keypoints)
        // - classificators: [1, N, 1] (confidence logits)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let a = outputs[0].try_extract_array::<f32>()?;
        let b = outputs[1].try_extract_array::<f32>()?;
        let a = a.as_slice().ok_or("Cannot get output slice")?.to_vec();
        let b = b.as_slice().ok_or("Cannot get output slice")?.to_vec();
        if a.len() >= b.len() {
            Ok((a, b))
        } else {
            Ok((b, a))
        }
    }
}

impl InferenceBackend for OnnxBlazefaceBackend {
    fn input_spec(&self) -> InputSpec {
        InputSpec {
            width: self.input_size,
            height: self.input_size,
            range: NormalizationRange::MinusOneToOne,
            pad_value: 0,
        }
    }

    fn infer(&mut self, tensor: &Tensor) -> Result<RawOutput, DetectionError> {
        let (regressors, scores) = self
            .run(tensor)
            .map_err(|e| DetectionError::Inference(e.to_string()))?;
        if regressors.len() < scores.len() * NUM_REGRESSORS {
            return Err(DetectionError::Inference(format!(
                "{} regressor values for {} scores",
                regressors.len(),
                scores.len()
            )));
        }
        Ok(decode_anchors(
            &self.anchors,
            &regressors,
            &scores,
            self.input_size as f32,
        ))
    }
}

/// Decode anchor-relative regressors into boxes in input pixels.
fn decode_anchors(
    anchors: &[[f32; 2]],
    regressors: &[f32],
    scores: &[f32],
    input_size: f32,
) -> RawOutput {
    let candidates = anchors
        .iter()
        .zip(scores)
        .zip(regressors.chunks_exact(NUM_REGRESSORS))
        .map(|((anchor, &raw_score), reg)| {
            let ax = anchor[0] * input_size;
            let ay = anchor[1] * input_size;
            let cx = ax + reg[0];
            let cy = ay + reg[1];
            let bbox = BoundingBox::from_center(cx as f64, cy as f64, reg[2] as f64, reg[3] as f64);
            let landmarks = (0..NUM_KEYPOINTS)
                .map(|k| {
                    Point::new(
                        (ax + reg[4 + k * 2]) as f64,
                        (ay + reg[4 + k * 2 + 1]) as f64,
                    )
                })
                .collect();
            RawCandidate {
                bbox,
                score: sigmoid(raw_score.clamp(-SCORE_CLIP, SCORE_CLIP)) as f64,
                landmarks,
            }
        })
        .collect();
    RawOutput::new(candidates)
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Generate BlazeFace anchor centres in normalized [0,1] coordinates.
///
/// The short-range model uses two feature maps at strides 8 and 16,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors(input_size: u32) -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::new();

    for &(stride, num) in &strides {
        let grid_size = (input_size as usize / stride).max(1);
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
