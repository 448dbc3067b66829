use std::collections::HashMap;
use std::time::Instant;

pub const STAGE_ADAPT: &str = "adapt";
pub const STAGE_PREPROCESS: &str = "preprocess";
pub const STAGE_INFERENCE: &str = "inference";
pub const STAGE_DECODE: &str = "decode";

/// Faces returned for a frame.
pub const METRIC_FACES: &str = "faces";

/// Cross-cutting observer for per-frame pipeline events.
///
/// Decouples the detection pipeline from where timings end up (nowhere in
/// the plugin by default, an aggregated summary in the CLI).
pub trait PipelineLogger: Send {
    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Aggregates per-stage timings and metrics and reports a summary through
/// the `log` crate.
///
/// A frame is counted each time its first stage (`adapt`) is timed.
pub struct StdoutPipelineLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames: usize,
}

impl StdoutPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// Frames that entered the pipeline.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames;
        let mut lines = vec![format!(
            "Detection summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        // Stages in pipeline order, then anything else alphabetically.
        let mut stages: Vec<&String> = self.timings.keys().collect();
        stages.sort_by_key(|s| (stage_rank(s), s.to_string()));
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let worst_ms = durations.iter().cloned().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.2}ms  max {worst_ms:6.2}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", mean(&self.metrics[name])));
        }

        if let Some(per_frame) = self.per_frame_ms() {
            if per_frame > 0.0 {
                lines.push(format!(
                    "  Pipeline: {per_frame:.2}ms/frame ({:.1} fps)",
                    1000.0 / per_frame
                ));
            }
        }

        Some(lines.join("\n"))
    }

    /// Returns the timing data for a given stage.
    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    /// Returns the metric data for a given name.
    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Mean per-frame time across the four pipeline stages.
    fn per_frame_ms(&self) -> Option<f64> {
        let samples = self.timings.get(STAGE_ADAPT)?.len();
        if samples == 0 {
            return None;
        }
        let total: f64 = [STAGE_ADAPT, STAGE_PREPROCESS, STAGE_INFERENCE, STAGE_DECODE]
            .iter()
            .filter_map(|s| self.timings.get(*s))
            .flat_map(|v| v.iter())
            .sum();
        Some(total / samples as f64)
    }
}

fn stage_rank(stage: &str) -> usize {
    match stage {
        STAGE_ADAPT => 0,
        STAGE_PREPROCESS => 1,
        STAGE_INFERENCE => 2,
        STAGE_DECODE => 3,
        _ => 4,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        if stage == STAGE_ADAPT {
            self.frames += 1;
        }
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
