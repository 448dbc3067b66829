use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::Parser;
use serde_json::{json, Map, Value};

use faceframe_core::detection::infrastructure::model_resolver;
use faceframe_core::plugin::frame_processor_plugin::{FrameProcessorPlugin, Options};
use faceframe_core::plugin::registry::{register_plugins, PluginRegistry};
use faceframe_core::shared::constants::{
    BLAZEFACE_MODEL_NAME, BLAZEFACE_MODEL_URL, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_IOU_THRESHOLD, DEFAULT_LOAD_TIMEOUT_MS, DETECT_FACES_PLUGIN_NAME,
};
use faceframe_core::shared::frame::{Orientation, PixelFormat, RawFrame};

/// Run the detectFaces frame processor on image files and print the results as JSON.
#[derive(Parser)]
#[command(name = "faceframe")]
struct Cli {
    /// Input image files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence: f64,

    /// Keep at most this many faces per image.
    #[arg(long)]
    max_faces: Option<u32>,

    /// Include the six facial keypoints for each face.
    #[arg(long)]
    landmarks: bool,

    /// IoU above which overlapping boxes are suppressed (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f64,

    /// BlazeFace ONNX model file (downloaded to the cache when omitted).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Clockwise rotation, in degrees, that brings the image upright.
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    rotation: i32,

    /// Center-crop instead of letterboxing into the model input.
    #[arg(long)]
    crop: bool,

    /// Run each image this many times and print a timing summary.
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let orientation = Orientation::from_degrees(cli.rotation)?;
    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => resolve_model()?,
    };

    register_plugins();
    let construction = construction_options(&cli, &model_path);
    let plugin =
        PluginRegistry::global().create(DETECT_FACES_PLUGIN_NAME, Some(&construction))?;
    let arguments = frame_arguments(&cli);

    let mut failures = 0;
    for input in &cli.inputs {
        let result = detect_file(plugin.as_ref(), input, orientation, &arguments, cli.repeat)?;
        if let Some(error) = result.get("error") {
            log::error!("{}: {}", input.display(), error["message"]);
            failures += 1;
        }
        print_result(input, result, cli.pretty)?;
    }

    if cli.repeat > 1 {
        plugin.summary();
    }
    if failures > 0 {
        return Err(format!("{failures} of {} images failed", cli.inputs.len()).into());
    }
    Ok(())
}

fn detect_file(
    plugin: &dyn FrameProcessorPlugin,
    input: &Path,
    orientation: Orientation,
    arguments: &Options,
    repeat: usize,
) -> Result<Value, Box<dyn std::error::Error>> {
    let image = image::open(input)
        .map_err(|e| format!("Cannot read {}: {e}", input.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let frame =
        RawFrame::new(image.as_raw(), width, height, PixelFormat::Rgb8).with_orientation(orientation);

    let mut last = Value::Null;
    for i in 0..repeat {
        let frame = frame.clone().with_timestamp(i as u64);
        last = plugin
            .callback(&frame, Some(arguments))
            .ok_or("frame was not processed")?;
    }
    log::debug!("{}: {}x{} ({} runs)", input.display(), width, height, repeat);
    Ok(last)
}

fn print_result(input: &Path, result: Value, pretty: bool) -> Result<(), serde_json::Error> {
    let mut out = Map::new();
    out.insert("input".into(), json!(input.display().to_string()));
    if let Value::Object(fields) = result {
        out.extend(fields);
    }
    let out = Value::Object(out);
    let text = if pretty {
        serde_json::to_string_pretty(&out)?
    } else {
        serde_json::to_string(&out)?
    };
    println!("{text}");
    Ok(())
}

fn construction_options(cli: &Cli, model_path: &Path) -> Options {
    let mut options = Map::new();
    options.insert("modelPath".into(), json!(model_path.to_string_lossy()));
    options.insert("iouThreshold".into(), json!(cli.iou));
    options.insert(
        "resizePolicy".into(),
        json!(if cli.crop { "centerCrop" } else { "letterbox" }),
    );
    // One frame at a time, so the in-flight bound never rejects.
    options.insert("maxConcurrentFrames".into(), json!(1));
    options.insert("collectTimings".into(), json!(cli.repeat > 1));
    options
}

fn frame_arguments(cli: &Cli) -> Options {
    let mut arguments = Map::new();
    arguments.insert("confidenceThreshold".into(), json!(cli.confidence));
    if let Some(max) = cli.max_faces {
        arguments.insert("maxFaces".into(), json!(max));
    }
    arguments.insert("returnLandmarks".into(), json!(cli.landmarks));
    arguments
}

fn resolve_model() -> Result<PathBuf, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {BLAZEFACE_MODEL_NAME}");
    let path = model_resolver::resolve(
        BLAZEFACE_MODEL_NAME,
        BLAZEFACE_MODEL_URL,
        None,
        Some(Box::new(download_progress)),
        Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
    )?;
    Ok(path)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for input in &cli.inputs {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.iou) {
        return Err(format!("IoU must be between 0.0 and 1.0, got {}", cli.iou).into());
    }
    if cli.max_faces == Some(0) {
        return Err("Max faces must be at least 1".into());
    }
    if cli.repeat == 0 {
        return Err("Repeat must be at least 1".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
