use anyhow::Result;
use clap::Parser;

use bvr_live::annotation::Annotator;
use bvr_live::capture::{CaptureConfig, NokhwaCamera};
use bvr_live::common::{InferenceDevice, ModelConfig, ModelVersion};
use bvr_live::display::DisplayConfig;
use bvr_live::live_loop::{self, LoopOptions};

const DEFAULT_WINDOW: (usize, usize) = (640, 480);

#[derive(Parser, Debug)]
#[command(name = "bvr_live", about = "Real-time object detection on a webcam stream with a YOLO ONNX model")]
struct Args {
    /// Camera index
    #[arg(long, default_value_t = 0)]
    source: u32,

    /// Minimum confidence for a detection to be shown
    #[arg(long, default_value_t = 0.5)]
    conf: f32,

    /// Inference image size (e.g. 640)
    #[arg(long, default_value_t = 640)]
    imgsz: u32,

    /// Path to the ONNX weights, or a file name looked up in the model cache
    #[arg(long, default_value = "yolov8n.onnx")]
    model: String,

    /// Where to download the weights from when they are not found locally
    #[arg(long)]
    model_url: Option<String>,

    /// Labels file, one class name per line
    #[arg(long)]
    labels: Option<String>,

    /// YOLO generation the weights were exported from (yolov5 .. yolov12)
    #[arg(long, default_value = "yolov8")]
    model_version: String,

    /// Execution provider: cpu, cuda or tensorrt
    #[arg(long, default_value = "cpu")]
    device: String,

    #[arg(long, default_value_t = 0)]
    device_id: usize,

    /// ONNX Runtime shared library to load
    #[arg(long, env = "ORT_DYLIB_PATH")]
    ort_lib: Option<String>,

    /// IoU threshold for non-maximum suppression
    #[arg(long, default_value_t = 0.7)]
    iou: f32,

    #[arg(long, default_value_t = 300)]
    max_det: usize,

    /// Requested capture width
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Requested capture height
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// TTF font for labels, instead of the bundled DejaVu Sans Mono
    #[arg(long)]
    font: Option<String>,

    /// Do not open a window
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Print one JSON line of detections per frame to stdout
    #[arg(long)]
    json: bool,

    /// Log per-stage timings
    #[arg(long)]
    profile: bool,
}

impl Args {
    fn model_config(&self) -> Result<ModelConfig> {
        let inference_device = InferenceDevice::from_str(&self.device, self.device_id).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown device '{}', expected one of {:?}",
                self.device,
                InferenceDevice::all_inference_devices()
            )
        })?;
        let model_version = ModelVersion::parse(&self.model_version)
            .ok_or_else(|| anyhow::anyhow!("Unknown model version '{}'", self.model_version))?;

        Ok(ModelConfig {
            weights_path: self.model.clone(),
            ort_lib_path: self.ort_lib.clone(),
            labels_path: self.labels.clone(),
            inference_device,
            model_version,
            conf_threshold: self.conf,
            iou_threshold: self.iou,
            max_det: self.max_det,
            image_size: self.imgsz,
            profile: self.profile,
        })
    }

    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            index: self.source,
            resolution: self.width.zip(self.height),
        }
    }

    fn display_config(&self) -> DisplayConfig {
        let (width, height) = match self.width.zip(self.height) {
            Some((w, h)) => (w as usize, h as usize),
            None => DEFAULT_WINDOW,
        };
        DisplayConfig::new(&bvr_live::model_name(&self.model), width, height, self.headless)
    }

    fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            conf_threshold: self.conf,
            image_size: self.imgsz,
            max_frames: self.max_frames,
            json: self.json,
            profile: self.profile,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let model_config = args.model_config()?;
    log::info!("\n{}", model_config.summary());

    let mut annotator = match &args.font {
        Some(path) => Annotator::from_font_file(path)?,
        None => Annotator::new()?,
    };

    let capture_config = args.capture_config();
    let display_config = args.display_config();
    let started = live_loop::start(
        || bvr_live::init_detector(&model_config, args.model_url.as_deref()),
        || NokhwaCamera::open(&capture_config),
        || display_config.open(),
    );
    let (mut detector, mut camera, mut sink) = match started {
        Ok(parts) => parts,
        Err(err) => {
            println!("{}", err);
            return Ok(());
        }
    };

    let mut stdout = std::io::stdout().lock();
    live_loop::run_loop(
        &mut camera,
        &mut detector,
        &mut annotator,
        sink.as_mut(),
        &args.loop_options(),
        &mut stdout,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_cli() {
        let args = Args::try_parse_from(["bvr_live"]).unwrap();
        let model = args.model_config().unwrap();
        assert_eq!(args.source, 0);
        assert_eq!(model.conf_threshold, 0.5);
        assert_eq!(model.image_size, 640);
        assert_eq!(model.weights_path, "yolov8n.onnx");
        assert_eq!(model.model_version, ModelVersion::YoloV8);
        assert_eq!(model.inference_device, InferenceDevice::CPU);
        assert_eq!(args.capture_config().resolution, None);
    }

    #[test]
    fn unknown_device_is_rejected() {
        let args = Args::try_parse_from(["bvr_live", "--device", "tpu"]).unwrap();
        assert!(args.model_config().is_err());
    }

    #[test]
    fn capture_resolution_needs_both_sides() {
        assert!(Args::try_parse_from(["bvr_live", "--width", "1280"]).is_err());
        let args = Args::try_parse_from(["bvr_live", "--width", "1280", "--height", "720"]).unwrap();
        assert_eq!(args.capture_config().resolution, Some((1280, 720)));
    }
}
