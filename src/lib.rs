mod utils;
pub mod annotation;
pub mod capture;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod display;
pub mod live_loop;

use std::path::Path;
use crate::common::ModelConfig;
use crate::data::{weights, ConfigOrt};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::detection_runners::OrtYOLO;

/// Finds (or fetches) the weights and builds a warmed-up ONNX Runtime detector.
pub fn init_detector(model_details: &ModelConfig, model_url: Option<&str>) -> anyhow::Result<OrtYOLO> {
    let weights_path = weights::resolve_weights(&model_details.weights_path, model_url)?;
    let ort_options = ConfigOrt::from_model_config(model_details)?
        .with_model(&weights_path.to_string_lossy());

    log::info!("Initializing ORT session with ({}) execution provider", model_details.inference_device);
    OrtYOLO::new(ort_options)
}

/// Short model name for titles and logs: the weights file stem.
pub fn model_name(weights_path: &str) -> String {
    Path::new(weights_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| weights_path.to_string())
}
