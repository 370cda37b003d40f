//! Options for building the ONNX Runtime detector.

use anyhow::Result;
use crate::common::{InferenceDevice, ModelConfig, ModelVersion};
use crate::utils;

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub onnx_path: String,
    pub ort_lib_path: Option<String>,
    pub device: InferenceDevice,
    pub image_size: u32,
    pub profile: bool,
    pub num_dry_run: usize,

    // trt related
    pub trt_engine_cache_enable: bool,
    pub trt_fp16_enable: bool,

    pub iou: f32,
    pub max_det: usize,
    pub names: Option<Vec<String>>,
    pub yolo_version: ModelVersion,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            ort_lib_path: None,
            device: InferenceDevice::CPU,
            image_size: 640,
            profile: false,
            num_dry_run: 1,

            trt_engine_cache_enable: true,
            trt_fp16_enable: false,

            iou: 0.7,
            max_det: 300,
            names: None,
            yolo_version: ModelVersion::YoloV8,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds the session options from the user-facing model configuration,
    /// reading the labels file when one was given.
    pub fn from_model_config(model: &ModelConfig) -> Result<Self> {
        let mut config = ConfigOrt::new()
            .with_model(&model.weights_path)
            .with_device(model.inference_device)
            .with_yolo_version(model.model_version)
            .with_image_size(model.image_size)
            .with_iou(model.iou_threshold)
            .with_max_det(model.max_det)
            .with_profile(model.profile);

        if let Some(lib) = &model.ort_lib_path {
            config = config.with_ort_lib_path(lib);
        }
        if let Some(labels) = &model.labels_path {
            let names = utils::file_to_vec(labels)
                .map_err(|e| anyhow::anyhow!("Failed to read labels file {}: {}", labels, e))?;
            config = config.with_names(names);
        }
        Ok(config)
    }

    pub fn with_model(mut self, onnx_path: &str) -> Self {
        self.onnx_path = onnx_path.to_string();
        self
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: &str) -> Self {
        self.ort_lib_path = Some(ort_lib_path.to_string());
        self
    }

    pub fn with_image_size(mut self, n: u32) -> Self {
        self.image_size = n;
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_yolo_version(mut self, x: ModelVersion) -> Self {
        self.yolo_version = x;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn with_iou(mut self, x: f32) -> Self {
        self.iou = x;
        self
    }

    pub fn with_max_det(mut self, x: usize) -> Self {
        self.max_det = x;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn labels_file_becomes_class_names() {
        let mut labels = tempfile::NamedTempFile::new().unwrap();
        writeln!(labels, "person\nbicycle\n\ncar").unwrap();

        let model = ModelConfig {
            labels_path: Some(labels.path().to_string_lossy().to_string()),
            iou_threshold: 0.45,
            ..Default::default()
        };
        let config = ConfigOrt::from_model_config(&model).unwrap();
        assert_eq!(config.names, Some(vec!["person".to_string(), "bicycle".to_string(), "car".to_string()]));
        assert_eq!(config.iou, 0.45);
        assert_eq!(config.onnx_path, "yolov8n.onnx");
    }

    #[test]
    fn missing_labels_file_is_an_error() {
        let model = ModelConfig {
            labels_path: Some("/definitely/not/here.txt".to_string()),
            ..Default::default()
        };
        assert!(ConfigOrt::from_model_config(&model).is_err());
    }
}
