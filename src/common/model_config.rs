use crate::common::inference_device::InferenceDevice;
use crate::common::model_version::ModelVersion;

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub weights_path: String,
    pub ort_lib_path: Option<String>,
    pub labels_path: Option<String>,
    pub inference_device: InferenceDevice,
    pub model_version: ModelVersion,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub max_det: usize,
    pub image_size: u32,
    pub profile: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: "yolov8n.onnx".to_string(),
            ort_lib_path: None,
            labels_path: None,
            inference_device: InferenceDevice::CPU,
            model_version: ModelVersion::YoloV8,
            conf_threshold: 0.5,
            iou_threshold: 0.7,
            max_det: 300,
            image_size: 640,
            profile: false,
        }
    }
}

impl ModelConfig {
    pub fn summary(&self) -> String {
        format!("Weights File Path: {}\n\
        Labels Path: {}\n\
        OnnxRuntime Lib Path: {}\n\
        Inference Device: {}\n\
        Model Version: {}\n\
        Model Input Size: {}\n\
        Detection Threshold: {}\n\
        IoU Threshold: {} | Max Detections: {}",
                self.weights_path,
                self.labels_path.as_deref().unwrap_or("<model metadata>"),
                self.ort_lib_path.as_deref().unwrap_or("<ORT_DYLIB_PATH / system>"),
                self.inference_device, self.model_version.name(),
                self.image_size, self.conf_threshold,
                self.iou_threshold, self.max_det)
    }
}
