use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;

use crate::common::{BoxFormat, BvrBox, BvrDetection, BvrImage, ImageTransformInfo, ModelVersion, OutputLayout};
use crate::data::{ConfigOrt, X};
use crate::detection_runners::image_ops::{self, make_divisible};
use crate::detection_runners::inference_process::InferenceProcess;
use crate::detection_runners::nms::nms;
use crate::detection_runners::ort_detector::OrtEngine;
use crate::detection_runners::FrameDetector;

/// Model input sizes are rounded up to this stride.
const STRIDE: usize = 32;

#[derive(Debug)]
pub struct OrtYOLO {
    engine: OrtEngine,
    nc: usize,
    names: Vec<String>,
    layout: OutputLayout,
    version: ModelVersion,
    iou: f32,
    max_det: usize,
    profile: bool,
    warned_fixed_size: bool,
}

/// Postprocessing settings shared by every frame of a batch.
#[derive(Debug, Clone, Copy)]
pub struct DecodeParams {
    pub conf_threshold: f32,
    pub iou: f32,
    pub max_det: usize,
}

impl InferenceProcess for OrtYOLO {
    type Input = BvrImage;

    fn new(options: ConfigOrt) -> Result<Self> {
        let engine = OrtEngine::new(&options)?;
        let version = options.yolo_version;
        let layout = version.layout();

        // Class names: user-defined, else parsed from the model metadata
        let names_parsed = Self::fetch_names(&engine);
        let names = match (options.names, names_parsed) {
            (Some(names), Some(parsed)) => {
                if names.len() != parsed.len() {
                    log::warn!(
                        "Labels file has {} classes but the model names {}; using the labels file",
                        names.len(),
                        parsed.len()
                    );
                }
                names
            }
            (Some(names), None) => names,
            (None, Some(parsed)) => parsed,
            (None, None) => vec![],
        };

        let nc = resolve_nc(&names, engine.output_dims(), &layout)?;

        log::info!("YOLO Version: {} | Classes: {}", version.name(), nc);

        let mut yolo = Self {
            engine,
            nc,
            names,
            layout,
            version,
            iou: options.iou,
            max_det: options.max_det,
            profile: options.profile,
            warned_fixed_size: false,
        };

        let (h, w) = yolo.input_hw(options.image_size);
        let blank = BvrImage::filled(w, h, [image_ops::LETTERBOX_FILL; 3]);
        for _ in 0..options.num_dry_run {
            yolo.run(std::slice::from_ref(&blank), options.image_size, 1.0)?;
        }
        yolo.warned_fixed_size = false;

        Ok(yolo)
    }

    fn preprocess(&mut self, xs: &[Self::Input], image_size: u32) -> Result<(X, Vec<ImageTransformInfo>)> {
        let (h, w) = self.input_hw(image_size);
        image_ops::preprocess(xs, h, w)
    }

    fn inference(&mut self, x: X) -> Result<Vec<X>> {
        self.engine.run(x)
    }

    fn postprocess(&self, ys: &[X], infos: &[ImageTransformInfo], conf_threshold: f32) -> Result<Vec<Vec<BvrDetection>>> {
        let preds = ys
            .first()
            .ok_or_else(|| anyhow::anyhow!("The model produced no outputs"))?;
        let params = DecodeParams {
            conf_threshold,
            iou: self.iou,
            max_det: self.max_det,
        };
        decode_output(preds, infos, &self.layout, self.nc, &self.names, params)
    }
}

impl FrameDetector for OrtYOLO {
    fn detect(&mut self, frame: &BvrImage, conf_threshold: f32, image_size: u32) -> Result<Vec<BvrDetection>> {
        let profile = self.profile;
        let mut per_frame = self.forward(std::slice::from_ref(frame), image_size, conf_threshold, profile)?;
        Ok(per_frame.pop().unwrap_or_default())
    }
}

impl OrtYOLO {
    pub fn version(&self) -> ModelVersion {
        self.version
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn nc(&self) -> usize {
        self.nc
    }

    /// Model input `(height, width)` for the requested size. A model exported
    /// with a fixed input shape always uses that shape.
    fn input_hw(&mut self, image_size: u32) -> (u32, u32) {
        match self.engine.fixed_input_hw() {
            Some((h, w)) => {
                if !self.warned_fixed_size && (h != image_size || w != image_size) {
                    log::warn!(
                        "Model input is fixed at {}x{}; ignoring requested image size {}",
                        w, h, image_size
                    );
                    self.warned_fixed_size = true;
                }
                (h, w)
            }
            None => {
                let size = make_divisible(image_size.max(1) as usize, STRIDE) as u32;
                (size, size)
            }
        }
    }

    fn fetch_names(engine: &OrtEngine) -> Option<Vec<String>> {
        // String format: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ..., 27: "yellow_lady's_slipper"}`
        engine.try_fetch("names").and_then(|names| parse_names(&names))
    }
}

/// Number of classes: one per known name, otherwise read off the prediction
/// row length of a `[N, rows, cols]` output.
pub fn resolve_nc(names: &[String], output_dims: Option<&[i64]>, layout: &OutputLayout) -> Result<usize> {
    if !names.is_empty() {
        return Ok(names.len());
    }
    let row_len = match output_dims {
        Some(dims) if dims.len() == 3 => {
            if layout.anchors_first { dims[2] } else { dims[1] }
        }
        _ => -1,
    };
    if row_len <= 0 {
        anyhow::bail!(
            "Unable to obtain the number of classes. Pass a labels file or export the model with class names."
        );
    }
    Ok(layout.classes_in_row(row_len as usize))
}

/// Parses the `names` dictionary Ultralytics stores in the ONNX metadata.
pub fn parse_names(raw: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#).ok()?;
    let names: Vec<String> = re
        .captures_iter(raw)
        .map(|c| {
            let (_, [_, name, _]) = c.extract();
            name.to_string()
        })
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Turns a raw `[N, rows, cols]` prediction tensor into detections in
/// source-frame pixels, one list per frame.
pub fn decode_output(
    preds: &X,
    infos: &[ImageTransformInfo],
    layout: &OutputLayout,
    nc: usize,
    names: &[String],
    params: DecodeParams,
) -> Result<Vec<Vec<BvrDetection>>> {
    if preds.batch_size() != infos.len() {
        anyhow::bail!(
            "Model returned {} results for {} frames",
            preds.batch_size(),
            infos.len()
        );
    }

    let mut results = Vec::with_capacity(infos.len());
    for (idx, info) in infos.iter().enumerate() {
        let slices = layout.parse_preds(preds.batch_item(idx)?, nc)?;
        let (width, height) = (info.width_src as f32, info.height_src as f32);

        let mut detections: Vec<BvrDetection> = (0..slices.num_anchors())
            .into_par_iter()
            .filter_map(|i| {
                let (class_id, confidence) = slices.best_class(i)?;

                // filtering low scores, NaN included
                if !(confidence >= params.conf_threshold) {
                    return None;
                }

                let b = slices.bboxes.row(i);
                let bbox = match layout.bbox {
                    BoxFormat::Cxcywh => BvrBox::default().with_cxcy_wh(b[0], b[1], b[2], b[3]),
                    BoxFormat::Xyxy => BvrBox::new(b[0], b[1], b[2], b[3]),
                };
                let bbox = bbox.unscale(info.ratio).clip(width, height);

                let detection = BvrDetection::default()
                    .with_bbox(bbox)
                    .with_confidence(confidence)
                    .with_class_id(class_id);
                Some(match names.get(class_id) {
                    Some(name) => detection.with_label(name),
                    None => detection,
                })
            })
            .collect();

        if layout.apply_nms {
            nms(&mut detections, params.iou, false);
        } else {
            detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        }
        detections.truncate(params.max_det);
        results.push(detections);
    }
    Ok(results)
}
