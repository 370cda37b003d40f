//! YOLO export generations and the shape of their raw output tensors.

use ndarray::{ArrayView2, Axis};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ModelVersion {
    YoloV5,
    YoloV6,
    YoloV7,
    #[default] YoloV8,
    YoloV9,
    YoloV10,
    YoloV11,
    YoloV12,
}

impl ModelVersion {
    pub fn name(&self) -> &'static str {
        match self {
            Self::YoloV5 => "YoloV5",
            Self::YoloV6 => "YoloV6",
            Self::YoloV7 => "YoloV7",
            Self::YoloV8 => "YoloV8",
            Self::YoloV9 => "YoloV9",
            Self::YoloV10 => "YoloV10",
            Self::YoloV11 => "YoloV11",
            Self::YoloV12 => "YoloV12",
        }
    }

    /// Accepts `yolov8`, `v8` or `8`, case-insensitively.
    pub fn parse(version: &str) -> Option<ModelVersion> {
        let lowered = version.to_lowercase();
        let digits = lowered.trim_start_matches("yolo").trim_start_matches('v');
        match digits {
            "5" => Some(ModelVersion::YoloV5),
            "6" => Some(ModelVersion::YoloV6),
            "7" => Some(ModelVersion::YoloV7),
            "8" => Some(ModelVersion::YoloV8),
            "9" => Some(ModelVersion::YoloV9),
            "10" => Some(ModelVersion::YoloV10),
            "11" => Some(ModelVersion::YoloV11),
            "12" => Some(ModelVersion::YoloV12),
            _ => None,
        }
    }

    pub fn layout(&self) -> OutputLayout {
        match self {
            Self::YoloV5 | Self::YoloV6 | Self::YoloV7 => OutputLayout::anchors_cxcywh_obj_clss(),
            Self::YoloV8 | Self::YoloV9 | Self::YoloV11 | Self::YoloV12 => OutputLayout::cxcywh_clss_anchors(),
            Self::YoloV10 => OutputLayout::anchors_xyxy_conf_cls(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxFormat {
    Cxcywh,
    Xyxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFormat {
    /// One score per class.
    Clss,
    /// Objectness followed by one score per class.
    ObjClss,
    /// A single confidence followed by the class id.
    ConfCls,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub bbox: BoxFormat,
    pub scores: ScoreFormat,
    pub anchors_first: bool,
    pub apply_nms: bool,
}

/// Column views over one image's predictions, one row per anchor.
pub struct PredSlices<'a> {
    pub bboxes: ArrayView2<'a, f32>,
    pub clss: ArrayView2<'a, f32>,
    pub ids: Option<ArrayView2<'a, f32>>,
    pub objs: Option<ArrayView2<'a, f32>>,
}

impl<'a> PredSlices<'a> {
    pub fn num_anchors(&self) -> usize {
        self.bboxes.nrows()
    }

    /// Best class and its confidence for anchor `i`.
    pub fn best_class(&self, i: usize) -> Option<(usize, f32)> {
        if let Some(ids) = &self.ids {
            return Some((ids[[i, 0]].max(0.) as usize, self.clss[[i, 0]]));
        }
        let (class_id, &score) = self
            .clss
            .row(i)
            .into_iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        match &self.objs {
            Some(objs) => Some((class_id, score * objs[[i, 0]])),
            None => Some((class_id, score)),
        }
    }
}

impl OutputLayout {
    /// YOLOv5 | YOLOv6 | YOLOv7: `[N, A, 4 + 1 + nc]`
    pub fn anchors_cxcywh_obj_clss() -> Self {
        Self {
            bbox: BoxFormat::Cxcywh,
            scores: ScoreFormat::ObjClss,
            anchors_first: true,
            apply_nms: true,
        }
    }

    /// YOLOv8 | YOLOv9 | YOLO11 | YOLO12: `[N, 4 + nc, A]`
    pub fn cxcywh_clss_anchors() -> Self {
        Self {
            bbox: BoxFormat::Cxcywh,
            scores: ScoreFormat::Clss,
            anchors_first: false,
            apply_nms: true,
        }
    }

    /// YOLOv10: `[N, A, 6]`, already suppressed end-to-end.
    pub fn anchors_xyxy_conf_cls() -> Self {
        Self {
            bbox: BoxFormat::Xyxy,
            scores: ScoreFormat::ConfCls,
            anchors_first: true,
            apply_nms: false,
        }
    }

    /// Number of class scores a single anchor row carries, used to infer `nc`
    /// when the model does not name its classes.
    pub fn classes_in_row(&self, row_len: usize) -> usize {
        match self.scores {
            ScoreFormat::Clss => row_len.saturating_sub(4),
            ScoreFormat::ObjClss => row_len.saturating_sub(5),
            ScoreFormat::ConfCls => 0,
        }
    }

    /// Splits one image's `[rows, cols]` prediction block into per-task columns.
    pub fn parse_preds<'a>(&self, x: ArrayView2<'a, f32>, nc: usize) -> anyhow::Result<PredSlices<'a>> {
        let x = if self.anchors_first { x } else { x.reversed_axes() };

        let needed = match self.scores {
            ScoreFormat::Clss => 4 + nc,
            ScoreFormat::ObjClss => 5 + nc,
            ScoreFormat::ConfCls => 6,
        };
        if x.ncols() < needed {
            anyhow::bail!(
                "Prediction rows have {} values but the {:?} layout needs {} for {} classes",
                x.ncols(), self.scores, needed, nc
            );
        }

        let (bboxes, rest) = x.split_at(Axis(1), 4);
        let slices = match self.scores {
            ScoreFormat::Clss => {
                let (clss, _) = rest.split_at(Axis(1), nc);
                PredSlices { bboxes, clss, ids: None, objs: None }
            }
            ScoreFormat::ObjClss => {
                let (objs, rest) = rest.split_at(Axis(1), 1);
                let (clss, _) = rest.split_at(Axis(1), nc);
                PredSlices { bboxes, clss, ids: None, objs: Some(objs) }
            }
            ScoreFormat::ConfCls => {
                let (confs, rest) = rest.split_at(Axis(1), 1);
                let (ids, _) = rest.split_at(Axis(1), 1);
                PredSlices { bboxes, clss: confs, ids: Some(ids), objs: None }
            }
        };
        Ok(slices)
    }
}
