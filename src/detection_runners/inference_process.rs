use std::time::Instant;
use crate::common::{BvrDetection, ImageTransformInfo};
use crate::data::{ConfigOrt, X};
use crate::utils;

pub trait InferenceProcess: Sized {
    type Input;

    /// Creates a new instance of the model with the given options.
    fn new(options: ConfigOrt) -> anyhow::Result<Self>;

    /// Pre-process the input frames into one model input.
    fn preprocess(&mut self, xs: &[Self::Input], image_size: u32) -> anyhow::Result<(X, Vec<ImageTransformInfo>)>;

    /// Executes the model on the preprocessed data.
    fn inference(&mut self, x: X) -> anyhow::Result<Vec<X>>;

    /// Post-process the model's outputs into detections, one list per input frame.
    fn postprocess(&self, ys: &[X], infos: &[ImageTransformInfo], conf_threshold: f32) -> anyhow::Result<Vec<Vec<BvrDetection>>>;

    /// Executes the full pipeline.
    fn run(&mut self, xs: &[Self::Input], image_size: u32, conf_threshold: f32) -> anyhow::Result<Vec<Vec<BvrDetection>>> {
        let (x, infos) = self.preprocess(xs, image_size)?;
        let ys = self.inference(x)?;
        self.postprocess(&ys, &infos, conf_threshold)
    }

    /// Executes the full pipeline, tracing the time spent in each stage.
    fn forward(&mut self, xs: &[Self::Input], image_size: u32, conf_threshold: f32, profile: bool) -> anyhow::Result<Vec<Vec<BvrDetection>>> {
        let detect_time = Instant::now();
        let mut _detect_elapsed = detect_time.elapsed();

        let (x, infos) = self.preprocess(xs, image_size)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Preprocessing input", detect_time, _detect_elapsed);

        let ys = self.inference(x)?;
        _detect_elapsed = utils::trace(profile, "TIME", "Detection run", detect_time, _detect_elapsed);

        let detections = self.postprocess(&ys, &infos, conf_threshold)?;
        utils::trace(profile, "TIME", "Postprocessing", detect_time, _detect_elapsed);

        Ok(detections)
    }
}
