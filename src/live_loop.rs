//! Start-up sequence and the capture, infer, annotate, display loop.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use crate::annotation::Annotator;
use crate::capture::FrameSource;
use crate::common::BvrDetection;
use crate::data::SmoothedFps;
use crate::detection_runners::FrameDetector;
use crate::display::DisplaySink;
use crate::utils;

/// Failures that stop the program before the first frame is read.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Error loading the model. Check the path or your internet connection.\n{0:#}")]
    ModelLoad(anyhow::Error),
    #[error("{0:#}")]
    CameraOpen(anyhow::Error),
    #[error("Could not open the display window.\n{0:#}")]
    Display(anyhow::Error),
}

/// Why the loop stopped. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    QuitKey,
    WindowClosed,
    EndOfStream,
    FrameLimit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopOptions {
    pub conf_threshold: f32,
    pub image_size: u32,
    pub max_frames: Option<u64>,
    pub json: bool,
    pub profile: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            image_size: 640,
            max_frames: None,
            json: false,
            profile: false,
        }
    }
}

/// One line of `--json` output.
#[derive(Debug, Serialize)]
struct FrameReport<'a> {
    frame: u64,
    fps: f64,
    detections: &'a [BvrDetection],
    class_counts: &'a BTreeMap<String, usize>,
}

/// Brings up the model, then the camera, then the display, stopping at the
/// first one that fails.
pub fn start<D, S, W>(
    load_model: impl FnOnce() -> Result<D>,
    open_camera: impl FnOnce() -> Result<S>,
    open_display: impl FnOnce() -> Result<W>,
) -> Result<(D, S, W), StartupError> {
    let detector = load_model().map_err(StartupError::ModelLoad)?;
    let source = open_camera().map_err(StartupError::CameraOpen)?;
    let sink = open_display().map_err(StartupError::Display)?;
    Ok((detector, source, sink))
}

/// Runs until the user quits, the window closes, the source runs dry or the
/// frame limit is hit. The source and sink are closed before returning, also
/// when a stage fails.
pub fn run_loop<S, D, W>(
    source: &mut S,
    detector: &mut D,
    annotator: &mut Annotator,
    sink: &mut W,
    options: &LoopOptions,
    out: &mut impl Write,
) -> Result<LoopExit>
where
    S: FrameSource + ?Sized,
    D: FrameDetector + ?Sized,
    W: DisplaySink + ?Sized,
{
    let result = run_frames(source, detector, annotator, sink, options, out);
    source.close();
    sink.close();
    match &result {
        Ok(exit) => log::info!("Stopped: {:?}", exit),
        Err(err) => log::error!("Stopped on error: {:#}", err),
    }
    result
}

fn run_frames<S, D, W>(
    source: &mut S,
    detector: &mut D,
    annotator: &mut Annotator,
    sink: &mut W,
    options: &LoopOptions,
    out: &mut impl Write,
) -> Result<LoopExit>
where
    S: FrameSource + ?Sized,
    D: FrameDetector + ?Sized,
    W: DisplaySink + ?Sized,
{
    let mut fps = SmoothedFps::new();
    let mut frame_count: u64 = 0;

    loop {
        if options.max_frames.is_some_and(|max| frame_count >= max) {
            return Ok(LoopExit::FrameLimit);
        }
        if !sink.is_open() {
            return Ok(LoopExit::WindowClosed);
        }

        let frame_time = Instant::now();
        let mut _frame_elapsed = frame_time.elapsed();

        let Some(mut frame) = source.capture_frame()? else {
            log::warn!("Could not read a frame from the camera.");
            return Ok(LoopExit::EndOfStream);
        };
        _frame_elapsed = utils::trace(options.profile, "FRAME", "Capture", frame_time, _frame_elapsed);

        let detections = detector.detect(&frame, options.conf_threshold, options.image_size)?;
        _frame_elapsed = utils::trace(options.profile, "FRAME", "Detect", frame_time, _frame_elapsed);

        let smoothed = fps.tick();
        let summary = annotator.annotate(&mut frame, &detections, smoothed);
        log::debug!("Frame {} | {} detections | {:?}", frame_count, detections.len(), summary.class_counts);

        if options.json {
            let report = FrameReport {
                frame: frame_count,
                fps: smoothed,
                detections: &detections,
                class_counts: &summary.class_counts,
            };
            serde_json::to_writer(&mut *out, &report)?;
            writeln!(out)?;
        }

        sink.display(&frame)?;
        utils::trace(options.profile, "FRAME", "Annotate and display", frame_time, _frame_elapsed);
        frame_count += 1;

        if sink.poll_quit_key() {
            return Ok(LoopExit::QuitKey);
        }
    }
}
