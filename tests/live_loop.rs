use std::cell::Cell;
use std::collections::VecDeque;

use anyhow::Result;
use bvr_live::annotation::{colour_for_name, Annotator};
use bvr_live::capture::FrameSource;
use bvr_live::common::{BvrDetection, BvrImage};
use bvr_live::detection_runners::FrameDetector;
use bvr_live::display::DisplaySink;
use bvr_live::live_loop::{self, LoopExit, LoopOptions, StartupError};

struct ScriptedSource {
    frames: VecDeque<BvrImage>,
    reads: usize,
    closed: bool,
}

impl ScriptedSource {
    fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n).map(|_| BvrImage::filled(160, 120, [0, 0, 0])).collect(),
            reads: 0,
            closed: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn capture_frame(&mut self) -> Result<Option<BvrImage>> {
        self.reads += 1;
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[derive(Default)]
struct StubDetector {
    detections: Vec<BvrDetection>,
    calls: usize,
    fail_on_call: Option<usize>,
    seen_conf: Option<f32>,
}

impl FrameDetector for StubDetector {
    fn detect(&mut self, _frame: &BvrImage, conf_threshold: f32, _image_size: u32) -> Result<Vec<BvrDetection>> {
        self.calls += 1;
        self.seen_conf = Some(conf_threshold);
        if self.fail_on_call == Some(self.calls) {
            anyhow::bail!("session run failed");
        }
        Ok(self.detections.clone())
    }
}

struct RecordingDisplay {
    shown: usize,
    quit_after: Option<usize>,
    open: bool,
    closed: bool,
    last: Option<BvrImage>,
}

impl RecordingDisplay {
    fn new() -> Self {
        Self {
            shown: 0,
            quit_after: None,
            open: true,
            closed: false,
            last: None,
        }
    }
}

impl DisplaySink for RecordingDisplay {
    fn display(&mut self, frame: &BvrImage) -> Result<()> {
        self.shown += 1;
        self.last = Some(frame.clone());
        Ok(())
    }

    fn poll_quit_key(&mut self) -> bool {
        self.quit_after.is_some_and(|n| self.shown >= n)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn run(
    source: &mut ScriptedSource,
    detector: &mut StubDetector,
    sink: &mut RecordingDisplay,
    options: &LoopOptions,
) -> (Result<LoopExit>, Vec<u8>) {
    let mut annotator = Annotator::new().unwrap();
    let mut out = Vec::new();
    let exit = live_loop::run_loop(source, detector, &mut annotator, sink, options, &mut out);
    (exit, out)
}

fn person() -> BvrDetection {
    BvrDetection::default()
        .with_x1y1_x2y2(60., 40., 120., 100.)
        .with_label("person")
        .with_confidence(0.83)
}

#[test]
fn read_failure_ends_the_stream() {
    let mut source = ScriptedSource::with_frames(3);
    let mut detector = StubDetector::default();
    let mut sink = RecordingDisplay::new();

    let (exit, _) = run(&mut source, &mut detector, &mut sink, &LoopOptions::default());
    assert_eq!(exit.unwrap(), LoopExit::EndOfStream);
    assert_eq!(sink.shown, 3);
    assert_eq!(detector.calls, 3);
    assert!(source.closed);
    assert!(sink.closed);
}

#[test]
fn quit_key_stops_after_the_frame_is_shown() {
    let mut source = ScriptedSource::with_frames(10);
    let mut detector = StubDetector {
        detections: vec![person()],
        ..Default::default()
    };
    let mut sink = RecordingDisplay::new();
    sink.quit_after = Some(2);

    let options = LoopOptions {
        conf_threshold: 0.25,
        ..Default::default()
    };
    let (exit, _) = run(&mut source, &mut detector, &mut sink, &options);
    assert_eq!(exit.unwrap(), LoopExit::QuitKey);
    assert_eq!(sink.shown, 2);
    assert_eq!(detector.seen_conf, Some(0.25));
    assert!(source.closed);

    // the shown frame carries the annotation
    let last = sink.last.unwrap();
    assert_eq!(last.get_pixel(60, 70), &colour_for_name("person"));
}

#[test]
fn frame_limit_bounds_headless_runs() {
    let mut source = ScriptedSource::with_frames(10);
    let mut detector = StubDetector::default();
    let mut sink = RecordingDisplay::new();

    let options = LoopOptions {
        max_frames: Some(4),
        ..Default::default()
    };
    let (exit, _) = run(&mut source, &mut detector, &mut sink, &options);
    assert_eq!(exit.unwrap(), LoopExit::FrameLimit);
    assert_eq!(sink.shown, 4);
    assert_eq!(source.reads, 4);
}

#[test]
fn closed_window_stops_before_reading() {
    let mut source = ScriptedSource::with_frames(2);
    let mut detector = StubDetector::default();
    let mut sink = RecordingDisplay::new();
    sink.open = false;

    let (exit, _) = run(&mut source, &mut detector, &mut sink, &LoopOptions::default());
    assert_eq!(exit.unwrap(), LoopExit::WindowClosed);
    assert_eq!(source.reads, 0);
    assert!(source.closed);
}

#[test]
fn inference_errors_propagate_after_teardown() {
    let mut source = ScriptedSource::with_frames(5);
    let mut detector = StubDetector {
        fail_on_call: Some(2),
        ..Default::default()
    };
    let mut sink = RecordingDisplay::new();

    let (exit, _) = run(&mut source, &mut detector, &mut sink, &LoopOptions::default());
    let err = exit.unwrap_err();
    assert!(err.to_string().contains("session run failed"));
    assert_eq!(sink.shown, 1);
    assert!(source.closed);
    assert!(sink.closed);
}

#[test]
fn json_lines_report_detections_and_counts() {
    let mut source = ScriptedSource::with_frames(2);
    let mut detector = StubDetector {
        detections: vec![person(), person()],
        ..Default::default()
    };
    let mut sink = RecordingDisplay::new();

    let options = LoopOptions {
        json: true,
        ..Default::default()
    };
    let (exit, out) = run(&mut source, &mut detector, &mut sink, &options);
    assert_eq!(exit.unwrap(), LoopExit::EndOfStream);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["frame"], 1);
    assert_eq!(lines[0]["detections"][0]["label"], "person");
    assert_eq!(lines[0]["class_counts"]["person"], 2);
    assert!(lines[1]["fps"].as_f64().unwrap() >= 0.0);
}

#[test]
fn camera_open_failure_never_reaches_the_display() {
    let display_opened = Cell::new(false);
    let started = live_loop::start(
        || Ok(StubDetector::default()),
        || -> Result<ScriptedSource> { anyhow::bail!("Could not open camera with index 3") },
        || {
            display_opened.set(true);
            Ok(RecordingDisplay::new())
        },
    );

    match started {
        Err(StartupError::CameraOpen(err)) => {
            assert!(format!("{:#}", err).contains("index 3"));
        }
        Err(other) => panic!("unexpected startup error: {}", other),
        Ok(_) => panic!("startup should have failed"),
    }
    assert!(!display_opened.get());
}

#[test]
fn model_load_failure_is_reported_first() {
    let camera_opened = Cell::new(false);
    let started = live_loop::start(
        || -> Result<StubDetector> { anyhow::bail!("weights not found") },
        || {
            camera_opened.set(true);
            Ok(ScriptedSource::with_frames(1))
        },
        || Ok(RecordingDisplay::new()),
    );

    let err = match started {
        Err(err) => err,
        Ok(_) => panic!("startup should have failed"),
    };
    assert!(matches!(err, StartupError::ModelLoad(_)));
    let message = err.to_string();
    assert!(message.starts_with("Error loading the model."));
    assert!(message.contains("weights not found"));
    assert!(!camera_opened.get());
}
