mod config_ort;
mod filesystem_access;
mod smoothed_fps;
mod time_calc;
pub mod weights;

pub use config_ort::ConfigOrt;
pub use filesystem_access::FsAccess;
pub use smoothed_fps::{SmoothedFps, FPS_DECAY, MIN_ELAPSED_SECS};
pub use time_calc::TimeCalc;

pub use crate::detection_runners::ort_detector::input_wrapper::X;

pub(crate) const CROSS_MARK: &str = "❌";
