//! Frame sources. The live loop only sees [`FrameSource`]; [`NokhwaCamera`]
//! is the webcam implementation.

use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use crate::common::BvrImage;

const REQUESTED_FRAME_RATE: u32 = 30;

pub trait FrameSource {
    /// Blocks until the next frame. `Ok(None)` means the stream has ended.
    fn capture_frame(&mut self) -> Result<Option<BvrImage>>;

    /// Releases the device. Called once when the loop tears down.
    fn close(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureConfig {
    pub index: u32,
    /// Requested `(width, height)`; the driver picks the closest mode it has.
    pub resolution: Option<(u32, u32)>,
}

pub struct NokhwaCamera {
    camera: Camera,
    index: u32,
    streaming: bool,
}

impl NokhwaCamera {
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let format_type = match config.resolution {
            Some((width, height)) => RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(width, height),
                FrameFormat::MJPEG,
                REQUESTED_FRAME_RATE,
            )),
            None => RequestedFormatType::AbsoluteHighestFrameRate,
        };
        let requested = RequestedFormat::new::<RgbFormat>(format_type);

        let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
            .with_context(|| format!("Could not open camera with index {}", config.index))?;
        camera
            .open_stream()
            .with_context(|| format!("Could not start streaming from camera {}", config.index))?;

        let format = camera.camera_format();
        log::info!(
            "Camera {} ({}) streaming {}x{} @ {} fps",
            config.index,
            camera.info().human_name(),
            format.width(),
            format.height(),
            format.frame_rate()
        );

        Ok(Self {
            camera,
            index: config.index,
            streaming: true,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FrameSource for NokhwaCamera {
    fn capture_frame(&mut self) -> Result<Option<BvrImage>> {
        if !self.streaming {
            return Ok(None);
        }
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                log::warn!("Could not read a frame from camera {}: {}", self.index, err);
                return Ok(None);
            }
        };
        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("Could not decode a frame from camera {}: {}", self.index, err);
                return Ok(None);
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        let image = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| anyhow::anyhow!("Camera frame buffer does not match {}x{}", width, height))?;
        Ok(Some(BvrImage::new(image)))
    }

    fn close(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        if let Err(err) = self.camera.stop_stream() {
            log::warn!("Failed to stop camera {}: {}", self.index, err);
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.close();
    }
}
