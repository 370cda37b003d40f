//! Display sinks: the window the annotated stream is shown in, or nothing at all.

use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use crate::common::BvrImage;

pub trait DisplaySink {
    fn display(&mut self, frame: &BvrImage) -> Result<()>;

    /// True once the user asked to quit.
    fn poll_quit_key(&mut self) -> bool;

    fn is_open(&self) -> bool;

    fn close(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub title: String,
    pub width: usize,
    pub height: usize,
    pub headless: bool,
}

impl DisplayConfig {
    pub fn new(model_name: &str, width: usize, height: usize, headless: bool) -> Self {
        Self {
            title: window_title(model_name),
            width,
            height,
            headless,
        }
    }

    pub fn open(&self) -> Result<Box<dyn DisplaySink>> {
        if self.headless {
            log::info!("Running headless, frames are not shown");
            return Ok(Box::new(NullDisplay::default()));
        }
        Ok(Box::new(MinifbWindow::open(&self.title, self.width, self.height)?))
    }
}

pub fn window_title(model_name: &str) -> String {
    format!("Real-time detection - {} (q to quit)", model_name)
}

pub struct MinifbWindow {
    window: Option<Window>,
    buffer: Vec<u32>,
}

impl MinifbWindow {
    pub fn open(title: &str, width: usize, height: usize) -> Result<Self> {
        let options = WindowOptions {
            resize: true,
            ..WindowOptions::default()
        };
        let window = Window::new(title, width.max(1), height.max(1), options)
            .map_err(|e| anyhow::anyhow!("Could not create window '{}': {}", title, e))?;
        Ok(Self {
            window: Some(window),
            buffer: Vec::new(),
        })
    }
}

impl DisplaySink for MinifbWindow {
    fn display(&mut self, frame: &BvrImage) -> Result<()> {
        let Some(window) = self.window.as_mut() else {
            anyhow::bail!("Window is closed");
        };
        self.buffer = frame.to_u32s();
        let (width, height) = frame.dimensions();
        window
            .update_with_buffer(&self.buffer, width as usize, height as usize)
            .map_err(|e| anyhow::anyhow!("Failed to update window: {}", e))
    }

    fn poll_quit_key(&mut self) -> bool {
        match &self.window {
            Some(window) => window.is_key_pressed(Key::Q, KeyRepeat::No) || window.is_key_down(Key::Escape),
            None => true,
        }
    }

    fn is_open(&self) -> bool {
        self.window.as_ref().is_some_and(|w| w.is_open())
    }

    fn close(&mut self) {
        self.window = None;
    }
}

/// Sink for `--headless` runs: accepts every frame, never asks to quit.
#[derive(Debug, Default)]
pub struct NullDisplay {
    frames: u64,
}

impl NullDisplay {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl DisplaySink for NullDisplay {
    fn display(&mut self, _frame: &BvrImage) -> Result<()> {
        self.frames += 1;
        Ok(())
    }

    fn poll_quit_key(&mut self) -> bool {
        false
    }

    fn is_open(&self) -> bool {
        true
    }
}
