use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoCaptureTrait},
};

use super::FrameSource;
use crate::config::{SourceConfig, SourceKind};

/// 処理・出力で使う作業解像度
pub const WORKING_WIDTH: i32 = 1280;
pub const WORKING_HEIGHT: i32 = 720;

/// OpenCVのキャプチャデバイスまたはネットワークストリーム
pub struct OpenCvSource {
    capture: VideoCapture,
    description: String,
}

impl OpenCvSource {
    pub fn open(config: &SourceConfig) -> Result<Self> {
        match config.kind {
            SourceKind::Device => Self::open_device(config.device),
            SourceKind::Stream => {
                let url = config
                    .url
                    .as_deref()
                    .context("source.url is required for a stream source")?;
                Self::open_stream(url)
            }
        }
    }

    pub fn open_device(index: i32) -> Result<Self> {
        let mut capture = VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open capture device {}", index))?;

        if !capture.is_opened()? {
            anyhow::bail!("Capture device {} is not available", index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, WORKING_WIDTH as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, WORKING_HEIGHT as f64)?;
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let description = format!("device {}", index);
        Self::log_opened(&capture, &description)?;
        Ok(Self { capture, description })
    }

    pub fn open_stream(url: &str) -> Result<Self> {
        let capture = VideoCapture::from_file(url, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open stream {}", url))?;

        if !capture.is_opened()? {
            anyhow::bail!("Stream {} is not available", url);
        }

        let description = format!("stream {}", url);
        Self::log_opened(&capture, &description)?;
        Ok(Self { capture, description })
    }

    fn log_opened(capture: &VideoCapture, description: &str) -> Result<()> {
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)?;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)?;
        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        tracing::info!("Opened {} ({}x{} @ {} fps)", description, width, height, fps);
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl FrameSource for OpenCvSource {
    type Frame = Mat;

    fn read_frame(&mut self) -> Option<Mat> {
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => match fit_to_working_size(frame) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!("Failed to resize frame: {:#}", e);
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Failed to read from {}: {}", self.description, e);
                None
            }
        }
    }

    fn is_available(&self) -> bool {
        self.capture.is_opened().unwrap_or(false)
    }

    fn release(&mut self) -> Result<()> {
        self.capture
            .release()
            .with_context(|| format!("Failed to release {}", self.description))?;
        Ok(())
    }
}

/// 幅・高さのどちらかが作業解像度と異なれば 1280x720 に引き伸ばす
pub fn fit_to_working_size(frame: Mat) -> Result<Mat> {
    if frame.cols() == WORKING_WIDTH && frame.rows() == WORKING_HEIGHT {
        return Ok(frame);
    }

    let mut resized = Mat::default();
    imgproc::resize(
        &frame,
        &mut resized,
        Size::new(WORKING_WIDTH, WORKING_HEIGHT),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .context("Failed to resize frame")?;
    Ok(resized)
}
