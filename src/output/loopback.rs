use anyhow::{Context, Result};
use opencv::core::{Mat, CV_8UC3};
use opencv::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::camera::{WORKING_HEIGHT, WORKING_WIDTH};

/// 1フレームのバイト数 (BGR24)
pub const FRAME_BYTES: usize = WORKING_WIDTH as usize * WORKING_HEIGHT as usize * 3;

/// V4L2 の fourcc
pub const fn fourcc(code: &[u8; 4]) -> u32 {
    (code[0] as u32) | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24
}

pub const V4L2_PIX_FMT_BGR24: u32 = fourcc(b"BGR3");

/// 出力デバイスに設定するピクセルフォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
}

impl PixFormat {
    /// パディングなしの BGR24
    pub fn bgr24(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixelformat: V4L2_PIX_FMT_BGR24,
            bytesperline: width * 3,
            sizeimage: width * height * 3,
        }
    }

    pub fn working() -> Self {
        Self::bgr24(WORKING_WIDTH as u32, WORKING_HEIGHT as u32)
    }
}

/// v4l2loopback デバイスへの生フレーム出力
///
/// 開く時に 1280x720 BGR24 を VIDIOC_S_FMT で設定し、以降は1フレームずつ書き込む。
pub struct LoopbackOutput {
    device: File,
    path: PathBuf,
}

impl LoopbackOutput {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = OpenOptions::new()
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open loopback device {}", path.display()))?;
        configure(&device, &path)?;
        tracing::info!("Writing annotated video to {}", path.display());
        Ok(Self::from_file(device, path))
    }

    /// フォーマット設定済みのデバイス（またはファイル）から作る
    pub fn from_file(device: File, path: PathBuf) -> Self {
        Self { device, path }
    }

    pub fn write_frame(&mut self, frame: &Mat) -> Result<()> {
        if frame.cols() != WORKING_WIDTH || frame.rows() != WORKING_HEIGHT || frame.typ() != CV_8UC3 {
            anyhow::bail!(
                "Unexpected frame {}x{} (type {}) for {}",
                frame.cols(),
                frame.rows(),
                frame.typ(),
                self.path.display()
            );
        }

        let continuous;
        let frame = if frame.is_continuous() {
            frame
        } else {
            continuous = frame.try_clone()?;
            &continuous
        };

        let bytes = frame.data_bytes()?;
        debug_assert_eq!(bytes.len(), FRAME_BYTES);
        self.device
            .write_all(bytes)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn configure(device: &File, path: &Path) -> Result<()> {
    let requested = PixFormat::working();
    let accepted = super::v4l2::set_output_format(device, &requested)
        .with_context(|| format!("Failed to set format on {}", path.display()))?;
    if accepted != requested {
        anyhow::bail!(
            "{} accepted {:?} instead of {:?}",
            path.display(),
            accepted,
            requested
        );
    }
    tracing::debug!("{} set to {:?}", path.display(), accepted);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn configure(_device: &File, path: &Path) -> Result<()> {
    anyhow::bail!("{}: video loopback output requires Linux", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;
    use std::fs;

    /// フォーマット設定を飛ばして通常ファイルに書く
    fn open_plain(path: &Path) -> LoopbackOutput {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        LoopbackOutput::from_file(file, path.to_path_buf())
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ptz_tracker_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_writes_raw_bgr_frames() {
        let path = temp_path("loopback.raw");
        fs::write(&path, b"").unwrap();

        let frame = Mat::new_rows_cols_with_default(
            WORKING_HEIGHT,
            WORKING_WIDTH,
            CV_8UC3,
            Scalar::new(1.0, 2.0, 3.0, 0.0),
        )
        .unwrap();
        {
            let mut output = open_plain(&path);
            output.write_frame(&frame).unwrap();
            output.write_frame(&frame).unwrap();
        }

        let written = fs::read(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(written.len(), FRAME_BYTES * 2);
        assert_eq!(&written[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let path = temp_path("loopback_small.raw");
        fs::write(&path, b"").unwrap();

        let frame =
            Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(0.0)).unwrap();
        let mut output = open_plain(&path);
        assert!(output.write_frame(&frame).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_working_format_fields() {
        let format = PixFormat::working();
        assert_eq!(format.width, 1280);
        assert_eq!(format.height, 720);
        assert_eq!(format.bytesperline, 1280 * 3);
        assert_eq!(format.sizeimage, 1280 * 720 * 3);
        assert_eq!(format.sizeimage as usize, FRAME_BYTES);
    }

    #[test]
    fn test_bgr24_fourcc() {
        assert_eq!(V4L2_PIX_FMT_BGR24, 0x3352_4742);
    }

    #[test]
    fn test_open_rejects_non_device() {
        let path = temp_path("not_a_device.raw");
        fs::write(&path, b"").unwrap();
        assert!(LoopbackOutput::open(&path).is_err());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_device_fails() {
        assert!(LoopbackOutput::open("/nonexistent/video99").is_err());
    }
}
