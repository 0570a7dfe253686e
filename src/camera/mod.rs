#[cfg(feature = "desktop")]
pub mod capture;

#[cfg(feature = "desktop")]
pub use capture::{OpenCvSource, WORKING_HEIGHT, WORKING_WIDTH};

use anyhow::Result;

/// 映像の入力元
pub trait FrameSource {
    type Frame;

    /// 1フレーム読む。Noneは一時的な失敗（呼び出し側で少し待って再試行する）
    fn read_frame(&mut self) -> Option<Self::Frame>;

    /// ソースが尽きていなければtrue
    fn is_available(&self) -> bool;

    fn release(&mut self) -> Result<()>;
}
