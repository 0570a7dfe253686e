pub mod loopback;
#[cfg(target_os = "linux")]
mod v4l2;

pub use loopback::{LoopbackOutput, PixFormat};
