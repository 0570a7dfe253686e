pub mod annotate;
pub mod window;

pub use annotate::{annotate, SKELETON_CONNECTIONS};
pub use window::PreviewWindow;
