#[cfg(feature = "desktop")]
pub mod detector;
pub mod keypoint;
pub mod source;

#[cfg(feature = "desktop")]
pub use detector::PoseDetector;
pub use keypoint::{Keypoint, KeypointIndex, Person};
pub use source::PoseSource;
