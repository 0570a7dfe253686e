pub mod boundary;
pub mod dispatch;
pub mod pipeline;
pub mod policy;
pub mod region;
pub mod smooth;
pub mod zone;

pub use boundary::Boundary;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use pipeline::{FrameReport, Tracker};
pub use policy::{MotionPolicy, SpeedRange};
pub use region::{extract_regions, Region, DEFAULT_CONFIDENCE, TRACKING_CONFIDENCE};
pub use smooth::HeightSmoother;
pub use zone::TargetZone;
