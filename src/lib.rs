pub mod camera;
pub mod config;
pub mod control;
pub mod motion;
pub mod pose;
pub mod shutdown;
pub mod tracker;
pub mod visca;

#[cfg(feature = "desktop")]
pub mod output;
#[cfg(feature = "desktop")]
pub mod render;
