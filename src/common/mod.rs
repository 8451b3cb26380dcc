pub mod config;
pub mod dev_mode;
pub mod error;

pub use config::{CameraConfig, CaptureConfig, Config, DetectionConfig, ServiceConfig};
pub use dev_mode::DevMode;
pub use error::{AttendanceError, Result};
