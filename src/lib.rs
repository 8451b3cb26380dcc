// Core modules
pub mod camera;
pub mod common;
pub mod core;
pub mod service;

// Re-export commonly used types
pub use camera::{Frame, FrameSource, V4l2Camera};
pub use common::{AttendanceError, Config, DevMode, Result};
pub use core::{
    AttendanceEvent, AttendanceOrchestrator, CheckKind, CheckKindPolicy, CooldownTracker,
    DetectionReport, FaceQualityDetector, FrameSampler, StatusSnapshot, UiState,
};
pub use service::{HttpVerificationClient, VerificationClient, VerificationResult};
