pub mod cooldown;
pub mod detector;
pub mod gate;
pub mod orchestrator;
pub mod quality;
pub mod sampler;

pub use cooldown::CooldownTracker;
pub use detector::{DetectionReport, FaceQualityDetector};
pub use orchestrator::{
    AttendanceEvent, AttendanceOrchestrator, CheckKind, CheckKindPolicy, LastResult,
    StatusSnapshot, UiState,
};
pub use sampler::FrameSampler;
