use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Camera access denied by the OS. Terminal until the user retries.
    #[error("Camera permission denied: {0}")]
    CameraPermissionDenied(String),

    /// Camera missing, busy, or unusable. Terminal until the user retries.
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Frame not ready or invalid dimensions. Transient, skip the tick.
    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    /// Network/timeout/5xx while talking to the verification service.
    #[error("Verification transport error: {0}")]
    Transport(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl AttendanceError {
    /// Camera acquisition failures are the only errors fatal to the loop.
    pub fn is_camera_fatal(&self) -> bool {
        matches!(
            self,
            AttendanceError::CameraPermissionDenied(_) | AttendanceError::CameraUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
