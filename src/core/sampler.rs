use crate::camera::{Frame, FrameSource};
use tracing::debug;

/// Pulls one still frame per tick from an active camera session.
///
/// Returns `None` (a no-op tick) when the session is not ready or the frame
/// dimensions are below the minimum viable size, which guards the startup
/// race where the stream exists before it has negotiated real dimensions.
/// Never suspends: frame capture stays synchronous so it cannot overlap
/// with the verification call.
pub struct FrameSampler {
    min_dim: u32,
}

impl FrameSampler {
    pub fn new(min_dim: u32) -> Self {
        FrameSampler { min_dim }
    }

    pub fn sample<C: FrameSource>(&self, camera: &mut C) -> Option<Frame> {
        if !camera.is_ready() {
            return None;
        }

        match camera.grab_frame() {
            Ok(frame) if frame.width() >= self.min_dim && frame.height() >= self.min_dim => {
                Some(frame)
            }
            Ok(frame) => {
                debug!(
                    width = frame.width(),
                    height = frame.height(),
                    "frame below minimum viable size, skipping tick"
                );
                None
            }
            Err(e) => {
                debug!("frame capture skipped: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AttendanceError, Result};
    use image::{DynamicImage, ImageBuffer, Luma};

    struct FixedCamera {
        ready: bool,
        frame: Option<Frame>,
    }

    impl FrameSource for FixedCamera {
        fn acquire(&mut self) -> Result<()> {
            self.ready = true;
            Ok(())
        }

        fn release(&mut self) {
            self.ready = false;
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn grab_frame(&mut self) -> Result<Frame> {
            self.frame
                .clone()
                .ok_or_else(|| AttendanceError::FrameCapture("no frame".to_string()))
        }
    }

    fn frame(width: u32, height: u32) -> Frame {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Luma([128u8]));
        Frame::new(DynamicImage::ImageLuma8(buffer))
    }

    #[test]
    fn returns_frame_from_ready_camera() {
        let sampler = FrameSampler::new(10);
        let mut camera = FixedCamera {
            ready: true,
            frame: Some(frame(320, 240)),
        };
        assert!(sampler.sample(&mut camera).is_some());
    }

    #[test]
    fn skips_when_not_ready() {
        let sampler = FrameSampler::new(10);
        let mut camera = FixedCamera {
            ready: false,
            frame: Some(frame(320, 240)),
        };
        assert!(sampler.sample(&mut camera).is_none());
    }

    #[test]
    fn skips_undersized_frames() {
        let sampler = FrameSampler::new(10);
        let mut camera = FixedCamera {
            ready: true,
            frame: Some(frame(8, 8)),
        };
        assert!(sampler.sample(&mut camera).is_none());
    }

    #[test]
    fn capture_error_is_a_silent_skip() {
        let sampler = FrameSampler::new(10);
        let mut camera = FixedCamera {
            ready: true,
            frame: None,
        };
        assert!(sampler.sample(&mut camera).is_none());
    }
}
