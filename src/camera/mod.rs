pub mod v4l2;

use crate::common::Result;
use image::DynamicImage;

pub use v4l2::V4l2Camera;

/// One still frame pulled from the camera.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
}

impl Frame {
    pub fn new(image: DynamicImage) -> Self {
        Frame { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode the frame as JPEG for upload to the verification service.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(&self.image)?;
        Ok(buf)
    }
}

/// Seam over the physical camera so the capture loop can run against
/// hardware or a scripted source in tests.
///
/// `acquire`/`release` bracket exclusive ownership of the device handle.
/// `release` is idempotent and safe to call before `acquire`.
pub trait FrameSource {
    fn acquire(&mut self) -> Result<()>;
    fn release(&mut self);
    fn is_ready(&self) -> bool;
    /// Grab one frame. Only valid while ready; failures are transient.
    fn grab_frame(&mut self) -> Result<Frame>;
}
