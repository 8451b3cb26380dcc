use crate::camera::{Frame, FrameSource};
use crate::common::{AttendanceError, CameraConfig, Result};
use image::{DynamicImage, ImageBuffer, Luma};
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// V4L2-backed camera. Holds the device handle exclusively between
/// `acquire()` and `release()`.
pub struct V4l2Camera {
    config: CameraConfig,
    device: Option<Device>,
    format: Option<v4l::Format>,
}

impl V4l2Camera {
    pub fn new(config: CameraConfig) -> Self {
        V4l2Camera {
            config,
            device: None,
            format: None,
        }
    }

    /// List all /dev/video* devices with their capabilities.
    pub fn list_cameras() -> Result<Vec<(u32, String, Vec<String>)>> {
        let mut cameras = Vec::new();

        for entry in fs::read_dir("/dev")? {
            let entry = entry?;
            let path = entry.path();
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

            if let Some(index_str) = filename.strip_prefix("video") {
                if let Ok(index) = index_str.parse::<u32>() {
                    if let Ok(device) = Device::new(index as usize) {
                        if let Ok(caps) = device.query_caps() {
                            let mut features = Vec::new();

                            if caps
                                .capabilities
                                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                            {
                                features.push("VIDEO_CAPTURE".to_string());
                            }

                            for fmt in device.enum_formats().unwrap_or_default() {
                                let fourcc_str = fmt.fourcc.str().unwrap_or("UNKNOWN");
                                features.push(format!("Format: {}", fourcc_str));
                            }

                            cameras.push((index, caps.card.clone(), features));
                        }
                    }
                }
            }
        }

        cameras.sort_by_key(|c| c.0);
        Ok(cameras)
    }

    fn classify_open_error(index: u32, e: std::io::Error) -> AttendanceError {
        match e.kind() {
            ErrorKind::PermissionDenied => AttendanceError::CameraPermissionDenied(format!(
                "/dev/video{}: {}",
                index, e
            )),
            _ => AttendanceError::CameraUnavailable(format!(
                "Failed to open camera {}: {}",
                index, e
            )),
        }
    }

    fn decode(&self, data: &[u8], fmt: &v4l::Format) -> Result<Frame> {
        let fourcc = fmt.fourcc.str().unwrap_or("");
        let image = match fourcc {
            "GREY" => {
                let buffer = ImageBuffer::<Luma<u8>, _>::from_raw(
                    fmt.width,
                    fmt.height,
                    data.to_vec(),
                )
                .ok_or_else(|| {
                    AttendanceError::FrameCapture(
                        "Failed to build grayscale image buffer".to_string(),
                    )
                })?;
                DynamicImage::ImageLuma8(buffer)
            }
            "MJPG" => image::load_from_memory(data)
                .map_err(|e| AttendanceError::FrameCapture(format!("MJPG decode failed: {}", e)))?,
            other => {
                return Err(AttendanceError::FrameCapture(format!(
                    "Unsupported pixel format: {}",
                    other
                )))
            }
        };
        Ok(Frame::new(image))
    }
}

impl FrameSource for V4l2Camera {
    fn acquire(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let index = self.config.device_index;
        info!("Opening camera device {}...", index);

        let device =
            Device::new(index as usize).map_err(|e| Self::classify_open_error(index, e))?;

        let caps = device
            .query_caps()
            .map_err(|e| AttendanceError::CameraUnavailable(format!("Query caps failed: {}", e)))?;
        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(AttendanceError::CameraUnavailable(format!(
                "Device {} does not support video capture",
                index
            )));
        }

        let mut fmt = device
            .format()
            .map_err(|e| AttendanceError::CameraUnavailable(format!("Get format failed: {}", e)))?;

        fmt.width = self.config.width;
        fmt.height = self.config.height;
        // Keep GREY for IR sensors, otherwise ask for MJPG
        if fmt.fourcc.str().unwrap_or("") != "GREY" {
            fmt.fourcc = FourCC::new(b"MJPG");
        }

        if let Err(e) = device.set_format(&fmt) {
            warn!("Could not set exact format: {}. Using device defaults.", e);
        }

        let final_fmt = device
            .format()
            .map_err(|e| AttendanceError::CameraUnavailable(format!("Get format failed: {}", e)))?;
        info!(
            "Camera ready: {}x{} {}",
            final_fmt.width,
            final_fmt.height,
            final_fmt.fourcc.str().unwrap_or("?")
        );

        self.format = Some(final_fmt);
        self.device = Some(device);

        // Warmup pass so auto-exposure settles before the first real sample
        if self.config.warmup_frames > 0 {
            if let Err(e) = self.warmup() {
                debug!("Camera warmup skipped: {}", e);
            }
        }

        Ok(())
    }

    fn release(&mut self) {
        if self.device.take().is_some() {
            info!("Camera released");
        }
        self.format = None;
    }

    fn is_ready(&self) -> bool {
        self.device.is_some()
    }

    fn grab_frame(&mut self) -> Result<Frame> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| AttendanceError::FrameCapture("Camera not acquired".to_string()))?;
        let fmt = self
            .format
            .clone()
            .ok_or_else(|| AttendanceError::FrameCapture("Format not negotiated".to_string()))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(device, Type::VideoCapture, 4)
            .map_err(|e| AttendanceError::FrameCapture(format!("Failed to create stream: {}", e)))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| AttendanceError::FrameCapture(format!("Failed to capture: {}", e)))?;

        self.decode(buf, &fmt)
    }
}

impl V4l2Camera {
    fn warmup(&mut self) -> Result<()> {
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| AttendanceError::FrameCapture("Camera not acquired".to_string()))?;

        let mut stream = v4l::io::mmap::Stream::with_buffers(device, Type::VideoCapture, 4)
            .map_err(|e| AttendanceError::FrameCapture(format!("Failed to create stream: {}", e)))?;

        for i in 0..self.config.warmup_frames {
            stream.next().map_err(|e| {
                AttendanceError::FrameCapture(format!("Warmup frame {} failed: {}", i, e))
            })?;
            std::thread::sleep(std::time::Duration::from_millis(self.config.warmup_delay_ms));
        }
        Ok(())
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.release();
    }
}
