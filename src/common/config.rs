use crate::common::error::{AttendanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    pub service: ServiceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_warmup_frames() -> u32 {
    3
}
fn default_warmup_delay() -> u64 {
    50
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

/// Thresholds for the local face-presence heuristic and the quality gate.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectionConfig {
    /// Frames narrower/shorter than this are treated as not-yet-negotiated.
    #[serde(default = "default_min_frame_dim")]
    pub min_frame_dim: u32,
    /// Luminance delta between neighbouring pixels that counts as an edge.
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f32,
    /// Mean-luminance window inside which a face is considered present.
    #[serde(default = "default_presence_brightness_floor")]
    pub presence_brightness_floor: f32,
    #[serde(default = "default_presence_brightness_ceiling")]
    pub presence_brightness_ceiling: f32,
    /// Minimum edge ratio for face presence.
    #[serde(default = "default_presence_edge_ratio")]
    pub presence_edge_ratio: f32,
    /// Quality gate: minimum detection confidence.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Quality gate: acceptable mean-luminance window.
    #[serde(default = "default_min_brightness")]
    pub min_brightness: f32,
    #[serde(default = "default_max_brightness")]
    pub max_brightness: f32,
    /// Quality gate: minimum normalized sharpness.
    #[serde(default = "default_min_sharpness")]
    pub min_sharpness: f32,
}

fn default_min_frame_dim() -> u32 {
    10
}
fn default_edge_threshold() -> f32 {
    12.0
}
fn default_presence_brightness_floor() -> f32 {
    40.0
}
fn default_presence_brightness_ceiling() -> f32 {
    220.0
}
fn default_presence_edge_ratio() -> f32 {
    0.03
}
fn default_min_confidence() -> f32 {
    0.25
}
fn default_min_brightness() -> f32 {
    45.0
}
fn default_max_brightness() -> f32 {
    210.0
}
fn default_min_sharpness() -> f32 {
    0.2
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            min_frame_dim: default_min_frame_dim(),
            edge_threshold: default_edge_threshold(),
            presence_brightness_floor: default_presence_brightness_floor(),
            presence_brightness_ceiling: default_presence_brightness_ceiling(),
            presence_edge_ratio: default_presence_edge_ratio(),
            min_confidence: default_min_confidence(),
            min_brightness: default_min_brightness(),
            max_brightness: default_max_brightness(),
            min_sharpness: default_min_sharpness(),
        }
    }
}

/// Timing and policy of the capture loop itself.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Minimum enforced time between two accepted attendance events.
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
    /// How long rejection/transport messages stay on screen.
    #[serde(default = "default_message_display")]
    pub message_display_ms: u64,
    /// How long a success card stays on screen.
    #[serde(default = "default_result_display")]
    pub result_display_ms: u64,
    #[serde(default = "default_liveness_threshold")]
    pub liveness_threshold: f32,
    /// Before this hour attendance counts as check-in, from it as check-out.
    #[serde(default = "default_checkout_after_hour")]
    pub checkout_after_hour: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_tick_interval() -> u64 {
    500
}
fn default_cooldown() -> u64 {
    5000
}
fn default_message_display() -> u64 {
    2000
}
fn default_result_display() -> u64 {
    4000
}
fn default_liveness_threshold() -> f32 {
    0.7
}
fn default_checkout_after_hour() -> u32 {
    12
}
fn default_jpeg_quality() -> u8 {
    90
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            tick_interval_ms: default_tick_interval(),
            cooldown_ms: default_cooldown(),
            message_display_ms: default_message_display(),
            result_display_ms: default_result_display(),
            liveness_threshold: default_liveness_threshold(),
            checkout_after_hour: default_checkout_after_hour(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub auth_token: String,
    pub company_id: String,
    pub device_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_mode")]
    pub search_mode: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_search_mode() -> String {
    "1:N".to_string()
}
fn default_top_k() -> u32 {
    1
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(Path::new("configs/kiosk.toml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AttendanceError::Config(format!(
                "Config file not found: {}. Please create it from the example.",
                path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AttendanceError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(AttendanceError::Config(format!(
                "Camera width must be between 1 and 4096, got {}",
                self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(AttendanceError::Config(format!(
                "Camera height must be between 1 and 4096, got {}",
                self.camera.height
            )));
        }

        if self.capture.tick_interval_ms < 100 {
            return Err(AttendanceError::Config(format!(
                "Tick interval must be at least 100 ms, got {}",
                self.capture.tick_interval_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.liveness_threshold) {
            return Err(AttendanceError::Config(format!(
                "Liveness threshold must be between 0.0 and 1.0, got {}",
                self.capture.liveness_threshold
            )));
        }
        if self.capture.checkout_after_hour > 23 {
            return Err(AttendanceError::Config(format!(
                "checkout_after_hour must be between 0 and 23, got {}",
                self.capture.checkout_after_hour
            )));
        }

        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(AttendanceError::Config(format!(
                "Detection confidence must be between 0.0 and 1.0, got {}",
                self.detection.min_confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.detection.min_sharpness) {
            return Err(AttendanceError::Config(format!(
                "Sharpness threshold must be between 0.0 and 1.0, got {}",
                self.detection.min_sharpness
            )));
        }
        if self.detection.min_brightness >= self.detection.max_brightness {
            return Err(AttendanceError::Config(format!(
                "Brightness window is empty: [{}, {}]",
                self.detection.min_brightness, self.detection.max_brightness
            )));
        }

        if self.service.base_url.is_empty() {
            return Err(AttendanceError::Config(
                "Service base_url must not be empty".to_string(),
            ));
        }
        if self.service.timeout_secs == 0 || self.service.timeout_secs > 120 {
            return Err(AttendanceError::Config(format!(
                "Service timeout must be between 1 and 120 seconds, got {}",
                self.service.timeout_secs
            )));
        }

        Ok(())
    }
}
