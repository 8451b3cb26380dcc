use crate::common::DetectionConfig;
use crate::core::detector::DetectionReport;

/// Feedback thresholds, intentionally stricter than the capture gate so the
/// user is nudged towards a margin above the bare minimum.
const FEEDBACK_MIN_CONFIDENCE: f32 = 0.4;
const FEEDBACK_MIN_SHARPNESS: f32 = 0.3;

/// Whether a frame is good enough to spend a remote verification attempt on.
pub fn has_good_quality(report: &DetectionReport, config: &DetectionConfig) -> bool {
    report.has_face
        && report.confidence >= config.min_confidence
        && report.brightness >= config.min_brightness
        && report.brightness <= config.max_brightness
        && report.sharpness >= config.min_sharpness
}

/// Short human status string for the current report. Total: every report
/// maps to some message.
pub fn feedback(report: &DetectionReport, config: &DetectionConfig) -> &'static str {
    if !report.has_face {
        if report.brightness < config.presence_brightness_floor {
            return "Too dark";
        }
        if report.brightness > config.presence_brightness_ceiling {
            return "Too bright";
        }
        return "No face detected";
    }

    if report.confidence < FEEDBACK_MIN_CONFIDENCE {
        return "Face unclear";
    }
    if report.sharpness < FEEDBACK_MIN_SHARPNESS {
        return "Hold still";
    }

    "Face detected"
}
