use crate::camera::Frame;
use crate::common::DetectionConfig;

/// Per-frame face presence and quality measurements.
///
/// Derived purely from one frame's pixels: identical frame bytes always
/// produce an identical report.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub has_face: bool,
    pub confidence: f32,
    pub brightness: f32,
    pub sharpness: f32,
}

impl DetectionReport {
    /// Report for frames that cannot be analysed (too small, not ready).
    pub fn empty() -> Self {
        DetectionReport {
            has_face: false,
            confidence: 0.0,
            brightness: 0.0,
            sharpness: 0.0,
        }
    }
}

/// Capture zone bounds: at most this big, centered in the frame.
const ZONE_MAX_WIDTH: f32 = 280.0;
const ZONE_MAX_HEIGHT: f32 = 350.0;
const ZONE_WIDTH_FRACTION: f32 = 0.4;
const ZONE_HEIGHT_FRACTION: f32 = 0.5;

/// Luminance span over which the lighting score ramps from 0 to 1.
const LIGHTING_SPAN: f32 = 120.0;
/// Edge ratio that earns a full edge score.
const EDGE_FULL_SCORE_RATIO: f32 = 0.08;
/// Multiplier turning an edge ratio into a 0..1 sharpness value.
const SHARPNESS_SCALE: f32 = 10.0;

/// Local face-presence heuristic.
///
/// Works on the central capture zone of a grayscale projection of the
/// frame: mean luminance for the brightness signal, neighbouring-pixel
/// luminance jumps for the edge/sharpness signal. An evenly lit region
/// with enough edge structure is treated as a face candidate; the remote
/// service does the actual matching.
pub struct FaceQualityDetector {
    config: DetectionConfig,
}

impl FaceQualityDetector {
    pub fn new(config: DetectionConfig) -> Self {
        FaceQualityDetector { config }
    }

    /// The centered region of the frame that is analysed, as (x, y, w, h).
    pub fn capture_zone(width: u32, height: u32) -> (u32, u32, u32, u32) {
        let zone_w = (width as f32 * ZONE_WIDTH_FRACTION)
            .min(ZONE_MAX_WIDTH)
            .max(1.0) as u32;
        let zone_h = (height as f32 * ZONE_HEIGHT_FRACTION)
            .min(ZONE_MAX_HEIGHT)
            .max(1.0) as u32;
        ((width - zone_w) / 2, (height - zone_h) / 2, zone_w, zone_h)
    }

    pub fn detect(&self, frame: &Frame) -> DetectionReport {
        let width = frame.width();
        let height = frame.height();
        if width < self.config.min_frame_dim || height < self.config.min_frame_dim {
            return DetectionReport::empty();
        }

        let gray = frame.image.to_luma8();
        let (x0, y0, zone_w, zone_h) = Self::capture_zone(width, height);

        let mut total_luminance = 0.0f64;
        let mut edge_count = 0u32;
        let mut pixel_count = 0u32;

        for y in y0..y0 + zone_h {
            let mut prev: Option<f32> = None;
            for x in x0..x0 + zone_w {
                let luminance = gray.get_pixel(x, y)[0] as f32;
                total_luminance += luminance as f64;
                if let Some(p) = prev {
                    if (luminance - p).abs() > self.config.edge_threshold {
                        edge_count += 1;
                    }
                }
                prev = Some(luminance);
                pixel_count += 1;
            }
        }

        if pixel_count == 0 {
            return DetectionReport::empty();
        }

        let brightness = (total_luminance / pixel_count as f64) as f32;
        let edge_ratio = edge_count as f32 / pixel_count as f32;
        let sharpness = (edge_ratio * SHARPNESS_SCALE).min(1.0);

        let lit = brightness >= self.config.presence_brightness_floor
            && brightness <= self.config.presence_brightness_ceiling;
        let has_face = lit && edge_ratio > self.config.presence_edge_ratio;

        let confidence = if has_face {
            let lighting_score = ((brightness - self.config.presence_brightness_floor)
                / LIGHTING_SPAN)
                .min((self.config.presence_brightness_ceiling - brightness) / LIGHTING_SPAN)
                .clamp(0.0, 1.0);
            let edge_score = (edge_ratio / EDGE_FULL_SCORE_RATIO).min(1.0);
            (lighting_score * 0.4 + edge_score * 0.6).clamp(0.0, 1.0)
        } else {
            0.0
        };

        DetectionReport {
            has_face,
            confidence,
            brightness,
            sharpness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Luma};

    fn frame_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Frame {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Luma([f(x, y)]));
        Frame::new(DynamicImage::ImageLuma8(buffer))
    }

    fn detector() -> FaceQualityDetector {
        FaceQualityDetector::new(DetectionConfig::default())
    }

    /// Mid-brightness frame with strong pixel-to-pixel structure.
    fn textured_frame() -> Frame {
        frame_from_fn(320, 240, |x, _| if x % 2 == 0 { 96 } else { 160 })
    }

    #[test]
    fn detect_is_deterministic_for_identical_frames() {
        let d = detector();
        let a = d.detect(&textured_frame());
        let b = d.detect(&textured_frame());
        assert_eq!(a, b);
    }

    #[test]
    fn textured_midtone_frame_reads_as_face() {
        let report = detector().detect(&textured_frame());
        assert!(report.has_face);
        assert!(report.confidence >= 0.25);
        assert!((report.brightness - 128.0).abs() < 8.0);
        assert!(report.sharpness > 0.9);
    }

    #[test]
    fn dark_frame_has_no_face() {
        let report = detector().detect(&frame_from_fn(320, 240, |_, _| 10));
        assert!(!report.has_face);
        assert_eq!(report.confidence, 0.0);
        assert!(report.brightness < 40.0);
    }

    #[test]
    fn flat_frame_has_no_edges() {
        // Well lit but featureless: a wall, not a face
        let report = detector().detect(&frame_from_fn(320, 240, |_, _| 128));
        assert!(!report.has_face);
        assert_eq!(report.sharpness, 0.0);
    }

    #[test]
    fn undersized_frame_yields_empty_report() {
        let report = detector().detect(&frame_from_fn(8, 8, |_, _| 128));
        assert_eq!(report, DetectionReport::empty());
    }

    #[test]
    fn capture_zone_is_centered_and_capped() {
        let (x, y, w, h) = FaceQualityDetector::capture_zone(1280, 720);
        assert_eq!((w, h), (280, 350));
        assert_eq!(x, (1280 - 280) / 2);
        assert_eq!(y, (720 - 350) / 2);

        // Small frames fall back to the fractional zone
        let (_, _, w, h) = FaceQualityDetector::capture_zone(100, 100);
        assert_eq!((w, h), (40, 50));
    }
}
