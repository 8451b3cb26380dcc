use crate::common::DetectionConfig;
use crate::core::cooldown::CooldownTracker;
use crate::core::detector::DetectionReport;
use crate::core::quality;
use std::time::Instant;

/// The single go/no-go decision for dispatching a verification attempt.
///
/// Stateless: everything it needs is passed in, and it is re-evaluated on
/// every tick.
pub fn should_attempt(
    report: &DetectionReport,
    config: &DetectionConfig,
    cooldown: &CooldownTracker,
    in_flight: bool,
    now: Instant,
) -> bool {
    report.has_face
        && quality::has_good_quality(report, config)
        && !in_flight
        && cooldown.may_attempt(now)
}
