use crate::camera::{Frame, FrameSource};
use crate::common::{CaptureConfig, Config, DetectionConfig, Result};
use crate::core::cooldown::CooldownTracker;
use crate::core::detector::{DetectionReport, FaceQualityDetector};
use crate::core::gate;
use crate::core::quality;
use crate::core::sampler::FrameSampler;
use crate::service::protocol::{MatchStatus, VerificationResult};
use crate::service::VerificationClient;
use chrono::{DateTime, Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const STATUS_WAITING: &str = "Waiting...";
const STATUS_VERIFYING: &str = "Verifying...";
const STATUS_CONNECTION_ERROR: &str = "Connection error";
const STATUS_NOT_RECOGNIZED: &str = "Face not recognized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    CheckIn,
    CheckOut,
}

/// Policy picking check-in vs check-out from the wall clock. Deliberately
/// configurable rather than a hardcoded noon split.
#[derive(Debug, Clone)]
pub struct CheckKindPolicy {
    checkout_after_hour: u32,
}

impl CheckKindPolicy {
    pub fn new(checkout_after_hour: u32) -> Self {
        CheckKindPolicy {
            checkout_after_hour,
        }
    }

    pub fn kind_for(&self, time: NaiveTime) -> CheckKind {
        if time.hour() < self.checkout_after_hour {
            CheckKind::CheckIn
        } else {
            CheckKind::CheckOut
        }
    }
}

/// An accepted attendance. Immutable once emitted; consumed by the external
/// reporting collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceEvent {
    pub employee_id: String,
    pub employee_name: String,
    pub kind: CheckKind,
    pub confidence: f32,
    pub occurred_at: DateTime<Local>,
}

/// Structural states of the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Watching,
    Verifying,
    CameraFailed,
}

/// UI-facing state, including the cooldown grace period which is a visible
/// substate of Watching rather than a structural fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiState {
    Idle,
    Watching,
    Verifying,
    CooldownWait,
    CameraError,
}

/// Payload for the last verification outcome, shown by the presentation
/// layer until its display window expires.
#[derive(Debug, Clone)]
pub struct LastResult {
    pub success: bool,
    pub employee_id: Option<String>,
    pub employee_name: Option<String>,
    pub kind: Option<CheckKind>,
    pub occurred_at: Option<DateTime<Local>>,
    pub message: String,
}

/// What the presentation layer renders.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub state: UiState,
    pub status_line: String,
    pub face_detected: bool,
    pub quality_pct: u8,
    pub processing: bool,
    pub last_result: Option<LastResult>,
    pub camera_error: Option<String>,
}

/// One verification attempt in flight. At most one exists at any time.
#[derive(Debug)]
struct CaptureAttempt {
    id: u64,
    #[allow(dead_code)]
    started_at: Instant,
}

struct AttemptOutcome {
    attempt: u64,
    result: Result<VerificationResult>,
}

/// The central controller of the attendance kiosk: owns the timer, the
/// state machine, the single in-flight flag, and all per-device state.
///
/// Single-writer discipline: one orchestrator instance exclusively owns its
/// camera, cooldown tracker, and in-flight flag. The only awaiting
/// operation is the verification call, which runs as a spawned task and
/// reports back over a channel; every mutation happens on the orchestrator
/// itself.
pub struct AttendanceOrchestrator<C, V> {
    camera: C,
    client: Arc<V>,
    detector: FaceQualityDetector,
    sampler: FrameSampler,
    cooldown: CooldownTracker,
    policy: CheckKindPolicy,
    detection: DetectionConfig,
    capture: CaptureConfig,
    message_window: Duration,
    result_window: Duration,

    active: bool,
    phase: Phase,
    in_flight: bool,
    attempt_seq: u64,
    pending: Option<CaptureAttempt>,

    last_report: Option<DetectionReport>,
    status_text: String,
    status_until: Option<Instant>,
    last_result: Option<(LastResult, Instant)>,
    camera_error: Option<String>,

    outcome_tx: mpsc::UnboundedSender<AttemptOutcome>,
    outcome_rx: Option<mpsc::UnboundedReceiver<AttemptOutcome>>,
    event_tx: mpsc::UnboundedSender<AttendanceEvent>,
}

impl<C, V> AttendanceOrchestrator<C, V>
where
    C: FrameSource,
    V: VerificationClient + 'static,
{
    pub fn new(
        camera: C,
        client: Arc<V>,
        config: &Config,
    ) -> (Self, mpsc::UnboundedReceiver<AttendanceEvent>) {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let orchestrator = AttendanceOrchestrator {
            camera,
            client,
            detector: FaceQualityDetector::new(config.detection.clone()),
            sampler: FrameSampler::new(config.detection.min_frame_dim),
            cooldown: CooldownTracker::new(Duration::from_millis(config.capture.cooldown_ms)),
            policy: CheckKindPolicy::new(config.capture.checkout_after_hour),
            detection: config.detection.clone(),
            capture: config.capture.clone(),
            message_window: Duration::from_millis(config.capture.message_display_ms),
            result_window: Duration::from_millis(config.capture.result_display_ms),
            active: true,
            phase: Phase::Idle,
            in_flight: false,
            attempt_seq: 0,
            pending: None,
            last_report: None,
            status_text: STATUS_WAITING.to_string(),
            status_until: None,
            last_result: None,
            camera_error: None,
            outcome_tx,
            outcome_rx: Some(outcome_rx),
            event_tx,
        };

        (orchestrator, event_rx)
    }

    /// Acquire the camera and enter Watching, or CameraError on failure.
    /// Acquisition failure is terminal until [`retry_camera`] is called.
    ///
    /// [`retry_camera`]: AttendanceOrchestrator::retry_camera
    pub fn start(&mut self) {
        self.active = true;
        match self.camera.acquire() {
            Ok(()) => {
                self.phase = Phase::Watching;
                self.camera_error = None;
                self.set_status(STATUS_WAITING, None);
                info!("camera ready, watching for faces");
            }
            Err(e) => {
                warn!("camera acquisition failed: {}", e);
                self.camera_error = Some(e.to_string());
                self.phase = Phase::CameraFailed;
            }
        }
    }

    /// Explicit user retry: the only path out of the camera error state.
    pub fn retry_camera(&mut self) {
        self.camera.release();
        self.camera_error = None;
        self.phase = Phase::Idle;
        self.start();
    }

    /// Tear down: deactivate, release the camera. A still-outstanding
    /// verification call is not cancelled; its result is discarded by the
    /// active-guard in the result handler.
    pub fn stop(&mut self) {
        self.active = false;
        self.phase = Phase::Idle;
        self.camera.release();
        info!("capture loop stopped");
    }

    /// One timer tick: expire stale UI messages, sample a frame, run
    /// detection for live feedback, and dispatch a verification attempt if
    /// the gate passes. Never suspends.
    pub fn tick(&mut self, now: Instant) {
        self.expire_displays(now);

        if matches!(self.phase, Phase::Idle | Phase::CameraFailed) {
            return;
        }

        let Some(frame) = self.sampler.sample(&mut self.camera) else {
            // Transient frame failure: skip the tick, heal next time
            return;
        };

        let report = self.detector.detect(&frame);

        if self.phase == Phase::Watching && self.status_until.is_none() {
            self.status_text = quality::feedback(&report, &self.detection).to_string();
        }

        if gate::should_attempt(&report, &self.detection, &self.cooldown, self.in_flight, now) {
            self.dispatch(frame, now);
        }

        self.last_report = Some(report);
    }

    /// Handle any verification results that have arrived, without blocking.
    pub fn poll_outcomes(&mut self, now: Instant) {
        let mut drained = Vec::new();
        if let Some(rx) = self.outcome_rx.as_mut() {
            while let Ok(outcome) = rx.try_recv() {
                drained.push(outcome);
            }
        }
        for outcome in drained {
            self.handle_outcome(outcome, now);
        }
    }

    /// Drive the loop until `shutdown` resolves. The camera is released on
    /// every exit path; the timer dies with this function's scope.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        let Some(mut outcome_rx) = self.outcome_rx.take() else {
            warn!("run() called re-entrantly, ignoring");
            return;
        };

        self.start();

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.capture.tick_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(outcome) = outcome_rx.recv() => {
                    self.handle_outcome(outcome, Instant::now());
                }
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        self.outcome_rx = Some(outcome_rx);
        self.stop();
    }

    pub fn snapshot(&self, now: Instant) -> StatusSnapshot {
        let state = match self.phase {
            Phase::Idle => UiState::Idle,
            Phase::CameraFailed => UiState::CameraError,
            Phase::Verifying => UiState::Verifying,
            Phase::Watching if !self.cooldown.may_attempt(now) => UiState::CooldownWait,
            Phase::Watching => UiState::Watching,
        };

        StatusSnapshot {
            state,
            status_line: self.status_text.clone(),
            face_detected: self.last_report.as_ref().map_or(false, |r| r.has_face),
            quality_pct: self
                .last_report
                .as_ref()
                .map_or(0, |r| (r.confidence * 100.0).round() as u8),
            processing: self.in_flight,
            last_result: self.last_result.as_ref().map(|(r, _)| r.clone()),
            camera_error: self.camera_error.clone(),
        }
    }

    fn dispatch(&mut self, frame: Frame, now: Instant) {
        let bytes = match frame.to_jpeg(self.capture.jpeg_quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode capture: {}", e);
                return;
            }
        };

        self.attempt_seq += 1;
        let attempt = self.attempt_seq;

        // The flag flips synchronously with attempt creation; only
        // handle_outcome may clear it.
        self.in_flight = true;
        self.pending = Some(CaptureAttempt {
            id: attempt,
            started_at: now,
        });
        self.phase = Phase::Verifying;
        self.set_status(STATUS_VERIFYING, None);

        let client = Arc::clone(&self.client);
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = client.verify(bytes).await;
            let _ = tx.send(AttemptOutcome { attempt, result });
        });

        debug!(attempt, "verification dispatched");
    }

    /// The single path that resolves an attempt and clears the in-flight
    /// flag, for success, rejection, and transport error alike.
    fn handle_outcome(&mut self, outcome: AttemptOutcome, now: Instant) {
        if !self.active {
            debug!(attempt = outcome.attempt, "result after teardown discarded");
            return;
        }
        match &self.pending {
            Some(pending) if pending.id == outcome.attempt => {}
            _ => {
                debug!(attempt = outcome.attempt, "stale result discarded");
                return;
            }
        }

        self.pending = None;
        self.in_flight = false;
        self.phase = Phase::Watching;

        match outcome.result {
            Ok(result) => self.apply_verification(result, now),
            Err(e) => {
                warn!("verification attempt failed: {}", e);
                self.set_status(STATUS_CONNECTION_ERROR, Some(now + self.message_window));
            }
        }
    }

    fn apply_verification(&mut self, result: VerificationResult, now: Instant) {
        let live = result.liveness_score >= self.capture.liveness_threshold;
        let accepted = result.verified && result.status == MatchStatus::Match && live;

        let employee = match (accepted, result.matched) {
            (true, Some(employee)) => employee,
            _ => {
                let message = result
                    .message
                    .unwrap_or_else(|| STATUS_NOT_RECOGNIZED.to_string());
                info!(
                    liveness = result.liveness_score,
                    "verification rejected: {}", message
                );
                let until = now + self.message_window;
                self.last_result = Some((
                    LastResult {
                        success: false,
                        employee_id: None,
                        employee_name: None,
                        kind: None,
                        occurred_at: None,
                        message: message.clone(),
                    },
                    until,
                ));
                self.set_status(&message, Some(until));
                return;
            }
        };

        let occurred_at = Local::now();
        let kind = self.policy.kind_for(occurred_at.time());
        let event = AttendanceEvent {
            employee_id: employee.id,
            employee_name: employee.name,
            kind,
            confidence: employee.confidence,
            occurred_at,
        };

        self.cooldown.record_success(now);

        let message = match kind {
            CheckKind::CheckIn => format!("Checked in: {}", event.employee_name),
            CheckKind::CheckOut => format!("Checked out: {}", event.employee_name),
        };
        let until = now + self.result_window;
        self.last_result = Some((
            LastResult {
                success: true,
                employee_id: Some(event.employee_id.clone()),
                employee_name: Some(event.employee_name.clone()),
                kind: Some(kind),
                occurred_at: Some(occurred_at),
                message: message.clone(),
            },
            until,
        ));
        self.set_status(&message, Some(until));

        info!(employee = %event.employee_id, kind = ?event.kind, "attendance event emitted");
        if self.event_tx.send(event).is_err() {
            debug!("no attendance event consumer attached");
        }
    }

    fn set_status(&mut self, text: &str, until: Option<Instant>) {
        self.status_text = text.to_string();
        self.status_until = until;
    }

    fn expire_displays(&mut self, now: Instant) {
        if self.status_until.map_or(false, |t| now >= t) {
            self.status_text = STATUS_WAITING.to_string();
            self.status_until = None;
        }
        if self
            .last_result
            .as_ref()
            .map_or(false, |(_, until)| now >= *until)
        {
            self.last_result = None;
        }
    }
}
