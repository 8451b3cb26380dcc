//! End-to-end behaviour of the capture loop against scripted collaborators,
//! exercised through the public API only.

use attend_kiosk::camera::{Frame, FrameSource};
use attend_kiosk::common::{AttendanceError, Config, Result, ServiceConfig};
use attend_kiosk::core::{AttendanceOrchestrator, UiState};
use attend_kiosk::service::protocol::{MatchStatus, MatchedEmployee, VerificationResult};
use attend_kiosk::service::VerificationClient;
use image::{DynamicImage, ImageBuffer, Luma};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

fn test_config() -> Config {
    Config {
        camera: Default::default(),
        detection: Default::default(),
        capture: Default::default(),
        service: ServiceConfig {
            base_url: "http://localhost:8000".to_string(),
            auth_token: "token".to_string(),
            company_id: "c1".to_string(),
            device_id: "d1".to_string(),
            timeout_secs: 5,
            search_mode: "1:N".to_string(),
            top_k: 1,
        },
    }
}

/// Well lit frame with enough pixel structure to pass the quality gate.
fn face_frame() -> Frame {
    let buffer = ImageBuffer::from_fn(320, 240, |x, _| {
        if x % 2 == 0 {
            Luma([96u8])
        } else {
            Luma([160u8])
        }
    });
    Frame::new(DynamicImage::ImageLuma8(buffer))
}

struct LoopingCamera {
    ready: bool,
    frame: Frame,
}

impl LoopingCamera {
    fn new() -> Self {
        LoopingCamera {
            ready: false,
            frame: face_frame(),
        }
    }
}

impl FrameSource for LoopingCamera {
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
        if self.ready {
            Ok(self.frame.clone())
        } else {
            Err(AttendanceError::FrameCapture("not acquired".to_string()))
        }
    }
}

fn match_result() -> VerificationResult {
    VerificationResult {
        verified: true,
        status: MatchStatus::Match,
        liveness_score: 0.95,
        matched: Some(MatchedEmployee {
            id: "e7".to_string(),
            name: "Priya Shah".to_string(),
            confidence: 0.98,
        }),
        message: None,
    }
}

/// Client that counts calls and blocks each one until released.
struct GatedClient {
    calls: AtomicUsize,
    gate: Notify,
    response: Mutex<Option<VerificationResult>>,
}

impl GatedClient {
    fn new(response: VerificationResult) -> Self {
        GatedClient {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
            response: Mutex::new(Some(response)),
        }
    }
}

#[async_trait::async_trait]
impl VerificationClient for GatedClient {
    async fn verify(&self, _image_jpeg: Vec<u8>) -> Result<VerificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        self.response
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AttendanceError::Transport("exhausted".to_string()))
    }
}

/// Client that answers immediately with the same result every time.
struct EchoClient {
    calls: AtomicUsize,
    response: VerificationResult,
}

#[async_trait::async_trait]
impl VerificationClient for EchoClient {
    async fn verify(&self, _image_jpeg: Vec<u8>) -> Result<VerificationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// A face held in front of the camera across many ticks produces exactly
/// one outstanding verification call.
#[tokio::test]
async fn one_attempt_in_flight_at_a_time() {
    let client = Arc::new(GatedClient::new(match_result()));
    let (mut orch, _events) =
        AttendanceOrchestrator::new(LoopingCamera::new(), Arc::clone(&client), &test_config());

    orch.start();
    let t0 = Instant::now();
    for i in 0..10 {
        orch.tick(t0 + Duration::from_millis(500 * i));
        settle().await;
    }

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(orch.snapshot(t0).state, UiState::Verifying);
}

/// After an accepted event, the cooldown blocks further attempts for its
/// full duration, then attempts resume.
#[tokio::test]
async fn cooldown_paces_successive_events() {
    let client = Arc::new(EchoClient {
        calls: AtomicUsize::new(0),
        response: match_result(),
    });
    let (mut orch, mut events) =
        AttendanceOrchestrator::new(LoopingCamera::new(), Arc::clone(&client), &test_config());

    orch.start();
    let t0 = Instant::now();

    // Simulate 20 seconds of ticks at the default 500 ms cadence,
    // collecting each result as soon as it lands.
    for i in 0..40 {
        let now = t0 + Duration::from_millis(500 * i);
        orch.tick(now);
        settle().await;
        orch.poll_outcomes(now);
    }

    // 20 s of a continuously present face with a 5 s cooldown: the first
    // event at ~0 s, then one per cooldown expiry.
    let mut accepted = 0;
    while events.try_recv().is_ok() {
        accepted += 1;
    }
    assert_eq!(accepted, 4);
    assert_eq!(client.calls.load(Ordering::SeqCst), 4);
}

/// The full driver: run() ticks on its own timer and stops cleanly when
/// the shutdown future resolves.
#[tokio::test(start_paused = true)]
async fn run_drives_the_loop_and_shuts_down() {
    let client = Arc::new(EchoClient {
        calls: AtomicUsize::new(0),
        response: match_result(),
    });
    let (mut orch, mut events) =
        AttendanceOrchestrator::new(LoopingCamera::new(), Arc::clone(&client), &test_config());

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let driver = tokio::spawn(async move {
        orch.run(async {
            let _ = stop_rx.await;
        })
        .await;
        orch
    });

    // Paused clock: advancing virtual time lets a few ticks elapse.
    tokio::time::advance(Duration::from_millis(2600)).await;
    settle().await;

    stop_tx.send(()).unwrap();
    let orch = driver.await.unwrap();

    assert!(events.try_recv().is_ok());
    assert_eq!(orch.snapshot(Instant::now()).state, UiState::Idle);
    assert!(client.calls.load(Ordering::SeqCst) >= 1);
}
