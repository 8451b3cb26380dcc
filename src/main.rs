use attend_kiosk::{
    camera::{FrameSource, V4l2Camera},
    common::{Config, DevMode},
    core::{quality, AttendanceOrchestrator, FaceQualityDetector},
    service::HttpVerificationClient,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

#[derive(Parser)]
#[command(name = "attend-kiosk")]
#[command(about = "Unattended face-attendance kiosk")]
struct Cli {
    /// Enable development mode (saves captures locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Path to the kiosk configuration file
    #[arg(long, global = true, default_value = "configs/kiosk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the attendance capture loop until interrupted
    Run,
    /// Grab one frame and report what the camera delivers
    TestCamera,
    /// Grab one frame and report what the face heuristic sees
    TestDetection,
    /// List available camera devices
    ListCameras,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev)?;

    match cli.command {
        Commands::Run => {
            let config = Config::load_from_path(&cli.config)?;
            run_loop(config).await?;
        }
        Commands::TestCamera => {
            println!("Testing camera...");
            let config = Config::load_from_path(&cli.config)?;
            test_camera(&config, &dev_mode)?;
        }
        Commands::TestDetection => {
            println!("Testing face detection...");
            let config = Config::load_from_path(&cli.config)?;
            test_detection(&config, &dev_mode)?;
        }
        Commands::ListCameras => {
            let cameras = V4l2Camera::list_cameras()?;

            if cameras.is_empty() {
                println!("No cameras found.");
                println!("Check that a camera is connected and /dev/video* is readable.");
                return Ok(());
            }

            for (index, name, features) in &cameras {
                println!("/dev/video{}: {}", index, name);
                for feature in features {
                    println!("   - {}", feature);
                }
                println!();
            }
            println!("Set [camera] device_index in {} to pick one.", cli.config.display());
        }
    }

    Ok(())
}

/// Wire up the orchestrator against real hardware and the real backend,
/// forward accepted events to the attendance endpoint, and run until Ctrl-C.
async fn run_loop(config: Config) -> Result<()> {
    let camera = V4l2Camera::new(config.camera.clone());
    let client = Arc::new(
        HttpVerificationClient::new(config.service.clone())
            .context("Failed to build verification client")?,
    );

    let (mut orchestrator, mut events) =
        AttendanceOrchestrator::new(camera, Arc::clone(&client), &config);

    // Reporting runs off the capture path so a slow attendance endpoint
    // never stalls the loop.
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Err(e) = client.record_attendance(&event).await {
                warn!(employee = %event.employee_id, "failed to report attendance: {}", e);
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for shutdown signal: {}", e);
        }
    };

    orchestrator.run(shutdown).await;

    if let Some(error) = orchestrator.snapshot(Instant::now()).camera_error {
        anyhow::bail!("Camera error: {}", error);
    }

    drop(orchestrator);
    let _ = reporter.await;
    Ok(())
}

fn test_camera(config: &Config, dev_mode: &DevMode) -> Result<()> {
    let mut camera = V4l2Camera::new(config.camera.clone());
    camera.acquire()?;
    let frame = camera.grab_frame()?;
    camera.release();

    println!("Captured {}x{} frame", frame.width(), frame.height());

    if dev_mode.is_enabled() {
        let path = dev_mode.get_capture_path("test_camera");
        frame.image.save(&path)?;
        println!("Saved capture to {}", path.display());
    }

    Ok(())
}

fn test_detection(config: &Config, dev_mode: &DevMode) -> Result<()> {
    let mut camera = V4l2Camera::new(config.camera.clone());
    camera.acquire()?;
    let frame = camera.grab_frame()?;
    camera.release();

    let detector = FaceQualityDetector::new(config.detection.clone());
    let report = detector.detect(&frame);

    println!("Face present: {}", report.has_face);
    println!("Confidence:   {:.2}", report.confidence);
    println!("Brightness:   {:.1}", report.brightness);
    println!("Sharpness:    {:.2}", report.sharpness);
    println!("Feedback:     {}", quality::feedback(&report, &config.detection));
    println!(
        "Would verify: {}",
        quality::has_good_quality(&report, &config.detection)
    );

    if dev_mode.is_enabled() {
        let path = dev_mode.get_debug_path("test_detection");
        frame.image.save(&path)?;
        println!("Saved frame to {}", path.display());
    }

    Ok(())
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
