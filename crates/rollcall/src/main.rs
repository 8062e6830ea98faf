use anyhow::Result;
use chrono::Local;
use rollcall_core::{AttendanceLedger, FrameMatcher, LedgerError, OnnxAnalyzer};
use rollcall_hw::{Camera, CameraError, FrameSource};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod overlay;
mod session;

use config::Config;
use session::{Halt, Session, SessionOptions, EXIT_NO_GALLERY};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(?config, "rollcall starting");

    let stop = Arc::new(AtomicBool::new(false));
    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping...");
            signal_stop.store(true, Ordering::SeqCst);
        }
    });

    // The capture loop blocks on camera reads; keep it off the async workers.
    tokio::task::block_in_place(|| run(&config, stop))
}

fn run(config: &Config, stop: Arc<AtomicBool>) -> Result<ExitCode> {
    let sources = match config.enrollment_sources() {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Error: {e}");
            session::print_summary(0);
            return Ok(ExitCode::from(EXIT_NO_GALLERY));
        }
    };

    let analyzer = match OnnxAnalyzer::load(&config.scrfd_model_path(), &config.arcface_model_path()) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Error: could not load face models from {}: {e}", config.model_dir.display());
            session::print_summary(0);
            return Ok(ExitCode::from(EXIT_NO_GALLERY));
        }
    };

    let open_camera = || -> Result<Camera, CameraError> {
        let mut camera = Camera::open(config.camera_index)?;
        camera.configure(&config.capture)?;
        Ok(camera)
    };
    let open_ledger = || -> Result<_, LedgerError> {
        let ledger = AttendanceLedger::create(&config.output_dir, Local::now())?;
        if let Some(path) = ledger.path() {
            println!("Attendance file: {}", path.display());
        }
        Ok(ledger)
    };

    let started = Session::start(
        &sources,
        analyzer,
        open_camera,
        open_ledger,
        display::open(config.headless),
        FrameMatcher::new(config.matching),
        SessionOptions {
            process_every: config.process_every,
            quit_key: config.quit_key,
            stop,
        },
    );
    let mut session = match started {
        Ok(session) => session,
        Err(halt) => {
            match &halt {
                Halt::Camera(e) => {
                    eprintln!("Error: could not open camera {}: {e}", config.camera_index);
                    for device in Camera::list_devices() {
                        tracing::info!(
                            path = %device.path,
                            name = %device.name,
                            driver = %device.driver,
                            bus = %device.bus,
                            "available capture device"
                        );
                    }
                }
                Halt::Ledger(e) => eprintln!("Error: could not create attendance file: {e}"),
                Halt::EmptyGallery | Halt::Interrupted => {}
            }
            tracing::info!(reason = %halt, "startup halted");
            session::print_summary(0);
            return Ok(ExitCode::from(halt.exit_status()));
        }
    };

    println!("Face recognition started. Press '{}' to quit.", config.quit_key);
    let report = session.run();
    tracing::info!(
        frames = report.frames,
        processed = report.processed,
        dropped = report.dropped,
        recognized = report.recognized,
        reason = ?report.stop_reason,
        "session finished"
    );

    Ok(ExitCode::SUCCESS)
}
