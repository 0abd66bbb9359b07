//! Replay a directory of images as a live exercise session.
//!
//! Demonstrates:
//! - Creating a session through the REST API
//! - Streaming frames from an image directory
//! - Watching the merged telemetry snapshot
//! - Fetching final metrics and ending the session
//!
//! Usage:
//!   cargo run --example replay_session -- ./frames
//!   cargo run --example replay_session -- ./frames squat --debug
//!   EXERCISE_API_URL=https://coach.example.com cargo run --example replay_session -- ./frames

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use exercise_session::api::DEFAULT_HEIGHT_CM;
use exercise_session::{
    ExerciseKind, HttpSessionApi, ImageSequenceSource, Result, ServiceEndpoint, SessionApi,
    SessionController,
};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    frames: PathBuf,
    exercise: String,
    debug: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut positional = args.iter().filter(|a| !a.starts_with("--"));
        Self {
            frames: positional.next().map_or_else(|| PathBuf::from("./frames"), PathBuf::from),
            exercise: positional.next().cloned().unwrap_or_else(|| "pushup".into()),
            debug: args.iter().any(|a| a == "--debug"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "exercise_session=debug"
    } else {
        "exercise_session=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let exercise: ExerciseKind = args.exercise.parse()?;
    println!("=== Replay: {} ===\n", exercise.display_name());
    println!("        {}\n", exercise.description());

    // ========================================================================
    // Create Session
    // ========================================================================

    let endpoint = ServiceEndpoint::from_env()?;
    let api = Arc::new(HttpSessionApi::new(endpoint.clone())?);

    let created = api.create_session(exercise, DEFAULT_HEIGHT_CM).await?;
    println!("[Session] Created {}", created.session_id);

    let session = SessionController::builder()
        .session_id(created.session_id.clone())
        .endpoint(endpoint)
        .source(ImageSequenceSource::new(args.frames.clone()))
        .api(api.clone())
        .build()?;

    // ========================================================================
    // Stream
    // ========================================================================

    session.start()?;
    println!("[Stream] Press Ctrl+C to stop...\n");

    let mut snapshots = session.subscribe_snapshot();
    let mut errors = session.subscribe_errors();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print!(
                    "\r        reps {:>3} | {:<6} | {:>3} fps | {:<40}",
                    snapshot.counter, snapshot.stage, snapshot.fps, snapshot.feedback
                );
                if let Some(extremum) = snapshot.primary_extremum() {
                    print!(" | {} {:.1} cm", extremum.kind.label(), extremum.cm);
                }
            }
            changed = errors.changed() => {
                if changed.is_err() {
                    break;
                }
                let fault = errors.borrow_and_update().clone();
                if let Some(error) = fault {
                    println!("\n[Error] {error}");
                    if error.is_connection_error() || error.is_device_error() {
                        break;
                    }
                }
            }
        }
    }

    // ========================================================================
    // Results
    // ========================================================================

    let stats = session.transmit_stats();
    println!(
        "\n\n[Stream] sent {} / dropped {} / failed {}",
        stats.sent, stats.dropped, stats.failed
    );

    match session.stop().await? {
        Some(results) => println!("[Results] {:#}", results.metrics()),
        None => println!("[Results] none"),
    }

    api.delete_session(&created.session_id).await?;
    println!("[Session] Deleted");

    Ok(())
}
