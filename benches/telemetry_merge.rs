//! Hot-path benchmark suite.
//!
//! Measures the two per-message costs of a live session:
//! - Inbound: telemetry patches merged per second, by payload shape
//! - Outbound: camera frames resized and JPEG-encoded, by source size
//!
//! Run with: cargo bench --bench telemetry_merge
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::time::Instant;

use exercise_session::{EncoderSettings, PixelFormat, RawFrame, TelemetryMerger};

// ============================================================================
// Payloads
// ============================================================================

const COUNTER_ONLY: &str = r#"{"counter":12}"#;

const FULL_PATCH: &str = r#"{
    "counter":12,
    "stage":"down",
    "feedback":"Keep your back straight",
    "calibration_progress":100,
    "calibration_complete":true,
    "max_reach_cm":31.5,
    "rep_count":12,
    "frame":"/9j/4AAQSkZJRgABAQAAAQABAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/"
}"#;

const MALFORMED: &str = r#"{"counter":"twelve"}"#;

const PAYLOADS: &[(&str, &str)] = &[
    ("counter_only", COUNTER_ONLY),
    ("full_patch", FULL_PATCH),
    ("malformed", MALFORMED),
    ("keepalive", r#"{"type":"keepalive"}"#),
];

const FRAME_SIZES: &[(u32, u32)] = &[(640, 480), (1280, 720), (1920, 1080)];

// ============================================================================
// Benchmark: Telemetry Merge
// ============================================================================

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(1));

    for &(name, payload) in PAYLOADS {
        group.bench_with_input(BenchmarkId::new("ingest", name), payload, |b, text| {
            let mut merger = TelemetryMerger::new(Instant::now());
            b.iter(|| black_box(merger.ingest(black_box(text), Instant::now())));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Frame Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let settings = EncoderSettings::default();

    let mut group = c.benchmark_group("encode");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for &(width, height) in FRAME_SIZES {
        let frame = gradient_frame(width, height);
        group.throughput(Throughput::Bytes(u64::from(width * height * 3)));
        group.bench_with_input(
            BenchmarkId::new("jpeg", format!("{width}x{height}")),
            &frame,
            |b, frame| {
                b.iter(|| black_box(settings.encode(frame).unwrap()));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Non-uniform frame so the encoder does real work.
fn gradient_frame(width: u32, height: u32) -> RawFrame {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x % 256) as u8);
            pixels.push((y % 256) as u8);
            pixels.push(((x + y) % 256) as u8);
        }
    }
    RawFrame::new(width, height, PixelFormat::Rgb8, pixels).unwrap()
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(benches, bench_merge, bench_encode);
criterion_main!(benches);
