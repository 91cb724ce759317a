use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::domain::latest_frame::LatestFrame;
use crate::detection::domain::detector::Detector;
use crate::output::domain::output_sink::OutputSink;
use crate::pipeline::detection_cycle::{CycleConfig, CycleStats, DetectionCycle};
use crate::pipeline::infrastructure::capture_producer::spawn_capture;
use crate::pipeline::infrastructure::emit_worker::spawn_emit_worker;
use crate::shared::constants::{DEFAULT_FIRST_FRAME_TIMEOUT_MS, DEFAULT_ITERATIONS};

#[derive(Clone, Copy, Debug)]
pub struct WatchConfig {
    pub iterations: usize,
    /// How long to wait for the producer's first frame before starting the
    /// cycle regardless.
    pub first_frame_timeout: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            first_frame_timeout: Duration::from_millis(DEFAULT_FIRST_FRAME_TIMEOUT_MS),
        }
    }
}

/// Runs the full watch: capture producer thread, bounded detection cycle,
/// and asynchronous emit worker.
///
/// Layout: `capture → [latest frame cell] → cycle → emit worker`
///
/// The producer keeps the cell fresh while the cycle consumes snapshots at
/// its own pace; frames arriving between iterations are simply replaced.
pub struct WatchFacesUseCase {
    config: WatchConfig,
}

impl WatchFacesUseCase {
    pub fn new(config: WatchConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        source: Box<dyn FrameSource>,
        mut detector: Box<dyn Detector>,
        sink: Box<dyn OutputSink>,
    ) -> Result<CycleStats, Box<dyn std::error::Error>> {
        let latest = Arc::new(LatestFrame::new());
        let stop = Arc::new(AtomicBool::new(false));

        let producer = spawn_capture(source, latest.clone(), stop.clone());

        if !latest.wait_for_frame(self.config.first_frame_timeout) {
            if latest.is_closed() {
                // Producer died before delivering anything; its error is
                // the real story.
                return match producer.join() {
                    Ok(Ok(())) => Err("capture ended before any frame was delivered".into()),
                    Ok(Err(e)) => Err(e.to_string().into()),
                    Err(_) => Err("Capture thread panicked".into()),
                };
            }
            log::warn!(
                "no frame after {:?}, starting cycle anyway",
                self.config.first_frame_timeout
            );
        }

        let (mut channel_sink, worker) = spawn_emit_worker(sink);

        let cycle = DetectionCycle::new(CycleConfig {
            iterations: self.config.iterations,
        });
        let stats = cycle.run(&latest, &mut *detector, &mut channel_sink);

        stop.store(true, Ordering::Relaxed);
        drop(channel_sink);

        join_threads(producer, worker)?;

        log::info!(
            "watch finished: {} emitted, {} skipped, {} failed",
            stats.emitted,
            stats.skipped,
            stats.failures
        );
        Ok(stats)
    }
}

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Joins both side threads and coalesces the first error encountered.
///
/// The emit worker absorbs sink errors itself; only a panic surfaces here.
fn join_threads(
    producer: std::thread::JoinHandle<Result<(), SendError>>,
    worker: std::thread::JoinHandle<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    let mut first_error: Option<Box<dyn std::error::Error>> = None;

    match producer.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => set_if_none(&mut first_error, e.to_string().into()),
        Err(_) => set_if_none(&mut first_error, "Capture thread panicked".into()),
    }

    if worker.join().is_err() {
        set_if_none(&mut first_error, "Emit thread panicked".into());
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
