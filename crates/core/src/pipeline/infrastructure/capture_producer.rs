use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::domain::latest_frame::LatestFrame;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Spawns the capture producer: reads frames as fast as the device yields
/// them and keeps the shared cell fresh.
///
/// Terminates when the device closes, a read fails, or `stop` is raised.
/// The cell is always closed on the way out so the consumer never waits
/// on a dead producer.
pub fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    latest: Arc<LatestFrame>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<Result<(), SendError>> {
    std::thread::spawn(move || {
        let result = run_capture_loop(&mut *source, &latest, &stop);
        latest.close();
        source.close();
        result
    })
}

fn run_capture_loop(
    source: &mut dyn FrameSource,
    latest: &LatestFrame,
    stop: &AtomicBool,
) -> Result<(), SendError> {
    loop {
        if stop.load(Ordering::Relaxed) {
            log::debug!("capture stop requested");
            return Ok(());
        }
        let started = std::time::Instant::now();
        match source.read() {
            Ok(Some(frame)) => {
                log::trace!("frame read in {:?}", started.elapsed());
                latest.publish(frame);
            }
            Ok(None) => {
                log::info!("video device closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}
