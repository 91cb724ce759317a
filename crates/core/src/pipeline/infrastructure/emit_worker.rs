use std::thread::JoinHandle;

use crate::annotation::annotated_frame::AnnotatedFrame;
use crate::output::domain::output_sink::OutputSink;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Front half of the asynchronous emit pair: an `OutputSink` that forwards
/// frames over a bounded channel to a writer thread.
///
/// Keeps slow sinks (disk, network) off the detection thread. Backpressure
/// is bounded: `emit` blocks once the channel is full.
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<(AnnotatedFrame, usize)>,
}

impl OutputSink for ChannelSink {
    fn emit(
        &mut self,
        frame: &AnnotatedFrame,
        index: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.tx
            .send((frame.clone(), index))
            .map_err(|_| "Emit worker stopped unexpectedly")?;
        Ok(())
    }
}

/// Spawns the writer thread draining into `sink` and returns the paired
/// `ChannelSink`.
///
/// Sink errors are logged and the drain continues; one bad write never
/// costs the frames behind it. Dropping the `ChannelSink` drains the queue
/// and ends the worker cleanly.
pub fn spawn_emit_worker(mut sink: Box<dyn OutputSink>) -> (ChannelSink, JoinHandle<()>) {
    let (tx, rx) =
        crossbeam_channel::bounded::<(AnnotatedFrame, usize)>(DEFAULT_CHANNEL_CAPACITY);

    let handle = std::thread::spawn(move || {
        for (frame, index) in rx {
            if let Err(e) = sink.emit(&frame, index) {
                log::warn!("failed to emit frame {index}: {e}");
            }
        }
    });

    (ChannelSink { tx }, handle)
}
