use std::time::Instant;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::annotation::frame_annotator::FrameAnnotator;
use crate::capture::domain::latest_frame::LatestFrame;
use crate::detection::domain::detector::Detector;
use crate::output::domain::output_sink::OutputSink;
use crate::shared::constants::DEFAULT_ITERATIONS;

#[derive(Clone, Copy, Debug)]
pub struct CycleConfig {
    pub iterations: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Counters for one cycle run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Frames handed to the sink successfully.
    pub emitted: usize,
    /// Iterations that found no frame in the shared cell.
    pub skipped: usize,
    /// Iterations whose detector call failed.
    pub failures: usize,
}

/// The bounded consumer loop: snapshot, detect, annotate, emit.
///
/// Each iteration takes a deep copy of the freshest frame, runs the
/// detector on it, burns the results and a timing caption into the copy,
/// and emits it under the iteration's index. A failed detection still
/// emits the frame, captioned with the failure, so the output sequence
/// stays reviewable. Iterations that find the cell empty are skipped but
/// still consume their index.
pub struct DetectionCycle {
    config: CycleConfig,
    annotator: FrameAnnotator,
}

impl DetectionCycle {
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            annotator: FrameAnnotator::default(),
        }
    }

    pub fn with_annotator(config: CycleConfig, annotator: FrameAnnotator) -> Self {
        Self { config, annotator }
    }

    pub fn run(
        &self,
        latest: &LatestFrame,
        detector: &mut dyn Detector,
        sink: &mut dyn OutputSink,
    ) -> CycleStats {
        let mut stats = CycleStats::default();

        for index in 0..self.config.iterations {
            let frame = match latest.snapshot() {
                Some(frame) => frame,
                None => {
                    if latest.is_closed() {
                        log::info!("capture closed with no frame left, stopping at {index}");
                        break;
                    }
                    log::debug!("no frame available yet, skipping iteration {index}");
                    stats.skipped += 1;
                    continue;
                }
            };

            let started = Instant::now();
            let outcome = detector.detect(&frame);
            let elapsed_ms = started.elapsed().as_millis();

            let (detections, result_text) = match outcome {
                Ok(detections) => {
                    let text = format!("{} face(s)", detections.len());
                    (detections, text)
                }
                Err(e) => {
                    log::warn!("detection failed on iteration {index}: {e}");
                    stats.failures += 1;
                    (Vec::new(), e.to_string())
                }
            };

            let caption = format!(
                "Result: {result_text}; Time Consumed: {elapsed_ms}ms; Current Time: {}",
                timestamp()
            );
            let annotated = self.annotator.annotate(frame, &caption, &detections);

            match sink.emit(&annotated, index) {
                Ok(()) => stats.emitted += 1,
                Err(e) => log::warn!("failed to emit frame {index}: {e}"),
            }
        }

        stats
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::annotated_frame::AnnotatedFrame;
    use crate::shared::detection::{Detection, PixelRect};
    use crate::shared::frame::Frame;

    /// Returns a fixed detection list, or fails on chosen iterations.
    struct StubDetector {
        detections: Vec<Detection>,
        fail_on: Vec<usize>,
        calls: usize,
    }

    impl StubDetector {
        fn returning(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                fail_on: Vec::new(),
                calls: 0,
            }
        }

        fn failing_on(detections: Vec<Detection>, fail_on: Vec<usize>) -> Self {
            Self {
                detections,
                fail_on,
                calls: 0,
            }
        }
    }

    impl Detector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            let call = self.calls;
            self.calls += 1;
            if self.fail_on.contains(&call) {
                return Err("stub detector failure".into());
            }
            Ok(self.detections.clone())
        }
    }

    /// Collects emitted frames in memory.
    #[derive(Default)]
    struct VecSink {
        emitted: Vec<(usize, AnnotatedFrame)>,
    }

    impl OutputSink for VecSink {
        fn emit(
            &mut self,
            frame: &AnnotatedFrame,
            index: usize,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.emitted.push((index, frame.clone()));
            Ok(())
        }
    }

    fn ready_cell() -> LatestFrame {
        let cell = LatestFrame::new();
        cell.publish(Frame::filled(320, 240, [0, 0, 0]));
        cell
    }

    #[test]
    fn test_each_iteration_emits_one_annotated_frame() {
        let cell = ready_cell();
        let mut detector =
            StubDetector::returning(vec![Detection::new(10.0, 10.0, 50.0, 50.0, Some(0.9))]);
        let mut sink = VecSink::default();

        let stats = DetectionCycle::new(CycleConfig { iterations: 3 }).run(
            &cell,
            &mut detector,
            &mut sink,
        );

        assert_eq!(stats.emitted, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(sink.emitted.len(), 3);
        for (i, (index, frame)) in sink.emitted.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(
                frame.boxes,
                vec![PixelRect {
                    x: 10,
                    y: 10,
                    width: 50,
                    height: 50
                }]
            );
            assert!(frame.caption.starts_with("Result: 1 face(s)"));
        }
    }

    #[test]
    fn test_failed_detection_still_emits_captioned_frame() {
        let cell = ready_cell();
        let mut detector = StubDetector::failing_on(
            vec![Detection::new(10.0, 10.0, 50.0, 50.0, None)],
            vec![1],
        );
        let mut sink = VecSink::default();

        let stats = DetectionCycle::new(CycleConfig { iterations: 3 }).run(
            &cell,
            &mut detector,
            &mut sink,
        );

        assert_eq!(stats.emitted, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(sink.emitted.len(), 3);
        let (_, failed) = &sink.emitted[1];
        assert!(failed.boxes.is_empty());
        assert!(failed.caption.starts_with("Result: stub detector failure"));
        assert_eq!(sink.emitted[0].1.boxes.len(), 1);
        assert_eq!(sink.emitted[2].1.boxes.len(), 1);
    }

    #[test]
    fn test_empty_cell_never_invokes_detector() {
        let cell = LatestFrame::new();
        let mut detector = StubDetector::returning(Vec::new());
        let mut sink = VecSink::default();

        let stats = DetectionCycle::new(CycleConfig { iterations: 5 }).run(
            &cell,
            &mut detector,
            &mut sink,
        );

        assert_eq!(detector.calls, 0);
        assert_eq!(stats.skipped, 5);
        assert_eq!(stats.emitted, 0);
        assert!(sink.emitted.is_empty());
    }

    #[test]
    fn test_stops_when_cell_closes_empty() {
        let cell = LatestFrame::new();
        cell.close();
        let mut detector = StubDetector::returning(Vec::new());
        let mut sink = VecSink::default();

        let stats = DetectionCycle::new(CycleConfig { iterations: 50 }).run(
            &cell,
            &mut detector,
            &mut sink,
        );

        assert_eq!(stats.emitted, 0);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_closed_cell_with_last_frame_keeps_cycling() {
        // Device unplugged after one frame: the cycle reuses the stale
        // frame rather than aborting.
        let cell = ready_cell();
        cell.close();
        let mut detector = StubDetector::returning(Vec::new());
        let mut sink = VecSink::default();

        let stats = DetectionCycle::new(CycleConfig { iterations: 4 }).run(
            &cell,
            &mut detector,
            &mut sink,
        );

        assert_eq!(stats.emitted, 4);
    }

    #[test]
    fn test_fixed_detector_output_is_stable_across_iterations() {
        let cell = ready_cell();
        let mut detector =
            StubDetector::returning(vec![Detection::new(20.0, 30.0, 40.0, 40.0, Some(0.8))]);
        let mut sink = VecSink::default();

        DetectionCycle::new(CycleConfig { iterations: 3 }).run(&cell, &mut detector, &mut sink);

        let first = &sink.emitted[0].1.boxes;
        for (_, frame) in &sink.emitted[1..] {
            assert_eq!(&frame.boxes, first);
        }
    }
}
