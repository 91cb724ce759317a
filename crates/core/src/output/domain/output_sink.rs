use crate::annotation::annotated_frame::AnnotatedFrame;

/// Destination for annotated frames, keyed by cycle index.
///
/// Implementations decide what the index means (file name, sequence
/// number); the pipeline only guarantees it is monotonically increasing.
pub trait OutputSink: Send {
    fn emit(
        &mut self,
        frame: &AnnotatedFrame,
        index: usize,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
