#[cfg(target_os = "linux")]
pub mod v4l_frame_source;
