pub mod detection_cycle;
pub mod infrastructure;
pub mod watch_faces_use_case;
