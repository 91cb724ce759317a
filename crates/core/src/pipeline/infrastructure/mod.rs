pub mod capture_producer;
pub mod emit_worker;
