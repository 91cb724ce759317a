pub mod onnx_ssd_detector;
pub mod remote_http_detector;
