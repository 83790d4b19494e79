//! facegate-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access: an owned camera session with
//! idempotent teardown, and on-demand grayscale frame sampling.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
