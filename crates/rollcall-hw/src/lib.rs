//! rollcall-hw — Frame sources.
//!
//! Provides the [`FrameSource`] capability consumed by the attendance
//! pipeline and a V4L2-backed implementation of it.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
pub use source::{FrameSource, FrameSourceError};
