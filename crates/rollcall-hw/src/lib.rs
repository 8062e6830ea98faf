//! rollcall-hw: hardware abstraction for colour camera capture.
//!
//! Provides V4L2-based camera access and conversion of the negotiated
//! pixel format into RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CaptureSettings, FrameSource, PixelFormat};
pub use frame::{Frame, FrameError};
