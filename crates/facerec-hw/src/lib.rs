//! facerec-hw — camera capture and frame sources.
//!
//! Provides V4L2-based camera access with grayscale conversion, plus an
//! image-file source for replaying recorded frames.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use source::{FrameSource, ImageSequence, SourceError};
