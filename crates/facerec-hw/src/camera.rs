//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use crate::source::{FrameSource, SourceError};
use image::GrayImage;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const STREAM_BUFFERS: u32 = 4;
const MAX_PROBED_DEVICES: u32 = 16;
const EBUSY: i32 = 16;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("video capture not supported")]
    CaptureNotSupported,
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
}

/// A capture-capable V4L2 device found by [`Camera::list_devices`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Yuyv,
    Grey,
    /// 16-bit little-endian, reduced to the high byte.
    Y16,
    /// Motion JPEG, one compressed image per buffer.
    Mjpeg,
}

impl PixelFormat {
    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            b"Y16 " | b"Y16\0" => Some(Self::Y16),
            b"MJPG" => Some(Self::Mjpeg),
            _ => None,
        }
    }

    /// Convert one captured buffer to grayscale.
    pub fn to_grayscale(self, buf: &[u8], width: u32, height: u32) -> Result<GrayImage, FrameError> {
        match self {
            Self::Yuyv => frame::yuyv_to_grayscale(buf, width, height),
            Self::Grey => frame::grey_to_grayscale(buf, width, height),
            Self::Y16 => frame::y16_to_grayscale(buf, width, height),
            Self::Mjpeg => frame::mjpeg_to_grayscale(buf),
        }
    }
}

/// An open V4L2 capture device with a negotiated grayscale-convertible format.
pub struct Camera {
    device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open `device_path` and ask for YUYV at `width` × `height`.
    ///
    /// Drivers may substitute another size or format; the negotiated values
    /// are stored. GREY, Y16 and MJPG substitutes are accepted.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        let device = open_capture_device(device_path)?;

        let mut requested = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("cannot read format: {e}")))?;
        requested.fourcc = FourCC::new(b"YUYV");
        requested.width = width;
        requested.height = height;

        let negotiated = device
            .set_format(&requested)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("cannot set format: {e}")))?;
        let Some(pixel_format) = PixelFormat::from_fourcc(negotiated.fourcc) else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "driver offered {:?}, expected YUYV, GREY, Y16, or MJPG",
                negotiated.fourcc
            )));
        };

        if (negotiated.width, negotiated.height) != (width, height) {
            tracing::warn!(
                requested = %format!("{width}x{height}"),
                negotiated = %format!("{}x{}", negotiated.width, negotiated.height),
                "driver adjusted capture size"
            );
        }
        tracing::info!(
            device = device_path,
            width = negotiated.width,
            height = negotiated.height,
            format = ?pixel_format,
            "camera ready"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }

    /// Start streaming. The returned stream keeps its mmap buffers queued
    /// for the lifetime of the run.
    pub fn stream(&self) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("cannot map stream buffers: {e}")))?;
        Ok(CameraStream {
            camera: self,
            stream,
        })
    }

    /// Probe `/dev/video0` through `/dev/video{MAX_PROBED_DEVICES - 1}` for
    /// capture-capable devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_PROBED_DEVICES)
            .map(|i| format!("/dev/video{i}"))
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                        path,
                    })
            })
            .collect()
    }
}

fn open_capture_device(path: &str) -> Result<Device, CameraError> {
    if !Path::new(path).exists() {
        return Err(CameraError::DeviceNotFound(path.to_string()));
    }
    let device = Device::with_path(path).map_err(|e| match e.raw_os_error() {
        Some(EBUSY) => CameraError::DeviceBusy,
        _ => CameraError::DeviceNotFound(format!("{path}: {e}")),
    })?;

    let caps = device
        .query_caps()
        .map_err(|e| CameraError::CaptureFailed(format!("cannot query capabilities: {e}")))?;
    if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
        return Err(CameraError::CaptureNotSupported);
    }
    tracing::debug!(device = path, driver = %caps.driver, card = %caps.card, "opened device");
    Ok(device)
}

/// Live frame stream from an open [`Camera`].
pub struct CameraStream<'a> {
    camera: &'a Camera,
    stream: MmapStream<'a>,
}

impl CameraStream<'_> {
    /// Block until the next frame is dequeued, then convert it to grayscale.
    pub fn capture(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        let used = (meta.bytesused as usize).min(buf.len());
        let payload = if used > 0 { &buf[..used] } else { buf };
        let sequence = meta.sequence;

        let gray = self
            .camera
            .pixel_format
            .to_grayscale(payload, self.camera.width, self.camera.height)?;

        Ok(Frame::new(gray, sequence))
    }
}

impl FrameSource for CameraStream<'_> {
    /// A camera never ends on its own; capture errors end the stream with an error.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        Ok(Some(self.capture()?))
    }
}
