//! V4L2 colour camera capture via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("camera already released")]
    Released,
    /// The buffer was dequeued but could not be decoded. The device is still usable.
    #[error("frame conversion failed: {0}")]
    Conversion(#[from] FrameError),
}

impl CameraError {
    /// True when only the current frame is lost, not the device.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }
}

/// Requested capture parameters. The driver may negotiate different values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    /// Number of driver buffers. Kept minimal so reads return fresh frames.
    pub buffer_depth: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 640,
            height: 480,
            buffer_depth: 1,
        }
    }
}

/// A source of colour frames: the live camera, or a scripted stand-in in tests.
pub trait FrameSource {
    fn configure(&mut self, settings: &CaptureSettings) -> Result<(), CameraError>;
    fn read_frame(&mut self) -> Result<Frame, CameraError>;
    fn release(&mut self);
}

/// Info about a discovered V4L2 device.
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
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed 24-bit RGB.
    Rgb24,
    /// Motion-JPEG, one JPEG per buffer.
    Mjpeg,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"YUYV") {
            Some(Self::Yuyv)
        } else if fourcc == FourCC::new(b"RGB3") {
            Some(Self::Rgb24)
        } else if fourcc == FourCC::new(b"MJPG") {
            Some(Self::Mjpeg)
        } else {
            None
        }
    }
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    stream: Option<MmapStream<'static>>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    buffer_depth: u32,
    released: bool,
}

impl Camera {
    /// Open the camera at `/dev/video<index>`.
    pub fn open(index: usize) -> Result<Self, CameraError> {
        Self::open_path(&format!("/dev/video{index}"))
    }

    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open_path(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        let pixel_format = PixelFormat::from_fourcc(fmt.fourcc).unwrap_or(PixelFormat::Yuyv);

        Ok(Self {
            device,
            stream: None,
            width: fmt.width,
            height: fmt.height,
            device_path: device_path.to_string(),
            fourcc: fmt.fourcc,
            pixel_format,
            buffer_depth: CaptureSettings::default().buffer_depth,
            released: false,
        })
    }

    /// Convert a raw buffer to RGB based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<image::RgbImage, CameraError> {
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height),
            PixelFormat::Rgb24 => frame::rgb24_to_rgb(buf, self.width, self.height),
            PixelFormat::Mjpeg => frame::mjpeg_to_rgb(buf),
        };
        Ok(converted?)
    }

    fn start_stream(&mut self) -> Result<(), CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, self.buffer_depth)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl FrameSource for Camera {
    /// Negotiate resolution, pixel format and frame rate, then (re)start streaming.
    ///
    /// Tries YUYV first and accepts RGB3 or MJPG if the driver insists.
    fn configure(&mut self, settings: &CaptureSettings) -> Result<(), CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }
        // Buffers must be unmapped before the format can change.
        self.stream = None;

        let mut fmt = self.device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = settings.width;
        fmt.height = settings.height;

        let negotiated = self.device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV, RGB3, or MJPG)",
                negotiated.fourcc
            ))
        })?;

        // Frame rate is advisory; many UVC cameras ignore it.
        match self.device.set_params(&Parameters::with_fps(settings.fps)) {
            Ok(params) => tracing::debug!(
                interval = %format!("{}/{}", params.interval.numerator, params.interval.denominator),
                "negotiated frame interval"
            ),
            Err(e) => tracing::warn!(fps = settings.fps, error = %e, "could not set frame rate"),
        }

        self.width = negotiated.width;
        self.height = negotiated.height;
        self.fourcc = negotiated.fourcc;
        self.pixel_format = pixel_format;
        self.buffer_depth = settings.buffer_depth.max(1);

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            buffers = self.buffer_depth,
            "negotiated format"
        );

        self.start_stream()
    }

    /// Dequeue the next frame, converting it to RGB.
    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if self.released {
            return Err(CameraError::Released);
        }
        if self.stream.is_none() {
            self.start_stream()?;
        }
        let stream = self.stream.as_mut().ok_or(CameraError::Released)?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let sequence = meta.sequence;
        let buf = buf.to_vec();

        let image = self.buf_to_rgb(&buf).map_err(|e| {
            tracing::debug!(sequence, format = ?self.pixel_format, error = %e, "bad frame buffer");
            e
        })?;
        Ok(Frame { image, sequence })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.stream = None;
        self.released = true;
        tracing::info!(device = %self.device_path, "camera released");
    }
}
