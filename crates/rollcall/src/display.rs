//! Preview window backends.

use crate::overlay::Overlay;
use image::RgbImage;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisplayError {
    #[cfg(feature = "gui")]
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
    #[cfg_attr(not(feature = "gui"), allow(dead_code))]
    #[error("frame too large for display: {0}x{1}")]
    FrameTooLarge(u32, u32),
}

pub trait Display {
    /// Draw `overlay` over `frame` and present it.
    fn show(&mut self, window: &str, frame: &RgbImage, overlay: &Overlay) -> Result<(), DisplayError>;
    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, DisplayError>;
    fn destroy_all(&mut self);
}

/// No window; captions go to the trace log. Never reports a key, so the
/// session ends on interrupt or camera failure.
#[derive(Default)]
pub struct HeadlessDisplay {
    frames_shown: u64,
}

impl Display for HeadlessDisplay {
    fn show(&mut self, window: &str, _frame: &RgbImage, overlay: &Overlay) -> Result<(), DisplayError> {
        self.frames_shown += 1;
        tracing::trace!(
            window,
            frame = self.frames_shown,
            shapes = overlay.shapes.len(),
            captions = ?overlay.captions.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            "frame rendered"
        );
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, DisplayError> {
        std::thread::sleep(timeout);
        Ok(None)
    }

    fn destroy_all(&mut self) {
        tracing::debug!(frames = self.frames_shown, "headless display closed");
    }
}

/// OpenCV highgui window.
#[cfg(feature = "gui")]
pub struct HighGuiDisplay;

#[cfg(feature = "gui")]
impl Display for HighGuiDisplay {
    fn show(&mut self, window: &str, frame: &RgbImage, overlay: &Overlay) -> Result<(), DisplayError> {
        use crate::overlay::{CaptionStyle, Stroke};
        use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
        use opencv::prelude::*;
        use opencv::{highgui, imgproc};

        let (w, h) = frame.dimensions();
        let (Ok(rows), Ok(cols)) = (i32::try_from(h), i32::try_from(w)) else {
            return Err(DisplayError::FrameTooLarge(w, h));
        };

        let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))?;
        // highgui expects BGR.
        for (dst, src) in mat.data_bytes_mut()?.chunks_exact_mut(3).zip(frame.pixels()) {
            dst.copy_from_slice(&[src.0[2], src.0[1], src.0[0]]);
        }

        for shape in &overlay.shapes {
            let r = shape.rect;
            let rect = Rect::new(
                r.left as i32,
                r.top as i32,
                (r.right - r.left + 1) as i32,
                (r.bottom - r.top + 1) as i32,
            );
            let [red, green, blue] = shape.colour.0;
            let colour = Scalar::new(f64::from(blue), f64::from(green), f64::from(red), 0.0);
            let thickness = match shape.stroke {
                Stroke::Outline(t) => t as i32,
                Stroke::Filled => imgproc::FILLED,
            };
            imgproc::rectangle(&mut mat, rect, colour, thickness, imgproc::LINE_8, 0)?;
        }

        for caption in &overlay.captions {
            let (font, scale, thickness) = match caption.style {
                CaptionStyle::Label => (imgproc::FONT_HERSHEY_DUPLEX, 0.4, 1),
                CaptionStyle::Counter => (imgproc::FONT_HERSHEY_SIMPLEX, 0.7, 2),
            };
            imgproc::put_text(
                &mut mat,
                &caption.text,
                Point::new(caption.x as i32, caption.y as i32),
                font,
                scale,
                Scalar::new(255.0, 255.0, 255.0, 0.0),
                thickness,
                imgproc::LINE_8,
                false,
            )?;
        }

        highgui::imshow(window, &mat)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, DisplayError> {
        let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
        let key = opencv::highgui::wait_key(millis)?;
        Ok((key >= 0).then(|| char::from((key & 0xFF) as u8)))
    }

    fn destroy_all(&mut self) {
        if let Err(e) = opencv::highgui::destroy_all_windows() {
            tracing::warn!(error = %e, "failed to close preview window");
        }
    }
}

/// Pick the preview backend for this build.
pub fn open(headless: bool) -> Box<dyn Display> {
    #[cfg(feature = "gui")]
    if !headless {
        return Box::new(HighGuiDisplay);
    }
    #[cfg(not(feature = "gui"))]
    if !headless {
        tracing::info!("built without the `gui` feature; running headless");
    }
    Box::new(HeadlessDisplay::default())
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn show(&mut self, window: &str, frame: &RgbImage, overlay: &Overlay) -> Result<(), DisplayError> {
        (**self).show(window, frame, overlay)
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, DisplayError> {
        (**self).poll_key(timeout)
    }

    fn destroy_all(&mut self) {
        (**self).destroy_all()
    }
}
