//! Turns match results into drawing primitives: box, label strip and the running count.
//!
//! Nothing here touches pixels; the display backend draws the shapes and
//! captions onto its own copy of the frame.

use image::Rgb;
use rollcall_core::{FaceMatch, FaceRect, Identity};

pub const KNOWN_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNKNOWN_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_STRIP_HEIGHT: u32 = 35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    /// Border of the given thickness in pixels.
    Outline(u32),
    Filled,
}

/// An axis-aligned rectangle in frame pixels, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rect: FaceRect,
    pub colour: Rgb<u8>,
    pub stroke: Stroke,
}

/// Text a display backend should draw over the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    /// Baseline origin in frame pixels.
    pub x: u32,
    pub y: u32,
    pub style: CaptionStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionStyle {
    /// Small text inside a face's label strip.
    Label,
    /// Larger status text in the frame corner.
    Counter,
}

/// Everything to draw over one frame, in drawing order.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub shapes: Vec<Shape>,
    pub captions: Vec<Caption>,
}

/// `"<name> (<confidence>)"` for known faces, `"Unknown"` otherwise.
pub fn label(result: &FaceMatch) -> String {
    match &result.identity {
        Identity::Known(name) => format!("{name} ({:.2})", result.confidence),
        Identity::Unknown => Identity::Unknown.to_string(),
    }
}

pub fn render(results: &[FaceMatch], recognized: usize) -> Overlay {
    let mut overlay = Overlay {
        shapes: Vec::with_capacity(results.len() * 2),
        captions: Vec::with_capacity(results.len() + 1),
    };

    for result in results {
        let colour = if result.identity.is_known() {
            KNOWN_COLOUR
        } else {
            UNKNOWN_COLOUR
        };
        let rect = result.rect;

        overlay.shapes.push(Shape {
            rect,
            colour,
            stroke: Stroke::Outline(BOX_THICKNESS),
        });
        overlay.shapes.push(Shape {
            rect: FaceRect {
                top: rect.bottom.saturating_sub(LABEL_STRIP_HEIGHT),
                ..rect
            },
            colour,
            stroke: Stroke::Filled,
        });

        overlay.captions.push(Caption {
            text: label(result),
            x: rect.left + 6,
            y: rect.bottom.saturating_sub(6),
            style: CaptionStyle::Label,
        });
    }

    overlay.captions.push(Caption {
        text: format!("Recognized: {recognized}"),
        x: 10,
        y: 30,
        style: CaptionStyle::Counter,
    });

    overlay
}
