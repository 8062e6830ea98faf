//! Per-frame face matching: downscale, detect, embed, resolve against the gallery.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::gallery::Gallery;
use crate::types::{BoundingBox, Embedding, FaceRect, Identity, PixelOrder};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Linear downscale applied before detection.
pub const DEFAULT_SCALE_FACTOR: f32 = 0.2;
/// Maximum embedding distance for a match.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub scale_factor: f32,
    pub tolerance: f32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Result of matching a query embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub identity: Identity,
    /// `1 - distance` for a known face, 0 otherwise. Always in [0, 1].
    pub confidence: f32,
    /// Distance to the nearest gallery entry, if the gallery was non-empty.
    pub distance: Option<f32>,
}

/// Strategy for comparing a query embedding against a gallery of enrolled faces.
pub trait Matcher {
    fn compare(&self, query: &Embedding, gallery: &Gallery, tolerance: f32) -> MatchResult;
}

/// Nearest-neighbour matcher on Euclidean distance.
///
/// A match needs the nearest distance to pass both the inclusive
/// tolerance test (`<=`) and the strict cutoff (`<`) against the same
/// constant, so a distance of exactly `tolerance` is unknown.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, query: &Embedding, gallery: &Gallery, tolerance: f32) -> MatchResult {
        let best = gallery
            .entries()
            .iter()
            .map(|entry| (entry, query.euclidean_distance(&entry.embedding)))
            .filter(|(_, d)| d.is_finite())
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((entry, distance)) if within_tolerance(distance, tolerance) && distance < tolerance => {
                MatchResult {
                    identity: Identity::Known(entry.name.clone()),
                    confidence: (1.0 - distance).clamp(0.0, 1.0),
                    distance: Some(distance),
                }
            }
            other => MatchResult {
                identity: Identity::Unknown,
                confidence: 0.0,
                distance: other.map(|(_, d)| d),
            },
        }
    }
}

// TODO: fold into the strict cutoff in `compare`; the two only disagree at
// exactly `tolerance`, where the strict test already decides.
fn within_tolerance(distance: f32, tolerance: f32) -> bool {
    distance <= tolerance
}

/// One resolved face in a processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub identity: Identity,
    pub confidence: f32,
    /// Location in full-resolution frame coordinates.
    pub rect: FaceRect,
}

/// Runs the detection/encoding collaborator on a frame and resolves every face.
pub struct FrameMatcher<M: Matcher = EuclideanMatcher> {
    settings: MatchSettings,
    matcher: M,
}

impl FrameMatcher<EuclideanMatcher> {
    pub fn new(settings: MatchSettings) -> Self {
        Self::with_matcher(settings, EuclideanMatcher)
    }
}

impl<M: Matcher> FrameMatcher<M> {
    pub fn with_matcher(settings: MatchSettings, matcher: M) -> Self {
        Self { settings, matcher }
    }

    /// Match every face in an RGB frame, in detector order.
    ///
    /// Zero detected faces is an empty result, not an error. Faces the
    /// encoder could not embed are dropped.
    pub fn process<A: FaceAnalyzer + ?Sized>(
        &self,
        frame: &RgbImage,
        gallery: &Gallery,
        analyzer: &mut A,
    ) -> Result<Vec<FaceMatch>, AnalyzerError> {
        if gallery.is_empty() {
            return Ok(Vec::new());
        }

        let small = downscale(frame, self.settings.scale_factor);
        let small = reorder_channels(small, analyzer.pixel_order());

        let boxes = analyzer.detect_faces(&small)?;
        if boxes.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = analyzer.encode_faces(&small, &boxes)?;
        if embeddings.len() != boxes.len() {
            tracing::debug!(boxes = boxes.len(), embeddings = embeddings.len(), "encoder dropped faces");
        }

        let scale_up = 1.0 / self.settings.scale_factor;
        let results = boxes
            .iter()
            .zip(embeddings.iter())
            .map(|(bbox, embedding)| {
                let resolved = self.matcher.compare(embedding, gallery, self.settings.tolerance);
                tracing::trace!(identity = %resolved.identity, distance = ?resolved.distance, "face resolved");
                FaceMatch {
                    identity: resolved.identity,
                    confidence: resolved.confidence,
                    rect: scale_to_frame(bbox, scale_up, frame.width(), frame.height()),
                }
            })
            .collect();

        Ok(results)
    }
}

/// Resize by a linear factor, keeping at least one pixel per axis.
pub fn downscale(frame: &RgbImage, factor: f32) -> RgbImage {
    let w = ((frame.width() as f32 * factor).round() as u32).max(1);
    let h = ((frame.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(frame, w, h, FilterType::Triangle)
}

/// Convert an RGB image into the channel order a backend expects.
pub fn reorder_channels(mut image: RgbImage, order: PixelOrder) -> RgbImage {
    if order == PixelOrder::Bgr {
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
    }
    image
}

/// Scale a box from the downscaled image back up and clamp it inside the frame.
fn scale_to_frame(bbox: &BoundingBox, scale_up: f32, width: u32, height: u32) -> FaceRect {
    let max_x = width.saturating_sub(1) as f32;
    let max_y = height.saturating_sub(1) as f32;
    let fit = |v: f32, max: f32| (v * scale_up).round().clamp(0.0, max) as u32;

    let (left, right) = (fit(bbox.left, max_x), fit(bbox.right, max_x));
    let (top, bottom) = (fit(bbox.top, max_y), fit(bbox.bottom, max_y));
    FaceRect {
        left: left.min(right),
        top: top.min(bottom),
        right: left.max(right),
        bottom: top.max(bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::GalleryEntry;
    use image::Rgb;

    /// Returns fixed boxes and embeddings, remembering the image it was shown.
    struct ScriptedAnalyzer {
        order: PixelOrder,
        boxes: Vec<BoundingBox>,
        embeddings: Vec<Embedding>,
        seen: Option<RgbImage>,
    }

    impl ScriptedAnalyzer {
        fn new(boxes: Vec<BoundingBox>, embeddings: Vec<Embedding>) -> Self {
            Self { order: PixelOrder::Rgb, boxes, embeddings, seen: None }
        }
    }

    impl FaceAnalyzer for ScriptedAnalyzer {
        fn pixel_order(&self) -> PixelOrder {
            self.order
        }

        fn detect_faces(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            self.seen = Some(image.clone());
            Ok(self.boxes.clone())
        }

        fn encode_faces(
            &mut self,
            _image: &RgbImage,
            boxes: &[BoundingBox],
        ) -> Result<Vec<Embedding>, AnalyzerError> {
            Ok(self.embeddings.iter().take(boxes.len()).cloned().collect())
        }
    }

    fn bbox(left: f32, top: f32, right: f32, bottom: f32) -> BoundingBox {
        BoundingBox { left, top, right, bottom, confidence: 0.9, landmarks: None }
    }

    fn alice_gallery() -> Gallery {
        Gallery::from_entries(vec![GalleryEntry {
            name: "Alice".into(),
            embedding: Embedding::new(vec![0.0, 0.0]),
        }])
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(640, 480, Rgb([200, 10, 10]))
    }

    #[test]
    fn test_close_match_is_known() {
        let r = EuclideanMatcher.compare(&Embedding::new(vec![0.1, 0.0]), &alice_gallery(), 0.5);
        assert_eq!(r.identity, Identity::Known("Alice".into()));
        assert!((r.confidence - 0.9).abs() < 1e-6, "confidence = {}", r.confidence);
    }

    #[test]
    fn test_far_match_is_unknown() {
        let r = EuclideanMatcher.compare(&Embedding::new(vec![0.7, 0.0]), &alice_gallery(), 0.5);
        assert_eq!(r.identity, Identity::Unknown);
        assert_eq!(r.confidence, 0.0);
        assert!((r.distance.unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_exact_tolerance_is_unknown() {
        let r = EuclideanMatcher.compare(&Embedding::new(vec![0.5, 0.0]), &alice_gallery(), 0.5);
        assert_eq!(r.identity, Identity::Unknown);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn test_nearest_entry_wins() {
        let gallery = Gallery::from_entries(vec![
            GalleryEntry { name: "Far".into(), embedding: Embedding::new(vec![0.4, 0.0]) },
            GalleryEntry { name: "Near".into(), embedding: Embedding::new(vec![0.05, 0.0]) },
        ]);
        let r = EuclideanMatcher.compare(&Embedding::new(vec![0.0, 0.0]), &gallery, 0.5);
        assert_eq!(r.identity, Identity::Known("Near".into()));
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let r = EuclideanMatcher.compare(&Embedding::new(vec![0.0]), &Gallery::default(), 0.5);
        assert_eq!(r.identity, Identity::Unknown);
        assert_eq!(r.distance, None);
    }

    #[test]
    fn test_process_scales_boxes_back() {
        let mut analyzer = ScriptedAnalyzer::new(
            vec![bbox(10.0, 20.0, 30.0, 40.0)],
            vec![Embedding::new(vec![0.1, 0.0])],
        );
        let results = FrameMatcher::new(MatchSettings::default())
            .process(&frame(), &alice_gallery(), &mut analyzer)
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rect, FaceRect { left: 50, top: 100, right: 150, bottom: 200 });
        assert_eq!(results[0].identity, Identity::Known("Alice".into()));
        let seen = analyzer.seen.unwrap();
        assert_eq!(seen.dimensions(), (128, 96));
    }

    #[test]
    fn test_process_boxes_stay_inside_frame() {
        let mut analyzer = ScriptedAnalyzer::new(
            vec![bbox(-4.0, -2.0, 20.0, 20.0), bbox(100.0, 80.0, 140.0, 110.0)],
            vec![Embedding::new(vec![0.9, 0.0]), Embedding::new(vec![0.9, 0.0])],
        );
        let results = FrameMatcher::new(MatchSettings::default())
            .process(&frame(), &alice_gallery(), &mut analyzer)
            .unwrap();

        assert_eq!(results.len(), 2);
        for r in &results {
            assert!(r.rect.left <= r.rect.right && r.rect.right < 640, "{:?}", r.rect);
            assert!(r.rect.top <= r.rect.bottom && r.rect.bottom < 480, "{:?}", r.rect);
        }
        assert_eq!(results[0].rect.left, 0);
        assert_eq!(results[1].rect.right, 639);
        assert_eq!(results[1].rect.bottom, 479);
    }

    #[test]
    fn test_process_no_faces() {
        let mut analyzer = ScriptedAnalyzer::new(vec![], vec![]);
        let results = FrameMatcher::new(MatchSettings::default())
            .process(&frame(), &alice_gallery(), &mut analyzer)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_process_encoder_drops_trailing_box() {
        let mut analyzer = ScriptedAnalyzer::new(
            vec![bbox(1.0, 1.0, 5.0, 5.0), bbox(50.0, 50.0, 60.0, 60.0)],
            vec![Embedding::new(vec![0.1, 0.0])],
        );
        let results = FrameMatcher::new(MatchSettings::default())
            .process(&frame(), &alice_gallery(), &mut analyzer)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rect.left, 5);
    }

    #[test]
    fn test_process_converts_to_backend_channel_order() {
        let mut analyzer = ScriptedAnalyzer::new(vec![], vec![]);
        analyzer.order = PixelOrder::Bgr;
        FrameMatcher::new(MatchSettings::default())
            .process(&frame(), &alice_gallery(), &mut analyzer)
            .unwrap();
        assert_eq!(analyzer.seen.unwrap().get_pixel(3, 3).0, [10, 10, 200]);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let gallery = alice_gallery();
        for d in [0.0f32, 0.1, 0.25, 0.49, 0.5, 0.8, 3.0] {
            let r = EuclideanMatcher.compare(&Embedding::new(vec![d, 0.0]), &gallery, 0.5);
            assert!((0.0..=1.0).contains(&r.confidence), "d={d} conf={}", r.confidence);
            assert_eq!(r.identity.is_known(), d < 0.5, "d={d}");
        }
    }
}
