//! rollcall-core: face matching and attendance bookkeeping.
//!
//! Detection (SCRFD) and embedding (ArcFace) run via ONNX Runtime behind the
//! [`FaceAnalyzer`] seam; the gallery, frame matcher and ledger sit on top.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod gallery;
pub mod ledger;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use gallery::{EnrollmentSource, Gallery, GalleryError, SkippedEntry};
pub use ledger::{AttendanceLedger, AttendanceRecord, LedgerError};
pub use matcher::{EuclideanMatcher, FaceMatch, FrameMatcher, MatchResult, MatchSettings, Matcher};
pub use types::{BoundingBox, Embedding, FaceRect, Identity, PixelOrder};

use std::path::PathBuf;

/// Default model directory: `$XDG_DATA_HOME/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall/models")
}
