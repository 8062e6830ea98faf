//! Reference gallery: one embedding per enrolled person.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::matcher::reorder_channels;
use crate::types::Embedding;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("image not found: {0}")]
    NotFound(PathBuf),
    #[error("could not read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("no face found in {0}")]
    NoFace(PathBuf),
    #[error("analysis failed for {path}: {source}")]
    Analyzer {
        path: PathBuf,
        source: AnalyzerError,
    },
    #[error("no reference faces could be loaded")]
    Empty,
}

/// A reference photo and the display name it enrolls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnrollmentSource {
    pub image: PathBuf,
    pub name: String,
}

impl EnrollmentSource {
    pub fn new(image: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub name: String,
    pub embedding: Embedding,
}

/// An enrollment source that failed to load.
#[derive(Debug)]
pub struct SkippedEntry {
    pub source: EnrollmentSource,
    pub error: GalleryError,
}

/// Immutable set of enrolled faces, built once per run.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn from_entries(entries: Vec<GalleryEntry>) -> Self {
        Self { entries }
    }

    /// Enroll every source that yields a face; the rest are reported, not fatal.
    ///
    /// When a reference photo holds several faces the detector's first one wins.
    pub fn load<A: FaceAnalyzer + ?Sized>(
        sources: &[EnrollmentSource],
        analyzer: &mut A,
    ) -> (Self, Vec<SkippedEntry>) {
        let mut entries = Vec::with_capacity(sources.len());
        let mut skipped = Vec::new();

        for source in sources {
            match enroll_one(&source.image, analyzer) {
                Ok(embedding) => {
                    tracing::info!(name = %source.name, path = %source.image.display(), "enrolled");
                    entries.push(GalleryEntry {
                        name: source.name.clone(),
                        embedding,
                    });
                }
                Err(error) => {
                    tracing::warn!(path = %source.image.display(), %error, "skipping gallery entry");
                    skipped.push(SkippedEntry {
                        source: source.clone(),
                        error,
                    });
                }
            }
        }

        (Self { entries }, skipped)
    }

    /// Fail with [`GalleryError::Empty`] when nothing was enrolled.
    pub fn ensure_not_empty(&self) -> Result<(), GalleryError> {
        if self.entries.is_empty() {
            Err(GalleryError::Empty)
        } else {
            Ok(())
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn enroll_one<A: FaceAnalyzer + ?Sized>(path: &Path, analyzer: &mut A) -> Result<Embedding, GalleryError> {
    if !path.exists() {
        return Err(GalleryError::NotFound(path.to_path_buf()));
    }

    let image = image::open(path)
        .map_err(|source| GalleryError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    let image = reorder_channels(image, analyzer.pixel_order());

    let analyzer_err = |source| GalleryError::Analyzer {
        path: path.to_path_buf(),
        source,
    };
    let boxes = analyzer.detect_faces(&image).map_err(analyzer_err)?;
    let Some(first) = boxes.first() else {
        return Err(GalleryError::NoFace(path.to_path_buf()));
    };

    analyzer
        .encode_faces(&image, std::slice::from_ref(first))
        .map_err(analyzer_err)?
        .into_iter()
        .next()
        .ok_or_else(|| GalleryError::NoFace(path.to_path_buf()))
}
