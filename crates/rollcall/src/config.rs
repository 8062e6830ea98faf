use rollcall_core::matcher::{DEFAULT_SCALE_FACTOR, DEFAULT_TOLERANCE};
use rollcall_core::{EnrollmentSource, MatchSettings};
use rollcall_hw::CaptureSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reference photos enrolled when no gallery file is configured.
const DEFAULT_GALLERY: &[(&str, &str)] = &[
    ("faces/satwik.jpg", "M. Satwik Rao"),
    ("faces/newton.jpg", "Newton Mishra"),
    ("faces/aniketh.jpg", "Aniketh Kumar Yadav"),
    ("faces/pragg.jpg", "Pragyanshu Priyadarshi Padhy"),
    ("faces/k.vashishta.jpg", "K. Vishishta"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read gallery file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid gallery file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Gallery file layout: a list of `[[person]]` tables.
#[derive(Debug, Deserialize)]
struct GalleryFile {
    #[serde(rename = "person", default)]
    people: Vec<EnrollmentSource>,
}

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Camera index, opened as `/dev/video<N>` (default: 0).
    pub camera_index: usize,
    pub capture: CaptureSettings,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory the attendance CSV is written to.
    pub output_dir: PathBuf,
    pub matching: MatchSettings,
    /// Run the matcher on every Nth frame (default: 2).
    pub process_every: u32,
    /// Optional TOML gallery replacing the built-in table.
    pub gallery_file: Option<PathBuf>,
    /// Skip the preview window even when built with `gui`.
    pub headless: bool,
    pub quit_key: char,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CaptureSettings::default();

        let scale_factor = parse_or(&var, "ROLLCALL_SCALE_FACTOR", DEFAULT_SCALE_FACTOR);
        let scale_factor = if scale_factor > 0.0 && scale_factor <= 1.0 {
            scale_factor
        } else {
            tracing::warn!(scale_factor, "scale factor must be in (0, 1], using default");
            DEFAULT_SCALE_FACTOR
        };
        let tolerance = parse_or(&var, "ROLLCALL_TOLERANCE", DEFAULT_TOLERANCE);
        let tolerance = if tolerance > 0.0 { tolerance } else { DEFAULT_TOLERANCE };

        Self {
            camera_index: parse_or(&var, "ROLLCALL_CAMERA_INDEX", 0),
            capture: CaptureSettings {
                fps: parse_or(&var, "ROLLCALL_FPS", defaults.fps),
                width: parse_or(&var, "ROLLCALL_WIDTH", defaults.width),
                height: parse_or(&var, "ROLLCALL_HEIGHT", defaults.height),
                buffer_depth: parse_or(&var, "ROLLCALL_BUFFER_DEPTH", defaults.buffer_depth),
            },
            model_dir: var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(rollcall_core::default_model_dir),
            output_dir: var("ROLLCALL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            matching: MatchSettings {
                scale_factor,
                tolerance,
            },
            process_every: parse_or(&var, "ROLLCALL_PROCESS_EVERY", 2u32).max(1),
            gallery_file: var("ROLLCALL_GALLERY").map(PathBuf::from),
            headless: var("ROLLCALL_HEADLESS").is_some_and(|v| v != "0"),
            quit_key: var("ROLLCALL_QUIT_KEY")
                .and_then(|v| v.chars().next())
                .unwrap_or('q'),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// The people to enroll: the gallery file if configured, else the built-in table.
    pub fn enrollment_sources(&self) -> Result<Vec<EnrollmentSource>, ConfigError> {
        match &self.gallery_file {
            Some(path) => load_gallery_file(path),
            None => Ok(DEFAULT_GALLERY
                .iter()
                .map(|&(image, name)| EnrollmentSource::new(image, name))
                .collect()),
        }
    }
}

/// Parse a gallery file. Relative image paths resolve against the file's directory.
fn load_gallery_file(path: &Path) -> Result<Vec<EnrollmentSource>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: GalleryFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(file
        .people
        .into_iter()
        .map(|person| EnrollmentSource {
            image: base.join(person.image),
            name: person.name,
        })
        .collect())
}

fn parse_or<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
