//! One attendance run: startup, the capture/render loop, and shutdown.

use crate::display::Display;
use crate::overlay;
use chrono::Local;
use rollcall_core::ledger::{self, AttendanceLedger, LedgerError};
use rollcall_core::{EnrollmentSource, FaceAnalyzer, FaceMatch, FrameMatcher, Gallery, SkippedEntry};
use rollcall_hw::{CameraError, FrameSource};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const WINDOW_NAME: &str = "Face Recognition System";
const KEY_POLL: Duration = Duration::from_millis(1);
/// Undecodable frames in a row before the device is treated as gone.
const MAX_CONSECUTIVE_BAD_FRAMES: u32 = 30;

/// Exit status when no usable reference faces or models are available.
pub const EXIT_NO_GALLERY: u8 = 2;
/// Exit status for unexpected I/O failures, such as the CSV file.
pub const EXIT_IO: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    Interrupted,
    CameraFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Frames read and shown.
    pub frames: u64,
    /// Frames handed to the matcher.
    pub processed: u64,
    /// Frames dropped because they could not be decoded.
    pub dropped: u64,
    pub recognized: usize,
    pub stop_reason: StopReason,
}

/// Why startup ended before the capture loop.
#[derive(Error, Debug)]
pub enum Halt {
    #[error("no face data loaded")]
    EmptyGallery,
    #[error("interrupted during startup")]
    Interrupted,
    #[error("could not open camera: {0}")]
    Camera(#[source] CameraError),
    #[error("could not create attendance file: {0}")]
    Ledger(#[source] LedgerError),
}

impl Halt {
    /// Process exit status for this halt. Only a missing gallery and I/O
    /// failures are non-zero.
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::EmptyGallery => EXIT_NO_GALLERY,
            Self::Ledger(_) => EXIT_IO,
            Self::Interrupted | Self::Camera(_) => 0,
        }
    }
}

/// Loop parameters that are not owned resources.
pub struct SessionOptions {
    pub process_every: u32,
    pub quit_key: char,
    pub stop: Arc<AtomicBool>,
}

/// `Warning: ...` line printed for a gallery entry that could not be enrolled.
pub fn skip_warning(entry: &SkippedEntry) -> String {
    format!("Warning: Could not load {}: {}", entry.source.image.display(), entry.error)
}

pub fn print_summary(recognized: usize) {
    println!("Session ended. {recognized} people recognized.");
}

/// One run: owns the camera, preview, ledger and matcher for its lifetime.
///
/// Resources are released by [`shutdown`](Self::shutdown), which also runs
/// on drop so an unwinding loop still closes the camera and the CSV file.
pub struct Session<C: FrameSource, A: FaceAnalyzer, D: Display, W: Write> {
    camera: C,
    analyzer: A,
    display: D,
    ledger: Option<AttendanceLedger<W>>,
    gallery: Gallery,
    matcher: FrameMatcher,
    options: SessionOptions,
    state: SessionState,
    recognized: usize,
    last_results: Vec<FaceMatch>,
}

impl<C: FrameSource, A: FaceAnalyzer, D: Display, W: Write> Session<C, A, D, W> {
    /// Enroll the gallery, then open the camera and the attendance file.
    ///
    /// Halts before touching the camera or the file when nothing could be
    /// enrolled or the stop flag is already set. The camera is released
    /// again if a later step halts.
    pub fn start<OC, OL>(
        sources: &[EnrollmentSource],
        mut analyzer: A,
        open_camera: OC,
        open_ledger: OL,
        display: D,
        matcher: FrameMatcher,
        options: SessionOptions,
    ) -> Result<Self, Halt>
    where
        OC: FnOnce() -> Result<C, CameraError>,
        OL: FnOnce() -> Result<AttendanceLedger<W>, LedgerError>,
    {
        let (gallery, skipped) = Gallery::load(sources, &mut analyzer);
        for entry in &skipped {
            eprintln!("{}", skip_warning(entry));
        }
        if gallery.ensure_not_empty().is_err() {
            println!("No face data loaded. Exiting.");
            return Err(Halt::EmptyGallery);
        }
        tracing::info!(
            people = ?gallery.names().collect::<Vec<_>>(),
            skipped = skipped.len(),
            "gallery ready"
        );

        if options.stop.load(Ordering::SeqCst) {
            return Err(Halt::Interrupted);
        }
        let mut camera = open_camera().map_err(Halt::Camera)?;

        if options.stop.load(Ordering::SeqCst) {
            camera.release();
            return Err(Halt::Interrupted);
        }
        let ledger = match open_ledger() {
            Ok(ledger) => ledger,
            Err(e) => {
                camera.release();
                return Err(Halt::Ledger(e));
            }
        };

        Ok(Self::new(camera, analyzer, display, ledger, gallery, matcher, options))
    }

    fn new(
        camera: C,
        analyzer: A,
        display: D,
        ledger: AttendanceLedger<W>,
        gallery: Gallery,
        matcher: FrameMatcher,
        options: SessionOptions,
    ) -> Self {
        Self {
            camera,
            analyzer,
            display,
            ledger: Some(ledger),
            gallery,
            matcher,
            options: SessionOptions {
                process_every: options.process_every.max(1),
                ..options
            },
            state: SessionState::Running,
            recognized: 0,
            last_results: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Run until the quit key, an interrupt, or a camera failure, then shut down.
    pub fn run(&mut self) -> SessionReport {
        let mut frames = 0u64;
        let mut processed = 0u64;
        let mut dropped = 0u64;
        let mut bad_in_a_row = 0u32;

        let stop_reason = loop {
            let frame = match self.camera.read_frame() {
                Ok(frame) => {
                    bad_in_a_row = 0;
                    frame
                }
                Err(e) if e.is_transient() && bad_in_a_row < MAX_CONSECUTIVE_BAD_FRAMES => {
                    bad_in_a_row += 1;
                    dropped += 1;
                    tracing::warn!(error = %e, "skipping unreadable frame");
                    if self.options.stop.load(Ordering::SeqCst) {
                        break StopReason::Interrupted;
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame read failed, stopping");
                    break StopReason::CameraFailure(e.to_string());
                }
            };
            frames += 1;

            if frames % u64::from(self.options.process_every) == 0 {
                processed += 1;
                self.process(&frame.image, frame.sequence);
            }

            let drawn = overlay::render(&self.last_results, self.recognized);
            if let Err(e) = self.display.show(WINDOW_NAME, &frame.image, &drawn) {
                tracing::warn!(error = %e, "failed to show frame");
            }

            match self.display.poll_key(KEY_POLL) {
                Ok(Some(key)) if key == self.options.quit_key => break StopReason::QuitKey,
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "key poll failed"),
            }
            if self.options.stop.load(Ordering::SeqCst) {
                break StopReason::Interrupted;
            }
        };

        tracing::info!(frames, processed, dropped, reason = ?stop_reason, "capture loop finished");
        self.shutdown();

        SessionReport {
            frames,
            processed,
            dropped,
            recognized: self.recognized,
            stop_reason,
        }
    }

    /// Match one frame, credit attendance, and cache the results for the overlay.
    fn process(&mut self, image: &image::RgbImage, sequence: u32) {
        let results = match self.matcher.process(image, &self.gallery, &mut self.analyzer) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(sequence, error = %e, "frame analysis failed");
                return;
            }
        };

        if let Some(ledger) = self.ledger.as_mut() {
            for result in &results {
                let time = ledger::time_of_day(Local::now());
                match ledger.record(&result.identity, &time) {
                    Ok(Some(record)) => println!("Attendance: {} at {}", record.name, record.time),
                    Ok(None) => {}
                    Err(LedgerError::Flush { record, source }) => {
                        println!("Attendance: {} at {}", record.name, record.time);
                        tracing::warn!(name = %record.name, error = %source, "attendance row not flushed yet");
                    }
                    Err(e) => tracing::error!(identity = %result.identity, error = %e, "failed to record attendance"),
                }
            }
            self.recognized = ledger.count();
        }

        self.last_results = results;
    }

    /// Release the camera, close the preview and the CSV file, print the summary.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.transition(SessionState::Stopping);

        self.camera.release();
        self.display.destroy_all();
        if let Some(ledger) = self.ledger.take() {
            let path = ledger.path().map(|p| p.display().to_string());
            match ledger.into_inner() {
                Ok(writer) => drop(writer),
                Err(e) => tracing::error!(error = %e, "failed to flush attendance file"),
            }
            tracing::info!(path = ?path, "attendance file closed");
        }

        self.transition(SessionState::Stopped);
        print_summary(self.recognized);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}

impl<C: FrameSource, A: FaceAnalyzer, D: Display, W: Write> Drop for Session<C, A, D, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayError;
    use crate::overlay::Overlay;
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};
    use rollcall_core::gallery::GalleryEntry;
    use rollcall_core::{AnalyzerError, BoundingBox, Embedding, MatchSettings, PixelOrder};
    use rollcall_hw::{CaptureSettings, Frame, FrameError};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::fs::File;
    use std::io::BufWriter;
    use std::ops::Range;
    use std::path::{Path, PathBuf};

    /// Serves `frames_before_failure` good frames, then fails every read.
    /// Reads whose 1-based index falls in `corrupt` return an undecodable buffer.
    struct ScriptedCamera {
        frames_before_failure: u32,
        corrupt: Range<u32>,
        reads: u32,
        served: u32,
        released: bool,
    }

    impl ScriptedCamera {
        fn new(frames_before_failure: u32) -> Self {
            Self { frames_before_failure, corrupt: 0..0, reads: 0, served: 0, released: false }
        }
    }

    impl FrameSource for ScriptedCamera {
        fn configure(&mut self, _settings: &CaptureSettings) -> Result<(), CameraError> {
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Frame, CameraError> {
            self.reads += 1;
            if self.corrupt.contains(&self.reads) {
                return Err(FrameError::InvalidLength { expected: 64 * 48 * 2, actual: 17 }.into());
            }
            if self.served >= self.frames_before_failure {
                return Err(CameraError::CaptureFailed("device unplugged".into()));
            }
            self.served += 1;
            Ok(Frame {
                image: RgbImage::from_pixel(64, 48, Rgb([90, 90, 90])),
                sequence: self.served,
            })
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    /// Finds one face per frame whose embedding sits `distance` from the origin.
    struct OneFace {
        distance: f32,
        calls: u32,
    }

    impl FaceAnalyzer for OneFace {
        fn pixel_order(&self) -> PixelOrder {
            PixelOrder::Rgb
        }

        fn detect_faces(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            self.calls += 1;
            Ok(vec![BoundingBox {
                left: 1.0, top: 1.0, right: 6.0, bottom: 6.0,
                confidence: 0.9, landmarks: None,
            }])
        }

        fn encode_faces(
            &mut self,
            _image: &RgbImage,
            boxes: &[BoundingBox],
        ) -> Result<Vec<Embedding>, AnalyzerError> {
            Ok(boxes.iter().map(|_| Embedding::new(vec![self.distance, 0.0])).collect())
        }
    }

    /// Records caption texts and replays scripted key presses.
    #[derive(Default)]
    struct RecordingDisplay {
        captions_per_frame: Vec<Vec<String>>,
        keys: VecDeque<Option<char>>,
        destroyed: bool,
    }

    impl Display for RecordingDisplay {
        fn show(&mut self, window: &str, _frame: &RgbImage, overlay: &Overlay) -> Result<(), DisplayError> {
            assert_eq!(window, WINDOW_NAME);
            self.captions_per_frame
                .push(overlay.captions.iter().map(|c| c.text.clone()).collect());
            Ok(())
        }

        fn poll_key(&mut self, _timeout: Duration) -> Result<Option<char>, DisplayError> {
            Ok(self.keys.pop_front().flatten())
        }

        fn destroy_all(&mut self) {
            self.destroyed = true;
        }
    }

    fn alice() -> Gallery {
        Gallery::from_entries(vec![GalleryEntry {
            name: "Alice".into(),
            embedding: Embedding::new(vec![0.0, 0.0]),
        }])
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rollcall-session-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn create_ledger(dir: &Path) -> Result<AttendanceLedger<BufWriter<File>>, LedgerError> {
        let now = Local.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        AttendanceLedger::create(dir, now)
    }

    fn options(stop: Arc<AtomicBool>) -> SessionOptions {
        SessionOptions { process_every: 2, quit_key: 'q', stop }
    }

    fn session(
        camera: ScriptedCamera,
        distance: f32,
        display: RecordingDisplay,
        stop: Arc<AtomicBool>,
    ) -> (Session<ScriptedCamera, OneFace, RecordingDisplay, BufWriter<File>>, PathBuf) {
        let ledger = create_ledger(&temp_dir()).unwrap();
        let path = ledger.path().unwrap().to_path_buf();
        let session = Session::new(
            camera,
            OneFace { distance, calls: 0 },
            display,
            ledger,
            alice(),
            FrameMatcher::new(MatchSettings::default()),
            options(stop),
        );
        (session, path)
    }

    fn data_rows(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    fn csv_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "csv"))
            .count()
    }

    fn reference_photo(dir: &Path) -> PathBuf {
        let path = dir.join("alice.png");
        RgbImage::from_pixel(8, 8, Rgb([200, 150, 120])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_unreadable_gallery_halts_before_camera_and_file() {
        let dir = temp_dir();
        let sources = vec![
            EnrollmentSource::new(dir.join("missing-a.jpg"), "A"),
            EnrollmentSource::new(dir.join("missing-b.jpg"), "B"),
        ];
        let camera_opened = Cell::new(false);

        let result = Session::start(
            &sources,
            OneFace { distance: 0.0, calls: 0 },
            || {
                camera_opened.set(true);
                Ok(ScriptedCamera::new(1))
            },
            || create_ledger(&dir),
            RecordingDisplay::default(),
            FrameMatcher::new(MatchSettings::default()),
            options(Arc::new(AtomicBool::new(false))),
        );

        let halt = result.err().unwrap();
        assert!(matches!(halt, Halt::EmptyGallery), "halt: {halt:?}");
        assert_eq!(halt.exit_status(), 2);
        assert!(!camera_opened.get());
        assert_eq!(csv_files(&dir), 0);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_skipped_entry_warns_and_run_proceeds() {
        let dir = temp_dir();
        let missing = dir.join("missing.jpg");
        let sources = vec![
            EnrollmentSource::new(&missing, "Ghost"),
            EnrollmentSource::new(reference_photo(&dir), "Alice"),
        ];

        let (_, skipped) = Gallery::load(&sources, &mut OneFace { distance: 0.0, calls: 0 });
        assert_eq!(skipped.len(), 1);
        let warning = skip_warning(&skipped[0]);
        assert!(warning.starts_with("Warning: Could not load "), "{warning}");
        assert!(warning.contains("missing.jpg"), "{warning}");

        let session = Session::start(
            &sources,
            OneFace { distance: 0.0, calls: 0 },
            || Ok(ScriptedCamera::new(1)),
            || create_ledger(&dir),
            RecordingDisplay::default(),
            FrameMatcher::new(MatchSettings::default()),
            options(Arc::new(AtomicBool::new(false))),
        )
        .unwrap();
        assert_eq!(session.gallery.len(), 1);
        assert_eq!(session.state(), SessionState::Running);
        drop(session);
        assert_eq!(csv_files(&dir), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_interrupt_during_startup_opens_nothing() {
        let dir = temp_dir();
        let sources = vec![EnrollmentSource::new(reference_photo(&dir), "Alice")];
        let camera_opened = Cell::new(false);

        let result = Session::start(
            &sources,
            OneFace { distance: 0.0, calls: 0 },
            || {
                camera_opened.set(true);
                Ok(ScriptedCamera::new(1))
            },
            || create_ledger(&dir),
            RecordingDisplay::default(),
            FrameMatcher::new(MatchSettings::default()),
            options(Arc::new(AtomicBool::new(true))),
        );

        let halt = result.err().unwrap();
        assert!(matches!(halt, Halt::Interrupted), "halt: {halt:?}");
        assert_eq!(halt.exit_status(), 0);
        assert!(!camera_opened.get());
        assert_eq!(csv_files(&dir), 0);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_camera_open_failure_creates_no_file() {
        let dir = temp_dir();
        let sources = vec![EnrollmentSource::new(reference_photo(&dir), "Alice")];

        let result = Session::<ScriptedCamera, _, _, _>::start(
            &sources,
            OneFace { distance: 0.0, calls: 0 },
            || Err(CameraError::DeviceNotFound("/dev/video9".into())),
            || create_ledger(&dir),
            RecordingDisplay::default(),
            FrameMatcher::new(MatchSettings::default()),
            options(Arc::new(AtomicBool::new(false))),
        );

        let halt = result.err().unwrap();
        assert!(matches!(halt, Halt::Camera(CameraError::DeviceNotFound(_))), "halt: {halt:?}");
        assert_eq!(halt.exit_status(), 0);
        assert_eq!(csv_files(&dir), 0);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_camera_failure_on_fifth_read_shuts_down() {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut s, path) = session(ScriptedCamera::new(4), 0.1, RecordingDisplay::default(), stop);

        let report = s.run();

        assert!(matches!(report.stop_reason, StopReason::CameraFailure(_)));
        assert_eq!(report.frames, 4);
        assert_eq!(report.processed, 2);
        assert_eq!(report.recognized, 1);
        assert_eq!(s.state(), SessionState::Stopped);
        assert!(s.camera().released);
        assert!(s.display().destroyed);

        let rows = data_rows(&path);
        assert_eq!(rows.len(), 1, "rows: {rows:?}");
        assert!(rows[0].starts_with("Alice,"), "row: {}", rows[0]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_frame_is_skipped() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut camera = ScriptedCamera::new(4);
        camera.corrupt = 2..3;
        let (mut s, path) = session(camera, 0.1, RecordingDisplay::default(), stop);

        let report = s.run();

        assert!(matches!(report.stop_reason, StopReason::CameraFailure(_)));
        assert_eq!(report.frames, 4);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.processed, 2);
        assert_eq!(report.recognized, 1);
        assert_eq!(s.display().captions_per_frame.len(), 4);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_endless_corrupt_frames_stop_session() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut camera = ScriptedCamera::new(100);
        camera.corrupt = 1..1000;
        let (mut s, path) = session(camera, 0.1, RecordingDisplay::default(), stop);

        let report = s.run();

        assert!(matches!(report.stop_reason, StopReason::CameraFailure(_)));
        assert_eq!(report.frames, 0);
        assert_eq!(report.dropped, u64::from(MAX_CONSECUTIVE_BAD_FRAMES));
        assert!(s.camera().released);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_recognized_once_across_many_frames() {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut s, path) = session(ScriptedCamera::new(20), 0.1, RecordingDisplay::default(), stop);

        let report = s.run();
        assert_eq!(report.processed, 10);
        assert_eq!(report.recognized, 1);
        assert_eq!(data_rows(&path).len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_unknown_face_writes_nothing() {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut s, path) = session(ScriptedCamera::new(6), 0.7, RecordingDisplay::default(), stop);

        let report = s.run();
        assert_eq!(report.recognized, 0);
        assert!(data_rows(&path).is_empty());
        let last = s.display().captions_per_frame.last().unwrap();
        assert_eq!(last, &vec!["Unknown".to_string(), "Recognized: 0".to_string()]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_results_cached_between_processed_frames() {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut s, path) = session(ScriptedCamera::new(3), 0.1, RecordingDisplay::default(), stop);

        s.run();
        let shown = &s.display().captions_per_frame;
        assert_eq!(shown.len(), 3);
        // Frame 1 is not processed; frame 2 is; frame 3 reuses frame 2's results.
        assert_eq!(shown[0], vec!["Recognized: 0".to_string()]);
        assert_eq!(shown[1], vec!["Alice (0.90)".to_string(), "Recognized: 1".to_string()]);
        assert_eq!(shown[2], shown[1]);
        assert_eq!(s.analyzer.calls, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_quit_key_stops_loop() {
        let stop = Arc::new(AtomicBool::new(false));
        let display = RecordingDisplay {
            keys: VecDeque::from(vec![None, Some('x'), Some('q')]),
            ..Default::default()
        };
        let (mut s, path) = session(ScriptedCamera::new(100), 0.1, display, stop);

        let report = s.run();
        assert_eq!(report.stop_reason, StopReason::QuitKey);
        assert_eq!(report.frames, 3);
        assert!(s.camera().released);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_interrupt_checked_after_render() {
        let stop = Arc::new(AtomicBool::new(true));
        let (mut s, path) = session(ScriptedCamera::new(100), 0.1, RecordingDisplay::default(), stop);

        let report = s.run();
        assert_eq!(report.stop_reason, StopReason::Interrupted);
        assert_eq!(report.frames, 1);
        assert_eq!(s.display().captions_per_frame.len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_drop_without_run_releases_resources() {
        let stop = Arc::new(AtomicBool::new(false));
        let (mut s, path) = session(ScriptedCamera::new(1), 0.1, RecordingDisplay::default(), stop);
        s.shutdown();
        s.shutdown();
        assert!(s.camera().released);
        assert_eq!(s.state(), SessionState::Stopped);
        drop(s);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Time\n");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
