//! Batch runner: stamp every image under a source tree into a mirrored destination tree

use crate::compositor::Watermark;
use crate::error::{Result, WatermarkError};
use crate::fonts::FontResolver;
use crate::models::AnchorPosition;
use crate::profile::WatermarkProfile;
use crate::utils::{file, format, performance::Timer, validation};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Unique identifier for batch runs
pub type JobId = Uuid;

/// Encoder quality used unless configured otherwise
pub const DEFAULT_QUALITY: u8 = 100;

/// One batch run's parameters
#[derive(Debug, Clone, Serialize)]
pub struct BatchJob {
    pub id: JobId,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub recursive: bool,
    pub anchor: AnchorPosition,
    pub quality: u8,
}

impl BatchJob {
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_root: source_root.into(),
            destination_root: destination_root.into(),
            recursive: false,
            anchor: AnchorPosition::default(),
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn anchor(mut self, anchor: AnchorPosition) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

/// An image file found under the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    /// Format detected from the file's content
    pub format: ImageFormat,
}

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Written { target: PathBuf },
    SkippedUnreadable { reason: String },
    FailedToSave { target: Option<PathBuf>, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Summary of a finished (or stopped) batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: JobId,
    pub candidates: usize,
    pub files: Vec<FileReport>,
    /// Number of save failures
    pub failures: usize,
    /// Stopped by the cancellation flag
    pub cancelled: bool,
    /// Stopped because the observer chose to abort after a save failure
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn new(job_id: JobId, candidates: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            candidates,
            files: Vec::with_capacity(candidates),
            failures: 0,
            cancelled: false,
            aborted: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// No save failed
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::SkippedUnreadable { .. }))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Decision after a file could not be saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFailureAction {
    Continue,
    Abort,
}

/// Hooks for progress display and the continue-or-abort question
pub trait BatchObserver {
    fn on_start(&mut self, _job: &BatchJob, _total: usize) {}

    fn on_file(&mut self, _index: usize, _path: &Path) {}

    fn on_save_failure(&mut self, _target: &Path, _error: &WatermarkError) -> SaveFailureAction {
        SaveFailureAction::Continue
    }

    fn on_finish(&mut self, _report: &BatchReport) {}
}

/// Observer that keeps going after every failure
#[derive(Debug, Default)]
pub struct SilentObserver;

impl BatchObserver for SilentObserver {}

/// Runs batch jobs one file at a time
#[derive(Debug, Default)]
pub struct BatchRunner {
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an externally owned cancellation flag
    pub fn with_cancel_flag(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ask the running batch to stop before its next file
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Validate, prepare the watermark and process every candidate
    ///
    /// An invalid profile, a missing source directory or a watermark that
    /// cannot be prepared fail here before any file is touched.
    pub fn run(
        &self,
        job: &BatchJob,
        profile: &WatermarkProfile,
        fonts: &FontResolver,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchReport> {
        profile.validate()?;
        validation::validate_source_directory(&job.source_root)?;
        validation::validate_quality(job.quality)?;

        let watermark = Watermark::prepare(profile, fonts)?;
        info!(
            "Watermarking {} with profile '{}' ({})",
            job.source_root.display(),
            profile.name(),
            profile.kind()
        );
        self.run_prepared(job, &watermark, observer)
    }

    /// Process every candidate with an already prepared watermark
    #[instrument(skip_all, fields(job_id = %job.id))]
    pub fn run_prepared(
        &self,
        job: &BatchJob,
        watermark: &Watermark,
        observer: &mut dyn BatchObserver,
    ) -> Result<BatchReport> {
        validation::validate_source_directory(&job.source_root)?;

        let candidates = enumerate_candidates(&job.source_root, job.recursive);
        let mut report = BatchReport::new(job.id, candidates.len());
        observer.on_start(job, candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            if self.is_cancelled() {
                info!("Batch cancelled after {} of {} files", index, candidates.len());
                report.cancelled = true;
                break;
            }
            observer.on_file(index, &candidate.path);

            let _timer = Timer::new(format!("watermark {}", candidate.path.display()));
            debug!("Processing {}", candidate.path.display());

            let image = match decode(candidate) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Cannot load {}, skipping: {}", candidate.path.display(), e);
                    report.files.push(FileReport {
                        source: candidate.path.clone(),
                        outcome: FileOutcome::SkippedUnreadable {
                            reason: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let stamped = watermark.apply_to_image(&image, job.anchor);

            match write_output(job, candidate, &stamped) {
                Ok(target) => {
                    debug!("Saved {}", target.display());
                    report.files.push(FileReport {
                        source: candidate.path.clone(),
                        outcome: FileOutcome::Written { target },
                    });
                }
                Err((target, e)) => {
                    warn!("Failed to save {}: {}", candidate.path.display(), e);
                    report.failures += 1;
                    let action = observer
                        .on_save_failure(target.as_deref().unwrap_or(&candidate.path), &e);
                    report.files.push(FileReport {
                        source: candidate.path.clone(),
                        outcome: FileOutcome::FailedToSave {
                            target,
                            reason: e.to_string(),
                        },
                    });
                    if action == SaveFailureAction::Abort {
                        info!("Processing aborted after a save error");
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Batch finished: {} written, {} skipped, {} failed",
            report.written(),
            report.skipped(),
            report.failures
        );
        observer.on_finish(&report);
        Ok(report)
    }
}

/// Readable files under `root` whose content is a known image format
///
/// Without `recursive` only the root's direct children are considered;
/// with it the whole tree is walked, following symbolic links. Entries
/// are visited in file-name order.
pub fn enumerate_candidates(root: &Path, recursive: bool) -> Vec<Candidate> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(recursive)
        .sort_by_file_name();
    let walker = if recursive { walker } else { walker.max_depth(1) };

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !file::is_file_accessible(path) {
            continue;
        }

        match format::sniff_format(path) {
            Ok(Some(format)) => candidates.push(Candidate {
                path: path.to_path_buf(),
                format,
            }),
            Ok(None) => debug!("Ignored {}", path.display()),
            Err(e) => debug!("Ignored unreadable {}: {}", path.display(), e),
        }
    }

    candidates
}

/// Replace the leading `source_root` of `candidate` with `destination_root`
///
/// Plain string prefix substitution, first match only, anchored at the
/// start. Trailing separators on either root are ignored. Returns `None`
/// when the candidate does not start with the source root.
pub fn target_path(candidate: &Path, source_root: &Path, destination_root: &Path) -> Option<PathBuf> {
    let (Some(candidate_str), Some(source), Some(destination)) = (
        candidate.to_str(),
        source_root.to_str(),
        destination_root.to_str(),
    ) else {
        return candidate
            .strip_prefix(source_root)
            .ok()
            .map(|relative| destination_root.join(relative));
    };

    let source = trim_trailing_separators(source);
    let destination = trim_trailing_separators(destination);
    let rest = candidate_str.strip_prefix(source)?;

    let mut target = destination.to_string();
    let needs_separator = source.ends_with(std::path::is_separator)
        && !target.ends_with(std::path::is_separator)
        && !rest.is_empty();
    if needs_separator {
        target.push(MAIN_SEPARATOR);
    }
    target.push_str(rest);
    Some(PathBuf::from(target))
}

fn trim_trailing_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(std::path::is_separator);
    if trimmed.is_empty() && !path.is_empty() {
        // the filesystem root itself
        &path[..1]
    } else {
        trimmed
    }
}

fn decode(candidate: &Candidate) -> Result<DynamicImage> {
    let failed = |message: String| WatermarkError::DecodeFailed {
        path: candidate.path.clone(),
        message,
    };
    let file = File::open(&candidate.path).map_err(|e| failed(e.to_string()))?;
    image::load(BufReader::new(file), candidate.format).map_err(|e| failed(e.to_string()))
}

type SaveError = (Option<PathBuf>, WatermarkError);

fn write_output(
    job: &BatchJob,
    candidate: &Candidate,
    image: &DynamicImage,
) -> std::result::Result<PathBuf, SaveError> {
    let target = target_path(&candidate.path, &job.source_root, &job.destination_root)
        .ok_or_else(|| {
            (
                None,
                WatermarkError::SaveFailed {
                    path: candidate.path.clone(),
                    message: format!("not under source root {}", job.source_root.display()),
                },
            )
        })?;

    if let Some(parent) = target.parent() {
        file::ensure_directory_exists(parent).map_err(|e| (Some(target.clone()), e))?;
    }

    let output_format = format::output_format_for(&target, candidate.format);
    save_image(image, &target, output_format, job.quality).map_err(|e| {
        // leave no truncated file behind
        let _ = std::fs::remove_file(&target);
        (
            Some(target.clone()),
            WatermarkError::SaveFailed {
                path: target.clone(),
                message: e.to_string(),
            },
        )
    })?;

    Ok(target)
}

/// Encode `image` to `target`; JPEG uses the given quality
pub fn save_image(image: &DynamicImage, target: &Path, format: ImageFormat, quality: u8) -> Result<()> {
    let mut writer = BufWriter::new(File::create(target)?);

    match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode_image(&image.to_rgb8())?;
        }
        _ => image.write_to(&mut writer, format)?,
    }

    writer.flush()?;
    Ok(())
}
