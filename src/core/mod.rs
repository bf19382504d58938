// imgbatch/src/core/mod.rs
pub mod operation;
pub mod processor;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// The fixed set of containers the tool reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedFormat {
    Jpg,
    Png,
    Bmp,
}

impl SupportedFormat {
    pub const ALL: [SupportedFormat; 3] = [SupportedFormat::Jpg, SupportedFormat::Png, SupportedFormat::Bmp];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(SupportedFormat::Jpg),
            "png" => Some(SupportedFormat::Png),
            "bmp" => Some(SupportedFormat::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension, also used as the organize folder name.
    pub fn extension(self) -> &'static str {
        match self {
            SupportedFormat::Jpg => "jpg",
            SupportedFormat::Png => "png",
            SupportedFormat::Bmp => "bmp",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            SupportedFormat::Jpg => image::ImageFormat::Jpeg,
            SupportedFormat::Png => image::ImageFormat::Png,
            SupportedFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl FromStr for SupportedFormat {
    type Err = PreflightError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| PreflightError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for SupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeAlgorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

/// Where the super-resolution model lives and how its output is finished.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub url: Option<String>,
    /// Input sides are padded to a multiple of this before inference.
    pub window_size: u32,
    /// Edge-preserving detail boost after upscaling; a spatial sigma of 0 disables it.
    pub detail_sigma_spatial: f32,
    /// Range sigma as a fraction of full intensity.
    pub detail_sigma_range: f32,
    pub post_contrast: f32,
    pub post_brightness: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/swin2SR-lightweight-x2-64.onnx"),
            url: Some(
                "https://huggingface.co/Xenova/swin2SR-lightweight-x2-64/resolve/main/onnx/model.onnx"
                    .to_string(),
            ),
            window_size: 8,
            detail_sigma_spatial: 10.0,
            detail_sigma_range: 0.15,
            post_contrast: 1.2,
            post_brightness: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub recursive: bool,
    /// When false, `convert` removes the source after the new file is written.
    pub keep_originals: bool,
    pub jpeg_quality: u8,
    pub optimize_png: bool,
    pub resize_filter: ResizeAlgorithm,
    pub model: ModelConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            keep_originals: true,
            jpeg_quality: 90,
            optimize_png: false,
            resize_filter: ResizeAlgorithm::Lanczos3,
            model: ModelConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> std::result::Result<(), PreflightError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(PreflightError::InvalidParameter {
                name: "quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        if self.model.window_size == 0 {
            return Err(PreflightError::InvalidParameter {
                name: "window-size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.model.detail_sigma_spatial < 0.0 || self.model.detail_sigma_range <= 0.0 {
            return Err(PreflightError::InvalidParameter {
                name: "detail-sigma".to_string(),
                reason: "spatial sigma must not be negative and range sigma must be positive".to_string(),
            });
        }

        if self.model.post_contrast < 0.0 {
            return Err(PreflightError::InvalidParameter {
                name: "post-contrast".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Failures that reject a job before any file is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreflightError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No supported image files found in {}", .0.display())]
    NoImagesFound(PathBuf),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Unsupported format: {0} (expected jpg, png or bmp)")]
    UnsupportedFormat(String),
}

/// Failures confined to a single file; the batch keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileError {
    #[error("Cannot read {}: {reason}", path.display())]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("Cannot write {}: {reason}", path.display())]
    UnwritableTarget { path: PathBuf, reason: String },

    #[error("AI enhancement unavailable: {0}")]
    EnhancementUnavailable(String),

    #[error("Cannot move {}: {reason}", path.display())]
    MoveFailed { path: PathBuf, reason: String },
}

impl FileError {
    pub fn unreadable(path: &Path, reason: impl fmt::Display) -> Self {
        FileError::UnreadableFile { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub fn unwritable(path: &Path, reason: impl fmt::Display) -> Self {
        FileError::UnwritableTarget { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub fn move_failed(path: &Path, reason: impl fmt::Display) -> Self {
        FileError::MoveFailed { path: path.to_path_buf(), reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    pub detail: Option<String>,
    pub error: Option<FileError>,
}

impl FileOutcome {
    pub fn success(path: &Path, detail: impl Into<String>) -> Self {
        Self { path: path.to_path_buf(), status: FileStatus::Success, detail: Some(detail.into()), error: None }
    }

    pub fn skipped(path: &Path, reason: impl Into<String>) -> Self {
        Self { path: path.to_path_buf(), status: FileStatus::Skipped, detail: Some(reason.into()), error: None }
    }

    pub fn failed(path: &Path, error: FileError) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Failed,
            detail: Some(error.to_string()),
            error: Some(error),
        }
    }
}

/// Per-file outcomes of one job, in scan order.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub outcomes: Vec<FileOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Number of files found by the scan, processed or not.
    pub scanned: usize,
    pub interrupted: bool,
}

impl BatchResult {
    pub fn new(scanned: usize) -> Self {
        Self { outcomes: Vec::with_capacity(scanned), scanned, ..Default::default() }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome.status {
            FileStatus::Success => self.succeeded += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Failed => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status == FileStatus::Failed)
    }
}

/// Shared interrupt flag, set from a signal handler and polled between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
