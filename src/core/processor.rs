// imgbatch/src/core/processor.rs
use super::operation::{FilterKind, Operation};
use super::{BatchConfig, FileError, SupportedFormat};
use crate::processors::{apply_builtin_filter, FileOrganizer, ImageCodec, Resizer, SuperResolutionEngine};
use crate::utils::{converted_path, enhanced_path, format_file_size, is_enhanced_output};
use std::path::Path;

/// What happened to a file that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Done(String),
    Skipped(String),
}

/// Runs one operation against one file: load, transform, save.
pub struct ImageProcessor {
    config: BatchConfig,
    codec: ImageCodec,
    resizer: Resizer,
    organizer: FileOrganizer,
}

impl ImageProcessor {
    pub fn new(config: BatchConfig) -> Self {
        let codec = ImageCodec::new(config.jpeg_quality).with_png_optimization(config.optimize_png);
        let resizer = Resizer::new(config.resize_filter);

        Self {
            config,
            codec,
            resizer,
            organizer: FileOrganizer::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn process(
        &self,
        directory: &Path,
        path: &Path,
        operation: &Operation,
        engine: &mut SuperResolutionEngine,
    ) -> Result<Applied, FileError> {
        match *operation {
            Operation::Resize { width, height } => self.resize(path, width, height),
            Operation::Convert(format) => self.convert(path, format),
            Operation::Filter(filter) => self.filter(path, filter),
            Operation::Enhance => self.enhance(path, engine),
            Operation::Organize => self.organizer.organize_file(directory, path),
        }
    }

    fn resize(&self, path: &Path, width: u32, height: u32) -> Result<Applied, FileError> {
        if self.codec.dimensions(path)? == (width, height) {
            return Ok(Applied::Skipped(format!("already {}x{}", width, height)));
        }

        let handle = self.codec.load(path)?;
        let resized = self.resizer.resize_exact(&handle.image, width, height);
        let written = self.codec.save(&resized, path, handle.format)?;

        Ok(Applied::Done(format!("resized to {}x{} ({})", width, height, format_file_size(written))))
    }

    fn convert(&self, path: &Path, format: SupportedFormat) -> Result<Applied, FileError> {
        if SupportedFormat::from_path(path) == Some(format) {
            return Ok(Applied::Skipped(format!("already {}", format)));
        }

        // Another image with the same stem already owns the target name.
        let target = converted_path(path, format);
        if target.exists() {
            return Err(FileError::unwritable(
                &target,
                format!("already exists, {} left unconverted", path.display()),
            ));
        }

        let handle = self.codec.load(path)?;
        let written = self.codec.save(&handle.image, &target, format)?;

        if !self.config.keep_originals {
            if let Err(e) = std::fs::remove_file(path) {
                log::warn!("Converted {} but could not remove it: {}", path.display(), e);
                return Ok(Applied::Done(format!(
                    "written to {}, original kept: {}",
                    target.display(),
                    e
                )));
            }
        }

        Ok(Applied::Done(format!("written to {} ({})", target.display(), format_file_size(written))))
    }

    fn filter(&self, path: &Path, filter: FilterKind) -> Result<Applied, FileError> {
        let handle = self.codec.load(path)?;
        let filtered = apply_builtin_filter(&handle.image, filter);
        let written = self.codec.save(&filtered, path, handle.format)?;

        Ok(Applied::Done(format!("filtered ({})", format_file_size(written))))
    }

    fn enhance(&self, path: &Path, engine: &mut SuperResolutionEngine) -> Result<Applied, FileError> {
        if is_enhanced_output(path) {
            return Ok(Applied::Skipped("already an enhanced output".to_string()));
        }

        // Fail before decoding when the model is unavailable.
        engine.ensure_model_loaded()?;

        let handle = self.codec.load(path)?;
        let enhanced = engine.enhance(&handle)?;
        let target = enhanced_path(path);
        let (width, height) = enhanced.dimensions();
        let written = self.codec.save(&enhanced.image, &target, enhanced.format)?;

        Ok(Applied::Done(format!(
            "{}x{} written to {} ({})",
            width,
            height,
            target.display(),
            format_file_size(written)
        )))
    }
}
