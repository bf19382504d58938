// imgbatch/src/processors/batch.rs
use crate::core::operation::Operation;
use crate::core::processor::{Applied, ImageProcessor};
use crate::core::{BatchConfig, BatchResult, CancelToken, FileOutcome, PreflightError};
use crate::processors::SuperResolutionEngine;
use crate::utils::is_supported_format;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One validated request bound to the files found when it was prepared.
#[derive(Debug, Clone)]
pub struct BatchJob {
    directory: PathBuf,
    operation: Operation,
    files: Vec<PathBuf>,
}

impl BatchJob {
    /// Scans `directory`; fails before any file is touched if it is missing
    /// or holds no supported images.
    pub fn prepare(directory: &Path, operation: Operation, recursive: bool) -> Result<Self, PreflightError> {
        if !directory.is_dir() {
            return Err(PreflightError::DirectoryNotFound(directory.to_path_buf()));
        }

        let files = collect_image_paths(directory, recursive);
        if files.is_empty() {
            log::warn!("No image files found in {}", directory.display());
            return Err(PreflightError::NoImagesFound(directory.to_path_buf()));
        }

        Ok(Self {
            directory: directory.to_path_buf(),
            operation,
            files,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Supported images under `input_dir`, sorted by path.
pub fn collect_image_paths(input_dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let walker = if recursive {
        WalkDir::new(input_dir)
    } else {
        WalkDir::new(input_dir).max_depth(1)
    };

    let mut paths: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_supported_format(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    paths.sort();
    paths
}

/// Applies one operation to every file of a job, one file at a time.
/// A failing file is recorded and the loop moves on.
pub struct BatchRunner<'a> {
    processor: ImageProcessor,
    engine: &'a mut SuperResolutionEngine,
    cancel: CancelToken,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: BatchConfig, engine: &'a mut SuperResolutionEngine, cancel: CancelToken) -> Self {
        Self {
            processor: ImageProcessor::new(config),
            engine,
            cancel,
        }
    }

    pub fn prepare(&self, directory: &Path, operation: Operation) -> Result<BatchJob, PreflightError> {
        BatchJob::prepare(directory, operation, self.processor.config().recursive)
    }

    /// Prepares and runs in one step.
    pub fn execute<F>(
        &mut self,
        directory: &Path,
        operation: Operation,
        progress: F,
    ) -> Result<BatchResult, PreflightError>
    where
        F: FnMut(usize, usize),
    {
        let job = self.prepare(directory, operation)?;
        Ok(self.run(job, progress))
    }

    /// Processes the job's files in scan order, calling `progress(done, total)`
    /// after each one. Stops before the next file once cancelled and returns
    /// what has been recorded so far.
    pub fn run<F>(&mut self, job: BatchJob, mut progress: F) -> BatchResult
    where
        F: FnMut(usize, usize),
    {
        let total = job.files.len();
        let mut result = BatchResult::new(total);

        log::info!(
            "Running {} on {} images from {}",
            job.operation.name(),
            total,
            job.directory.display()
        );

        for (idx, path) in job.files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                log::info!("Interrupted after {}/{} images", idx, total);
                result.interrupted = true;
                break;
            }

            let outcome = match self.processor.process(&job.directory, path, &job.operation, self.engine) {
                Ok(Applied::Done(detail)) => FileOutcome::success(path, detail),
                Ok(Applied::Skipped(reason)) => {
                    log::debug!("Skipped {}: {}", path.display(), reason);
                    FileOutcome::skipped(path, reason)
                }
                Err(e) => {
                    log::warn!("Error processing {}: {}", path.display(), e);
                    FileOutcome::failed(path, e)
                }
            };

            result.record(outcome);
            progress(idx + 1, total);
        }

        log::info!(
            "{} finished: {} succeeded, {} skipped, {} failed",
            job.operation.name(),
            result.succeeded,
            result.skipped,
            result.failed
        );

        result
    }
}
