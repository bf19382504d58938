// imgbatch/src/processors/organizer.rs
use crate::core::processor::Applied;
use crate::core::{FileError, SupportedFormat};
use std::fs;
use std::path::{Path, PathBuf};

/// Moves images into `<directory>/<format>/` without touching their bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileOrganizer;

impl FileOrganizer {
    pub fn new() -> Self {
        Self
    }

    /// Destination folder for `path`, classified by extension.
    pub fn folder_for(&self, directory: &Path, path: &Path) -> Option<PathBuf> {
        SupportedFormat::from_path(path).map(|format| directory.join(format.extension()))
    }

    pub fn organize_file(&self, directory: &Path, path: &Path) -> Result<Applied, FileError> {
        let folder = self
            .folder_for(directory, path)
            .ok_or_else(|| FileError::move_failed(path, "not a jpg, png or bmp file"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| FileError::move_failed(path, "path has no file name"))?;

        if path.parent() == Some(folder.as_path()) {
            return Ok(Applied::Skipped("already organized".to_string()));
        }

        let target = folder.join(file_name);
        if target.exists() {
            return Err(FileError::move_failed(
                path,
                format!("{} already exists", target.display()),
            ));
        }

        fs::create_dir_all(&folder).map_err(|e| FileError::move_failed(path, e))?;
        fs::rename(path, &target).map_err(|e| FileError::move_failed(path, e))?;

        log::debug!("Moved {} -> {}", path.display(), target.display());
        Ok(Applied::Done(format!("moved to {}", target.display())))
    }
}
