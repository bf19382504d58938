// imgbatch/src/utils/mod.rs
use crate::core::SupportedFormat;
use std::path::{Path, PathBuf};

pub const ENHANCED_PREFIX: &str = "enhanced_";

/// `dir/photo.jpg` -> `dir/enhanced_photo.jpg`
pub fn enhanced_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    path.with_file_name(format!("{}{}", ENHANCED_PREFIX, name))
}

pub fn is_enhanced_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(ENHANCED_PREFIX))
        .unwrap_or(false)
}

/// Same stem, extension swapped for the target format.
pub fn converted_path(path: &Path, format: SupportedFormat) -> PathBuf {
    path.with_extension(format.extension())
}

pub fn is_supported_format(path: &Path) -> bool {
    SupportedFormat::from_path(path).is_some()
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let base = 1024_f64;
    let bytes_f64 = bytes as f64;
    let exponent = ((bytes_f64.log10() / base.log10()).floor() as i32).min(UNITS.len() as i32 - 1);
    let size = bytes_f64 / base.powi(exponent);

    format!("{:.2} {}", size, UNITS[exponent as usize])
}
