// imgbatch/src/processors/codec.rs
use crate::core::{FileError, SupportedFormat};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat, ImageReader};
use oxipng::{optimize_from_memory, Options};
use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A decoded image together with where it came from.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub image: DynamicImage,
    pub path: PathBuf,
    pub format: SupportedFormat,
}

impl ImageHandle {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Reads and writes jpg/png/bmp files.
#[derive(Clone)]
pub struct ImageCodec {
    quality: u8,
    optimize_png: bool,
    max_dimensions: Option<(u32, u32)>,
}

impl ImageCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            optimize_png: false,
            max_dimensions: Some((100_000, 100_000)),
        }
    }

    pub fn with_png_optimization(mut self, optimize: bool) -> Self {
        self.optimize_png = optimize;
        self
    }

    pub fn load(&self, path: &Path) -> Result<ImageHandle, FileError> {
        log::debug!("Loading image from: {}", path.display());

        let reader = ImageReader::open(path)
            .map_err(|e| FileError::unreadable(path, e))?
            .with_guessed_format()
            .map_err(|e| FileError::unreadable(path, e))?;

        let format = reader
            .format()
            .and_then(supported_from_image_format)
            .ok_or_else(|| FileError::unreadable(path, "not a jpg, png or bmp container"))?;

        let image = reader
            .decode()
            .map_err(|e| FileError::unreadable(path, format!("failed to decode image: {}", e)))?;

        let (width, height) = image.dimensions();
        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(FileError::unreadable(
                    path,
                    format!("dimensions {}x{} exceed maximum {}x{}", width, height, max_w, max_h),
                ));
            }
        }

        log::debug!("Loaded image: {}x{} pixels, format: {}", width, height, format);

        Ok(ImageHandle { image, path: path.to_path_buf(), format })
    }

    /// Reads the dimensions from the file header without decoding pixels.
    pub fn dimensions(&self, path: &Path) -> Result<(u32, u32), FileError> {
        ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| FileError::unreadable(path, e))?
            .into_dimensions()
            .map_err(|e| FileError::unreadable(path, e))
    }

    /// Encodes `image` as `format` and writes it to `path`, replacing any
    /// existing file. Returns the number of bytes written.
    ///
    /// The bytes go to a temporary file next to `path` that is renamed over
    /// it only once fully written, so a failed save leaves `path` as it was.
    pub fn save(&self, image: &DynamicImage, path: &Path, format: SupportedFormat) -> Result<u64, FileError> {
        log::debug!(
            "Saving image to {} as {}, quality: {}",
            path.display(),
            format,
            self.quality
        );

        let data = self.encode(image, format).map_err(|e| FileError::unwritable(path, e))?;
        write_replacing(path, &data).map_err(|e| FileError::unwritable(path, e))?;

        log::debug!("Saved image: {} ({} bytes)", path.display(), data.len());
        Ok(data.len() as u64)
    }

    /// Encodes fully in memory so a failed encode never leaves a truncated file.
    pub fn encode(&self, image: &DynamicImage, format: SupportedFormat) -> Result<Vec<u8>, String> {
        let image = prepare_for(image, format);
        let mut buffer = Cursor::new(Vec::new());

        match format {
            SupportedFormat::Jpg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
                image.write_with_encoder(encoder).map_err(|e| e.to_string())?;
            }
            SupportedFormat::Png => {
                image.write_to(&mut buffer, ImageFormat::Png).map_err(|e| e.to_string())?;
                if self.optimize_png {
                    return optimize_from_memory(&buffer.into_inner(), &Options::default())
                        .map_err(|e| format!("PNG optimization failed: {}", e));
                }
            }
            SupportedFormat::Bmp => {
                image.write_to(&mut buffer, ImageFormat::Bmp).map_err(|e| e.to_string())?;
            }
        }

        Ok(buffer.into_inner())
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(90)
    }
}

fn write_replacing(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let permissions = match std::fs::metadata(path) {
        Ok(metadata) => metadata.permissions(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return write_new(path, data),
        Err(e) => return Err(e),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

// Nothing to preserve; a partial file is removed again on failure.
fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

fn supported_from_image_format(format: ImageFormat) -> Option<SupportedFormat> {
    match format {
        ImageFormat::Jpeg => Some(SupportedFormat::Jpg),
        ImageFormat::Png => Some(SupportedFormat::Png),
        ImageFormat::Bmp => Some(SupportedFormat::Bmp),
        _ => None,
    }
}

// JPEG takes 8-bit gray or RGB only; BMP takes 8-bit channels only.
fn prepare_for(image: &DynamicImage, format: SupportedFormat) -> Cow<'_, DynamicImage> {
    let color = image.color();
    match format {
        SupportedFormat::Jpg => match color {
            ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
            _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        SupportedFormat::Bmp => match color {
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(image),
            _ if color.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
            _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        SupportedFormat::Png => match color {
            ColorType::Rgb32F => Cow::Owned(DynamicImage::ImageRgb16(image.to_rgb16())),
            ColorType::Rgba32F => Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16())),
            _ => Cow::Borrowed(image),
        },
    }
}
