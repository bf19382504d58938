// imgbatch/src/processors/onnx.rs
use crate::core::ModelConfig;
use crate::processors::enhancer::{ModelLoader, Upscaler, UPSCALE_FACTOR};
use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Duration;

/// Loads a 2x super-resolution ONNX model from disk, downloading it first
/// when the file is missing and a URL is configured.
pub struct OnnxModelLoader {
    config: ModelConfig,
}

impl OnnxModelLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<Box<dyn Upscaler>> {
        let path = &self.config.path;
        if !path.exists() {
            match &self.config.url {
                Some(url) => {
                    log::info!("Model not found locally, downloading: {}", url);
                    download_model(url, path)?;
                }
                None => bail!("model file not found: {}", path.display()),
            }
        }

        // ort panics instead of erroring when the runtime library cannot be loaded.
        let session = panic::catch_unwind(AssertUnwindSafe(|| build_session(path)))
            .map_err(|_| anyhow!("ONNX Runtime library could not be loaded"))??;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.to_string())
            .ok_or_else(|| anyhow!("model declares no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.to_string())
            .ok_or_else(|| anyhow!("model declares no outputs"))?;

        log::debug!("Model input: '{}', output: '{}'", input_name, output_name);

        Ok(Box::new(OnnxUpscaler {
            session,
            input_name,
            output_name,
            window_size: self.config.window_size.max(1),
        }))
    }
}

fn build_session(path: &Path) -> Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load model from {}", path.display()))?;
    Ok(session)
}

pub struct OnnxUpscaler {
    session: Session,
    input_name: String,
    output_name: String,
    window_size: u32,
}

impl Upscaler for OnnxUpscaler {
    fn upscale(&mut self, image: &DynamicImage) -> Result<DynamicImage> {
        let (width, height) = image.dimensions();
        let padded = pad_to_multiple(&image.to_rgb8(), self.window_size);

        let input = Tensor::from_array(to_tensor(&padded))?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("inference failed")?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .context("failed to extract output tensor")?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        if dims.len() != 4 || dims[0] != 1 || dims[1] != 3 {
            bail!("unexpected output tensor shape {:?}", dims);
        }

        let upscaled = from_tensor(data, dims[3], dims[2])?;
        let (target_w, target_h) = (width * UPSCALE_FACTOR, height * UPSCALE_FACTOR);
        if upscaled.width() < target_w || upscaled.height() < target_h {
            bail!(
                "model output {}x{} is smaller than {}x{}",
                upscaled.width(),
                upscaled.height(),
                target_w,
                target_h
            );
        }

        Ok(DynamicImage::ImageRgb8(upscaled).crop_imm(0, 0, target_w, target_h))
    }
}

/// Reflect-pads the right and bottom edges so both sides divide `multiple`.
fn pad_to_multiple(rgb: &RgbImage, multiple: u32) -> RgbImage {
    let (w, h) = rgb.dimensions();
    let pad_w = w.div_ceil(multiple) * multiple;
    let pad_h = h.div_ceil(multiple) * multiple;
    if (pad_w, pad_h) == (w, h) {
        return rgb.clone();
    }

    ImageBuffer::from_fn(pad_w, pad_h, |x, y| {
        let src_x = if x < w { x } else { w - 1 - (x - w).min(w - 1) };
        let src_y = if y < h { y } else { h - 1 - (y - h).min(h - 1) };
        *rgb.get_pixel(src_x, src_y)
    })
}

/// NCHW, values in [0, 1].
fn to_tensor(rgb: &RgbImage) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, p) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = p[c] as f32 / 255.0;
        }
    }
    tensor
}

fn from_tensor(data: &[f32], width: usize, height: usize) -> Result<RgbImage> {
    let plane = width * height;
    if data.len() != 3 * plane {
        bail!("output tensor holds {} values, expected {}", data.len(), 3 * plane);
    }

    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    Ok(ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let idx = y as usize * width + x as usize;
        Rgb([to_u8(data[idx]), to_u8(data[plane + idx]), to_u8(data[2 * plane + idx])])
    }))
}

fn download_model(url: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(600))
        .user_agent(concat!("imgbatch/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut resp = client.get(url).send()?;
    if !resp.status().is_success() {
        bail!("HTTP {} for {}", resp.status(), url);
    }

    let tmp = path.with_extension("part");
    let mut out = fs::File::create(&tmp)?;
    io::copy(&mut resp, &mut out)?;
    fs::rename(&tmp, path)?;

    log::info!("Model saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, (x * 10 + y) as u8]))
    }

    #[test]
    fn test_pad_single_pixel_fills_window() {
        let padded = pad_to_multiple(&numbered(1, 1), 8);

        assert_eq!(padded.dimensions(), (8, 8));
        assert!(padded.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_pad_reflects_right_and_bottom_edges() {
        let source = numbered(3, 3);
        let padded = pad_to_multiple(&source, 8);

        assert_eq!(padded.dimensions(), (8, 8));
        let row: Vec<u8> = (0..8).map(|x| padded.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, [0, 1, 2, 2, 1, 0, 0, 0]);
        let column: Vec<u8> = (0..8).map(|y| padded.get_pixel(0, y)[1]).collect();
        assert_eq!(column, [0, 1, 2, 2, 1, 0, 0, 0]);
        for (x, y, p) in source.enumerate_pixels() {
            assert_eq!(padded.get_pixel(x, y), p);
        }
    }

    #[test]
    fn test_pad_leaves_aligned_image_alone() {
        let source = numbered(16, 8);
        assert_eq!(pad_to_multiple(&source, 8), source);
    }

    #[test]
    fn test_tensor_is_nchw_in_unit_range() {
        let mut source = numbered(3, 2);
        source.put_pixel(2, 1, Rgb([255, 0, 51]));

        let tensor = to_tensor(&source);

        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert_eq!(tensor[[0, 0, 1, 2]], 1.0);
        assert_eq!(tensor[[0, 1, 1, 2]], 0.0);
        assert!((tensor[[0, 2, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_tensor_round_trip_reproduces_pixels() {
        let source = numbered(5, 4);
        let tensor = to_tensor(&source);

        let restored = from_tensor(tensor.as_slice().unwrap(), 5, 4).unwrap();

        assert_eq!(restored, source);
    }

    #[test]
    fn test_from_tensor_clamps_out_of_range_values() {
        let restored = from_tensor(&[-0.5, 1.5, 0.5], 1, 1).unwrap();
        assert_eq!(restored.get_pixel(0, 0).0, [0, 255, 128]);
    }

    #[test]
    fn test_from_tensor_rejects_wrong_length() {
        assert!(from_tensor(&[0.0; 11], 2, 2).is_err());
    }
}
