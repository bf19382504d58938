use clap::{Parser, ValueEnum};
use imgbatch::{BatchConfig, ModelConfig, ResizeAlgorithm};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgbatch", version, about = "Batch image processing with AI enhancement")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Include images in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Remove the source file after a successful convert
    #[arg(long)]
    pub delete_originals: bool,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Losslessly optimize PNG output
    #[arg(long)]
    pub optimize_png: bool,

    /// Resampling filter used by resize
    #[arg(short, long, value_enum, default_value_t = Algorithm::Lanczos3)]
    pub algorithm: Algorithm,

    /// Use this directory for every command instead of prompting
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Super-resolution model file (ONNX, 2x)
    #[arg(long)]
    pub model_path: Option<PathBuf>,

    /// Where to download the model from when it is missing
    #[arg(long)]
    pub model_url: Option<String>,

    /// Never download the model
    #[arg(long)]
    pub offline: bool,

    /// Spatial sigma of the detail boost after upscaling (0 = off)
    #[arg(long, default_value_t = 10.0)]
    pub detail_sigma_s: f32,

    /// Range sigma of the detail boost, as a fraction of full intensity
    #[arg(long, default_value_t = 0.15)]
    pub detail_sigma_r: f32,

    /// Contrast applied after upscaling (1.0 = unchanged)
    #[arg(long, default_value_t = 1.2)]
    pub post_contrast: f32,

    /// Brightness offset applied after upscaling (0 = unchanged)
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    pub post_brightness: f32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Algorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl From<Algorithm> for ResizeAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Nearest => ResizeAlgorithm::Nearest,
            Algorithm::Bilinear => ResizeAlgorithm::Bilinear,
            Algorithm::Bicubic => ResizeAlgorithm::Bicubic,
            Algorithm::Lanczos3 => ResizeAlgorithm::Lanczos3,
        }
    }
}

impl Cli {
    pub fn batch_config(&self) -> BatchConfig {
        let defaults = ModelConfig::default();
        let url = if self.offline {
            None
        } else {
            self.model_url.clone().or(defaults.url)
        };

        BatchConfig {
            recursive: self.recursive,
            keep_originals: !self.delete_originals,
            jpeg_quality: self.quality,
            optimize_png: self.optimize_png,
            resize_filter: self.algorithm.into(),
            model: ModelConfig {
                path: self.model_path.clone().unwrap_or(defaults.path),
                url,
                window_size: defaults.window_size,
                detail_sigma_spatial: self.detail_sigma_s,
                detail_sigma_range: self.detail_sigma_r,
                post_contrast: self.post_contrast,
                post_brightness: self.post_brightness,
            },
        }
    }
}
