// imgbatch/src/processors/enhancer.rs
use crate::core::{FileError, ModelConfig};
use crate::processors::codec::ImageHandle;
use crate::processors::onnx::OnnxModelLoader;
use image::{DynamicImage, GenericImageView, Rgb};
use imageproc::filter::bilateral_filter;
use imageproc::map::map_colors;

/// Output is exactly this many times the input on each side.
pub const UPSCALE_FACTOR: u32 = 2;

/// Detail layer gain: output luma is `base + DETAIL_GAIN * (luma - base)`.
const DETAIL_GAIN: f32 = 3.0;

/// A loaded super-resolution model.
pub trait Upscaler {
    fn upscale(&mut self, image: &DynamicImage) -> anyhow::Result<DynamicImage>;
}

/// Produces an [`Upscaler`], fetching model files if needed.
pub trait ModelLoader {
    fn load(&self) -> anyhow::Result<Box<dyn Upscaler>>;
}

enum ModelState {
    Unloaded,
    Ready(Box<dyn Upscaler>),
    Unavailable(String),
}

/// Owns the lazily loaded model. A failed load is remembered for the
/// lifetime of the engine and never retried.
pub struct SuperResolutionEngine {
    loader: Box<dyn ModelLoader>,
    state: ModelState,
    detail_sigma_spatial: f32,
    detail_sigma_range: f32,
    contrast: f32,
    brightness: f32,
}

impl SuperResolutionEngine {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            state: ModelState::Unloaded,
            detail_sigma_spatial: 0.0,
            detail_sigma_range: 0.15,
            contrast: 1.0,
            brightness: 0.0,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(Box::new(OnnxModelLoader::new(config.clone())))
            .with_detail(config.detail_sigma_spatial, config.detail_sigma_range)
            .with_finish(config.post_contrast, config.post_brightness)
    }

    /// Edge-preserving detail boost applied after upscaling, before the tone
    /// finish. `sigma_range` is a fraction of full intensity; a `sigma_spatial`
    /// of 0 turns the stage off.
    pub fn with_detail(mut self, sigma_spatial: f32, sigma_range: f32) -> Self {
        self.detail_sigma_spatial = sigma_spatial;
        self.detail_sigma_range = sigma_range;
        self
    }

    /// Tone applied after upscaling: `contrast * value + brightness`, saturating.
    pub fn with_finish(mut self, contrast: f32, brightness: f32) -> Self {
        self.contrast = contrast;
        self.brightness = brightness;
        self
    }

    /// `None` until a load has been attempted.
    pub fn is_available(&self) -> Option<bool> {
        match self.state {
            ModelState::Unloaded => None,
            ModelState::Ready(_) => Some(true),
            ModelState::Unavailable(_) => Some(false),
        }
    }

    pub fn ensure_model_loaded(&mut self) -> Result<(), FileError> {
        if let ModelState::Unloaded = self.state {
            log::info!("Loading AI enhancement model");
            self.state = match self.loader.load() {
                Ok(model) => {
                    log::info!("AI enhancement model loaded");
                    ModelState::Ready(model)
                }
                Err(e) => {
                    log::warn!("Failed to load AI model, enhancement disabled: {:#}", e);
                    ModelState::Unavailable(format!("{:#}", e))
                }
            };
        }

        match &self.state {
            ModelState::Unavailable(reason) => Err(FileError::EnhancementUnavailable(reason.clone())),
            _ => Ok(()),
        }
    }

    pub fn enhance(&mut self, handle: &ImageHandle) -> Result<ImageHandle, FileError> {
        self.ensure_model_loaded()?;

        let model = match &mut self.state {
            ModelState::Ready(model) => model,
            _ => return Err(FileError::EnhancementUnavailable("model not loaded".to_string())),
        };

        let (width, height) = handle.dimensions();
        let upscaled = model
            .upscale(&handle.image)
            .map_err(|e| FileError::EnhancementUnavailable(format!("{:#}", e)))?;

        let expected = (width * UPSCALE_FACTOR, height * UPSCALE_FACTOR);
        if upscaled.dimensions() != expected {
            let reason = format!(
                "model produced {}x{}, expected {}x{}",
                upscaled.width(),
                upscaled.height(),
                expected.0,
                expected.1
            );
            log::warn!("Incompatible AI model, enhancement disabled: {}", reason);
            self.state = ModelState::Unavailable(reason.clone());
            return Err(FileError::EnhancementUnavailable(reason));
        }

        log::debug!(
            "Enhanced {} from {}x{} to {}x{}",
            handle.path.display(),
            width,
            height,
            expected.0,
            expected.1
        );

        Ok(ImageHandle {
            image: self.finish(self.boost_detail(upscaled)),
            path: handle.path.clone(),
            format: handle.format,
        })
    }

    /// Releases the model. A later enhance loads it again.
    pub fn teardown(&mut self) {
        if let ModelState::Ready(_) = self.state {
            log::debug!("Releasing AI enhancement model");
        }
        self.state = ModelState::Unloaded;
    }

    // Splits luma into a bilateral base and a detail layer, amplifies the
    // detail and adds the same luma shift to every channel.
    fn boost_detail(&self, image: DynamicImage) -> DynamicImage {
        if self.detail_sigma_spatial <= 0.0 {
            return image;
        }

        let window = 2 * (self.detail_sigma_spatial / 2.0).floor() as u32 + 1;
        let sigma_color = self.detail_sigma_range * 255.0;
        let luma = image.to_luma8();
        let base = bilateral_filter(&luma, window, sigma_color, self.detail_sigma_spatial);

        let mut out = image.to_rgb8();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let l = luma.get_pixel(x, y)[0] as f32;
            let b = base.get_pixel(x, y)[0] as f32;
            let shift = (DETAIL_GAIN - 1.0) * (l - b);
            for c in pixel.0.iter_mut() {
                *c = (*c as f32 + shift).round().clamp(0.0, 255.0) as u8;
            }
        }
        DynamicImage::ImageRgb8(out)
    }

    fn finish(&self, image: DynamicImage) -> DynamicImage {
        if self.contrast == 1.0 && self.brightness == 0.0 {
            return image;
        }

        let (alpha, beta) = (self.contrast, self.brightness);
        let scale = |c: u8| (alpha * c as f32 + beta).abs().round().min(255.0) as u8;
        let rgb = image.to_rgb8();
        DynamicImage::ImageRgb8(map_colors(&rgb, |p| Rgb([scale(p[0]), scale(p[1]), scale(p[2])])))
    }
}
