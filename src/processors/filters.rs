// imgbatch/src/processors/filters.rs
//! Enhancement-factor filters. A factor of 1.0 leaves the image unchanged,
//! 0.0 yields the degenerate image (black, flat grey or smoothed) and values
//! above 1.0 push away from it.
use crate::core::operation::FilterKind;
use image::{ColorType, DynamicImage, ImageBuffer, Rgba, RgbaImage};
use imageproc::map::map_colors;

const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

pub fn apply_builtin_filter(image: &DynamicImage, filter: FilterKind) -> DynamicImage {
    log::debug!("Applying filter {:?}", filter);

    match filter {
        FilterKind::Grayscale => DynamicImage::ImageLuma8(image.to_luma8()),
        FilterKind::Brightness(factor) => {
            let rgba = image.to_rgba8();
            let out = map_colors(&rgba, |p| blend_pixel(Rgba([0, 0, 0, p[3]]), p, factor));
            restore_color(image.color(), out)
        }
        FilterKind::Contrast(factor) => {
            let mean = mean_luma(image);
            let rgba = image.to_rgba8();
            let out = map_colors(&rgba, |p| blend_pixel(Rgba([mean, mean, mean, p[3]]), p, factor));
            restore_color(image.color(), out)
        }
        FilterKind::Sharpen(factor) => {
            let rgba = image.to_rgba8();
            let smoothed = image::imageops::filter3x3(&rgba, &SMOOTH_KERNEL);
            let out = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
                blend_pixel(*smoothed.get_pixel(x, y), *rgba.get_pixel(x, y), factor)
            });
            restore_color(image.color(), out)
        }
    }
}

/// `base + factor * (p - base)` per colour channel, alpha kept from `p`.
fn blend_pixel(base: Rgba<u8>, p: Rgba<u8>, factor: f32) -> Rgba<u8> {
    let mix = |b: u8, c: u8| (b as f32 + factor * (c as f32 - b as f32)).round().clamp(0.0, 255.0) as u8;
    Rgba([mix(base[0], p[0]), mix(base[1], p[1]), mix(base[2], p[2]), p[3]])
}

fn mean_luma(image: &DynamicImage) -> u8 {
    let luma = image.to_luma8();
    let count = luma.pixels().len() as u64;
    if count == 0 {
        return 0;
    }
    let sum: u64 = luma.pixels().map(|p| p[0] as u64).sum();
    ((sum as f64 / count as f64) + 0.5).min(255.0) as u8
}

fn restore_color(original: ColorType, out: RgbaImage) -> DynamicImage {
    let out = DynamicImage::ImageRgba8(out);
    match original {
        ColorType::L8 | ColorType::L16 => DynamicImage::ImageLuma8(out.to_luma8()),
        ColorType::La8 | ColorType::La16 => DynamicImage::ImageLumaA8(out.to_luma_alpha8()),
        color if color.has_alpha() => out,
        _ => DynamicImage::ImageRgb8(out.to_rgb8()),
    }
}
