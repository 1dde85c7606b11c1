//! Image normalization ahead of inference.
//!
//! Decoded images are downscaled (never upscaled) so the longer edge fits
//! within a fixed maximum. This bounds both memory and detector cost.

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// Default cap on the longer image edge, in pixels.
pub const DEFAULT_MAX_EDGE: u32 = 416;

/// A decoded RGB image whose longer edge is at most the configured maximum.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    rgb: RgbImage,
}

impl NormalizedImage {
    /// Convert to RGB and shrink to fit within `max_edge`.
    pub fn fit(image: DynamicImage, max_edge: u32) -> Self {
        let (w, h) = (image.width(), image.height());
        let (tw, th) = target_dimensions(w, h, max_edge);

        let rgb = if (tw, th) == (w, h) {
            image.into_rgb8()
        } else {
            tracing::debug!(from = ?(w, h), to = ?(tw, th), "downscaling image");
            image::imageops::resize(&image.into_rgb8(), tw, th, FilterType::Triangle)
        };

        Self { rgb }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.rgb
    }
}

/// Dimensions after fitting `width × height` within `max_edge`.
///
/// The longer edge becomes exactly `max_edge`; the shorter one is scaled by the
/// same ratio and floored, never below 1. Images already within bounds keep
/// their size.
pub fn target_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_edge || longer == 0 {
        return (width, height);
    }

    let scale = |edge: u32| -> u32 {
        let scaled = u64::from(edge) * u64::from(max_edge) / u64::from(longer);
        (scaled as u32).max(1)
    };

    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_image_untouched() {
        assert_eq!(target_dimensions(300, 200, 416), (300, 200));
        assert_eq!(target_dimensions(416, 416, 416), (416, 416));
    }

    #[test]
    fn test_landscape_downscaled() {
        assert_eq!(target_dimensions(1000, 500, 416), (416, 208));
    }

    #[test]
    fn test_portrait_floor_truncation() {
        // 416 * 333 / 1000 = 138.528 -> 138
        assert_eq!(target_dimensions(333, 1000, 416), (138, 416));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(target_dimensions(10_000, 2, 416), (416, 1));
    }

    #[test]
    fn test_bounds_hold_across_sizes() {
        for w in (1..3000).step_by(97) {
            for h in (1..3000).step_by(89) {
                let (tw, th) = target_dimensions(w, h, DEFAULT_MAX_EDGE);
                assert!(tw <= w && th <= h, "{w}x{h} grew to {tw}x{th}");
                assert!(tw.max(th) <= DEFAULT_MAX_EDGE, "{w}x{h} -> {tw}x{th}");
                // Skip cases where the shorter edge was clamped up to one pixel.
                if w.max(h) > DEFAULT_MAX_EDGE && w.min(h) * DEFAULT_MAX_EDGE >= w.max(h) {
                    // Aspect ratio preserved within one pixel of truncation.
                    let expected_h = h as f64 * tw as f64 / w as f64;
                    assert!((th as f64 - expected_h).abs() <= 1.0 + th as f64 / tw as f64);
                }
            }
        }
    }

    #[test]
    fn test_fit_resizes_pixels() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1200, 900, image::Rgb([10, 20, 30])));
        let norm = NormalizedImage::fit(img, DEFAULT_MAX_EDGE);
        assert_eq!((norm.width(), norm.height()), (416, 312));
        assert_eq!(norm.as_rgb().get_pixel(100, 100).0, [10, 20, 30]);
    }

    #[test]
    fn test_fit_converts_grayscale_without_resize() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(64, 48, image::Luma([200])));
        let norm = NormalizedImage::fit(img, DEFAULT_MAX_EDGE);
        assert_eq!((norm.width(), norm.height()), (64, 48));
        assert_eq!(norm.as_rgb().get_pixel(0, 0).0, [200, 200, 200]);
    }
}
