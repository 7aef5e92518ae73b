//! Raster operations
//!
//! [`plan_operations`] turns a [`TransformSpec`] into the ordered list of
//! operations to run, resolving target dimensions up front. [`apply`] then
//! executes one operation, consuming its input buffer.
//!
//! Fixed order: bound, resize, rotate, brightness, contrast, grayscale,
//! saturation, crop.

use std::num::NonZeroU32;

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use super::PixelBuffer;
use crate::constants::MAX_RESIZE_PIXELS;
use crate::image_optimizer::error::ImageError;
use crate::image_optimizer::params::{CropRect, FitMode, Position, TransformSpec};

/// One raster operation with all of its arguments resolved
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Downscale an oversized source into the configured limits
    Bound { width: u32, height: u32 },
    /// Resize to the exact box; `Cover` also crops the overflow
    Resize {
        width: u32,
        height: u32,
        fit: FitMode,
        position: Position,
    },
    /// Clockwise rotation in degrees, normalised to 1..360
    Rotate(i32),
    Brightness(i32),
    Contrast(i32),
    Grayscale,
    Saturation(i32),
    Crop(CropRect),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Bound { .. } => "bound",
            Operation::Resize { .. } => "resize",
            Operation::Rotate(_) => "rotate",
            Operation::Brightness(_) => "brightness",
            Operation::Contrast(_) => "contrast",
            Operation::Grayscale => "grayscale",
            Operation::Saturation(_) => "saturation",
            Operation::Crop(_) => "crop",
        }
    }
}

/// Build the operation list for a source of `source` dimensions
///
/// `bound` is the maximum box an oversized source must be shrunk into before
/// anything else happens; the requested resize is then inferred from the
/// bounded dimensions.
pub fn plan_operations(
    spec: &TransformSpec,
    source: (u32, u32),
    bound: Option<(u32, u32)>,
) -> Vec<Operation> {
    let mut ops = Vec::new();
    let (mut base_w, mut base_h) = source;

    if let Some((max_w, max_h)) = bound {
        if base_w > max_w || base_h > max_h {
            let (w, h) = fit_inside(base_w, base_h, max_w, max_h);
            ops.push(Operation::Bound {
                width: w,
                height: h,
            });
            base_w = w;
            base_h = h;
        }
    }

    if spec.wants_resize() {
        ops.push(resolve_resize(spec, base_w, base_h));
    }

    if let Some(degrees) = spec.rotate {
        let normalized = degrees.rem_euclid(360);
        if normalized != 0 {
            ops.push(Operation::Rotate(normalized));
        }
    }
    if let Some(b) = spec.brightness.filter(|b| *b != 0) {
        ops.push(Operation::Brightness(b));
    }
    if let Some(c) = spec.contrast.filter(|c| *c != 0) {
        ops.push(Operation::Contrast(c));
    }
    if spec.grayscale {
        ops.push(Operation::Grayscale);
    }
    if let Some(s) = spec.saturation.filter(|s| *s != 0) {
        ops.push(Operation::Saturation(s));
    }
    if let Some(crop) = spec.crop {
        ops.push(Operation::Crop(crop));
    }

    ops
}

fn resolve_resize(spec: &TransformSpec, src_w: u32, src_h: u32) -> Operation {
    let fit = spec.fit.unwrap_or(FitMode::Fill);
    let position = spec.position.unwrap_or_default();

    match (fit, spec.width, spec.height) {
        // Exact box; a missing axis keeps the source dimension
        (FitMode::Fill, w, h) => Operation::Resize {
            width: w.unwrap_or(src_w),
            height: h.unwrap_or(src_h),
            fit,
            position,
        },
        (FitMode::Contain, Some(w), Some(h)) => {
            let (width, height) = fit_inside(src_w, src_h, w, h);
            Operation::Resize {
                width,
                height,
                fit,
                position,
            }
        }
        (FitMode::Cover, Some(w), Some(h)) => Operation::Resize {
            width: w,
            height: h,
            fit,
            position,
        },
        // One axis with an aspect-preserving fit: derive the other from the ratio
        (_, w, h) => {
            let (width, height) = match (w, h) {
                (Some(w), _) => (w, scale_dim(src_h, w, src_w)),
                (None, Some(h)) => (scale_dim(src_w, h, src_h), h),
                (None, None) => (src_w, src_h),
            };
            Operation::Resize {
                width,
                height,
                fit: FitMode::Contain,
                position,
            }
        }
    }
}

/// Clamp resize targets into `max_w` x `max_h`
///
/// Aspect-preserving resizes shrink as a whole; exact and cover boxes clamp
/// per axis. Enlargement below the limits is left alone.
pub fn clamp_resize(ops: &mut [Operation], max_w: u32, max_h: u32) {
    for op in ops.iter_mut() {
        if let Operation::Resize {
            width, height, fit, ..
        } = op
        {
            if *width <= max_w && *height <= max_h {
                continue;
            }
            let (w, h) = match fit {
                FitMode::Contain => fit_inside(*width, *height, max_w, max_h),
                FitMode::Fill | FitMode::Cover => ((*width).min(max_w).max(1), (*height).min(max_h).max(1)),
            };
            *width = w;
            *height = h;
        }
    }
}

/// `value * num / den`, rounded, never below 1
fn scale_dim(value: u32, num: u32, den: u32) -> u32 {
    if den == 0 {
        return value.max(1);
    }
    let scaled = (value as f64 * num as f64 / den as f64).round();
    (scaled as u32).max(1)
}

/// Largest aspect-preserving dimensions that fit inside `max_w` x `max_h`
fn fit_inside(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (max_w.max(1), max_h.max(1));
    }
    let scale = f64::min(max_w as f64 / src_w as f64, max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}

/// Run one operation
pub fn apply(buffer: PixelBuffer, op: &Operation) -> Result<PixelBuffer, ImageError> {
    let img = buffer.into_image();

    let out = match op {
        Operation::Bound { width, height } => resize_image(&img, *width, *height)?,
        Operation::Resize {
            width,
            height,
            fit: FitMode::Cover,
            position,
        } => resize_cover(&img, *width, *height, *position)?,
        Operation::Resize { width, height, .. } => resize_image(&img, *width, *height)?,
        Operation::Rotate(degrees) => rotate(img, *degrees),
        Operation::Brightness(value) => img.brighten(value * 255 / 100),
        Operation::Contrast(value) => img.adjust_contrast(*value as f32),
        Operation::Grayscale => DynamicImage::ImageRgba8(img.grayscale().to_rgba8()),
        Operation::Saturation(value) => saturate(img, *value),
        Operation::Crop(rect) => crop(img, rect)?,
    };

    Ok(PixelBuffer::new(out))
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_width =
        NonZeroU32::new(img.width()).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;
    if u64::from(target_w) * u64::from(target_h) > MAX_RESIZE_PIXELS {
        return Err(ImageError::invalid_param(
            "resize",
            format!(
                "target {}x{} exceeds the {} pixel limit",
                target_w, target_h, MAX_RESIZE_PIXELS
            ),
        ));
    }

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);
    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba = RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;
    Ok(DynamicImage::ImageRgba8(rgba))
}

/// Scale to cover the box, then cut the overflow anchored at `position`
fn resize_cover(
    img: &DynamicImage,
    box_w: u32,
    box_h: u32,
    position: Position,
) -> Result<DynamicImage, ImageError> {
    let (src_w, src_h) = (img.width().max(1) as f64, img.height().max(1) as f64);
    let scale = f64::max(box_w as f64 / src_w, box_h as f64 / src_h);
    let scaled_w = ((src_w * scale).ceil() as u32).max(box_w);
    let scaled_h = ((src_h * scale).ceil() as u32).max(box_h);

    let scaled = resize_image(img, scaled_w, scaled_h)?;

    let spare_w = scaled_w - box_w;
    let spare_h = scaled_h - box_h;
    let (x, y) = match position {
        Position::Center => (spare_w / 2, spare_h / 2),
        Position::Top => (spare_w / 2, 0),
        Position::Bottom => (spare_w / 2, spare_h),
        Position::Left => (0, spare_h / 2),
        Position::Right => (spare_w, spare_h / 2),
    };
    Ok(scaled.crop_imm(x, y, box_w, box_h))
}

fn rotate(img: DynamicImage, degrees: i32) -> DynamicImage {
    match degrees {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        other => {
            let rgba = img.to_rgba8();
            let theta = (other as f32).to_radians();
            DynamicImage::ImageRgba8(rotate_about_center(
                &rgba,
                theta,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            ))
        }
    }
}

/// Scale chroma around per-pixel luma; -100 is fully desaturated
fn saturate(img: DynamicImage, value: i32) -> DynamicImage {
    let factor = 1.0 + value as f32 / 100.0;
    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let channel = |c: u8| (luma + (c as f32 - luma) * factor).round().clamp(0.0, 255.0) as u8;
        *pixel = Rgba([channel(r), channel(g), channel(b), a]);
    }
    DynamicImage::ImageRgba8(rgba)
}

/// Crop to the rectangle's intersection with the image
fn crop(img: DynamicImage, rect: &CropRect) -> Result<DynamicImage, ImageError> {
    let x_end = rect.x.saturating_add(rect.width).min(img.width());
    let y_end = rect.y.saturating_add(rect.height).min(img.height());

    if rect.x >= x_end || rect.y >= y_end {
        return Err(ImageError::invalid_param(
            "crop",
            format!(
                "rectangle {} lies outside the {}x{} image",
                rect,
                img.width(),
                img.height()
            ),
        ));
    }

    Ok(img.crop_imm(rect.x, rect.y, x_end - rect.x, y_end - rect.y))
}
