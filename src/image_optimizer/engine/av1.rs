//! AVIF source decoding
//!
//! The container is read with avif-parse and the primary item is decoded by
//! rav1d. Planes are converted to RGB8 with BT.601 coefficients; the alpha
//! item is not composited.

use std::io::Cursor;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use image::{DynamicImage, RgbImage};
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::Dav1dSettings;
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib as dav1d;

use crate::image_optimizer::error::ImageError;

fn parse(bytes: &[u8]) -> Result<avif_parse::AvifData, ImageError> {
    avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| ImageError::decode_failed(format!("invalid AVIF container: {:?}", e)))
}

/// Frame size from the AV1 sequence header, without decoding
pub(crate) fn avif_dimensions(bytes: &[u8]) -> Result<(u32, u32), ImageError> {
    let avif = parse(bytes)?;
    let meta = avif
        .primary_item_metadata()
        .map_err(|e| ImageError::decode_failed(format!("invalid AV1 sequence header: {:?}", e)))?;
    Ok((meta.max_frame_width.get(), meta.max_frame_height.get()))
}

/// Decoded picture, released on drop
struct Picture {
    inner: Dav1dPicture,
}

impl Drop for Picture {
    fn drop(&mut self) {
        // SAFETY: unref on a zeroed picture is a no-op
        unsafe { dav1d::dav1d_picture_unref(NonNull::new(&mut self.inner)) };
    }
}

struct Plane {
    ptr: *const u8,
    stride: isize,
}

impl Plane {
    fn sample(&self, x: u32, y: u32, bpc: u32) -> f32 {
        // SAFETY: callers stay inside the plane bounds reported by rav1d
        unsafe {
            if bpc <= 8 {
                *self.ptr.offset(y as isize * self.stride + x as isize) as f32
            } else {
                let offset = y as isize * self.stride + x as isize * 2;
                (self.ptr.offset(offset) as *const u16).read_unaligned() as f32
            }
        }
    }
}

pub(crate) fn decode_avif(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let avif = parse(bytes)?;
    let obu: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| ImageError::decode_failed("rav1d settings unavailable"))?;
    // SAFETY: dav1d_default_settings fully initialises the struct it is given
    let mut settings = unsafe {
        dav1d::dav1d_default_settings(settings_ptr);
        settings.assume_init()
    };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    // SAFETY: both pointers reference live locals for the duration of the call
    let rc = unsafe { dav1d::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(ImageError::decode_failed(format!("rav1d open failed ({})", rc.0)));
    }

    let result = (|| {
        let mut data = Dav1dData::default();
        // SAFETY: data_create allocates `obu.len()` bytes owned by `data`
        let buf = unsafe { dav1d::dav1d_data_create(NonNull::new(&mut data), obu.len()) };
        if buf.is_null() {
            return Err(ImageError::decode_failed("rav1d data allocation failed"));
        }
        // SAFETY: `buf` points at an allocation of exactly `obu.len()` bytes
        unsafe { std::ptr::copy_nonoverlapping(obu.as_ptr(), buf, obu.len()) };

        // SAFETY: the context is open and `data` was initialised above
        let rc = unsafe { dav1d::dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d::dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(ImageError::decode_failed(format!("rav1d send_data failed ({})", rc.0)));
        }

        // SAFETY: an all-zero picture is the empty state rav1d expects
        let mut picture = Picture {
            inner: unsafe { std::mem::zeroed() },
        };
        let rc = unsafe { dav1d::dav1d_get_picture(ctx, NonNull::new(&mut picture.inner)) };
        if rc.0 != 0 {
            return Err(ImageError::decode_failed(format!("rav1d get_picture failed ({})", rc.0)));
        }
        to_rgb(&picture.inner)
    })();

    // SAFETY: the context was opened above and is not used afterwards
    unsafe { dav1d::dav1d_close(NonNull::new(&mut ctx)) };
    result
}

fn to_rgb(pic: &Dav1dPicture) -> Result<DynamicImage, ImageError> {
    let width = u32::try_from(pic.p.w).map_err(|_| ImageError::decode_failed("negative AVIF width"))?;
    let height = u32::try_from(pic.p.h).map_err(|_| ImageError::decode_failed("negative AVIF height"))?;
    let bpc = u32::try_from(pic.p.bpc).unwrap_or(8).clamp(8, 16);

    let plane = |index: usize| -> Result<Plane, ImageError> {
        let ptr = pic.data[index]
            .ok_or_else(|| ImageError::decode_failed("AVIF picture is missing a plane"))?;
        Ok(Plane {
            ptr: ptr.as_ptr() as *const u8,
            stride: pic.stride[index.min(1)],
        })
    };

    let luma = plane(0)?;
    let max = ((1u32 << bpc) - 1) as f32;
    let center = (1u32 << (bpc - 1)) as f32;
    let scale = 255.0 / max;

    let layout = pic.p.layout;
    let chroma = match layout {
        DAV1D_PIXEL_LAYOUT_I400 => None,
        DAV1D_PIXEL_LAYOUT_I420 => Some((plane(1)?, plane(2)?, true, true)),
        DAV1D_PIXEL_LAYOUT_I422 => Some((plane(1)?, plane(2)?, true, false)),
        DAV1D_PIXEL_LAYOUT_I444 => Some((plane(1)?, plane(2)?, false, false)),
        _ => {
            return Err(ImageError::decode_failed(format!(
                "unsupported AVIF pixel layout {}",
                layout
            )))
        }
    };

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let luma_value = luma.sample(x, y, bpc);
            let (r, g, b) = match &chroma {
                None => (luma_value, luma_value, luma_value),
                Some((cb_plane, cr_plane, ss_x, ss_y)) => {
                    let cx = if *ss_x { x / 2 } else { x };
                    let cy = if *ss_y { y / 2 } else { y };
                    let cb = cb_plane.sample(cx, cy, bpc) - center;
                    let cr = cr_plane.sample(cx, cy, bpc) - center;
                    (
                        luma_value + 1.402 * cr,
                        luma_value - 0.344_136 * cb - 0.714_136 * cr,
                        luma_value + 1.772 * cb,
                    )
                }
            };
            rgb.push((r * scale).clamp(0.0, 255.0) as u8);
            rgb.push((g * scale).clamp(0.0, 255.0) as u8);
            rgb.push((b * scale).clamp(0.0, 255.0) as u8);
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ImageError::decode_failed("AVIF buffer size mismatch"))
}
