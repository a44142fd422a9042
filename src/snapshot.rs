//! CPU readback of the shared render target.
//!
//! Display never goes through here; this is for debugging and thumbnails.

use glow::{HasContext, PixelPackData};
use image::RgbaImage;

use crate::error::{Error, Result};
use crate::target::gl_size;
use crate::types::CanvasSize;

/// Pixel-pack state the host may rely on, saved around a readback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PackState {
    alignment: i32,
    read_framebuffer: Option<glow::Framebuffer>,
}

impl PackState {
    unsafe fn save(gl: &glow::Context) -> Self {
        unsafe {
            Self {
                alignment: gl.get_parameter_i32(glow::PACK_ALIGNMENT),
                read_framebuffer: gl.get_parameter_framebuffer(glow::READ_FRAMEBUFFER_BINDING),
            }
        }
    }

    unsafe fn restore(self, gl: &glow::Context) {
        unsafe {
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, self.alignment);
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, self.read_framebuffer);
        }
    }
}

/// Read `framebuffer` into a straight-alpha, top-left-origin image.
///
/// The pack alignment and read-framebuffer binding are restored afterwards.
///
/// # Safety
///
/// Requires a current GL context in which `framebuffer` is valid and has
/// storage of at least `size`.
pub(crate) unsafe fn read_framebuffer(
    gl: &glow::Context,
    framebuffer: glow::Framebuffer,
    size: CanvasSize,
) -> Result<RgbaImage> {
    let mut pixels = vec![0u8; size.width() as usize * size.height() as usize * 4];
    unsafe {
        let saved = PackState::save(gl);
        gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(framebuffer));
        gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
        gl.read_pixels(
            0,
            0,
            gl_size(size.width()),
            gl_size(size.height()),
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            PixelPackData::Slice(Some(&mut pixels)),
        );
        saved.restore(gl);
    }

    unpremultiply(&mut pixels);
    let mut image = RgbaImage::from_raw(size.width(), size.height(), pixels)
        .ok_or_else(|| Error::Gl("readback buffer size mismatch".to_owned()))?;
    image::imageops::flip_vertical_in_place(&mut image);
    Ok(image)
}

/// Convert premultiplied RGBA8 pixels to straight alpha in place.
pub fn unpremultiply(pixels: &mut [u8]) {
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(pixels);
    for px in pixels {
        let alpha = u16::from(px[3]);
        if alpha == 0 || alpha == 255 {
            continue;
        }
        for channel in &mut px[..3] {
            let straight = (u16::from(*channel) * 255 + alpha / 2) / alpha;
            // Premultiplied input never exceeds alpha; clamp malformed data.
            *channel = u8::try_from(straight).unwrap_or(u8::MAX);
        }
    }
}
