//! The shared render target: a color texture the host samples directly,
//! plus the depth/stencil buffer, framebuffer and vertex array the map
//! renderer draws with.
//!
//! The objects are created together on first use and resized in place
//! afterwards, so the texture name the host has cached stays valid across
//! resizes.

use glow::{HasContext, PixelUnpackData};

use crate::error::{Error, Result};
use crate::types::CanvasSize;

/// GL internal format for RGBA8 textures, pre-cast to the `i32` that
/// `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Convert a `u32` to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. Canvas sizes come from host widgets and
/// never get near that.
pub(crate) fn gl_size(value: u32) -> i32 {
    i32::try_from(value).expect("dimension exceeds i32::MAX")
}

/// What [`RenderTarget::ensure`] has to do for a requested size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetAction {
    /// Nothing exists yet; create every object.
    Create,
    /// Objects exist at another size; re-specify their storage.
    Resize,
    /// Objects exist at the requested size.
    Keep,
}

/// The GL objects behind the shared texture. They exist all together or not
/// at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetObjects {
    /// Color attachment, sampled by the host.
    pub texture: glow::Texture,
    /// Combined depth/stencil attachment.
    pub depth_stencil: glow::Renderbuffer,
    /// Framebuffer the map renderer draws into.
    pub framebuffer: glow::Framebuffer,
    /// Vertex array kept bound-able for core profiles.
    pub vertex_array: glow::VertexArray,
}

/// Lazily created, size-tracking render target.
#[derive(Debug, Default)]
pub struct RenderTarget {
    objects: Option<TargetObjects>,
    size: Option<CanvasSize>,
}

impl RenderTarget {
    /// An uncreated target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The GL objects, if created.
    #[must_use]
    pub fn objects(&self) -> Option<&TargetObjects> {
        self.objects.as_ref()
    }

    /// Size the storage was last specified at.
    #[must_use]
    pub fn size(&self) -> Option<CanvasSize> {
        self.size
    }

    /// Work needed to make the target match `size`.
    #[must_use]
    pub fn plan(&self, size: CanvasSize) -> TargetAction {
        match (self.objects, self.size) {
            (None, _) => TargetAction::Create,
            (Some(_), Some(current)) if current == size => TargetAction::Keep,
            (Some(_), _) => TargetAction::Resize,
        }
    }

    /// Create or resize the target so it matches `size`.
    ///
    /// An incomplete framebuffer is logged, not returned: rendering carries
    /// on and the output is undefined.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one the objects were
    /// created with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Gl`] if a GL object cannot be created. Nothing is
    /// left half-created in that case.
    pub unsafe fn ensure(&mut self, gl: &glow::Context, size: CanvasSize) -> Result<TargetObjects> {
        match self.plan(size) {
            TargetAction::Keep => {}
            TargetAction::Create => {
                let objects = unsafe { create_objects(gl) }?;
                unsafe { attach(gl, &objects, size) };
                log::info!(
                    "created render target {}x{} (texture {})",
                    size.width(),
                    size.height(),
                    objects.texture.0
                );
                self.objects = Some(objects);
                self.size = Some(size);
            }
            TargetAction::Resize => {
                if let Some(objects) = &self.objects {
                    unsafe {
                        specify_storage(gl, objects, size);
                        check_gl_error(gl, "resizing render target");
                    }
                    log::debug!("resized render target to {}x{}", size.width(), size.height());
                }
                self.size = Some(size);
            }
        }
        self.objects.ok_or(Error::NotInitialized)
    }

    /// Delete the GL objects and return to the uncreated state.
    ///
    /// # Safety
    ///
    /// Must be called with the context the objects were created in.
    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        if let Some(objects) = self.objects.take() {
            unsafe {
                gl.delete_texture(objects.texture);
                gl.delete_renderbuffer(objects.depth_stencil);
                gl.delete_framebuffer(objects.framebuffer);
                gl.delete_vertex_array(objects.vertex_array);
            }
        }
        self.size = None;
    }
}

/// Create all four objects, deleting any already created if a later one
/// fails.
unsafe fn create_objects(gl: &glow::Context) -> Result<TargetObjects> {
    let texture = unsafe { gl.create_texture() }.map_err(Error::Gl)?;
    let depth_stencil = match unsafe { gl.create_renderbuffer() } {
        Ok(rb) => rb,
        Err(e) => {
            unsafe { gl.delete_texture(texture) };
            return Err(Error::Gl(e));
        }
    };
    let framebuffer = match unsafe { gl.create_framebuffer() } {
        Ok(fb) => fb,
        Err(e) => {
            unsafe {
                gl.delete_texture(texture);
                gl.delete_renderbuffer(depth_stencil);
            }
            return Err(Error::Gl(e));
        }
    };
    let vertex_array = match unsafe { gl.create_vertex_array() } {
        Ok(va) => va,
        Err(e) => {
            unsafe {
                gl.delete_texture(texture);
                gl.delete_renderbuffer(depth_stencil);
                gl.delete_framebuffer(framebuffer);
            }
            return Err(Error::Gl(e));
        }
    };
    Ok(TargetObjects {
        texture,
        depth_stencil,
        framebuffer,
        vertex_array,
    })
}

/// Specify storage and wire both attachments into the framebuffer.
unsafe fn attach(gl: &glow::Context, objects: &TargetObjects, size: CanvasSize) {
    unsafe {
        specify_storage(gl, objects, size);
        check_gl_error(gl, "texture creation");

        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(objects.framebuffer));
        gl.framebuffer_texture_2d(
            glow::FRAMEBUFFER,
            glow::COLOR_ATTACHMENT0,
            glow::TEXTURE_2D,
            Some(objects.texture),
            0,
        );
        gl.framebuffer_renderbuffer(
            glow::FRAMEBUFFER,
            glow::DEPTH_STENCIL_ATTACHMENT,
            glow::RENDERBUFFER,
            Some(objects.depth_stencil),
        );
        check_gl_error(gl, "framebuffer creation");

        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        if status != glow::FRAMEBUFFER_COMPLETE {
            log::error!("render target framebuffer incomplete (status {status:#x})");
        }
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
    }
}

/// (Re)allocate texture and renderbuffer storage at `size`.
unsafe fn specify_storage(gl: &glow::Context, objects: &TargetObjects, size: CanvasSize) {
    let w = gl_size(size.width());
    let h = gl_size(size.height());
    unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(objects.texture));
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            RGBA8_INTERNAL_FORMAT,
            w,
            h,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            PixelUnpackData::Slice(None),
        );
        set_sampling_params(gl);
        gl.bind_texture(glow::TEXTURE_2D, None);

        gl.bind_renderbuffer(glow::RENDERBUFFER, Some(objects.depth_stencil));
        gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH24_STENCIL8, w, h);
        gl.bind_renderbuffer(glow::RENDERBUFFER, None);
    }
}

/// Linear filtering, clamped edges, a single mip level. Applies to the
/// texture bound to `TEXTURE_2D`.
pub(crate) unsafe fn set_sampling_params(gl: &glow::Context) {
    // GL constant values are small enough that the cast is always safe.
    #[expect(clippy::cast_possible_wrap)]
    unsafe {
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_BASE_LEVEL, 0);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, 0);
    }
}

/// Log (and clear) a pending GL error.
pub(crate) unsafe fn check_gl_error(gl: &glow::Context, what: &str) {
    let err = unsafe { gl.get_error() };
    if err != glow::NO_ERROR {
        log::warn!("GL error during {what}: {err:#x}");
    }
}
