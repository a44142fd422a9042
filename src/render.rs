//! The render driver: draws one map frame into the shared texture on the
//! host's GL context and hands the context back in the state the host left
//! it.
//!
//! The host compositor and the map renderer both issue GL commands on the
//! same context between frames, and each caches what it believes is bound.
//! A render pass therefore brackets the map renderer tightly: bind our
//! framebuffer, declare the renderer's cached state stale, draw, unbind
//! everything we or the renderer may have touched, and wait for the GPU so
//! the host never samples a half-drawn texture.

use std::sync::Arc;

use glow::HasContext;
use image::RgbaImage;

use crate::backend::{BackendScope, GlBackend, GlPlatform, RendererBackend};
use crate::engine::{MapRenderer, UpdateLink};
use crate::error::Result;
use crate::snapshot;
use crate::target::{self, RenderTarget};
use crate::types::CanvasSize;

/// The GL-free half of a render pass.
///
/// Holds the backend, the renderer and the link the engine publishes scene
/// parameters through. [`GlFrontend`] wraps it with the GL objects.
pub struct RenderSession<R: MapRenderer, P> {
    backend: GlBackend<P>,
    renderer: Option<R>,
    updates: UpdateLink<R::Params>,
}

impl<R: MapRenderer, P: GlPlatform> RenderSession<R, P> {
    /// A session drawing at `size`.
    pub fn new(platform: P, size: CanvasSize, renderer: R, updates: UpdateLink<R::Params>) -> Self {
        Self {
            backend: GlBackend::new(platform, size),
            renderer: Some(renderer),
            updates,
        }
    }

    /// The backend adapter.
    pub fn backend(&self) -> &GlBackend<P> {
        &self.backend
    }

    /// Mutable access to the backend adapter.
    pub fn backend_mut(&mut self) -> &mut GlBackend<P> {
        &mut self.backend
    }

    /// The renderer, until [`reset`](Self::reset).
    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    /// Capture the current context and fetch the scene to draw.
    ///
    /// `None` means there is nothing to draw: no parameters published yet,
    /// or the renderer is gone.
    pub fn prepare(&mut self) -> Option<Arc<R::Params>> {
        self.backend.capture_context();
        self.renderer.as_ref()?;
        self.updates.latest()
    }

    /// Draw `params` with the backend active and its cached state marked
    /// stale. The caller binds the framebuffer.
    pub fn draw(&mut self, params: &R::Params) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let mut scope = BackendScope::new(&mut self.backend);
        scope.update_assumed_state();
        renderer.render(&mut *scope, params);
    }

    /// Drop the renderer and any published parameters.
    pub fn reset(&mut self) {
        self.renderer = None;
        self.updates.reset();
    }
}

/// GL frontend for a map renderer.
///
/// Owns the [`RenderSession`] (and through it the captured context) and the
/// [`RenderTarget`]. The texture it returns is borrowed by the host.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use glow_map_bridge::{GlFrontend, GlPlatform, MapRenderer, UpdateLink, CanvasSize};
/// # fn example<R: MapRenderer, P: GlPlatform>(
/// #     gl: Arc<glow::Context>, platform: P, renderer: R, updates: UpdateLink<R::Params>,
/// # ) {
/// let size = CanvasSize::new(800, 600).unwrap();
/// let mut frontend = GlFrontend::new(gl, platform, size, renderer, updates);
///
/// // From the host's "before rendering" notification:
/// if let Some(texture) = unsafe { frontend.render_to_texture() } {
///     // hand `texture` to the compositor
/// #   let _ = texture;
/// }
/// # }
/// ```
pub struct GlFrontend<R: MapRenderer, P> {
    gl: Arc<glow::Context>,
    session: RenderSession<R, P>,
    size: CanvasSize,
    target: RenderTarget,
}

impl<R: MapRenderer, P: GlPlatform> GlFrontend<R, P> {
    /// Create a frontend. No GL calls happen until the first render.
    pub fn new(
        gl: Arc<glow::Context>,
        platform: P,
        size: CanvasSize,
        renderer: R,
        updates: UpdateLink<R::Params>,
    ) -> Self {
        Self {
            gl,
            session: RenderSession::new(platform, size, renderer, updates),
            size,
            target: RenderTarget::new(),
        }
    }

    /// The backend adapter.
    pub fn backend(&self) -> &GlBackend<P> {
        self.session.backend()
    }

    /// Mutable access to the backend adapter, e.g. to open a
    /// [`BackendScope`] while the engine's run loop is pumped.
    pub fn backend_mut(&mut self) -> &mut GlBackend<P> {
        self.session.backend_mut()
    }

    /// Whether the host's GL context has been captured.
    pub fn has_context(&self) -> bool {
        self.session.backend().has_context()
    }

    /// Logical canvas size.
    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Change the logical size.
    ///
    /// GL storage is not touched here; the next
    /// [`render_to_texture`](Self::render_to_texture) resizes it in place.
    pub fn set_size(&mut self, size: CanvasSize) {
        if self.size == size {
            return;
        }
        self.size = size;
        self.session.backend_mut().set_size(size);
    }

    /// Drop the renderer. Later renders return `None`.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Render the latest scene into the shared texture.
    ///
    /// Captures the current context first, so a host that calls this from
    /// its "before rendering" hook gets its context adopted even before the
    /// engine has anything to draw. Returns `None` (nothing to display yet)
    /// when no scene parameters have been published, the renderer is gone,
    /// or the target could not be created.
    ///
    /// # Safety
    ///
    /// Must be called on the thread owning the host's GL context, with that
    /// context current, and `gl` must have been loaded for it.
    pub unsafe fn render_to_texture(&mut self) -> Option<glow::Texture> {
        let params = self.session.prepare()?;

        let gl = &*self.gl;
        let objects = match unsafe { self.target.ensure(gl, self.size) } {
            Ok(objects) => objects,
            Err(e) => {
                log::error!("cannot prepare render target: {e}");
                return None;
            }
        };

        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, Some(objects.framebuffer)) };
        self.session.draw(&params);

        unsafe {
            gl.bind_vertex_array(None);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, None);

            // The renderer may have changed our texture's sampling state.
            gl.bind_texture(glow::TEXTURE_2D, Some(objects.texture));
            target::set_sampling_params(gl);
            gl.bind_texture(glow::TEXTURE_2D, None);

            target::check_gl_error(gl, "map render");
            gl.finish();
        }

        Some(objects.texture)
    }

    /// Read the shared texture back into CPU memory.
    ///
    /// The image is unpremultiplied and flipped to top-left origin. Returns
    /// `None` before the first render.
    ///
    /// # Safety
    ///
    /// Same requirements as [`render_to_texture`](Self::render_to_texture).
    ///
    /// # Errors
    ///
    /// Returns an error if the pixel buffer cannot be assembled into an
    /// image.
    pub unsafe fn read_pixels(&self) -> Result<Option<RgbaImage>> {
        let (Some(objects), Some(size)) = (self.target.objects(), self.target.size()) else {
            return Ok(None);
        };
        unsafe { snapshot::read_framebuffer(&self.gl, objects.framebuffer, size) }.map(Some)
    }

    /// Release GL objects and the renderer.
    ///
    /// # Safety
    ///
    /// Must be called with the context the target was created in, and at
    /// most once.
    pub unsafe fn destroy(&mut self) {
        self.reset();
        unsafe { self.target.destroy(&self.gl) };
    }
}
