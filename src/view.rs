//! The host-facing map item.
//!
//! [`MapView`] ties a [`MapController`] to a [`GlFrontend`] and to the host
//! window's redraw machinery. The host forwards three kinds of calls:
//!
//! - rendering notifications from its scene graph
//!   ([`MapView::notify_rendering`]), on the render thread;
//! - a periodic [`MapView::tick`] from its event loop;
//! - input and UI actions, through [`MapView::controller_mut`].
//!
//! and picks up the finished texture with [`MapView::render_map`].

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::backend::{BackendScope, GlPlatform};
use crate::config::MapConfig;
use crate::controller::MapController;
use crate::engine::{MapEngine, MapRenderer, UpdateLink};
use crate::error::{Error, Result};
use crate::render::GlFrontend;
use crate::types::{BorrowedTexture, CanvasSize};

/// The host window, as far as the map is concerned.
pub trait HostWindow {
    /// Schedule a redraw of the window. May be deferred by the host.
    fn request_redraw(&self);
}

/// Phases of the host's rendering pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderingState {
    /// The scene graph is being set up.
    RenderingSetup,
    /// The host is about to draw; its GL context is current.
    BeforeRendering,
    /// The host finished drawing.
    AfterRendering,
    /// The scene graph is being torn down.
    RenderingTeardown,
}

/// Graphics API the host renders with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphicsApi {
    /// Desktop OpenGL or OpenGL ES.
    OpenGl,
    /// Anything else; the map cannot render into it.
    Other,
}

/// Ticks a redraw request may stay unanswered before it is re-issued.
const REDRAW_RETRY_TICKS: u32 = 30;

/// Coalesces redraw requests: at most one is outstanding until the host
/// renders, or until [`REDRAW_RETRY_TICKS`] ticks pass without a render.
#[derive(Debug, Default)]
struct RedrawGate {
    pending: bool,
    waited: u32,
}

impl RedrawGate {
    /// Ask `host` for a redraw unless one is already outstanding.
    fn request(&mut self, host: &impl HostWindow) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        self.waited = 0;
        host.request_redraw();
        true
    }

    /// The host went through a rendering pass.
    fn rendered(&mut self) {
        self.pending = false;
        self.waited = 0;
    }

    /// One host tick passed.
    fn tick(&mut self) {
        if !self.pending {
            return;
        }
        self.waited += 1;
        if self.waited >= REDRAW_RETRY_TICKS {
            log::debug!("redraw unanswered for {} ticks; re-arming", self.waited);
            self.rendered();
        }
    }
}

/// The GL side of a view.
pub(crate) trait Surface {
    /// Whether the host's context has been captured.
    fn has_context(&self) -> bool;

    /// Change the size the next frame renders at.
    fn set_size(&mut self, size: CanvasSize);

    /// Run `f` with the backend active.
    fn with_backend_active(&mut self, f: impl FnOnce());

    /// Render one frame. `None` when there is nothing to show.
    ///
    /// # Safety
    ///
    /// The host's context must be current on this thread.
    unsafe fn render_frame(&mut self) -> Option<glow::Texture>;
}

impl<R: MapRenderer, P: GlPlatform> Surface for GlFrontend<R, P> {
    fn has_context(&self) -> bool {
        GlFrontend::has_context(self)
    }

    fn set_size(&mut self, size: CanvasSize) {
        GlFrontend::set_size(self, size);
    }

    fn with_backend_active(&mut self, f: impl FnOnce()) {
        let _scope = BackendScope::new(self.backend_mut());
        f();
    }

    unsafe fn render_frame(&mut self) -> Option<glow::Texture> {
        unsafe { self.render_to_texture() }
    }
}

/// Everything a view decides without issuing GL calls itself.
struct ViewState<E, S, H> {
    controller: MapController<E>,
    surface: Option<S>,
    host: H,
    texture: Option<glow::Texture>,
    redraw: RedrawGate,
    published: bool,
    destroyed: bool,
}

impl<E, S, H> ViewState<E, S, H>
where
    E: MapEngine,
    S: Surface,
    H: HostWindow,
{
    fn new(config: MapConfig, host: H) -> Self {
        Self {
            controller: MapController::new(config),
            surface: None,
            host,
            texture: None,
            redraw: RedrawGate::default(),
            published: false,
            destroyed: false,
        }
    }

    /// No surface yet, and none was ever torn down.
    fn needs_initialize(&self) -> bool {
        self.surface.is_none() && !self.destroyed
    }

    fn initialize(
        &mut self,
        width: i32,
        height: i32,
        make_surface: impl FnOnce(E::Renderer, UpdateLink<E::Params>, CanvasSize) -> Result<S>,
    ) -> Result<()> {
        if self.destroyed {
            return Err(Error::Destroyed);
        }
        if self.surface.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let updates = UpdateLink::new();
        let renderer = self.controller.initialize(width, height, updates.clone())?;
        let size = self.controller.size().ok_or(Error::NotInitialized)?;
        match make_surface(renderer, updates, size) {
            Ok(surface) => self.surface = Some(surface),
            Err(e) => {
                self.controller.shutdown();
                return Err(e);
            }
        }
        self.request_redraw();
        Ok(())
    }

    fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        let surface = self.surface.as_mut().ok_or(Error::NotInitialized)?;
        let size = self.controller.resize(width, height)?;
        surface.set_size(size);
        self.texture = None;
        self.request_redraw();
        Ok(())
    }

    fn has_captured_context(&self) -> bool {
        self.surface.as_ref().is_some_and(Surface::has_context)
    }

    /// Track a rendering notification. Returns whether to render now.
    fn notify(&mut self, state: RenderingState, api: GraphicsApi) -> bool {
        match state {
            RenderingState::BeforeRendering => self.redraw.rendered(),
            RenderingState::AfterRendering => {
                self.redraw.rendered();
                return false;
            }
            RenderingState::RenderingSetup | RenderingState::RenderingTeardown => return false,
        }
        if api != GraphicsApi::OpenGl {
            log::debug!("host renders with {api:?}; map rendering skipped");
            return false;
        }
        !self.destroyed
    }

    unsafe fn render(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        self.texture = unsafe { surface.render_frame() };
        if let (Some(texture), false) = (self.texture, self.published) {
            log::info!("map texture {} ready", texture.0);
            self.published = true;
        }
    }

    fn render_map(&self) -> Option<BorrowedTexture> {
        let size = self.controller.size()?;
        if !self.controller.is_style_loaded() {
            return None;
        }
        self.texture.map(|texture| BorrowedTexture::new(texture, size))
    }

    fn tick_at(&mut self, now: Instant) -> bool {
        self.redraw.tick();
        let mut redraw = false;
        if self.has_captured_context() && self.controller.begin_style_load() {
            redraw |= self.request_redraw();
        }

        if let Some(surface) = self.surface.as_mut().filter(|s| s.has_context()) {
            let controller = &mut self.controller;
            surface.with_backend_active(|| controller.pump());
        }

        self.controller.tick_animation(now);
        self.controller.apply_pending_fallback();

        if self.controller.take_repaint_request() || self.controller.consume_forced_repaint() {
            redraw |= self.request_redraw();
        }
        redraw
    }

    fn request_redraw(&mut self) -> bool {
        self.redraw.request(&self.host)
    }

    /// Drop the engine and hand back the surface for GL teardown.
    fn destroy(&mut self) -> Option<S> {
        self.controller.shutdown();
        self.texture = None;
        self.destroyed = true;
        self.surface.take()
    }
}

/// A map rendered into a texture owned by the host's GL context.
pub struct MapView<E: MapEngine, P, H> {
    state: ViewState<E, GlFrontend<E::Renderer, P>, H>,
    platform: Option<P>,
    gl: Arc<glow::Context>,
}

impl<E, P, H> MapView<E, P, H>
where
    E: MapEngine,
    P: GlPlatform,
    H: HostWindow,
{
    /// A view that will render with `gl` through `platform`.
    ///
    /// Nothing is created until the host reports a size or starts
    /// rendering.
    pub fn new(config: MapConfig, gl: Arc<glow::Context>, platform: P, host: H) -> Self {
        Self {
            state: ViewState::new(config, host),
            platform: Some(platform),
            gl,
        }
    }

    /// The controller, for input and UI actions.
    pub fn controller(&self) -> &MapController<E> {
        &self.state.controller
    }

    /// Mutable access to the controller.
    pub fn controller_mut(&mut self) -> &mut MapController<E> {
        &mut self.state.controller
    }

    /// The host window.
    pub fn host(&self) -> &H {
        &self.state.host
    }

    /// Create the engine and the GL frontend at the given size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on a second call,
    /// [`Error::Destroyed`] after [`destroy`](Self::destroy), and
    /// [`Error::InvalidSize`] for a non-positive size.
    pub fn initialize(&mut self, width: i32, height: i32) -> Result<()> {
        let gl = &self.gl;
        let platform = &mut self.platform;
        self.state.initialize(width, height, |renderer, updates, size| {
            let platform = platform.take().ok_or(Error::AlreadyInitialized)?;
            Ok(GlFrontend::new(Arc::clone(gl), platform, size, renderer, updates))
        })
    }

    /// The host's canvas changed size. Initializes on the first call.
    ///
    /// The published texture is dropped until the next render at the new
    /// size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a non-positive size; nothing
    /// changes in that case.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        if self.state.needs_initialize() {
            return self.initialize(width, height);
        }
        self.state.resize(width, height)
    }

    /// Whether the host's GL context has been captured.
    pub fn has_captured_context(&self) -> bool {
        self.state.has_captured_context()
    }

    /// Forward a rendering notification from the host's scene graph.
    ///
    /// The map renders on `BeforeRendering`, and only when the host renders
    /// with OpenGL. If no size has been reported yet, the view initializes
    /// at the configured initial size first.
    ///
    /// # Safety
    ///
    /// Must be called on the host's render thread. For `BeforeRendering`
    /// with [`GraphicsApi::OpenGl`], the host's GL context must be current
    /// and `gl` must have been loaded for it.
    pub unsafe fn notify_rendering(&mut self, state: RenderingState, api: GraphicsApi) {
        if self.state.notify(state, api) {
            unsafe { self.render_to_texture() };
        }
    }

    /// Render a frame into the shared texture.
    ///
    /// # Safety
    ///
    /// Same requirements as [`notify_rendering`](Self::notify_rendering).
    pub unsafe fn render_to_texture(&mut self) {
        if self.state.needs_initialize() {
            let (width, height) = self.state.controller.config().initial_size;
            if let Err(e) = self.initialize(width, height) {
                log::error!("cannot initialize map: {e}");
                return;
            }
        }
        unsafe { self.state.render() };
    }

    /// The texture to composite this frame, if the map has one.
    ///
    /// `None` means "nothing to display yet": no size, no rendered frame,
    /// or the style has not finished loading.
    pub fn render_map(&self) -> Option<BorrowedTexture> {
        self.state.render_map()
    }

    /// One iteration of the host's event loop.
    ///
    /// Once a context is captured: starts the style load, pumps the engine
    /// with the backend active. Then advances the fly-to, applies a pending
    /// fallback style and asks the host for a redraw when one is due.
    /// Returns whether a redraw was requested.
    pub fn tick(&mut self) -> bool {
        self.state.tick_at(Instant::now())
    }

    /// [`tick`](Self::tick) with an explicit clock.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        self.state.tick_at(now)
    }

    /// Read the last rendered frame back into CPU memory.
    ///
    /// # Safety
    ///
    /// Same requirements as [`notify_rendering`](Self::notify_rendering).
    ///
    /// # Errors
    ///
    /// Returns an error if the readback cannot be assembled into an image.
    pub unsafe fn snapshot(&self) -> Result<Option<RgbaImage>> {
        match &self.state.surface {
            Some(frontend) => unsafe { frontend.read_pixels() },
            None => Ok(None),
        }
    }

    /// Tear the map down: engine first, then renderer and GL objects.
    ///
    /// The view stays inert afterwards.
    ///
    /// # Safety
    ///
    /// Must be called on the render thread with the host's context current.
    pub unsafe fn destroy(&mut self) {
        if let Some(mut frontend) = self.state.destroy() {
            unsafe { frontend.destroy() };
        }
        log::debug!("map view destroyed");
    }
}
