//! The map engine as seen from this crate.
//!
//! The engine (style parsing, tiles, networking, camera math) lives on the
//! other side of these traits. It drives us through three seams:
//!
//! - [`UpdateLink`]: where the engine publishes the latest scene parameters
//!   for the next render.
//! - [`MapObserver`] / [`RendererObserver`]: lifecycle and repaint
//!   callbacks, possibly raised from engine worker threads.
//! - [`RendererBackend`](crate::backend::RendererBackend): what the engine's
//!   renderer calls back into while drawing.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::RendererBackend;
use crate::error::Result;
use crate::types::{CameraOptions, CanvasSize, LatLng, ScreenPoint};

/// Why the engine gave up loading a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapLoadError {
    /// The style document could not be parsed.
    StyleParse,
    /// The style could not be fetched.
    StyleLoad,
    /// A required resource does not exist.
    NotFound,
    /// Anything else.
    Unknown,
}

/// How a camera change came about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraChangeMode {
    /// A jump without transition.
    Immediate,
    /// Part of an engine-driven transition.
    Animated,
}

/// Status reported after the engine finished a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderFrameStatus {
    /// The engine wants another frame (fade-in, transitions, pending tiles).
    pub needs_repaint: bool,
    /// Every visible tile was fully loaded and drawn.
    pub fully_rendered: bool,
}

/// Options the engine instance is created with.
#[derive(Clone, Debug, PartialEq)]
pub struct MapOptions {
    /// Initial canvas size.
    pub size: CanvasSize,
    /// Device pixel ratio.
    pub pixel_ratio: f32,
    /// On-disk cache database.
    pub cache_path: PathBuf,
    /// Base directory for `asset://` URLs.
    pub asset_path: PathBuf,
}

/// Lifecycle callbacks from the map engine.
///
/// Implementations must be cheap and must not touch GL: callbacks may arrive
/// on engine worker threads while the host thread is mid-tick.
pub trait MapObserver: Send + Sync {
    /// A new style load has started.
    fn on_will_start_loading_map(&self) {}
    /// The style finished loading.
    fn on_did_finish_loading_style(&self) {}
    /// Nothing is loading or animating.
    fn on_did_become_idle(&self) {}
    /// Loading the map failed.
    fn on_did_fail_loading_map(&self, _error: MapLoadError, _what: &str) {}
    /// The camera moved.
    fn on_camera_did_change(&self, _mode: CameraChangeMode) {}
    /// A source's data or attributes changed.
    fn on_source_changed(&self, _source_id: &str) {}
    /// A frame finished rendering.
    fn on_did_finish_rendering_frame(&self, _status: RenderFrameStatus) {}
}

/// Callbacks from the engine's renderer.
pub trait RendererObserver: Send + Sync {
    /// Rendered output is stale and should be redrawn.
    fn on_invalidate(&self) {}
}

/// Draws a scene through a [`RendererBackend`].
pub trait MapRenderer {
    /// Scene parameters produced by the engine for each frame.
    type Params: Send + Sync + 'static;

    /// Register the observer notified when rendered output goes stale.
    fn set_observer(&mut self, observer: Arc<dyn RendererObserver>);

    /// Draw `params` into whatever framebuffer is currently bound.
    ///
    /// The renderer may call [`RendererBackend::activate`] and
    /// [`RendererBackend::deactivate`] itself; the backend tolerates nesting.
    fn render(&mut self, backend: &mut dyn RendererBackend, params: &Self::Params);
}

/// A map engine instance.
pub trait MapEngine: Sized {
    /// Scene parameters passed from the engine to its renderer.
    type Params: Send + Sync + 'static;
    /// The renderer paired with this engine.
    type Renderer: MapRenderer<Params = Self::Params>;

    /// Create an engine and its renderer.
    ///
    /// The engine publishes scene parameters through `frontend` and reports
    /// lifecycle events to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Engine`](crate::Error::Engine) if the engine cannot
    /// be constructed.
    fn create(
        options: &MapOptions,
        frontend: UpdateLink<Self::Params>,
        observer: Arc<dyn MapObserver>,
    ) -> Result<(Self, Self::Renderer)>;

    /// Run one iteration of the engine's internal run loop.
    fn run_once(&mut self);

    /// Resize the map viewport.
    fn set_size(&mut self, size: CanvasSize);

    /// Constrain the camera zoom range.
    fn set_zoom_bounds(&mut self, min_zoom: f64, max_zoom: f64);

    /// Start loading a style from a URL.
    fn load_style_url(&mut self, url: &str);

    /// Load a style from an inline JSON document.
    fn load_style_json(&mut self, json: &str);

    /// Current camera.
    fn camera(&self) -> CameraOptions;

    /// Apply a camera without transition. `None` fields are left as they are.
    fn jump_to(&mut self, camera: &CameraOptions);

    /// Pan by a pixel delta.
    fn move_by(&mut self, delta: ScreenPoint);

    /// Multiply the map scale, keeping `anchor` fixed on screen.
    fn scale_by(&mut self, scale: f64, anchor: Option<ScreenPoint>);

    /// Geographic coordinate under a pixel.
    fn lat_lng_for_pixel(&self, point: ScreenPoint) -> LatLng;

    /// Ask the engine to produce a new frame.
    fn trigger_repaint(&mut self);
}

/// Shared slot through which the engine hands scene parameters to the GL
/// frontend.
///
/// The engine may publish from any thread; the frontend reads the most
/// recent value when the host asks for a frame. Older values are replaced,
/// not queued.
pub struct UpdateLink<P> {
    latest: Arc<Mutex<Option<Arc<P>>>>,
}

impl<P> UpdateLink<P> {
    /// An empty link.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latest: Arc::new(Mutex::new(None)),
        }
    }

    /// Publish new scene parameters.
    pub fn update(&self, params: Arc<P>) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(params);
    }

    /// The most recently published parameters, if any.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<P>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget published parameters.
    pub fn reset(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<P> Clone for UpdateLink<P> {
    fn clone(&self) -> Self {
        Self {
            latest: Arc::clone(&self.latest),
        }
    }
}

impl<P> Default for UpdateLink<P> {
    fn default() -> Self {
        Self::new()
    }
}
