//! Zero-copy hand-off of a vector map into a host UI compositor using
//! OpenGL via [glow].
//!
//! The map engine draws into a texture that lives in the host's own GL
//! context; the host samples that texture directly instead of copying
//! pixels. This crate is the coordination layer around that hand-off:
//!
//! - [`GlBackend`] captures the host's context and presents it to the map
//!   renderer through the [`RendererBackend`] interface, swapping contexts
//!   in and out of a [`BackendScope`].
//! - [`RenderTarget`] owns the shared texture, its depth/stencil buffer and
//!   framebuffer. They are created together and resized in place.
//! - [`GlFrontend`] runs one render pass and restores the GL bindings the
//!   host relies on before returning.
//! - [`RepaintScheduler`] decides when the host should redraw: engine
//!   callbacks raise a flag from any thread, the host consumes it once per
//!   tick, and short forced bursts keep frames coming while things settle.
//! - [`MapController`] translates input into camera operations and runs
//!   the fly-to animation; [`MapView`] ties it all to a [`HostWindow`].
//!
//! The map engine itself is abstracted by [`MapEngine`], [`MapRenderer`]
//! and the observer traits in the same module.
//!
//! # Safety
//!
//! Everything that issues GL calls is `unsafe`: the caller must be on the
//! host's render thread with its GL context current, and the
//! [`glow::Context`] must have been loaded for that context. The texture
//! handed out by [`MapView::render_map`] is borrowed and must not be
//! deleted by the host.
//!
//! [glow]: https://docs.rs/glow

mod animation;
mod backend;
mod config;
mod controller;
mod engine;
mod error;
mod render;
mod repaint;
mod snapshot;
mod target;
#[cfg(test)]
mod testing;
mod types;
mod view;

pub use animation::{ease_in_out, pull_back_zoom, FlyTo, FlyToFrame};
pub use backend::{
    BackendScope, FnPlatform, GlBackend, GlPlatform, Renderable, RendererBackend,
};
pub use config::{fallback_style_json, DoubleClickMode, FlyToConfig, MapConfig};
pub use controller::{MapController, MapEvents};
pub use engine::{
    CameraChangeMode, MapEngine, MapLoadError, MapObserver, MapOptions, MapRenderer,
    RenderFrameStatus, RendererObserver, UpdateLink,
};
pub use error::{Error, Result};
pub use render::{GlFrontend, RenderSession};
pub use repaint::{RepaintScheduler, FRAME_INTERVAL_MS};
pub use snapshot::unpremultiply;
pub use target::{RenderTarget, TargetAction, TargetObjects};
pub use types::{
    BorrowedTexture, CameraOptions, CanvasSize, ContextToken, LatLng, ProcAddress, ScreenPoint,
    TextureOrigin,
};
pub use view::{GraphicsApi, HostWindow, MapView, RenderingState};
