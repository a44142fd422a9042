//! Test doubles for the GL platform and the map engine.

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::c_void;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::Arc;

use crate::backend::{BackendScope, GlPlatform, RendererBackend};
use crate::engine::{MapEngine, MapObserver, MapOptions, MapRenderer, RendererObserver, UpdateLink};
use crate::error::Result;
use crate::render::RenderSession;
use crate::types::{CameraOptions, CanvasSize, ContextToken, LatLng, ScreenPoint};
use crate::view::Surface;

#[derive(Default)]
struct PlatformState {
    current: Option<usize>,
    switches: usize,
    symbols: HashSet<String>,
}

/// A platform whose contexts are plain integers.
#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Rc<RefCell<PlatformState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&self, id: Option<usize>) {
        self.state.borrow_mut().current = id;
    }

    pub fn current(&self) -> Option<usize> {
        self.state.borrow().current
    }

    /// Number of `make_current` calls seen.
    pub fn switches(&self) -> usize {
        self.state.borrow().switches
    }

    pub fn add_symbol(&self, name: &str) {
        self.state.borrow_mut().symbols.insert(name.to_owned());
    }
}

impl GlPlatform for FakePlatform {
    fn current_context(&self) -> Option<ContextToken> {
        self.current()
            .and_then(|id| ContextToken::from_raw(id as *mut c_void))
    }

    fn make_current(&self, context: ContextToken) {
        let mut state = self.state.borrow_mut();
        state.current = Some(context.as_raw() as usize);
        state.switches += 1;
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        if self.state.borrow().symbols.contains(name) {
            std::ptr::NonNull::<c_void>::dangling().as_ptr()
        } else {
            std::ptr::null()
        }
    }
}

/// An engine with a flat, linear camera model.
///
/// `scale_by(s)` adds `log2(s)` to the zoom, clamped to the bounds;
/// `lat_lng_for_pixel` maps one pixel to a tenth of a degree.
pub struct FakeEngine {
    pub camera: CameraOptions,
    pub size: CanvasSize,
    pub zoom_bounds: (f64, f64),
    pub style_urls: Vec<String>,
    pub style_jsons: Vec<String>,
    pub moves: Vec<ScreenPoint>,
    pub scale_anchors: Vec<Option<ScreenPoint>>,
    pub jumps: usize,
    pub run_count: u64,
    pub repaint_triggers: usize,
    pub observer: Arc<dyn MapObserver>,
    frontend: UpdateLink<u64>,
}

impl MapEngine for FakeEngine {
    type Params = u64;
    type Renderer = FakeRenderer;

    fn create(
        options: &MapOptions,
        frontend: UpdateLink<u64>,
        observer: Arc<dyn MapObserver>,
    ) -> Result<(Self, FakeRenderer)> {
        let engine = FakeEngine {
            camera: CameraOptions {
                center: Some(LatLng::new(0.0, 0.0)),
                zoom: Some(5.0),
                bearing: Some(0.0),
                pitch: Some(0.0),
            },
            size: options.size,
            zoom_bounds: (0.0, 22.0),
            style_urls: Vec::new(),
            style_jsons: Vec::new(),
            moves: Vec::new(),
            scale_anchors: Vec::new(),
            jumps: 0,
            run_count: 0,
            repaint_triggers: 0,
            observer,
            frontend,
        };
        Ok((engine, FakeRenderer::default()))
    }

    fn run_once(&mut self) {
        self.run_count += 1;
        self.frontend.update(Arc::new(self.run_count));
    }

    fn set_size(&mut self, size: CanvasSize) {
        self.size = size;
    }

    fn set_zoom_bounds(&mut self, min_zoom: f64, max_zoom: f64) {
        self.zoom_bounds = (min_zoom, max_zoom);
    }

    fn load_style_url(&mut self, url: &str) {
        self.style_urls.push(url.to_owned());
    }

    /// Inline styles load synchronously.
    fn load_style_json(&mut self, json: &str) {
        self.style_jsons.push(json.to_owned());
        self.observer.on_will_start_loading_map();
        self.observer.on_did_finish_loading_style();
    }

    fn camera(&self) -> CameraOptions {
        self.camera
    }

    fn jump_to(&mut self, camera: &CameraOptions) {
        self.jumps += 1;
        if camera.center.is_some() {
            self.camera.center = camera.center;
        }
        if camera.zoom.is_some() {
            self.camera.zoom = camera.zoom;
        }
        if camera.bearing.is_some() {
            self.camera.bearing = camera.bearing;
        }
        if camera.pitch.is_some() {
            self.camera.pitch = camera.pitch;
        }
    }

    fn move_by(&mut self, delta: ScreenPoint) {
        self.moves.push(delta);
    }

    fn scale_by(&mut self, scale: f64, anchor: Option<ScreenPoint>) {
        let (min, max) = self.zoom_bounds;
        let zoom = self.camera.zoom.unwrap_or(0.0) + scale.log2();
        self.camera.zoom = Some(zoom.clamp(min, max));
        self.scale_anchors.push(anchor);
    }

    fn lat_lng_for_pixel(&self, point: ScreenPoint) -> LatLng {
        LatLng::new(point.y / 10.0, point.x / 10.0)
    }

    fn trigger_repaint(&mut self) {
        self.repaint_triggers += 1;
    }
}

/// Renderer that only counts what it is asked to do.
#[derive(Default)]
pub struct FakeRenderer {
    pub observer: Option<Arc<dyn RendererObserver>>,
    pub frames: Vec<u64>,
}

impl MapRenderer for FakeRenderer {
    type Params = u64;

    fn set_observer(&mut self, observer: Arc<dyn RendererObserver>) {
        self.observer = Some(observer);
    }

    fn render(&mut self, backend: &mut dyn RendererBackend, params: &u64) {
        backend.activate();
        backend.deactivate();
        self.frames.push(*params);
    }
}

/// A surface that runs the real render session but no GL.
pub struct FakeSurface {
    pub session: RenderSession<FakeRenderer, FakePlatform>,
    pub size: CanvasSize,
    pub frames: usize,
}

impl FakeSurface {
    pub fn new(
        platform: FakePlatform,
        size: CanvasSize,
        renderer: FakeRenderer,
        updates: UpdateLink<u64>,
    ) -> Self {
        Self {
            session: RenderSession::new(platform, size, renderer, updates),
            size,
            frames: 0,
        }
    }
}

impl Surface for FakeSurface {
    fn has_context(&self) -> bool {
        self.session.backend().has_context()
    }

    fn set_size(&mut self, size: CanvasSize) {
        self.size = size;
        self.session.backend_mut().set_size(size);
    }

    fn with_backend_active(&mut self, f: impl FnOnce()) {
        let _scope = BackendScope::new(self.session.backend_mut());
        f();
    }

    unsafe fn render_frame(&mut self) -> Option<glow::Texture> {
        let params = self.session.prepare()?;
        self.session.draw(&params);
        self.frames += 1;
        NonZeroU32::new(7).map(glow::NativeTexture)
    }
}
