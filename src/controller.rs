//! The map controller: owns the engine instance, turns host input into
//! camera operations, runs the fly-to animation and collects engine events
//! for the next host tick.
//!
//! Nothing in here touches GL. Engine callbacks only flip atomics in
//! [`MapEvents`]; the controller acts on them when the host ticks it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::animation::FlyTo;
use crate::config::{fallback_style_json, DoubleClickMode, MapConfig};
use crate::engine::{
    CameraChangeMode, MapEngine, MapLoadError, MapObserver, MapOptions, MapRenderer,
    RenderFrameStatus, RendererObserver, UpdateLink,
};
use crate::error::{Error, Result};
use crate::repaint::RepaintScheduler;
use crate::types::{CameraOptions, CanvasSize, ScreenPoint};

/// Pitch reached at the top of the pitch slider, in degrees.
const MAX_PITCH_DEG: f64 = 60.0;
/// Bearing reached at the top of the bearing slider, in degrees.
const FULL_TURN_DEG: f64 = 360.0;
/// Slider range the host reports pitch and bearing in.
const SLIDER_MAX: f64 = 100.0;

/// Engine-facing event sink.
///
/// Registered with the engine as its [`MapObserver`] and with the renderer
/// as its [`RendererObserver`]. Safe to call from any thread.
#[derive(Debug)]
pub struct MapEvents {
    repaint: RepaintScheduler,
    settle_ms: u32,
    style_loaded: AtomicBool,
    idle: AtomicBool,
    load_failed: AtomicBool,
}

impl MapEvents {
    fn new(settle_ms: u32) -> Self {
        Self {
            repaint: RepaintScheduler::new(),
            settle_ms,
            style_loaded: AtomicBool::new(false),
            idle: AtomicBool::new(false),
            load_failed: AtomicBool::new(false),
        }
    }

    /// The repaint scheduler these events feed.
    pub fn repaint(&self) -> &RepaintScheduler {
        &self.repaint
    }

    /// Whether the current style finished loading.
    pub fn is_style_loaded(&self) -> bool {
        self.style_loaded.load(Ordering::SeqCst)
    }

    /// Whether the engine last reported itself idle.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    fn settle(&self) {
        self.repaint.request();
        self.repaint.arm_ms(self.settle_ms);
    }
}

impl MapObserver for MapEvents {
    fn on_will_start_loading_map(&self) {
        log::debug!("map: will start loading");
        self.style_loaded.store(false, Ordering::SeqCst);
        self.idle.store(false, Ordering::SeqCst);
    }

    fn on_did_finish_loading_style(&self) {
        log::info!("map: style loaded");
        self.style_loaded.store(true, Ordering::SeqCst);
        self.repaint.request();
    }

    fn on_did_become_idle(&self) {
        log::debug!("map: idle");
        self.idle.store(true, Ordering::SeqCst);
    }

    fn on_did_fail_loading_map(&self, error: MapLoadError, what: &str) {
        log::error!("map loading failed ({error:?}): {what}");
        self.load_failed.store(true, Ordering::SeqCst);
    }

    fn on_camera_did_change(&self, _mode: CameraChangeMode) {
        self.settle();
    }

    fn on_source_changed(&self, _source_id: &str) {
        self.settle();
    }

    fn on_did_finish_rendering_frame(&self, status: RenderFrameStatus) {
        if status.needs_repaint {
            self.settle();
        }
    }
}

impl RendererObserver for MapEvents {
    fn on_invalidate(&self) {
        self.settle();
    }
}

/// Owns the map engine and everything that drives its camera.
pub struct MapController<E> {
    config: MapConfig,
    engine: Option<E>,
    size: Option<CanvasSize>,
    events: Arc<MapEvents>,
    last_pos: ScreenPoint,
    animation: Option<FlyTo>,
    style_initiated: bool,
    fallback_applied: bool,
}

impl<E: MapEngine> MapController<E> {
    /// A controller with no engine yet.
    pub fn new(config: MapConfig) -> Self {
        let events = Arc::new(MapEvents::new(config.settle_ms));
        Self {
            config,
            engine: None,
            size: None,
            events,
            last_pos: ScreenPoint::default(),
            animation: None,
            style_initiated: false,
            fallback_applied: false,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Create the engine at the given canvas size.
    ///
    /// The engine publishes scene parameters through `frontend`. The style
    /// is not loaded yet; see [`begin_style_load`](Self::begin_style_load).
    /// Returns the renderer, which belongs with the GL frontend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on a second call,
    /// [`Error::InvalidSize`] for a non-positive size,
    /// [`Error::InvalidConfig`] for a config that fails
    /// [`MapConfig::validate`], and whatever the engine returns if it cannot
    /// be created.
    pub fn initialize(
        &mut self,
        width: i32,
        height: i32,
        frontend: UpdateLink<E::Params>,
    ) -> Result<E::Renderer> {
        if self.engine.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let size = CanvasSize::new(width, height)?;
        self.config.validate()?;
        let options = MapOptions {
            size,
            pixel_ratio: self.config.pixel_ratio,
            cache_path: self.config.cache_path.clone(),
            asset_path: self.config.asset_path.clone(),
        };
        let observer: Arc<dyn MapObserver> = self.events.clone();
        let (mut engine, mut renderer) = E::create(&options, frontend, observer)?;
        engine.set_zoom_bounds(self.config.min_zoom, self.config.max_zoom);
        renderer.set_observer(self.events.clone());

        log::info!("map initialized at {width}x{height}");
        self.engine = Some(engine);
        self.size = Some(size);
        Ok(renderer)
    }

    /// Whether [`initialize`](Self::initialize) succeeded.
    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// The engine, once initialized.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Mutable access to the engine.
    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    /// Logical canvas size.
    pub fn size(&self) -> Option<CanvasSize> {
        self.size
    }

    /// The event sink registered with the engine.
    pub fn observer(&self) -> Arc<MapEvents> {
        Arc::clone(&self.events)
    }

    /// Load the configured style, once. Returns whether it was started now.
    pub fn begin_style_load(&mut self) -> bool {
        if self.style_initiated {
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        log::info!("loading style {}", self.config.style_url);
        engine.load_style_url(&self.config.style_url);
        self.style_initiated = true;
        true
    }

    /// Whether a style load has been started.
    pub fn style_initiated(&self) -> bool {
        self.style_initiated
    }

    /// Whether the current style finished loading.
    pub fn is_style_loaded(&self) -> bool {
        self.events.is_style_loaded()
    }

    /// Switch to another style.
    pub fn set_style_url(&mut self, url: &str) {
        if let Some(engine) = self.engine.as_mut() {
            engine.load_style_url(url);
            self.style_initiated = true;
        }
    }

    /// Resize the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] for a non-positive size and
    /// [`Error::NotInitialized`] before initialization. Nothing changes in
    /// either case.
    pub fn resize(&mut self, width: i32, height: i32) -> Result<CanvasSize> {
        let size = CanvasSize::new(width, height)?;
        let engine = self.engine.as_mut().ok_or(Error::NotInitialized)?;
        engine.set_size(size);
        self.size = Some(size);
        self.events.repaint().request();
        Ok(size)
    }

    /// Pointer pressed: start a drag and keep frames coming while the
    /// interaction settles.
    pub fn handle_mouse_press(&mut self, x: f32, y: f32) {
        self.last_pos = ScreenPoint::new(x, y);
        self.request_repaint();
        self.events.repaint().arm_ms(self.config.interaction_settle_ms);
    }

    /// Pointer released.
    pub fn handle_mouse_release(&mut self, _x: f32, _y: f32) {}

    /// Pointer moved; pans the map while `pressed`.
    pub fn handle_mouse_move(&mut self, x: f32, y: f32, pressed: bool) {
        let pos = ScreenPoint::new(x, y);
        if pressed {
            if let Some(engine) = self.engine.as_mut() {
                engine.move_by(pos - self.last_pos);
                engine.trigger_repaint();
                self.events.repaint().request();
            }
        }
        self.last_pos = pos;
    }

    /// Double click: zoom in, or out with `shift`.
    pub fn handle_double_click(&mut self, x: f32, y: f32, shift: bool) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let point = ScreenPoint::new(x, y);
        match self.config.double_click {
            DoubleClickMode::ScaleAboutPoint => {
                let scale = if shift { 0.5 } else { 2.0 };
                engine.scale_by(scale, Some(point));
            }
            DoubleClickMode::CenterAndStep => {
                let center = engine.lat_lng_for_pixel(point);
                let step = if shift { -1.0 } else { 1.0 };
                let zoom = (engine.camera().zoom.unwrap_or(0.0) + step)
                    .clamp(self.config.min_zoom, self.config.max_zoom);
                engine.jump_to(&CameraOptions::default().with_center(center).with_zoom(zoom));
            }
        }
        engine.trigger_repaint();
        self.events.repaint().request();
    }

    /// Wheel or trackpad zoom about the cursor.
    ///
    /// The delta becomes a relative scale `base^(delta / sensitivity)`, so
    /// successive deltas compose multiplicatively.
    pub fn handle_wheel_zoom(&mut self, x: f32, y: f32, delta: f32) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let factor = self
            .config
            .wheel_base
            .powf(f64::from(delta) / self.config.wheel_sensitivity);
        engine.scale_by(factor, Some(ScreenPoint::new(x, y)));
        engine.trigger_repaint();
        self.events.repaint().request();
    }

    /// Pitch slider in `[0, 100]`, mapped to `[0°, 60°]`.
    pub fn set_pitch(&mut self, value: i32) {
        let pitch = f64::from(value).clamp(0.0, SLIDER_MAX) / SLIDER_MAX * MAX_PITCH_DEG;
        self.jump_preserving(|camera| camera.with_pitch(pitch));
    }

    /// Bearing slider in `[0, 100]`, mapped to `[0°, 360°]`.
    pub fn set_bearing(&mut self, value: f32) {
        let bearing = f64::from(value).clamp(0.0, SLIDER_MAX) / SLIDER_MAX * FULL_TURN_DEG;
        self.jump_preserving(|camera| camera.with_bearing(bearing));
    }

    /// Jump to the current camera with one field replaced.
    fn jump_preserving(&mut self, change: impl FnOnce(CameraOptions) -> CameraOptions) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let next = change(engine.camera());
        engine.jump_to(&next);
        engine.trigger_repaint();
        self.events.repaint().request();
    }

    /// Fly to a named destination. Unknown names go to the default
    /// destination. A fly-to in progress is replaced, not blended.
    pub fn fly_to(&mut self, location: &str) {
        self.fly_to_at(location, Instant::now());
    }

    /// [`fly_to`](Self::fly_to) with an explicit start time.
    pub fn fly_to_at(&mut self, location: &str, now: Instant) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let target = self.config.destination(location);
        let camera = engine.camera();
        let fly = &self.config.fly_to;
        self.animation = Some(FlyTo::new(
            camera.center.unwrap_or(target),
            camera.zoom.unwrap_or(fly.fallback_start_zoom),
            target,
            fly,
            (self.config.min_zoom, self.config.max_zoom),
            now,
        ));
        log::debug!("fly to {location:?} -> {target:?}");
        self.request_repaint();
        self.events
            .repaint()
            .arm_ms(fly.duration_ms.saturating_add(fly.tail_ms));
    }

    /// The fly-to in progress, if any.
    pub fn animation(&self) -> Option<&FlyTo> {
        self.animation.as_ref()
    }

    /// Whether a fly-to is in progress.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Advance the fly-to to wall-clock time `now`.
    pub fn tick_animation(&mut self, now: Instant) {
        let (Some(animation), Some(engine)) = (self.animation.as_ref(), self.engine.as_mut()) else {
            return;
        };
        let frame = animation.sample_at(now);
        engine.jump_to(
            &CameraOptions::default()
                .with_center(frame.center)
                .with_zoom(frame.zoom),
        );
        self.events.repaint().request();
        if frame.finished {
            self.animation = None;
        }
    }

    /// Run one iteration of the engine's run loop.
    ///
    /// The GL frontend wraps this in a backend scope so engine work that
    /// touches GL finds the right context current.
    pub fn pump(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.run_once();
        }
    }

    /// Apply the embedded fallback style if a load failure was reported.
    ///
    /// The fallback is applied at most once per controller. Returns whether
    /// it was applied now.
    pub fn apply_pending_fallback(&mut self) -> bool {
        if !self.events.load_failed.swap(false, Ordering::SeqCst) {
            return false;
        }
        if self.fallback_applied {
            log::warn!("map loading failed again; fallback style already applied");
            return false;
        }
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };
        log::info!("applying fallback style");
        engine.load_style_json(&fallback_style_json());
        self.fallback_applied = true;
        true
    }

    /// Mark a repaint as pending.
    pub fn request_repaint(&self) {
        self.events.repaint().request();
    }

    /// Consume the pending repaint, if any.
    pub fn take_repaint_request(&self) -> bool {
        self.events.repaint().take()
    }

    /// Spend one forced repaint frame, if any are left.
    pub fn consume_forced_repaint(&self) -> bool {
        self.events.repaint().consume_forced()
    }

    /// Drop the engine. Input and ticks become no-ops.
    pub fn shutdown(&mut self) {
        self.animation = None;
        self.engine = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use crate::types::LatLng;
    use std::time::Duration;

    fn controller_with(config: MapConfig) -> MapController<FakeEngine> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut controller = MapController::new(config);
        controller.initialize(800, 600, UpdateLink::new()).unwrap();
        // Drop whatever initialization queued.
        controller.take_repaint_request();
        controller
    }

    fn controller() -> MapController<FakeEngine> {
        controller_with(MapConfig::default())
    }

    fn engine(c: &MapController<FakeEngine>) -> &FakeEngine {
        c.engine().unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn initialize_applies_zoom_bounds_and_wires_renderer() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig {
            max_zoom: 18.0,
            ..MapConfig::default()
        });
        let renderer = controller.initialize(640, 480, UpdateLink::new()).unwrap();
        assert!(renderer.observer.is_some());
        assert_eq!(engine(&controller).zoom_bounds, (0.0, 18.0));
        assert_eq!(controller.size(), Some(CanvasSize::new(640, 480).unwrap()));
        assert!(engine(&controller).style_urls.is_empty());
    }

    #[test]
    fn initialize_twice_fails() {
        let mut controller = controller();
        assert!(matches!(
            controller.initialize(800, 600, UpdateLink::new()),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn initialize_rejects_empty_canvas() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig::default());
        assert!(controller.initialize(0, 600, UpdateLink::new()).is_err());
        assert!(!controller.is_initialized());
    }

    #[test]
    fn initialize_rejects_unusable_config() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig {
            min_zoom: 15.0,
            max_zoom: 5.0,
            double_click: DoubleClickMode::CenterAndStep,
            ..MapConfig::default()
        });
        assert!(matches!(
            controller.initialize(800, 600, UpdateLink::new()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(!controller.is_initialized());
        // Input stays a no-op instead of reaching the engine.
        controller.handle_double_click(1.0, 1.0, false);
    }

    #[test]
    fn style_load_starts_once() {
        let mut controller = controller();
        assert!(controller.begin_style_load());
        assert!(!controller.begin_style_load());
        assert_eq!(engine(&controller).style_urls, vec![MapConfig::default().style_url]);
    }

    #[test]
    fn style_load_waits_for_engine() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig::default());
        assert!(!controller.begin_style_load());
        assert!(!controller.style_initiated());
    }

    #[test]
    fn invalid_resize_leaves_state_untouched() {
        let mut controller = controller();
        let before = controller.size();
        for (w, h) in [(0, 100), (100, 0), (-3, 100)] {
            assert!(matches!(controller.resize(w, h), Err(Error::InvalidSize { .. })));
        }
        assert_eq!(controller.size(), before);
        assert_eq!(engine(&controller).size, before.unwrap());
        assert!(!controller.take_repaint_request());
    }

    #[test]
    fn resize_updates_engine() {
        let mut controller = controller();
        let size = controller.resize(1024, 768).unwrap();
        assert_eq!(engine(&controller).size, size);
        assert!(controller.take_repaint_request());
    }

    #[test]
    fn resize_before_initialize_is_an_error() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig::default());
        assert!(matches!(controller.resize(10, 10), Err(Error::NotInitialized)));
    }

    #[test]
    fn drag_pans_by_pointer_delta() {
        let mut controller = controller();
        controller.handle_mouse_press(100.0, 100.0);
        controller.handle_mouse_move(110.0, 95.0, true);
        controller.handle_mouse_move(120.0, 95.0, true);
        assert_eq!(
            engine(&controller).moves,
            vec![ScreenPoint { x: 10.0, y: -5.0 }, ScreenPoint { x: 10.0, y: 0.0 }]
        );
        assert_eq!(engine(&controller).repaint_triggers, 2);
        assert!(controller.take_repaint_request());
    }

    #[test]
    fn hover_does_not_pan() {
        let mut controller = controller();
        controller.handle_mouse_move(50.0, 50.0, false);
        controller.handle_mouse_release(50.0, 50.0);
        assert!(engine(&controller).moves.is_empty());
        assert!(!controller.take_repaint_request());
    }

    #[test]
    fn press_arms_interaction_burst() {
        let mut controller = controller();
        let armed_before = controller.observer().repaint().forced_frames();
        controller.handle_mouse_press(0.0, 0.0);
        assert!(controller.take_repaint_request());
        assert!(controller.observer().repaint().forced_frames() >= armed_before.max(8));
    }

    #[test]
    fn double_click_scales_about_click() {
        let mut controller = controller();
        controller.handle_double_click(30.0, 40.0, false);
        assert!(close(engine(&controller).camera.zoom.unwrap(), 6.0));
        controller.handle_double_click(30.0, 40.0, true);
        assert!(close(engine(&controller).camera.zoom.unwrap(), 5.0));
        assert_eq!(
            engine(&controller).scale_anchors,
            vec![Some(ScreenPoint { x: 30.0, y: 40.0 }); 2]
        );
    }

    #[test]
    fn double_click_center_and_step_clamps() {
        let mut controller = controller_with(MapConfig {
            double_click: DoubleClickMode::CenterAndStep,
            max_zoom: 5.5,
            ..MapConfig::default()
        });
        controller.handle_double_click(20.0, 10.0, false);
        let camera = engine(&controller).camera;
        assert_eq!(camera.center, Some(LatLng::new(1.0, 2.0)));
        assert!(close(camera.zoom.unwrap(), 5.5));

        controller.handle_double_click(20.0, 10.0, true);
        assert!(close(engine(&controller).camera.zoom.unwrap(), 4.5));
    }

    #[test]
    fn wheel_zoom_composes_multiplicatively() {
        let mut twice = controller();
        twice.handle_wheel_zoom(10.0, 10.0, 30.0);
        twice.handle_wheel_zoom(10.0, 10.0, 45.0);

        let mut once = controller();
        let config = MapConfig::default();
        let combined = config.wheel_base.powf(30.0 / config.wheel_sensitivity)
            * config.wheel_base.powf(45.0 / config.wheel_sensitivity);
        once.engine_mut().unwrap().scale_by(combined, None);

        assert!(close(
            engine(&twice).camera.zoom.unwrap(),
            engine(&once).camera.zoom.unwrap()
        ));
        assert!(close(engine(&twice).camera.zoom.unwrap(), 5.75));
    }

    #[test]
    fn negative_wheel_delta_zooms_out() {
        let mut controller = controller();
        controller.handle_wheel_zoom(0.0, 0.0, -100.0);
        assert!(close(engine(&controller).camera.zoom.unwrap(), 4.0));
    }

    #[test]
    fn pitch_preserves_other_fields() {
        let mut controller = controller();
        controller.set_bearing(25.0);
        controller.set_pitch(50);
        assert_eq!(engine(&controller).jumps, 2);
        let camera = engine(&controller).camera;
        assert!(close(camera.pitch.unwrap(), 30.0));
        assert!(close(camera.bearing.unwrap(), 90.0));
        assert!(close(camera.zoom.unwrap(), 5.0));
        assert_eq!(camera.center, Some(LatLng::new(0.0, 0.0)));
    }

    #[test]
    fn sliders_clamp_to_range() {
        let mut controller = controller();
        controller.set_pitch(250);
        controller.set_bearing(-10.0);
        let camera = engine(&controller).camera;
        assert!(close(camera.pitch.unwrap(), 60.0));
        assert!(close(camera.bearing.unwrap(), 0.0));
    }

    #[test]
    fn input_before_initialize_is_ignored() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig::default());
        controller.handle_wheel_zoom(0.0, 0.0, 10.0);
        controller.handle_double_click(0.0, 0.0, false);
        controller.set_pitch(10);
        controller.fly_to("paris");
        assert!(!controller.is_animating());
    }

    #[test]
    fn unknown_destination_flies_to_default() {
        let mut controller = controller();
        controller.fly_to("atlantis");
        assert_eq!(
            controller.animation().unwrap().target(),
            MapConfig::default().default_destination
        );
    }

    #[test]
    fn fly_to_runs_to_completion() {
        let mut controller = controller();
        let start = Instant::now();
        controller.fly_to_at("paris", start);
        assert!(controller.take_repaint_request());
        assert!(controller.observer().repaint().forced_frames() >= 3100 / 16);

        controller.tick_animation(start);
        let camera = engine(&controller).camera;
        assert_eq!(camera.center, Some(LatLng::new(0.0, 0.0)));
        assert!(close(camera.zoom.unwrap(), 5.0));

        controller.tick_animation(start + Duration::from_millis(1200));
        assert!(controller.is_animating());

        controller.tick_animation(start + Duration::from_millis(2500));
        assert!(!controller.is_animating());
        let camera = engine(&controller).camera;
        let paris = controller.config().destination("paris");
        assert!(close(camera.center.unwrap().latitude, paris.latitude));
        assert!(close(camera.center.unwrap().longitude, paris.longitude));
        assert!(close(camera.zoom.unwrap(), 10.0));
    }

    #[test]
    fn second_fly_to_replaces_first() {
        let mut controller = controller();
        let start = Instant::now();
        controller.fly_to_at("paris", start);
        controller.tick_animation(start + Duration::from_millis(1000));
        let mid_flight = engine(&controller).camera;

        controller.fly_to_at("new_york", start + Duration::from_millis(1000));
        let animation = controller.animation().unwrap();
        assert_eq!(animation.target(), controller.config().destination("new_york"));

        // The new trajectory starts where the old one was interrupted.
        let frame = animation.sample(0.0);
        assert_eq!(Some(frame.center), mid_flight.center);

        controller.tick_animation(start + Duration::from_millis(3500));
        let ny = controller.config().destination("new_york");
        let center = engine(&controller).camera.center.unwrap();
        assert!(close(center.latitude, ny.latitude));
        assert!(close(center.longitude, ny.longitude));
        assert!(!controller.is_animating());
    }

    #[test]
    fn camera_and_source_events_request_repaint() {
        let controller = controller();
        let observer = controller.observer();

        observer.on_camera_did_change(CameraChangeMode::Animated);
        observer.on_source_changed("osm");
        assert!(controller.take_repaint_request());
        assert!(!controller.take_repaint_request());

        observer.on_did_finish_rendering_frame(RenderFrameStatus::default());
        assert!(!controller.take_repaint_request());
        observer.on_did_finish_rendering_frame(RenderFrameStatus {
            needs_repaint: true,
            fully_rendered: false,
        });
        assert!(controller.take_repaint_request());
        assert!(controller.consume_forced_repaint());
    }

    #[test]
    fn renderer_invalidation_requests_repaint() {
        let mut controller = MapController::<FakeEngine>::new(MapConfig::default());
        let renderer = controller.initialize(10, 10, UpdateLink::new()).unwrap();
        controller.take_repaint_request();
        renderer.observer.unwrap().on_invalidate();
        assert!(controller.take_repaint_request());
    }

    #[test]
    fn style_lifecycle_is_tracked() {
        let controller = controller();
        let observer = controller.observer();
        assert!(!controller.is_style_loaded());
        observer.on_did_finish_loading_style();
        observer.on_did_become_idle();
        assert!(controller.is_style_loaded());
        assert!(observer.is_idle());

        observer.on_will_start_loading_map();
        assert!(!controller.is_style_loaded());
        assert!(!observer.is_idle());
    }

    #[test]
    fn fallback_style_applied_once() {
        let mut controller = controller();
        let observer = controller.observer();
        assert!(!controller.apply_pending_fallback());

        observer.on_did_fail_loading_map(MapLoadError::StyleLoad, "offline");
        assert!(controller.apply_pending_fallback());
        assert_eq!(engine(&controller).style_jsons, vec![fallback_style_json()]);
        assert!(controller.is_style_loaded());

        observer.on_did_fail_loading_map(MapLoadError::StyleParse, "bad fallback");
        assert!(!controller.apply_pending_fallback());
        assert_eq!(engine(&controller).style_jsons.len(), 1);
    }

    #[test]
    fn observer_is_usable_from_worker_threads() {
        let controller = controller();
        let observer: Arc<dyn MapObserver> = controller.observer();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let observer = Arc::clone(&observer);
                std::thread::spawn(move || observer.on_source_changed("tiles"))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(controller.take_repaint_request());
        assert!(!controller.take_repaint_request());
    }

    #[test]
    fn pump_runs_engine_loop() {
        let mut controller = controller();
        controller.pump();
        controller.pump();
        assert_eq!(engine(&controller).run_count, 2);
    }

    #[test]
    fn shutdown_drops_engine() {
        let mut controller = controller();
        controller.fly_to("tokyo");
        controller.shutdown();
        assert!(!controller.is_initialized());
        assert!(!controller.is_animating());
        controller.pump();
    }
}
