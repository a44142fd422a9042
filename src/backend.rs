//! Context ownership and the backend handed to the map renderer.
//!
//! [`GlBackend`] captures the host's GL context the first time it sees one
//! current and afterwards makes sure that context is current whenever the
//! map renderer draws. The raw platform handle never leaves this module
//! except as an opaque [`ContextToken`].

use std::ffi::c_void;
use std::ops::{Deref, DerefMut};

use crate::types::{CanvasSize, ContextToken, ProcAddress};

/// Platform context operations (CGL, WGL, EGL, GLX, ...).
///
/// Implemented by the host integration, usually through [`FnPlatform`].
pub trait GlPlatform {
    /// The context current on this thread, if any.
    fn current_context(&self) -> Option<ContextToken>;

    /// Make `context` current on this thread.
    fn make_current(&self, context: ContextToken);

    /// Resolve a GL symbol. Returns null when the symbol is unknown.
    fn proc_address(&self, name: &str) -> *const c_void;
}

/// A [`GlPlatform`] assembled from closures, in the style of
/// `glow::Context::from_loader_function`.
pub struct FnPlatform<C, M, L> {
    current: C,
    make_current: M,
    loader: L,
}

impl<C, M, L> FnPlatform<C, M, L>
where
    C: Fn() -> Option<ContextToken>,
    M: Fn(ContextToken),
    L: Fn(&str) -> *const c_void,
{
    /// Wrap the three platform entry points.
    pub fn new(current: C, make_current: M, loader: L) -> Self {
        Self {
            current,
            make_current,
            loader,
        }
    }
}

impl<C, M, L> GlPlatform for FnPlatform<C, M, L>
where
    C: Fn() -> Option<ContextToken>,
    M: Fn(ContextToken),
    L: Fn(&str) -> *const c_void,
{
    fn current_context(&self) -> Option<ContextToken> {
        (self.current)()
    }

    fn make_current(&self, context: ContextToken) {
        (self.make_current)(context);
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        (self.loader)(name)
    }
}

/// The default render target as the map renderer sees it.
///
/// Binding is a no-op: the frontend binds the shared framebuffer before it
/// hands control to the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Renderable {
    size: CanvasSize,
}

impl Renderable {
    /// Size the renderer should draw at.
    #[must_use]
    pub fn size(&self) -> CanvasSize {
        self.size
    }
}

/// What the map renderer expects from its backend.
pub trait RendererBackend {
    /// Ensure the backend's context is current. Calls may nest.
    fn activate(&mut self);

    /// Undo the matching [`activate`](Self::activate).
    fn deactivate(&mut self);

    /// Mark every piece of GL state the renderer caches as unknown.
    fn update_assumed_state(&mut self);

    /// Whether [`update_assumed_state`](Self::update_assumed_state) was
    /// called since the last check. Clears the flag.
    fn take_dirty_state(&mut self) -> bool;

    /// Resolve a GL extension entry point. `None` means unavailable.
    fn extension_function_pointer(&self, name: &str) -> Option<ProcAddress>;

    /// The render target the renderer draws into.
    fn default_renderable(&mut self) -> &Renderable;
}

/// Backend adapter bound to the host's GL context.
pub struct GlBackend<P> {
    platform: P,
    size: CanvasSize,
    renderable: Option<Renderable>,
    context: Option<ContextToken>,
    /// Context that was current before the outermost `activate`, if we
    /// replaced it.
    previous: Option<ContextToken>,
    depth: u32,
    state_dirty: bool,
}

impl<P: GlPlatform> GlBackend<P> {
    /// A backend with no captured context.
    pub fn new(platform: P, size: CanvasSize) -> Self {
        Self {
            platform,
            size,
            renderable: None,
            context: None,
            previous: None,
            depth: 0,
            state_dirty: true,
        }
    }

    /// Adopt the context current on this thread as ours.
    ///
    /// Once a context is held this is a no-op while the same context stays
    /// current. A different current context means the host migrated; it is
    /// re-captured. Returns whether a context is held afterwards.
    pub fn capture_context(&mut self) -> bool {
        let Some(current) = self.platform.current_context() else {
            return self.context.is_some();
        };
        match self.context {
            Some(held) if held == current => {}
            Some(held) => {
                log::info!("GL context migrated from {:p} to {:p}", held.as_raw(), current.as_raw());
                self.context = Some(current);
                self.state_dirty = true;
            }
            None => {
                log::info!("captured GL context {:p}", current.as_raw());
                self.context = Some(current);
            }
        }
        true
    }

    /// Whether a context has been captured.
    #[must_use]
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Current logical size.
    #[must_use]
    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Change the logical size. An existing renderable is replaced so the
    /// renderer never sees a stale size.
    pub fn set_size(&mut self, size: CanvasSize) {
        self.size = size;
        if self.renderable.is_some() {
            self.renderable = Some(Renderable { size });
        }
    }
}

impl<P: GlPlatform> RendererBackend for GlBackend<P> {
    fn activate(&mut self) {
        self.depth += 1;
        if self.depth > 1 {
            return;
        }
        let Some(context) = self.context else {
            return;
        };
        let current = self.platform.current_context();
        if current != Some(context) {
            self.previous = current;
            self.platform.make_current(context);
        }
    }

    fn deactivate(&mut self) {
        if self.depth == 0 {
            log::warn!("backend deactivated without matching activate");
            return;
        }
        self.depth -= 1;
        if self.depth > 0 {
            return;
        }
        if let Some(previous) = self.previous.take() {
            self.platform.make_current(previous);
        }
    }

    fn update_assumed_state(&mut self) {
        self.state_dirty = true;
    }

    fn take_dirty_state(&mut self) -> bool {
        std::mem::take(&mut self.state_dirty)
    }

    fn extension_function_pointer(&self, name: &str) -> Option<ProcAddress> {
        let addr = ProcAddress::new(self.platform.proc_address(name).cast_mut());
        if addr.is_none() {
            log::debug!("GL symbol {name} not found");
        }
        addr
    }

    fn default_renderable(&mut self) -> &Renderable {
        let size = self.size;
        self.renderable.get_or_insert(Renderable { size })
    }
}

/// Keeps a backend active for as long as it lives.
///
/// Dereferences to the backend so the renderer can be handed the same object
/// the scope was opened on.
pub struct BackendScope<'a, B: RendererBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: RendererBackend + ?Sized> BackendScope<'a, B> {
    /// Activate `backend` until the scope is dropped.
    pub fn new(backend: &'a mut B) -> Self {
        backend.activate();
        Self { backend }
    }
}

impl<B: RendererBackend + ?Sized> Deref for BackendScope<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: RendererBackend + ?Sized> DerefMut for BackendScope<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: RendererBackend + ?Sized> Drop for BackendScope<'_, B> {
    fn drop(&mut self) {
        self.backend.deactivate();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::FakePlatform;

    fn size() -> CanvasSize {
        CanvasSize::new(64, 32).unwrap()
    }

    #[test]
    fn capture_requires_current_context() {
        let platform = FakePlatform::new();
        let mut backend = GlBackend::new(platform.clone(), size());
        assert!(!backend.capture_context());
        assert!(!backend.has_context());

        platform.set_current(Some(1));
        assert!(backend.capture_context());
        assert!(backend.has_context());
    }

    #[test]
    fn capture_is_idempotent_and_follows_migration() {
        let platform = FakePlatform::new();
        platform.set_current(Some(1));
        let mut backend = GlBackend::new(platform.clone(), size());
        backend.capture_context();
        backend.take_dirty_state();

        backend.capture_context();
        assert!(!backend.take_dirty_state());

        platform.set_current(Some(2));
        backend.capture_context();
        assert!(backend.take_dirty_state());

        // Activation now targets the migrated context.
        platform.set_current(Some(3));
        backend.activate();
        assert_eq!(platform.current(), Some(2));
        backend.deactivate();
        assert_eq!(platform.current(), Some(3));
    }

    #[test]
    fn losing_current_context_keeps_capture() {
        let platform = FakePlatform::new();
        platform.set_current(Some(1));
        let mut backend = GlBackend::new(platform.clone(), size());
        backend.capture_context();
        platform.set_current(None);
        assert!(backend.capture_context());
    }

    #[test]
    fn activate_swaps_and_deactivate_restores() {
        let platform = FakePlatform::new();
        platform.set_current(Some(1));
        let mut backend = GlBackend::new(platform.clone(), size());
        backend.capture_context();

        platform.set_current(Some(7));
        {
            let _scope = BackendScope::new(&mut backend);
            assert_eq!(platform.current(), Some(1));
        }
        assert_eq!(platform.current(), Some(7));
    }

    #[test]
    fn activate_on_current_context_does_not_switch() {
        let platform = FakePlatform::new();
        platform.set_current(Some(1));
        let mut backend = GlBackend::new(platform.clone(), size());
        backend.capture_context();

        let switches = platform.switches();
        {
            let _scope = BackendScope::new(&mut backend);
        }
        assert_eq!(platform.switches(), switches);
        assert_eq!(platform.current(), Some(1));
    }

    #[test]
    fn nested_activation_restores_once_at_outermost_exit() {
        let platform = FakePlatform::new();
        platform.set_current(Some(1));
        let mut backend = GlBackend::new(platform.clone(), size());
        backend.capture_context();
        platform.set_current(Some(5));

        let mut outer = BackendScope::new(&mut backend);
        outer.activate();
        assert_eq!(platform.current(), Some(1));
        outer.deactivate();
        assert_eq!(platform.current(), Some(1));
        drop(outer);
        assert_eq!(platform.current(), Some(5));
    }

    #[test]
    fn unbalanced_deactivate_is_ignored() {
        let platform = FakePlatform::new();
        let mut backend = GlBackend::new(platform, size());
        backend.deactivate();
        backend.activate();
        backend.deactivate();
    }

    #[test]
    fn missing_extension_is_none() {
        let platform = FakePlatform::new();
        platform.add_symbol("glFoo");
        let backend = GlBackend::new(platform, size());
        assert!(backend.extension_function_pointer("glFoo").is_some());
        assert!(backend.extension_function_pointer("glBar").is_none());
    }

    #[test]
    fn set_size_replaces_renderable() {
        let platform = FakePlatform::new();
        let mut backend = GlBackend::new(platform, size());
        assert_eq!(backend.default_renderable().size(), size());

        let bigger = CanvasSize::new(128, 96).unwrap();
        backend.set_size(bigger);
        assert_eq!(backend.default_renderable().size(), bigger);
        assert_eq!(backend.size(), bigger);
    }

    #[test]
    fn update_assumed_state_marks_dirty() {
        let platform = FakePlatform::new();
        let mut backend = GlBackend::new(platform, size());
        assert!(backend.take_dirty_state());
        assert!(!backend.take_dirty_state());
        backend.update_assumed_state();
        assert!(backend.take_dirty_state());
    }
}
