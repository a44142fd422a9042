//! Plain value types shared between the controller, the GL frontend and the
//! host.

use std::ffi::c_void;
use std::num::NonZeroU32;
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Size of the map canvas in device pixels.
///
/// Both dimensions are strictly positive. Callers reject zero or negative
/// sizes through [`CanvasSize::new`] instead of clamping them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    width: u32,
    height: u32,
}

impl CanvasSize {
    /// Validate host-supplied dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSize`] if either dimension is `<= 0`.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(Self {
                width: w,
                height: h,
            }),
            _ => Err(Error::InvalidSize { width, height }),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(self) -> u32 {
        self.height
    }
}

/// A geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct LatLng {
    /// Latitude, degrees north.
    pub latitude: f64,
    /// Longitude, degrees east.
    pub longitude: f64,
}

impl LatLng {
    /// Build a coordinate from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A point on the canvas in logical pixels, origin top-left.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl ScreenPoint {
    /// Build a point from pointer coordinates as the host reports them.
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: f64::from(x),
            y: f64::from(y),
        }
    }
}

impl std::ops::Sub for ScreenPoint {
    type Output = ScreenPoint;

    fn sub(self, rhs: Self) -> Self::Output {
        ScreenPoint {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// A partial camera description. `None` fields are left untouched by
/// [`MapEngine::jump_to`](crate::engine::MapEngine::jump_to).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraOptions {
    /// Map center.
    pub center: Option<LatLng>,
    /// Zoom level.
    pub zoom: Option<f64>,
    /// Bearing in degrees, clockwise from north.
    pub bearing: Option<f64>,
    /// Pitch in degrees from the nadir.
    pub pitch: Option<f64>,
}

impl CameraOptions {
    /// Set the center.
    #[must_use]
    pub fn with_center(mut self, center: LatLng) -> Self {
        self.center = Some(center);
        self
    }

    /// Set the zoom level.
    #[must_use]
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    /// Set the bearing.
    #[must_use]
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Set the pitch.
    #[must_use]
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }
}

/// Opaque platform GL context handle (a `CGLContextObj`, `HGLRC`,
/// `EGLContext`, ...).
///
/// Only the backend compares and re-installs these; nothing dereferences
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextToken(NonNull<c_void>);

impl ContextToken {
    /// Wrap a raw platform handle. Returns `None` for a null pointer.
    #[must_use]
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    /// The raw platform handle.
    #[must_use]
    pub fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Address of a resolved GL entry point.
pub type ProcAddress = NonNull<c_void>;

/// Row order of a texture as the host should interpret it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureOrigin {
    /// First row is the top of the image.
    TopLeft,
    /// First row is the bottom of the image (OpenGL framebuffer order).
    BottomLeft,
}

/// A GL texture the host may sample but does not own.
///
/// The producer keeps the texture alive; the host must not delete it and
/// must not hold on to it past the producer's [`destroy`](crate::MapView::destroy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowedTexture {
    id: NonZeroU32,
    size: CanvasSize,
    origin: TextureOrigin,
}

impl BorrowedTexture {
    pub(crate) fn new(texture: glow::Texture, size: CanvasSize) -> Self {
        Self {
            id: texture.0,
            size,
            origin: TextureOrigin::BottomLeft,
        }
    }

    /// GL texture name, for hosts that talk to GL directly.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    /// The texture as a glow handle.
    #[must_use]
    pub fn texture(&self) -> glow::Texture {
        glow::NativeTexture(self.id)
    }

    /// Texture size in pixels.
    #[must_use]
    pub fn size(&self) -> CanvasSize {
        self.size
    }

    /// Row order of the texture contents.
    #[must_use]
    pub fn origin(&self) -> TextureOrigin {
        self.origin
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn canvas_size_accepts_positive() {
        let size = CanvasSize::new(776, 259).unwrap();
        assert_eq!(size.width(), 776);
        assert_eq!(size.height(), 259);
    }

    #[test]
    fn canvas_size_rejects_zero_and_negative() {
        for (w, h) in [(0, 10), (10, 0), (-1, 10), (10, -5), (0, 0)] {
            assert!(
                matches!(CanvasSize::new(w, h), Err(Error::InvalidSize { .. })),
                "{w}x{h} should be rejected",
            );
        }
    }

    #[test]
    fn context_token_rejects_null() {
        assert!(ContextToken::from_raw(std::ptr::null_mut()).is_none());
    }

    #[test]
    fn screen_point_difference() {
        let d = ScreenPoint::new(10.0, 4.0) - ScreenPoint::new(3.0, 6.0);
        assert_eq!(d, ScreenPoint { x: 7.0, y: -2.0 });
    }

    #[test]
    fn camera_builder_sets_only_requested_fields() {
        let cam = CameraOptions::default().with_pitch(30.0);
        assert_eq!(cam.pitch, Some(30.0));
        assert!(cam.center.is_none() && cam.zoom.is_none() && cam.bearing.is_none());
    }
}
