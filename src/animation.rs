//! Fly-to camera animation.
//!
//! A fly-to zooms out to a pull-back level, pans, and zooms back in. Zoom
//! runs in two eased phases split at `mid_ratio`; the center barely moves for
//! the first `center_hold_ratio` of the duration (10% of its travel) and
//! covers the rest afterwards, so the destination does not rush across the
//! screen while the camera is still pulling back.

use std::time::{Duration, Instant};

use crate::config::FlyToConfig;
use crate::types::LatLng;

/// Share of the center travel covered during the hold phase.
const HOLD_TRAVEL: f64 = 0.10;

/// Cubic ease-in-out: `4t³` below one half, mirrored above.
#[must_use]
pub fn ease_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

fn lerp(a: f64, b: f64, k: f64) -> f64 {
    a + (b - a) * k
}

/// Planar approximation of the angular distance between two coordinates,
/// in degrees.
#[must_use]
pub fn approx_distance_deg(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let x = (b.longitude - a.longitude).to_radians() * ((lat1 + lat2) * 0.5).cos();
    let y = lat2 - lat1;
    x.hypot(y).to_degrees()
}

/// Zoom level the animation pulls back to between `start` and `target`.
///
/// The pull-back grows with distance (8 levels plus up to 3 more) and is
/// clamped to the zoom range.
#[must_use]
pub fn pull_back_zoom(start: LatLng, target: LatLng, start_zoom: f64, min_zoom: f64, max_zoom: f64) -> f64 {
    let dist = approx_distance_deg(start, target);
    let zoom_out = (8.0 + (dist / 8.0).min(3.0)).max(2.0);
    (start_zoom - zoom_out).min(max_zoom).max(min_zoom)
}

/// One sampled animation frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyToFrame {
    /// Camera center.
    pub center: LatLng,
    /// Zoom level.
    pub zoom: f64,
    /// The animation has reached its end.
    pub finished: bool,
}

/// An in-flight fly-to.
#[derive(Clone, Debug, PartialEq)]
pub struct FlyTo {
    start_center: LatLng,
    target_center: LatLng,
    start_zoom: f64,
    mid_zoom: f64,
    target_zoom: f64,
    mid_ratio: f64,
    center_hold_ratio: f64,
    start_time: Instant,
    duration: Duration,
}

impl FlyTo {
    /// Plan a fly-to from the current camera to `target`.
    #[must_use]
    pub fn new(
        start_center: LatLng,
        start_zoom: f64,
        target_center: LatLng,
        config: &FlyToConfig,
        zoom_range: (f64, f64),
        start_time: Instant,
    ) -> Self {
        let (min_zoom, max_zoom) = zoom_range;
        Self {
            start_center,
            target_center,
            start_zoom,
            mid_zoom: pull_back_zoom(start_center, target_center, start_zoom, min_zoom, max_zoom),
            target_zoom: config.target_zoom,
            mid_ratio: config.mid_ratio,
            center_hold_ratio: config.center_hold_ratio,
            start_time,
            duration: Duration::from_millis(u64::from(config.duration_ms)),
        }
    }

    /// Destination center.
    #[must_use]
    pub fn target(&self) -> LatLng {
        self.target_center
    }

    /// Zoom level at the turning point.
    #[must_use]
    pub fn mid_zoom(&self) -> f64 {
        self.mid_zoom
    }

    /// Sample the camera at wall-clock time `now`.
    #[must_use]
    pub fn sample_at(&self, now: Instant) -> FlyToFrame {
        let elapsed = now.saturating_duration_since(self.start_time);
        let t = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        self.sample(t)
    }

    /// Sample the camera at normalized time `t` in `[0, 1]`.
    #[must_use]
    pub fn sample(&self, t: f64) -> FlyToFrame {
        let t = t.clamp(0.0, 1.0);

        let hold = self.center_hold_ratio;
        let k_center = if t <= hold {
            let t_hold = if hold > 0.0 { t / hold } else { 1.0 };
            HOLD_TRAVEL * ease_in_out(t_hold)
        } else {
            let t_rest = (t - hold) / (1.0 - hold).max(1e-6);
            HOLD_TRAVEL + (1.0 - HOLD_TRAVEL) * ease_in_out(t_rest)
        };
        let center = LatLng::new(
            lerp(self.start_center.latitude, self.target_center.latitude, k_center),
            lerp(self.start_center.longitude, self.target_center.longitude, k_center),
        );

        let mid = self.mid_ratio;
        let zoom = if t <= mid {
            let t0 = if mid > 0.0 { t / mid } else { 1.0 };
            lerp(self.start_zoom, self.mid_zoom, ease_in_out(t0))
        } else {
            let t1 = (t - mid) / (1.0 - mid).max(1e-6);
            lerp(self.mid_zoom, self.target_zoom, ease_in_out(t1))
        };

        FlyToFrame {
            center,
            zoom,
            finished: t >= 1.0,
        }
    }
}
