//! Initialization-time configuration.
//!
//! Every field has a default, so a config file only needs to name what it
//! changes:
//!
//! ```
//! # use glow_map_bridge::MapConfig;
//! let config = MapConfig::from_json_str(r#"{ "max_zoom": 18.0 }"#).unwrap();
//! assert_eq!(config.max_zoom, 18.0);
//! assert_eq!(config.min_zoom, MapConfig::default().min_zoom);
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::LatLng;

/// How a double click changes the camera.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleClickMode {
    /// Scale by 2 (or 0.5 with the modifier) about the clicked pixel.
    #[default]
    ScaleAboutPoint,
    /// Center on the clicked coordinate and step the zoom level by one,
    /// clamped to the configured zoom range.
    CenterAndStep,
}

/// Tuning for the fly-to animation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlyToConfig {
    /// Total animation length in milliseconds.
    pub duration_ms: u32,
    /// Fraction of the duration spent zooming out to the pull-back level.
    pub mid_ratio: f64,
    /// Fraction of the duration during which the center barely moves.
    pub center_hold_ratio: f64,
    /// Zoom level the animation ends at.
    pub target_zoom: f64,
    /// Zoom assumed when the engine reports no current zoom.
    pub fallback_start_zoom: f64,
    /// Extra forced-repaint time after the animation ends.
    pub tail_ms: u32,
}

impl Default for FlyToConfig {
    fn default() -> Self {
        Self {
            duration_ms: 2500,
            mid_ratio: 0.60,
            center_hold_ratio: 0.20,
            target_zoom: 10.0,
            fallback_start_zoom: 10.0,
            tail_ms: 600,
        }
    }
}

/// Configuration for a [`MapView`](crate::MapView).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// On-disk tile/resource cache, owned by the map engine.
    pub cache_path: PathBuf,
    /// Base path for `asset://` resources.
    pub asset_path: PathBuf,
    /// Style loaded once a GL context has been captured.
    pub style_url: String,
    /// Device pixel ratio handed to the engine and renderer.
    pub pixel_ratio: f32,
    /// Canvas size used when the first tick arrives before the host has
    /// reported one.
    pub initial_size: (i32, i32),
    /// Lowest zoom level the camera may reach.
    pub min_zoom: f64,
    /// Highest zoom level the camera may reach.
    pub max_zoom: f64,
    /// Base of the wheel-zoom scale factor.
    pub wheel_base: f64,
    /// Wheel delta that scales by exactly `wheel_base`.
    pub wheel_sensitivity: f64,
    /// Double-click behavior.
    pub double_click: DoubleClickMode,
    /// Forced-repaint burst after engine camera/source/frame events.
    pub settle_ms: u32,
    /// Forced-repaint burst after a pointer press.
    pub interaction_settle_ms: u32,
    /// Fly-to tuning.
    pub fly_to: FlyToConfig,
    /// Named fly-to destinations.
    pub destinations: HashMap<String, LatLng>,
    /// Destination used for unknown names.
    pub default_destination: LatLng,
}

impl Default for MapConfig {
    fn default() -> Self {
        let tokyo = LatLng::new(35.6895, 139.6917);
        let destinations = HashMap::from([
            ("paris".to_owned(), LatLng::new(48.8566, 2.3522)),
            ("new_york".to_owned(), LatLng::new(40.7128, -74.0060)),
            ("tokyo".to_owned(), tokyo),
        ]);
        Self {
            cache_path: PathBuf::from(".mbgl-cache.db"),
            asset_path: PathBuf::from("."),
            style_url: "https://demotiles.maplibre.org/style.json".to_owned(),
            pixel_ratio: 1.0,
            initial_size: (776, 259),
            min_zoom: 0.0,
            max_zoom: 20.0,
            wheel_base: 2.0,
            wheel_sensitivity: 100.0,
            double_click: DoubleClickMode::default(),
            settle_ms: 100,
            interaction_settle_ms: 120,
            fly_to: FlyToConfig::default(),
            destinations,
            default_destination: tokyo,
        }
    }
}

impl MapConfig {
    /// Parse a JSON config. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or mistyped fields and
    /// [`Error::InvalidConfig`] when [`validate`](Self::validate) rejects
    /// the result.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values the controller does arithmetic with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.min_zoom.is_finite() || !self.max_zoom.is_finite() {
            return Err(invalid("zoom bounds must be finite"));
        }
        if self.min_zoom > self.max_zoom {
            return Err(invalid(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.wheel_sensitivity.is_finite() && self.wheel_sensitivity > 0.0) {
            return Err(invalid("wheel_sensitivity must be finite and > 0"));
        }
        if !(self.wheel_base.is_finite() && self.wheel_base > 0.0) {
            return Err(invalid("wheel_base must be finite and > 0"));
        }
        if !(self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0) {
            return Err(invalid("pixel_ratio must be finite and > 0"));
        }
        let fly = &self.fly_to;
        for (name, ratio) in [
            ("fly_to.mid_ratio", fly.mid_ratio),
            ("fly_to.center_hold_ratio", fly.center_hold_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid(format!("{name} {ratio} is outside [0, 1]")));
            }
        }
        if !fly.target_zoom.is_finite() || !fly.fallback_start_zoom.is_finite() {
            return Err(invalid("fly_to zoom levels must be finite"));
        }
        Ok(())
    }

    /// Resolve a fly-to destination keyword. Unknown keywords resolve to
    /// [`default_destination`](Self::default_destination).
    #[must_use]
    pub fn destination(&self, name: &str) -> LatLng {
        self.destinations
            .get(name)
            .copied()
            .unwrap_or(self.default_destination)
    }
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidConfig(reason.into())
}

/// Style applied once when the configured style fails to load: a single
/// opaque background layer with no sources.
#[must_use]
pub fn fallback_style_json() -> String {
    serde_json::json!({
        "version": 8,
        "name": "solid-background",
        "sources": {},
        "layers": [{
            "id": "background",
            "type": "background",
            "paint": {
                "background-color": "rgb(255, 0, 0)",
                "background-opacity": 1.0
            }
        }]
    })
    .to_string()
}
