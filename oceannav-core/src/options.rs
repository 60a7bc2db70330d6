//! Map and interpolation options shared by both panels.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::patch::overlay;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How gridded data is resampled onto the map projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    #[default]
    Gaussian,
    Bilinear,
    Inverse,
    Nearest,
}

impl InterpolationMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Gaussian => "Gaussian Weighting",
            Self::Bilinear => "Bilinear",
            Self::Inverse => "Inverse Square",
            Self::Nearest => "Nearest Neighbour",
        }
    }
}

/// Source of the bathymetry contour layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BathyContour {
    #[default]
    Etopo1,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Interpolation and map-layer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(rename = "interpType", default)]
    pub interp_type: InterpolationMethod,
    /// Sampling radius in km.
    #[serde(rename = "interpRadius", default = "default_interp_radius")]
    pub interp_radius: u32,
    #[serde(rename = "interpNeighbours", default = "default_interp_neighbours")]
    pub interp_neighbours: u32,
    /// Show bathymetry contours.
    #[serde(default = "default_true")]
    pub bathymetry: bool,
    /// Opacity of bathymetry contours, 0.0..=1.0.
    #[serde(rename = "mapBathymetryOpacity", default = "default_bathymetry_opacity")]
    pub map_bathymetry_opacity: f64,
    /// Hill shading on topography.
    #[serde(rename = "topoShadedRelief", default)]
    pub topo_shaded_relief: bool,
    #[serde(rename = "bathyContour", default)]
    pub bathy_contour: BathyContour,
}

pub const INTERP_RADIUS_RANGE: (u32, u32) = (5, 100);
pub const INTERP_NEIGHBOURS_RANGE: (u32, u32) = (1, 50);

fn default_interp_radius() -> u32 {
    25
}
fn default_interp_neighbours() -> u32 {
    10
}
fn default_true() -> bool {
    true
}
fn default_bathymetry_opacity() -> f64 {
    0.75
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interp_type: InterpolationMethod::default(),
            interp_radius: default_interp_radius(),
            interp_neighbours: default_interp_neighbours(),
            bathymetry: true,
            map_bathymetry_opacity: default_bathymetry_opacity(),
            topo_shaded_relief: false,
            bathy_contour: BathyContour::default(),
        }
    }
}

impl Options {
    /// Merge the fields present in `patch` and clamp numeric fields into
    /// their allowed ranges. Absent fields keep their current value; present
    /// fields are taken as given, including `false` and `0.0`.
    pub fn apply_patch(&mut self, patch: &OptionsPatch) {
        if let Some(v) = patch.interp_type {
            self.interp_type = v;
        }
        if let Some(v) = patch.interp_radius {
            self.interp_radius = v.clamp(INTERP_RADIUS_RANGE.0, INTERP_RADIUS_RANGE.1);
        }
        if let Some(v) = patch.interp_neighbours {
            self.interp_neighbours =
                v.clamp(INTERP_NEIGHBOURS_RANGE.0, INTERP_NEIGHBOURS_RANGE.1);
        }
        if let Some(v) = patch.bathymetry {
            self.bathymetry = v;
        }
        if let Some(v) = patch.map_bathymetry_opacity {
            self.map_bathymetry_opacity = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        if let Some(v) = patch.topo_shaded_relief {
            self.topo_shaded_relief = v;
        }
        if let Some(v) = patch.bathy_contour {
            self.bathy_contour = v;
        }
        debug!(options = ?self, "Options updated");
    }
}

/// Partial options update. Only `Some` fields are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    #[serde(rename = "interpType", skip_serializing_if = "Option::is_none")]
    pub interp_type: Option<InterpolationMethod>,
    #[serde(rename = "interpRadius", skip_serializing_if = "Option::is_none")]
    pub interp_radius: Option<u32>,
    #[serde(rename = "interpNeighbours", skip_serializing_if = "Option::is_none")]
    pub interp_neighbours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathymetry: Option<bool>,
    #[serde(rename = "mapBathymetryOpacity", skip_serializing_if = "Option::is_none")]
    pub map_bathymetry_opacity: Option<f64>,
    #[serde(rename = "topoShadedRelief", skip_serializing_if = "Option::is_none")]
    pub topo_shaded_relief: Option<bool>,
    #[serde(rename = "bathyContour", skip_serializing_if = "Option::is_none")]
    pub bathy_contour: Option<BathyContour>,
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: OptionsPatch) {
        overlay(&mut self.interp_type, other.interp_type);
        overlay(&mut self.interp_radius, other.interp_radius);
        overlay(&mut self.interp_neighbours, other.interp_neighbours);
        overlay(&mut self.bathymetry, other.bathymetry);
        overlay(&mut self.map_bathymetry_opacity, other.map_bathymetry_opacity);
        overlay(&mut self.topo_shaded_relief, other.topo_shaded_relief);
        overlay(&mut self.bathy_contour, other.bathy_contour);
    }

    /// A patch that sets every field to the value in `options`.
    pub fn from_options(options: &Options) -> Self {
        Self {
            interp_type: Some(options.interp_type),
            interp_radius: Some(options.interp_radius),
            interp_neighbours: Some(options.interp_neighbours),
            bathymetry: Some(options.bathymetry),
            map_bathymetry_opacity: Some(options.map_bathymetry_opacity),
            topo_shaded_relief: Some(options.topo_shaded_relief),
            bathy_contour: Some(options.bathy_contour),
        }
    }
}
