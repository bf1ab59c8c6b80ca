use serde::{Deserialize, Serialize};

use crate::consts::{
    NORMALIZATION_BACKGROUND_LIMIT_DEFAULT, NORMALIZATION_HOT_PIXEL_RADIUS_DEFAULT,
    NORMALIZATION_NOISE_REDUCTION_RADIUS_DEFAULT, NORMALIZATION_REFERENCE_THRESHOLD_DEFAULT,
    NORMALIZATION_SCALE_DEFAULT, NORMALIZATION_SCALE_MIN, NORMALIZATION_TARGET_THRESHOLD_DEFAULT,
};

/// Configuration for [`crate::normalization::engine::build_normalization`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizationConfig {
    /// Normalization scale, in pixels; must be >= [`NORMALIZATION_SCALE_MIN`].
    #[serde(default = "default_scale")]
    pub scale: u32,

    /// Skip the `A` solve and fix it to 1.0, leaving only an offset fit.
    #[serde(default)]
    pub no_scale: bool,

    #[serde(default = "default_true")]
    pub enable_rejection: bool,

    #[serde(default = "default_background_limit")]
    pub background_limit: f64,

    #[serde(default = "default_reference_threshold")]
    pub reference_threshold: f64,

    #[serde(default = "default_target_threshold")]
    pub target_threshold: f64,

    #[serde(default = "default_hot_pixel_radius")]
    pub hot_pixel_filter_radius: u32,

    #[serde(default = "default_noise_reduction_radius")]
    pub noise_reduction_filter_radius: u32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            no_scale: false,
            enable_rejection: true,
            background_limit: default_background_limit(),
            reference_threshold: default_reference_threshold(),
            target_threshold: default_target_threshold(),
            hot_pixel_filter_radius: default_hot_pixel_radius(),
            noise_reduction_filter_radius: default_noise_reduction_radius(),
        }
    }
}

impl NormalizationConfig {
    pub fn effective_scale(&self) -> u32 {
        self.scale.max(NORMALIZATION_SCALE_MIN)
    }
}

fn default_scale() -> u32 {
    NORMALIZATION_SCALE_DEFAULT
}

fn default_true() -> bool {
    true
}

fn default_background_limit() -> f64 {
    NORMALIZATION_BACKGROUND_LIMIT_DEFAULT
}

fn default_reference_threshold() -> f64 {
    NORMALIZATION_REFERENCE_THRESHOLD_DEFAULT
}

fn default_target_threshold() -> f64 {
    NORMALIZATION_TARGET_THRESHOLD_DEFAULT
}

fn default_hot_pixel_radius() -> u32 {
    NORMALIZATION_HOT_PIXEL_RADIUS_DEFAULT
}

fn default_noise_reduction_radius() -> u32 {
    NORMALIZATION_NOISE_REDUCTION_RADIUS_DEFAULT
}

impl std::fmt::Display for NormalizationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "scale={} no_scale={} rejection={} bgLimit={} refThr={} tgtThr={} hotPx={} noiseRed={}",
            self.scale,
            self.no_scale,
            self.enable_rejection,
            self.background_limit,
            self.reference_threshold,
            self.target_threshold,
            self.hot_pixel_filter_radius,
            self.noise_reduction_filter_radius
        )
    }
}
