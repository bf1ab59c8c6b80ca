use serde::{Deserialize, Serialize};

use crate::consts::{SUPERBIAS_MAX_LAYERS, SUPERBIAS_MAX_TRIMMING_FACTOR, SUPERBIAS_MIN_LAYERS};
use crate::error::{CalibError, Result};

/// Configuration for [`crate::superbias::engine::build_superbias`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuperbiasConfig {
    /// Emit a column-oriented (vertical) superbias.
    #[serde(default = "default_true")]
    pub columns: bool,
    /// Emit a row-oriented (horizontal) superbias.
    #[serde(default)]
    pub rows: bool,
    /// Use the multiscale median transform instead of the starlet transform
    /// for large-scale extraction.
    #[serde(default)]
    pub median_transform: bool,
    /// Replace the input by `input - largeScale` before averaging.
    #[serde(default)]
    pub exclude_large_scale: bool,
    #[serde(default = "default_layers")]
    pub multiscale_layers: usize,
    #[serde(default = "default_trimming_factor")]
    pub trimming_factor: f64,
}

impl Default for SuperbiasConfig {
    fn default() -> Self {
        Self {
            columns: true,
            rows: false,
            median_transform: false,
            exclude_large_scale: false,
            multiscale_layers: default_layers(),
            trimming_factor: default_trimming_factor(),
        }
    }
}

impl SuperbiasConfig {
    pub fn validate(&self) -> Result<()> {
        if !(SUPERBIAS_MIN_LAYERS..=SUPERBIAS_MAX_LAYERS).contains(&self.multiscale_layers) {
            return Err(CalibError::Configuration(format!(
                "multiscale_layers {} out of range [{}, {}]",
                self.multiscale_layers, SUPERBIAS_MIN_LAYERS, SUPERBIAS_MAX_LAYERS
            )));
        }
        if !(0.0..=SUPERBIAS_MAX_TRIMMING_FACTOR).contains(&self.trimming_factor) {
            return Err(CalibError::Configuration(format!(
                "trimming_factor {} out of range [0, {}]",
                self.trimming_factor, SUPERBIAS_MAX_TRIMMING_FACTOR
            )));
        }
        if !self.columns && !self.rows {
            return Err(CalibError::Configuration(
                "at least one of columns/rows must be requested".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-default fields, rendered as `HISTORY`-keyword-ready strings.
    pub fn non_default_history(&self) -> Vec<String> {
        let default = SuperbiasConfig::default();
        let mut history = Vec::new();
        if self.columns != default.columns {
            history.push(format!("columns={}", self.columns));
        }
        if self.rows != default.rows {
            history.push(format!("rows={}", self.rows));
        }
        if self.median_transform != default.median_transform {
            history.push(format!("medianTransform={}", self.median_transform));
        }
        if self.exclude_large_scale != default.exclude_large_scale {
            history.push(format!("excludeLargeScale={}", self.exclude_large_scale));
        }
        if self.multiscale_layers != default.multiscale_layers {
            history.push(format!("multiscaleLayers={}", self.multiscale_layers));
        }
        if (self.trimming_factor - default.trimming_factor).abs() > f64::EPSILON {
            history.push(format!("trimmingFactor={}", self.trimming_factor));
        }
        history
    }
}

fn default_true() -> bool {
    true
}

fn default_layers() -> usize {
    4
}

fn default_trimming_factor() -> f64 {
    0.1
}
