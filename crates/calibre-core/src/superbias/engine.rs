use ndarray::{Array2, Array3, Axis};

use crate::error::{CalibError, Result};
use crate::image::Image;
use crate::multiscale::{mmt, starlet};
use crate::superbias::config::SuperbiasConfig;

/// Orientation of a generated superbias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Vertical => write!(f, "Vertical"),
            Orientation::Horizontal => write!(f, "Horizontal"),
        }
    }
}

/// A generated superbias image plus the `HISTORY` keywords it carries.
#[derive(Clone, Debug)]
pub struct SuperbiasResult {
    pub image: Image,
    pub orientation: Orientation,
    pub history: Vec<String>,
}

/// Build up to two superbias images (vertical column-averaged,
/// horizontal row-averaged) from a master bias `input`.
pub fn build_superbias(input: &Image, config: &SuperbiasConfig) -> Result<Vec<SuperbiasResult>> {
    config.validate()?;
    if input.channels() == 0 || input.height() == 0 || input.width() == 0 {
        return Err(CalibError::Configuration("superbias input is empty".to_string()));
    }

    let history = {
        let mut h: Vec<String> = config.non_default_history();
        h.sort();
        h
    };

    let mut results = Vec::new();
    if config.columns {
        results.push(build_one(input, config, Orientation::Vertical, &history)?);
    }
    if config.rows {
        results.push(build_one(input, config, Orientation::Horizontal, &history)?);
    }
    Ok(results)
}

fn build_one(
    input: &Image,
    config: &SuperbiasConfig,
    orientation: Orientation,
    history: &[String],
) -> Result<SuperbiasResult> {
    let channels = input.channels();
    let (h, w) = (input.height(), input.width());
    let mut out_data = Array3::<f32>::zeros((channels, h, w));

    for c in 0..channels {
        let channel = input.channel(c).to_owned();

        // S starts as the large-scale residual; the oriented trimmed mean of
        // B (or B-S when large scale is excluded) is accumulated onto it.
        let large_scale = large_scale_residual(&channel, config);
        let averaged_source = if config.exclude_large_scale {
            &channel - &large_scale
        } else {
            channel
        };

        let s = match orientation {
            Orientation::Vertical => average_columns(&large_scale, &averaged_source, config.trimming_factor),
            Orientation::Horizontal => average_rows(&large_scale, &averaged_source, config.trimming_factor),
        };

        out_data.index_axis_mut(Axis(0), c).assign(&s);
    }

    let mut result = Image::new(out_data)?;
    result.truncate();
    result.metadata.set_keyword("IMAGETYP", "Master Bias");
    result.metadata.set_keyword("SBIASDIR", orientation.to_string());
    for entry in history {
        result.metadata.set_keyword("HISTORY", entry.clone());
    }

    Ok(SuperbiasResult {
        image: result,
        orientation,
        history: history.to_vec(),
    })
}

fn large_scale_residual(channel: &Array2<f32>, config: &SuperbiasConfig) -> Array2<f32> {
    if config.median_transform {
        let (_layers, residual) = mmt::decompose(channel, config.multiscale_layers);
        residual
    } else {
        let (_layers, residual) = starlet::decompose(channel, config.multiscale_layers);
        residual
    }
}

fn average_columns(s: &Array2<f32>, source: &Array2<f32>, trimming_factor: f64) -> Array2<f32> {
    let (h, w) = s.dim();
    let mut out = s.clone();
    for col in 0..w {
        let mut column: Vec<f64> = (0..h).map(|row| source[[row, col]] as f64).collect();
        let mean = trimmed_mean(&mut column, trimming_factor);
        for row in 0..h {
            out[[row, col]] += mean as f32;
        }
    }
    out
}

fn average_rows(s: &Array2<f32>, source: &Array2<f32>, trimming_factor: f64) -> Array2<f32> {
    let (h, w) = s.dim();
    let mut out = s.clone();
    for row in 0..h {
        let mut line: Vec<f64> = (0..w).map(|col| source[[row, col]] as f64).collect();
        let mean = trimmed_mean(&mut line, trimming_factor);
        for col in 0..w {
            out[[row, col]] += mean as f32;
        }
    }
    out
}

/// Sort, trim `trimming_factor * n` samples from each end, and mean the rest.
fn trimmed_mean(values: &mut [f64], trimming_factor: f64) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = values.len();
    let trim = ((trimming_factor * n as f64) as usize).min(n / 2);
    let kept = &values[trim..n - trim];
    if kept.is_empty() {
        return 0.0;
    }
    kept.iter().sum::<f64>() / kept.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn flat_bias_produces_flat_superbias() {
        let input = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.2)).unwrap();
        let config = SuperbiasConfig {
            columns: true,
            rows: true,
            ..Default::default()
        };
        let results = build_superbias(&input, &config).unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            for v in r.image.channel(0).iter() {
                assert!((v - 0.2).abs() < 0.02, "got {v}");
            }
        }
    }

    #[test]
    fn invalid_layer_count_is_rejected() {
        let input = Image::new(Array3::<f32>::from_elem((1, 64, 64), 0.2)).unwrap();
        let config = SuperbiasConfig {
            multiscale_layers: 99,
            ..Default::default()
        };
        let err = build_superbias(&input, &config).unwrap_err();
        assert!(matches!(err, CalibError::Configuration(_)));
    }

    #[test]
    fn history_lists_only_non_default_fields() {
        let config = SuperbiasConfig {
            rows: true,
            ..Default::default()
        };
        let history = config.non_default_history();
        assert!(history.iter().any(|s| s.contains("rows=true")));
        assert!(!history.iter().any(|s| s.contains("columns")));
    }
}
