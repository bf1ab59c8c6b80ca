use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calibration::pedestal::PedestalSource;
use crate::consts::{DEFAULT_FILE_THREAD_OVERLOAD, DEFAULT_MAX_FILE_READ_THREADS, DEFAULT_MAX_FILE_WRITE_THREADS};
use crate::multiscale::noise::NoiseAlgorithmChoice;
use crate::normalization::config::NormalizationConfig;
use crate::superbias::config::SuperbiasConfig;

/// What a per-target worker failure should do to the rest of the batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Abort,
    /// Surface a prompt through the host; headless drivers behave as `Continue`.
    AskUser,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "Continue"),
            Self::Abort => write!(f, "Abort"),
            Self::AskUser => write!(f, "Ask User"),
        }
    }
}

/// Sample format for written output images.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputSampleFormat {
    UInt16,
    UInt32,
    #[default]
    Float32,
    Float64,
}

impl fmt::Display for OutputSampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt16 => write!(f, "16-bit integer"),
            Self::UInt32 => write!(f, "32-bit integer"),
            Self::Float32 => write!(f, "32-bit float"),
            Self::Float64 => write!(f, "64-bit float"),
        }
    }
}

/// Per-target calibration settings shared across a batch run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_path: Option<PathBuf>,
    #[serde(default)]
    pub pedestal: PedestalSource,
    #[serde(default)]
    pub output_pedestal_dn: i32,
    #[serde(default)]
    pub optimize_dark_scale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_optimize_window: Option<usize>,
    #[serde(default = "default_low_sigma")]
    pub dark_optimize_low_sigma: f64,
    #[serde(default)]
    pub noise_algorithm: NoiseAlgorithmChoice,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            bias_path: None,
            dark_path: None,
            flat_path: None,
            pedestal: PedestalSource::default(),
            output_pedestal_dn: 0,
            optimize_dark_scale: false,
            dark_optimize_window: None,
            dark_optimize_low_sigma: default_low_sigma(),
            noise_algorithm: NoiseAlgorithmChoice::default(),
        }
    }
}

fn default_low_sigma() -> f64 {
    2.0
}

/// Output-naming knobs, applied as `<outDir or inputDir>/<prefix><stem><_NN
/// if multi-image><postfix><ext or inputExt>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputNaming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_postfix")]
    pub postfix: String,
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            out_dir: None,
            prefix: String::new(),
            postfix: default_postfix(),
            overwrite: false,
        }
    }
}

fn default_postfix() -> String {
    "_c".to_string()
}

/// Top-level batch-driver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub calibration: CalibrationSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superbias: Option<SuperbiasConfig>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default = "default_overload")]
    pub file_thread_overload: f64,
    #[serde(default = "default_read_threads")]
    pub max_file_read_threads: usize,
    #[serde(default = "default_write_threads")]
    pub max_file_write_threads: usize,
    #[serde(default)]
    pub output_format: OutputSampleFormat,
    #[serde(default)]
    pub output: OutputNaming,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            calibration: CalibrationSettings::default(),
            normalization: None,
            superbias: None,
            error_policy: ErrorPolicy::default(),
            file_thread_overload: default_overload(),
            max_file_read_threads: default_read_threads(),
            max_file_write_threads: default_write_threads(),
            output_format: OutputSampleFormat::default(),
            output: OutputNaming::default(),
        }
    }
}

impl BatchConfig {
    /// Threads per file for local normalization:
    /// `max(1, round(cpuCount * fileThreadOverload))`.
    pub fn threads_per_file(&self, cpu_count: usize) -> usize {
        ((cpu_count as f64 * self.file_thread_overload).round() as usize).max(1)
    }
}

fn default_overload() -> f64 {
    DEFAULT_FILE_THREAD_OVERLOAD
}

fn default_read_threads() -> usize {
    DEFAULT_MAX_FILE_READ_THREADS
}

fn default_write_threads() -> usize {
    DEFAULT_MAX_FILE_WRITE_THREADS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_per_file_rounds_and_floors_at_one() {
        let config = BatchConfig {
            file_thread_overload: 0.1,
            ..Default::default()
        };
        assert_eq!(config.threads_per_file(4), 1);

        let config = BatchConfig {
            file_thread_overload: 2.0,
            ..Default::default()
        };
        assert_eq!(config.threads_per_file(4), 8);
    }
}
