use std::path::PathBuf;

use anyhow::Result;
use calibre_core::batch::config::BatchConfig;
use calibre_core::batch::{run_calibration_batch_reported, BatchStage, CancellationToken, ProgressReporter, Target};
use calibre_core::calibration::CalibrationInputs;
use calibre_core::io::image_io::{load_image, FileImageIo};
use clap::Args;
use console::Style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct BatchArgs {
    /// Raw light frames to calibrate
    pub inputs: Vec<PathBuf>,

    /// TOML batch configuration file (see the `config` subcommand for a template)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Master bias frame, applied to every target unless overridden by --config
    #[arg(long)]
    pub bias: Option<PathBuf>,

    /// Master dark frame
    #[arg(long)]
    pub dark: Option<PathBuf>,

    /// Master flat frame
    #[arg(long)]
    pub flat: Option<PathBuf>,
}

pub fn run(args: &BatchArgs) -> Result<()> {
    let title = Style::new().cyan().bold();
    println!("{}", title.apply_to("Batch calibration"));

    let config: BatchConfig = match &args.config {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => BatchConfig {
            calibration: calibre_core::batch::config::CalibrationSettings {
                bias_path: args.bias.clone(),
                dark_path: args.dark.clone(),
                flat_path: args.flat.clone(),
                ..Default::default()
            },
            ..Default::default()
        },
    };

    crate::summary::print_batch_summary(&config);

    let bias = config.calibration.bias_path.as_ref().map(|p| load_image(p)).transpose()?;
    let dark = config.calibration.dark_path.as_ref().map(|p| load_image(p)).transpose()?;
    let flat = config.calibration.flat_path.as_ref().map(|p| load_image(p)).transpose()?;

    let targets: Vec<Target> = args
        .inputs
        .iter()
        .map(|path| Target {
            path: path.clone(),
            inputs: CalibrationInputs {
                bias: bias.clone(),
                dark: dark.clone(),
                dark_scale: vec![None],
                flat: flat.clone(),
                flat_scale: vec![1.0],
                pedestal: config.calibration.pedestal.clone(),
                output_pedestal_normalized: config.calibration.output_pedestal_dn as f64 / 65535.0,
                optimize_dark_scale: config.calibration.optimize_dark_scale,
                dark_optimize_window: config.calibration.dark_optimize_window,
                dark_optimize_low_sigma: config.calibration.dark_optimize_low_sigma,
                noise_algorithm: config.calibration.noise_algorithm,
                ..Default::default()
            },
        })
        .collect();

    let sink = FileImageIo {
        output_format: config.output_format.clone(),
    };
    let cancellation = CancellationToken::new();
    let reporter = BarReporter::new(targets.len());

    let summary = run_calibration_batch_reported(targets, &config, &sink, &sink, &cancellation, &reporter);

    println!("{}", summary.summary_line());
    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Drives one [`ProgressBar`] per target through a [`MultiProgress`] group.
struct BarReporter {
    multi: MultiProgress,
    bars: Vec<ProgressBar>,
}

impl BarReporter {
    fn new(count: usize) -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::default_bar()
            .template("target {pos}/{len} {msg} [{bar:30}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let bars = (0..count)
            .map(|i| {
                let bar = multi.add(ProgressBar::new(4));
                bar.set_style(style.clone());
                bar.set_position(0);
                bar.set_length(4);
                bar.set_message(format!("target {}", i + 1));
                bar
            })
            .collect();

        Self { multi, bars }
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, target_index: usize, stage: BatchStage, _total_items: Option<usize>) {
        if let Some(bar) = self.bars.get(target_index) {
            bar.set_message(stage.to_string());
        }
    }

    fn finish_stage(&self, target_index: usize, stage: BatchStage) {
        if let Some(bar) = self.bars.get(target_index) {
            bar.inc(1);
            if stage == BatchStage::Writing {
                bar.finish_with_message("done");
            }
        }
    }
}

impl Drop for BarReporter {
    fn drop(&mut self) {
        let _ = self.multi.clear();
    }
}
