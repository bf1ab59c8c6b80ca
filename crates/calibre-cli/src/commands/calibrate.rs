use std::path::PathBuf;

use anyhow::Result;
use calibre_core::calibration::pedestal::PedestalSource;
use calibre_core::calibration::{calibrate, CalibrationInputs};
use calibre_core::io::image_io::{load_image, save_image};
use calibre_core::multiscale::noise::NoiseAlgorithmChoice;
use clap::{Args, ValueEnum};
use console::Style;

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    #[value(alias = "uint16", alias = "UInt16")]
    Uint16,
    #[value(alias = "uint32", alias = "UInt32")]
    Uint32,
    #[value(alias = "float32", alias = "Float32")]
    Float32,
    #[value(alias = "float64", alias = "Float64")]
    Float64,
}

impl From<OutputFormatArg> for calibre_core::batch::config::OutputSampleFormat {
    fn from(value: OutputFormatArg) -> Self {
        use calibre_core::batch::config::OutputSampleFormat as F;
        match value {
            OutputFormatArg::Uint16 => F::UInt16,
            OutputFormatArg::Uint32 => F::UInt32,
            OutputFormatArg::Float32 => F::Float32,
            OutputFormatArg::Float64 => F::Float64,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NoiseAlgorithmArg {
    #[value(alias = "ksigma", alias = "KSigma")]
    KSigma,
    #[value(alias = "mrs", alias = "MRS")]
    Mrs,
}

impl From<NoiseAlgorithmArg> for NoiseAlgorithmChoice {
    fn from(value: NoiseAlgorithmArg) -> Self {
        match value {
            NoiseAlgorithmArg::KSigma => NoiseAlgorithmChoice::KSigma,
            NoiseAlgorithmArg::Mrs => NoiseAlgorithmChoice::MultiresolutionSupport,
        }
    }
}

#[derive(Args)]
pub struct CalibrateArgs {
    /// Raw light frame to calibrate
    pub input: PathBuf,

    /// Master bias frame
    #[arg(long)]
    pub bias: Option<PathBuf>,

    /// Master dark frame
    #[arg(long)]
    pub dark: Option<PathBuf>,

    /// Master flat frame
    #[arg(long)]
    pub flat: Option<PathBuf>,

    /// Fixed dark scaling factor (ignored if --optimize-dark-scale is set)
    #[arg(long, default_value = "1.0")]
    pub dark_scale: f64,

    /// Search for the noise-minimizing dark scale instead of using a fixed one
    #[arg(long)]
    pub optimize_dark_scale: bool,

    /// Literal input pedestal in DN, subtracted before calibration
    #[arg(long)]
    pub pedestal: Option<i32>,

    /// Output pedestal in DN, added back after calibration
    #[arg(long, default_value = "0")]
    pub output_pedestal: i32,

    /// Output sample format
    #[arg(long, value_enum, default_value = "float32")]
    pub format: OutputFormatArg,

    /// Noise estimator used for the per-channel report
    #[arg(long, value_enum, default_value = "mrs")]
    pub noise_algorithm: NoiseAlgorithmArg,

    /// Output file path
    #[arg(short, long, default_value = "calibrated.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &CalibrateArgs) -> Result<()> {
    let title = Style::new().cyan().bold();
    println!("{}", title.apply_to("Calibrating"));

    let target = load_image(&args.input)?;
    let channels = target.channels();

    let bias = args.bias.as_ref().map(|p| load_image(p)).transpose()?;
    let dark = args.dark.as_ref().map(|p| load_image(p)).transpose()?;
    let flat = args.flat.as_ref().map(|p| load_image(p)).transpose()?;

    let inputs = CalibrationInputs {
        bias,
        dark,
        dark_scale: vec![if args.optimize_dark_scale { None } else { Some(args.dark_scale) }; channels],
        flat,
        flat_scale: vec![1.0; channels],
        overscan_regions: Vec::new(),
        image_rect: None,
        pedestal: args.pedestal.map(PedestalSource::Literal).unwrap_or_default(),
        output_pedestal_normalized: args.output_pedestal as f64 / 65535.0,
        optimize_dark_scale: args.optimize_dark_scale,
        dark_optimize_window: None,
        dark_optimize_low_sigma: 2.0,
        noise_algorithm: args.noise_algorithm.into(),
    };

    let report = calibrate(&target, &inputs)?;

    for (c, channel) in report.channels.iter().enumerate() {
        print!("  channel {c}: noise={:.6} ({})", channel.noise.sigma, channel.noise.algorithm);
        if let Some(scale) = channel.dark_scale_used {
            print!(" dark_scale={scale:.4}");
        }
        println!();
    }

    save_image(&report.image, &args.output, args.format.clone().into())?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
