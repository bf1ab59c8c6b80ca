use std::path::PathBuf;

use anyhow::Result;
use calibre_core::io::image_io::load_image;
use calibre_core::normalization::{build_normalization, NoOpReporter, NormalizationConfig};
use calibre_core::xnml::{write_document, XnmlDocument};
use clap::Args;
use console::Style;

#[derive(Args)]
pub struct NormalizeArgs {
    /// Reference image
    pub reference: PathBuf,

    /// Target image to normalize against the reference
    pub target: PathBuf,

    /// Normalization scale in pixels (minimum 32)
    #[arg(long, default_value = "128")]
    pub scale: u32,

    /// Fix the scale term A to 1.0 and solve only for the offset B
    #[arg(long)]
    pub no_scale: bool,

    /// Disable outlier rejection
    #[arg(long)]
    pub no_rejection: bool,

    /// Write the uncompressed XNML payload instead of the zlib-compressed default
    #[arg(long)]
    pub no_compression: bool,

    /// Output XNML file path
    #[arg(short, long, default_value = "normalization.xnml")]
    pub output: PathBuf,
}

pub fn run(args: &NormalizeArgs) -> Result<()> {
    let title = Style::new().cyan().bold();
    println!("{}", title.apply_to("Local normalization"));

    let reference = load_image(&args.reference)?;
    let target = load_image(&args.target)?;

    let config = NormalizationConfig {
        scale: args.scale,
        no_scale: args.no_scale,
        enable_rejection: !args.no_rejection,
        ..NormalizationConfig::default()
    };

    let solution = build_normalization(&reference, &target, &config, &NoOpReporter)?;

    let doc = XnmlDocument::from_solution(
        &solution,
        args.reference.display().to_string(),
        args.target.display().to_string(),
        creation_timestamp(),
    );

    let bytes = write_document(&doc, !args.no_compression)?;
    std::fs::write(&args.output, bytes)?;

    println!(
        "Solved {} channel(s) at scale {}, wrote {}",
        doc.channel_count(),
        doc.normalization_scale,
        args.output.display()
    );
    Ok(())
}

fn creation_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
