use std::path::PathBuf;

use anyhow::Result;
use calibre_core::io::image_io::{load_image, save_image};
use calibre_core::superbias::{build_superbias, Orientation, SuperbiasConfig};
use clap::Args;
use console::Style;

#[derive(Args)]
pub struct SuperbiasArgs {
    /// Master bias frame
    pub input: PathBuf,

    /// Emit a column-oriented (vertical) superbias
    #[arg(long, default_value = "true")]
    pub columns: bool,

    /// Emit a row-oriented (horizontal) superbias
    #[arg(long)]
    pub rows: bool,

    /// Use the multiscale median transform instead of starlet for large-scale extraction
    #[arg(long)]
    pub median_transform: bool,

    /// Subtract the large-scale model from the input before averaging
    #[arg(long)]
    pub exclude_large_scale: bool,

    /// Number of multiscale layers (1-10)
    #[arg(long, default_value = "4")]
    pub layers: usize,

    /// Trimming factor for the oriented mean (0.0-0.4)
    #[arg(long, default_value = "0.1")]
    pub trimming_factor: f64,

    /// Output file stem; orientation is appended before the extension
    #[arg(short, long, default_value = "superbias.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &SuperbiasArgs) -> Result<()> {
    let title = Style::new().cyan().bold();
    println!("{}", title.apply_to("Superbias generation"));

    let input = load_image(&args.input)?;
    let config = SuperbiasConfig {
        columns: args.columns,
        rows: args.rows,
        median_transform: args.median_transform,
        exclude_large_scale: args.exclude_large_scale,
        multiscale_layers: args.layers,
        trimming_factor: args.trimming_factor,
    };

    let results = build_superbias(&input, &config)?;
    for result in &results {
        let path = orientation_path(&args.output, result.orientation);
        save_image(&result.image, &path, Default::default())?;
        println!("Saved {} superbias to {}", result.orientation, path.display());
    }
    Ok(())
}

fn orientation_path(base: &PathBuf, orientation: Orientation) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("superbias");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("tiff");
    let suffix = match orientation {
        Orientation::Vertical => "vertical",
        Orientation::Horizontal => "horizontal",
    };
    base.with_file_name(format!("{stem}_{suffix}.{ext}"))
}
