use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};

/// Structuring-element shape for defect interpolation.
#[derive(Clone, Copy, ValueEnum)]
pub enum StructureShape {
    Square,
    Circular,
    Horizontal,
    Vertical,
}

/// Interpolation method used to fill a flagged defect pixel from its
/// surviving neighbors.
#[derive(Clone, Copy, ValueEnum)]
pub enum InterpolationMethod {
    Gaussian,
    Mean,
    Minimum,
    Maximum,
    Median,
}

/// Mirrors the defect-map process's parameter surface. The repair algorithm
/// itself is GUI-driven and out of scope here; invoking this command always
/// reports a configuration error, matching the documented contract that it
/// never performs a repair without a live defect map and active image.
#[derive(Args)]
pub struct DefectMapArgs {
    /// Image ids to repair
    pub images: Vec<String>,

    /// Identifier of the defect map to apply
    #[arg(long)]
    pub map: Option<String>,

    #[arg(long, value_enum)]
    pub method: Option<InterpolationMethod>,

    #[arg(long, value_enum)]
    pub shape: Option<StructureShape>,

    /// Treat the image as CFA-mosaiced; repair each channel independently
    #[arg(long = "CFA", alias = "cfa")]
    pub cfa: bool,

    /// Run in host-interface mode rather than headless
    #[arg(long)]
    pub interface: bool,
}

pub fn run(args: &DefectMapArgs) -> Result<()> {
    if args.map.is_none() || args.images.is_empty() {
        bail!("defect-map requires an active image and --map=<id>; pixel repair is not implemented in this module");
    }
    bail!("defect-map pixel repair is a host-GUI operation and is not implemented in this module");
}
