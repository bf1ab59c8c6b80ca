use anyhow::Result;
use calibre_core::batch::config::BatchConfig;

/// Print a default `BatchConfig` as TOML, for use as a `batch --config` template.
pub fn run() -> Result<()> {
    let config = BatchConfig::default();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
