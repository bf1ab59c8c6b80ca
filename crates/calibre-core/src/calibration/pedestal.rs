use crate::image::ImageMetadata;

/// Default keyword name used by [`PedestalSource::Keyword`].
pub const DEFAULT_PEDESTAL_KEYWORD: &str = "PEDESTAL";

/// Where the input pedestal (in DN, to be subtracted after overscan) comes
/// from. Lookup is case-insensitive; an absent or non-numeric keyword yields
/// zero without error.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub enum PedestalSource {
    #[default]
    None,
    Literal(i32),
    Keyword,
    CustomKeyword(String),
}

impl PedestalSource {
    /// Resolve the pedestal in DN for a given target's metadata.
    pub fn resolve_dn(&self, metadata: &ImageMetadata) -> i32 {
        match self {
            PedestalSource::None => 0,
            PedestalSource::Literal(dn) => *dn,
            PedestalSource::Keyword => lookup_numeric(metadata, DEFAULT_PEDESTAL_KEYWORD),
            PedestalSource::CustomKeyword(name) => lookup_numeric(metadata, name),
        }
    }

    /// Resolve the pedestal in normalized `[0, 1]` units (`dn / 65535`).
    pub fn resolve_normalized(&self, metadata: &ImageMetadata) -> f64 {
        self.resolve_dn(metadata) as f64 / 65535.0
    }
}

fn lookup_numeric(metadata: &ImageMetadata, name: &str) -> i32 {
    metadata
        .keyword(name)
        .and_then(|v| v.trim().parse::<i32>().ok())
        .unwrap_or(0)
}
