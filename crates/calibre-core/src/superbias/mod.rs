pub mod config;
pub mod engine;

pub use config::SuperbiasConfig;
pub use engine::{build_superbias, Orientation, SuperbiasResult};
