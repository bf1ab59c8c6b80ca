pub mod cfa;
pub mod dark_optimize;
pub mod engine;
pub mod overscan;
pub mod pedestal;

pub use engine::{calibrate, CalibrationInputs, CalibrationReport, ChannelReport};
