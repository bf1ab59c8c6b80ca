pub mod mmt;
pub mod noise;
pub mod starlet;

pub use noise::{estimate_noise, k_sigma_noise, mrs_noise, NoiseAlgorithm, NoiseAlgorithmChoice, NoiseEstimate};
