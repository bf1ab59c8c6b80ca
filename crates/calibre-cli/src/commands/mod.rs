pub mod batch;
pub mod calibrate;
pub mod config;
pub mod defect_map;
pub mod normalize;
pub mod superbias;
