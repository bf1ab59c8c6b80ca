pub mod background;
pub mod bspline;

pub use background::BackgroundModel;
pub use bspline::BicubicBSplineSurface;
