use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("numerical instability: {0}")]
    NumericalInstability(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("XNML document error: {0}")]
    Xnml(String),

    #[error("operation aborted by user")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, CalibError>;
