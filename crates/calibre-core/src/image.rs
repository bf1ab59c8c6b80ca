use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};

use crate::error::{CalibError, Result};

/// A multi-channel image. Samples are `f32` in `[0.0, 1.0]` during processing;
/// higher-precision or integer representations live only at the I/O boundary
/// (see [`crate::io::image_io`]).
///
/// Storage is channel-major: `data` has shape `(channels, height, width)`.
#[derive(Clone, Debug)]
pub struct Image {
    data: Array3<f32>,
    cfa: ColorFilterArray,
    pub metadata: ImageMetadata,
}

impl Image {
    /// Build an image from channel-major data. Returns `Configuration` error
    /// if `data` has zero channels, width, or height.
    pub fn new(data: Array3<f32>) -> Result<Self> {
        let (c, h, w) = data.dim();
        if c == 0 || h == 0 || w == 0 {
            return Err(CalibError::Configuration(format!(
                "image has degenerate geometry {c}x{h}x{w}"
            )));
        }
        Ok(Self {
            data,
            cfa: ColorFilterArray::None,
            metadata: ImageMetadata::default(),
        })
    }

    /// Build a single-channel image from a 2-D array.
    pub fn from_mono(data: Array2<f32>) -> Result<Self> {
        let (h, w) = data.dim();
        Self::new(data.into_shape_with_order((1, h, w)).expect("shape matches"))
    }

    /// Build an all-zero image with the given geometry.
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            data: Array3::zeros((channels, height, width)),
            cfa: ColorFilterArray::None,
            metadata: ImageMetadata::default(),
        }
    }

    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn geometry(&self) -> Geometry {
        let (c, h, w) = self.data.dim();
        Geometry {
            width: w as u32,
            height: h as u32,
            channels: c,
        }
    }

    pub fn cfa(&self) -> ColorFilterArray {
        self.cfa
    }

    pub fn set_cfa(&mut self, cfa: ColorFilterArray) {
        self.cfa = cfa;
    }

    pub fn channel(&self, c: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), c)
    }

    pub fn channel_mut(&mut self, c: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(0), c)
    }

    pub fn channels_iter(&self) -> impl Iterator<Item = ArrayView2<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<f32> {
        &mut self.data
    }

    /// Truncate every sample to `[0, 1]` in place, per §4.3 step 6 / §4.5 step 4.
    pub fn truncate(&mut self) {
        self.data.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }

    /// Crop to a rectangle shared by every channel, returning a new image.
    pub fn crop(&self, rect: &Rectangle) -> Result<Self> {
        let (_, h, w) = self.data.dim();
        if rect.x1 as usize > w || rect.y1 as usize > h {
            return Err(CalibError::Configuration(format!(
                "crop rectangle {rect:?} exceeds image bounds {w}x{h}"
            )));
        }
        let cropped = self
            .data
            .slice(ndarray::s![
                ..,
                rect.y0 as usize..rect.y1 as usize,
                rect.x0 as usize..rect.x1 as usize
            ])
            .to_owned();
        Ok(Self {
            data: cropped,
            cfa: self.cfa,
            metadata: self.metadata.clone(),
        })
    }

    /// Require that `self` and `other` share width, height, and channel count.
    pub fn require_same_geometry(&self, other: &Image, context: &str) -> Result<()> {
        if self.geometry() != other.geometry() {
            return Err(CalibError::GeometryMismatch(format!(
                "{context}: {:?} vs {:?}",
                self.geometry(),
                other.geometry()
            )));
        }
        Ok(())
    }
}

/// Width/height/channel-count triple attached at image creation; pipeline
/// stages assume equal geometry between reference, target, and masters
/// unless an overscan crop is declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
}

/// Half-open integer rectangle with a normality invariant (`x0 <= x1`,
/// `y0 <= y1`) and non-negative coordinates (guaranteed by the `u32` fields).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rectangle {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rectangle {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Result<Self> {
        if x0 > x1 || y0 > y1 {
            return Err(CalibError::Configuration(format!(
                "invalid rectangle: ({x0},{y0})-({x1},{y1})"
            )));
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Colour-Filter-Array descriptor, part of the master-frame metadata surfaced
/// by the image I/O boundary (§6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ColorFilterArray {
    #[default]
    None,
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

/// Metadata carried alongside pixel data from the image I/O boundary:
/// inbound keywords, optional ICC profile, and an opaque format-specific
/// blob, all preserved verbatim into the output file (§6).
#[derive(Clone, Debug, Default)]
pub struct ImageMetadata {
    pub keywords: Vec<(String, String)>,
    pub icc_profile: Option<Vec<u8>>,
    pub format_blob: Option<Vec<u8>>,
}

impl ImageMetadata {
    /// Case-insensitive keyword lookup, per §6's pedestal-keyword contract.
    pub fn keyword(&self, name: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every keyword matching `name` case-insensitively.
    pub fn strip_keyword(&mut self, name: &str) {
        self.keywords.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn set_keyword(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.keywords.push((name.into(), value.into()));
    }
}
