use crate::image::{ColorFilterArray, Image};

/// Per-2x2-tile sampled-channel layout (0=R, 1=G, 2=B), indexed `[row%2][col%2]`.
const fn tile(pattern: ColorFilterArray) -> [[usize; 2]; 2] {
    match pattern {
        ColorFilterArray::Rggb => [[0, 1], [1, 2]],
        ColorFilterArray::Grbg => [[1, 0], [2, 1]],
        ColorFilterArray::Gbrg => [[1, 2], [0, 1]],
        ColorFilterArray::Bggr => [[2, 1], [1, 0]],
        ColorFilterArray::None => [[0, 0], [0, 0]],
    }
}

/// Detect whether an image is a Bayer-mosaiced frame, either from its
/// already-known CFA descriptor or by matching one of the four RGGB-family
/// zero-signature templates in the top-left 4x4 tile across all three
/// channels: the zero-sample positions per channel must coincide bit-for-bit
/// with the template.
pub fn detect_cfa(image: &Image) -> ColorFilterArray {
    if image.cfa() != ColorFilterArray::None {
        return image.cfa();
    }
    if image.channels() != 3 || image.height() < 4 || image.width() < 4 {
        return ColorFilterArray::None;
    }

    for pattern in [
        ColorFilterArray::Rggb,
        ColorFilterArray::Grbg,
        ColorFilterArray::Gbrg,
        ColorFilterArray::Bggr,
    ] {
        if matches_template(image, pattern) {
            return pattern;
        }
    }

    ColorFilterArray::None
}

fn matches_template(image: &Image, pattern: ColorFilterArray) -> bool {
    let layout = tile(pattern);
    for row in 0..4 {
        for col in 0..4 {
            let sampled = layout[row % 2][col % 2];
            for c in 0..3 {
                let is_zero = image.channel(c)[[row, col]] == 0.0;
                let should_be_zero = c != sampled;
                if is_zero != should_be_zero {
                    return false;
                }
            }
        }
    }
    true
}

/// Average-downsample a full image 2x2 per CFA tile, used before noise
/// evaluation or dark-scale optimization on Bayer-mosaiced masters.
pub fn downsample_cfa_image(image: &Image) -> Image {
    let mut data = None;
    for c in 0..image.channels() {
        let channel = image.channel(c).to_owned();
        let down = crate::multiscale::noise::downsample_cfa_2x2(&channel);
        let (h, w) = down.dim();
        let arr = data.get_or_insert_with(|| ndarray::Array3::<f32>::zeros((image.channels(), h, w)));
        arr.index_axis_mut(ndarray::Axis(0), c).assign(&down);
    }
    Image::new(data.expect("image has at least one channel")).expect("downsampled geometry is non-degenerate")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn non_color_image_is_never_cfa() {
        let image = Image::new(Array3::<f32>::zeros((1, 8, 8))).unwrap();
        assert_eq!(detect_cfa(&image), ColorFilterArray::None);
    }

    #[test]
    fn explicit_cfa_metadata_is_trusted() {
        let mut image = Image::new(Array3::<f32>::zeros((3, 8, 8))).unwrap();
        image.set_cfa(ColorFilterArray::Grbg);
        assert_eq!(detect_cfa(&image), ColorFilterArray::Grbg);
    }

    #[test]
    fn rggb_template_is_detected_from_zero_pattern() {
        let mut data = Array3::<f32>::zeros((3, 8, 8));
        for row in 0..8 {
            for col in 0..8 {
                let sampled = tile(ColorFilterArray::Rggb)[row % 2][col % 2];
                data[[sampled, row, col]] = 1.0;
            }
        }
        let image = Image::new(data).unwrap();
        assert_eq!(detect_cfa(&image), ColorFilterArray::Rggb);
    }
}
