use std::path::Path;

use image::{GrayImage, ImageFormat, Luma, Rgb};
use ndarray::Array3;

use crate::batch::config::OutputSampleFormat;
use crate::batch::driver::{ImageSink, ImageSource};
use crate::error::Result;
use crate::image::Image;

/// Load a grayscale or RGB image file into an [`Image`], at 16-bit source
/// precision normalized to `[0, 1]`.
pub fn load_image(path: &Path) -> Result<Image> {
    let img = image::open(path)?;
    if img.color().has_color() {
        let rgb = img.to_rgb16();
        let (w, h) = rgb.dimensions();
        let mut data = Array3::<f32>::zeros((3, h as usize, w as usize));
        for row in 0..h as usize {
            for col in 0..w as usize {
                let pixel = rgb.get_pixel(col as u32, row as u32);
                for c in 0..3 {
                    data[[c, row, col]] = pixel.0[c] as f32 / 65535.0;
                }
            }
        }
        Ok(Image::new(data)?)
    } else {
        let gray = img.to_luma16();
        let (w, h) = gray.dimensions();
        let mut data = Array3::<f32>::zeros((1, h as usize, w as usize));
        for row in 0..h as usize {
            for col in 0..w as usize {
                data[[0, row, col]] = gray.get_pixel(col as u32, row as u32).0[0] as f32 / 65535.0;
            }
        }
        Ok(Image::new(data)?)
    }
}

/// Save an [`Image`] at `path`, choosing container format from the file
/// extension and sample precision from `format`. Mono images (1 channel)
/// write grayscale; 3-channel images write RGB. Other channel counts are
/// written as the first channel only (the common container formats have no
/// native multi-band support).
pub fn save_image(image: &Image, path: &Path, format: OutputSampleFormat) -> Result<()> {
    let is_png = matches!(path.extension().and_then(|e| e.to_str()), Some("png"));
    if image.channels() >= 3 {
        save_color(image, path, is_png)
    } else {
        save_mono(image, path, format, is_png)
    }
}

fn save_mono(image: &Image, path: &Path, format: OutputSampleFormat, as_png: bool) -> Result<()> {
    let h = image.height();
    let w = image.width();
    let channel = image.channel(0);

    if as_png || matches!(format, OutputSampleFormat::UInt16) && as_png {
        let mut img = GrayImage::new(w as u32, h as u32);
        for row in 0..h {
            for col in 0..w {
                let val = (channel[[row, col]].clamp(0.0, 1.0) * 255.0) as u8;
                img.put_pixel(col as u32, row as u32, Luma([val]));
            }
        }
        img.save_with_format(path, ImageFormat::Png)?;
        return Ok(());
    }

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w);
    for row in 0..h {
        for col in 0..w {
            pixels.push((channel[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
        }
    }
    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path)?;
    Ok(())
}

fn save_color(image: &Image, path: &Path, as_png: bool) -> Result<()> {
    let h = image.height();
    let w = image.width();
    let (r, g, b) = (image.channel(0), image.channel(1), image.channel(2));

    if as_png {
        let mut img = image::RgbImage::new(w as u32, h as u32);
        for row in 0..h {
            for col in 0..w {
                let px = [
                    (r[[row, col]].clamp(0.0, 1.0) * 255.0) as u8,
                    (g[[row, col]].clamp(0.0, 1.0) * 255.0) as u8,
                    (b[[row, col]].clamp(0.0, 1.0) * 255.0) as u8,
                ];
                img.put_pixel(col as u32, row as u32, Rgb(px));
            }
        }
        img.save_with_format(path, ImageFormat::Png)?;
        return Ok(());
    }

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w * 3);
    for row in 0..h {
        for col in 0..w {
            pixels.push((r[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
            pixels.push((g[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
            pixels.push((b[[row, col]].clamp(0.0, 1.0) * 65535.0) as u16);
        }
    }
    let img = image::ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .expect("buffer size matches dimensions");
    img.save(path)?;
    Ok(())
}

/// File-backed [`ImageSource`]/[`ImageSink`] pair over the `image_io`
/// functions above. Each target is treated as a single embedded image,
/// matching the common-container-format case.
#[derive(Clone, Debug, Default)]
pub struct FileImageIo {
    pub output_format: OutputSampleFormat,
}

impl ImageSource for FileImageIo {
    fn load(&self, path: &Path) -> Result<Vec<Image>> {
        Ok(vec![load_image(path)?])
    }
}

impl ImageSink for FileImageIo {
    fn write(&self, image: &Image, path: &Path) -> Result<()> {
        save_image(image, path, self.output_format.clone())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use tempfile::tempdir;

    #[test]
    fn mono_image_round_trips_through_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.tiff");
        let image = Image::new(Array3::<f32>::from_elem((1, 8, 8), 0.5)).unwrap();
        save_image(&image, &path, OutputSampleFormat::UInt16).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.channels(), 1);
        assert_eq!(loaded.width(), 8);
        for v in loaded.channel(0).iter() {
            assert!((v - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn color_image_round_trips_through_tiff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("frame.tiff");
        let image = Image::new(Array3::<f32>::from_elem((3, 8, 8), 0.25)).unwrap();
        save_image(&image, &path, OutputSampleFormat::UInt16).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.channels(), 3);
    }
}
