use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, Ix4};
use thiserror::Error;

pub const INPUT_SIZE: u32 = 256;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Error reading image: {0}")]
    Read(#[from] std::io::Error),
    #[error("Error decoding image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decodes an uploaded image and turns it into a `(1, 256, 256, 3)` batch
/// with intensities scaled into `[0, 1]`.
///
/// The image is stretched to the square input size, its aspect ratio is not
/// preserved. Alpha is dropped and grayscale is replicated over three channels.
pub fn transform_image(image_data: &[u8]) -> Result<Array<f32, Ix4>, TransformError> {
    let image_reader =
        image::ImageReader::new(std::io::Cursor::new(image_data)).with_guessed_format()?;

    let rgb = image_reader.decode()?.to_rgb8();
    let resized = image::imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    Ok(to_input_tensor(&resized))
}

fn to_input_tensor(img: &RgbImage) -> Array<f32, Ix4> {
    let mut input = Array::zeros((1, img.height() as usize, img.width() as usize, 3));
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (x, y) = (x as usize, y as usize);
        input[[0, y, x, 0]] = (r as f32) / 255.;
        input[[0, y, x, 1]] = (g as f32) / 255.;
        input[[0, y, x, 2]] = (b as f32) / 255.;
    }
    input
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, Rgba};
    use std::io::Cursor;

    pub(crate) fn encode_png(img: DynamicImage) -> Vec<u8> {
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), image::ImageFormat::Png)
            .unwrap();
        image_data
    }

    pub(crate) fn solid_rgb_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb(color));
        encode_png(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn test_transform_image() {
        let input = transform_image(&solid_rgb_png(100, 40, [255, 0, 0])).unwrap();

        assert_eq!(input.shape(), &[1, 256, 256, 3]);
        assert_eq!(input[[0, 0, 0, 0]], 1.0);
        assert_eq!(input[[0, 255, 255, 1]], 0.0);
        assert_eq!(input[[0, 128, 17, 2]], 0.0);
    }

    #[test]
    fn test_values_are_scaled_into_unit_range() {
        let input = transform_image(&solid_rgb_png(256, 256, [51, 102, 204])).unwrap();

        assert!(input.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(input[[0, 10, 10, 0]], 51.0 / 255.0);
        assert_eq!(input[[0, 10, 10, 1]], 102.0 / 255.0);
        assert_eq!(input[[0, 10, 10, 2]], 204.0 / 255.0);
    }

    #[test]
    fn test_grayscale_is_replicated() {
        let img = GrayImage::from_pixel(30, 30, Luma([128]));
        let input = transform_image(&encode_png(DynamicImage::ImageLuma8(img))).unwrap();

        assert_eq!(input.shape(), &[1, 256, 256, 3]);
        let expected = 128.0 / 255.0;
        assert_eq!(input[[0, 5, 5, 0]], expected);
        assert_eq!(input[[0, 5, 5, 1]], expected);
        assert_eq!(input[[0, 5, 5, 2]], expected);
    }

    #[test]
    fn test_alpha_is_dropped() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 255, 0, 0]));
        let input = transform_image(&encode_png(DynamicImage::ImageRgba8(img))).unwrap();

        assert_eq!(input.shape(), &[1, 256, 256, 3]);
        assert_eq!(input[[0, 0, 0, 1]], 1.0);
    }

    #[test]
    fn test_same_content_different_sizes() {
        let small = transform_image(&solid_rgb_png(10, 10, [12, 200, 77])).unwrap();
        let large = transform_image(&solid_rgb_png(4000, 3000, [12, 200, 77])).unwrap();

        assert_eq!(small, large);
    }

    #[test]
    fn test_invalid_payload() {
        let result = transform_image(b"definitely not an image");

        assert!(matches!(result, Err(TransformError::Decode(_))));
    }
}
