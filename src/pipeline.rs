use base64::{engine::general_purpose, Engine as _};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::Tensor;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::transformer::{
    GenericTransform, ImageSize, ImageTransform, ImageTransformResult, Normalization, PadToSquare,
    Thumbnail, ToArray, ToTensor, Transpose,
};
use crate::{IMAGENET_MEAN, IMAGENET_STD, TARGET_SIZE};

/// Decode a base64 image payload, optionally wrapped in a data URI
/// (`data:image/png;base64,...`). Whitespace inside the payload is ignored.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let data = match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    };
    let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(general_purpose::STANDARD.decode(data)?)
}

/// Turns raw image bytes into the classifier's input tensor.
#[derive(Clone, Debug)]
pub struct TransformationPipeline {
    steps: Vec<ImageTransform>,
}

impl TransformationPipeline {
    /// Shrink into `image_size`, center on a white canvas, normalize with
    /// the given per-channel statistics and lay out as `(1, 3, H, W)`.
    pub fn new(image_size: ImageSize, mean: [f32; 3], std: [f32; 3]) -> Self {
        TransformationPipeline {
            steps: vec![
                Thumbnail {
                    max_size: image_size.clone(),
                    filter: FilterType::Lanczos3,
                }
                .into(),
                PadToSquare {
                    size: image_size,
                    fill: [255, 255, 255],
                }
                .into(),
                ToArray {}.into(),
                Transpose { axes: [0, 3, 1, 2] }.into(),
                Normalization {
                    sub: mean,
                    div: std,
                    zeroone: true,
                }
                .into(),
                ToTensor {}.into(),
            ],
        }
    }

    pub fn from_steps(steps: Vec<ImageTransform>) -> Self {
        TransformationPipeline { steps }
    }

    pub fn steps(&self) -> &[ImageTransform] {
        &self.steps
    }

    pub fn transform_image(&self, image: RgbImage) -> Result<Tensor> {
        let mut result = ImageTransformResult::RgbImage(image);

        for step in &self.steps {
            result = step.transform(result)?;
            debug!(shape = ?result.shape(), "applied transform");
        }

        let to_tensor = ToTensor {};
        result = to_tensor.transform(result)?;

        match result {
            ImageTransformResult::Tensor(t) => Ok(t),
            _ => Err(Error::Unexpected("Should be converted to tensor already")),
        }
    }

    /// Decode `bytes` as an image of any supported format, drop any alpha
    /// channel and run the transform steps.
    #[instrument(level = "debug", skip_all, fields(len = bytes.len()))]
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Tensor> {
        let image = image::load_from_memory(bytes)?.into_rgb8();
        debug!(width = image.width(), height = image.height(), "decoded image");
        self.transform_image(image)
    }
}

impl Default for TransformationPipeline {
    fn default() -> Self {
        let size = ImageSize {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
        };
        TransformationPipeline::new(size, IMAGENET_MEAN, IMAGENET_STD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;
    use tract_onnx::prelude::tract_ndarray::{Array4, Ix4};

    fn normalized(value: u8, channel: usize) -> f32 {
        (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
    }

    fn png_bytes(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn to_array(tensor: Tensor) -> Array4<f32> {
        tensor
            .into_array::<f32>()
            .unwrap()
            .into_dimensionality::<Ix4>()
            .unwrap()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn default_pipeline_steps() {
        let pipeline = TransformationPipeline::default();
        assert_eq!(pipeline.steps().len(), 6);
        assert!(matches!(pipeline.steps()[0], ImageTransform::Thumbnail(_)));
        assert!(matches!(pipeline.steps()[5], ImageTransform::ToTensor(_)));

        let custom = TransformationPipeline::from_steps(vec![ToTensor {}.into()]);
        let tensor = custom.transform_image(RgbImage::new(5, 4)).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 4, 5]);
    }

    #[test]
    fn decode_payload_strips_data_uri() {
        let encoded = general_purpose::STANDARD.encode(b"font");
        assert_eq!(decode_payload(&encoded).unwrap(), b"font");
        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_payload(&uri).unwrap(), b"font");
        let wrapped = format!("{}\n{}", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_payload(&wrapped).unwrap(), b"font");
    }

    #[test]
    fn decode_payload_rejects_malformed_base64() {
        assert!(matches!(
            decode_payload("data:image/png;base64,not*base64!"),
            Err(Error::Base64(_))
        ));
    }

    #[test]
    fn preprocess_rejects_non_image_bytes() {
        let pipeline = TransformationPipeline::default();
        assert!(matches!(
            pipeline.preprocess(b"definitely not an image"),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn small_square_image_is_centered_and_padded_with_white() {
        let side = 100_u32;
        let image = RgbImage::from_fn(side, side, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
        });
        let pipeline = TransformationPipeline::default();
        let tensor = pipeline
            .preprocess(&png_bytes(DynamicImage::ImageRgb8(image.clone())))
            .unwrap();
        let arr = to_array(tensor);
        assert_eq!(arr.shape(), &[1, 3, TARGET_SIZE, TARGET_SIZE]);

        let offset = (TARGET_SIZE - side as usize) / 2;
        for y in 0..TARGET_SIZE {
            for x in 0..TARGET_SIZE {
                let inside = (offset..offset + side as usize).contains(&x)
                    && (offset..offset + side as usize).contains(&y);
                for c in 0..3 {
                    let expected = if inside {
                        let pixel = image[((x - offset) as u32, (y - offset) as u32)];
                        normalized(pixel[c], c)
                    } else {
                        normalized(255, c)
                    };
                    assert!(
                        close(arr[[0, c, y, x]], expected),
                        "channel {c} at ({x}, {y}): {} != {expected}",
                        arr[[0, c, y, x]]
                    );
                }
            }
        }
    }

    #[test]
    fn odd_offsets_round_down() {
        let image = RgbImage::from_pixel(3, 5, Rgb([0, 0, 0]));
        let pipeline = TransformationPipeline::default();
        let arr = to_array(pipeline.transform_image(image).unwrap());
        // x offset floor(221 / 2) = 110, y offset floor(219 / 2) = 109
        assert!(close(arr[[0, 0, 109, 110]], normalized(0, 0)));
        assert!(close(arr[[0, 0, 109, 109]], normalized(255, 0)));
        assert!(close(arr[[0, 0, 108, 110]], normalized(255, 0)));
        assert!(close(arr[[0, 0, 113, 112]], normalized(0, 0)));
        assert!(close(arr[[0, 0, 114, 112]], normalized(255, 0)));
        assert!(close(arr[[0, 0, 113, 113]], normalized(255, 0)));
    }

    #[test]
    fn large_image_is_shrunk_to_fit() {
        let image = RgbImage::from_pixel(600, 300, Rgb([0, 0, 0]));
        let pipeline = TransformationPipeline::default();
        let arr = to_array(pipeline.transform_image(image).unwrap());
        assert_eq!(arr.shape(), &[1, 3, 224, 224]);

        // 600x300 -> 224x112, vertical offset 56
        let black = normalized(0, 1);
        let white = normalized(255, 1);
        assert!(close(arr[[0, 1, 56, 0]], black));
        assert!(close(arr[[0, 1, 167, 223]], black));
        assert!(close(arr[[0, 1, 55, 112]], white));
        assert!(close(arr[[0, 1, 168, 112]], white));
        // away from the edges the resampled pixels stay black
        assert!(close(arr[[0, 1, 112, 112]], black));
    }

    #[test]
    fn output_shape_is_fixed() {
        let pipeline = TransformationPipeline::default();
        for (w, h) in [(1, 1), (224, 224), (225, 10), (10, 999), (1000, 1000), (3, 224)] {
            let image = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
            let tensor = pipeline.transform_image(image).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 224, 224], "input {w}x{h}");
        }
    }

    #[test]
    fn alpha_is_dropped() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 0]));
        let pipeline = TransformationPipeline::default();
        let arr = to_array(
            pipeline
                .preprocess(&png_bytes(DynamicImage::ImageRgba8(image)))
                .unwrap(),
        );
        assert!(close(arr[[0, 0, 110, 110]], normalized(10, 0)));
        assert!(close(arr[[0, 2, 110, 110]], normalized(30, 2)));
    }
}
