//! Image transform steps applied, in order, by
//! [`TransformationPipeline`](crate::pipeline::TransformationPipeline).

use enum_dispatch::enum_dispatch;
use image::imageops::{replace, resize, FilterType};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tract_onnx::prelude::{tract_ndarray, tract_ndarray::Array4, Tensor};
use tract_onnx::tract_core::ndarray::Array;

use crate::error::{Error, Result};

#[enum_dispatch]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ImageTransform {
    Thumbnail(Thumbnail),
    PadToSquare(PadToSquare),
    ToArray(ToArray),
    Transpose(Transpose),
    Normalization(Normalization),
    ToTensor(ToTensor),
}

#[enum_dispatch(ImageTransform)]
pub trait GenericTransform {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult>;
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "FilterType")]
enum FilterOption {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ImageSize {
    pub width: usize,
    pub height: usize,
}

/// Shrinks the image to fit inside `max_size`, keeping its aspect ratio.
/// Images that already fit are passed through untouched.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thumbnail {
    pub max_size: ImageSize,
    #[serde(with = "FilterOption")]
    pub filter: FilterType,
}

/// Size an image of `width` x `height` is shrunk to so that it fits inside
/// `max_width` x `max_height`.
///
/// The constrained side takes the bound exactly; the other side is the floor
/// or ceiling of its proportional length, whichever keeps the aspect ratio
/// closer to the source (floor on a tie), and never drops below one pixel.
pub fn thumbnail_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if max_width >= width && max_height >= height {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    let (x, y) = (max_width as f64, max_height as f64);

    let closest = |exact: f64, error: &dyn Fn(f64) -> f64| -> u32 {
        let (floor, ceil) = (exact.floor(), exact.ceil());
        let best = if error(ceil) < error(floor) { ceil } else { floor };
        (best as u32).max(1)
    };

    if x / y >= aspect {
        let w = closest(y * aspect, &|n| (aspect - n / y).abs());
        (w, max_height)
    } else {
        let h = closest(x / aspect, &|n| {
            if n == 0.0 {
                0.0
            } else {
                (aspect - x / n).abs()
            }
        });
        (max_width, h)
    }
}

impl GenericTransform for Thumbnail {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let (new_width, new_height) = thumbnail_size(
                    width,
                    height,
                    self.max_size.width as u32,
                    self.max_size.height as u32,
                );
                if (new_width, new_height) == (width, height) {
                    return Ok(image.into());
                }
                tracing::debug!(width, height, new_width, new_height, "shrinking image");
                Ok(resize(&image, new_width, new_height, self.filter).into())
            }
            ImageTransformResult::Tensor(_) => {
                Err(Error::Unexpected("Image resize not implemented for Tensor"))
            }
            ImageTransformResult::Array4(_) => {
                Err(Error::Unexpected("Image resize not implemented for Array4"))
            }
        }
    }
}

/// Pastes the image at the center of an opaque canvas of `size`, filled with
/// `fill`. The offset on each axis is `floor((canvas - image) / 2)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PadToSquare {
    pub size: ImageSize,
    pub fill: [u8; 3],
}

impl GenericTransform for PadToSquare {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = (self.size.width as u32, self.size.height as u32);
                if image.width() > width || image.height() > height {
                    return Err(Error::Unexpected("Image is larger than the padding canvas"));
                }
                let mut canvas = RgbImage::from_pixel(width, height, Rgb(self.fill));
                let left = (width - image.width()) / 2;
                let top = (height - image.height()) / 2;
                replace(&mut canvas, &image, left as i64, top as i64);
                Ok(canvas.into())
            }
            ImageTransformResult::Tensor(_) => {
                Err(Error::Unexpected("Padding not implemented for Tensor"))
            }
            ImageTransformResult::Array4(_) => {
                Err(Error::Unexpected("Padding not implemented for Array4"))
            }
        }
    }
}

/// Raw pixel values as a `(1, height, width, 3)` array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToArray {}

impl GenericTransform for ToArray {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let arr = tract_ndarray::Array4::from_shape_fn(
                    (1_usize, height as usize, width as usize, 3_usize),
                    |(_, y, x, c)| image[(x as u32, y as u32)][c] as f32,
                );
                Ok(ImageTransformResult::Array4(arr))
            }
            ImageTransformResult::Tensor(tensor) => {
                let arr4 = tensor
                    .into_array::<f32>()
                    .ok()
                    .and_then(|arr| arr.into_dimensionality::<tract_ndarray::Ix4>().ok())
                    .ok_or(Error::Unexpected("Cannot convert tensor to Array4"))?;
                Ok(ImageTransformResult::Array4(arr4))
            }
            // already an array
            ImageTransformResult::Array4(arr4) => Ok(ImageTransformResult::Array4(arr4)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transpose {
    pub axes: [usize; 4],
}

impl GenericTransform for Transpose {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(_) => {
                Err(Error::Unexpected("Transpose not implemented for RgbImage"))
            }
            ImageTransformResult::Array4(arr) => {
                let arr = arr.permuted_axes(self.axes).as_standard_layout().into_owned();
                Ok(ImageTransformResult::Array4(arr))
            }
            ImageTransformResult::Tensor(tensor) => {
                let tensor = tensor
                    .permute_axes(&self.axes)
                    .map_err(|_| Error::Unexpected("Transpose should match the shape of the tensor"))?;
                Ok(ImageTransformResult::Tensor(tensor))
            }
        }
    }
}

/// Per-channel `(v - sub) / div` over a channel-first array. With `zeroone`
/// the values are first scaled from `[0, 255]` to `[0, 1]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Normalization {
    pub sub: [f32; 3],
    pub div: [f32; 3],
    pub zeroone: bool,
}

impl GenericTransform for Normalization {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(_) => {
                Err(Error::Unexpected("Normalization not implemented for RgbImage"))
            }
            ImageTransformResult::Tensor(_) => {
                Err(Error::Unexpected("Normalization not implemented for Tensor"))
            }
            ImageTransformResult::Array4(arr) => {
                if arr.shape()[1] != 3 {
                    return Err(Error::Unexpected("Normalization expects a channel-first array"));
                }
                let sub = Array::from_shape_vec((1, 3, 1, 1), self.sub.to_vec())
                    .map_err(|_| Error::Unexpected("Wrong conversion to array"))?;
                let div = Array::from_shape_vec((1, 3, 1, 1), self.div.to_vec())
                    .map_err(|_| Error::Unexpected("Wrong conversion to array"))?;
                let new_arr = if self.zeroone {
                    (arr / 255.0 - sub) / div
                } else {
                    (arr - sub) / div
                };
                Ok(ImageTransformResult::Array4(new_arr))
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToTensor {}

impl GenericTransform for ToTensor {
    fn transform(&self, input: ImageTransformResult) -> Result<ImageTransformResult> {
        match input {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                let tensor: Tensor = tract_ndarray::Array4::from_shape_fn(
                    (1_usize, 3_usize, height as usize, width as usize),
                    |(_, c, y, x)| image[(x as u32, y as u32)][c] as f32,
                )
                .into();
                Ok(ImageTransformResult::Tensor(tensor))
            }
            // already a tensor
            ImageTransformResult::Tensor(tensor) => Ok(ImageTransformResult::Tensor(tensor)),
            ImageTransformResult::Array4(arr4) => Ok(ImageTransformResult::Tensor(arr4.into())),
        }
    }
}

pub enum ImageTransformResult {
    RgbImage(RgbImage),
    Array4(Array4<f32>),
    Tensor(Tensor),
}

impl ImageTransformResult {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            ImageTransformResult::RgbImage(image) => {
                let (width, height) = image.dimensions();
                vec![height as usize, width as usize, 3]
            }
            ImageTransformResult::Array4(array) => array.shape().to_vec(),
            ImageTransformResult::Tensor(tensor) => tensor.shape().to_vec(),
        }
    }
}

impl From<RgbImage> for ImageTransformResult {
    fn from(rgb_image: RgbImage) -> Self {
        ImageTransformResult::RgbImage(rgb_image)
    }
}

impl From<Tensor> for ImageTransformResult {
    fn from(tensor: Tensor) -> Self {
        ImageTransformResult::Tensor(tensor)
    }
}
