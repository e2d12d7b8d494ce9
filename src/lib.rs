//! Guess the font family shown in an image.
//!
//! The image is shrunk and padded into a `(1, 3, 224, 224)` ImageNet-normalized
//! tensor, scored by a [`Classifier`], and the best classes are mapped to font
//! names through a [`FontMapping`].

pub mod config;
pub mod error;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod ranking;
pub mod transformer;

use tract_onnx::prelude::Tensor;
use tracing::{info, instrument};

pub use error::{Error, Result};
pub use mapping::{FontMapping, FontRecord};
pub use model::{Classifier, ModelSource, OnnxClassifier};
pub use pipeline::{decode_payload, TransformationPipeline};
pub use protocol::{Request, Response};
pub use ranking::{rank_fonts, top_k, FontPrediction};
pub use transformer::ImageSize;

/// Side of the square model input.
pub const TARGET_SIZE: usize = 224;
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const DEFAULT_TOP_K: usize = 15;
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/storia/font-classify-onnx/resolve/main/model.onnx";

/// Decode the request payload into the model input tensor.
#[instrument(skip_all)]
pub fn prepare(payload: &str, pipeline: &TransformationPipeline) -> Result<Tensor> {
    let bytes = decode_payload(payload)?;
    info!(len = bytes.len(), "decoded payload");
    pipeline.preprocess(&bytes)
}

/// Score the tensor and rank the `k` most likely fonts.
#[instrument(skip_all, fields(k = k))]
pub fn predict<C: Classifier + ?Sized>(
    input: Tensor,
    classifier: &C,
    mapping: &FontMapping,
    k: usize,
) -> Result<Vec<FontPrediction>> {
    let scores = classifier.classify(input)?;
    info!(classes = scores.len(), "scored image");
    Ok(rank_fonts(&scores, mapping, k))
}

/// [`prepare`] followed by [`predict`].
pub fn identify<C: Classifier + ?Sized>(
    payload: &str,
    pipeline: &TransformationPipeline,
    classifier: &C,
    mapping: &FontMapping,
    k: usize,
) -> Result<Vec<FontPrediction>> {
    let input = prepare(payload, pipeline)?;
    predict(input, classifier, mapping, k)
}
