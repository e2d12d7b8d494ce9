//! The classifier behind the font predictions.
//!
//! Everything else in the crate talks to [`Classifier`]; [`OnnxClassifier`] is
//! the real implementation, backed by a tract plan.

use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

use tract_onnx::prelude::*;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::TARGET_SIZE;

/// Anything that turns an input tensor into one score per class.
pub trait Classifier {
    fn classify(&self, input: Tensor) -> Result<Vec<f32>>;
}

impl<F> Classifier for F
where
    F: Fn(Tensor) -> Result<Vec<f32>>,
{
    fn classify(&self, input: Tensor) -> Result<Vec<f32>> {
        self(input)
    }
}

/// Where the ONNX graph comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    Path(PathBuf),
    Url(String),
}

impl ModelSource {
    /// `http://` and `https://` identifiers are URLs, everything else a path.
    pub fn parse(identifier: &str) -> Self {
        if identifier.starts_with("http://") || identifier.starts_with("https://") {
            ModelSource::Url(identifier.to_string())
        } else {
            ModelSource::Path(PathBuf::from(identifier))
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Path(path) => write!(f, "{}", path.display()),
            ModelSource::Url(url) => f.write_str(url),
        }
    }
}

type TractSimplePlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxClassifier {
    model: TractSimplePlan,
}

impl OnnxClassifier {
    /// Load the model with its single input fixed to `f32 (1, 3, 224, 224)`.
    /// URLs are downloaded once; there is no retry.
    #[instrument(skip_all, fields(source = %source))]
    pub fn load(source: &ModelSource) -> Result<Self> {
        let input_shape = tvec!(1, 3, TARGET_SIZE, TARGET_SIZE);
        let model = match source {
            ModelSource::Path(path) => {
                if !path.exists() {
                    return Err(Error::Inference(format!(
                        "{} is not found",
                        path.display()
                    )));
                }
                tract_onnx::onnx().model_for_path(path)?
            }
            ModelSource::Url(url) => {
                let bytes = fetch(url)?;
                tract_onnx::onnx().model_for_read(&mut Cursor::new(bytes))?
            }
        };
        let model = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), input_shape))?
            .into_optimized()?
            .into_runnable()?;
        info!("model ready");
        Ok(OnnxClassifier { model })
    }
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    info!(url, "downloading model");
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?;
    debug!(len = bytes.len(), "model downloaded");
    Ok(bytes.to_vec())
}

impl Classifier for OnnxClassifier {
    #[instrument(level = "debug", skip_all)]
    fn classify(&self, input: Tensor) -> Result<Vec<f32>> {
        let result = self.model.run(tvec!(input))?;
        let output = result
            .first()
            .ok_or_else(|| Error::Inference("model produced no output".to_string()))?;
        let scores = first_row(&output.to_array_view::<f32>()?)?;
        debug!(classes = scores.len(), "forward pass done");
        Ok(scores)
    }
}

/// Scores of the first batch entry of a `(batch, classes)` output, or of a
/// flat `(classes)` output.
fn first_row(view: &tract_ndarray::ArrayViewD<f32>) -> Result<Vec<f32>> {
    let scores: Vec<f32> = match view.ndim() {
        0 => Vec::new(),
        1 => view.iter().copied().collect(),
        _ if view.shape()[0] == 0 => Vec::new(),
        _ => view
            .index_axis(tract_ndarray::Axis(0), 0)
            .iter()
            .copied()
            .collect(),
    };
    if scores.is_empty() {
        return Err(Error::Inference("model produced an empty score vector".to_string()));
    }
    Ok(scores)
}
