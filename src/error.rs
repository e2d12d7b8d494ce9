use std::io;
use thiserror::Error;
use tract_onnx::prelude::TractError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("cannot fetch model: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("font mapping line {line}: {reason}")]
    Mapping { line: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Unexpected(&'static str),
}

/// Broad category of an [`Error`], used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Inference,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Base64(_) | Error::Image(_) => ErrorKind::Decode,
            Error::Inference(_) | Error::Fetch(_) => ErrorKind::Inference,
            _ => ErrorKind::Unexpected,
        }
    }
}

// tract reports through anyhow, which does not implement `std::error::Error`,
// so the chain is flattened into the message.
impl From<TractError> for Error {
    fn from(err: TractError) -> Self {
        Error::Inference(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
