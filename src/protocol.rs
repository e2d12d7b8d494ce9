//! JSON shapes read from stdin and written to stdout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ranking::FontPrediction;

/// The single object read from stdin.
#[derive(Deserialize)]
pub struct Request {
    /// Base64 image, optionally as a data URI.
    pub image: String,
}

impl Request {
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request {{ image: <{} bytes> }}", self.image.len())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Success {
        success: bool,
        fonts: Vec<FontPrediction>,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl Response {
    pub fn success(fonts: Vec<FontPrediction>) -> Self {
        Response::Success {
            success: true,
            fonts,
        }
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Response::Failure {
            success: false,
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            // only reachable through a non-string map key, which these shapes never have
            Err(err) => format!(
                "{{\"success\":false,\"error\":{:?}}}",
                err.to_string()
            ),
        }
    }
}

impl From<Result<Vec<FontPrediction>>> for Response {
    fn from(result: Result<Vec<FontPrediction>>) -> Self {
        match result {
            Ok(fonts) => Response::success(fonts),
            Err(err) => Response::failure(err),
        }
    }
}
