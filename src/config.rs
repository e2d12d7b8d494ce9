//! Runtime settings.
//!
//! Defaults, then an optional TOML file, then `FONT_CLASSIFY_*` environment
//! variables, each layer overriding the one before.

use std::path::{Path, PathBuf};

use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use tracing::Level;

use crate::error::Result;
use crate::mapping::FontMapping;
use crate::model::ModelSource;
use crate::{DEFAULT_MODEL_URL, DEFAULT_TOP_K};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "font-classify.toml";
pub const ENV_PREFIX: &str = "FONT_CLASSIFY";

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Path or `http(s)` URL of the ONNX classifier.
    pub model: String,

    /// Tab-separated class index to font table; the built-in placeholder
    /// table when unset.
    #[serde(default)]
    pub mapping: Option<PathBuf>,

    /// Number of fonts reported.
    pub top_k: usize,

    #[serde_as(as = "DisplayFromStr")]
    pub log_level: Level,
}

impl Settings {
    /// Load the layered settings. An explicit `config_file` must exist; the
    /// default one is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let file = match config_file {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };
        let builder = defaults()?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX));
        Settings::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(ConfigError::Message("top_k must be greater than 0".into()).into());
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Message("model must not be empty".into()).into());
        }
        Ok(())
    }

    pub fn model_source(&self) -> ModelSource {
        ModelSource::parse(self.model.trim())
    }

    pub fn font_mapping(&self) -> Result<FontMapping> {
        match &self.mapping {
            Some(path) => FontMapping::from_tsv_path(path),
            None => Ok(FontMapping::builtin()),
        }
    }
}

fn defaults() -> std::result::Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("model", DEFAULT_MODEL_URL)?
        .set_default("top_k", DEFAULT_TOP_K as u64)?
        .set_default("log_level", "warn")
}
