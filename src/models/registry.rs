// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model registry: resolves a model name to files on local disk
//!
//! A name that points at an existing directory is used as-is. Anything else
//! is treated as a Hugging Face Hub repository id and fetched through the
//! hf-hub cache. These calls block, so callers run them off the async runtime.

use hf_hub::api::sync::{Api, ApiBuilder};
use hf_hub::Cache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const ONNX_EXTENSION: &str = ".onnx";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Model '{model}' is missing required file '{file}'")]
    MissingFile { model: String, file: String },

    #[error(
        "Model '{model}' has no ONNX graph '{file}': an ONNX export of the model is required, \
         point the model setting at an exported directory or repository ({reason})"
    )]
    MissingOnnxExport {
        model: String,
        file: String,
        reason: String,
    },

    #[error("Failed to fetch '{file}' for model '{model}': {message}")]
    Fetch {
        model: String,
        file: String,
        message: String,
    },

    #[error("Failed to initialise model hub client: {0}")]
    Client(String),
}

/// Registry settings
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Cache directory, `None` uses the hf-hub default
    pub cache_dir: Option<PathBuf>,
    /// Access token for gated repositories
    pub token: Option<String>,
    /// Never touch the network
    pub offline: bool,
}

/// Where a model's files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub(String),
}

impl ModelSource {
    pub fn from_name(name: &str) -> Self {
        let path = Path::new(name);
        if path.is_dir() {
            ModelSource::Local(path.to_path_buf())
        } else {
            ModelSource::Hub(name.to_string())
        }
    }
}

/// Files resolved for one model
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: String,
    files: HashMap<String, PathBuf>,
}

impl ModelFiles {
    /// Path for a file, if it was resolved
    pub fn get(&self, file: &str) -> Option<&Path> {
        self.files.get(file).map(|p| p.as_path())
    }

    /// Path for a file that must be present
    pub fn require(&self, file: &str) -> Result<&Path, RegistryError> {
        self.get(file).ok_or_else(|| RegistryError::MissingFile {
            model: self.model.clone(),
            file: file.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub struct ModelRegistry {
    config: RegistryConfig,
    api: Option<Api>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("cache_dir", &self.config.cache_dir)
            .field("offline", &self.config.offline)
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let api = if config.offline {
            None
        } else {
            let mut builder = ApiBuilder::new()
                .with_progress(false)
                .with_token(config.token.clone());
            if let Some(dir) = &config.cache_dir {
                builder = builder.with_cache_dir(dir.clone());
            }
            Some(
                builder
                    .build()
                    .map_err(|e| RegistryError::Client(e.to_string()))?,
            )
        };

        Ok(Self { config, api })
    }

    fn cache(&self) -> Cache {
        match &self.config.cache_dir {
            Some(dir) => Cache::new(dir.clone()),
            None => Cache::default(),
        }
    }

    /// Resolve a single file, downloading it if needed
    pub fn fetch(&self, model: &str, file: &str) -> Result<PathBuf, RegistryError> {
        match ModelSource::from_name(model) {
            ModelSource::Local(dir) => {
                let path = dir.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(RegistryError::MissingFile {
                        model: model.to_string(),
                        file: file.to_string(),
                    })
                }
            }
            ModelSource::Hub(repo) => match &self.api {
                Some(api) => {
                    debug!("Fetching {}/{}", repo, file);
                    api.model(repo.clone())
                        .get(file)
                        .map_err(|e| RegistryError::Fetch {
                            model: repo,
                            file: file.to_string(),
                            message: e.to_string(),
                        })
                }
                None => self
                    .cache()
                    .model(repo.clone())
                    .get(file)
                    .ok_or(RegistryError::MissingFile {
                        model: repo,
                        file: file.to_string(),
                    }),
            },
        }
    }

    /// Resolve a model's required and optional files
    ///
    /// Any missing required file is an error; missing optional files are
    /// simply absent from the result.
    pub fn resolve(
        &self,
        model: &str,
        required: &[&str],
        optional: &[&str],
    ) -> Result<ModelFiles, RegistryError> {
        info!("Resolving model files for {}", model);
        let mut files = HashMap::new();

        for file in required {
            let path = self.fetch(model, file).map_err(|e| match e {
                RegistryError::MissingFile { .. } | RegistryError::Fetch { .. }
                    if file.ends_with(ONNX_EXTENSION) =>
                {
                    RegistryError::MissingOnnxExport {
                        model: model.to_string(),
                        file: file.to_string(),
                        reason: e.to_string(),
                    }
                }
                _ => e,
            })?;
            files.insert(file.to_string(), path);
        }

        for file in optional {
            match self.fetch(model, file) {
                Ok(path) => {
                    files.insert(file.to_string(), path);
                }
                Err(e) => debug!("Optional file unavailable: {}", e),
            }
        }

        Ok(ModelFiles {
            model: model.to_string(),
            files,
        })
    }
}
