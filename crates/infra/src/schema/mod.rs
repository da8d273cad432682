//! JSON Schema registry.
//!
//! Documents are registered (or loaded from a directory) by logical name, the
//! file name such as `stock-add.request.json`. Each document is compiled the
//! first time it is asked for and the compiled validator is cached for the
//! life of the registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;

/// The registry cannot produce a validator. Always a deployment problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema not found: {0}")]
    NotFound(String),

    #[error("failed to compile schema {name}: {message}")]
    Compile { name: String, message: String },

    #[error("failed to read schema {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse schema {path}: {message}")]
    Parse { path: String, message: String },
}

/// A value that does not satisfy its schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("JSON data does not conform to schema {schema}: '{instance_path}': {message}")]
pub struct SchemaViolation {
    pub schema: String,
    /// JSON pointer to the offending value (`""` for the document root).
    pub instance_path: String,
    pub message: String,
}

pub struct CompiledSchema {
    name: String,
    validator: jsonschema::Validator,
}

impl core::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledSchema").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CompiledSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reports the first violation found.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        match self.validator.iter_errors(value).next() {
            None => Ok(()),
            Some(err) => Err(SchemaViolation {
                schema: self.name.clone(),
                instance_path: err.instance_path.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    documents: HashMap<String, Value>,
    compiled: RwLock<HashMap<String, Arc<CompiledSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every `*.json` file in `dir` under its file name.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let dir = dir.as_ref();
        let io_error = |path: &Path, err: std::io::Error| SchemaError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        };

        let mut registry = Self::new();
        for entry in std::fs::read_dir(dir).map_err(|e| io_error(dir, e))? {
            let path = entry.map_err(|e| io_error(dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            let document = serde_json::from_str(&raw).map_err(|e| SchemaError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            registry.insert(name, document);
        }

        tracing::info!(dir = %dir.display(), schemas = registry.documents.len(), "schemas loaded");
        Ok(registry)
    }

    /// Register (or replace) a document. Drops any cached compilation of it.
    pub fn insert(&mut self, name: impl Into<String>, document: Value) {
        let name = name.into();
        if let Ok(compiled) = self.compiled.get_mut() {
            compiled.remove(&name);
        }
        self.documents.insert(name, document);
    }

    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.insert(name, document);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Compiled validator for `name`, compiling on first use.
    pub fn compile(&self, name: &str) -> Result<Arc<CompiledSchema>, SchemaError> {
        if let Some(hit) = self.cached(name) {
            return Ok(hit);
        }

        let document = self
            .documents
            .get(name)
            .ok_or_else(|| SchemaError::NotFound(name.to_string()))?;

        let validator = jsonschema::validator_for(document).map_err(|e| SchemaError::Compile {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let compiled = Arc::new(CompiledSchema {
            name: name.to_string(),
            validator,
        });

        // Two requests may race to compile the same schema; the first insert wins.
        if let Ok(mut cache) = self.compiled.write() {
            return Ok(Arc::clone(
                cache.entry(name.to_string()).or_insert(compiled),
            ));
        }
        Ok(compiled)
    }

    fn cached(&self, name: &str) -> Option<Arc<CompiledSchema>> {
        self.compiled.read().ok()?.get(name).cloned()
    }
}
