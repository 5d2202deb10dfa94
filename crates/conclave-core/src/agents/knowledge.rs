//! Shared knowledge injected into agent prompts
//!
//! A knowledge directory holds plain documents. When it contains an `index.json`
//! (`{"documents": ["a.md", ...]}`) those files are used in that order; otherwise
//! every `.md` and `.txt` file is used, sorted by name.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Default knowledge directory
pub const DEFAULT_KNOWLEDGE_DIR: &str = "config/knowledge";

#[derive(Deserialize)]
struct KnowledgeIndex {
    documents: Vec<String>,
}

/// Loaded knowledge documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Knowledge {
    documents: Vec<String>,
}

impl Knowledge {
    /// Knowledge from in-memory documents
    #[must_use]
    pub fn new(documents: Vec<String>) -> Self {
        Self { documents }
    }

    /// Load the documents in `dir`. A missing directory yields no knowledge.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the directory or a malformed index cannot be read.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            warn!("Knowledge directory not found: {:?}", dir);
            return Ok(Self::default());
        }

        let index_path = dir.join("index.json");
        let files: Vec<String> = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path).map_err(|e| {
                Error::Configuration(format!("Failed to read {:?}: {}", index_path, e))
            })?;
            let index: KnowledgeIndex = serde_json::from_str(&raw).map_err(|e| {
                Error::Configuration(format!("Invalid knowledge index {:?}: {}", index_path, e))
            })?;
            index.documents
        } else {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                Error::Configuration(format!("Failed to read knowledge directory {:?}: {}", dir, e))
            })?;
            let mut names: Vec<String> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .extension()
                            .is_some_and(|ext| ext == "md" || ext == "txt")
                })
                .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            names.sort();
            names
        };

        // Listed documents that are missing contribute an empty entry
        let documents = files
            .iter()
            .map(|name| std::fs::read_to_string(dir.join(name)).unwrap_or_default())
            .collect::<Vec<_>>();

        debug!("Loaded {} knowledge documents from {:?}", documents.len(), dir);
        Ok(Self { documents })
    }

    /// Documents in order
    #[must_use]
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Documents joined by newlines, as injected into prompts
    #[must_use]
    pub fn joined(&self) -> String {
        self.documents.join("\n")
    }

    /// Whether there is no knowledge at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
