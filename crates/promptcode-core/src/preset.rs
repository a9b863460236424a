//! Preset store — named file lists persisted as JSON documents.
//!
//! Presets live under `<workspace>/.promptcode/presets/`, one document per
//! preset. A workspace without that directory simply has no presets.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ContextError;

/// Preset directory, relative to the workspace root.
pub const PRESETS_DIR: &str = ".promptcode/presets";

/// A named, ordered list of workspace-relative files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Order is significant: it is the concatenation order of a bundle.
    pub files: Vec<String>,
}

impl Preset {
    pub fn new(name: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            files,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Replace every character outside `[a-zA-Z0-9-_]` with `_`.
///
/// The result never contains a path separator or `.`, so it cannot escape
/// the preset directory.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Reads and writes presets for a single workspace.
#[derive(Debug, Clone)]
pub struct PresetStore {
    dir: PathBuf,
}

impl PresetStore {
    /// Create a store for the given workspace root.
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        Self {
            dir: workspace.as_ref().join(PRESETS_DIR),
        }
    }

    /// The directory holding the preset documents.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The document path a preset with this name is saved to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_name(name)))
    }

    /// Load every preset document, in filename order.
    ///
    /// A missing preset directory yields an empty list.
    pub async fn load_all(&self) -> Result<Vec<Preset>, ContextError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "No preset directory");
                return Ok(Vec::new());
            }
            Err(source) => return Err(self.store_err(source)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| self.store_err(source))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut presets = Vec::with_capacity(paths.len());
        for path in paths {
            presets.push(read_preset(&path).await?);
        }
        debug!(count = presets.len(), "Loaded presets");
        Ok(presets)
    }

    /// Load the preset with exactly this name.
    ///
    /// If two documents declare the same name, the later one in filename
    /// order wins.
    pub async fn load_by_name(&self, name: &str) -> Result<Preset, ContextError> {
        self.load_all()
            .await?
            .into_iter()
            .rev()
            .find(|p| p.name == name)
            .ok_or_else(|| ContextError::PresetNotFound {
                name: name.to_string(),
            })
    }

    /// Write a preset, replacing any document with the same derived filename.
    pub async fn save(&self, preset: &Preset) -> Result<PathBuf, ContextError> {
        if preset.name.is_empty() {
            return Err(ContextError::InvalidPreset(
                "preset name must not be empty".to_string(),
            ));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| self.store_err(source))?;

        let path = self.path_for(&preset.name);
        let json = encode(preset)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| ContextError::StoreIo {
                path: path.clone(),
                source,
            })?;

        info!(name = %preset.name, path = %path.display(), "Saved preset");
        Ok(path)
    }

    fn store_err(&self, source: io::Error) -> ContextError {
        ContextError::StoreIo {
            path: self.dir.clone(),
            source,
        }
    }
}

fn encode(preset: &Preset) -> Result<String, ContextError> {
    serde_json::to_string_pretty(preset).map_err(|e| {
        ContextError::InvalidPreset(format!("cannot encode preset {:?}: {e}", preset.name))
    })
}

async fn read_preset(path: &Path) -> Result<Preset, ContextError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ContextError::StoreIo {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| ContextError::PresetParse {
        path: path.to_path_buf(),
        source,
    })
}
