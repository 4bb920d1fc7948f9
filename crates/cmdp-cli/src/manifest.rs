//! Batch manifest handling
//!
//! A batch manifest lists the dataset releases to publish in one run:
//!
//! ```yaml
//! datasets:
//!   - dataset_id: cpih01
//!     v4: data/v4-cpih01.csv
//!     edition: time-series
//!     collection_name: CPIH October
//!     metadata_file: data/cpih01.csv-metadata.json
//! ```
//!
//! Relative file paths are resolved against the manifest's directory.

use crate::error::{CmdError, Result};
use crate::pipeline::{check_unique, DatasetRequest};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Batch manifest file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchManifest {
    #[serde(default)]
    pub datasets: Vec<DatasetRequest>,
}

impl BatchManifest {
    /// Load a manifest and resolve its paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CmdError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut manifest: BatchManifest = serde_yaml::from_str(&content)
            .map_err(|e| CmdError::invalid_manifest(format!("Failed to parse YAML: {}", e)))?;

        if let Some(base) = path.parent() {
            manifest.resolve_paths(base);
        }
        manifest.validate()?;

        Ok(manifest)
    }

    /// Make relative `v4` and `metadata_file` paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dataset in &mut self.datasets {
            if dataset.v4.is_relative() {
                dataset.v4 = base.join(&dataset.v4);
            }
            if dataset.metadata_file.is_relative() {
                dataset.metadata_file = base.join(&dataset.metadata_file);
            }
        }
    }

    /// Validate the manifest structure
    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(CmdError::invalid_manifest("The manifest lists no datasets"));
        }

        for (index, dataset) in self.datasets.iter().enumerate() {
            let entry = index + 1;
            let blank = [
                ("dataset_id", dataset.dataset_id.as_str()),
                ("edition", dataset.edition.as_str()),
                ("collection_name", dataset.collection_name.as_str()),
            ]
            .into_iter()
            .find(|(_, value)| value.trim().is_empty());

            if let Some((field, _)) = blank {
                return Err(CmdError::invalid_manifest(format!(
                    "Dataset entry {} has an empty '{}'",
                    entry, field
                )));
            }
        }

        check_unique(&self.datasets)
            .map_err(|e| CmdError::invalid_manifest(e.root().to_string()))
    }
}
