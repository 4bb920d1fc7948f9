//! Dataset metadata
//!
//! A [`MetadataBundle`] carries the three independent parts of a dataset's
//! metadata: top-level dataset fields, per-dimension label/description pairs
//! and usage notes. Bundles are read either from a CSV-W metadata document
//! ([`csvw`]) or from a JSON file already shaped as a bundle.

pub mod csvw;
pub mod publisher;

pub use publisher::{DimensionReport, MetadataPublisher};

use crate::error::{CmdError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Keys a usage note may carry
pub const USAGE_NOTE_KEYS: [&str; 2] = ["note", "title"];

/// Contact listed on a dataset landing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Top-level dataset fields (`PUT /dataset/datasets/{id}`)
///
/// Only the fields that are set are sent. Fields the platform knows but this
/// struct does not name pass through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Shown as the summary section in the publishing UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_release: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_frequency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_statistic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DatasetMetadata {
    pub fn is_empty(&self) -> bool {
        *self == DatasetMetadata::default()
    }
}

/// Label and description of one dimension
/// (`PUT /dataset/instances/{id}/dimensions/{name}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A validated usage note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageNote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Metadata for one dataset release
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBundle {
    #[serde(default)]
    pub metadata: DatasetMetadata,

    /// Keyed by the dimension name used in the recipe
    #[serde(default)]
    pub dimension_data: BTreeMap<String, DimensionMetadata>,

    /// Raw notes; see [`MetadataBundle::usage_notes`]
    #[serde(default)]
    pub usage_notes: Vec<Value>,
}

impl MetadataBundle {
    /// Load a bundle from a CSV-W document or a bundle-shaped JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CmdError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&content).map_err(|e| {
            CmdError::invalid_metadata(format!("{} is not valid JSON: {}", path.display(), e))
        })?;

        Self::from_document(document)
    }

    /// Interpret a parsed JSON document as a bundle.
    pub fn from_document(document: Value) -> Result<Self> {
        let is_bundle = document
            .as_object()
            .map(|object| {
                ["metadata", "dimension_data", "usage_notes"]
                    .iter()
                    .any(|key| object.contains_key(*key))
            })
            .ok_or_else(|| CmdError::invalid_metadata("document must be a JSON object"))?;

        if is_bundle {
            serde_json::from_value(document).map_err(|e| CmdError::invalid_metadata(e.to_string()))
        } else {
            csvw::read_csvw(document)
        }
    }

    /// Validated usage notes.
    ///
    /// Each note may only carry `note` and/or `title`. Called before any
    /// network request so a malformed note never leaves partial updates.
    pub fn usage_notes(&self) -> Result<Vec<UsageNote>> {
        validate_usage_notes(&self.usage_notes)
    }
}

/// Check raw usage notes against the allowed keys and convert them.
pub fn validate_usage_notes(notes: &[Value]) -> Result<Vec<UsageNote>> {
    notes
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let position = index + 1;
            let object = raw.as_object().ok_or_else(|| {
                CmdError::precondition(format!("usage note {} must be an object", position))
            })?;

            if let Some(key) = object
                .keys()
                .find(|key| !USAGE_NOTE_KEYS.contains(&key.as_str()))
            {
                return Err(CmdError::precondition(format!(
                    "usage note {} has key '{}'; a usage note can only have a note and/or a title",
                    position, key
                )));
            }

            serde_json::from_value(raw.clone()).map_err(|e| {
                CmdError::precondition(format!("usage note {} is malformed: {}", position, e))
            })
        })
        .collect()
}
