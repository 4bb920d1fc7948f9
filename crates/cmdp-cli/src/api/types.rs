//! Request bodies and parameters for the publishing platform API
//!
//! Response documents (recipes, jobs, instances, collections) live in
//! `cmdp_common::types`.

use chrono::NaiveDate;
use cmdp_common::types::{InstanceState, JobFile, JobState};
use serde::{Deserialize, Serialize};

use crate::metadata::UsageNote;

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Empty `links` object of a new job
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoLinks {}

/// New import job (`POST /dataset/jobs`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewJob {
    pub recipe: String,
    pub state: JobState,
    pub links: NoLinks,
    pub files: Vec<JobFile>,
}

impl NewJob {
    /// Job in the `created` state with a single file attached
    pub fn with_file(recipe_id: impl Into<String>, file: JobFile) -> Self {
        Self {
            recipe: recipe_id.into(),
            state: JobState::Created,
            links: NoLinks::default(),
            files: vec![file],
        }
    }
}

/// Job state change (`PUT /dataset/jobs/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStateUpdate {
    pub state: JobState,
}

/// Instance edition confirmation (`PUT /dataset/instances/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionConfirmation {
    pub edition: String,
    pub state: InstanceState,
    pub release_date: String,
}

impl EditionConfirmation {
    pub fn new(edition: impl Into<String>, release_date: NaiveDate) -> Self {
        Self {
            edition: edition.into(),
            state: InstanceState::EditionConfirmed,
            release_date: format!("{}T00:00:00.000Z", release_date.format("%Y-%m-%d")),
        }
    }
}

/// New dataset record (`POST /dataset/datasets/{id}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewDataset {
    pub id: String,
}

/// New collection (`POST /zebedee/collection`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
}

/// Marks a dataset or version as complete inside a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionItemState {
    pub state: String,
}

impl CollectionItemState {
    pub fn complete() -> Self {
        Self {
            state: "Complete".to_string(),
        }
    }
}

/// Replace a version's usage notes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageNotesUpdate {
    pub usage_notes: Vec<UsageNote>,
}

/// Replace an output instance's editions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditionsUpdate {
    pub editions: Vec<String>,
}

/// Parameters of one chunk of a resumable transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    /// Transfer identifier, constant for every chunk of one file
    pub identifier: String,
    pub file_name: String,
    /// 1-based
    pub number: u32,
    pub total_chunks: u32,
    /// Size of this chunk in bytes
    pub size: u64,
    pub total_size: u64,
}

impl ChunkUpload {
    pub const CONTENT_TYPE: &'static str = "text/csv";

    /// Query parameters of the resumable upload contract
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("resumableType", Self::CONTENT_TYPE.to_string()),
            ("resumableChunkNumber", self.number.to_string()),
            ("resumableCurrentChunkSize", self.size.to_string()),
            ("resumableTotalSize", self.total_size.to_string()),
            ("resumableChunkSize", self.size.to_string()),
            ("resumableIdentifier", self.identifier.clone()),
            ("resumableFilename", self.file_name.clone()),
            ("resumableRelativePath", ".".to_string()),
            ("resumableTotalChunks", self.total_chunks.to_string()),
        ]
    }
}
