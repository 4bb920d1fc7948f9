//! Common types used across the CMD publishing crates
//!
//! These mirror the JSON documents served by the publishing platform. Unknown
//! fields are ignored so that additions on the platform side do not break
//! deserialization.

use serde::{Deserialize, Serialize};

// ============================================================================
// Pagination
// ============================================================================

/// Page size used for every list endpoint.
pub const PAGE_LIMIT: u32 = 1000;

/// One page of a paginated list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_count: u32,
}

// ============================================================================
// Links
// ============================================================================

/// Reference to another platform resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub href: String,
}

// ============================================================================
// Recipes
// ============================================================================

/// A recipe: the template describing a dataset's file layout, code lists
/// and editions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,

    #[serde(default)]
    pub alias: String,

    #[serde(default = "default_recipe_format")]
    pub format: String,

    #[serde(default)]
    pub files: Vec<RecipeFile>,

    #[serde(default)]
    pub output_instances: Vec<OutputInstance>,
}

fn default_recipe_format() -> String {
    "v4".to_string()
}

impl Recipe {
    /// Whether any output instance of this recipe produces `dataset_id`.
    pub fn produces(&self, dataset_id: &str) -> bool {
        self.output_instances
            .iter()
            .any(|instance| instance.dataset_id == dataset_id)
    }

    /// Output instance producing `dataset_id`, if any
    pub fn output_for(&self, dataset_id: &str) -> Option<&OutputInstance> {
        self.output_instances
            .iter()
            .find(|instance| instance.dataset_id == dataset_id)
    }

    /// The alias attached to uploaded job files (description of the first file).
    pub fn file_alias(&self) -> Option<&str> {
        self.files.first().map(|file| file.description.as_str())
    }
}

/// Input file description of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeFile {
    pub description: String,
}

/// A dataset produced by a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputInstance {
    pub dataset_id: String,

    #[serde(default)]
    pub title: String,

    /// Edition names in release order
    #[serde(default)]
    pub editions: Vec<String>,

    #[serde(default)]
    pub code_lists: Vec<CodeList>,
}

/// Controlled vocabulary for one dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeList {
    pub id: String,
    pub name: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hierarchy: Option<bool>,
}

// ============================================================================
// Jobs
// ============================================================================

/// Import job state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Created,
    Submitted,
    Completed,
    Failed,
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Created => "created",
            JobState::Submitted => "submitted",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Other(state) => state,
        }
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => JobState::Created,
            "submitted" => JobState::Submitted,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            _ => JobState::Other(s),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub alias_name: String,
    pub url: String,
}

/// Links of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLinks {
    #[serde(default)]
    pub instances: Vec<LinkRef>,
}

/// An import job binding a recipe to an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,

    #[serde(rename = "recipe")]
    pub recipe_id: String,

    pub state: JobState,

    #[serde(default)]
    pub files: Vec<JobFile>,

    #[serde(default)]
    pub links: JobLinks,
}

impl Job {
    /// Id of the instance created alongside this job
    pub fn instance_id(&self) -> Option<&str> {
        self.links.instances.first().map(|link| link.id.as_str())
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Instance state as reported by the dataset API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Created,
    Submitted,
    Completed,
    EditionConfirmed,
    Associated,
    Approved,
    Published,
    Failed,
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Created => "created",
            InstanceState::Submitted => "submitted",
            InstanceState::Completed => "completed",
            InstanceState::EditionConfirmed => "edition-confirmed",
            InstanceState::Associated => "associated",
            InstanceState::Approved => "approved",
            InstanceState::Published => "published",
            InstanceState::Failed => "failed",
            InstanceState::Other(state) => state,
        }
    }

    /// The import pipeline has finished with this instance.
    pub fn is_import_complete(&self) -> bool {
        matches!(self, InstanceState::Completed) || self.has_version()
    }

    /// A version number has been assigned (edition-confirmed or later).
    pub fn has_version(&self) -> bool {
        matches!(
            self,
            InstanceState::EditionConfirmed
                | InstanceState::Associated
                | InstanceState::Approved
                | InstanceState::Published
        )
    }
}

impl From<String> for InstanceState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => InstanceState::Created,
            "submitted" => InstanceState::Submitted,
            "completed" => InstanceState::Completed,
            "edition-confirmed" => InstanceState::EditionConfirmed,
            "associated" => InstanceState::Associated,
            "approved" => InstanceState::Approved,
            "published" => InstanceState::Published,
            "failed" => InstanceState::Failed,
            _ => InstanceState::Other(s),
        }
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observation import task of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportObservationsTask {
    #[serde(default)]
    pub total_inserted_observations: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTasks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_observations: Option<ImportObservationsTask>,
}

/// Event recorded against an instance by the import pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceEvent {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<LinkRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<LinkRef>,
}

/// Server-side unit tracking import progress and versioning for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,

    pub state: InstanceState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_tasks: Option<ImportTasks>,

    /// Absent while the pipeline has not counted the file, or after an
    /// ingestion error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_observations: Option<u64>,

    #[serde(default)]
    pub events: Vec<InstanceEvent>,

    /// Only meaningful once the state is edition-confirmed or later
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,

    #[serde(default)]
    pub links: InstanceLinks,
}

impl Instance {
    pub fn dataset_id(&self) -> Option<&str> {
        self.links.dataset.as_ref().map(|link| link.id.as_str())
    }

    pub fn inserted_observations(&self) -> u64 {
        self.import_tasks
            .as_ref()
            .and_then(|tasks| tasks.import_observations.as_ref())
            .map(|task| task.total_inserted_observations)
            .unwrap_or(0)
    }

    /// First error message reported by the import pipeline
    pub fn first_event_message(&self) -> Option<&str> {
        self.events
            .first()
            .map(|event| event.message.as_str())
            .filter(|message| !message.is_empty())
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Editorial collection awaiting publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Lookup key for a collection name: spaces removed, lower-cased.
pub fn normalize_collection_name(name: &str) -> String {
    name.replace(' ', "").to_lowercase()
}

// ============================================================================
// Uploads
// ============================================================================

/// Location of a completed chunked upload in the staging bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageLocator(String);

impl StorageLocator {
    /// Derive the locator of a finished transfer from its identifier.
    pub fn from_transfer(bucket_url: &str, transfer_identifier: &str) -> Self {
        Self(format!(
            "{}/{}",
            bucket_url.trim_end_matches('/'),
            transfer_identifier
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
