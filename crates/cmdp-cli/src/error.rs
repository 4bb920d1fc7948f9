//! Error types for the CMD publishing CLI
//!
//! Every variant renders a message a publisher can act on. Transport failures
//! carry the offending method, endpoint and status code.

use std::fmt;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CmdError>;

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Recipe,
    Upload,
    Job,
    Import,
    Collection,
    Edition,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::Recipe => "recipe",
            Stage::Upload => "upload",
            Stage::Job => "job",
            Stage::Import => "import",
            Stage::Collection => "collection",
            Stage::Edition => "edition",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for CLI and pipeline operations
#[derive(Error, Debug)]
pub enum CmdError {
    /// Login rejected, or the token was refused by a later call
    #[error("Authentication failed: {endpoint} returned {status}. Check the email and password in the credentials file; tokens expire, so log in again.")]
    AuthenticationFailure { endpoint: String, status: u16 },

    /// A recipe, collection or other resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation was attempted before its preconditions held
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A required call returned a non-success status
    #[error("{method} {endpoint} returned {status}{}", detail_suffix(.detail))]
    Transport {
        method: &'static str,
        endpoint: String,
        status: u16,
        detail: Option<String>,
    },

    /// The import pipeline reported an error instead of observation counts
    #[error("Import pipeline error: {0}")]
    UpstreamData(String),

    /// The instance ended in the failed state
    #[error("Import of instance '{instance_id}' failed: {message}")]
    ImportFailed { instance_id: String, message: String },

    #[error("Timed out after {0:?} waiting for the import to complete")]
    Timeout(std::time::Duration),

    #[error("Operation cancelled")]
    Cancelled,

    /// A pipeline stage failed; wraps the underlying error
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<CmdError>,
    },

    /// Metadata document could not be interpreted
    #[error("Invalid metadata: {0}. Check the CSV-W or metadata bundle file.")]
    InvalidMetadata(String),

    /// Batch manifest has invalid format or content
    #[error("Invalid batch manifest: {0}")]
    InvalidManifest(String),

    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Network request failed: {0}. Check your connection and CMD_BASE_URL.")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    YamlParse(#[from] serde_yaml::Error),

    #[error(transparent)]
    Common(#[from] cmdp_common::CommonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => format!(": {}", detail),
        _ => String::new(),
    }
}

impl CmdError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn invalid_manifest(msg: impl Into<String>) -> Self {
        Self::InvalidManifest(msg.into())
    }

    pub fn transport(method: &'static str, endpoint: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            method,
            endpoint: endpoint.into(),
            status,
            detail: None,
        }
    }

    /// Wrap this error with the pipeline stage it happened in.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ CmdError::Stage { .. } => already,
            other => CmdError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if tagged
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CmdError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with any stage tag removed
    pub fn root(&self) -> &CmdError {
        match self {
            CmdError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Tag the error side of a result with a pipeline stage.
pub trait StageExt<T> {
    fn at_stage(self, stage: Stage) -> Result<T>;
}

impl<T, E: Into<CmdError>> StageExt<T> for std::result::Result<T, E> {
    fn at_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.into().at_stage(stage))
    }
}
