//! CMD Publishing CLI Library
//!
//! Command-line interface and pipeline for publishing datasets to the CMD
//! publishing platform.
//!
//! # Overview
//!
//! - **Upload**: chunked resumable upload of a V4 file and import job creation (`cmdp upload`)
//! - **Import tracking**: instance status and progress (`cmdp status`)
//! - **Collections**: edition confirmation and collection attachment (`cmdp collect`)
//! - **Metadata**: dataset fields, dimension labels and usage notes (`cmdp metadata`)
//! - **Publishing**: the full single-dataset and batch pipelines (`cmdp publish`, `cmdp batch`)
//! - **Maintenance**: recipes, datasets and jobs (`cmdp recipe`, `cmdp dataset`, `cmdp job`)
//!
//! Every component talks to the platform through the [`api::PublishingApi`]
//! trait and reports progress as [`events::PublishEvent`] values.

pub mod api;
pub mod auth;
pub mod collections;
pub mod commands;
pub mod config;
pub mod datasets;
pub mod error;
pub mod events;
pub mod instances;
pub mod jobs;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod recipes;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use error::{CmdError, Result};
pub use manifest::BatchManifest;
pub use pipeline::Pipeline;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cmdp - publish datasets to the CMD publishing platform
#[derive(Parser, Debug)]
#[command(name = "cmdp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Publishing platform URL
    #[arg(long, env = "CMD_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// JSON file holding the publisher's email and password
    #[arg(long, env = "CMD_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// Print the command reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the credentials by logging in
    Login,

    /// Upload a V4 file and submit its import job
    Upload {
        /// Dataset the file belongs to
        dataset_id: String,

        /// V4 observation file
        v4: PathBuf,
    },

    /// Show an instance's import state
    Status {
        /// Instance id (defaults to the most recent instance)
        instance_id: Option<String>,

        /// Wait until the import completes
        #[arg(short, long)]
        wait: bool,
    },

    /// Confirm an edition and add an imported instance to a collection
    Collect {
        dataset_id: String,
        instance_id: String,
        edition: String,

        /// Collection name (created if missing)
        collection: String,
    },

    /// Publish a metadata file for an instance already in a collection
    Metadata {
        dataset_id: String,
        instance_id: String,
        edition: String,

        /// CSV-W metadata document or metadata bundle JSON
        metadata_file: PathBuf,
    },

    /// Run the whole pipeline for one dataset
    Publish {
        dataset_id: String,
        edition: String,

        /// V4 observation file
        v4: PathBuf,

        /// CSV-W metadata document or metadata bundle JSON
        metadata_file: PathBuf,

        /// Collection name (created if missing)
        collection: String,
    },

    /// Publish every dataset listed in a manifest
    Batch {
        /// YAML batch manifest
        manifest: PathBuf,

        /// Wait for imports concurrently
        #[arg(long)]
        concurrent: bool,
    },

    /// Inspect and maintain recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommand,
    },

    /// Manage dataset records
    Dataset {
        #[command(subcommand)]
        command: DatasetCommand,
    },

    /// Inspect and repair import jobs
    Job {
        #[command(subcommand)]
        command: JobCommand,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Recipe subcommands
#[derive(Subcommand, Debug)]
pub enum RecipeCommand {
    /// Show the recipe producing a dataset
    Show {
        /// Dataset id, or recipe id with --id
        key: String,

        /// Treat KEY as a recipe id
        #[arg(long)]
        id: bool,
    },

    /// Print an empty recipe to fill in
    Template {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a recipe from a JSON file
    Create {
        file: PathBuf,
    },

    /// Replace the editions of a dataset's recipe
    Editions {
        dataset_id: String,

        #[arg(required = true, num_args = 1..)]
        editions: Vec<String>,
    },

    /// Update one code list of a dataset's recipe
    CodeList {
        dataset_id: String,

        /// Code list id
        code_list_id: String,

        /// Dimension label (stored lower-cased)
        label: String,

        /// Whether the code list is hierarchical
        #[arg(long)]
        is_hierarchy: Option<bool>,
    },

    /// Replace top-level recipe fields from a JSON object file
    Update {
        dataset_id: String,
        changes_file: PathBuf,
    },
}

/// Dataset subcommands
#[derive(Subcommand, Debug)]
pub enum DatasetCommand {
    /// Register a new dataset
    Create { dataset_id: String },
}

/// Job subcommands
#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Show a job (defaults to the most recent one)
    Show { job_id: Option<String> },

    /// Attach a file to a job that has none
    AttachFile {
        job_id: String,
        alias: String,
        url: String,
    },

    /// Submit a job for import
    Submit { job_id: String },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}
