//! API client module
//!
//! [`PublishingApi`] is the seam between the pipeline components and the
//! publishing platform. [`ApiClient`] implements it over HTTP; tests use
//! in-memory fakes.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
pub use types::*;

use crate::auth::Token;
use crate::config::Credentials;
use crate::error::Result;
use crate::metadata::{DatasetMetadata, DimensionMetadata};
use async_trait::async_trait;
use cmdp_common::types::{CodeList, Collection, Instance, Job, JobFile, JobState, Page, Recipe};
use std::future::Future;

/// Every platform operation used by the pipeline.
///
/// Methods map one-to-one onto HTTP calls. A non-success status on a required
/// call surfaces as `CmdError::Transport`; a rejected token as
/// `CmdError::AuthenticationFailure`.
#[async_trait]
pub trait PublishingApi: Send + Sync {
    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    async fn login(&self, credentials: &Credentials) -> Result<Token>;

    // ------------------------------------------------------------------
    // Recipes
    // ------------------------------------------------------------------

    async fn recipes_page(&self, token: &Token, offset: u32) -> Result<Page<Recipe>>;

    async fn recipe(&self, token: &Token, recipe_id: &str) -> Result<Recipe>;

    async fn create_recipe(&self, token: &Token, recipe: &Recipe) -> Result<()>;

    /// Update top-level recipe fields; `changes` holds only the fields to replace
    async fn update_recipe(
        &self,
        token: &Token,
        recipe_id: &str,
        changes: &serde_json::Value,
    ) -> Result<()>;

    async fn update_recipe_editions(
        &self,
        token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        editions: &EditionsUpdate,
    ) -> Result<()>;

    async fn update_code_list(
        &self,
        token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        code_list: &CodeList,
    ) -> Result<()>;

    // ------------------------------------------------------------------
    // Upload and jobs
    // ------------------------------------------------------------------

    async fn upload_chunk(&self, token: &Token, chunk: &ChunkUpload, content: Vec<u8>)
        -> Result<()>;

    async fn create_job(&self, token: &Token, job: &NewJob) -> Result<()>;

    async fn jobs_page(&self, token: &Token, offset: u32) -> Result<Page<Job>>;

    async fn job(&self, token: &Token, job_id: &str) -> Result<Job>;

    async fn update_job_state(&self, token: &Token, job_id: &str, state: JobState) -> Result<()>;

    async fn attach_job_file(&self, token: &Token, job_id: &str, file: &JobFile) -> Result<()>;

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    async fn instances_page(&self, token: &Token, offset: u32) -> Result<Page<Instance>>;

    async fn instance(&self, token: &Token, instance_id: &str) -> Result<Instance>;

    async fn confirm_edition(
        &self,
        token: &Token,
        instance_id: &str,
        confirmation: &EditionConfirmation,
    ) -> Result<()>;

    async fn update_dimension(
        &self,
        token: &Token,
        instance_id: &str,
        dimension: &str,
        metadata: &DimensionMetadata,
    ) -> Result<()>;

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    async fn dataset_exists(&self, token: &Token, dataset_id: &str) -> Result<bool>;

    async fn create_dataset(&self, token: &Token, dataset_id: &str) -> Result<()>;

    async fn update_dataset(
        &self,
        token: &Token,
        dataset_id: &str,
        metadata: &DatasetMetadata,
    ) -> Result<()>;

    async fn update_version(
        &self,
        token: &Token,
        dataset_id: &str,
        edition: &str,
        version: u32,
        update: &UsageNotesUpdate,
    ) -> Result<()>;

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    async fn create_collection(&self, token: &Token, name: &str) -> Result<()>;

    /// Look up a collection by its normalized name
    async fn collection(&self, token: &Token, normalized_name: &str) -> Result<Collection>;

    async fn attach_dataset_to_collection(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
    ) -> Result<()>;

    async fn attach_version_to_collection(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
        edition: &str,
        version: u32,
    ) -> Result<()>;
}

/// Read every page of a list endpoint.
///
/// Stops once `total_count` items are collected or a page comes back empty.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut offset = 0u32;

    loop {
        let page = fetch(offset).await?;
        let received = page.items.len() as u32;
        let total = page.total_count as usize;
        items.extend(page.items);

        if received == 0 || items.len() >= total {
            break;
        }
        offset += received;
    }

    Ok(items)
}
