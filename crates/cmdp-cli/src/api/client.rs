//! HTTP API client for the publishing platform
//!
//! Every authenticated request carries the session token in the
//! `X-Florence-Token` header.

use crate::api::{endpoints, types::*, PublishingApi};
use crate::auth::Token;
use crate::config::{Config, Credentials, DEFAULT_API_TIMEOUT_SECS};
use crate::error::{CmdError, Result};
use crate::metadata::{DatasetMetadata, DimensionMetadata};
use async_trait::async_trait;
use cmdp_common::types::{
    CodeList, Collection, Instance, Job, JobFile, JobState, Page, Recipe, PAGE_LIMIT,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

// ============================================================================
// API Client Constants
// ============================================================================

/// Header carrying the session token
pub const TOKEN_HEADER: &str = "X-Florence-Token";

/// Longest response body quoted in a transport error
const MAX_ERROR_DETAIL: usize = 200;

/// API client for the publishing platform
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::build(
            base_url.into(),
            Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            false,
        )
    }

    /// Create from the CLI configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(
            config.base_url().to_string(),
            config.api_timeout,
            config.accept_invalid_certs,
        )
    }

    fn build(base_url: String, timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .user_agent(concat!("cmdp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Request helpers
    // ========================================================================

    async fn get_json<T: DeserializeOwned>(&self, token: &Token, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, token.as_str())
            .send()
            .await?;

        let response = self.ensure(response, "GET", url, None).await?;
        Ok(response.json().await?)
    }

    async fn put_json<B: Serialize + ?Sized>(&self, token: &Token, url: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .put(url)
            .header(TOKEN_HEADER, token.as_str())
            .json(body)
            .send()
            .await?;

        self.ensure(response, "PUT", url, None).await?;
        Ok(())
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        token: &Token,
        url: &str,
        body: &B,
        expected: Option<StatusCode>,
    ) -> Result<()> {
        let response = self
            .client
            .post(url)
            .header(TOKEN_HEADER, token.as_str())
            .json(body)
            .send()
            .await?;

        self.ensure(response, "POST", url, expected).await?;
        Ok(())
    }

    /// Pass the response through if its status is acceptable.
    ///
    /// `expected` pins one exact status; `None` accepts any 2xx.
    async fn ensure(
        &self,
        response: Response,
        method: &'static str,
        url: &str,
        expected: Option<StatusCode>,
    ) -> Result<Response> {
        let status = response.status();
        let accepted = match expected {
            Some(expected) => status == expected,
            None => status.is_success(),
        };
        if accepted {
            return Ok(response);
        }

        let endpoint = self.endpoint_of(url);
        debug!(method, endpoint = %endpoint, status = status.as_u16(), "Request rejected");

        if status == StatusCode::UNAUTHORIZED {
            return Err(CmdError::AuthenticationFailure {
                endpoint,
                status: status.as_u16(),
            });
        }

        if status == StatusCode::NOT_FOUND && method == "GET" {
            return Err(CmdError::not_found(endpoint));
        }

        let detail = response
            .text()
            .await
            .ok()
            .map(|body| body.trim().chars().take(MAX_ERROR_DETAIL).collect::<String>())
            .filter(|body| !body.is_empty());

        Err(CmdError::Transport {
            method,
            endpoint,
            status: status.as_u16(),
            detail,
        })
    }

    /// Path and query of a URL, for error messages
    fn endpoint_of(&self, url: &str) -> String {
        url.strip_prefix(&self.base_url).unwrap_or(url).to_string()
    }
}

#[async_trait]
impl PublishingApi for ApiClient {
    #[instrument(skip_all)]
    async fn login(&self, credentials: &Credentials) -> Result<Token> {
        let url = endpoints::login_url(&self.base_url);
        let request = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if response.status() != StatusCode::OK {
            return Err(CmdError::AuthenticationFailure {
                endpoint: self.endpoint_of(&url),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(Token::from_login_response(&body))
    }

    async fn recipes_page(&self, token: &Token, offset: u32) -> Result<Page<Recipe>> {
        let url = endpoints::recipes_url(&self.base_url, PAGE_LIMIT, offset);
        self.get_json(token, &url).await
    }

    async fn recipe(&self, token: &Token, recipe_id: &str) -> Result<Recipe> {
        let url = endpoints::recipe_url(&self.base_url, recipe_id);
        self.get_json(token, &url).await
    }

    #[instrument(skip(self, token, recipe), fields(recipe_id = %recipe.id))]
    async fn create_recipe(&self, token: &Token, recipe: &Recipe) -> Result<()> {
        let url = endpoints::recipe_create_url(&self.base_url);
        self.post_json(token, &url, recipe, None).await
    }

    async fn update_recipe(
        &self,
        token: &Token,
        recipe_id: &str,
        changes: &serde_json::Value,
    ) -> Result<()> {
        let url = endpoints::recipe_url(&self.base_url, recipe_id);
        self.put_json(token, &url, changes).await
    }

    async fn update_recipe_editions(
        &self,
        token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        editions: &EditionsUpdate,
    ) -> Result<()> {
        let url = endpoints::recipe_instance_url(&self.base_url, recipe_id, dataset_id);
        self.put_json(token, &url, editions).await
    }

    async fn update_code_list(
        &self,
        token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        code_list: &CodeList,
    ) -> Result<()> {
        let url =
            endpoints::recipe_code_list_url(&self.base_url, recipe_id, dataset_id, &code_list.id);
        self.put_json(token, &url, code_list).await
    }

    #[instrument(skip(self, token, chunk, content), fields(chunk = chunk.number, of = chunk.total_chunks))]
    async fn upload_chunk(
        &self,
        token: &Token,
        chunk: &ChunkUpload,
        content: Vec<u8>,
    ) -> Result<()> {
        let url = endpoints::upload_url(&self.base_url);

        let part = Part::bytes(content)
            .file_name(chunk.file_name.clone())
            .mime_str(ChunkUpload::CONTENT_TYPE)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, token.as_str())
            .query(&chunk.query_pairs())
            .multipart(form)
            .send()
            .await?;

        self.ensure(response, "POST", &url, None).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(recipe_id = %job.recipe))]
    async fn create_job(&self, token: &Token, job: &NewJob) -> Result<()> {
        let url = endpoints::jobs_url(&self.base_url);
        self.post_json(token, &url, job, Some(StatusCode::CREATED)).await
    }

    async fn jobs_page(&self, token: &Token, offset: u32) -> Result<Page<Job>> {
        let url = endpoints::jobs_page_url(&self.base_url, PAGE_LIMIT, offset);
        self.get_json(token, &url).await
    }

    async fn job(&self, token: &Token, job_id: &str) -> Result<Job> {
        let url = endpoints::job_url(&self.base_url, job_id);
        self.get_json(token, &url).await
    }

    async fn update_job_state(&self, token: &Token, job_id: &str, state: JobState) -> Result<()> {
        let url = endpoints::job_url(&self.base_url, job_id);
        self.put_json(token, &url, &JobStateUpdate { state }).await
    }

    async fn attach_job_file(&self, token: &Token, job_id: &str, file: &JobFile) -> Result<()> {
        let url = endpoints::job_files_url(&self.base_url, job_id);
        self.put_json(token, &url, file).await
    }

    async fn instances_page(&self, token: &Token, offset: u32) -> Result<Page<Instance>> {
        let url = endpoints::instances_page_url(&self.base_url, PAGE_LIMIT, offset);
        self.get_json(token, &url).await
    }

    async fn instance(&self, token: &Token, instance_id: &str) -> Result<Instance> {
        let url = endpoints::instance_url(&self.base_url, instance_id);
        self.get_json(token, &url).await
    }

    async fn confirm_edition(
        &self,
        token: &Token,
        instance_id: &str,
        confirmation: &EditionConfirmation,
    ) -> Result<()> {
        let url = endpoints::instance_url(&self.base_url, instance_id);
        self.put_json(token, &url, confirmation).await
    }

    async fn update_dimension(
        &self,
        token: &Token,
        instance_id: &str,
        dimension: &str,
        metadata: &DimensionMetadata,
    ) -> Result<()> {
        let url = endpoints::instance_dimension_url(&self.base_url, instance_id, dimension);
        self.put_json(token, &url, metadata).await
    }

    async fn dataset_exists(&self, token: &Token, dataset_id: &str) -> Result<bool> {
        let url = endpoints::dataset_url(&self.base_url, dataset_id);
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, token.as_str())
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => self.ensure(response, "GET", &url, None).await.map(|_| true),
        }
    }

    async fn create_dataset(&self, token: &Token, dataset_id: &str) -> Result<()> {
        let url = endpoints::dataset_url(&self.base_url, dataset_id);
        let body = NewDataset {
            id: dataset_id.to_string(),
        };
        self.post_json(token, &url, &body, Some(StatusCode::CREATED)).await
    }

    async fn update_dataset(
        &self,
        token: &Token,
        dataset_id: &str,
        metadata: &DatasetMetadata,
    ) -> Result<()> {
        let url = endpoints::dataset_url(&self.base_url, dataset_id);
        self.put_json(token, &url, metadata).await
    }

    async fn update_version(
        &self,
        token: &Token,
        dataset_id: &str,
        edition: &str,
        version: u32,
        update: &UsageNotesUpdate,
    ) -> Result<()> {
        let url = endpoints::dataset_version_url(&self.base_url, dataset_id, edition, version);
        self.put_json(token, &url, update).await
    }

    async fn create_collection(&self, token: &Token, name: &str) -> Result<()> {
        let url = endpoints::collection_create_url(&self.base_url);
        let body = NewCollection {
            name: name.to_string(),
        };
        self.post_json(token, &url, &body, None).await
    }

    async fn collection(&self, token: &Token, normalized_name: &str) -> Result<Collection> {
        let url = endpoints::collection_url(&self.base_url, normalized_name);
        self.get_json(token, &url).await
    }

    async fn attach_dataset_to_collection(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
    ) -> Result<()> {
        let url = endpoints::collection_dataset_url(&self.base_url, collection_id, dataset_id);
        self.put_json(token, &url, &CollectionItemState::complete()).await
    }

    async fn attach_version_to_collection(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
        edition: &str,
        version: u32,
    ) -> Result<()> {
        let url = endpoints::collection_version_url(
            &self.base_url,
            collection_id,
            dataset_id,
            edition,
            version,
        );
        self.put_json(token, &url, &CollectionItemState::complete()).await
    }
}
