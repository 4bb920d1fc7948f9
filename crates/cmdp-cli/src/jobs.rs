//! Import job orchestration
//!
//! Job creation does not echo the new job's id, so the orchestrator finds it
//! by re-reading the job list and taking the most recent entry. That entry is
//! cross-checked against the requested recipe; a mismatch is retried a few
//! times and then accepted with a warning.

use crate::api::{fetch_all_pages, NewJob, PublishingApi};
use crate::auth::Token;
use crate::error::{CmdError, Result};
use crate::events::{Observer, PublishEvent};
use cmdp_common::types::{Job, JobFile, JobState, StorageLocator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// How often, and how patiently, to look for a freshly created job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// How the created job was identified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobLookup {
    /// The newest job carries the requested recipe
    Matched,
    /// The newest job carries another recipe and was accepted anyway
    RecipeMismatch { expected: String, found: String },
}

impl JobLookup {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, JobLookup::RecipeMismatch { .. })
    }
}

/// A job created by [`JobOrchestrator::create_job`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedJob {
    pub job_id: String,
    pub instance_id: String,
    pub lookup: JobLookup,
}

/// Creates, inspects and submits import jobs
#[derive(Clone)]
pub struct JobOrchestrator {
    api: Arc<dyn PublishingApi>,
    lookup: LookupPolicy,
}

impl JobOrchestrator {
    pub fn new(api: Arc<dyn PublishingApi>) -> Self {
        Self {
            api,
            lookup: LookupPolicy::default(),
        }
    }

    pub fn with_lookup_policy(mut self, lookup: LookupPolicy) -> Self {
        self.lookup = lookup;
        self
    }

    /// Create a job for `recipe_id` with the uploaded file attached.
    #[instrument(skip(self, token, locator, observer))]
    pub async fn create_job(
        &self,
        token: &Token,
        recipe_id: &str,
        file_alias: &str,
        locator: &StorageLocator,
        observer: &dyn Observer,
    ) -> Result<CreatedJob> {
        let file = JobFile {
            alias_name: file_alias.to_string(),
            url: locator.to_string(),
        };
        self.api
            .create_job(token, &NewJob::with_file(recipe_id, file))
            .await?;

        let (job, lookup) = self.find_created(token, recipe_id).await?;
        let instance_id = job
            .instance_id()
            .ok_or_else(|| CmdError::not_found(format!("job '{}' has no instance link", job.id)))?
            .to_string();

        if let JobLookup::RecipeMismatch { expected, found } = &lookup {
            observer.emit(PublishEvent::RecipeMismatch {
                job_id: job.id.clone(),
                expected: expected.clone(),
                found: found.clone(),
            });
        }

        info!(job_id = %job.id, instance_id = %instance_id, "Job created");
        observer.emit(PublishEvent::JobCreated {
            job_id: job.id.clone(),
            instance_id: instance_id.clone(),
        });

        Ok(CreatedJob {
            job_id: job.id,
            instance_id,
            lookup,
        })
    }

    /// Newest job, retried while it carries a different recipe
    async fn find_created(&self, token: &Token, recipe_id: &str) -> Result<(Job, JobLookup)> {
        let attempts = self.lookup.attempts.max(1);
        let mut attempt = 1;

        loop {
            let latest = self.latest_job(token).await?;
            if latest.recipe_id == recipe_id {
                return Ok((latest, JobLookup::Matched));
            }

            if attempt >= attempts {
                warn!(
                    job_id = %latest.id,
                    expected = %recipe_id,
                    found = %latest.recipe_id,
                    "Accepting newest job despite recipe mismatch"
                );
                let found = latest.recipe_id.clone();
                return Ok((
                    latest,
                    JobLookup::RecipeMismatch {
                        expected: recipe_id.to_string(),
                        found,
                    },
                ));
            }

            debug!(attempt, found = %latest.recipe_id, "Newest job has another recipe, retrying");
            attempt += 1;
            tokio::time::sleep(self.lookup.delay).await;
        }
    }

    /// The most recently created job on the platform
    pub async fn latest_job(&self, token: &Token) -> Result<Job> {
        let api = self.api.as_ref();
        fetch_all_pages(move |offset| api.jobs_page(token, offset))
            .await?
            .pop()
            .ok_or_else(|| CmdError::not_found("the job list is empty"))
    }

    pub async fn job(&self, token: &Token, job_id: &str) -> Result<Job> {
        self.api.job(token, job_id).await
    }

    /// Move a job from `created` to `submitted`.
    ///
    /// Fails without a request when the job has no file attached.
    #[instrument(skip(self, token, observer))]
    pub async fn submit(&self, token: &Token, job_id: &str, observer: &dyn Observer) -> Result<()> {
        let job = self.api.job(token, job_id).await?;
        if job.files.is_empty() {
            return Err(CmdError::precondition(format!(
                "job '{}' has no file attached; attach one before submitting",
                job_id
            )));
        }

        self.api
            .update_job_state(token, job_id, JobState::Submitted)
            .await?;

        info!(job_id, "Job submitted");
        observer.emit(PublishEvent::JobSubmitted {
            job_id: job_id.to_string(),
        });
        Ok(())
    }

    /// Attach a file to a job that has none.
    pub async fn attach_file(
        &self,
        token: &Token,
        job_id: &str,
        alias: &str,
        url: &str,
    ) -> Result<()> {
        let job = self.api.job(token, job_id).await?;
        if !job.files.is_empty() {
            return Err(CmdError::precondition(format!(
                "job '{}' already has {} file(s) attached",
                job_id,
                job.files.len()
            )));
        }

        let file = JobFile {
            alias_name: alias.to_string(),
            url: url.to_string(),
        };
        self.api.attach_job_file(token, job_id, &file).await?;
        info!(job_id, "File attached to job");
        Ok(())
    }
}
