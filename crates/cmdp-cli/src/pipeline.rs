//! End-to-end publishing flows
//!
//! A dataset goes through two phases. The upload phase resolves the recipe,
//! uploads the V4 file and submits an import job. The publish phase waits for
//! the import, then moves the result into a collection and attaches its
//! metadata. A batch runs the upload phase for every dataset before any
//! dataset enters the publish phase.

use crate::api::PublishingApi;
use crate::auth::{self, Token};
use crate::collections::CollectionManager;
use crate::config::{Config, Credentials};
use crate::error::{CmdError, Result, Stage, StageExt};
use crate::events::{Observer, PublishEvent, Scoped};
use crate::instances::{InstancePoller, PollOptions};
use crate::jobs::{CreatedJob, JobLookup, JobOrchestrator, LookupPolicy};
use crate::metadata::{DimensionReport, MetadataBundle, MetadataPublisher};
use crate::recipes::{RecipeInfo, RecipeResolver};
use crate::upload::ChunkedUploader;
use chrono::Local;
use cmdp_common::types::StorageLocator;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

// ============================================================================
// Requests and reports
// ============================================================================

/// One dataset release to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub dataset_id: String,
    /// V4 observation file
    pub v4: PathBuf,
    pub edition: String,
    pub collection_name: String,
    /// CSV-W or bundle JSON
    pub metadata_file: PathBuf,
}

/// Result of the upload phase for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub recipe: RecipeInfo,
    pub locator: StorageLocator,
    pub job: CreatedJob,
}

/// A dataset that finished its upload phase
#[derive(Debug, Clone)]
pub struct UploadedDataset {
    pub request: DatasetRequest,
    pub bundle: MetadataBundle,
    pub submission: Submission,
}

/// Where a dataset ended up in its collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection_id: String,
    pub edition: String,
    pub version: u32,
}

/// Result of publishing one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub dataset_id: String,
    pub job_id: String,
    pub instance_id: String,
    pub job_lookup: JobLookup,
    pub collection: CollectionReport,
    pub dimensions: DimensionReport,
    pub usage_notes: usize,
}

/// Outcome of one dataset in a batch
#[derive(Debug)]
pub struct DatasetOutcome {
    pub dataset_id: String,
    /// Errors are tagged with the stage they happened in
    pub result: Result<PublishReport>,
}

impl DatasetOutcome {
    pub fn is_published(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a batch, in manifest order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DatasetOutcome>,
}

impl BatchReport {
    pub fn published(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.published()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Sequences the publishing components for one or more datasets
#[derive(Clone)]
pub struct Pipeline {
    api: Arc<dyn PublishingApi>,
    recipes: RecipeResolver,
    uploader: ChunkedUploader,
    jobs: JobOrchestrator,
    poller: InstancePoller,
    collections: CollectionManager,
    publisher: MetadataPublisher,
    poll: PollOptions,
    batch_pause: Duration,
}

impl Pipeline {
    pub fn new(api: Arc<dyn PublishingApi>, config: &Config) -> Self {
        let lookup = LookupPolicy {
            attempts: config.job_lookup_attempts,
            delay: config.job_lookup_delay,
        };

        Self {
            recipes: RecipeResolver::new(api.clone()),
            uploader: ChunkedUploader::new(api.clone(), &config.upload_bucket_url),
            jobs: JobOrchestrator::new(api.clone()).with_lookup_policy(lookup),
            poller: InstancePoller::new(api.clone()),
            collections: CollectionManager::new(api.clone()),
            publisher: MetadataPublisher::new(api.clone()),
            poll: PollOptions::new(config.poll_interval).with_timeout(config.poll_timeout),
            batch_pause: config.batch_pause,
            api,
        }
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_uploader(mut self, uploader: ChunkedUploader) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn poll_options(&self) -> &PollOptions {
        &self.poll
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Token> {
        auth::login(self.api.as_ref(), credentials).await
    }

    /// Resolve the recipe, upload `v4` and submit an import job.
    #[instrument(skip(self, token, observer), fields(v4 = %v4.display()))]
    pub async fn upload_phase(
        &self,
        token: &Token,
        dataset_id: &str,
        v4: &Path,
        observer: &dyn Observer,
    ) -> Result<Submission> {
        let recipe = self
            .recipes
            .info(token, dataset_id)
            .await
            .at_stage(Stage::Recipe)?;
        observer.emit(PublishEvent::RecipeResolved {
            recipe_id: recipe.recipe_id.clone(),
            alias: recipe.recipe_alias.clone(),
        });

        let locator = self
            .uploader
            .upload(token, v4, observer)
            .await
            .at_stage(Stage::Upload)?;

        let job = self
            .jobs
            .create_job(
                token,
                &recipe.recipe_id,
                &recipe.recipe_alias,
                &locator,
                observer,
            )
            .await
            .at_stage(Stage::Job)?;
        self.jobs
            .submit(token, &job.job_id, observer)
            .await
            .at_stage(Stage::Job)?;

        Ok(Submission {
            recipe,
            locator,
            job,
        })
    }

    /// Wait for the import, then collection, edition and metadata.
    #[instrument(skip_all, fields(dataset_id = %uploaded.request.dataset_id))]
    pub async fn publish_phase(
        &self,
        token: &Token,
        uploaded: &UploadedDataset,
        observer: &dyn Observer,
    ) -> Result<PublishReport> {
        let request = &uploaded.request;
        let job = &uploaded.submission.job;
        let notes = uploaded.bundle.usage_notes().at_stage(Stage::Metadata)?;

        self.poller
            .await_completion(token, &job.instance_id, &self.poll, observer)
            .await
            .at_stage(Stage::Import)?;

        let collection = self
            .collections
            .ensure_collection(token, &request.collection_name, observer)
            .await
            .at_stage(Stage::Collection)?;

        self.publisher
            .update_dataset(token, &request.dataset_id, &uploaded.bundle.metadata, observer)
            .await
            .at_stage(Stage::Publish)?;

        let version = self
            .confirm_and_resolve_version(token, &request.dataset_id, &job.instance_id, &request.edition, observer)
            .await?;

        self.attach(token, &collection.id, &request.dataset_id, &request.edition, version, observer)
            .await?;

        let dimensions = self
            .publisher
            .update_dimensions(token, &job.instance_id, &uploaded.bundle.dimension_data, observer)
            .await;
        self.publisher
            .update_usage_notes(token, &request.dataset_id, &request.edition, version, &notes, observer)
            .await
            .at_stage(Stage::Publish)?;

        info!(version, collection_id = %collection.id, "Dataset published to collection");
        observer.emit(PublishEvent::Published);

        Ok(PublishReport {
            dataset_id: request.dataset_id.clone(),
            job_id: job.job_id.clone(),
            instance_id: job.instance_id.clone(),
            job_lookup: job.lookup.clone(),
            collection: CollectionReport {
                collection_id: collection.id,
                edition: request.edition.clone(),
                version,
            },
            dimensions,
            usage_notes: notes.len(),
        })
    }

    /// Publish one dataset from start to finish.
    ///
    /// The metadata file is read and validated before logging in.
    pub async fn publish(
        &self,
        credentials: &Credentials,
        request: &DatasetRequest,
        observer: &dyn Observer,
    ) -> Result<PublishReport> {
        let bundle = load_bundle(&request.metadata_file)?;
        let token = self.login(credentials).await?;

        let submission = self
            .upload_phase(&token, &request.dataset_id, &request.v4, observer)
            .await?;
        let uploaded = UploadedDataset {
            request: request.clone(),
            bundle,
            submission,
        };
        self.publish_phase(&token, &uploaded, observer).await
    }

    /// Put an already imported instance into a collection.
    ///
    /// The edition is confirmed unless the instance already has a version.
    pub async fn add_to_collection(
        &self,
        token: &Token,
        dataset_id: &str,
        instance_id: &str,
        edition: &str,
        collection_name: &str,
        observer: &dyn Observer,
    ) -> Result<CollectionReport> {
        let instance = self
            .poller
            .instance(token, instance_id)
            .await
            .at_stage(Stage::Import)?;
        if !instance.state.is_import_complete() {
            return Err(CmdError::precondition(format!(
                "instance '{}' is '{}'; wait for the import to complete",
                instance_id, instance.state
            ))
            .at_stage(Stage::Import));
        }

        let collection = self
            .collections
            .ensure_collection(token, collection_name, observer)
            .await
            .at_stage(Stage::Collection)?;

        let version = if instance.state.has_version() {
            self.poller
                .version(token, dataset_id, instance_id)
                .await
                .at_stage(Stage::Edition)?
        } else {
            self.confirm_and_resolve_version(token, dataset_id, instance_id, edition, observer)
                .await?
        };

        self.attach(token, &collection.id, dataset_id, edition, version, observer)
            .await?;

        Ok(CollectionReport {
            collection_id: collection.id,
            edition: edition.to_string(),
            version,
        })
    }

    /// Publish a metadata bundle for an instance that already has a version.
    pub async fn publish_metadata(
        &self,
        token: &Token,
        dataset_id: &str,
        instance_id: &str,
        edition: &str,
        bundle: &MetadataBundle,
        observer: &dyn Observer,
    ) -> Result<DimensionReport> {
        bundle.usage_notes().at_stage(Stage::Metadata)?;

        let version = self
            .poller
            .version(token, dataset_id, instance_id)
            .await
            .at_stage(Stage::Edition)?;

        self.publisher
            .publish_metadata(token, dataset_id, instance_id, edition, version, bundle, observer)
            .await
            .at_stage(Stage::Publish)
    }

    /// Publish many datasets with a single login.
    ///
    /// Every upload phase finishes before the first publish phase starts.
    /// Failures are confined to their dataset.
    pub async fn batch(
        &self,
        credentials: &Credentials,
        requests: &[DatasetRequest],
        concurrent: bool,
        observer: &dyn Observer,
    ) -> Result<BatchReport> {
        check_unique(requests)?;
        let token = self.login(credentials).await?;

        let mut outcomes: Vec<Option<DatasetOutcome>> = requests.iter().map(|_| None).collect();
        let mut ready = Vec::new();

        for (index, request) in requests.iter().enumerate() {
            if index > 0 && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }

            let scoped = Scoped::new(&request.dataset_id, observer);
            match self.prepare(&token, request, &scoped).await {
                Ok(uploaded) => ready.push((index, uploaded)),
                Err(e) => {
                    warn!(dataset_id = %request.dataset_id, error = %e, "Upload phase failed");
                    outcomes[index] = Some(DatasetOutcome {
                        dataset_id: request.dataset_id.clone(),
                        result: Err(e),
                    });
                }
            }
        }

        info!(ready = ready.len(), total = requests.len(), "Upload phase finished");

        let token = &token;
        let results = if concurrent {
            join_all(ready.iter().map(|(index, uploaded)| async move {
                (*index, self.publish_scoped(token, uploaded, observer).await)
            }))
            .await
        } else {
            let mut results = Vec::with_capacity(ready.len());
            for (index, uploaded) in &ready {
                results.push((*index, self.publish_scoped(token, uploaded, observer).await));
            }
            results
        };

        for (index, result) in results {
            outcomes[index] = Some(DatasetOutcome {
                dataset_id: requests[index].dataset_id.clone(),
                result,
            });
        }

        Ok(BatchReport {
            outcomes: outcomes.into_iter().flatten().collect(),
        })
    }

    async fn publish_scoped(
        &self,
        token: &Token,
        uploaded: &UploadedDataset,
        observer: &dyn Observer,
    ) -> Result<PublishReport> {
        let dataset_id = uploaded.request.dataset_id.as_str();
        let result = self
            .publish_phase(token, uploaded, &Scoped::new(dataset_id, observer))
            .await;
        if let Err(e) = &result {
            warn!(dataset_id, error = %e, "Publish phase failed");
        }
        result
    }

    /// Load the metadata, then run the upload phase.
    async fn prepare(
        &self,
        token: &Token,
        request: &DatasetRequest,
        observer: &dyn Observer,
    ) -> Result<UploadedDataset> {
        let bundle = load_bundle(&request.metadata_file)?;
        let submission = self
            .upload_phase(token, &request.dataset_id, &request.v4, observer)
            .await?;

        Ok(UploadedDataset {
            request: request.clone(),
            bundle,
            submission,
        })
    }

    async fn confirm_and_resolve_version(
        &self,
        token: &Token,
        dataset_id: &str,
        instance_id: &str,
        edition: &str,
        observer: &dyn Observer,
    ) -> Result<u32> {
        self.poller
            .confirm_edition(token, instance_id, edition, Local::now().date_naive(), observer)
            .await
            .at_stage(Stage::Edition)?;

        let version = self
            .poller
            .version(token, dataset_id, instance_id)
            .await
            .at_stage(Stage::Edition)?;
        observer.emit(PublishEvent::VersionResolved { version });
        Ok(version)
    }

    async fn attach(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
        edition: &str,
        version: u32,
        observer: &dyn Observer,
    ) -> Result<()> {
        self.collections
            .attach_dataset(token, collection_id, dataset_id, observer)
            .await
            .at_stage(Stage::Collection)?;
        self.collections
            .attach_version(token, collection_id, dataset_id, edition, version, observer)
            .await
            .at_stage(Stage::Collection)
    }
}

/// Read and validate a metadata bundle.
pub fn load_bundle(path: &Path) -> Result<MetadataBundle> {
    let bundle = MetadataBundle::load(path).at_stage(Stage::Metadata)?;
    bundle.usage_notes().at_stage(Stage::Metadata)?;
    Ok(bundle)
}

/// Reject a batch that names a dataset twice.
pub fn check_unique(requests: &[DatasetRequest]) -> Result<()> {
    let mut seen = HashSet::new();
    for request in requests {
        if !seen.insert(request.dataset_id.as_str()) {
            return Err(CmdError::precondition(format!(
                "dataset '{}' appears more than once in the batch",
                request.dataset_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use crate::testing::{importing, instance, recipe, FakeApi};
    use cmdp_common::types::InstanceState;
    use serde_json::json;
    use tempfile::TempDir;

    fn credentials() -> Credentials {
        Credentials {
            email: "publisher@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    fn config() -> Config {
        Config {
            poll_interval: Duration::from_secs(30),
            job_lookup_delay: Duration::from_millis(1),
            batch_pause: Duration::ZERO,
            ..Config::new()
        }
    }

    fn pipeline(api: &Arc<FakeApi>) -> Pipeline {
        let uploader = ChunkedUploader::new(api.clone(), "https://bucket").with_chunk_size(8);
        Pipeline::new(api.clone(), &config()).with_uploader(uploader)
    }

    fn request(dir: &TempDir, dataset_id: &str, notes: serde_json::Value) -> DatasetRequest {
        let v4 = dir.path().join(format!("{}.csv", dataset_id));
        std::fs::write(&v4, "v4_0,time,Time\n1,2024,2024\n").unwrap();

        let metadata_file = dir.path().join(format!("{}.json", dataset_id));
        std::fs::write(
            &metadata_file,
            json!({
                "metadata": {"title": dataset_id},
                "dimension_data": {"time": {"label": "Time"}},
                "usage_notes": notes
            })
            .to_string(),
        )
        .unwrap();

        DatasetRequest {
            dataset_id: dataset_id.to_string(),
            v4,
            edition: "time-series".to_string(),
            collection_name: "October Release".to_string(),
            metadata_file,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_dataset_runs_stages_in_order() {
        let api = Arc::new(
            FakeApi::new()
                .with_recipes(vec![recipe("r1", "cpih01")])
                .with_script(
                    "inst-1",
                    vec![
                        importing("inst-1", "cpih01", 1, 2),
                        instance("inst-1", "cpih01", InstanceState::Completed),
                    ],
                ),
        );
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, "cpih01", json!([{"title": "Note", "note": "Text"}]));

        let report = pipeline(&api)
            .publish(&credentials(), &request, &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(report.instance_id, "inst-1");
        assert_eq!(report.collection.version, 1);
        assert_eq!(report.collection.collection_id, "octoberrelease-id");
        assert_eq!(report.usage_notes, 1);
        assert_eq!(report.job_lookup, JobLookup::Matched);

        let order = [
            "login",
            "recipes_page",
            "upload_chunk",
            "create_job",
            "update_job_state",
            "instance:",
            "create_collection",
            "update_dataset",
            "confirm_edition",
            "attach_dataset",
            "attach_version",
            "update_dimension",
            "update_version",
        ];
        let positions: Vec<usize> = order.iter().map(|p| api.position(p).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", api.calls());
    }

    #[tokio::test]
    async fn test_bad_usage_note_stops_before_login() {
        let api = Arc::new(FakeApi::new().with_recipes(vec![recipe("r1", "cpih01")]));
        let dir = tempfile::tempdir().unwrap();
        let request = request(&dir, "cpih01", json!([{"note": "x", "bogus": "y"}]));

        let err = pipeline(&api)
            .publish(&credentials(), &request, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Metadata));
        assert!(matches!(err.root(), CmdError::PreconditionFailed(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_uploads_everything_before_polling() {
        let api = Arc::new(
            FakeApi::new().with_recipes(vec![recipe("r1", "cpih01"), recipe("r2", "mid-year-pop-est")]),
        );
        let dir = tempfile::tempdir().unwrap();
        let requests = vec![
            request(&dir, "cpih01", json!([])),
            request(&dir, "mid-year-pop-est", json!([])),
        ];

        let report = pipeline(&api)
            .batch(&credentials(), &requests, false, &RecordingObserver::new())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(api.calls_starting_with("login").len(), 1);
        let last_upload = api.last_position("upload_chunk:mid-year-pop-est.csv").unwrap();
        let first_poll = api.position("instance:").unwrap();
        assert!(last_upload < first_poll);
        assert!(api.last_position("upload_chunk:cpih01.csv").unwrap() < first_poll);
    }

    #[tokio::test]
    async fn test_batch_failure_is_confined_to_its_dataset() {
        let api = Arc::new(
            FakeApi::new()
                .with_recipes(vec![recipe("r1", "cpih01"), recipe("r2", "mid-year-pop-est")])
                .failing_on("attach_version:octoberrelease-id:cpih01"),
        );
        let dir = tempfile::tempdir().unwrap();
        let mut missing = request(&dir, "no-recipe", json!([]));
        missing.collection_name = "Elsewhere".to_string();
        let requests = vec![
            request(&dir, "cpih01", json!([])),
            missing,
            request(&dir, "mid-year-pop-est", json!([])),
        ];
        let observer = RecordingObserver::new();

        let report = pipeline(&api)
            .batch(&credentials(), &requests, true, &observer)
            .await
            .unwrap();

        let ids: Vec<_> = report.outcomes.iter().map(|o| o.dataset_id.as_str()).collect();
        assert_eq!(ids, vec!["cpih01", "no-recipe", "mid-year-pop-est"]);

        let cpih = report.outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(cpih.stage(), Some(Stage::Collection));

        let missing = report.outcomes[1].result.as_ref().unwrap_err();
        assert_eq!(missing.stage(), Some(Stage::Recipe));
        assert!(matches!(missing.root(), CmdError::NotFound(_)));

        assert!(report.outcomes[2].is_published());
        assert_eq!(report.published(), 1);
        assert_eq!(report.failed(), 2);
        assert!(observer.events_for("mid-year-pop-est").contains(&PublishEvent::Published));
    }

    #[tokio::test]
    async fn test_duplicate_datasets_rejected_before_login() {
        let api = Arc::new(FakeApi::new());
        let dir = tempfile::tempdir().unwrap();
        let requests = vec![
            request(&dir, "cpih01", json!([])),
            request(&dir, "cpih01", json!([])),
        ];

        let err = pipeline(&api)
            .batch(&credentials(), &requests, false, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CmdError::PreconditionFailed(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_to_collection_requires_completed_import() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-7",
            vec![instance("inst-7", "cpih01", InstanceState::Submitted)],
        ));
        let token = crate::testing::token();

        let err = pipeline(&api)
            .add_to_collection(&token, "cpih01", "inst-7", "time-series", "Oct", &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err.root(), CmdError::PreconditionFailed(_)));
        assert!(api.calls_starting_with("create_collection").is_empty());
    }

    #[tokio::test]
    async fn test_add_to_collection_confirms_edition() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-7",
            vec![instance("inst-7", "cpih01", InstanceState::Completed)],
        ));
        let token = crate::testing::token();

        let report = pipeline(&api)
            .add_to_collection(&token, "cpih01", "inst-7", "time-series", "Oct", &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(
            api.calls_starting_with("attach_version"),
            vec!["attach_version:oct-id:cpih01:time-series:1"]
        );
    }

    #[tokio::test]
    async fn test_metadata_only_needs_version() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-7",
            vec![instance("inst-7", "cpih01", InstanceState::Completed)],
        ));
        let token = crate::testing::token();

        let err = pipeline(&api)
            .publish_metadata(
                &token,
                "cpih01",
                "inst-7",
                "time-series",
                &MetadataBundle::default(),
                &RecordingObserver::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Edition));
        assert!(api.calls_starting_with("update_").is_empty());
    }
}
