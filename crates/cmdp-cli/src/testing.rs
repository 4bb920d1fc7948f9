//! In-memory publishing platform for orchestration tests
//!
//! Records every call as a short string (`"instance:inst-1"`,
//! `"upload_chunk:cpih01.csv:2/3"`) so tests can assert on ordering.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::api::{
    ChunkUpload, EditionConfirmation, EditionsUpdate, NewJob, PublishingApi, UsageNotesUpdate,
};
use crate::auth::Token;
use crate::config::Credentials;
use crate::error::{CmdError, Result};
use crate::metadata::{DatasetMetadata, DimensionMetadata};
use async_trait::async_trait;
use cmdp_common::types::{
    normalize_collection_name, CodeList, Collection, ImportObservationsTask, ImportTasks, Instance,
    InstanceLinks, InstanceState, Job, JobFile, JobLinks, JobState, LinkRef, OutputInstance, Page,
    Recipe, RecipeFile,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub fn token() -> Token {
    Token::new("test-token")
}

pub fn recipe(id: &str, dataset_id: &str) -> Recipe {
    Recipe {
        id: id.to_string(),
        alias: format!("{} alias", dataset_id),
        format: "v4".to_string(),
        files: vec![RecipeFile {
            description: format!("{} v4", dataset_id),
        }],
        output_instances: vec![OutputInstance {
            dataset_id: dataset_id.to_string(),
            title: dataset_id.to_uppercase(),
            editions: vec!["time-series".to_string()],
            code_lists: vec![],
        }],
    }
}

pub fn instance(id: &str, dataset_id: &str, state: InstanceState) -> Instance {
    Instance {
        id: id.to_string(),
        state,
        import_tasks: None,
        total_observations: Some(100),
        events: vec![],
        version: None,
        edition: None,
        links: InstanceLinks {
            dataset: Some(LinkRef {
                id: dataset_id.to_string(),
                href: String::new(),
            }),
            job: None,
        },
    }
}

pub fn importing(id: &str, dataset_id: &str, inserted: u64, total: u64) -> Instance {
    let mut instance = instance(id, dataset_id, InstanceState::Submitted);
    instance.total_observations = Some(total);
    instance.import_tasks = Some(ImportTasks {
        import_observations: Some(ImportObservationsTask {
            total_inserted_observations: inserted,
            state: Some("submitted".to_string()),
        }),
    });
    instance
}

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<String>>,
    recipes: Mutex<Vec<Recipe>>,
    jobs: Mutex<Vec<Job>>,
    scripts: Mutex<HashMap<String, VecDeque<Instance>>>,
    datasets: Mutex<HashSet<String>>,
    /// Calls whose recorded form starts with one of these fail with a 500
    failing: Mutex<Vec<String>>,
    /// Calls whose recorded form starts with one of these fail with a 401
    rejecting: Mutex<Vec<String>>,
    /// Normalized collection names the lookup answers with 404
    missing_collections: Mutex<HashSet<String>>,
    /// Number of job list reads that end with a job of another recipe
    foreign_job_reads: Mutex<u32>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipes(self, recipes: Vec<Recipe>) -> Self {
        *self.recipes.lock().unwrap() = recipes;
        self
    }

    pub fn with_job(self, job: Job) -> Self {
        self.jobs.lock().unwrap().push(job);
        self
    }

    pub fn with_dataset(self, dataset_id: &str) -> Self {
        self.datasets.lock().unwrap().insert(dataset_id.to_string());
        self
    }

    /// States returned by successive reads of an instance; the last repeats
    pub fn with_script(self, instance_id: &str, states: Vec<Instance>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), states.into());
        self
    }

    pub fn failing_on(self, prefix: &str) -> Self {
        self.failing.lock().unwrap().push(prefix.to_string());
        self
    }

    pub fn rejecting_token_on(self, prefix: &str) -> Self {
        self.rejecting.lock().unwrap().push(prefix.to_string());
        self
    }

    pub fn without_collection(self, normalized_name: &str) -> Self {
        self.missing_collections
            .lock()
            .unwrap()
            .insert(normalized_name.to_string());
        self
    }

    pub fn with_foreign_job_reads(self, reads: u32) -> Self {
        *self.foreign_job_reads.lock().unwrap() = reads;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    /// Position of the first call starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.starts_with(prefix))
    }

    /// Position of the last call starting with `prefix`
    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().rposition(|call| call.starts_with(prefix))
    }

    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.id == job_id)
            .map(|job| job.state.clone())
    }

    fn record(&self, call: String) -> Result<()> {
        let fails = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        let rejected = self
            .rejecting
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        self.calls.lock().unwrap().push(call.clone());

        if rejected {
            Err(CmdError::AuthenticationFailure {
                endpoint: call,
                status: 401,
            })
        } else if fails {
            Err(CmdError::transport("FAKE", call, 500))
        } else {
            Ok(())
        }
    }

    fn dataset_for_recipe(&self, recipe_id: &str) -> String {
        self.recipes
            .lock()
            .unwrap()
            .iter()
            .find(|recipe| recipe.id == recipe_id)
            .and_then(|recipe| recipe.output_instances.first())
            .map(|output| output.dataset_id.clone())
            .unwrap_or_default()
    }
}

fn page<T>(items: Vec<T>) -> Page<T> {
    let count = items.len() as u32;
    Page {
        items,
        count,
        offset: 0,
        limit: 1000,
        total_count: count,
    }
}

#[async_trait]
impl PublishingApi for FakeApi {
    async fn login(&self, credentials: &Credentials) -> Result<Token> {
        self.record(format!("login:{}", credentials.email))?;
        Ok(token())
    }

    async fn recipes_page(&self, _token: &Token, offset: u32) -> Result<Page<Recipe>> {
        self.record(format!("recipes_page:{}", offset))?;
        Ok(page(self.recipes.lock().unwrap().clone()))
    }

    async fn recipe(&self, _token: &Token, recipe_id: &str) -> Result<Recipe> {
        self.record(format!("recipe:{}", recipe_id))?;
        self.recipes
            .lock()
            .unwrap()
            .iter()
            .find(|recipe| recipe.id == recipe_id)
            .cloned()
            .ok_or_else(|| CmdError::not_found(recipe_id.to_string()))
    }

    async fn create_recipe(&self, _token: &Token, recipe: &Recipe) -> Result<()> {
        self.record(format!("create_recipe:{}", recipe.id))?;
        self.recipes.lock().unwrap().push(recipe.clone());
        Ok(())
    }

    async fn update_recipe(
        &self,
        _token: &Token,
        recipe_id: &str,
        _changes: &serde_json::Value,
    ) -> Result<()> {
        self.record(format!("update_recipe:{}", recipe_id))
    }

    async fn update_recipe_editions(
        &self,
        _token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        editions: &EditionsUpdate,
    ) -> Result<()> {
        self.record(format!("update_recipe_editions:{}:{}", recipe_id, dataset_id))?;
        let mut recipes = self.recipes.lock().unwrap();
        if let Some(output) = recipes
            .iter_mut()
            .filter(|recipe| recipe.id == recipe_id)
            .flat_map(|recipe| recipe.output_instances.iter_mut())
            .find(|output| output.dataset_id == dataset_id)
        {
            output.editions = editions.editions.clone();
        }
        Ok(())
    }

    async fn update_code_list(
        &self,
        _token: &Token,
        recipe_id: &str,
        dataset_id: &str,
        code_list: &CodeList,
    ) -> Result<()> {
        self.record(format!(
            "update_code_list:{}:{}:{}",
            recipe_id, dataset_id, code_list.id
        ))
    }

    async fn upload_chunk(
        &self,
        _token: &Token,
        chunk: &ChunkUpload,
        content: Vec<u8>,
    ) -> Result<()> {
        assert_eq!(content.len() as u64, chunk.size);
        self.record(format!(
            "upload_chunk:{}:{}/{}",
            chunk.file_name, chunk.number, chunk.total_chunks
        ))
    }

    async fn create_job(&self, _token: &Token, job: &NewJob) -> Result<()> {
        self.record(format!("create_job:{}", job.recipe))?;
        let mut jobs = self.jobs.lock().unwrap();
        let number = jobs.len() + 1;
        let instance_id = format!("inst-{}", number);

        let dataset_id = self.dataset_for_recipe(&job.recipe);
        self.scripts
            .lock()
            .unwrap()
            .entry(instance_id.clone())
            .or_insert_with(|| {
                VecDeque::from(vec![instance(&instance_id, &dataset_id, InstanceState::Completed)])
            });

        jobs.push(Job {
            id: format!("job-{}", number),
            recipe_id: job.recipe.clone(),
            state: job.state.clone(),
            files: job.files.clone(),
            links: JobLinks {
                instances: vec![LinkRef {
                    id: instance_id,
                    href: String::new(),
                }],
            },
        });
        Ok(())
    }

    async fn jobs_page(&self, _token: &Token, offset: u32) -> Result<Page<Job>> {
        self.record(format!("jobs_page:{}", offset))?;
        let mut jobs = self.jobs.lock().unwrap().clone();

        let mut foreign = self.foreign_job_reads.lock().unwrap();
        if *foreign > 0 {
            *foreign -= 1;
            jobs.push(Job {
                id: "job-foreign".to_string(),
                recipe_id: "someone-elses-recipe".to_string(),
                state: JobState::Created,
                files: vec![],
                links: JobLinks {
                    instances: vec![LinkRef {
                        id: "inst-foreign".to_string(),
                        href: String::new(),
                    }],
                },
            });
        }

        Ok(page(jobs))
    }

    async fn job(&self, _token: &Token, job_id: &str) -> Result<Job> {
        self.record(format!("job:{}", job_id))?;
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.id == job_id)
            .cloned()
            .ok_or_else(|| CmdError::not_found(job_id.to_string()))
    }

    async fn update_job_state(&self, _token: &Token, job_id: &str, state: JobState) -> Result<()> {
        self.record(format!("update_job_state:{}:{}", job_id, state))?;
        if let Some(job) = self
            .jobs
            .lock()
            .unwrap()
            .iter_mut()
            .find(|job| job.id == job_id)
        {
            job.state = state;
        }
        Ok(())
    }

    async fn attach_job_file(&self, _token: &Token, job_id: &str, file: &JobFile) -> Result<()> {
        self.record(format!("attach_job_file:{}", job_id))?;
        if let Some(job) = self
            .jobs
            .lock()
            .unwrap()
            .iter_mut()
            .find(|job| job.id == job_id)
        {
            job.files.push(file.clone());
        }
        Ok(())
    }

    async fn instances_page(&self, _token: &Token, offset: u32) -> Result<Page<Instance>> {
        self.record(format!("instances_page:{}", offset))?;
        let mut instances: Vec<Instance> = self
            .scripts
            .lock()
            .unwrap()
            .values()
            .filter_map(|script| script.front().cloned())
            .collect();
        instances.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(page(instances))
    }

    async fn instance(&self, _token: &Token, instance_id: &str) -> Result<Instance> {
        self.record(format!("instance:{}", instance_id))?;
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(instance_id)
            .ok_or_else(|| CmdError::not_found(instance_id.to_string()))?;

        if script.len() > 1 {
            Ok(script.pop_front().unwrap())
        } else {
            script
                .front()
                .cloned()
                .ok_or_else(|| CmdError::not_found(instance_id.to_string()))
        }
    }

    async fn confirm_edition(
        &self,
        _token: &Token,
        instance_id: &str,
        confirmation: &EditionConfirmation,
    ) -> Result<()> {
        self.record(format!(
            "confirm_edition:{}:{}",
            instance_id, confirmation.edition
        ))?;
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(script) = scripts.get_mut(instance_id) {
            if let Some(mut current) = script.back().cloned() {
                current.state = InstanceState::EditionConfirmed;
                current.edition = Some(confirmation.edition.clone());
                current.version = Some(1);
                *script = VecDeque::from(vec![current]);
            }
        }
        Ok(())
    }

    async fn update_dimension(
        &self,
        _token: &Token,
        instance_id: &str,
        dimension: &str,
        _metadata: &DimensionMetadata,
    ) -> Result<()> {
        self.record(format!("update_dimension:{}:{}", instance_id, dimension))
    }

    async fn dataset_exists(&self, _token: &Token, dataset_id: &str) -> Result<bool> {
        self.record(format!("dataset_exists:{}", dataset_id))?;
        Ok(self.datasets.lock().unwrap().contains(dataset_id))
    }

    async fn create_dataset(&self, _token: &Token, dataset_id: &str) -> Result<()> {
        self.record(format!("create_dataset:{}", dataset_id))?;
        self.datasets.lock().unwrap().insert(dataset_id.to_string());
        Ok(())
    }

    async fn update_dataset(
        &self,
        _token: &Token,
        dataset_id: &str,
        _metadata: &DatasetMetadata,
    ) -> Result<()> {
        self.record(format!("update_dataset:{}", dataset_id))
    }

    async fn update_version(
        &self,
        _token: &Token,
        dataset_id: &str,
        edition: &str,
        version: u32,
        update: &UsageNotesUpdate,
    ) -> Result<()> {
        self.record(format!(
            "update_version:{}:{}:{}:{}",
            dataset_id,
            edition,
            version,
            update.usage_notes.len()
        ))
    }

    async fn create_collection(&self, _token: &Token, name: &str) -> Result<()> {
        self.record(format!("create_collection:{}", name))
    }

    async fn collection(&self, _token: &Token, normalized_name: &str) -> Result<Collection> {
        self.record(format!("collection:{}", normalized_name))?;
        if self.missing_collections.lock().unwrap().contains(normalized_name) {
            return Err(CmdError::not_found(format!(
                "/zebedee/collection/{}",
                normalized_name
            )));
        }
        Ok(Collection {
            id: format!("{}-id", normalize_collection_name(normalized_name)),
            name: normalized_name.to_string(),
        })
    }

    async fn attach_dataset_to_collection(
        &self,
        _token: &Token,
        collection_id: &str,
        dataset_id: &str,
    ) -> Result<()> {
        self.record(format!("attach_dataset:{}:{}", collection_id, dataset_id))
    }

    async fn attach_version_to_collection(
        &self,
        _token: &Token,
        collection_id: &str,
        dataset_id: &str,
        edition: &str,
        version: u32,
    ) -> Result<()> {
        self.record(format!(
            "attach_version:{}:{}:{}:{}",
            collection_id, dataset_id, edition, version
        ))
    }
}
