//! Instance polling, edition confirmation and version lookup

use crate::api::{fetch_all_pages, EditionConfirmation, PublishingApi};
use crate::auth::Token;
use crate::error::{CmdError, Result};
use crate::events::{ImportProgress, Observer, PublishEvent};
use chrono::NaiveDate;
use cmdp_common::types::{Instance, InstanceState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Message raised when an instance has no observation total and no event
const INGESTION_ERROR: &str = "the import pipeline reported an error for this instance";

/// Controls an [`InstancePoller::await_completion`] loop
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Untimed when `None`
    pub timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl PollOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Terminal state reached by an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub state: InstanceState,
    /// Number of status queries it took
    pub polls: u32,
}

/// What one status query says about the import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Done(InstanceState),
    InProgress(Option<ImportProgress>),
}

/// Interpret one instance document.
///
/// `failed` and a missing observation total while submitted are errors;
/// `completed` and any later state are terminal.
pub fn assess(instance: &Instance) -> Result<PollStatus> {
    match &instance.state {
        InstanceState::Failed => Err(CmdError::ImportFailed {
            instance_id: instance.id.clone(),
            message: instance
                .first_event_message()
                .unwrap_or("import failed")
                .to_string(),
        }),
        state if state.is_import_complete() => Ok(PollStatus::Done(state.clone())),
        InstanceState::Submitted => {
            let total = instance.total_observations.ok_or_else(|| {
                CmdError::UpstreamData(
                    instance
                        .first_event_message()
                        .unwrap_or(INGESTION_ERROR)
                        .to_string(),
                )
            })?;
            Ok(PollStatus::InProgress(Some(ImportProgress {
                inserted: instance.inserted_observations(),
                total,
            })))
        }
        InstanceState::Created => Ok(PollStatus::InProgress(None)),
        other => {
            warn!(instance_id = %instance.id, state = %other, "Unrecognised instance state, still waiting");
            Ok(PollStatus::InProgress(None))
        }
    }
}

/// Watches instances and drives their edition/version transition
#[derive(Clone)]
pub struct InstancePoller {
    api: Arc<dyn PublishingApi>,
}

impl InstancePoller {
    pub fn new(api: Arc<dyn PublishingApi>) -> Self {
        Self { api }
    }

    pub async fn instance(&self, token: &Token, instance_id: &str) -> Result<Instance> {
        self.api.instance(token, instance_id).await
    }

    /// Query `instance_id` until the import reaches a terminal state.
    ///
    /// Queries first and waits between queries, so a sequence of N states
    /// ending in `completed` returns after exactly N queries.
    #[instrument(skip(self, token, options, observer), fields(interval = ?options.interval))]
    pub async fn await_completion(
        &self,
        token: &Token,
        instance_id: &str,
        options: &PollOptions,
        observer: &dyn Observer,
    ) -> Result<Completion> {
        let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
        let mut polls = 0u32;

        loop {
            if options.cancel.is_cancelled() {
                return Err(CmdError::Cancelled);
            }

            let instance = self.api.instance(token, instance_id).await?;
            polls += 1;

            match assess(&instance)? {
                PollStatus::Done(state) => {
                    info!(instance_id, state = %state, polls, "Import complete");
                    observer.emit(PublishEvent::ImportCompleted {
                        instance_id: instance_id.to_string(),
                        state: state.clone(),
                    });
                    return Ok(Completion { state, polls });
                }
                PollStatus::InProgress(progress) => {
                    observer.emit(PublishEvent::InstancePolled {
                        instance_id: instance_id.to_string(),
                        state: instance.state.clone(),
                        progress,
                    });
                }
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(CmdError::Timeout(options.timeout.unwrap_or_default()));
                    }
                    remaining.min(options.interval)
                }
                None => options.interval,
            };

            debug!(instance_id, ?wait, "Waiting before next poll");
            tokio::select! {
                _ = options.cancel.cancelled() => return Err(CmdError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Every instance on the platform
    pub async fn instances(&self, token: &Token) -> Result<Vec<Instance>> {
        let api = self.api.as_ref();
        fetch_all_pages(move |offset| api.instances_page(token, offset)).await
    }

    /// The most recently created instance
    pub async fn latest(&self, token: &Token) -> Result<Instance> {
        self.instances(token)
            .await?
            .pop()
            .ok_or_else(|| CmdError::not_found("the instance list is empty"))
    }

    /// Assign `edition` to a completed instance; the platform then allocates
    /// a version number.
    #[instrument(skip(self, token, observer))]
    pub async fn confirm_edition(
        &self,
        token: &Token,
        instance_id: &str,
        edition: &str,
        release_date: NaiveDate,
        observer: &dyn Observer,
    ) -> Result<()> {
        let confirmation = EditionConfirmation::new(edition, release_date);
        self.api
            .confirm_edition(token, instance_id, &confirmation)
            .await?;

        observer.emit(PublishEvent::EditionConfirmed {
            instance_id: instance_id.to_string(),
            edition: edition.to_string(),
        });
        Ok(())
    }

    /// Version allocated to `instance_id`, which must belong to `dataset_id`
    /// and be edition-confirmed or later.
    pub async fn version(&self, token: &Token, dataset_id: &str, instance_id: &str) -> Result<u32> {
        let instance = self.api.instance(token, instance_id).await?;
        version_of(&instance, dataset_id)
    }
}

/// Version of an instance, after checking its dataset link and state.
pub fn version_of(instance: &Instance, dataset_id: &str) -> Result<u32> {
    match instance.dataset_id() {
        Some(linked) if linked == dataset_id => {}
        linked => {
            return Err(CmdError::precondition(format!(
                "instance '{}' belongs to dataset '{}', not '{}'",
                instance.id,
                linked.unwrap_or("<none>"),
                dataset_id
            )))
        }
    }

    if !instance.state.has_version() {
        return Err(CmdError::precondition(format!(
            "instance '{}' is '{}'; a version is only assigned once the edition is confirmed",
            instance.id, instance.state
        )));
    }

    instance.version.ok_or_else(|| {
        CmdError::UpstreamData(format!("instance '{}' has no version number", instance.id))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::RecordingObserver;
    use crate::testing::{importing, instance, token, FakeApi};
    use cmdp_common::types::InstanceEvent;

    fn poller(api: &Arc<FakeApi>) -> InstancePoller {
        InstancePoller::new(api.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_states_complete_after_four_polls() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![
                instance("inst-1", "cpih01", InstanceState::Created),
                importing("inst-1", "cpih01", 10, 100),
                importing("inst-1", "cpih01", 60, 100),
                instance("inst-1", "cpih01", InstanceState::Completed),
            ],
        ));
        let observer = RecordingObserver::new();

        let completion = poller(&api)
            .await_completion(&token(), "inst-1", &PollOptions::default(), &observer)
            .await
            .unwrap();

        assert_eq!(
            completion,
            Completion {
                state: InstanceState::Completed,
                polls: 4
            }
        );
        assert_eq!(api.calls_starting_with("instance:").len(), 4);

        let progress: Vec<_> = observer
            .events()
            .into_iter()
            .filter_map(|(_, event)| match event {
                PublishEvent::InstancePolled { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            vec![
                None,
                Some(ImportProgress {
                    inserted: 10,
                    total: 100
                }),
                Some(ImportProgress {
                    inserted: 60,
                    total: 100
                }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_are_spaced_by_interval() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![
                importing("inst-1", "cpih01", 0, 10),
                instance("inst-1", "cpih01", InstanceState::Completed),
            ],
        ));
        let start = Instant::now();

        poller(&api)
            .await_completion(
                &token(),
                "inst-1",
                &PollOptions::new(Duration::from_secs(30)),
                &RecordingObserver::new(),
            )
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(31));
    }

    #[tokio::test]
    async fn test_later_states_are_terminal() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![instance("inst-1", "cpih01", InstanceState::EditionConfirmed)],
        ));

        let completion = poller(&api)
            .await_completion(&token(), "inst-1", &PollOptions::default(), &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(completion.state, InstanceState::EditionConfirmed);
        assert_eq!(completion.polls, 1);
    }

    #[tokio::test]
    async fn test_failed_instance_raises() {
        let mut failed = instance("inst-1", "cpih01", InstanceState::Failed);
        failed.events.push(InstanceEvent {
            message: "bad header row".to_string(),
            ..Default::default()
        });
        let api = Arc::new(FakeApi::new().with_script("inst-1", vec![failed]));

        let err = poller(&api)
            .await_completion(&token(), "inst-1", &PollOptions::default(), &RecordingObserver::new())
            .await
            .unwrap_err();

        match err {
            CmdError::ImportFailed { message, .. } => assert_eq!(message, "bad header row"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_total_is_upstream_data_error() {
        let mut broken = importing("inst-1", "cpih01", 0, 0);
        broken.total_observations = None;
        broken.events.push(InstanceEvent {
            message: "dimension 'time' not in code list".to_string(),
            ..Default::default()
        });
        let api = Arc::new(FakeApi::new().with_script("inst-1", vec![broken]));

        let err = poller(&api)
            .await_completion(&token(), "inst-1", &PollOptions::default(), &RecordingObserver::new())
            .await
            .unwrap_err();

        match err {
            CmdError::UpstreamData(message) => assert!(message.contains("code list")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![instance("inst-1", "cpih01", InstanceState::Created)],
        ));
        let options = PollOptions::new(Duration::from_secs(30))
            .with_timeout(Some(Duration::from_secs(75)));

        let err = poller(&api)
            .await_completion(&token(), "inst-1", &options, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CmdError::Timeout(d) if d == Duration::from_secs(75)));
        // queries at 0s, 30s, 60s and 75s
        assert_eq!(api.calls_starting_with("instance:").len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![instance("inst-1", "cpih01", InstanceState::Created)],
        ));
        let cancel = CancellationToken::new();
        let options = PollOptions::default().with_cancel(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            cancel.cancel();
        });

        let err = poller(&api)
            .await_completion(&token(), "inst-1", &options, &RecordingObserver::new())
            .await
            .unwrap_err();
        trigger.await.unwrap();

        assert!(matches!(err, CmdError::Cancelled));
        assert_eq!(api.calls_starting_with("instance:").len(), 2);
    }

    #[test]
    fn test_version_requires_edition_confirmed() {
        let mut inst = instance("inst-1", "cpih01", InstanceState::Completed);
        inst.version = Some(4);
        assert!(matches!(
            version_of(&inst, "cpih01"),
            Err(CmdError::PreconditionFailed(_))
        ));

        inst.state = InstanceState::EditionConfirmed;
        assert_eq!(version_of(&inst, "cpih01").unwrap(), 4);
    }

    #[test]
    fn test_version_checks_dataset_link() {
        let mut inst = instance("inst-1", "cpih01", InstanceState::EditionConfirmed);
        inst.version = Some(1);

        let err = version_of(&inst, "mid-year-pop-est").unwrap_err();
        assert!(err.to_string().contains("cpih01"));
    }

    #[tokio::test]
    async fn test_confirm_edition_then_version() {
        let api = Arc::new(FakeApi::new().with_script(
            "inst-1",
            vec![instance("inst-1", "cpih01", InstanceState::Completed)],
        ));
        let poller = poller(&api);
        let date = NaiveDate::from_ymd_opt(2024, 10, 16).unwrap();

        poller
            .confirm_edition(&token(), "inst-1", "time-series", date, &RecordingObserver::new())
            .await
            .unwrap();
        assert_eq!(poller.version(&token(), "cpih01", "inst-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_instance() {
        let api = Arc::new(
            FakeApi::new()
                .with_script("inst-1", vec![instance("inst-1", "a", InstanceState::Completed)])
                .with_script("inst-2", vec![instance("inst-2", "b", InstanceState::Created)]),
        );

        assert_eq!(poller(&api).latest(&token()).await.unwrap().id, "inst-2");
    }
}
