//! Pipeline progress events
//!
//! Components report what they are doing as [`PublishEvent`] values delivered
//! to an [`Observer`]. The CLI renders them on the terminal, the default
//! observer writes them to the log, and tests record them.

use cmdp_common::types::{InstanceState, StorageLocator};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// Inserted/total observation counts of a running import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub inserted: u64,
    pub total: u64,
}

impl ImportProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.inserted as f64 * 100.0 / self.total as f64
        }
    }
}

/// Something that happened while publishing one dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PublishEvent {
    RecipeResolved {
        recipe_id: String,
        alias: String,
    },
    UploadStarted {
        file_name: String,
        transfer_id: String,
        total_bytes: u64,
        chunks: u32,
    },
    ChunkUploaded {
        number: u32,
        total: u32,
        bytes: u64,
    },
    UploadCompleted {
        locator: StorageLocator,
    },
    JobCreated {
        job_id: String,
        instance_id: String,
    },
    /// The newest job belongs to another recipe; it was accepted anyway
    RecipeMismatch {
        job_id: String,
        expected: String,
        found: String,
    },
    JobSubmitted {
        job_id: String,
    },
    InstancePolled {
        instance_id: String,
        state: InstanceState,
        progress: Option<ImportProgress>,
    },
    ImportCompleted {
        instance_id: String,
        state: InstanceState,
    },
    CollectionReady {
        collection_id: String,
        name: String,
    },
    DatasetMetadataUpdated,
    EditionConfirmed {
        instance_id: String,
        edition: String,
    },
    VersionResolved {
        version: u32,
    },
    AddedToCollection {
        collection_id: String,
        version: Option<u32>,
    },
    DimensionUpdated {
        dimension: String,
    },
    DimensionFailed {
        dimension: String,
        error: String,
    },
    UsageNotesUpdated {
        count: usize,
    },
    Published,
}

/// Receives pipeline events
pub trait Observer: Send + Sync {
    /// Handle one event. `dataset_id` is set when the event was raised inside a
    /// per-dataset scope.
    fn on_event(&self, dataset_id: Option<&str>, event: &PublishEvent);

    /// Report an event from the current scope
    fn emit(&self, event: PublishEvent) {
        self.on_event(None, &event);
    }
}

/// Tags every event with the dataset it belongs to
pub struct Scoped<'a> {
    dataset_id: &'a str,
    inner: &'a dyn Observer,
}

impl<'a> Scoped<'a> {
    pub fn new(dataset_id: &'a str, inner: &'a dyn Observer) -> Self {
        Self { dataset_id, inner }
    }
}

impl Observer for Scoped<'_> {
    fn on_event(&self, _dataset_id: Option<&str>, event: &PublishEvent) {
        self.inner.on_event(Some(self.dataset_id), event);
    }
}

/// Writes events to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, dataset_id: Option<&str>, event: &PublishEvent) {
        let dataset_id = dataset_id.unwrap_or("-");
        match event {
            PublishEvent::RecipeMismatch {
                job_id,
                expected,
                found,
            } => warn!(
                dataset_id,
                job_id = %job_id,
                expected = %expected,
                found = %found,
                "Newest job belongs to a different recipe"
            ),
            PublishEvent::DimensionFailed { dimension, error } => warn!(
                dataset_id,
                dimension = %dimension,
                error = %error,
                "Dimension metadata not updated"
            ),
            PublishEvent::InstancePolled {
                instance_id,
                state,
                progress: Some(progress),
            } => info!(
                dataset_id,
                instance_id = %instance_id,
                state = %state,
                inserted = progress.inserted,
                total = progress.total,
                "Import in progress"
            ),
            other => info!(dataset_id, event = ?other, "Pipeline event"),
        }
    }
}

/// Keeps every event in memory, in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(Option<String>, PublishEvent)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events with their dataset scope
    pub fn events(&self) -> Vec<(Option<String>, PublishEvent)> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Recorded events for one dataset
    pub fn events_for(&self, dataset_id: &str) -> Vec<PublishEvent> {
        self.events()
            .into_iter()
            .filter(|(scope, _)| scope.as_deref() == Some(dataset_id))
            .map(|(_, event)| event)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, dataset_id: Option<&str>, event: &PublishEvent) {
        let entry = (dataset_id.map(str::to_string), event.clone());
        match self.events.lock() {
            Ok(mut events) => events.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_observer_tags_events() {
        let recorder = RecordingObserver::new();
        {
            let scoped = Scoped::new("cpih01", &recorder);
            scoped.emit(PublishEvent::JobSubmitted {
                job_id: "job-1".to_string(),
            });
        }
        recorder.emit(PublishEvent::Published);

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0.as_deref(), Some("cpih01"));
        assert_eq!(events[1].0, None);
        assert_eq!(recorder.events_for("cpih01").len(), 1);
    }

    #[test]
    fn test_import_progress_percent() {
        let progress = ImportProgress {
            inserted: 250,
            total: 1000,
        };
        assert!((progress.percent() - 25.0).abs() < f64::EPSILON);
        assert_eq!(ImportProgress { inserted: 0, total: 0 }.percent(), 0.0);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let value = serde_json::to_value(PublishEvent::VersionResolved { version: 3 }).unwrap();
        assert_eq!(value, serde_json::json!({"event": "version_resolved", "version": 3}));
    }
}
