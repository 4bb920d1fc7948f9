//! Pushes a [`MetadataBundle`] to the platform
//!
//! The three parts of a bundle are independent updates. Dataset fields and
//! usage notes must succeed; dimension updates are best-effort, each failure
//! is reported and the remaining dimensions are still sent.

use super::{DatasetMetadata, DimensionMetadata, MetadataBundle, UsageNote};
use crate::api::{PublishingApi, UsageNotesUpdate};
use crate::auth::Token;
use crate::error::Result;
use crate::events::{Observer, PublishEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of the per-dimension updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionReport {
    pub updated: Vec<String>,
    /// Dimension name and error message
    pub failed: Vec<(String, String)>,
}

impl DimensionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct MetadataPublisher {
    api: Arc<dyn PublishingApi>,
}

impl MetadataPublisher {
    pub fn new(api: Arc<dyn PublishingApi>) -> Self {
        Self { api }
    }

    /// Replace the dataset-level fields. An empty update sends nothing.
    pub async fn update_dataset(
        &self,
        token: &Token,
        dataset_id: &str,
        metadata: &DatasetMetadata,
        observer: &dyn Observer,
    ) -> Result<()> {
        if metadata.is_empty() {
            info!(dataset_id, "No dataset fields to update");
            return Ok(());
        }

        self.api.update_dataset(token, dataset_id, metadata).await?;
        observer.emit(PublishEvent::DatasetMetadataUpdated);
        Ok(())
    }

    /// Update every dimension, collecting failures instead of stopping.
    #[instrument(skip(self, token, dimensions, observer), fields(count = dimensions.len()))]
    pub async fn update_dimensions(
        &self,
        token: &Token,
        instance_id: &str,
        dimensions: &BTreeMap<String, DimensionMetadata>,
        observer: &dyn Observer,
    ) -> DimensionReport {
        let mut report = DimensionReport::default();

        for (name, metadata) in dimensions {
            match self
                .api
                .update_dimension(token, instance_id, name, metadata)
                .await
            {
                Ok(()) => {
                    observer.emit(PublishEvent::DimensionUpdated {
                        dimension: name.clone(),
                    });
                    report.updated.push(name.clone());
                }
                Err(e) => {
                    warn!(dimension = %name, error = %e, "Dimension update failed");
                    observer.emit(PublishEvent::DimensionFailed {
                        dimension: name.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        report
    }

    /// Replace the usage notes of one version. An empty list sends nothing.
    pub async fn update_usage_notes(
        &self,
        token: &Token,
        dataset_id: &str,
        edition: &str,
        version: u32,
        notes: &[UsageNote],
        observer: &dyn Observer,
    ) -> Result<()> {
        if notes.is_empty() {
            return Ok(());
        }

        let update = UsageNotesUpdate {
            usage_notes: notes.to_vec(),
        };
        self.api
            .update_version(token, dataset_id, edition, version, &update)
            .await?;

        observer.emit(PublishEvent::UsageNotesUpdated { count: notes.len() });
        Ok(())
    }

    /// Publish a whole bundle for an instance whose version is `version`.
    ///
    /// Usage notes are validated before any request is made.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, token, bundle, observer))]
    pub async fn publish_metadata(
        &self,
        token: &Token,
        dataset_id: &str,
        instance_id: &str,
        edition: &str,
        version: u32,
        bundle: &MetadataBundle,
        observer: &dyn Observer,
    ) -> Result<DimensionReport> {
        let notes = bundle.usage_notes()?;

        self.update_dataset(token, dataset_id, &bundle.metadata, observer)
            .await?;
        let report = self
            .update_dimensions(token, instance_id, &bundle.dimension_data, observer)
            .await;
        self.update_usage_notes(token, dataset_id, edition, version, &notes, observer)
            .await?;

        Ok(report)
    }
}
