//! Editorial collections
//!
//! Collections are looked up by normalized name (spaces stripped,
//! lower-cased). Creation is fire-and-forget: the platform answers a duplicate
//! name with an error, so the outcome is only known from the lookup that
//! always follows it. A lookup answered with 404 is a missing collection;
//! any other rejection keeps its method, endpoint and status.

use crate::api::PublishingApi;
use crate::auth::Token;
use crate::error::{CmdError, Result};
use crate::events::{Observer, PublishEvent};
use cmdp_common::types::{normalize_collection_name, Collection};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct CollectionManager {
    api: Arc<dyn PublishingApi>,
}

impl CollectionManager {
    pub fn new(api: Arc<dyn PublishingApi>) -> Self {
        Self { api }
    }

    /// Create `name` if needed and return the collection.
    #[instrument(skip(self, token, observer))]
    pub async fn ensure_collection(
        &self,
        token: &Token,
        name: &str,
        observer: &dyn Observer,
    ) -> Result<Collection> {
        match self.api.create_collection(token, name).await {
            Ok(()) => {}
            Err(e @ CmdError::AuthenticationFailure { .. }) => {
                warn!(error = %e, "Collection create rejected the session token");
            }
            // usually "already exists"; the lookup below decides
            Err(e) => debug!(error = %e, "Collection create not accepted"),
        }

        let collection = self.find(token, name).await?;
        info!(collection_id = %collection.id, "Collection ready");
        observer.emit(PublishEvent::CollectionReady {
            collection_id: collection.id.clone(),
            name: collection.name.clone(),
        });
        Ok(collection)
    }

    /// Look up a collection by name without creating it.
    pub async fn find(&self, token: &Token, name: &str) -> Result<Collection> {
        let normalized = normalize_collection_name(name);
        match self.api.collection(token, &normalized).await {
            Ok(collection) => Ok(collection),
            Err(CmdError::NotFound(_)) => Err(CmdError::not_found(format!(
                "collection '{}' ({})",
                name, normalized
            ))),
            Err(e) => Err(e),
        }
    }

    /// Put the dataset landing page into the collection.
    pub async fn attach_dataset(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
        observer: &dyn Observer,
    ) -> Result<()> {
        self.api
            .attach_dataset_to_collection(token, collection_id, dataset_id)
            .await?;
        observer.emit(PublishEvent::AddedToCollection {
            collection_id: collection_id.to_string(),
            version: None,
        });
        Ok(())
    }

    /// Put one version of the dataset into the collection.
    pub async fn attach_version(
        &self,
        token: &Token,
        collection_id: &str,
        dataset_id: &str,
        edition: &str,
        version: u32,
        observer: &dyn Observer,
    ) -> Result<()> {
        self.api
            .attach_version_to_collection(token, collection_id, dataset_id, edition, version)
            .await?;
        observer.emit(PublishEvent::AddedToCollection {
            collection_id: collection_id.to_string(),
            version: Some(version),
        });
        Ok(())
    }
}
