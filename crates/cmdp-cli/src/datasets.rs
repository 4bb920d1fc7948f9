//! Dataset registration

use crate::api::PublishingApi;
use crate::auth::Token;
use crate::error::{CmdError, Result};
use tracing::info;

/// Create the dataset record for `dataset_id`.
///
/// Refuses to touch an existing dataset.
pub async fn create_dataset(api: &dyn PublishingApi, token: &Token, dataset_id: &str) -> Result<()> {
    if dataset_id.trim().is_empty() {
        return Err(CmdError::precondition("dataset id must not be empty"));
    }

    if api.dataset_exists(token, dataset_id).await? {
        return Err(CmdError::precondition(format!(
            "dataset '{}' already exists",
            dataset_id
        )));
    }

    api.create_dataset(token, dataset_id).await?;
    info!(dataset_id, "Dataset created");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{token, FakeApi};

    #[tokio::test]
    async fn test_create_new_dataset() {
        let api = FakeApi::new();
        create_dataset(&api, &token(), "cpih01").await.unwrap();
        assert_eq!(api.calls(), vec!["dataset_exists:cpih01", "create_dataset:cpih01"]);
    }

    #[tokio::test]
    async fn test_existing_dataset_is_refused() {
        let api = FakeApi::new().with_dataset("cpih01");
        let err = create_dataset(&api, &token(), "cpih01").await.unwrap_err();

        assert!(matches!(err, CmdError::PreconditionFailed(_)));
        assert!(api.calls_starting_with("create_dataset").is_empty());
    }
}
