//! `cmdp dataset` command implementation

use super::Session;
use crate::error::Result;
use colored::Colorize;

/// Register a new dataset
pub async fn create(session: &Session, dataset_id: &str) -> Result<()> {
    let token = session.login().await?;
    crate::datasets::create_dataset(session.api().as_ref(), &token, dataset_id).await?;

    println!("{} Dataset {} created", "✓".green(), dataset_id.bold());
    Ok(())
}
