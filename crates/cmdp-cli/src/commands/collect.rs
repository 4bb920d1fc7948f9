//! `cmdp collect` command implementation

use super::Session;
use crate::error::Result;
use crate::events::Scoped;
use crate::progress::ConsoleObserver;
use colored::Colorize;

/// Confirm the edition and add the instance's dataset and version to a
/// collection
pub async fn run(
    session: &Session,
    dataset_id: &str,
    instance_id: &str,
    edition: &str,
    collection: &str,
) -> Result<()> {
    let token = session.login().await?;
    let console = ConsoleObserver::new();

    let report = session
        .pipeline()
        .add_to_collection(
            &token,
            dataset_id,
            instance_id,
            edition,
            collection,
            &Scoped::new(dataset_id, &console),
        )
        .await?;

    println!();
    println!(
        "{} {} {} version {} is in collection {}",
        "✓".green(),
        dataset_id.bold(),
        report.edition,
        report.version,
        report.collection_id.cyan()
    );
    Ok(())
}
