//! `cmdp metadata` command implementation

use super::Session;
use crate::error::Result;
use crate::events::Scoped;
use crate::pipeline::load_bundle;
use crate::progress::ConsoleObserver;
use colored::Colorize;
use std::path::Path;

/// Publish a metadata file for an instance that already has a version
pub async fn run(
    session: &Session,
    dataset_id: &str,
    instance_id: &str,
    edition: &str,
    metadata_file: &Path,
) -> Result<()> {
    // Validated before logging in
    let bundle = load_bundle(metadata_file)?;
    let token = session.login().await?;
    let console = ConsoleObserver::new();

    let report = session
        .pipeline()
        .publish_metadata(
            &token,
            dataset_id,
            instance_id,
            edition,
            &bundle,
            &Scoped::new(dataset_id, &console),
        )
        .await?;

    println!();
    if report.is_complete() {
        println!("{} Metadata published", "✓".green());
    } else {
        println!(
            "{} Metadata published; {} dimension(s) not updated:",
            "⚠".yellow(),
            report.failed.len()
        );
        for (dimension, error) in &report.failed {
            println!("  {} {}: {}", "✗".red(), dimension, error);
        }
    }
    Ok(())
}
