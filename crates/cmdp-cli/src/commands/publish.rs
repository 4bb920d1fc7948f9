//! `cmdp publish` command implementation

use super::Session;
use crate::error::Result;
use crate::events::Scoped;
use crate::pipeline::{DatasetRequest, PublishReport};
use crate::progress::ConsoleObserver;
use colored::Colorize;

/// Run the whole pipeline for one dataset
pub async fn run(session: &Session, request: DatasetRequest) -> Result<()> {
    let credentials = session.credentials()?;
    let console = ConsoleObserver::new();

    let report = session
        .pipeline()
        .publish(
            &credentials,
            &request,
            &Scoped::new(&request.dataset_id, &console),
        )
        .await?;

    println!();
    print_report(&report);
    Ok(())
}

pub(crate) fn print_report(report: &PublishReport) {
    println!("{}", format!("Published {}", report.dataset_id).cyan().bold());
    println!("  Job:        {}", report.job_id);
    println!("  Instance:   {}", report.instance_id);
    println!("  Collection: {}", report.collection.collection_id);
    println!(
        "  Release:    {} version {}",
        report.collection.edition, report.collection.version
    );
    println!("  Dimensions: {} updated", report.dimensions.updated.len());
    for (dimension, error) in &report.dimensions.failed {
        println!("    {} {}: {}", "✗".red(), dimension, error);
    }
    println!("  Usage notes: {}", report.usage_notes);
    if report.job_lookup.is_mismatch() {
        println!(
            "  {} the job was matched with a different recipe",
            "⚠".yellow()
        );
    }
}
