//! `cmdp batch` command implementation
//!
//! Publishes every dataset of a manifest and prints one outcome per dataset.

use super::Session;
use crate::error::{CmdError, Result};
use crate::manifest::BatchManifest;
use crate::pipeline::BatchReport;
use crate::progress::ConsoleObserver;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use std::path::Path;

pub async fn run(session: &Session, manifest_path: &Path, concurrent: bool) -> Result<()> {
    let manifest = BatchManifest::load(manifest_path)?;
    let credentials = session.credentials()?;

    println!(
        "{} Publishing {} dataset(s) from {}",
        "→".cyan(),
        manifest.datasets.len(),
        manifest_path.display()
    );

    let report = session
        .pipeline()
        .batch(
            &credentials,
            &manifest.datasets,
            concurrent,
            &ConsoleObserver::new(),
        )
        .await?;

    println!();
    println!("{}", outcome_table(&report));

    if report.is_success() {
        println!("{} All {} dataset(s) published", "✓".green(), report.published());
        Ok(())
    } else {
        Err(CmdError::Other(anyhow::anyhow!(
            "{} of {} dataset(s) failed",
            report.failed(),
            report.outcomes.len()
        )))
    }
}

/// One row per dataset: published version or failing stage and error
pub fn outcome_table(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Dataset", "Outcome", "Instance", "Version", "Detail"]);

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(published) => {
                let detail = if published.dimensions.is_complete() {
                    String::new()
                } else {
                    format!("{} dimension(s) not updated", published.dimensions.failed.len())
                };
                table.add_row(vec![
                    outcome.dataset_id.clone(),
                    "published".to_string(),
                    published.instance_id.clone(),
                    published.collection.version.to_string(),
                    detail,
                ]);
            }
            Err(e) => {
                let stage = e
                    .stage()
                    .map(|stage| format!("failed ({})", stage))
                    .unwrap_or_else(|| "failed".to_string());
                table.add_row(vec![
                    outcome.dataset_id.clone(),
                    stage,
                    String::new(),
                    String::new(),
                    e.root().to_string(),
                ]);
            }
        }
    }

    table
}
