//! `cmdp upload` command implementation
//!
//! Runs the upload phase on its own: recipe check, chunked upload, job
//! creation and submission.

use super::Session;
use crate::error::Result;
use crate::events::Scoped;
use crate::progress::ConsoleObserver;
use colored::Colorize;
use std::path::Path;

pub async fn run(session: &Session, dataset_id: &str, v4: &Path) -> Result<()> {
    let token = session.login().await?;
    let console = ConsoleObserver::new();
    let observer = Scoped::new(dataset_id, &console);

    let submission = session
        .pipeline()
        .upload_phase(&token, dataset_id, v4, &observer)
        .await?;

    println!();
    println!("{}", "Import submitted".cyan().bold());
    println!("  Job:      {}", submission.job.job_id);
    println!("  Instance: {}", submission.job.instance_id);
    println!("  File:     {}", submission.locator);
    if submission.job.lookup.is_mismatch() {
        println!(
            "  {} the job's recipe does not match {}; check it with 'cmdp job show {}'",
            "⚠".yellow(),
            submission.recipe.recipe_id,
            submission.job.job_id
        );
    }
    println!();
    println!(
        "Follow the import with 'cmdp status {} --wait'",
        submission.job.instance_id
    );

    Ok(())
}
