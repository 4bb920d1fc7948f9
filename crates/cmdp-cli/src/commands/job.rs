//! `cmdp job` command implementation
//!
//! Inspection and repair of import jobs created by an interrupted upload.

use super::Session;
use crate::error::Result;
use crate::events::TracingObserver;
use crate::jobs::JobOrchestrator;
use cmdp_common::types::Job;
use colored::Colorize;

/// Show a job, or the most recent one
pub async fn show(session: &Session, job_id: Option<&str>) -> Result<()> {
    let token = session.login().await?;
    let jobs = JobOrchestrator::new(session.api());

    let job = match job_id {
        Some(id) => jobs.job(&token, id).await?,
        None => jobs.latest_job(&token).await?,
    };

    print_job(&job);
    Ok(())
}

pub async fn attach_file(session: &Session, job_id: &str, alias: &str, url: &str) -> Result<()> {
    let token = session.login().await?;
    JobOrchestrator::new(session.api())
        .attach_file(&token, job_id, alias, url)
        .await?;

    println!("{} File attached to job {}", "✓".green(), job_id.bold());
    Ok(())
}

pub async fn submit(session: &Session, job_id: &str) -> Result<()> {
    let token = session.login().await?;
    JobOrchestrator::new(session.api())
        .submit(&token, job_id, &TracingObserver)
        .await?;

    println!("{} Job {} submitted", "✓".green(), job_id.bold());
    Ok(())
}

fn print_job(job: &Job) {
    println!("{}", format!("Job {}", job.id).cyan().bold());
    println!("  Recipe:   {}", job.recipe_id);
    println!("  State:    {}", job.state);
    println!("  Instance: {}", job.instance_id().unwrap_or("-"));
    if job.files.is_empty() {
        println!("  Files:    {}", "none".yellow());
    }
    for file in &job.files {
        println!("  File:     {} ({})", file.url, file.alias_name);
    }
}
