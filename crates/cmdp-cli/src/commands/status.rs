//! `cmdp status` command implementation
//!
//! Shows the state of an instance and optionally waits for its import.

use super::Session;
use crate::error::Result;
use crate::events::ImportProgress;
use crate::instances::InstancePoller;
use crate::progress::ConsoleObserver;
use cmdp_common::types::Instance;
use colored::Colorize;

/// Show status of an instance (the latest one when no id is given)
pub async fn run(session: &Session, instance_id: Option<&str>, wait: bool) -> Result<()> {
    let token = session.login().await?;
    let poller = InstancePoller::new(session.api());

    let instance = match instance_id {
        Some(id) => poller.instance(&token, id).await?,
        None => poller.latest(&token).await?,
    };
    print_instance(&instance);

    if wait && !instance.state.is_import_complete() {
        println!();
        let completion = poller
            .await_completion(
                &token,
                &instance.id,
                &session.poll_options(),
                &ConsoleObserver::new(),
            )
            .await?;
        println!(
            "{} Import finished after {} status checks",
            "✓".green(),
            completion.polls
        );
    }

    Ok(())
}

fn print_instance(instance: &Instance) {
    println!("{}", format!("Instance {}", instance.id).cyan().bold());
    println!("  State:    {}", instance.state);
    println!("  Dataset:  {}", instance.dataset_id().unwrap_or("-"));

    if let Some(total) = instance.total_observations {
        let progress = ImportProgress {
            inserted: instance.inserted_observations(),
            total,
        };
        println!(
            "  Imported: {}/{} ({:.1}%)",
            progress.inserted,
            progress.total,
            progress.percent()
        );
    }
    if let Some(edition) = &instance.edition {
        println!("  Edition:  {}", edition);
    }
    if let Some(version) = instance.version {
        println!("  Version:  {}", version);
    }
    if let Some(message) = instance.first_event_message() {
        println!("  Event:    {}", message.yellow());
    }
}
