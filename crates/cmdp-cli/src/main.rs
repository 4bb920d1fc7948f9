//! cmdp - Main entry point

use cmdp_cli::commands::{self, Session};
use cmdp_cli::{Cli, Commands, ConfigCommand, DatasetCommand, JobCommand, RecipeCommand};
use cmdp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    if cli.command.is_none() {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    }

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("cmdp")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> cmdp_cli::Result<()> {
    let Some(ref command) = cli.command else {
        return Ok(());
    };

    let session = || Session::new(cli.base_url.clone(), cli.credentials.clone());

    match command {
        Commands::Login => commands::login::run(&session()?).await,

        Commands::Upload { dataset_id, v4 } => {
            commands::upload::run(&session()?, dataset_id, v4).await
        }

        Commands::Status { instance_id, wait } => {
            commands::status::run(&session()?, instance_id.as_deref(), *wait).await
        }

        Commands::Collect {
            dataset_id,
            instance_id,
            edition,
            collection,
        } => {
            commands::collect::run(&session()?, dataset_id, instance_id, edition, collection).await
        }

        Commands::Metadata {
            dataset_id,
            instance_id,
            edition,
            metadata_file,
        } => {
            commands::metadata::run(&session()?, dataset_id, instance_id, edition, metadata_file)
                .await
        }

        Commands::Publish {
            dataset_id,
            edition,
            v4,
            metadata_file,
            collection,
        } => {
            let request = cmdp_cli::pipeline::DatasetRequest {
                dataset_id: dataset_id.clone(),
                v4: v4.clone(),
                edition: edition.clone(),
                collection_name: collection.clone(),
                metadata_file: metadata_file.clone(),
            };
            commands::publish::run(&session()?, request).await
        }

        Commands::Batch {
            manifest,
            concurrent,
        } => commands::batch::run(&session()?, manifest, *concurrent).await,

        Commands::Recipe { command } => {
            let session = session()?;
            match command {
                RecipeCommand::Show { key, id } => {
                    commands::recipe::show(&session, key, *id).await
                }
                RecipeCommand::Template { output } => {
                    commands::recipe::template(output.as_deref())
                }
                RecipeCommand::Create { file } => commands::recipe::create(&session, file).await,
                RecipeCommand::Editions {
                    dataset_id,
                    editions,
                } => commands::recipe::editions(&session, dataset_id, editions.clone()).await,
                RecipeCommand::CodeList {
                    dataset_id,
                    code_list_id,
                    label,
                    is_hierarchy,
                } => {
                    commands::recipe::code_list(
                        &session,
                        dataset_id,
                        code_list_id,
                        label,
                        *is_hierarchy,
                    )
                    .await
                }
                RecipeCommand::Update {
                    dataset_id,
                    changes_file,
                } => commands::recipe::update(&session, dataset_id, changes_file).await,
            }
        }

        Commands::Dataset { command } => match command {
            DatasetCommand::Create { dataset_id } => {
                commands::dataset::create(&session()?, dataset_id).await
            }
        },

        Commands::Job { command } => {
            let session = session()?;
            match command {
                JobCommand::Show { job_id } => {
                    commands::job::show(&session, job_id.as_deref()).await
                }
                JobCommand::AttachFile { job_id, alias, url } => {
                    commands::job::attach_file(&session, job_id, alias, url).await
                }
                JobCommand::Submit { job_id } => commands::job::submit(&session, job_id).await,
            }
        }

        Commands::Config { command } => match command {
            ConfigCommand::Show => commands::config::show(&session()?),
        },
    }
}
