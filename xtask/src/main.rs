//! Build automation tasks for cmdp
//!
//! Currently generates the CLI reference from the clap definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for cmdp", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<cmdp_cli::Cli>();

    let content = format!(
        r#"# cmdp CLI Reference

Generated from the CLI source code on {}.

## Overview

cmdp publishes datasets to the Customise My Data (CMD) publishing platform:
it uploads a V4 file, runs the import job, waits for the import, confirms the
edition, adds the release to a collection and applies its metadata.

## Quick Start

```bash
# Check the credentials file works
cmdp login --credentials credentials.json

# Publish one dataset into the "October release" collection
cmdp publish cpih01 time-series cpih.csv cpih-metadata.json "October release"

# Publish everything listed in a manifest, waiting on imports concurrently
cmdp batch october.yml --concurrent
```

## Commands

{}

## Environment Variables

Every variable may also be placed in a `.env` file.

- `CMD_BASE_URL` - Publishing platform URL
- `CMD_CREDENTIALS` - Path of the JSON credentials file (`email`, `password`)
- `CMD_UPLOAD_BUCKET_URL` - Staging bucket used to locate uploaded files
- `CMD_POLL_INTERVAL_SECS` - Wait between import status checks (default 30)
- `CMD_POLL_TIMEOUT_SECS` - Give up waiting for an import after this long
- `CMD_API_TIMEOUT_SECS` - Per-request HTTP timeout
- `CMD_JOB_LOOKUP_ATTEMPTS`, `CMD_JOB_LOOKUP_DELAY_SECS` - Re-reads of the job list after creating a job
- `CMD_BATCH_PAUSE_SECS` - Pause between uploads in a batch
- `CMDP_LOG_LEVEL`, `CMDP_LOG_OUTPUT`, `CMDP_LOG_FORMAT`, `CMDP_LOG_DIR` - Logging

## Batch Manifest

```yaml
datasets:
  - dataset_id: cpih01
    v4: cpih.csv
    edition: time-series
    collection_name: October release
    metadata_file: cpih-metadata.json
```

Relative paths are resolved against the manifest's directory.

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
