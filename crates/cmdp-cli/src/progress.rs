//! Terminal rendering of pipeline events
//!
//! Uploads get a byte progress bar; every other event is printed as one line,
//! prefixed with the dataset it belongs to when running a batch.

use crate::events::{Observer, PublishEvent};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Create a progress bar for chunked uploads
pub fn create_upload_progress(size: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(size);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// One-line description of an event, or `None` for events shown otherwise
pub fn describe(event: &PublishEvent) -> Option<String> {
    let line = match event {
        PublishEvent::RecipeResolved { recipe_id, alias } => {
            format!("{} Recipe {} ({})", "✓".green(), recipe_id.bold(), alias)
        }
        PublishEvent::UploadStarted { .. } | PublishEvent::ChunkUploaded { .. } => return None,
        PublishEvent::UploadCompleted { locator } => {
            format!("{} Uploaded to {}", "✓".green(), locator.to_string().dimmed())
        }
        PublishEvent::JobCreated {
            job_id,
            instance_id,
        } => format!(
            "{} Job {} created, instance {}",
            "✓".green(),
            job_id.bold(),
            instance_id.bold()
        ),
        PublishEvent::RecipeMismatch {
            job_id,
            expected,
            found,
        } => format!(
            "{} Newest job {} has recipe {}, expected {}; continuing with it",
            "⚠".yellow(),
            job_id,
            found.yellow(),
            expected
        ),
        PublishEvent::JobSubmitted { job_id } => {
            format!("{} Job {} submitted", "✓".green(), job_id)
        }
        PublishEvent::InstancePolled {
            instance_id,
            state,
            progress,
        } => match progress {
            Some(progress) => format!(
                "{} Importing {}: {}/{} observations ({:.1}%)",
                "→".cyan(),
                instance_id,
                progress.inserted,
                progress.total,
                progress.percent()
            ),
            None => format!("{} Instance {} is {}", "→".cyan(), instance_id, state),
        },
        PublishEvent::ImportCompleted { instance_id, state } => {
            format!("{} Instance {} {}", "✓".green(), instance_id, state.to_string().green())
        }
        PublishEvent::CollectionReady {
            collection_id,
            name,
        } => format!("{} Collection {} ({})", "✓".green(), name.bold(), collection_id),
        PublishEvent::DatasetMetadataUpdated => {
            format!("{} Dataset metadata updated", "✓".green())
        }
        PublishEvent::EditionConfirmed { edition, .. } => {
            format!("{} Edition {} confirmed", "✓".green(), edition.bold())
        }
        PublishEvent::VersionResolved { version } => {
            format!("{} Version {}", "✓".green(), version)
        }
        PublishEvent::AddedToCollection {
            collection_id,
            version,
        } => match version {
            Some(version) => format!(
                "{} Version {} added to collection {}",
                "✓".green(),
                version,
                collection_id
            ),
            None => format!("{} Dataset added to collection {}", "✓".green(), collection_id),
        },
        PublishEvent::DimensionUpdated { dimension } => {
            format!("  {} {}", "✓".green(), dimension)
        }
        PublishEvent::DimensionFailed { dimension, error } => {
            format!("  {} {}: {}", "✗".red(), dimension, error.red())
        }
        PublishEvent::UsageNotesUpdated { count } => {
            format!("{} {} usage note(s) updated", "✓".green(), count)
        }
        PublishEvent::Published => format!("{} {}", "✓".green(), "Ready for review".green().bold()),
    };
    Some(line)
}

/// Renders events on the terminal
#[derive(Default)]
pub struct ConsoleObserver {
    upload: Mutex<Option<ProgressBar>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_upload<F: FnOnce(&mut Option<ProgressBar>)>(&self, f: F) {
        match self.upload.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Observer for ConsoleObserver {
    fn on_event(&self, dataset_id: Option<&str>, event: &PublishEvent) {
        match event {
            PublishEvent::UploadStarted {
                file_name,
                total_bytes,
                chunks,
                ..
            } => {
                let message = format!(
                    "{} Uploading {} ({}, {} chunks)",
                    "→".cyan(),
                    file_name.bold(),
                    format_bytes(*total_bytes),
                    chunks
                );
                let bar = create_upload_progress(*total_bytes, &message);
                self.with_upload(|slot| *slot = Some(bar));
                return;
            }
            PublishEvent::ChunkUploaded { bytes, .. } => {
                self.with_upload(|slot| {
                    if let Some(bar) = slot {
                        bar.inc(*bytes);
                    }
                });
                return;
            }
            PublishEvent::UploadCompleted { .. } => {
                self.with_upload(|slot| {
                    if let Some(bar) = slot.take() {
                        bar.finish_and_clear();
                    }
                });
            }
            _ => {}
        }

        if let Some(line) = describe(event) {
            match dataset_id {
                Some(dataset_id) => println!("{} {}", format!("[{}]", dataset_id).dimmed(), line),
                None => println!("{}", line),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::ImportProgress;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_create_upload_progress() {
        let pb = create_upload_progress(1024, "Uploading file");
        assert_eq!(pb.length(), Some(1024));
    }

    #[test]
    fn test_create_spinner() {
        let pb = create_spinner("Waiting...");
        assert!(!pb.is_finished());
        pb.finish();
    }

    #[test]
    fn test_describe_import_progress() {
        colored::control::set_override(false);
        let line = describe(&PublishEvent::InstancePolled {
            instance_id: "inst-1".to_string(),
            state: cmdp_common::types::InstanceState::Submitted,
            progress: Some(ImportProgress {
                inserted: 50,
                total: 200,
            }),
        })
        .unwrap();

        assert_eq!(line, "→ Importing inst-1: 50/200 observations (25.0%)");
        assert!(describe(&PublishEvent::ChunkUploaded {
            number: 1,
            total: 2,
            bytes: 10
        })
        .is_none());
    }

    #[test]
    fn test_console_observer_tracks_upload_bar() {
        let observer = ConsoleObserver::new();
        observer.emit(PublishEvent::UploadStarted {
            file_name: "data.csv".to_string(),
            transfer_id: "t".to_string(),
            total_bytes: 100,
            chunks: 2,
        });
        observer.emit(PublishEvent::ChunkUploaded {
            number: 1,
            total: 2,
            bytes: 60,
        });

        let position = observer
            .upload
            .lock()
            .unwrap()
            .as_ref()
            .map(|bar| bar.position());
        assert_eq!(position, Some(60));
    }
}
