//! `cmdp config` command implementation
//!
//! Configuration comes from the environment (and `.env`); this only displays it.

use super::Session;
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;

/// Show the effective configuration
pub fn show(session: &Session) -> Result<()> {
    println!("{}", "cmdp configuration:".cyan().bold());
    println!();
    for (key, value) in entries(&session.config) {
        println!("{:<22} {}", format!("{}:", key), value);
    }
    println!();
    println!("{}", "Environment Variables:".cyan());
    for (key, _) in entries(&session.config) {
        println!("  {}", format_env_var(key));
    }

    Ok(())
}

fn entries(config: &Config) -> Vec<(&'static str, String)> {
    vec![
        ("base_url", config.base_url().to_string()),
        (
            "credentials",
            config
                .credentials_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string()),
        ),
        ("upload_bucket_url", config.upload_bucket_url.clone()),
        ("poll_interval_secs", config.poll_interval.as_secs().to_string()),
        (
            "poll_timeout_secs",
            config
                .poll_timeout
                .map(|timeout| timeout.as_secs().to_string())
                .unwrap_or_else(|| "(untimed)".to_string()),
        ),
        ("api_timeout_secs", config.api_timeout.as_secs().to_string()),
        ("job_lookup_attempts", config.job_lookup_attempts.to_string()),
        ("job_lookup_delay_secs", config.job_lookup_delay.as_secs().to_string()),
        ("batch_pause_secs", config.batch_pause.as_secs().to_string()),
        ("accept_invalid_certs", config.accept_invalid_certs.to_string()),
    ]
}

/// Format config key as environment variable name
fn format_env_var(key: &str) -> String {
    format!("CMD_{}", key.to_uppercase())
}
