//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function (or one function
//! per nested subcommand). Commands share a [`Session`].

pub mod batch;
pub mod collect;
pub mod config;
pub mod dataset;
pub mod job;
pub mod login;
pub mod metadata;
pub mod publish;
pub mod recipe;
pub mod status;
pub mod upload;

use crate::api::{ApiClient, PublishingApi};
use crate::auth::Token;
use crate::config::{Config, Credentials};
use crate::error::Result;
use crate::instances::PollOptions;
use crate::pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration and API client shared by every command
pub struct Session {
    pub config: Config,
    api: Arc<dyn PublishingApi>,
}

impl Session {
    /// Build a session from the environment plus command line overrides
    pub fn new(base_url: Option<String>, credentials: Option<PathBuf>) -> Result<Self> {
        let config = Config::from_env()?.with_overrides(base_url, credentials);
        let api = Arc::new(ApiClient::from_config(&config)?);
        Ok(Self { config, api })
    }

    pub fn api(&self) -> Arc<dyn PublishingApi> {
        self.api.clone()
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::load(self.config.credentials_path()?)
    }

    pub async fn login(&self) -> Result<Token> {
        let credentials = self.credentials()?;
        crate::auth::login(self.api.as_ref(), &credentials).await
    }

    /// Pipeline whose import waits stop on Ctrl-C
    pub fn pipeline(&self) -> Pipeline {
        let poll = self.poll_options();
        Pipeline::new(self.api(), &self.config).with_poll_options(poll)
    }

    /// Poll options from the configuration, cancelled on Ctrl-C
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(self.config.poll_interval)
            .with_timeout(self.config.poll_timeout)
            .with_cancel(cancel_on_ctrl_c())
    }
}

/// A token cancelled when the user presses Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling");
            trigger.cancel();
        }
    });

    cancel
}
