//! `cmdp login` command implementation

use super::Session;
use crate::error::Result;
use colored::Colorize;

/// Log in and report success; the token is not stored
pub async fn run(session: &Session) -> Result<()> {
    let credentials = session.credentials()?;
    crate::auth::login(session.api().as_ref(), &credentials).await?;

    println!(
        "{} Logged in to {} as {}",
        "✓".green(),
        session.config.base_url().cyan(),
        credentials.email.bold()
    );
    Ok(())
}
