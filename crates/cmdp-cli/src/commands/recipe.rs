//! `cmdp recipe` command implementation

use super::Session;
use crate::error::{CmdError, Result};
use crate::recipes::{code_list as new_code_list, recipe_template, RecipeResolver};
use cmdp_common::types::Recipe;
use colored::Colorize;
use std::path::Path;

/// Print a recipe as JSON
pub async fn show(session: &Session, key: &str, by_id: bool) -> Result<()> {
    let token = session.login().await?;
    let resolver = RecipeResolver::new(session.api());

    let recipe = if by_id {
        resolver.by_id(&token, key).await?
    } else {
        resolver.resolve(&token, key).await?
    };

    println!("{}", serde_json::to_string_pretty(&recipe)?);
    Ok(())
}

/// Print or write an empty recipe
pub fn template(output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&recipe_template())?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("{} Recipe template written to {}", "✓".green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Create a recipe from a filled-in template
pub async fn create(session: &Session, file: &Path) -> Result<()> {
    let recipe = read_json::<Recipe>(file)?;
    let token = session.login().await?;

    RecipeResolver::new(session.api())
        .create(&token, &recipe)
        .await?;

    println!("{} Recipe {} created", "✓".green(), recipe.id.bold());
    Ok(())
}

pub async fn editions(session: &Session, dataset_id: &str, editions: Vec<String>) -> Result<()> {
    let token = session.login().await?;
    let updated = RecipeResolver::new(session.api())
        .update_editions(&token, dataset_id, editions)
        .await?;

    println!(
        "{} Editions of {}: {}",
        "✓".green(),
        dataset_id.bold(),
        updated.join(", ")
    );
    Ok(())
}

pub async fn code_list(
    session: &Session,
    dataset_id: &str,
    code_list_id: &str,
    label: &str,
    is_hierarchy: Option<bool>,
) -> Result<()> {
    let token = session.login().await?;
    let entry = new_code_list(code_list_id, label, is_hierarchy);

    RecipeResolver::new(session.api())
        .update_code_list(&token, dataset_id, &entry)
        .await?;

    println!("{} Code list {} updated", "✓".green(), code_list_id.bold());
    Ok(())
}

pub async fn update(session: &Session, dataset_id: &str, changes_file: &Path) -> Result<()> {
    let changes = read_json::<serde_json::Value>(changes_file)?;
    let token = session.login().await?;

    let recipe = RecipeResolver::new(session.api())
        .update(&token, dataset_id, &changes)
        .await?;

    println!("{} Recipe {} updated", "✓".green(), recipe.id.bold());
    println!("{}", serde_json::to_string_pretty(&recipe)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(CmdError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_template_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.json");

        template(Some(&path)).unwrap();

        let written: Recipe = read_json(&path).unwrap();
        assert_eq!(written, recipe_template());
    }

    #[test]
    fn test_read_json_missing_file() {
        let err = read_json::<Recipe>(Path::new("/no/such/recipe.json")).unwrap_err();
        assert!(matches!(err, CmdError::FileNotFound(_)));
    }
}
