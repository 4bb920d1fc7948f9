//! Recipe resolution and maintenance
//!
//! Recipes are resolved by a linear scan over the full, paginated recipe
//! collection: the first recipe with an output instance for the dataset wins.

use crate::api::{fetch_all_pages, EditionsUpdate, PublishingApi};
use crate::auth::Token;
use crate::error::{CmdError, Result};
use cmdp_common::types::{CodeList, OutputInstance, Recipe, RecipeFile};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Base of the code-list hrefs written into new recipes
pub const CODE_LIST_HREF_BASE: &str = "http://localhost:22400/code-lists";

// Placeholder values of the recipe template; a new recipe must replace them all
const TEMPLATE_ALIAS: &str = "Alias of dataset";
const TEMPLATE_DESCRIPTION: &str = "DescriptionOfDataset";
const TEMPLATE_ID: &str = "unique-string-of-characters";
const TEMPLATE_DATASET_ID: &str = "id-of-dataset";
const TEMPLATE_TITLE: &str = "Title of dataset";

/// What the upload phase needs to know about a dataset's recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeInfo {
    pub dataset_id: String,
    pub recipe_id: String,
    /// Alias attached to job files
    pub recipe_alias: String,
}

/// First recipe producing `dataset_id`.
pub fn find_recipe<'a>(recipes: &'a [Recipe], dataset_id: &str) -> Result<&'a Recipe> {
    recipes
        .iter()
        .find(|recipe| recipe.produces(dataset_id))
        .ok_or_else(|| CmdError::not_found(format!("no recipe for dataset '{}'", dataset_id)))
}

/// Looks up recipes on the platform
#[derive(Clone)]
pub struct RecipeResolver {
    api: Arc<dyn PublishingApi>,
}

impl RecipeResolver {
    pub fn new(api: Arc<dyn PublishingApi>) -> Self {
        Self { api }
    }

    /// Every recipe, across all pages
    pub async fn all_recipes(&self, token: &Token) -> Result<Vec<Recipe>> {
        let api = self.api.as_ref();
        fetch_all_pages(move |offset| api.recipes_page(token, offset)).await
    }

    #[instrument(skip(self, token))]
    pub async fn resolve(&self, token: &Token, dataset_id: &str) -> Result<Recipe> {
        let recipes = self.all_recipes(token).await?;
        debug!(count = recipes.len(), "Fetched recipes");
        find_recipe(&recipes, dataset_id).cloned()
    }

    pub async fn ensure_exists(&self, token: &Token, dataset_id: &str) -> Result<()> {
        self.resolve(token, dataset_id).await.map(|_| ())
    }

    pub async fn info(&self, token: &Token, dataset_id: &str) -> Result<RecipeInfo> {
        let recipe = self.resolve(token, dataset_id).await?;
        recipe_info(&recipe, dataset_id)
    }

    pub async fn by_id(&self, token: &Token, recipe_id: &str) -> Result<Recipe> {
        self.api.recipe(token, recipe_id).await
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Replace top-level fields of the recipe producing `dataset_id`.
    pub async fn update(
        &self,
        token: &Token,
        dataset_id: &str,
        changes: &serde_json::Value,
    ) -> Result<Recipe> {
        if !changes.is_object() {
            return Err(CmdError::precondition("recipe changes must be a JSON object"));
        }

        let recipe = self.resolve(token, dataset_id).await?;
        self.api.update_recipe(token, &recipe.id, changes).await?;
        info!(recipe_id = %recipe.id, "Recipe updated");

        self.api.recipe(token, &recipe.id).await
    }

    /// Replace the editions of the output instance producing `dataset_id`.
    pub async fn update_editions(
        &self,
        token: &Token,
        dataset_id: &str,
        editions: Vec<String>,
    ) -> Result<Vec<String>> {
        if editions.is_empty() {
            return Err(CmdError::precondition("at least one edition is required"));
        }

        let recipe = self.resolve(token, dataset_id).await?;
        self.api
            .update_recipe_editions(token, &recipe.id, dataset_id, &EditionsUpdate { editions })
            .await?;
        info!(recipe_id = %recipe.id, "Recipe editions updated");

        let updated = self.api.recipe(token, &recipe.id).await?;
        Ok(updated
            .output_for(dataset_id)
            .map(|output| output.editions.clone())
            .unwrap_or_default())
    }

    /// Replace one code list of the output instance producing `dataset_id`.
    pub async fn update_code_list(
        &self,
        token: &Token,
        dataset_id: &str,
        code_list: &CodeList,
    ) -> Result<()> {
        let recipe = self.resolve(token, dataset_id).await?;
        self.api
            .update_code_list(token, &recipe.id, dataset_id, code_list)
            .await?;
        info!(recipe_id = %recipe.id, code_list = %code_list.id, "Code list updated");
        Ok(())
    }

    /// Validate and create a new recipe.
    pub async fn create(&self, token: &Token, recipe: &Recipe) -> Result<()> {
        validate_new_recipe(recipe)?;
        self.api.create_recipe(token, recipe).await?;
        info!(recipe_id = %recipe.id, "Recipe created");
        Ok(())
    }
}

/// Recipe id and file alias for `dataset_id`
pub fn recipe_info(recipe: &Recipe, dataset_id: &str) -> Result<RecipeInfo> {
    let alias = recipe.file_alias().ok_or_else(|| {
        CmdError::precondition(format!("recipe '{}' lists no input files", recipe.id))
    })?;

    Ok(RecipeInfo {
        dataset_id: dataset_id.to_string(),
        recipe_id: recipe.id.clone(),
        recipe_alias: alias.to_string(),
    })
}

/// A recipe with every field set to its placeholder
pub fn recipe_template() -> Recipe {
    Recipe {
        id: TEMPLATE_ID.to_string(),
        alias: TEMPLATE_ALIAS.to_string(),
        format: "v4".to_string(),
        files: vec![RecipeFile {
            description: TEMPLATE_DESCRIPTION.to_string(),
        }],
        output_instances: vec![OutputInstance {
            dataset_id: TEMPLATE_DATASET_ID.to_string(),
            title: TEMPLATE_TITLE.to_string(),
            editions: Vec::new(),
            code_lists: Vec::new(),
        }],
    }
}

/// Code list entry for a new recipe
pub fn code_list(id: &str, label: &str, is_hierarchy: Option<bool>) -> CodeList {
    CodeList {
        id: id.to_string(),
        name: label.to_lowercase(),
        href: format!("{}/{}", CODE_LIST_HREF_BASE, id),
        is_hierarchy,
    }
}

/// Check that a new recipe replaced every template placeholder.
pub fn validate_new_recipe(recipe: &Recipe) -> Result<()> {
    let fail = |msg: &str| Err(CmdError::precondition(format!("new recipe: {}", msg)));

    if recipe.alias.trim().is_empty() || recipe.alias == TEMPLATE_ALIAS {
        return fail("alias needs updating");
    }
    if recipe.id.trim().is_empty() || recipe.id == TEMPLATE_ID {
        return fail("id needs updating");
    }
    match recipe.files.first() {
        None => return fail("at least one file is required"),
        Some(file) if file.description == TEMPLATE_DESCRIPTION => {
            return fail("file description needs updating")
        }
        Some(_) => {}
    }

    let Some(output) = recipe.output_instances.first() else {
        return fail("at least one output instance is required");
    };
    if output.dataset_id.trim().is_empty() || output.dataset_id == TEMPLATE_DATASET_ID {
        return fail("dataset_id needs updating");
    }
    if output.title == TEMPLATE_TITLE {
        return fail("title needs updating");
    }
    if output.editions.is_empty() {
        return fail("recipe needs at least one edition");
    }
    if output.code_lists.is_empty() {
        return fail("code lists need updating");
    }

    Ok(())
}
