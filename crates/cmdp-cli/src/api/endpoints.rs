//! API endpoint URL builders
//!
//! Helper functions to construct publishing platform URLs. Path segments that
//! come from user input (edition names, collection names) are percent-encoded.

use urlencoding::encode;

/// Build login URL
pub fn login_url(base_url: &str) -> String {
    format!("{}/zebedee/login", base_url)
}

// ============================================================================
// Recipes
// ============================================================================

/// Build recipe list URL for one page
pub fn recipes_url(base_url: &str, limit: u32, offset: u32) -> String {
    format!("{}/recipes?limit={}&offset={}", base_url, limit, offset)
}

/// Build recipe creation URL
pub fn recipe_create_url(base_url: &str) -> String {
    format!("{}/recipes", base_url)
}

pub fn recipe_url(base_url: &str, recipe_id: &str) -> String {
    format!("{}/recipes/{}", base_url, encode(recipe_id))
}

/// Build URL of one output instance of a recipe
pub fn recipe_instance_url(base_url: &str, recipe_id: &str, dataset_id: &str) -> String {
    format!(
        "{}/recipes/{}/instances/{}",
        base_url,
        encode(recipe_id),
        encode(dataset_id)
    )
}

pub fn recipe_code_list_url(
    base_url: &str,
    recipe_id: &str,
    dataset_id: &str,
    code_list_id: &str,
) -> String {
    format!(
        "{}/code-lists/{}",
        recipe_instance_url(base_url, recipe_id, dataset_id),
        encode(code_list_id)
    )
}

// ============================================================================
// Uploads and jobs
// ============================================================================

pub fn upload_url(base_url: &str) -> String {
    format!("{}/upload", base_url)
}

/// Build job collection URL (POST target)
pub fn jobs_url(base_url: &str) -> String {
    format!("{}/dataset/jobs", base_url)
}

/// Build job list URL for one page
pub fn jobs_page_url(base_url: &str, limit: u32, offset: u32) -> String {
    format!("{}?limit={}&offset={}", jobs_url(base_url), limit, offset)
}

pub fn job_url(base_url: &str, job_id: &str) -> String {
    format!("{}/{}", jobs_url(base_url), encode(job_id))
}

pub fn job_files_url(base_url: &str, job_id: &str) -> String {
    format!("{}/files", job_url(base_url, job_id))
}

// ============================================================================
// Instances and datasets
// ============================================================================

/// Build instance list URL for one page
pub fn instances_page_url(base_url: &str, limit: u32, offset: u32) -> String {
    format!(
        "{}/dataset/instances?limit={}&offset={}",
        base_url, limit, offset
    )
}

pub fn instance_url(base_url: &str, instance_id: &str) -> String {
    format!("{}/dataset/instances/{}", base_url, encode(instance_id))
}

pub fn instance_dimension_url(base_url: &str, instance_id: &str, dimension: &str) -> String {
    format!(
        "{}/dimensions/{}",
        instance_url(base_url, instance_id),
        encode(dimension)
    )
}

pub fn dataset_url(base_url: &str, dataset_id: &str) -> String {
    format!("{}/dataset/datasets/{}", base_url, encode(dataset_id))
}

pub fn dataset_version_url(base_url: &str, dataset_id: &str, edition: &str, version: u32) -> String {
    format!(
        "{}/editions/{}/versions/{}",
        dataset_url(base_url, dataset_id),
        encode(edition),
        version
    )
}

// ============================================================================
// Collections
// ============================================================================

/// Build collection creation URL
pub fn collection_create_url(base_url: &str) -> String {
    format!("{}/zebedee/collection", base_url)
}

/// Build collection lookup URL from a normalized collection name
pub fn collection_url(base_url: &str, normalized_name: &str) -> String {
    format!("{}/{}", collection_create_url(base_url), encode(normalized_name))
}

pub fn collection_dataset_url(base_url: &str, collection_id: &str, dataset_id: &str) -> String {
    format!(
        "{}/zebedee/collections/{}/datasets/{}",
        base_url,
        encode(collection_id),
        encode(dataset_id)
    )
}

pub fn collection_version_url(
    base_url: &str,
    collection_id: &str,
    dataset_id: &str,
    edition: &str,
    version: u32,
) -> String {
    format!(
        "{}/editions/{}/versions/{}",
        collection_dataset_url(base_url, collection_id, dataset_id),
        encode(edition),
        version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8081";

    #[test]
    fn test_recipe_urls() {
        assert_eq!(
            recipes_url(BASE, 1000, 2000),
            "http://localhost:8081/recipes?limit=1000&offset=2000"
        );
        assert_eq!(
            recipe_code_list_url(BASE, "r-1", "cpih01", "aggregate"),
            "http://localhost:8081/recipes/r-1/instances/cpih01/code-lists/aggregate"
        );
    }

    #[test]
    fn test_job_urls() {
        assert_eq!(jobs_url(BASE), "http://localhost:8081/dataset/jobs");
        assert_eq!(
            jobs_page_url(BASE, 1000, 0),
            "http://localhost:8081/dataset/jobs?limit=1000&offset=0"
        );
        assert_eq!(
            job_files_url(BASE, "job-9"),
            "http://localhost:8081/dataset/jobs/job-9/files"
        );
    }

    #[test]
    fn test_dataset_version_url_encodes_edition() {
        assert_eq!(
            dataset_version_url(BASE, "cpih01", "time series", 3),
            "http://localhost:8081/dataset/datasets/cpih01/editions/time%20series/versions/3"
        );
    }

    #[test]
    fn test_collection_urls() {
        assert_eq!(
            collection_url(BASE, "cpihoctober"),
            "http://localhost:8081/zebedee/collection/cpihoctober"
        );
        assert_eq!(
            collection_version_url(BASE, "col-1", "cpih01", "time-series", 2),
            "http://localhost:8081/zebedee/collections/col-1/datasets/cpih01/editions/time-series/versions/2"
        );
    }

    #[test]
    fn test_instance_dimension_url() {
        assert_eq!(
            instance_dimension_url(BASE, "inst-1", "aggregate"),
            "http://localhost:8081/dataset/instances/inst-1/dimensions/aggregate"
        );
    }
}
