//! Seed the category tree from a YAML file.
//!
//! ```yaml
//! - name: Handloom
//!   children:
//!     - name: Sarees
//!     - name: Dupattas
//! - name: Spices
//! ```
//!
//! Slugs come from the names. Categories whose slug already exists are left
//! alone, so the command can be re-run after editing the file.

use std::path::Path;

use serde::Deserialize;

use haat_core::{Slug, SlugError};
use haat_server::db::RepositoryError;
use haat_server::db::categories::CategoryRepository;

use super::{CommandError, connect};

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Category {name:?}: {source}")]
    Slug { name: String, source: SlugError },

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Parent category {0} vanished while seeding")]
    MissingParent(String),
}

/// One node of the category tree.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub children: Vec<Self>,
}

/// Parse a seed file.
///
/// # Errors
///
/// Returns an error if the YAML does not describe a category list.
pub fn parse(content: &str) -> Result<Vec<CategorySeed>, SeedError> {
    Ok(serde_yaml::from_str(content)?)
}

fn slug_for(name: &str) -> Result<Slug, SeedError> {
    Slug::from_title(name).map_err(|source| SeedError::Slug {
        name: name.to_owned(),
        source,
    })
}

/// Check every name produces a slug before touching the database.
fn validate(seeds: &[CategorySeed]) -> Result<usize, SeedError> {
    seeds.iter().try_fold(0, |count, seed| {
        slug_for(&seed.name)?;
        Ok(count + 1 + validate(&seed.children)?)
    })
}

/// Insert the categories in `file_path`, two levels deep.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or a query fails.
pub async fn categories(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.to_owned(),
            source,
        })?;
    let seeds = parse(&content)?;
    let total = validate(&seeds)?;
    tracing::info!(path = %file_path, total, "Parsed category seed file");

    let pool = connect().await?;
    let repo = CategoryRepository::new(&pool);
    let mut inserted = 0usize;

    for seed in &seeds {
        let slug = slug_for(&seed.name)?;
        if repo.create_if_missing(&seed.name, &slug, None).await? {
            inserted += 1;
        }
        let parent = repo
            .get_by_slug(slug.as_str())
            .await?
            .ok_or_else(|| SeedError::MissingParent(slug.to_string()))?;

        for child in &seed.children {
            let child_slug = slug_for(&child.name)?;
            if repo
                .create_if_missing(&child.name, &child_slug, Some(parent.id))
                .await?
            {
                inserted += 1;
            }
            if !child.children.is_empty() {
                tracing::warn!(category = %child.name, "Only two levels are seeded, skipping deeper entries");
            }
        }
    }

    tracing::info!(inserted, skipped = total - inserted, "Category seeding complete");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_categories() {
        let seeds = parse(
            "- name: Handloom\n  children:\n    - name: Sarees\n- name: Spices\n",
        )
        .unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].children[0].name, "Sarees");
        assert!(seeds[1].children.is_empty());
        assert_eq!(validate(&seeds).unwrap(), 3);
    }

    #[test]
    fn test_validate_rejects_unsluggable_name() {
        let seeds = parse("- name: \"!!!\"\n").unwrap();
        assert!(matches!(validate(&seeds), Err(SeedError::Slug { .. })));
    }

    #[test]
    fn test_bundled_seed_file_parses() {
        let seeds = parse(include_str!("../../seeds/categories.yaml")).unwrap();
        assert!(validate(&seeds).unwrap() > 0);
    }
}
