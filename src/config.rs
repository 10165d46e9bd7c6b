use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

use crate::util::read_text;

pub const KNOWN_CATEGORY_IDS: [&str; 14] = [
    "1.A", "1.B", "1.C", "1.D", "2.A.1", "2.A.2", "2.A.3", "2.B", "2.C", "2.D", "3.A", "3.B",
    "3.C", "3.D",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub heading: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    categories: Vec<Category>,
}

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    categories: Vec<Category>,
}

impl CategoryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("category configuration {} not found", path.display());
        }
        let raw = read_text(path)?;
        Self::from_yaml(&raw).with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let file: CategoryFile =
            serde_yaml::from_str(raw).context("failed to parse category yaml")?;
        Self::new(file.categories)
    }

    pub fn new(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            bail!("category list is empty");
        }

        let mut seen = HashSet::new();
        for category in &categories {
            if !KNOWN_CATEGORY_IDS.contains(&category.id.as_str()) {
                bail!("unknown category id '{}'", category.id);
            }
            if !seen.insert(category.id.as_str()) {
                bail!("duplicate category id '{}'", category.id);
            }
            if category.heading.trim().is_empty() {
                bail!("category '{}' has an empty heading", category.id);
            }
            if category.keywords.is_empty() {
                warn!(category = %category.id, "category has no keywords and will never match");
            }
        }

        for known in KNOWN_CATEGORY_IDS {
            if !seen.contains(known) {
                warn!(category = known, "known category missing from configuration");
            }
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }
}

#[cfg(test)]
pub(crate) fn test_category(id: &str, heading: &str, keywords: &[&str]) -> Category {
    Category {
        id: id.to_string(),
        name: format!("Category {id}"),
        heading: heading.to_string(),
        keywords: keywords.iter().map(|keyword| keyword.to_string()).collect(),
    }
}
