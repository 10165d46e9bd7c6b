use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use tracing::info;

use crate::cli::ConfigArgs;
use crate::commands::{CATEGORIZED_FILE, DUPLICATES_FILE, NORMALIZED_LINKS_FILE, artifact};
use crate::config::{Category, CategoryConfig};
use crate::model::{Action, CategorizeSummary, CategorizedLink, DuplicateGroup, NormalizedLink};
use crate::util::{read_json, require_input, write_json_pretty};

pub fn run(args: ConfigArgs) -> Result<CategorizeSummary> {
    let normalized_path = artifact(&args.work_dir, NORMALIZED_LINKS_FILE);
    let duplicates_path = artifact(&args.work_dir, DUPLICATES_FILE);
    require_input(&normalized_path, "linksort normalize")?;
    require_input(&duplicates_path, "linksort normalize")?;

    let config = CategoryConfig::load(&args.config)?;
    let links: Vec<NormalizedLink> = read_json(&normalized_path)?;
    let duplicates: Vec<DuplicateGroup> = read_json(&duplicates_path)?;

    info!(
        links = links.len(),
        categories = config.categories().len(),
        "categorizing links"
    );

    let categorizer = Categorizer::new(config.categories(), &duplicates);
    let categorized = links
        .iter()
        .map(|link| categorizer.categorize(link))
        .collect::<Vec<CategorizedLink>>();

    let summary = summarize(&categorized);
    info!(
        total = summary.total_processed,
        added = summary.total_added,
        skipped = summary.total_skipped,
        "categorization results"
    );
    for (category_id, count) in &summary.category_counts {
        let category_name = config
            .get(category_id)
            .map(|category| category.name.as_str())
            .unwrap_or_default();
        info!(category = %category_id, category_name, count, "links added");
    }
    for (reason, count) in &summary.skip_counts {
        info!(reason = %reason, count, "links skipped");
    }

    let output_path = artifact(&args.work_dir, CATEGORIZED_FILE);
    write_json_pretty(&output_path, &categorized)?;
    info!(path = %output_path.display(), "wrote categorized links");

    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    category_id: String,
    keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: &Category) -> Self {
        Self {
            category_id: category.id.clone(),
            keywords: category.keywords.clone(),
        }
    }

    pub fn matched_keyword(&self, haystack: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|keyword| !keyword.is_empty() && haystack.contains(&keyword.to_lowercase()))
            .map(String::as_str)
    }
}

pub struct Categorizer {
    rules: Vec<CategoryRule>,
    canonical_by_url: HashMap<String, String>,
}

impl Categorizer {
    pub fn new(categories: &[Category], duplicates: &[DuplicateGroup]) -> Self {
        Self {
            rules: categories.iter().map(CategoryRule::new).collect(),
            canonical_by_url: duplicate_lookup(duplicates),
        }
    }

    pub fn categorize(&self, link: &NormalizedLink) -> CategorizedLink {
        let skipped = |reason: String| CategorizedLink {
            id: link.id.clone(),
            href_norm: link.href_norm.clone(),
            text_final: link.text_norm.clone(),
            category: None,
            action: Action::Skipped,
            reason,
        };

        let href_norm = match (&link.href_norm, link.valid_url) {
            (Some(href_norm), true) => href_norm,
            _ => {
                let reason = link.invalid_reason.as_deref().unwrap_or("unknown");
                return skipped(format!("invalid_url:{reason}"));
            }
        };

        if let Some(canonical_id) = self.canonical_by_url.get(href_norm) {
            if canonical_id != &link.id {
                return skipped(format!("duplicate_of:{canonical_id}"));
            }
        }

        let haystack = format!("{href_norm} {}", link.text_norm).to_lowercase();
        let mut matches = self
            .rules
            .iter()
            .filter_map(|rule| {
                rule.matched_keyword(&haystack)
                    .map(|keyword| (rule.category_id.as_str(), keyword))
            });

        let Some((category_id, keyword)) = matches.next() else {
            return skipped("no_category_match".to_string());
        };

        let also_matched = matches.map(|(id, _)| id).collect::<Vec<&str>>();
        let reason = if also_matched.is_empty() {
            format!("matched_keyword:{keyword}")
        } else {
            format!(
                "matched_keyword:{keyword} (also_matched:{})",
                also_matched.join(",")
            )
        };

        CategorizedLink {
            id: link.id.clone(),
            href_norm: Some(href_norm.clone()),
            text_final: link.text_norm.clone(),
            category: Some(category_id.to_string()),
            action: Action::Added,
            reason,
        }
    }
}

pub fn duplicate_lookup(groups: &[DuplicateGroup]) -> HashMap<String, String> {
    groups
        .iter()
        .map(|group| (group.href_norm.clone(), group.canonical_id.clone()))
        .collect()
}

fn summarize(links: &[CategorizedLink]) -> CategorizeSummary {
    let mut category_counts = BTreeMap::<String, usize>::new();
    let mut skip_counts = BTreeMap::<String, usize>::new();

    for link in links {
        match (link.action, &link.category) {
            (Action::Added, Some(category)) => {
                *category_counts.entry(category.clone()).or_default() += 1;
            }
            _ => {
                *skip_counts.entry(link.reason_kind().to_string()).or_default() += 1;
            }
        }
    }

    let total_added: usize = category_counts.values().sum();
    CategorizeSummary {
        total_processed: links.len(),
        total_added,
        total_skipped: links.len() - total_added,
        category_counts: category_counts.into_iter().collect(),
        skip_counts: skip_counts.into_iter().collect(),
    }
}
