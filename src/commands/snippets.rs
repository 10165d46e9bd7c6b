use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::ConfigArgs;
use crate::commands::{CATEGORIZED_FILE, artifact, snippet_path};
use crate::config::{CategoryConfig, KNOWN_CATEGORY_IDS};
use crate::model::{Action, CategorizedLink, SnippetSummary};
use crate::util::{read_json, require_input, write_text};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetEntry {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub category_id: String,
    pub entries: Vec<SnippetEntry>,
    pub rendered_text: String,
}

pub fn run(args: ConfigArgs) -> Result<SnippetSummary> {
    let categorized_path = artifact(&args.work_dir, CATEGORIZED_FILE);
    require_input(&categorized_path, "linksort categorize")?;

    let config = CategoryConfig::load(&args.config)?;
    let links: Vec<CategorizedLink> = read_json(&categorized_path)?;

    let snippets = build_snippets(&links);
    info!(categories = snippets.len(), "generating snippets");

    let mut total_links = 0;
    for snippet in &snippets {
        let path = snippet_path(&args.work_dir, &snippet.category_id);
        write_text(&path, &snippet.rendered_text)?;
        total_links += snippet.entries.len();
        info!(
            category = %snippet.category_id,
            links = snippet.entries.len(),
            path = %path.display(),
            "wrote snippet"
        );
    }

    for category in config.categories() {
        if snippets.iter().any(|snippet| snippet.category_id == category.id) {
            continue;
        }
        let path = snippet_path(&args.work_dir, &category.id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove stale snippet {}", path.display()))?;
            info!(category = %category.id, path = %path.display(), "removed stale snippet");
        }
    }

    let missing_categories = KNOWN_CATEGORY_IDS
        .iter()
        .filter(|id| !snippets.iter().any(|snippet| snippet.category_id == **id))
        .map(|id| id.to_string())
        .collect::<Vec<String>>();
    if !missing_categories.is_empty() {
        info!(
            categories = %missing_categories.join(", "),
            "no links found for categories"
        );
    }

    info!(
        snippet_files = snippets.len(),
        total_links, "snippet generation completed"
    );

    Ok(SnippetSummary {
        categories_with_links: snippets.len(),
        total_links,
        missing_categories,
    })
}

pub fn build_snippets(links: &[CategorizedLink]) -> Vec<Snippet> {
    let mut grouped = BTreeMap::<&str, Vec<SnippetEntry>>::new();

    for link in links {
        if link.action != Action::Added {
            continue;
        }
        let (Some(category), Some(url)) = (link.category.as_deref(), link.href_norm.as_deref())
        else {
            continue;
        };
        grouped.entry(category).or_default().push(SnippetEntry {
            text: link.text_final.clone(),
            url: url.to_string(),
        });
    }

    grouped
        .into_iter()
        .filter_map(|(category_id, entries)| render(category_id, entries))
        .collect()
}

pub fn render(category_id: &str, mut entries: Vec<SnippetEntry>) -> Option<Snippet> {
    if entries.is_empty() {
        return None;
    }

    entries.sort_by_cached_key(|entry| entry.text.to_lowercase());

    let mut rendered_text = entries
        .iter()
        .map(|entry| format!("- [{}]({})", entry.text, entry.url))
        .collect::<Vec<String>>()
        .join("\n");
    rendered_text.push('\n');

    Some(Snippet {
        category_id: category_id.to_string(),
        entries,
        rendered_text,
    })
}
