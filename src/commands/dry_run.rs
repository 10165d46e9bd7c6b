use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::MergeArgs;
use crate::commands::merge::{count_bullets, load_snippets};
use crate::commands::{DRY_RUN_REPORT_FILE, artifact};
use crate::config::CategoryConfig;
use crate::util::{read_text, require_input, write_json_pretty};

#[derive(Debug, Serialize)]
pub struct DryRunReport {
    pub validation_passed: bool,
    pub total_headings_found: usize,
    pub total_expected_headings: usize,
    pub total_categories_with_links: usize,
    pub total_links_to_add: usize,
    pub unique_links: usize,
    pub categories: Vec<DryRunCategory>,
    pub validation_errors: Vec<String>,
    pub validation_warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DryRunCategory {
    pub category_id: String,
    pub heading_found: bool,
    pub heading_text: String,
    pub link_count: usize,
    pub will_be_updated: bool,
}

pub fn run(args: MergeArgs) -> Result<DryRunReport> {
    require_input(&args.target, "the target index document")?;

    let config = CategoryConfig::load(&args.config)?;
    let snippets = load_snippets(&args.work_dir, &config)?;
    let document = read_text(&args.target)?;

    info!(target = %args.target.display(), "performing dry-run validation");

    let report = build_report(&document, &config, &snippets)?;

    let report_path = artifact(&args.work_dir, DRY_RUN_REPORT_FILE);
    write_json_pretty(&report_path, &report)?;

    for error in &report.validation_errors {
        warn!(error = %error, "dry-run validation error");
    }
    info!(
        headings_found = report.total_headings_found,
        headings_expected = report.total_expected_headings,
        categories_with_links = report.total_categories_with_links,
        links_to_add = report.total_links_to_add,
        unique_urls = report.unique_links,
        path = %report_path.display(),
        "dry-run summary"
    );

    if !report.validation_passed {
        bail!(
            "dry-run validation failed with {} error(s)",
            report.validation_errors.len()
        );
    }

    Ok(report)
}

pub fn build_report(
    document: &str,
    config: &CategoryConfig,
    snippets: &HashMap<String, String>,
) -> Result<DryRunReport> {
    let link_pattern =
        Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").context("failed to compile markdown link regex")?;

    let present_headings = document.lines().map(str::trim).collect::<HashSet<&str>>();

    let mut validation_errors = Vec::new();
    let mut categories = Vec::with_capacity(config.categories().len());
    let mut missing_headings = Vec::new();

    for category in config.categories() {
        let heading_found = present_headings.contains(category.heading.trim());
        if !heading_found {
            missing_headings.push(format!("{}: {}", category.id, category.heading));
        }
        let link_count = snippets
            .get(&category.id)
            .map(|snippet| count_bullets(snippet))
            .unwrap_or_default();

        categories.push(DryRunCategory {
            category_id: category.id.clone(),
            heading_found,
            heading_text: category.heading.clone(),
            link_count,
            will_be_updated: heading_found && link_count > 0,
        });
    }

    if !missing_headings.is_empty() {
        validation_errors.push(format!("Missing headings: {}", missing_headings.join("; ")));
    }

    let mut seen_urls = HashSet::new();
    let mut duplicate_urls = Vec::new();
    for category in config.categories() {
        let Some(snippet) = snippets.get(&category.id) else {
            continue;
        };
        for captures in link_pattern.captures_iter(snippet) {
            let Some(url) = captures.get(2).map(|m| m.as_str()) else {
                continue;
            };
            if !seen_urls.insert(url.to_string()) {
                duplicate_urls.push(format!("Duplicate URL {url} in category {}", category.id));
            }
        }
    }
    if !duplicate_urls.is_empty() {
        validation_errors.push(format!(
            "Would introduce duplicates: {}",
            duplicate_urls.join("; ")
        ));
    }

    Ok(DryRunReport {
        validation_passed: validation_errors.is_empty(),
        total_headings_found: categories.iter().filter(|c| c.heading_found).count(),
        total_expected_headings: categories.len(),
        total_categories_with_links: categories.iter().filter(|c| c.link_count > 0).count(),
        total_links_to_add: categories.iter().map(|c| c.link_count).sum(),
        unique_links: seen_urls.len(),
        categories,
        validation_errors,
        validation_warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::commands::snippet_path;
    use crate::config::test_category;
    use crate::util::write_text;

    fn config() -> CategoryConfig {
        CategoryConfig::new(vec![
            test_category("1.A", "### 1.A Team", &["team"]),
            test_category("1.B", "### 1.B Capacity", &["hiring"]),
        ])
        .expect("valid config")
    }

    fn snippets(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn passes_when_headings_exist_and_urls_are_unique() {
        let report = build_report(
            "# Index\n### 1.A Team\n\n### 1.B Capacity\n",
            &config(),
            &snippets(&[("1.A", "- [A](https://a.com)\n- [B](https://b.com)")]),
        )
        .expect("report builds");

        assert!(report.validation_passed);
        assert_eq!(report.total_headings_found, 2);
        assert_eq!(report.total_links_to_add, 2);
        assert_eq!(report.total_categories_with_links, 1);
        assert!(report.categories[0].will_be_updated);
        assert!(!report.categories[1].will_be_updated);
    }

    #[test]
    fn reports_missing_headings_and_cross_snippet_duplicates() {
        let report = build_report(
            "### 1.A Team\n",
            &config(),
            &snippets(&[
                ("1.A", "- [A](https://a.com)"),
                ("1.B", "- [Again](https://a.com)"),
            ]),
        )
        .expect("report builds");

        assert!(!report.validation_passed);
        assert_eq!(report.validation_errors.len(), 2);
        assert!(report.validation_errors[0].contains("1.B: ### 1.B Capacity"));
        assert!(report.validation_errors[1].contains("https://a.com in category 1.B"));
        assert_eq!(report.unique_links, 1);
    }

    fn stage_args(dir: &Path, target: Option<&str>) -> MergeArgs {
        let config = dir.join("categories.yml");
        fs::write(
            &config,
            "categories:\n  - id: \"1.A\"\n    name: Team\n    heading: \"### 1.A Team\"\n    keywords: [team]\n  - id: \"1.B\"\n    name: Capacity\n    heading: \"### 1.B Capacity\"\n    keywords: [hiring]\n",
        )
        .expect("write config");
        let target_path = dir.join("index.md");
        if let Some(content) = target {
            fs::write(&target_path, content).expect("write target");
        }
        MergeArgs {
            work_dir: dir.join("temp"),
            config,
            target: target_path,
        }
    }

    #[test]
    fn run_fails_on_validation_errors_but_keeps_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = "### 1.A Team\nplaceholder\n";
        let args = stage_args(dir.path(), Some(target));
        write_text(&snippet_path(&args.work_dir, "1.A"), "- [A](https://a.com)\n")
            .expect("write snippet");

        let err = run(args.clone()).expect_err("missing heading should fail validation");
        assert!(err.to_string().contains("dry-run validation failed"));
        assert!(artifact(&args.work_dir, DRY_RUN_REPORT_FILE).exists());
        assert_eq!(
            fs::read_to_string(&args.target).expect("target readable"),
            target
        );
    }

    #[test]
    fn run_passes_and_never_writes_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = "### 1.A Team\nplaceholder\n### 1.B Capacity\n";
        let args = stage_args(dir.path(), Some(target));
        write_text(&snippet_path(&args.work_dir, "1.A"), "- [A](https://a.com)\n")
            .expect("write snippet");

        let report = run(args.clone()).expect("dry-run should pass");
        assert!(report.validation_passed);
        assert_eq!(report.total_links_to_add, 1);
        assert_eq!(
            fs::read_to_string(&args.target).expect("target readable"),
            target
        );
    }

    #[test]
    fn run_requires_target_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = stage_args(dir.path(), None);

        assert!(run(args.clone()).is_err());
        assert!(!artifact(&args.work_dir, DRY_RUN_REPORT_FILE).exists());
    }
}
