use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::MergeArgs;
use crate::commands::{artifact, snippet_path};
use crate::config::CategoryConfig;
use crate::util::{read_text, require_input, write_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Copy,
    SkipUntilHeading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub content: String,
    pub updated_categories: Vec<String>,
}

pub fn run(args: MergeArgs) -> Result<MergeOutcome> {
    require_input(&args.target, "the target index document")?;

    let config = CategoryConfig::load(&args.config)?;
    let snippets = load_snippets(&args.work_dir, &config)?;
    let document = read_text(&args.target)?;

    info!(
        target = %args.target.display(),
        snippets = snippets.len(),
        "applying snippets to target"
    );

    let headings = config
        .categories()
        .iter()
        .map(|category| (category.id.as_str(), category.heading.as_str()))
        .collect::<Vec<(&str, &str)>>();
    let outcome = merge_document(&document, &headings, &snippets);

    for category_id in &outcome.updated_categories {
        let links = snippets
            .get(category_id)
            .map(|snippet| count_bullets(snippet))
            .unwrap_or_default();
        info!(category = %category_id, links, "updated section");
    }

    if outcome.updated_categories.is_empty() {
        bail!(
            "no sections were updated in {}; no changes applied",
            args.target.display()
        );
    }

    let file_name = args
        .target
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid target path: {}", args.target.display()))?;
    let backup_path = artifact(&args.work_dir, &format!("{file_name}.bak"));
    write_text(&backup_path, &document)?;
    info!(path = %backup_path.display(), "wrote target backup");

    write_text(&args.target, &outcome.content)?;
    info!(
        target = %args.target.display(),
        sections_updated = outcome.updated_categories.len(),
        total_links = snippets.values().map(|snippet| count_bullets(snippet)).sum::<usize>(),
        "applied changes"
    );

    Ok(outcome)
}

pub fn load_snippets(
    work_dir: &std::path::Path,
    config: &CategoryConfig,
) -> Result<HashMap<String, String>> {
    let mut snippets = HashMap::new();

    for category in config.categories() {
        let path = snippet_path(work_dir, &category.id);
        if !path.exists() {
            continue;
        }
        let content = read_text(&path)?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            warn!(category = %category.id, path = %path.display(), "snippet file is empty");
            continue;
        }
        snippets.insert(category.id.clone(), trimmed.to_string());
    }

    Ok(snippets)
}

pub fn merge_document(
    document: &str,
    headings: &[(&str, &str)],
    snippets: &HashMap<String, String>,
) -> MergeOutcome {
    // Later entries overwrite earlier ones for identical heading text.
    let category_by_heading = headings
        .iter()
        .map(|(category_id, heading)| (heading.trim(), *category_id))
        .collect::<HashMap<&str, &str>>();

    let mut state = ScanState::Copy;
    let mut lines = Vec::<&str>::new();
    let mut updated_categories = Vec::new();

    for line in document.split('\n') {
        if state == ScanState::SkipUntilHeading {
            if !is_heading_line(line) {
                continue;
            }
            state = ScanState::Copy;
        }

        lines.push(line);

        let snippet = category_by_heading
            .get(line.trim())
            .and_then(|category_id| snippets.get(*category_id).map(|s| (*category_id, s)))
            .filter(|(_, snippet)| !snippet.trim().is_empty());

        if let Some((category_id, snippet)) = snippet {
            lines.push("");
            lines.push(snippet.trim());
            lines.push("");
            updated_categories.push(category_id.to_string());
            state = ScanState::SkipUntilHeading;
        }
    }

    MergeOutcome {
        content: lines.join("\n"),
        updated_categories,
    }
}

pub fn is_heading_line(line: &str) -> bool {
    line.trim().starts_with('#')
}

pub fn count_bullets(snippet: &str) -> usize {
    snippet
        .lines()
        .filter(|line| line.trim().starts_with("- ["))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADINGS: [(&str, &str); 2] = [
        ("1.A", "### 1.A Team Models (centralised, embedded, hybrid)"),
        ("1.B", "### 1.B Capacity & Resource Planning"),
    ];

    fn snippets(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn heading_detection_accepts_any_level() {
        assert!(is_heading_line("# Title"));
        assert!(is_heading_line("  #### 2.A.1 Foundations"));
        assert!(is_heading_line("#nospace"));
        assert!(!is_heading_line("- [link](https://x.com) #tag"));
        assert!(!is_heading_line(""));
    }

    #[test]
    fn replaces_stale_body_up_to_next_heading() {
        let document = "# Index\n\n### 1.A Team Models (centralised, embedded, hybrid)\n\n- [Old](https://old.com)\nTODO\n\n### 1.B Capacity & Resource Planning\n\nKeep me\n";
        let outcome = merge_document(
            document,
            &HEADINGS,
            &snippets(&[("1.A", "- [New](https://new.com)\n")]),
        );

        assert_eq!(
            outcome.content,
            "# Index\n\n### 1.A Team Models (centralised, embedded, hybrid)\n\n- [New](https://new.com)\n\n### 1.B Capacity & Resource Planning\n\nKeep me\n"
        );
        assert_eq!(outcome.updated_categories, vec!["1.A"]);
    }

    #[test]
    fn missing_or_blank_snippet_leaves_section_untouched() {
        let document = "### 1.A Team Models (centralised, embedded, hybrid)\nexisting\n### 1.B Capacity & Resource Planning\nother";
        let outcome = merge_document(document, &HEADINGS, &snippets(&[("1.B", "   \n")]));

        assert_eq!(outcome.content, document);
        assert!(outcome.updated_categories.is_empty());
    }

    #[test]
    fn last_section_is_replaced_to_end_of_document() {
        let document = "  ### 1.B Capacity & Resource Planning  \nold line\nold line 2\n";
        let outcome = merge_document(
            document,
            &HEADINGS,
            &snippets(&[("1.B", "- [A](https://a.com)\n- [B](https://b.com)")]),
        );

        assert_eq!(
            outcome.content,
            "  ### 1.B Capacity & Resource Planning  \n\n- [A](https://a.com)\n- [B](https://b.com)\n"
        );
    }

    #[test]
    fn adjacent_configured_headings_are_both_processed() {
        let document = "### 1.A Team Models (centralised, embedded, hybrid)\n### 1.B Capacity & Resource Planning\nold";
        let outcome = merge_document(
            document,
            &HEADINGS,
            &snippets(&[("1.A", "- [A](https://a.com)"), ("1.B", "- [B](https://b.com)")]),
        );

        assert_eq!(
            outcome.content,
            "### 1.A Team Models (centralised, embedded, hybrid)\n\n- [A](https://a.com)\n\n### 1.B Capacity & Resource Planning\n\n- [B](https://b.com)\n"
        );
        assert_eq!(outcome.updated_categories, vec!["1.A", "1.B"]);
    }

    #[test]
    fn merging_twice_is_byte_identical() {
        let document = "# Index\n### 1.A Team Models (centralised, embedded, hybrid)\nplaceholder\n## Next\n";
        let snippets = snippets(&[("1.A", "- [A](https://a.com)")]);

        let first = merge_document(document, &HEADINGS, &snippets);
        let second = merge_document(&first.content, &HEADINGS, &snippets);
        assert_eq!(first.content, second.content);
    }

    #[test]
    fn identical_heading_text_resolves_to_the_last_configured_category() {
        let headings = [("1.A", "### Shared"), ("1.B", "### Shared")];
        let outcome = merge_document(
            "### Shared\nold",
            &headings,
            &snippets(&[("1.A", "- [A](https://a.com)"), ("1.B", "- [B](https://b.com)")]),
        );
        assert_eq!(outcome.content, "### Shared\n\n- [B](https://b.com)\n");
        assert_eq!(outcome.updated_categories, vec!["1.B"]);
    }

    #[test]
    fn run_fails_without_changes_and_keeps_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("index.md");
        let config = dir.path().join("categories.yml");
        std::fs::write(&target, "### 1.A Team\nplaceholder\n").expect("write target");
        std::fs::write(
            &config,
            "categories:\n  - id: \"1.A\"\n    name: Team\n    heading: \"### 1.A Team\"\n    keywords: [team]\n",
        )
        .expect("write config");

        let err = run(MergeArgs {
            work_dir: dir.path().join("temp"),
            config,
            target: target.clone(),
        })
        .expect_err("no snippets means no changes");
        assert!(err.to_string().contains("no changes applied"));
        assert_eq!(
            std::fs::read_to_string(&target).expect("target readable"),
            "### 1.A Team\nplaceholder\n"
        );
    }

    #[test]
    fn run_writes_backup_and_updated_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let work_dir = dir.path().join("temp");
        let target = dir.path().join("index.md");
        let config = dir.path().join("categories.yml");
        std::fs::write(&target, "### 1.A Team\nplaceholder\n").expect("write target");
        std::fs::write(
            &config,
            "categories:\n  - id: \"1.A\"\n    name: Team\n    heading: \"### 1.A Team\"\n    keywords: [team]\n",
        )
        .expect("write config");
        write_text(&snippet_path(&work_dir, "1.A"), "- [Team](https://t.com)\n")
            .expect("write snippet");

        let outcome = run(MergeArgs {
            work_dir: work_dir.clone(),
            config,
            target: target.clone(),
        })
        .expect("merge should succeed");

        assert_eq!(outcome.updated_categories, vec!["1.A"]);
        assert_eq!(
            std::fs::read_to_string(&target).expect("target readable"),
            "### 1.A Team\n\n- [Team](https://t.com)\n"
        );
        assert_eq!(
            std::fs::read_to_string(work_dir.join("index.md.bak")).expect("backup readable"),
            "### 1.A Team\nplaceholder\n"
        );
    }
}
