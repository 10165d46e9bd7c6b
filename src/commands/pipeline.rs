use anyhow::{Context, Result};
use tracing::info;

use crate::cli::PipelineArgs;
use crate::commands::{categorize, extract, merge, normalize, qa, snippets};

pub fn run(args: PipelineArgs) -> Result<()> {
    info!(
        source = %args.source.display(),
        target = %args.target.display(),
        work_dir = %args.work_dir.display(),
        "starting pipeline"
    );

    let raw = extract::run(args.extract()).context("extract stage failed")?;
    let normalized = normalize::run(args.work()).context("normalize stage failed")?;
    let categorized = categorize::run(args.config_args()).context("categorize stage failed")?;
    let snippets = snippets::run(args.config_args()).context("snippets stage failed")?;
    let merged = merge::run(args.merge()).context("merge stage failed")?;
    let report = qa::run(args.config_args()).context("qa stage failed")?;

    info!(
        extracted = raw.len(),
        valid = normalized.valid,
        added = categorized.total_added,
        snippet_files = snippets.categories_with_links,
        snippet_links = snippets.total_links,
        empty_categories = snippets.missing_categories.len(),
        sections_updated = merged.updated_categories.len(),
        overall_pass = report.overall_pass,
        "pipeline completed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::commands::{CATEGORIZED_FILE, QA_REPORT_JSON_FILE, artifact};
    use crate::model::{Action, CategorizedLink};
    use crate::util::read_json;

    const SOURCE: &str = r#"<html><body>
<h2>Teams</h2>
<p><a href="https://Example.com/Team-Models/?utm_source=newsletter">Team models for design orgs</a></p>
<p><a href="https://weather.example.org/today">Today's weather</a></p>
</body></html>
"#;

    const CONFIG: &str = r####"categories:
  - id: "1.A"
    name: Team Models
    heading: "### 1.A Team Models (centralised, embedded, hybrid)"
    keywords: [team model]
  - id: "1.B"
    name: Capacity & Resource Planning
    heading: "### 1.B Capacity & Resource Planning"
    keywords: [capacity]
"####;

    const TARGET: &str = "# DesignOps Index\n\n### 1.A Team Models (centralised, embedded, hybrid)\n\n_Coming soon_\n\n### 1.B Capacity & Resource Planning\n\n_Coming soon_\n";

    fn seed(dir: &Path) -> PipelineArgs {
        fs::write(dir.join(".source.html"), SOURCE).expect("write source");
        fs::write(dir.join("categories.yml"), CONFIG).expect("write config");
        fs::write(dir.join("index.md"), TARGET).expect("write target");

        PipelineArgs {
            source: dir.join(".source.html"),
            work_dir: dir.join("temp"),
            config: dir.join("categories.yml"),
            target: dir.join("index.md"),
        }
    }

    #[test]
    fn pipeline_merges_matched_link_and_drops_unmatched_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = seed(dir.path());

        run(args.clone()).expect("pipeline should succeed");

        let merged = fs::read_to_string(&args.target).expect("target readable");
        assert_eq!(
            merged,
            "# DesignOps Index\n\n### 1.A Team Models (centralised, embedded, hybrid)\n\n- [Team models for design orgs](https://example.com/team-models)\n\n### 1.B Capacity & Resource Planning\n\n_Coming soon_\n"
        );
        assert!(!merged.contains("weather"));

        let categorized: Vec<CategorizedLink> =
            read_json(&artifact(&args.work_dir, CATEGORIZED_FILE)).expect("categorized written");
        assert_eq!(categorized.len(), 2);
        assert_eq!(categorized[0].action, Action::Added);
        assert_eq!(categorized[1].reason, "no_category_match");

        let report: serde_json::Value =
            read_json(&artifact(&args.work_dir, QA_REPORT_JSON_FILE)).expect("qa written");
        assert_eq!(report["overall_pass"], serde_json::Value::Bool(true));
    }

    #[test]
    fn rerunning_with_identical_inputs_is_byte_identical() {
        let first_dir = tempfile::tempdir().expect("tempdir");
        let second_dir = tempfile::tempdir().expect("tempdir");
        let first = seed(first_dir.path());
        let second = seed(second_dir.path());

        run(first.clone()).expect("first run");
        run(second.clone()).expect("second run");

        for name in [
            "links_raw.json",
            "links_normalized.json",
            "duplicates.json",
            "categorized.json",
            "snippets/1.A.md",
            "qa_report.json",
            "qa_report.md",
        ] {
            let left = fs::read(first.work_dir.join(name)).expect("first artifact");
            let right = fs::read(second.work_dir.join(name)).expect("second artifact");
            assert_eq!(left, right, "{name} differs between runs");
        }

        let merged_once = fs::read(&first.target).expect("target after first run");
        run(first.clone()).expect("rerun over merged target");
        let merged_twice = fs::read(&first.target).expect("target after rerun");
        assert_eq!(merged_once, merged_twice);
        assert_eq!(merged_once, fs::read(&second.target).expect("second target"));
    }

    #[test]
    fn pipeline_stops_at_missing_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = seed(dir.path());
        fs::remove_file(&args.source).expect("remove source");

        assert!(run(args.clone()).is_err());
        assert!(!args.work_dir.join("links_raw.json").exists());
        assert_eq!(
            fs::read_to_string(&args.target).expect("target untouched"),
            TARGET
        );
    }
}
