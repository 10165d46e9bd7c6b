pub mod categorize;
pub mod dry_run;
pub mod extract;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod qa;
pub mod snippets;

use std::path::{Path, PathBuf};

pub const RAW_LINKS_FILE: &str = "links_raw.json";
pub const NORMALIZED_LINKS_FILE: &str = "links_normalized.json";
pub const DUPLICATES_FILE: &str = "duplicates.json";
pub const CATEGORIZED_FILE: &str = "categorized.json";
pub const SNIPPETS_DIR: &str = "snippets";
pub const DRY_RUN_REPORT_FILE: &str = "dry_run_report.json";
pub const QA_REPORT_JSON_FILE: &str = "qa_report.json";
pub const QA_REPORT_MD_FILE: &str = "qa_report.md";

pub fn artifact(work_dir: &Path, name: &str) -> PathBuf {
    work_dir.join(name)
}

pub fn snippet_path(work_dir: &Path, category_id: &str) -> PathBuf {
    work_dir.join(SNIPPETS_DIR).join(format!("{category_id}.md"))
}
