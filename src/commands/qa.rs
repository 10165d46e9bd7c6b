use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::ConfigArgs;
use crate::commands::{
    CATEGORIZED_FILE, DUPLICATES_FILE, NORMALIZED_LINKS_FILE, QA_REPORT_JSON_FILE,
    QA_REPORT_MD_FILE, RAW_LINKS_FILE, artifact,
};
use crate::config::{CategoryConfig, KNOWN_CATEGORY_IDS};
use crate::model::{DuplicateGroup, reason_kind};
use crate::util::{read_json, require_input, write_json_pretty, write_text};

pub const CHECK_ALL_LINKS_PROCESSED: &str = "all_links_processed";
pub const CHECK_NORMALIZED_MATCHES_RAW: &str = "normalized_matches_raw";
pub const CHECK_ALL_LINKS_HAVE_ACTION: &str = "all_links_have_action";
pub const CHECK_ADDED_LINKS_HAVE_CATEGORIES: &str = "added_links_have_categories";
pub const CHECK_VALID_CATEGORIES_ONLY: &str = "valid_categories_only";
pub const CHECK_NO_CROSS_CATEGORY_DUPLICATES: &str = "no_cross_category_duplicates";

#[derive(Debug)]
pub struct AuditRawLink {
    pub id: String,
}

#[derive(Debug)]
pub struct AuditNormalizedLink {
    pub id: String,
    pub valid_url: bool,
}

#[derive(Debug)]
pub struct AuditCategorizedLink {
    pub id: String,
    pub href_norm: Option<String>,
    pub text_final: String,
    pub category: Value,
    pub action: Value,
    pub reason: String,
}

impl AuditRawLink {
    pub fn from_record(record: &Value) -> Self {
        Self {
            id: record_id(record),
        }
    }
}

impl AuditNormalizedLink {
    pub fn from_record(record: &Value) -> Self {
        Self {
            id: record_id(record),
            valid_url: record.get("valid_url").and_then(Value::as_bool) == Some(true),
        }
    }
}

impl AuditCategorizedLink {
    pub fn from_record(record: &Value) -> Self {
        Self {
            id: record_id(record),
            href_norm: text_field(record, "href_norm").map(str::to_string),
            text_final: text_field(record, "text_final")
                .unwrap_or_default()
                .to_string(),
            category: record.get("category").cloned().unwrap_or(Value::Null),
            action: record.get("action").cloned().unwrap_or(Value::Null),
            reason: text_field(record, "reason").unwrap_or_default().to_string(),
        }
    }

    fn category_id(&self) -> Option<&str> {
        self.category.as_str()
    }

    fn is_added(&self) -> bool {
        self.action.as_str() == Some("added")
    }

    fn is_skipped(&self) -> bool {
        self.action.as_str() == Some("skipped")
    }
}

fn text_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn record_id(record: &Value) -> String {
    match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => "null".to_string(),
    }
}

fn read_records<T>(path: &Path, from_record: fn(&Value) -> T) -> Result<Vec<T>> {
    let records: Vec<Value> = read_json(path)?;
    Ok(records.iter().map(from_record).collect())
}

pub struct QaInputs {
    pub raw: Vec<AuditRawLink>,
    pub normalized: Vec<AuditNormalizedLink>,
    pub categorized: Vec<AuditCategorizedLink>,
    pub duplicates: Vec<DuplicateGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QaCheck {
    pub name: String,
    pub passed: bool,
    pub offending: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct QaSummary {
    pub total_links_extracted: usize,
    pub total_valid_urls: usize,
    pub total_invalid_urls: usize,
    pub total_links_added: usize,
    pub total_links_skipped: usize,
    pub processing_rate: String,
    pub success_rate: String,
}

#[derive(Debug, Serialize)]
pub struct QaLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct QaCategory {
    pub category_id: String,
    pub link_count: usize,
    pub links: Vec<QaLink>,
}

#[derive(Debug, Serialize)]
pub struct SkipDetail {
    pub id: String,
    pub url: String,
    pub text: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct DuplicatesInfo {
    pub duplicate_url_groups: usize,
    pub total_duplicate_links: usize,
    pub duplicate_details: Vec<DuplicateGroup>,
}

#[derive(Debug, Serialize)]
pub struct QaReport {
    pub overall_pass: bool,
    pub summary: QaSummary,
    pub checks: Vec<QaCheck>,
    pub failed_checks: Vec<String>,
    pub cross_category_duplicate_urls: BTreeMap<String, Vec<String>>,
    pub categories: Vec<QaCategory>,
    pub skip_breakdown: BTreeMap<String, usize>,
    pub skip_details: BTreeMap<String, Vec<SkipDetail>>,
    pub duplicates_info: DuplicatesInfo,
}

#[cfg(test)]
impl QaReport {
    pub fn check(&self, name: &str) -> Option<&QaCheck> {
        self.checks.iter().find(|check| check.name == name)
    }
}

pub fn run(args: ConfigArgs) -> Result<QaReport> {
    let raw_path = artifact(&args.work_dir, RAW_LINKS_FILE);
    let normalized_path = artifact(&args.work_dir, NORMALIZED_LINKS_FILE);
    let categorized_path = artifact(&args.work_dir, CATEGORIZED_FILE);
    let duplicates_path = artifact(&args.work_dir, DUPLICATES_FILE);
    require_input(&raw_path, "linksort extract")?;
    require_input(&normalized_path, "linksort normalize")?;
    require_input(&categorized_path, "linksort categorize")?;
    require_input(&duplicates_path, "linksort normalize")?;

    let config = CategoryConfig::load(&args.config)?;
    let inputs = QaInputs {
        raw: read_records(&raw_path, AuditRawLink::from_record)?,
        normalized: read_records(&normalized_path, AuditNormalizedLink::from_record)?,
        categorized: read_records(&categorized_path, AuditCategorizedLink::from_record)?,
        duplicates: read_json(&duplicates_path)?,
    };

    info!("generating QA report");
    let configured = config
        .categories()
        .iter()
        .map(|category| category.id.as_str())
        .collect::<Vec<&str>>();
    let report = build_report(inputs, &configured);

    let json_path = artifact(&args.work_dir, QA_REPORT_JSON_FILE);
    write_json_pretty(&json_path, &report)?;
    let md_path = artifact(&args.work_dir, QA_REPORT_MD_FILE);
    write_text(&md_path, &render_markdown(&report))?;

    let populated = report
        .categories
        .iter()
        .filter(|category| category.link_count > 0)
        .count();
    let status = if report.overall_pass { "PASS" } else { "FAIL" };
    info!(
        status,
        extracted = report.summary.total_links_extracted,
        added = report.summary.total_links_added,
        skipped = report.summary.total_links_skipped,
        categories_populated = populated,
        json_report = %json_path.display(),
        markdown_report = %md_path.display(),
        "QA report generated"
    );
    for check in report.checks.iter().filter(|check| !check.passed) {
        warn!(
            check = %check.name,
            offending = %check.offending.join(", "),
            "acceptance check failed"
        );
    }

    Ok(report)
}

pub fn build_report(inputs: QaInputs, configured_categories: &[&str]) -> QaReport {
    let QaInputs {
        raw,
        normalized,
        categorized,
        duplicates,
    } = inputs;

    let cross_category = cross_category_duplicates(&categorized);
    let checks = vec![
        check_all_links_processed(&raw, &categorized),
        check_normalized_matches_raw(&raw, &normalized),
        check_all_links_have_action(&categorized),
        check_added_links_have_categories(&categorized),
        check_valid_categories_only(&categorized, configured_categories),
        QaCheck {
            name: CHECK_NO_CROSS_CATEGORY_DUPLICATES.to_string(),
            passed: cross_category.is_empty(),
            offending: cross_category.keys().cloned().collect(),
        },
    ];
    let failed_checks = checks
        .iter()
        .filter(|check| !check.passed)
        .map(|check| check.name.clone())
        .collect::<Vec<String>>();

    let total_valid = normalized.iter().filter(|link| link.valid_url).count();
    let total_added = categorized.iter().filter(|link| link.is_added()).count();
    let total_skipped = categorized.iter().filter(|link| link.is_skipped()).count();

    let summary = QaSummary {
        total_links_extracted: raw.len(),
        total_valid_urls: total_valid,
        total_invalid_urls: normalized.len() - total_valid,
        total_links_added: total_added,
        total_links_skipped: total_skipped,
        processing_rate: percentage(total_added + total_skipped, raw.len()),
        success_rate: percentage(total_added, total_valid),
    };

    let mut skip_breakdown = BTreeMap::<String, usize>::new();
    let mut skip_details = BTreeMap::<String, Vec<SkipDetail>>::new();
    for link in categorized.iter().filter(|link| link.is_skipped()) {
        let kind = reason_kind(&link.reason).to_string();
        *skip_breakdown.entry(kind.clone()).or_default() += 1;
        skip_details.entry(kind).or_default().push(SkipDetail {
            id: link.id.clone(),
            url: link.href_norm.clone().unwrap_or_else(|| "N/A".to_string()),
            text: link.text_final.clone(),
            reason: link.reason.clone(),
        });
    }

    let duplicates_info = DuplicatesInfo {
        duplicate_url_groups: duplicates.len(),
        total_duplicate_links: duplicates
            .iter()
            .map(|group| group.duplicate_count.saturating_sub(1))
            .sum(),
        duplicate_details: duplicates,
    };

    QaReport {
        overall_pass: failed_checks.is_empty(),
        summary,
        checks,
        failed_checks,
        cross_category_duplicate_urls: cross_category,
        categories: category_breakdown(&categorized),
        skip_breakdown,
        skip_details,
        duplicates_info,
    }
}

fn check_all_links_processed(
    raw: &[AuditRawLink],
    categorized: &[AuditCategorizedLink],
) -> QaCheck {
    let offending = id_mismatches(
        raw.iter().map(|link| link.id.as_str()),
        categorized.iter().map(|link| link.id.as_str()),
    );
    named_check(CHECK_ALL_LINKS_PROCESSED, offending)
}

fn check_normalized_matches_raw(
    raw: &[AuditRawLink],
    normalized: &[AuditNormalizedLink],
) -> QaCheck {
    let offending = id_mismatches(
        raw.iter().map(|link| link.id.as_str()),
        normalized.iter().map(|link| link.id.as_str()),
    );
    named_check(CHECK_NORMALIZED_MATCHES_RAW, offending)
}

fn id_mismatches<'a>(
    upstream: impl Iterator<Item = &'a str>,
    downstream: impl Iterator<Item = &'a str>,
) -> Vec<String> {
    let expected = upstream.collect::<HashSet<&str>>();
    let mut counts = HashMap::<&str, usize>::new();
    for id in downstream {
        *counts.entry(id).or_default() += 1;
    }

    let mut offending = BTreeSet::new();
    for id in &expected {
        if counts.get(id).copied().unwrap_or_default() != 1 {
            offending.insert(id.to_string());
        }
    }
    for id in counts.keys() {
        if !expected.contains(id) {
            offending.insert(id.to_string());
        }
    }
    offending.into_iter().collect()
}

fn check_all_links_have_action(categorized: &[AuditCategorizedLink]) -> QaCheck {
    let offending = categorized
        .iter()
        .filter(|link| !link.is_added() && !link.is_skipped())
        .map(|link| link.id.clone())
        .collect();
    named_check(CHECK_ALL_LINKS_HAVE_ACTION, offending)
}

fn check_added_links_have_categories(categorized: &[AuditCategorizedLink]) -> QaCheck {
    let offending = categorized
        .iter()
        .filter(|link| link.is_added() && link.category.is_null())
        .map(|link| link.id.clone())
        .collect();
    named_check(CHECK_ADDED_LINKS_HAVE_CATEGORIES, offending)
}

fn check_valid_categories_only(
    categorized: &[AuditCategorizedLink],
    configured_categories: &[&str],
) -> QaCheck {
    let offending = categorized
        .iter()
        .filter(|link| link.is_added())
        .filter(|link| !link.category.is_null())
        .filter(|link| {
            link.category_id()
                .is_none_or(|category| !configured_categories.contains(&category))
        })
        .map(|link| link.id.clone())
        .collect();
    named_check(CHECK_VALID_CATEGORIES_ONLY, offending)
}

pub fn cross_category_duplicates(
    categorized: &[AuditCategorizedLink],
) -> BTreeMap<String, Vec<String>> {
    let mut categories_by_url = BTreeMap::<String, BTreeSet<String>>::new();
    for link in categorized.iter().filter(|link| link.is_added()) {
        if let (Some(url), Some(category)) = (&link.href_norm, link.category_id()) {
            categories_by_url
                .entry(url.clone())
                .or_default()
                .insert(category.to_string());
        }
    }

    categories_by_url
        .into_iter()
        .filter(|(_, categories)| categories.len() > 1)
        .map(|(url, categories)| (url, categories.into_iter().collect()))
        .collect()
}

fn category_breakdown(categorized: &[AuditCategorizedLink]) -> Vec<QaCategory> {
    let mut links_by_category = BTreeMap::<String, Vec<QaLink>>::new();
    for id in KNOWN_CATEGORY_IDS {
        links_by_category.insert(id.to_string(), Vec::new());
    }
    for link in categorized.iter().filter(|link| link.is_added()) {
        let Some(category) = link.category_id() else {
            continue;
        };
        links_by_category
            .entry(category.to_string())
            .or_default()
            .push(QaLink {
                text: link.text_final.clone(),
                url: link.href_norm.clone().unwrap_or_default(),
            });
    }

    links_by_category
        .into_iter()
        .map(|(category_id, links)| QaCategory {
            category_id,
            link_count: links.len(),
            links,
        })
        .collect()
}

fn named_check(name: &str, offending: Vec<String>) -> QaCheck {
    QaCheck {
        name: name.to_string(),
        passed: offending.is_empty(),
        offending,
    }
}

fn percentage(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        return "n/a".to_string();
    }
    format!("{:.1}%", numerator as f64 / denominator as f64 * 100.0)
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn render_markdown(report: &QaReport) -> String {
    let mut md = vec!["# Link Categorization QA Report".to_string(), String::new()];

    let s = &report.summary;
    md.push("## Summary".to_string());
    md.push(String::new());
    md.push(format!("- **Total links extracted**: {}", s.total_links_extracted));
    md.push(format!("- **Valid URLs**: {}", s.total_valid_urls));
    md.push(format!("- **Invalid URLs**: {}", s.total_invalid_urls));
    md.push(format!("- **Links added**: {}", s.total_links_added));
    md.push(format!("- **Links skipped**: {}", s.total_links_skipped));
    md.push(format!("- **Processing rate**: {}", s.processing_rate));
    md.push(format!("- **Success rate**: {}", s.success_rate));
    md.push(String::new());

    md.push("## Acceptance Criteria".to_string());
    md.push(String::new());
    for check in &report.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        md.push(format!("- {status} **{}**", title_case(&check.name)));
        if !check.offending.is_empty() {
            md.push(format!("  - offending: {}", check.offending.join(", ")));
        }
    }
    md.push(String::new());
    md.push(format!(
        "**Overall Status**: {}",
        if report.overall_pass { "PASS" } else { "FAIL" }
    ));
    md.push(String::new());

    md.push("## Categories Populated".to_string());
    md.push(String::new());
    for category in &report.categories {
        md.push(format!(
            "- **{}**: {} links",
            category.category_id, category.link_count
        ));
    }
    md.push(String::new());

    if !report.skip_breakdown.is_empty() {
        md.push("## Links Skipped".to_string());
        md.push(String::new());
        for (reason, count) in &report.skip_breakdown {
            md.push(format!("- **{}**: {count} links", title_case(reason)));
        }
        md.push(String::new());
    }

    md.join("\n")
}
