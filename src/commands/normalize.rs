use std::collections::HashMap;

use anyhow::{Context, Result};
use html_escape::decode_html_entities;
use regex::Regex;
use tracing::info;
use url::{ParseError, Url};

use crate::cli::WorkArgs;
use crate::commands::{DUPLICATES_FILE, NORMALIZED_LINKS_FILE, RAW_LINKS_FILE, artifact};
use crate::model::{DuplicateGroup, NormalizeSummary, NormalizedLink, RawLink};
use crate::util::{read_json, require_input, write_json_pretty};

pub const TRACKING_PARAMS: [&str; 9] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "mc_cid",
    "mc_eid",
];

const WEB_SCHEMES: [&str; 2] = ["http", "https"];

pub fn run(args: WorkArgs) -> Result<NormalizeSummary> {
    let raw_path = artifact(&args.work_dir, RAW_LINKS_FILE);
    require_input(&raw_path, "linksort extract")?;
    let raw_links: Vec<RawLink> = read_json(&raw_path)?;

    info!(raw_links = raw_links.len(), "normalizing links");

    let normalizer = UrlNormalizer::new()?;
    let normalized = raw_links
        .iter()
        .map(|link| normalizer.normalize_link(link))
        .collect::<Vec<NormalizedLink>>();
    let duplicates = find_duplicate_groups(&normalized);
    let summary = summarize(&normalized, &duplicates);

    info!(
        total = summary.total,
        valid = summary.valid,
        invalid = summary.invalid,
        unique_urls = summary.unique_urls,
        duplicate_urls = summary.duplicate_urls,
        duplicate_links = summary.duplicate_links,
        "normalization results"
    );

    let normalized_path = artifact(&args.work_dir, NORMALIZED_LINKS_FILE);
    write_json_pretty(&normalized_path, &normalized)?;
    info!(path = %normalized_path.display(), "wrote normalized links");

    let duplicates_path = artifact(&args.work_dir, DUPLICATES_FILE);
    write_json_pretty(&duplicates_path, &duplicates)?;
    info!(path = %duplicates_path.display(), "wrote duplicate groups");

    Ok(summary)
}

pub struct UrlNormalizer {
    broken_scheme_patterns: Vec<Regex>,
}

impl UrlNormalizer {
    pub fn new() -> Result<Self> {
        let broken_scheme_patterns = [r"(?i)^htt[^p]://", r"(?i)^https?[^:]/"]
            .into_iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile scheme pattern {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            broken_scheme_patterns,
        })
    }

    pub fn normalize_link(&self, link: &RawLink) -> NormalizedLink {
        self.normalize(&link.id, &link.href_raw, &link.text_raw)
    }

    pub fn normalize(&self, id: &str, href_raw: &str, text_raw: &str) -> NormalizedLink {
        let (href_norm, invalid_reason) = match self.normalize_url(href_raw) {
            Ok(url) => (Some(url), None),
            Err(reason) => (None, Some(reason)),
        };

        NormalizedLink {
            id: id.to_string(),
            href_raw: href_raw.to_string(),
            valid_url: href_norm.is_some(),
            href_norm,
            text_norm: text_raw.trim().to_string(),
            invalid_reason,
        }
    }

    pub fn normalize_url(&self, href_raw: &str) -> std::result::Result<String, String> {
        let url = decode_html_entities(href_raw.trim()).trim().to_string();

        if self
            .broken_scheme_patterns
            .iter()
            .any(|pattern| pattern.is_match(&url))
        {
            return Err(format!("Invalid scheme in URL: {url}"));
        }

        let parsed = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(ParseError::RelativeUrlWithoutBase | ParseError::EmptyHost) => {
                return Err(format!("Missing scheme or domain: {url}"));
            }
            Err(err) => return Err(format!("Parse error: {err}: {url}")),
        };

        // `http:example.com` parses with a host but names no authority.
        let explicit_authority = url
            .get(parsed.scheme().len() + 1..)
            .is_some_and(|rest| rest.starts_with("//"));
        let Some(host) = parsed.host_str().filter(|host| !host.is_empty()) else {
            return Err(format!("Missing scheme or domain: {url}"));
        };
        if !explicit_authority {
            return Err(format!("Missing scheme or domain: {url}"));
        }
        if !WEB_SCHEMES.contains(&parsed.scheme()) {
            return Err(format!("Unsupported scheme '{}': {url}", parsed.scheme()));
        }

        let mut normalized = format!("{}://{}", parsed.scheme(), authority(&parsed, host));
        normalized.push_str(&parsed.path().trim_end_matches('/').to_lowercase());

        let query = strip_tracking_params(raw_query(&url));
        if !query.is_empty() {
            normalized.push('?');
            normalized.push_str(&query);
        }

        Ok(normalized)
    }
}

fn authority(parsed: &Url, host: &str) -> String {
    let mut authority = String::new();
    if !parsed.username().is_empty() {
        authority.push_str(parsed.username());
        if let Some(password) = parsed.password() {
            authority.push(':');
            authority.push_str(password);
        }
        authority.push('@');
    }
    authority.push_str(host);
    if let Some(port) = parsed.port() {
        authority.push_str(&format!(":{port}"));
    }
    authority.to_lowercase()
}

fn raw_query(url: &str) -> &str {
    let before_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    before_fragment
        .split_once('?')
        .map_or("", |(_, query)| query)
}

pub fn strip_tracking_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            !TRACKING_PARAMS.contains(&key)
        })
        .collect::<Vec<&str>>()
        .join("&")
}

pub fn find_duplicate_groups(links: &[NormalizedLink]) -> Vec<DuplicateGroup> {
    let mut order = Vec::<&str>::new();
    let mut ids_by_url = HashMap::<&str, Vec<String>>::new();

    for link in links {
        let Some(href_norm) = link.href_norm.as_deref() else {
            continue;
        };
        let ids = ids_by_url.entry(href_norm).or_insert_with(|| {
            order.push(href_norm);
            Vec::new()
        });
        ids.push(link.id.clone());
    }

    order
        .into_iter()
        .filter_map(|href_norm| {
            let ids = ids_by_url.remove(href_norm)?;
            if ids.len() < 2 {
                return None;
            }
            Some(DuplicateGroup {
                href_norm: href_norm.to_string(),
                canonical_id: ids[0].clone(),
                duplicate_count: ids.len(),
                duplicate_ids: ids,
            })
        })
        .collect()
}

fn summarize(links: &[NormalizedLink], duplicates: &[DuplicateGroup]) -> NormalizeSummary {
    let valid = links.iter().filter(|link| link.valid_url).count();
    let mut unique = links
        .iter()
        .filter_map(|link| link.href_norm.as_deref())
        .collect::<Vec<&str>>();
    unique.sort_unstable();
    unique.dedup();

    NormalizeSummary {
        total: links.len(),
        valid,
        invalid: links.len() - valid,
        unique_urls: unique.len(),
        duplicate_urls: duplicates.len(),
        duplicate_links: duplicates
            .iter()
            .map(|group| group.duplicate_count - 1)
            .sum(),
    }
}
