use anyhow::{Result, anyhow};
use html_escape::decode_html_entities;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::cli::ExtractArgs;
use crate::commands::{RAW_LINKS_FILE, artifact};
use crate::model::RawLink;
use crate::util::{read_text, require_input, sha256_hex, write_json_pretty};

const SECTION_HEADING_TAGS: [&str; 2] = ["h2", "h3"];
const DEFAULT_SECTION: &str = "Unknown";

pub fn run(args: ExtractArgs) -> Result<Vec<RawLink>> {
    require_input(&args.source, "the source HTML export")?;
    let html = read_text(&args.source)?;

    let links = extract_links(&html)?;
    info!(
        source = %args.source.display(),
        links = links.len(),
        "extracted links"
    );

    let output_path = artifact(&args.work_dir, RAW_LINKS_FILE);
    write_json_pretty(&output_path, &links)?;
    info!(path = %output_path.display(), "wrote raw links");

    Ok(links)
}

pub fn extract_links(html: &str) -> Result<Vec<RawLink>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("h2, h3, a")
        .map_err(|err| anyhow!("failed to compile link selector: {err:?}"))?;

    let mut links = Vec::new();
    let mut current_section = DEFAULT_SECTION.to_string();

    for element in document.select(&selector) {
        let tag = element.value().name();
        if SECTION_HEADING_TAGS.contains(&tag) {
            current_section = element_text(&element);
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.is_empty() {
            continue;
        }

        let order_index = links.len();
        let text = decode_html_entities(&element_text(&element)).into_owned();

        links.push(RawLink {
            id: link_id(order_index, href, &text),
            href_raw: href.to_string(),
            text_raw: text,
            section_hint: current_section.clone(),
            order_index,
        });
    }

    Ok(links)
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

pub fn link_id(order_index: usize, href: &str, text: &str) -> String {
    let digest = sha256_hex(&[&order_index.to_string(), href, text]);
    format!("link-{order_index:04}-{}", &digest[..12])
}
