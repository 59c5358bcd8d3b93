//! HTML parsing and text extraction

use scraper::{ElementRef, Html, Selector};

/// Title, body text and same-site links extracted from one page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: String,
    pub body_text: String,
    pub links: Vec<String>,
}

/// Parse an HTML document into the pieces the indexer and search need
pub fn parse_page(content: &str) -> ParsedPage {
    let document = Html::parse_document(content);
    let mut page = ParsedPage::default();

    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            page.title = title_elem.text().collect::<String>().trim().to_string();
        }
    }

    if let Ok(selector) = Selector::parse("body") {
        if let Some(body) = document.select(&selector).next() {
            page.body_text = element_text(body);
        }
    }

    // Only absolute same-site paths are crawlable
    if let Ok(selector) = Selector::parse("a[href]") {
        for elem in document.select(&selector) {
            if let Some(href) = elem.value().attr("href") {
                if href.starts_with('/') && !page.links.iter().any(|l| l == href) {
                    page.links.push(href.to_string());
                }
            }
        }
    }

    page
}

/// Visible text of an element, whitespace-normalized; script and style
/// content is excluded
fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            let visible = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
                .map(|name| !matches!(name.as_str(), "script" | "style" | "noscript"))
                .unwrap_or(true);
            if visible {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    normalize_whitespace(&out)
}

/// Collapse whitespace runs to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
