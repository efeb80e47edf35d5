//! HTML extraction for page title and meta description.
//!
//! Uses scraper for HTML parsing.

use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ExtractError {
    #[error("page has no title")]
    MissingTitle,
}

/// The fields of a page the ad copy is built from
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    /// Page title
    pub title: String,
    /// Meta description, empty when the page has none
    pub meta_description: String,
}

/// Extract title and meta description from an HTML document
pub fn extract(html: &str) -> Result<PageSummary, ExtractError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document).ok_or(ExtractError::MissingTitle)?;
    let meta_description = extract_meta_description(&document).unwrap_or_default();

    Ok(PageSummary {
        title,
        meta_description,
    })
}

/// Extract the page title from <title>. A blank title counts as missing.
fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let element = document.select(&selector).next()?;

    let title: String = element.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Extract the content attribute of <meta name="description">
fn extract_meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
}
