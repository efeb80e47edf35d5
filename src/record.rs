//! PageRecord - the scraped and ranked view of one website, as stored in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A token and the number of times it occurs, serialized as `[token, count]`.
pub type Keyword = (String, u32);

/// Scraped content of a website together with its ranked keywords.
///
/// Records are created on the first successful scrape and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Normalized (lowercased) website key
    pub website: String,
    /// Contents of the page's `<title>`
    pub title: String,
    /// Contents of `<meta name="description">`, empty when the page has none
    #[serde(default)]
    pub meta_description: String,
    /// Tokens ranked by descending frequency. `None` for records written by
    /// older schemas that stored no keywords, or stored them in another shape.
    #[serde(
        default,
        deserialize_with = "lenient_keywords",
        skip_serializing_if = "Option::is_none"
    )]
    pub keywords: Option<Vec<Keyword>>,
    /// When the record was first cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Create a new record stamped with the current time
    pub fn new(
        website: String,
        title: String,
        meta_description: String,
        keywords: Vec<Keyword>,
    ) -> Self {
        Self {
            website,
            title,
            meta_description,
            keywords: Some(keywords),
            cached_at: Some(Utc::now()),
        }
    }

    /// Text the keyword ranker runs over: title and description joined by a space
    pub fn keyword_source(&self) -> String {
        format!("{} {}", self.title, self.meta_description)
    }
}

/// Accept any `keywords` value; only `[token, count]` pairs are kept.
fn lenient_keywords<'de, D>(deserializer: D) -> Result<Option<Vec<Keyword>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Normalize a website into its cache key.
pub fn normalize_website(website: &str) -> String {
    website.trim().to_lowercase()
}
