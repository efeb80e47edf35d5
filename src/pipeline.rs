//! Request orchestration: cache lookup, scrape on miss, cache append, generation.

use crate::agent::{CampaignBrief, CopyGenerator, GenerationError};
use crate::fetcher::{self, FetchError, Fetcher};
use crate::keywords;
use crate::record::{normalize_website, PageRecord};
use crate::scraper::{self, ExtractError};
use crate::storage::{AppendOutcome, CacheError, CacheStore};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid website {0:?}")]
    InvalidWebsite(String),
    #[error("error scraping webpage: {0}")]
    Fetch(#[from] FetchError),
    #[error("error processing webpage content: {0}")]
    Extract(#[from] ExtractError),
    #[error("error generating ad copy: {0}")]
    Generation(#[from] GenerationError),
}

/// A page record and where it came from
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub record: PageRecord,
    pub from_cache: bool,
}

/// Inbound request: the website plus an optional campaign brief
#[derive(Debug, Clone, Default)]
pub struct AdCopyRequest {
    pub website: String,
    pub brief: Option<CampaignBrief>,
}

/// Loads page records: cache lookup, then fetch, extract and rank on a miss.
///
/// Cache file I/O runs on the blocking pool.
pub struct PageLoader {
    fetcher: Box<dyn Fetcher>,
    cache: Arc<CacheStore>,
}

impl PageLoader {
    pub fn new(fetcher: Box<dyn Fetcher>, cache: CacheStore) -> Self {
        Self {
            fetcher,
            cache: Arc::new(cache),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Return the record for `website`, from the cache when possible.
    ///
    /// The website is fetched as submitted; only the cache key is lowercased.
    /// A fresh scrape is appended to the cache; cache failures only cost the reuse.
    pub async fn prepare(&self, website: &str) -> Result<PreparedPage, PipelineError> {
        let key = normalize_website(website);
        let url = fetcher::website_url(website)
            .map_err(|_| PipelineError::InvalidWebsite(website.to_string()))?;

        if let Some(record) = self.cached(&key).await {
            return Ok(PreparedPage {
                record,
                from_cache: true,
            });
        }

        tracing::info!("Cache miss for {}, scraping {}", key, url);
        let html = self.fetcher.fetch(url.as_str()).await?;
        let page = scraper::extract(&html)?;
        let ranked = keywords::rank(&format!("{} {}", page.title, page.meta_description));
        let record = PageRecord::new(key, page.title, page.meta_description, ranked);

        let cache = Arc::clone(&self.cache);
        let entry = record.clone();
        match run_blocking(move || cache.append(&entry)).await {
            Ok(AppendOutcome::Appended) => tracing::info!("Cached {}", record.website),
            Ok(AppendOutcome::AlreadyPresent) => {
                tracing::debug!("{} was cached by a concurrent request", record.website)
            }
            Err(e) => tracing::warn!("Skipping cache write for {}: {}", record.website, e),
        }

        Ok(PreparedPage {
            record,
            from_cache: false,
        })
    }

    /// Cache lookup that treats every failure as a miss
    async fn cached(&self, key: &str) -> Option<PageRecord> {
        let cache = Arc::clone(&self.cache);
        let lookup_key = key.to_string();

        match run_blocking(move || cache.lookup(&lookup_key)).await {
            Ok(Some(mut record)) => {
                tracing::info!("Getting {} from cache", key);
                if record.keywords.is_none() {
                    // Older cache schemas stored no keywords; derive them from the cached text
                    record.keywords = Some(keywords::rank(&record.keyword_source()));
                }
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Cache lookup failed, treating as miss: {}", e);
                None
            }
        }
    }
}

/// Run a cache operation on the blocking pool
async fn run_blocking<T, F>(op: F) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op).await?
}

/// Runs the fetch, extract, rank and generate chain for one request at a time.
pub struct AdCopyService {
    pages: PageLoader,
    generator: CopyGenerator,
}

impl AdCopyService {
    pub fn new(fetcher: Box<dyn Fetcher>, cache: CacheStore, generator: CopyGenerator) -> Self {
        Self {
            pages: PageLoader::new(fetcher, cache),
            generator,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        self.pages.cache()
    }

    /// Produce single-line ad copy for the requested website
    pub async fn generate(&self, request: &AdCopyRequest) -> Result<String, PipelineError> {
        let page = self.prepare(&request.website).await?;
        let copy = self
            .generator
            .generate(&page.record, request.brief.as_ref())
            .await?;
        Ok(single_line(&copy))
    }

    /// See [`PageLoader::prepare`]
    pub async fn prepare(&self, website: &str) -> Result<PreparedPage, PipelineError> {
        self.pages.prepare(website).await
    }
}

/// Replace each run of line breaks with a single space
pub fn single_line(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;

    for c in text.chars() {
        if c == '\n' || c == '\r' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CompletionClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticPage {
        html: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for StaticPage {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.html.to_string())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Records every URL it is asked for
    struct Recording {
        urls: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Fetcher for Recording {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(EXAMPLE.to_string())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Echo;

    #[async_trait]
    impl CompletionClient for Echo {
        async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok("Instagram Ad Copy:\n\nCaption: Example Domain\r\nLink: example.com".to_string())
        }
    }

    fn service(
        html: &'static str,
        dir: &tempfile::TempDir,
    ) -> (AdCopyService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Box::new(StaticPage {
            html,
            calls: calls.clone(),
        });
        let cache = CacheStore::open(dir.path().join("cached_data.json"));
        let service = AdCopyService::new(fetcher, cache, CopyGenerator::new(Arc::new(Echo)));
        (service, calls)
    }

    const EXAMPLE: &str = "<html><head><title>Example Domain</title></head></html>";

    #[test]
    fn single_line_collapses_breaks() {
        assert_eq!(single_line("a\nb"), "a b");
        assert_eq!(single_line("a\n\n\nb"), "a b");
        assert_eq!(single_line("a\r\nb\r\n"), "a b ");
        assert_eq!(single_line("no breaks"), "no breaks");
    }

    #[tokio::test]
    async fn miss_scrapes_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);

        let page = service.prepare("Example.com").await.unwrap();
        assert!(!page.from_cache);
        assert_eq!(page.record.website, "example.com");
        assert_eq!(page.record.title, "Example Domain");
        assert_eq!(page.record.meta_description, "");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stored = service.cache().list().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].website, "example.com");
    }

    #[tokio::test]
    async fn hit_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);

        service.prepare("example.com").await.unwrap();
        let page = service.prepare("EXAMPLE.COM").await.unwrap();

        assert!(page.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.cache().count().unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_title_fails_without_cache_write() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service("<html><body>untitled</body></html>", &dir);

        let err = service.prepare("example.com").await.unwrap_err();
        assert!(matches!(err, PipelineError::Extract(ExtractError::MissingTitle)));
        assert_eq!(service.cache().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_website_is_rejected_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);

        let err = service.prepare("ftp://example.com").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidWebsite(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetches_url_as_submitted_and_caches_lowercased_key() {
        let dir = tempfile::tempdir().unwrap();
        let urls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let loader = PageLoader::new(
            Box::new(Recording { urls: urls.clone() }),
            CacheStore::open(dir.path().join("cached_data.json")),
        );

        let page = loader.prepare("https://github.com/Rust-Lang/Rust").await.unwrap();

        assert_eq!(*urls.lock().unwrap(), vec!["https://github.com/Rust-Lang/Rust"]);
        assert_eq!(page.record.website, "https://github.com/rust-lang/rust");
        assert!(loader.cache().lookup("https://github.com/rust-lang/rust").unwrap().is_some());
    }

    #[tokio::test]
    async fn loader_serves_repeat_requests_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = PageLoader::new(
            Box::new(StaticPage {
                html: EXAMPLE,
                calls: calls.clone(),
            }),
            CacheStore::open(dir.path().join("cached_data.json")),
        );

        assert!(!loader.prepare("example.com").await.unwrap().from_cache);
        assert!(loader.prepare("example.com").await.unwrap().from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drifted_entry_does_not_hide_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);
        std::fs::write(
            service.cache().path(),
            r#"[{"website": "good.com", "title": "Good", "meta_description": "", "keywords": [["Good", 1]]},
                {"website": "drift.com", "title": "Drift Co", "keywords": ["a", "b"]}]"#,
        )
        .unwrap();

        let good = service.prepare("good.com").await.unwrap();
        assert!(good.from_cache);

        let drift = service.prepare("drift.com").await.unwrap();
        assert!(drift.from_cache);
        assert_eq!(
            drift.record.keywords,
            Some(vec![("Drift".to_string(), 1), ("Co".to_string(), 1)])
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        service.prepare("example.com").await.unwrap();
        assert_eq!(service.cache().count().unwrap(), 3);
    }

    #[tokio::test]
    async fn corrupt_cache_falls_back_to_scraping() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);
        std::fs::write(service.cache().path(), "garbage").unwrap();

        let page = service.prepare("example.com").await.unwrap();
        assert!(!page.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn legacy_record_gets_keywords_derived() {
        let dir = tempfile::tempdir().unwrap();
        let (service, calls) = service(EXAMPLE, &dir);
        std::fs::write(
            service.cache().path(),
            r#"[{"website": "example.com", "title": "Example Domain", "meta_description": ""}]"#,
        )
        .unwrap();

        let page = service.prepare("example.com").await.unwrap();
        assert!(page.from_cache);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            page.record.keywords,
            Some(vec![("Example".to_string(), 1), ("Domain".to_string(), 1)])
        );
    }

    #[tokio::test]
    async fn generate_returns_single_line_copy() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = service(EXAMPLE, &dir);

        let request = AdCopyRequest {
            website: "example.com".to_string(),
            brief: None,
        };
        let copy = service.generate(&request).await.unwrap();
        assert_eq!(
            copy,
            "Instagram Ad Copy: Caption: Example Domain Link: example.com"
        );
    }
}
