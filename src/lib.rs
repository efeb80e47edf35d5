//! # adcopy
//!
//! An HTTP service that turns a webpage into advertising copy for several platforms.
//!
//! ## Flow
//!
//! - **Fetch**: plain HTTP, optionally falling back to a WebDriver-driven browser
//! - **Extract**: page title and meta description
//! - **Rank**: keyword frequencies over the extracted text
//! - **Cache**: one record per website in a flat JSON file, reused on later requests
//! - **Generate**: prompt an Azure OpenAI completions deployment for the ad copy

pub mod agent;
pub mod config;
pub mod fetcher;
pub mod keywords;
pub mod pipeline;
pub mod record;
pub mod scraper;
pub mod server;
pub mod storage;

pub use agent::{CampaignBrief, CompletionClient, CopyGenerator};
pub use config::Config;
pub use fetcher::Fetcher;
pub use pipeline::{AdCopyRequest, AdCopyService, PageLoader};
pub use record::PageRecord;
pub use storage::CacheStore;
