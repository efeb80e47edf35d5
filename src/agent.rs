//! LLM agent module for ad copy generation.
//!
//! Builds a prompt from the scraped page (and an optional campaign brief) and sends
//! it to an Azure OpenAI completions deployment.

use crate::config::GenerationConfig;
use crate::record::PageRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion service responded with HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("completion service returned no text")]
    Empty,
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// A prompt-in, text-out completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// Completions client for an Azure OpenAI deployment
pub struct AzureCompletionClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    config: GenerationConfig,
}

impl AzureCompletionClient {
    /// Build the client from validated configuration
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        use crate::config::ConfigError;

        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("generation.endpoint"))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("generation.api_key"))?;

        let url = format!(
            "{}/openai/deployments/{}/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            config.deployment,
            config.api_version
        );

        Ok(Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for AzureCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = CompletionRequest {
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
        };

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text.trim().to_string())
            .unwrap_or_default())
    }
}

/// Campaign details a client may send along with the website
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignBrief {
    #[serde(default)]
    pub need_to_write: Option<String>,
    #[serde(default)]
    pub how_often: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub business_size: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

impl CampaignBrief {
    /// True when no field carries any text
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().map_or(true, |s| s.trim().is_empty());

        blank(&self.need_to_write)
            && blank(&self.how_often)
            && blank(&self.company_name)
            && blank(&self.industry)
            && blank(&self.business_size)
            && blank(&self.service_name)
            && blank(&self.description)
            && blank(&self.audience)
            && self
                .keywords
                .as_ref()
                .map_or(true, |k| k.iter().all(|s| s.trim().is_empty()))
    }
}

/// Generic multi-platform template
pub fn page_prompt(page: &PageRecord) -> String {
    format!(
        r#"Create engaging ad copies suitable for Instagram, Facebook, Google Ads, Bing Ads, and Twitter based on the content of the provided webpage. Extract the following details from the webpage:

Title: {title}.
Meta Description: {description}
Website: {website}
Craft persuasive ad copies tailored to each platform, ensuring they effectively capture the essence of the webpage and entice users to engage further.

Format the output as follows:

Instagram Ad Copy:

Caption: [Title]
Description: [Meta Description]
Link: [Website]

Facebook Ad Copy:

Headline: [Title]
Text: [Meta Description]
Link: [Website]

Google Ads Copy:

Headline 1: [Title]
Headline 2: [Meta Description]
Description: [Meta Description]
URL: [Website]

Bing Ads Copy:

Title: [Title]
Description 1: [Meta Description]
URL: [Website]

Twitter Ad Copy:

Tweet: [Title] [Meta Description] [Website]

Experiment with different ad angles, calls-to-action, and platform-specific optimizations to maximize engagement. Ensure compliance with each platform's ad policies and character limits."#,
        title = page.title,
        description = page.meta_description,
        website = page.website,
    )
}

/// Campaign template, used when the client supplied a brief
pub fn campaign_prompt(page: &PageRecord, brief: &CampaignBrief) -> String {
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("not specified")
            .to_string()
    };

    let page_keywords = page
        .keywords
        .as_deref()
        .unwrap_or_default()
        .iter()
        .take(10)
        .map(|(token, _)| token.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let target_keywords = brief
        .keywords
        .as_ref()
        .map(|k| k.join(", "))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "not specified".to_string());

    format!(
        r#"You are writing an advertising campaign for {company}, a {size} business in the {industry} industry.

Service to promote: {service}
About the service: {about}
Target audience: {audience}
Keywords to target: {target_keywords}
What to write: {need}
How often the copy will run: {how_often}

Webpage details:
Title: {title}
Meta Description: {description}
Website: {website}
Prominent page terms: {page_keywords}

Write persuasive ad copies for Instagram, Facebook, Google Ads, Bing Ads, and Twitter that speak directly to the target audience, work in the requested keywords naturally, and point readers to the website. Vary the angles and calls-to-action across platforms and respect each platform's ad policies and character limits."#,
        company = field(&brief.company_name),
        size = field(&brief.business_size),
        industry = field(&brief.industry),
        service = field(&brief.service_name),
        about = field(&brief.description),
        audience = field(&brief.audience),
        need = field(&brief.need_to_write),
        how_often = field(&brief.how_often),
        title = page.title,
        description = page.meta_description,
        website = page.website,
    )
}

/// Turns page records into ad copy through a completion service
#[derive(Clone)]
pub struct CopyGenerator {
    client: Arc<dyn CompletionClient>,
}

impl CopyGenerator {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Build the prompt for `page`; a non-empty brief selects the campaign template
    pub fn prompt(page: &PageRecord, brief: Option<&CampaignBrief>) -> String {
        match brief {
            Some(brief) if !brief.is_empty() => campaign_prompt(page, brief),
            _ => page_prompt(page),
        }
    }

    /// Generate ad copy for `page`
    pub async fn generate(
        &self,
        page: &PageRecord,
        brief: Option<&CampaignBrief>,
    ) -> Result<String, GenerationError> {
        let prompt = Self::prompt(page, brief);
        tracing::debug!("Requesting ad copy for {} ({} prompt chars)", page.website, prompt.len());

        let text = self.client.complete(&prompt).await?;
        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}
