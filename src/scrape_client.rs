use std::time::Duration;

use chrono::{DateTime, Local};
use log::warn;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Vendor scrape endpoint.
pub const SCRAPE_ENDPOINT: &str = "https://scrape.serper.dev";

const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Failure,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::Failure => "failure",
        }
    }
}

/// Result of attempting one URL. A failure always carries an error message and
/// never content; a success never carries an error message.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOutcome {
    pub url: String,
    pub status: ScrapeStatus,
    pub text_content: Option<String>,
    pub markdown_content: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl ScrapeOutcome {
    pub fn success(url: &str, text: Option<String>, markdown: Option<String>) -> Self {
        ScrapeOutcome {
            url: url.to_string(),
            status: ScrapeStatus::Success,
            text_content: text,
            markdown_content: markdown,
            error_message: None,
            timestamp: Local::now(),
        }
    }

    pub fn failure(url: &str, message: String) -> Self {
        ScrapeOutcome {
            url: url.to_string(),
            status: ScrapeStatus::Failure,
            text_content: None,
            markdown_content: None,
            error_message: Some(message),
            timestamp: Local::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ScrapeStatus::Failure
    }
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    #[serde(rename = "includeMarkdown")]
    include_markdown: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    text: Option<String>,
    markdown: Option<String>,
    error: Option<String>,
}

pub struct ScrapeClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ScrapeClient {
    pub fn new(api_key: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::MissingCredential);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(ScrapeClient {
            client,
            endpoint: SCRAPE_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Points the client at a different endpoint (self-hosted gateway, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Issues one request for `url`. Every ordinary failure (transport, non-2xx,
    /// malformed reply, vendor-reported error) comes back as a `Failure`
    /// outcome, never a panic or an `Err`.
    pub fn fetch(&self, url: &str, include_markdown: bool) -> ScrapeOutcome {
        let payload = ScrapeRequest {
            url,
            include_markdown,
        };

        let response = match self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&payload)
            .send()
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Request for {} failed: {}", url, e);
                return ScrapeOutcome::failure(url, format!("request failed: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail: String = body.trim().chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
            warn!("API returned HTTP {} for {}", status, url);
            let message = if detail.is_empty() {
                format!("API returned HTTP {}", status)
            } else {
                format!("API returned HTTP {}: {}", status, detail)
            };
            return ScrapeOutcome::failure(url, message);
        }

        match response.json::<ScrapeResponse>() {
            Ok(reply) if reply.success => ScrapeOutcome::success(url, reply.text, reply.markdown),
            Ok(reply) => {
                let message = reply
                    .error
                    .unwrap_or_else(|| "vendor reported failure without detail".to_string());
                warn!("Scrape of {} failed: {}", url, message);
                ScrapeOutcome::failure(url, message)
            }
            Err(e) => {
                warn!("Unexpected response body for {}: {}", url, e);
                ScrapeOutcome::failure(url, format!("unexpected response body: {}", e))
            }
        }
    }
}
