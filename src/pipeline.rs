use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use log::warn;

use crate::delay_manager;
use crate::error::ConfigError;
use crate::exporter::RunResult;
use crate::input_loader::UrlRecord;
use crate::scrape_client::{ScrapeClient, ScrapeStatus};

/// Environment variable consulted when no key is passed explicitly.
pub const API_KEY_ENV: &str = "SERPER_API_KEY";

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub api_key: String,
    pub include_markdown: bool,
    pub delay_seconds: f64,
}

impl ScrapeConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }
        Ok(ScrapeConfig {
            api_key,
            include_markdown: false,
            delay_seconds: delay_manager::DEFAULT_DELAY_SECS,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(env::var(API_KEY_ENV).unwrap_or_default())
    }

    pub fn with_markdown(mut self, include_markdown: bool) -> Self {
        self.include_markdown = include_markdown;
        self
    }

    pub fn with_delay(mut self, delay_seconds: f64) -> Self {
        self.delay_seconds = delay_manager::clamp_delay(delay_seconds);
        self
    }
}

/// Emitted after each scraped URL. `completed` grows by one per item.
#[derive(Debug, Clone)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub url: String,
    pub status: ScrapeStatus,
}

/// Scrapes every record in order, one request at a time. Strictly sequential:
/// at most one request is ever in flight, and the delay between items is the
/// run's only suspension point. A `Failure` outcome never aborts the run.
/// `cancel` is honored between items only, so an in-flight request always
/// finishes and its outcome is kept.
pub fn run<F>(
    records: &[UrlRecord],
    client: &ScrapeClient,
    config: &ScrapeConfig,
    cancel: &AtomicBool,
    mut on_progress: F,
) -> RunResult
where
    F: FnMut(&Progress),
{
    let started_at = Local::now();
    let total = records.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, record) in records.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            warn!("Run stopped after {} of {} URLs.", i, total);
            break;
        }

        let outcome = client.fetch(&record.raw_value, config.include_markdown);
        let progress = Progress {
            completed: i + 1,
            total,
            url: record.raw_value.clone(),
            status: outcome.status,
        };
        outcomes.push(outcome);
        on_progress(&progress);

        if i + 1 < total {
            delay_manager::pause_between_requests(config.delay_seconds);
        }
    }

    RunResult::new(started_at, outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(url: &str, row: usize) -> UrlRecord {
        UrlRecord {
            raw_value: url.to_string(),
            row_index: row,
        }
    }

    fn config() -> ScrapeConfig {
        ScrapeConfig::new("test-key").unwrap().with_delay(0.5)
    }

    fn success_mock() -> Mock {
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "success": true, "text": "content" }),
        ))
    }

    #[test]
    fn missing_credential_is_fatal_at_config_time() {
        assert!(matches!(
            ScrapeConfig::new(""),
            Err(ConfigError::MissingCredential)
        ));
    }

    #[test]
    fn config_clamps_the_delay() {
        let config = ScrapeConfig::new("k").unwrap().with_delay(99.0);
        assert_eq!(config.delay_seconds, delay_manager::MAX_DELAY_SECS);
    }

    #[test]
    fn produces_one_outcome_per_record_in_order() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(success_mock().mount(&server));

        let client = ScrapeClient::new("test-key")
            .unwrap()
            .with_endpoint(server.uri());
        let records = vec![
            record("https://a.example", 1),
            record("https://b.example", 2),
            record("https://c.example", 3),
        ];
        let cancel = AtomicBool::new(false);

        let mut seen = Vec::new();
        let result = run(&records, &client, &config(), &cancel, |p| {
            seen.push(p.completed);
        });

        assert_eq!(result.total(), 3);
        let urls: Vec<&str> = result.outcomes.iter().map(|o| o.url.as_str()).collect();
        assert_eq!(urls, ["https://a.example", "https://b.example", "https://c.example"]);
        assert_eq!(seen, [1, 2, 3]);
    }

    #[test]
    fn failure_in_the_middle_does_not_stop_the_run() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(
            Mock::given(method("POST"))
                .and(body_partial_json(
                    serde_json::json!({ "url": "https://b.example" }),
                ))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server),
        );
        rt.block_on(success_mock().mount(&server));

        let client = ScrapeClient::new("test-key")
            .unwrap()
            .with_endpoint(server.uri());
        let records = vec![
            record("https://a.example", 1),
            record("https://b.example", 2),
            record("https://c.example", 3),
        ];
        let cancel = AtomicBool::new(false);

        let result = run(&records, &client, &config(), &cancel, |_| {});

        assert_eq!(result.total(), 3);
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        assert!(result.outcomes[1].is_failure());
        assert!(!result.outcomes[2].is_failure());
    }

    #[test]
    fn delays_between_items_but_not_after_the_last() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(success_mock().mount(&server));

        let client = ScrapeClient::new("test-key")
            .unwrap()
            .with_endpoint(server.uri());
        let records = vec![
            record("https://a.example", 1),
            record("https://b.example", 2),
            record("https://c.example", 3),
        ];
        let cancel = AtomicBool::new(false);

        let started = Instant::now();
        let result = run(&records, &client, &config(), &cancel, |_| {});
        let elapsed = started.elapsed();

        assert_eq!(result.total(), 3);
        // Two inter-item pauses of 0.5s each.
        assert!(elapsed.as_secs_f64() >= 1.0, "elapsed {:?}", elapsed);
    }

    #[test]
    fn cancellation_stops_between_items() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());
        rt.block_on(success_mock().mount(&server));

        let client = ScrapeClient::new("test-key")
            .unwrap()
            .with_endpoint(server.uri());
        let records = vec![
            record("https://a.example", 1),
            record("https://b.example", 2),
            record("https://c.example", 3),
        ];
        let cancel = AtomicBool::new(false);

        let result = run(&records, &client, &config(), &cancel, |p| {
            if p.completed == 1 {
                cancel.store(true, Ordering::Relaxed);
            }
        });

        assert_eq!(result.total(), 1);
        assert_eq!(result.outcomes[0].url, "https://a.example");
    }

    #[test]
    fn empty_input_yields_an_empty_run() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(MockServer::start());

        let client = ScrapeClient::new("test-key")
            .unwrap()
            .with_endpoint(server.uri());
        let cancel = AtomicBool::new(false);

        let result = run(&[], &client, &config(), &cancel, |_| {});

        assert_eq!(result.total(), 0);
        assert_eq!(result.success_count(), 0);
        assert_eq!(result.failure_count(), 0);
    }
}
