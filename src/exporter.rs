use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::ExportError;
use crate::scrape_client::ScrapeOutcome;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SUMMARY_HEADERS: [&str; 5] = ["url", "status", "text_length", "markdown_length", "error"];
const DETAILED_HEADERS: [&str; 6] = [
    "url",
    "status",
    "text_content",
    "markdown_content",
    "error_message",
    "timestamp",
];

/// The outcomes of one complete run, in input order. Owned by the driver while
/// the run is in progress, read-only afterwards. Nothing survives between runs.
#[derive(Debug)]
pub struct RunResult {
    pub started_at: DateTime<Local>,
    pub outcomes: Vec<ScrapeOutcome>,
}

impl RunResult {
    pub fn new(started_at: DateTime<Local>, outcomes: Vec<ScrapeOutcome>) -> Self {
        RunResult {
            started_at,
            outcomes,
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> impl Iterator<Item = &ScrapeOutcome> {
        self.outcomes.iter().filter(|o| !o.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScrapeOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    url: &'a str,
    status: &'a str,
    text_length: usize,
    markdown_length: usize,
    error: &'a str,
}

impl<'a> SummaryRow<'a> {
    fn from_outcome(outcome: &'a ScrapeOutcome) -> Self {
        SummaryRow {
            url: &outcome.url,
            status: outcome.status.as_str(),
            text_length: outcome.text_content.as_deref().map_or(0, str::len),
            markdown_length: outcome.markdown_content.as_deref().map_or(0, str::len),
            error: outcome.error_message.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Serialize)]
struct RunSummary {
    started_at: String,
    total_urls: usize,
    successful: usize,
    failed: usize,
}

#[derive(Serialize)]
struct FullReport<'a> {
    summary: RunSummary,
    results: Vec<&'a ScrapeOutcome>,
    errors: Vec<&'a ScrapeOutcome>,
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

fn write_detailed_row(
    writer: &mut csv::Writer<Vec<u8>>,
    outcome: &ScrapeOutcome,
) -> Result<(), csv::Error> {
    let timestamp = outcome.timestamp.format(TIMESTAMP_FORMAT).to_string();
    writer.write_record([
        outcome.url.as_str(),
        outcome.status.as_str(),
        outcome.text_content.as_deref().unwrap_or(""),
        outcome.markdown_content.as_deref().unwrap_or(""),
        outcome.error_message.as_deref().unwrap_or(""),
        timestamp.as_str(),
    ])
}

/// One row per URL: url, status, content lengths, error message.
pub fn summary_csv(result: &RunResult) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADERS)?;
    for outcome in &result.outcomes {
        let row = SummaryRow::from_outcome(outcome);
        let text_length = row.text_length.to_string();
        let markdown_length = row.markdown_length.to_string();
        writer.write_record([
            row.url,
            row.status,
            text_length.as_str(),
            markdown_length.as_str(),
            row.error,
        ])?;
    }
    finish_csv(writer)
}

pub fn summary_json(result: &RunResult) -> Result<String, ExportError> {
    let rows: Vec<SummaryRow> = result.outcomes.iter().map(SummaryRow::from_outcome).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// One row per URL with the full content fields.
pub fn detailed_csv(result: &RunResult) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(DETAILED_HEADERS)?;
    for outcome in &result.outcomes {
        write_detailed_row(&mut writer, outcome)?;
    }
    finish_csv(writer)
}

pub fn detailed_json(result: &RunResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&result.outcomes)?)
}

/// The detailed rows restricted to failures.
pub fn errors_csv(result: &RunResult) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(DETAILED_HEADERS)?;
    for outcome in result.failures() {
        write_detailed_row(&mut writer, outcome)?;
    }
    finish_csv(writer)
}

pub fn errors_json(result: &RunResult) -> Result<String, ExportError> {
    let failures: Vec<&ScrapeOutcome> = result.failures().collect();
    Ok(serde_json::to_string_pretty(&failures)?)
}

/// Everything in one document: run metadata, the detailed rows, and the
/// errors view.
pub fn full_report_json(result: &RunResult) -> Result<String, ExportError> {
    let report = FullReport {
        summary: RunSummary {
            started_at: result.started_at.format(TIMESTAMP_FORMAT).to_string(),
            total_urls: result.total(),
            successful: result.success_count(),
            failed: result.failure_count(),
        },
        results: result.outcomes.iter().collect(),
        errors: result.failures().collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape_client::ScrapeStatus;
    use chrono::TimeZone;

    fn fixed_time(secs: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, secs).unwrap()
    }

    fn success(url: &str, text: &str, markdown: Option<&str>, secs: u32) -> ScrapeOutcome {
        ScrapeOutcome {
            url: url.to_string(),
            status: ScrapeStatus::Success,
            text_content: Some(text.to_string()),
            markdown_content: markdown.map(|m| m.to_string()),
            error_message: None,
            timestamp: fixed_time(secs),
        }
    }

    fn failure(url: &str, message: &str, secs: u32) -> ScrapeOutcome {
        ScrapeOutcome {
            url: url.to_string(),
            status: ScrapeStatus::Failure,
            text_content: None,
            markdown_content: None,
            error_message: Some(message.to_string()),
            timestamp: fixed_time(secs),
        }
    }

    fn sample_result() -> RunResult {
        RunResult::new(
            fixed_time(0),
            vec![
                success("https://a.example", "hello", Some("# hello"), 1),
                failure("https://b.example", "API returned HTTP 500", 2),
                success("https://c.example", "world!", None, 3),
            ],
        )
    }

    #[test]
    fn summary_reports_lengths_and_errors() {
        let csv = summary_csv(&sample_result()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "url,status,text_length,markdown_length,error");
        assert_eq!(lines[1], "https://a.example,success,5,7,");
        assert_eq!(
            lines[2],
            "https://b.example,failure,0,0,API returned HTTP 500"
        );
        assert_eq!(lines[3], "https://c.example,success,6,0,");
    }

    #[test]
    fn summary_json_mirrors_the_csv_view() {
        let rows: serde_json::Value =
            serde_json::from_str(&summary_json(&sample_result()).unwrap()).unwrap();

        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["url"], "https://a.example");
        assert_eq!(rows[0]["status"], "success");
        assert_eq!(rows[0]["text_length"], 5);
        assert_eq!(rows[0]["markdown_length"], 7);
        assert_eq!(rows[0]["error"], "");
        assert_eq!(rows[1]["status"], "failure");
        assert_eq!(rows[1]["error"], "API returned HTTP 500");
    }

    #[test]
    fn serialization_is_deterministic() {
        let result = sample_result();

        assert_eq!(summary_csv(&result).unwrap(), summary_csv(&result).unwrap());
        assert_eq!(detailed_csv(&result).unwrap(), detailed_csv(&result).unwrap());
        assert_eq!(errors_csv(&result).unwrap(), errors_csv(&result).unwrap());
        assert_eq!(
            full_report_json(&result).unwrap(),
            full_report_json(&result).unwrap()
        );
    }

    #[test]
    fn errors_view_is_the_failure_subset_of_the_detailed_view() {
        let result = sample_result();

        let detailed: Vec<String> = detailed_csv(&result).unwrap().lines().skip(1).map(String::from).collect();
        let errors: Vec<String> = errors_csv(&result).unwrap().lines().skip(1).map(String::from).collect();

        let failure_rows: Vec<&String> = detailed
            .iter()
            .filter(|row| row.contains(",failure,"))
            .collect();
        assert_eq!(errors.len(), failure_rows.len());
        for (error_row, detailed_row) in errors.iter().zip(failure_rows) {
            assert_eq!(error_row, detailed_row);
        }
    }

    #[test]
    fn counts_partition_the_outcomes() {
        let result = sample_result();

        assert_eq!(result.total(), 3);
        assert_eq!(result.success_count() + result.failure_count(), result.total());
        assert_eq!(result.successes().count(), 2);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn empty_run_exports_cleanly() {
        let result = RunResult::new(fixed_time(0), Vec::new());

        let csv = summary_csv(&result).unwrap();
        assert_eq!(csv.lines().count(), 1); // header only
        assert_eq!(detailed_json(&result).unwrap(), "[]");
        assert_eq!(errors_json(&result).unwrap(), "[]");

        let report: serde_json::Value =
            serde_json::from_str(&full_report_json(&result).unwrap()).unwrap();
        assert_eq!(report["summary"]["total_urls"], 0);
        assert_eq!(report["summary"]["successful"], 0);
        assert_eq!(report["summary"]["failed"], 0);
    }

    #[test]
    fn full_report_carries_run_metadata() {
        let report: serde_json::Value =
            serde_json::from_str(&full_report_json(&sample_result()).unwrap()).unwrap();

        assert_eq!(report["summary"]["started_at"], "2024-05-01 12:00:00");
        assert_eq!(report["summary"]["total_urls"], 3);
        assert_eq!(report["summary"]["successful"], 2);
        assert_eq!(report["summary"]["failed"], 1);
        assert_eq!(report["results"].as_array().unwrap().len(), 3);
        assert_eq!(report["errors"].as_array().unwrap().len(), 1);
        assert_eq!(report["errors"][0]["url"], "https://b.example");
    }
}
