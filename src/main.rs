use std::env;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use chrono::Local;
use log::{error, info};

use url_scraper_lib::{delay_manager, exporter, input_loader, logger, pipeline};
use url_scraper_lib::{ScrapeClient, ScrapeConfig};

const USAGE: &str = "Usage: url_scraper [INPUT] [--markdown] [--delay SECS] [--api-key KEY] [--out DIR]

  INPUT          CSV or Excel file with a 'url' column (default: input_urls.csv)
  --markdown     also request markdown content from the API
  --delay SECS   seconds between requests, 0.5-5.0 (default: 1.0)
  --api-key KEY  Serper API key (default: the SERPER_API_KEY environment variable)
  --out DIR      directory for the result files (default: current directory)";

const PREVIEW_LIMIT: usize = 10;

struct CliArgs {
    input: PathBuf,
    markdown: bool,
    delay: f64,
    api_key: Option<String>,
    out_dir: PathBuf,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut parsed = CliArgs {
        input: PathBuf::from("input_urls.csv"),
        markdown: false,
        delay: delay_manager::DEFAULT_DELAY_SECS,
        api_key: None,
        out_dir: PathBuf::from("."),
    };
    let mut input_seen = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--markdown" => parsed.markdown = true,
            "--delay" => {
                let value = args.next().ok_or("--delay needs a value")?;
                parsed.delay = value
                    .parse()
                    .map_err(|_| format!("invalid --delay value {:?}", value))?;
            }
            "--api-key" => {
                parsed.api_key = Some(args.next().ok_or("--api-key needs a value")?);
            }
            "--out" => {
                parsed.out_dir = PathBuf::from(args.next().ok_or("--out needs a value")?);
            }
            "-h" | "--help" => return Err(String::new()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {:?}", flag)),
            path => {
                if input_seen {
                    return Err(format!("unexpected extra argument {:?}", path));
                }
                parsed.input = PathBuf::from(path);
                input_seen = true;
            }
        }
    }
    Ok(parsed)
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("{}", message);
            }
            eprintln!("{}", USAGE);
            std::process::exit(if message.is_empty() { 0 } else { 2 });
        }
    };

    info!("Starting URL scraper...");

    let loaded = input_loader::load_urls(&args.input)?;
    if loaded.records.is_empty() {
        error!(
            "No usable URLs found in {:?} ({} rows skipped). Nothing to do.",
            args.input, loaded.skipped_rows
        );
        return Ok(());
    }

    for (i, record) in loaded.records.iter().take(PREVIEW_LIMIT).enumerate() {
        info!("  {}. {}", i + 1, record.raw_value);
    }
    if loaded.records.len() > PREVIEW_LIMIT {
        info!("  ... and {} more", loaded.records.len() - PREVIEW_LIMIT);
    }

    let api_key = match args.api_key {
        Some(key) => key,
        None => env::var(pipeline::API_KEY_ENV).unwrap_or_default(),
    };
    let config = ScrapeConfig::new(api_key)?
        .with_markdown(args.markdown)
        .with_delay(args.delay);
    let client = ScrapeClient::new(&config.api_key)?;

    let cancel = AtomicBool::new(false);
    let result = pipeline::run(&loaded.records, &client, &config, &cancel, |progress| {
        info!(
            "Scraped {} of {}: {} [{}]",
            progress.completed,
            progress.total,
            progress.url,
            progress.status.as_str()
        );
    });

    fs::create_dir_all(&args.out_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");

    let summary_path = args.out_dir.join(format!("scraping_summary_{}.csv", stamp));
    fs::write(&summary_path, exporter::summary_csv(&result)?)?;
    info!("Wrote summary to {:?}", summary_path);

    let errors_path = args.out_dir.join(format!("scraping_errors_{}.csv", stamp));
    fs::write(&errors_path, exporter::errors_csv(&result)?)?;
    info!("Wrote errors to {:?}", errors_path);

    let report_path = args.out_dir.join(format!("all_results_{}.json", stamp));
    fs::write(&report_path, exporter::full_report_json(&result)?)?;
    info!("Wrote full report to {:?}", report_path);

    info!(
        "Scraping completed: {} total, {} succeeded, {} failed.",
        result.total(),
        result.success_count(),
        result.failure_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn defaults_without_arguments() {
        let parsed = args(&[]).unwrap();

        assert_eq!(parsed.input, PathBuf::from("input_urls.csv"));
        assert!(!parsed.markdown);
        assert_eq!(parsed.delay, delay_manager::DEFAULT_DELAY_SECS);
        assert!(parsed.api_key.is_none());
        assert_eq!(parsed.out_dir, PathBuf::from("."));
    }

    #[test]
    fn parses_all_flags() {
        let parsed = args(&[
            "urls.xlsx",
            "--markdown",
            "--delay",
            "2.5",
            "--api-key",
            "secret",
            "--out",
            "results",
        ])
        .unwrap();

        assert_eq!(parsed.input, PathBuf::from("urls.xlsx"));
        assert!(parsed.markdown);
        assert_eq!(parsed.delay, 2.5);
        assert_eq!(parsed.api_key.as_deref(), Some("secret"));
        assert_eq!(parsed.out_dir, PathBuf::from("results"));
    }

    #[test]
    fn rejects_unknown_flags_and_stray_arguments() {
        assert!(args(&["--verbose"]).is_err());
        assert!(args(&["a.csv", "b.csv"]).is_err());
        assert!(args(&["--delay", "fast"]).is_err());
        assert!(args(&["--delay"]).is_err());
    }
}
