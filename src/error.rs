use std::string::FromUtf8Error;
use thiserror::Error;

/// Fatal load-time failures. Per-row problems (empty cells, implausible URLs)
/// are skipped and counted, never raised.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported input format {0:?}, expected .csv, .xlsx or .xls")]
    UnsupportedFormat(String),

    #[error("could not read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no API key configured, pass one explicitly or set SERPER_API_KEY")]
    MissingCredential,

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not serialize CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("could not serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not flush export buffer: {0}")]
    Io(#[from] std::io::Error),

    #[error("export produced invalid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}
