use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use log::{info, warn};
use url::Url;

use crate::error::LoadError;

/// Header the URL column is matched against, case-insensitively.
pub const URL_COLUMN: &str = "url";

/// One usable input row, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub raw_value: String,
    /// 1-based data row number (header row excluded).
    pub row_index: usize,
}

/// How the URL-bearing column was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelection {
    /// A header matched `URL_COLUMN` exactly (ignoring case).
    Named(String),
    /// No header matched; the first column was used instead.
    FirstColumnFallback(String),
}

#[derive(Debug)]
pub struct LoadedInput {
    pub records: Vec<UrlRecord>,
    /// `None` only when the file had no header row at all.
    pub column: Option<ColumnSelection>,
    /// Rows whose selected cell was empty or not a plausible URL.
    pub skipped_rows: usize,
}

/// Loads URLs from a CSV or Excel file. Unknown extensions are fatal; rows
/// without a usable URL are skipped and counted. A file with zero usable rows
/// loads successfully with an empty record list.
pub fn load_urls<P: AsRef<Path>>(path: P) -> Result<LoadedInput, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => load_csv(path),
        "xlsx" | "xls" => load_excel(path),
        _ => Err(LoadError::UnsupportedFormat(extension)),
    }
}

fn is_plausible_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

fn pick_column(headers: &[String]) -> Option<(usize, ColumnSelection)> {
    if let Some(idx) = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(URL_COLUMN))
    {
        return Some((idx, ColumnSelection::Named(headers[idx].clone())));
    }
    headers
        .first()
        .map(|h| (0, ColumnSelection::FirstColumnFallback(h.clone())))
}

fn report_column(path: &Path, column: &ColumnSelection) {
    match column {
        ColumnSelection::Named(name) => info!("Using URL column {:?} from {:?}", name, path),
        ColumnSelection::FirstColumnFallback(name) => {
            warn!(
                "No 'url' column found in {:?}. Using first column {:?} instead.",
                path, name
            );
        }
    }
}

fn load_csv(path: &Path) -> Result<LoadedInput, LoadError> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let Some((col_idx, column)) = pick_column(&headers) else {
        warn!("Input {:?} has no header row. Nothing to load.", path);
        return Ok(LoadedInput {
            records: Vec::new(),
            column: None,
            skipped_rows: 0,
        });
    };
    report_column(path, &column);

    let mut records = Vec::new();
    let mut skipped_rows = 0;
    for (row_idx, result) in rdr.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unreadable CSV row {}: {}", row_idx + 1, e);
                skipped_rows += 1;
                continue;
            }
        };
        let cell = row.get(col_idx).unwrap_or("").trim();
        if cell.is_empty() || !is_plausible_url(cell) {
            skipped_rows += 1;
            continue;
        }
        records.push(UrlRecord {
            raw_value: cell.to_string(),
            row_index: row_idx + 1,
        });
    }

    info!(
        "Loaded {} URLs from CSV {:?} ({} rows skipped)",
        records.len(),
        path,
        skipped_rows
    );
    Ok(LoadedInput {
        records,
        column: Some(column),
        skipped_rows,
    })
}

fn load_excel(path: &Path) -> Result<LoadedInput, LoadError> {
    let mut workbook = open_workbook_auto(path)?;

    let worksheets = workbook.worksheets();
    let Some((_name, range)) = worksheets.first() else {
        warn!("Spreadsheet {:?} has no worksheets. Nothing to load.", path);
        return Ok(LoadedInput {
            records: Vec::new(),
            column: None,
            skipped_rows: 0,
        });
    };

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect(),
        None => Vec::new(),
    };
    let Some((col_idx, column)) = pick_column(&headers) else {
        warn!("Spreadsheet {:?} has no header row. Nothing to load.", path);
        return Ok(LoadedInput {
            records: Vec::new(),
            column: None,
            skipped_rows: 0,
        });
    };
    report_column(path, &column);

    let mut records = Vec::new();
    let mut skipped_rows = 0;
    for (row_idx, row) in rows.enumerate() {
        let cell = row
            .get(col_idx)
            .map(|c| c.to_string())
            .unwrap_or_default();
        let cell = cell.trim();
        if cell.is_empty() || !is_plausible_url(cell) {
            skipped_rows += 1;
            continue;
        }
        records.push(UrlRecord {
            raw_value: cell.to_string(),
            row_index: row_idx + 1,
        });
    }

    info!(
        "Loaded {} URLs from Excel {:?} ({} rows skipped)",
        records.len(),
        path,
        skipped_rows
    );
    Ok(LoadedInput {
        records,
        column: Some(column),
        skipped_rows,
    })
}
