pub mod delay_manager;
pub mod error;
pub mod exporter;
pub mod input_loader;
pub mod logger;
pub mod pipeline;
pub mod scrape_client;

// Exporting types for convenience
pub use error::{ConfigError, ExportError, LoadError};
pub use exporter::RunResult;
pub use input_loader::{ColumnSelection, LoadedInput, UrlRecord};
pub use pipeline::{Progress, ScrapeConfig};
pub use scrape_client::{ScrapeClient, ScrapeOutcome, ScrapeStatus};
