/*!
 * # rxclaims: Pharmacy Claims Analytics
 *
 * A Rust library for turning raw pharmacy dispensing events into three
 * reports: per-pharmacy fill metrics, the cheapest chains per drug, and the
 * most commonly prescribed quantities per drug.
 *
 * ## Features
 *
 * - **Folder Loading**: Claims and reverts from JSON, the pharmacy directory from CSV
 * - **Resilient Parsing**: Malformed records are skipped and counted, or rejected in strict mode
 * - **Eligibility Filter**: Only claims from pharmacies in the directory reach the reports
 * - **Multiple Export Formats**: JSON, JSON Lines and CSV
 * - **Parallel**: Files and report engines run on rayon with the `parallel` feature
 *
 * ## Quick Start
 *
 * ```no_run
 * use rxclaims::prelude::*;
 *
 * # fn main() -> Result<()> {
 * // Load `claims/`, `reverts/` and `pharmacies/` from a data directory
 * let dataset = ClaimsDataset::load_standard("./topics")?;
 *
 * let reports = dataset.reports();
 * println!("{} metric rows", reports.metrics.len());
 *
 * write_reports("./topics", &reports, ExportFormat::Json)?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Loading Data
 *
 * ```no_run
 * # use rxclaims::prelude::*;
 * # fn main() -> Result<()> {
 * let dataset = ClaimsDatasetBuilder::new()
 *     .claims_dir("data/claims")
 *     .reverts_dir("data/reverts")
 *     .pharmacies_dir("data/pharmacies")
 *     .skip_invalid_records(false)
 *     .build()?;
 *
 * dataset.statistics().print_summary();
 * # Ok(())
 * # }
 * ```
 *
 * ## Running Single Reports
 *
 * ```no_run
 * # use rxclaims::prelude::*;
 * # fn main() -> Result<()> {
 * # let dataset = ClaimsDataset::load_standard("./topics")?;
 * let analytics = dataset.analytics().with_top_chains(3);
 * for rec in analytics.chain_recommendations() {
 *     println!("{}: {:?}", rec.ndc, rec.chain);
 * }
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use rxclaims::prelude::*;
 * // Defaults, then ~/.config/rxclaims/config.toml, then RXCLAIMS_* variables
 * let config = RxConfig::load();
 *
 * // Or build your own
 * let config = ConfigBuilder::new()
 *     .progress_bar(false)
 *     .skip_invalid_records(true)
 *     .top_chains(2)
 *     .build();
 * rxclaims::config::set_global_config(config);
 * ```
 */

// Re-export error types from root
pub use error::{RxError, Result, ErrorContext, ExportFormat};

// Public modules
pub mod data_types;
pub mod reader;
pub mod schema;
pub mod error;
pub mod eligibility;
pub mod window;
pub mod metrics;
pub mod recommendation;
pub mod quantity;
pub mod analytics;
pub mod dataset;
pub mod export;
pub mod config;
pub mod logging;
#[cfg(feature = "archive")]
pub mod archive;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use rxclaims::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::reader::{ClaimsReader, Loaded, SourceReport};
    pub use crate::error::{RxError, Result};
    pub use crate::eligibility::EligiblePharmacies;
    pub use crate::analytics::{ClaimsAnalytics, Reports};
    pub use crate::dataset::{ClaimsDataset, ClaimsDatasetBuilder, DatasetStatistics, LoadReport};
    pub use crate::export::{ReportExporter, JsonExporter, CsvExporter, write_reports};
    pub use crate::config::{ConfigBuilder, RxConfig};
    pub use crate::ExportFormat;
}

/// Input layout and output file names
pub mod constants {
    /// Folder names inside the data directory
    pub const CLAIMS_FOLDER: &str = "claims";
    pub const REVERTS_FOLDER: &str = "reverts";
    pub const PHARMACIES_FOLDER: &str = "pharmacies";

    /// Input file extensions
    pub const JSON_EXTENSION: &str = "json";
    pub const CSV_EXTENSION: &str = "csv";

    /// Bundle extracted by `rxcli run --archive` when no path is given
    pub const DEFAULT_ARCHIVE: &str = "./data.tar.gz";
    pub const DEFAULT_EXTRACT_DIR: &str = "topics";

    /// Report file stems; the extension follows the export format
    pub const METRICS_REPORT: &str = "json_df_counts";
    pub const RECOMMENDATIONS_REPORT: &str = "json_df_recom";
    pub const COMMON_QUANTITIES_REPORT: &str = "json_df_common";
}
