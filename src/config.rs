/*!
 * Configuration support for rxclaims
 *
 * Provides runtime configuration options for loading inputs and shaping
 * reports. Settings are layered: built-in defaults, then a TOML file, then
 * `RXCLAIMS_*` environment variables.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::recommendation::DEFAULT_TOP_CHAINS;
use crate::quantity::DEFAULT_MAX_QUANTITY_RANK;
use crate::{ExportFormat, Result, RxError};

/// Environment variable prefix, e.g. `RXCLAIMS_TOP_CHAINS=3`
pub const ENV_PREFIX: &str = "RXCLAIMS";

/// Global configuration for rxclaims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    /// Whether to show progress bars while loading folders
    pub enable_progress_bar: bool,

    /// Number of threads for parallel operations (None = use all available)
    pub parallel_threads: Option<usize>,

    /// Whether to skip malformed records during loading
    pub skip_invalid_records: bool,

    /// Chains kept per drug in the recommendation report
    pub top_chains: usize,

    /// Highest dense rank kept per drug in the common-quantity report
    pub max_quantity_rank: usize,

    /// Directory reports are written to (None = the data directory)
    pub output_dir: Option<PathBuf>,

    /// Report format
    pub default_export_format: ExportFormat,

    /// Whether to pretty-print JSON reports
    pub pretty_print: bool,

    /// Folder names inside the data directory
    pub claims_folder: String,
    pub reverts_folder: String,
    pub pharmacies_folder: String,
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: true,
            parallel_threads: None,
            skip_invalid_records: true,
            top_chains: DEFAULT_TOP_CHAINS,
            max_quantity_rank: DEFAULT_MAX_QUANTITY_RANK,
            output_dir: None,
            default_export_format: ExportFormat::Json,
            pretty_print: true,
            claims_folder: CLAIMS_FOLDER.to_string(),
            reverts_folder: REVERTS_FOLDER.to_string(),
            pharmacies_folder: PHARMACIES_FOLDER.to_string(),
        }
    }
}

impl RxConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| RxError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RxError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/rxclaims/config.toml` on Linux,
    /// the platform equivalent elsewhere
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rxclaims")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load layered configuration: defaults, then the TOML file at `path`
    /// (or the default location when `None`), then `RXCLAIMS_*` variables.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load_layered(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(config_error)?;

        let mut builder = config::Config::builder().add_source(defaults);

        match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(RxError::file_not_found_with_suggestion(path.to_path_buf()));
                }
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_config_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to
    /// built-in defaults when the layered sources are unusable
    pub fn load() -> Self {
        Self::load_layered(None).unwrap_or_else(|e| {
            tracing::warn!("ignoring configuration: {}", e);
            Self::default()
        })
    }

    /// Reject settings that would produce empty reports by construction
    pub fn validate(&self) -> Result<()> {
        if self.top_chains == 0 {
            return Err(RxError::Configuration {
                message: "top_chains must be at least 1".to_string(),
                suggestion: Some(format!("Use the default of {}", DEFAULT_TOP_CHAINS)),
            });
        }
        if self.max_quantity_rank == 0 {
            return Err(RxError::Configuration {
                message: "max_quantity_rank must be at least 1".to_string(),
                suggestion: Some(format!("Use the default of {}", DEFAULT_MAX_QUANTITY_RANK)),
            });
        }
        Ok(())
    }

    /// Create a configuration optimized for performance
    pub fn performance() -> Self {
        Self {
            enable_progress_bar: false,
            parallel_threads: None, // Use all available
            skip_invalid_records: true,
            pretty_print: false,
            ..Self::default()
        }
    }

    /// Create a configuration optimized for safety and validation
    pub fn safe() -> Self {
        Self {
            enable_progress_bar: true,
            parallel_threads: Some(1), // Single-threaded for predictability
            skip_invalid_records: false,
            ..Self::default()
        }
    }
}

fn config_error(err: config::ConfigError) -> RxError {
    RxError::Configuration {
        message: err.to_string(),
        suggestion: Some(format!(
            "Check the config file and {}_* environment variables",
            ENV_PREFIX
        )),
    }
}

// Global configuration support
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<RxConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: RxConfig) {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(config);
}

/// Get the global configuration (or the layered default if not set)
pub fn global_config() -> RxConfig {
    let current = GLOBAL_CONFIG
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    current.unwrap_or_else(RxConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    let mut guard = GLOBAL_CONFIG.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = None;
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: RxConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: RxConfig::default(),
        }
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Set number of parallel threads
    pub fn parallel_threads(mut self, threads: Option<usize>) -> Self {
        self.config.parallel_threads = threads;
        self
    }

    /// Set skip invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.config.skip_invalid_records = skip;
        self
    }

    /// Set chains kept per drug
    pub fn top_chains(mut self, n: usize) -> Self {
        self.config.top_chains = n;
        self
    }

    /// Set highest quantity rank kept per drug
    pub fn max_quantity_rank(mut self, rank: usize) -> Self {
        self.config.max_quantity_rank = rank;
        self
    }

    /// Set report output directory
    pub fn output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set report format
    pub fn export_format(mut self, format: ExportFormat) -> Self {
        self.config.default_export_format = format;
        self
    }

    /// Set JSON pretty printing
    pub fn pretty_print(mut self, pretty: bool) -> Self {
        self.config.pretty_print = pretty;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RxConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = RxConfig::default();
        assert!(config.skip_invalid_records);
        assert_eq!(config.top_chains, 2);
        assert_eq!(config.max_quantity_rank, 5);
        assert_eq!(config.claims_folder, "claims");
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .progress_bar(false)
            .parallel_threads(Some(4))
            .skip_invalid_records(false)
            .top_chains(3)
            .export_format(ExportFormat::Csv)
            .build();

        assert!(!config.enable_progress_bar);
        assert_eq!(config.parallel_threads, Some(4));
        assert!(!config.skip_invalid_records);
        assert_eq!(config.top_chains, 3);
        assert_eq!(config.default_export_format, ExportFormat::Csv);
    }

    #[test]
    fn test_file_round_trip_and_partial_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = ConfigBuilder::new().top_chains(4).build();
        config.save(&path).unwrap();
        assert_eq!(RxConfig::from_file(&path).unwrap(), config);

        std::fs::write(&path, "max_quantity_rank = 3\n").unwrap();
        let partial = RxConfig::from_file(&path).unwrap();
        assert_eq!(partial.max_quantity_rank, 3);
        assert_eq!(partial.top_chains, 2);
    }

    #[test]
    fn test_layered_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rx.toml");
        std::fs::write(&path, "top_chains = 3\npretty_print = false\n").unwrap();

        let config = RxConfig::load_layered(Some(&path)).unwrap();
        assert_eq!(config.top_chains, 3);
        assert!(!config.pretty_print);
        assert_eq!(config.max_quantity_rank, 5);
    }

    #[test]
    fn test_export_format_accepts_cli_spelling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rx.toml");

        std::fs::write(&path, "default_export_format = \"jsonl\"\n").unwrap();
        let config = RxConfig::from_file(&path).unwrap();
        assert_eq!(config.default_export_format, ExportFormat::JsonLines);

        std::fs::write(&path, "default_export_format = \"jsonlines\"\n").unwrap();
        let layered = RxConfig::load_layered(Some(&path)).unwrap();
        assert_eq!(layered.default_export_format, ExportFormat::JsonLines);
    }

    #[test]
    fn test_layered_missing_explicit_file() {
        let err = RxConfig::load_layered(Some(Path::new("/no/such/rx.toml"))).unwrap_err();
        assert!(matches!(err, RxError::FileNotFound { .. }));
    }

    #[test]
    fn test_global_config_set_and_clear() {
        set_global_config(RxConfig::safe());
        assert!(!global_config().skip_invalid_records);
        clear_global_config();
        assert!(GLOBAL_CONFIG.read().unwrap().is_none());
    }

    #[test]
    fn test_zero_top_chains_rejected() {
        let config = ConfigBuilder::new().top_chains(0).build();
        assert!(matches!(config.validate(), Err(RxError::Configuration { .. })));
    }
}
