/*!
 * Error handling for rxclaims operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// rxclaims result type
pub type Result<T> = std::result::Result<T, RxError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum RxError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        context: ErrorContext,
    },

    /// JSON parsing errors for claim and revert files
    #[error("JSON parsing error: {message}")]
    JsonParse {
        message: String,
        context: ErrorContext,
    },

    /// A record is missing a required field or carries a value of the wrong type
    #[error("Malformed record: {message}")]
    DataValidation {
        message: String,
        field: Option<String>,
        value: Option<String>,
        context: ErrorContext,
    },

    /// File or directory not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Required column missing from a CSV header
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        expected_columns: Vec<String>,
        found_columns: Vec<String>,
    },

    /// Archive extraction errors
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        path: Option<PathBuf>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Export errors
    #[error("Export error: {message}")]
    Export {
        message: String,
        format: ExportFormat,
        suggestion: Option<String>,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub record_index: Option<usize>,
    pub field_name: Option<String>,
}

impl ErrorContext {
    /// Context pointing at a single file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Context pointing at a record inside a file
    pub fn record(path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            file_path: Some(path.into()),
            record_index: Some(index),
            field_name: None,
        }
    }
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    #[serde(alias = "jsonl")]
    JsonLines,
    Csv,
}

impl ExportFormat {
    /// File extension used for reports written in this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::JsonLines => "jsonl",
            ExportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "JSON"),
            ExportFormat::JsonLines => write!(f, "JSON Lines"),
            ExportFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl RxError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let name = path.to_string_lossy();
        let suggestion = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            format!(
                "Check if the archive exists at '{}'. Pass --archive with the path to the \
                data bundle, or skip extraction and point --data-dir at an already extracted \
                folder.",
                path.display()
            )
        } else if name.contains(crate::constants::CLAIMS_FOLDER)
            || name.contains(crate::constants::REVERTS_FOLDER)
            || name.contains(crate::constants::PHARMACIES_FOLDER)
        {
            format!(
                "Check that '{}' exists. The data directory must contain the folders \
                '{}', '{}' and '{}'.",
                path.display(),
                crate::constants::CLAIMS_FOLDER,
                crate::constants::REVERTS_FOLDER,
                crate::constants::PHARMACIES_FOLDER,
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you \
                have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create a malformed-record error for a missing required field
    pub fn missing_field(field: &str, context: ErrorContext) -> Self {
        Self::DataValidation {
            message: format!("Missing required field: {}", field),
            field: Some(field.to_string()),
            value: None,
            context,
        }
    }

    /// Create a malformed-record error for a field holding an unusable value
    pub fn invalid_field(
        field: &str,
        value: impl fmt::Display,
        reason: &str,
        context: ErrorContext,
    ) -> Self {
        Self::DataValidation {
            message: format!("Invalid value for '{}': {}", field, reason),
            field: Some(field.to_string()),
            value: Some(value.to_string()),
            context,
        }
    }

    /// Create a schema mismatch error listing the missing columns
    pub fn missing_columns(expected: &[&str], found: &[String]) -> Self {
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|col| !found.iter().any(|f| f.eq_ignore_ascii_case(col)))
            .collect();

        Self::SchemaMismatch {
            message: format!("Missing required column(s): {}", missing.join(", ")),
            expected_columns: expected.iter().map(|s| s.to_string()).collect(),
            found_columns: found.to_vec(),
        }
    }

    /// Attach a file path to errors that carry an [`ErrorContext`]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match &mut self {
            Self::Io { context, .. }
            | Self::CsvParse { context, .. }
            | Self::JsonParse { context, .. }
            | Self::DataValidation { context, .. } => {
                context.file_path.get_or_insert(path);
            }
            Self::Archive { path: archive_path, .. } => {
                archive_path.get_or_insert(path);
            }
            _ => {}
        }
        self
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::SchemaMismatch { found_columns, .. } => {
                format!("{}\n\nColumns found: {}", self, found_columns.join(", "))
            }
            Self::DataValidation { context, .. } => {
                match (&context.file_path, context.record_index) {
                    (Some(path), Some(index)) => format!(
                        "{}\n\nIn {} (record {}). Enable skip_invalid_records to drop \
                        malformed records instead.",
                        self,
                        path.display(),
                        index
                    ),
                    (Some(path), None) => format!("{}\n\nIn {}", self, path.display()),
                    _ => self.to_string(),
                }
            }
            Self::Configuration { suggestion: Some(sug), .. }
            | Self::Export { suggestion: Some(sug), .. }
            | Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for RxError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for RxError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|pos| pos.line() as usize);

        Self::CsvParse {
            message: err.to_string(),
            line,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for RxError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            context: ErrorContext::default(),
        }
    }
}
