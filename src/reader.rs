/*!
 * Readers for the claims, reverts and pharmacy folders
 *
 * Each input is a folder of files: claims and reverts are JSON arrays of
 * objects, the pharmacy directory is CSV. Files are read in file-name order
 * and concatenated. Records missing a required field are malformed: they are
 * skipped and counted, or rejected when `skip_invalid_records` is off.
 */

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use csv::ReaderBuilder;
use serde_json::Value;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Result, RxError, ErrorContext,
    data_types::*,
    schema::{PharmacySchema, PharmacyColumns},
    constants::*,
};

/// Number of malformed records per file that are logged individually
const MAX_LOGGED_INVALID: usize = 10;

/// Load statistics for one input folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    /// Files read from the folder
    pub files: usize,
    /// Records loaded successfully
    pub loaded: usize,
    /// Malformed records that were skipped
    pub skipped: usize,
    /// Files that could not be parsed at all and were skipped
    pub skipped_files: usize,
}

impl SourceReport {
    fn merge(&mut self, other: &SourceReport) {
        self.files += other.files;
        self.loaded += other.loaded;
        self.skipped += other.skipped;
        self.skipped_files += other.skipped_files;
    }
}

/// Records loaded from a folder or file, with their load statistics
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub report: SourceReport,
}

impl<T> Loaded<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            report: SourceReport::default(),
        }
    }

    fn extend(&mut self, other: Loaded<T>) {
        self.records.extend(other.records);
        self.report.merge(&other.report);
    }
}

/// Reader for claims, reverts and pharmacy folders
pub struct ClaimsReader {
    /// Whether to skip malformed records (true) or fail on the first one (false)
    skip_invalid_records: bool,
    /// Whether to show a progress bar while reading folders
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for ClaimsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsReader {
    /// Create a reader that skips malformed records
    pub fn new() -> Self {
        Self {
            skip_invalid_records: true,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    /// Enable or disable skipping malformed records
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// List the files of a folder, optionally only those with the given
    /// extension, sorted by file name
    pub fn list_folder<P: AsRef<Path>>(dir: P, extension: Option<&str>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(RxError::file_not_found_with_suggestion(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let matches = match extension {
                Some(ext) => path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case(ext))
                    .unwrap_or(false),
                None => true,
            };
            if matches {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load every claims file in a folder
    pub fn load_claims<P: AsRef<Path>>(&self, dir: P) -> Result<Loaded<Claim>> {
        self.load_folder(dir.as_ref(), JSON_EXTENSION, "claims", |path| {
            self.read_claims_file(path)
        })
    }

    /// Load every reverts file in a folder
    pub fn load_reverts<P: AsRef<Path>>(&self, dir: P) -> Result<Loaded<Revert>> {
        self.load_folder(dir.as_ref(), JSON_EXTENSION, "reverts", |path| {
            self.read_reverts_file(path)
        })
    }

    /// Load every pharmacy directory file in a folder
    pub fn load_pharmacies<P: AsRef<Path>>(&self, dir: P) -> Result<Loaded<Pharmacy>> {
        self.load_folder(dir.as_ref(), CSV_EXTENSION, "pharmacies", |path| {
            self.read_pharmacies_file(path)
        })
    }

    /// Read a single claims JSON file
    pub fn read_claims_file<P: AsRef<Path>>(&self, path: P) -> Result<Loaded<Claim>> {
        let path = path.as_ref();
        self.read_json_records(path, |value, context| {
            let raw: RawClaim = serde_json::from_value(value)
                .map_err(|e| malformed_json(e, context.clone()))?;
            raw.into_claim(context)
        })
    }

    /// Read a single reverts JSON file
    pub fn read_reverts_file<P: AsRef<Path>>(&self, path: P) -> Result<Loaded<Revert>> {
        let path = path.as_ref();
        self.read_json_records(path, |value, context| {
            let raw: RawRevert = serde_json::from_value(value)
                .map_err(|e| malformed_json(e, context.clone()))?;
            raw.into_revert(context)
        })
    }

    /// Read a single pharmacy directory CSV file
    pub fn read_pharmacies_file<P: AsRef<Path>>(&self, path: P) -> Result<Loaded<Pharmacy>> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RxError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| RxError::from(e).with_file(path))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| RxError::from(e).with_file(path))?
            .iter()
            .map(|s| s.to_string())
            .collect();
        let columns = PharmacySchema::validate_headers(&headers)?;

        let mut loaded = Loaded::empty();
        loaded.report.files = 1;

        for (idx, result) in reader.records().enumerate() {
            let context = ErrorContext::record(path, idx);
            let parsed = result
                .map_err(|e| RxError::CsvParse {
                    message: e.to_string(),
                    line: Some(idx + 2), // +2 for header and 0-based index
                    context: context.clone(),
                })
                .and_then(|record| parse_pharmacy_record(&record, columns, context));

            self.accept(parsed, &mut loaded)?;
        }

        tracing::debug!(
            file = %path.display(),
            loaded = loaded.report.loaded,
            skipped = loaded.report.skipped,
            "read pharmacy file"
        );

        Ok(loaded)
    }

    fn read_json_records<T, F>(&self, path: &Path, convert: F) -> Result<Loaded<T>>
    where
        F: Fn(Value, ErrorContext) -> Result<T>,
    {
        if !path.exists() {
            return Err(RxError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let mut loaded = Loaded::empty();
        loaded.report.files = 1;

        let file = File::open(path).map_err(|e| RxError::from(e).with_file(path))?;
        let values = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| e.to_string())
            .and_then(|document: Value| match document {
                Value::Array(values) => Ok(values),
                Value::Object(_) => Ok(vec![document]),
                other => Err(format!("expected an array of records, found {}", json_kind(&other))),
            });

        let values = match values {
            Ok(values) => values,
            Err(message) => {
                let error = RxError::JsonParse {
                    message,
                    context: ErrorContext::file(path),
                };
                if self.skip_invalid_records {
                    tracing::warn!(file = %path.display(), "skipping unreadable file: {}", error);
                    loaded.report.skipped_files = 1;
                    return Ok(loaded);
                }
                return Err(error);
            }
        };

        for (idx, value) in values.into_iter().enumerate() {
            let parsed = convert(value, ErrorContext::record(path, idx));
            self.accept(parsed, &mut loaded)?;
        }

        tracing::debug!(
            file = %path.display(),
            loaded = loaded.report.loaded,
            skipped = loaded.report.skipped,
            "read JSON file"
        );

        Ok(loaded)
    }

    /// Keep a parsed record or account for a malformed one
    fn accept<T>(&self, parsed: Result<T>, loaded: &mut Loaded<T>) -> Result<()> {
        match parsed {
            Ok(record) => {
                loaded.records.push(record);
                loaded.report.loaded += 1;
                Ok(())
            }
            Err(e) if self.skip_invalid_records => {
                loaded.report.skipped += 1;
                if loaded.report.skipped <= MAX_LOGGED_INVALID {
                    tracing::warn!("Skipping invalid record: {}", e.user_message());
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn load_folder<T, F>(
        &self,
        dir: &Path,
        extension: &str,
        label: &str,
        read: F,
    ) -> Result<Loaded<T>>
    where
        T: Send,
        F: Fn(&Path) -> Result<Loaded<T>> + Sync,
    {
        let files = Self::list_folder(dir, Some(extension))?;
        let start_time = Instant::now();

        if files.is_empty() {
            tracing::warn!(folder = %dir.display(), "no .{} files found for {}", extension, label);
        }

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar && !files.is_empty() {
            let pb = ProgressBar::new(files.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(label.to_string());
            Some(pb)
        } else {
            None
        };

        let read_one = |path: &PathBuf| {
            let result = read(path.as_path());
            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
            result
        };

        #[cfg(feature = "parallel")]
        let per_file: Vec<Loaded<T>> = {
            use rayon::prelude::*;
            files.par_iter().map(read_one).collect::<Result<Vec<_>>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let per_file: Vec<Loaded<T>> = files.iter().map(read_one).collect::<Result<Vec<_>>>()?;

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message(format!("{} loaded", label));
        }

        let mut loaded = Loaded::empty();
        for file in per_file {
            loaded.extend(file);
        }

        tracing::info!(
            source = label,
            files = loaded.report.files,
            loaded = loaded.report.loaded,
            skipped = loaded.report.skipped,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "loaded {} {} records",
            loaded.report.loaded,
            label
        );

        if loaded.report.skipped > 0 {
            tracing::warn!(
                source = label,
                "skipped {} malformed {} records",
                loaded.report.skipped,
                label
            );
        }

        Ok(loaded)
    }
}

fn parse_pharmacy_record(
    record: &csv::StringRecord,
    columns: PharmacyColumns,
    context: ErrorContext,
) -> Result<Pharmacy> {
    let get_field = |index: usize| -> Option<String> {
        record
            .get(index)
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    };

    let npi = get_field(columns.npi)
        .ok_or_else(|| RxError::missing_field(PharmacySchema::NPI, context.clone()))?;
    let chain = get_field(columns.chain)
        .ok_or_else(|| RxError::missing_field(PharmacySchema::CHAIN, context))?;

    Ok(Pharmacy::new(npi.as_str(), chain))
}

fn malformed_json(err: serde_json::Error, context: ErrorContext) -> RxError {
    RxError::DataValidation {
        message: err.to_string(),
        field: None,
        value: None,
        context,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
