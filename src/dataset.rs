/*!
 * Unified dataset API for claims data
 *
 * Provides a builder pattern for loading the claims, reverts and pharmacy
 * folders, and a dataset type that owns the records, the eligibility set and
 * the load statistics.
 */

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{Result, RxError};
use crate::analytics::{ClaimsAnalytics, Reports};
use crate::config::RxConfig;
use crate::constants::*;
use crate::data_types::*;
use crate::eligibility::EligiblePharmacies;
use crate::reader::{ClaimsReader, SourceReport};

/// Builder for loading a claims dataset
///
/// # Example
/// ```no_run
/// # use rxclaims::dataset::ClaimsDatasetBuilder;
/// let dataset = ClaimsDatasetBuilder::new()
///     .claims_dir("topics/claims")
///     .reverts_dir("topics/reverts")
///     .pharmacies_dir("topics/pharmacies")
///     .build()?;
/// # Ok::<(), rxclaims::RxError>(())
/// ```
pub struct ClaimsDatasetBuilder {
    claims_dir: Option<PathBuf>,
    reverts_dir: Option<PathBuf>,
    pharmacies_dir: Option<PathBuf>,
    skip_invalid_records: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for ClaimsDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsDatasetBuilder {
    /// Create a new dataset builder
    pub fn new() -> Self {
        Self {
            claims_dir: None,
            reverts_dir: None,
            pharmacies_dir: None,
            skip_invalid_records: true,
            #[cfg(feature = "progress")]
            show_progress: false,
        }
    }

    /// Set the folder holding claims JSON files
    pub fn claims_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.claims_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the folder holding reverts JSON files
    pub fn reverts_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.reverts_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the folder holding pharmacy directory CSV files
    pub fn pharmacies_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pharmacies_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enable or disable skipping malformed records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable progress bars
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Point the builder at the standard folders of a data directory
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Self::check_directory(dir)?;

        Ok(Self::new()
            .claims_dir(dir.join(CLAIMS_FOLDER))
            .reverts_dir(dir.join(REVERTS_FOLDER))
            .pharmacies_dir(dir.join(PHARMACIES_FOLDER)))
    }

    /// Like [`from_directory`](Self::from_directory), with folder names and
    /// loading options taken from a configuration
    pub fn from_config<P: AsRef<Path>>(dir: P, config: &RxConfig) -> Result<Self> {
        let dir = dir.as_ref();
        Self::check_directory(dir)?;

        let builder = Self::new()
            .claims_dir(dir.join(&config.claims_folder))
            .reverts_dir(dir.join(&config.reverts_folder))
            .pharmacies_dir(dir.join(&config.pharmacies_folder))
            .skip_invalid_records(config.skip_invalid_records);

        #[cfg(feature = "progress")]
        let builder = builder.show_progress(config.enable_progress_bar);

        Ok(builder)
    }

    fn check_directory(dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(RxError::Custom {
                message: format!("'{}' is not a directory", dir.display()),
                suggestion: Some(format!(
                    "Provide a directory containing the '{}', '{}' and '{}' folders",
                    CLAIMS_FOLDER, REVERTS_FOLDER, PHARMACIES_FOLDER
                )),
            });
        }
        Ok(())
    }

    /// Build the dataset, loading all three folders
    pub fn build(self) -> Result<ClaimsDataset> {
        let require = |dir: Option<PathBuf>, name: &str| {
            dir.ok_or_else(|| RxError::Custom {
                message: format!("{} folder not specified", name),
                suggestion: Some(
                    "Use ClaimsDatasetBuilder::from_directory() or set every folder".to_string(),
                ),
            })
        };
        let claims_dir = require(self.claims_dir, "Claims")?;
        let reverts_dir = require(self.reverts_dir, "Reverts")?;
        let pharmacies_dir = require(self.pharmacies_dir, "Pharmacies")?;

        let reader = ClaimsReader::new()
            .with_skip_invalid_records(self.skip_invalid_records);

        #[cfg(feature = "progress")]
        let reader = reader.with_progress_bar(self.show_progress);

        let pharmacies = reader.load_pharmacies(&pharmacies_dir)?;
        let claims = reader.load_claims(&claims_dir)?;
        let reverts = reader.load_reverts(&reverts_dir)?;

        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies.records);

        let dataset = ClaimsDataset {
            claims: claims.records,
            reverts: reverts.records,
            pharmacies: pharmacies.records,
            eligible,
            load_report: LoadReport {
                claims: claims.report,
                reverts: reverts.report,
                pharmacies: pharmacies.report,
            },
        };

        tracing::info!(
            claims = dataset.claims.len(),
            reverts = dataset.reverts.len(),
            pharmacies = dataset.pharmacies.len(),
            eligible_pharmacies = dataset.eligible.len(),
            "dataset loaded"
        );

        Ok(dataset)
    }
}

/// Per-source load statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub claims: SourceReport,
    pub reverts: SourceReport,
    pub pharmacies: SourceReport,
}

impl LoadReport {
    /// Malformed records skipped across all sources
    pub fn skipped_records(&self) -> usize {
        self.claims.skipped + self.reverts.skipped + self.pharmacies.skipped
    }

    /// Unreadable files skipped across all sources
    pub fn skipped_files(&self) -> usize {
        self.claims.skipped_files + self.reverts.skipped_files + self.pharmacies.skipped_files
    }
}

/// Loaded claims data with its eligibility set
#[derive(Debug)]
pub struct ClaimsDataset {
    pub claims: Vec<Claim>,
    pub reverts: Vec<Revert>,
    pub pharmacies: Vec<Pharmacy>,
    eligible: EligiblePharmacies,
    load_report: LoadReport,
}

impl ClaimsDataset {
    /// Assemble a dataset from in-memory records
    pub fn from_records(
        claims: Vec<Claim>,
        reverts: Vec<Revert>,
        pharmacies: Vec<Pharmacy>,
    ) -> Self {
        let eligible = EligiblePharmacies::from_pharmacies(&pharmacies);
        Self {
            claims,
            reverts,
            pharmacies,
            eligible,
            load_report: LoadReport::default(),
        }
    }

    /// Load the standard folders of a data directory
    ///
    /// # Example
    /// ```no_run
    /// # use rxclaims::dataset::ClaimsDataset;
    /// let dataset = ClaimsDataset::load_standard("./topics")?;
    /// # Ok::<(), rxclaims::RxError>(())
    /// ```
    pub fn load_standard<P: AsRef<Path>>(dir: P) -> Result<Self> {
        ClaimsDatasetBuilder::from_directory(dir)?.build()
    }

    /// Pharmacies whose claims reach the reports
    pub fn eligible(&self) -> &EligiblePharmacies {
        &self.eligible
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Get an analytics engine over this dataset
    pub fn analytics(&self) -> ClaimsAnalytics<'_> {
        ClaimsAnalytics::new(&self.claims, &self.reverts, &self.pharmacies, &self.eligible)
    }

    /// Compute all reports with default settings
    pub fn reports(&self) -> Reports {
        self.analytics().reports()
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics::from_dataset(self)
    }
}

/// Summary statistics of a loaded dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatistics {
    pub total_claims: usize,
    pub total_reverts: usize,
    pub total_pharmacies: usize,
    pub eligible_pharmacies: usize,
    pub chains: usize,
    pub distinct_drugs: usize,
    /// Claims whose NPI is missing from the pharmacy directory
    pub unmatched_claims: usize,
    /// Claims with at least one revert
    pub reverted_claims: usize,
    pub earliest_claim: Option<NaiveDateTime>,
    pub latest_claim: Option<NaiveDateTime>,
    pub skipped_records: usize,
    pub skipped_files: usize,
}

impl DatasetStatistics {
    pub fn from_dataset(dataset: &ClaimsDataset) -> Self {
        let reverted_ids: HashSet<&str> = dataset
            .reverts
            .iter()
            .map(|r| r.claim_id.as_str())
            .collect();

        let chains: HashSet<&str> = dataset.pharmacies.iter().map(|p| p.chain.as_str()).collect();
        let drugs: HashSet<&Ndc> = dataset.claims.iter().map(|c| &c.ndc).collect();
        let timestamps = dataset.claims.iter().filter_map(|c| c.timestamp);

        Self {
            total_claims: dataset.claims.len(),
            total_reverts: dataset.reverts.len(),
            total_pharmacies: dataset.pharmacies.len(),
            eligible_pharmacies: dataset.eligible.len(),
            chains: chains.len(),
            distinct_drugs: drugs.len(),
            unmatched_claims: dataset.analytics().unmatched_claims(),
            reverted_claims: dataset
                .claims
                .iter()
                .filter(|c| reverted_ids.contains(c.id.as_str()))
                .count(),
            earliest_claim: timestamps.clone().min(),
            latest_claim: timestamps.max(),
            skipped_records: dataset.load_report.skipped_records(),
            skipped_files: dataset.load_report.skipped_files(),
        }
    }

    /// Print a human-readable summary to stdout
    pub fn print_summary(&self) {
        println!("=== Claims Dataset Statistics ===");
        println!("Claims: {}", self.total_claims);
        println!("  Reverted: {}", self.reverted_claims);
        println!("  From unknown pharmacies: {}", self.unmatched_claims);
        println!("Reverts: {}", self.total_reverts);
        println!("Pharmacy listings: {} ({} NPIs, {} chains)",
            self.total_pharmacies, self.eligible_pharmacies, self.chains);
        println!("Distinct drugs: {}", self.distinct_drugs);
        if let (Some(first), Some(last)) = (self.earliest_claim, self.latest_claim) {
            println!("Claim period: {} .. {}", first, last);
        }
        if self.skipped_records > 0 || self.skipped_files > 0 {
            println!("Skipped: {} malformed records, {} unreadable files",
                self.skipped_records, self.skipped_files);
        }
    }
}
