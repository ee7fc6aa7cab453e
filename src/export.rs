/*!
 * Export functionality for claims reports
 *
 * Each report is written to its own file named after the report and the
 * export format (`json_df_counts.json`, `json_df_recom.csv`, ...).
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::{Result, RxError, ExportFormat};
use crate::analytics::Reports;
use crate::constants::*;
use crate::data_types::*;

/// Trait for implementing report exporters
pub trait ReportExporter {
    /// Write fill metrics
    fn export_metrics(&self, rows: &[MetricRow], path: &Path) -> Result<()>;

    /// Write chain recommendations
    fn export_recommendations(
        &self,
        recommendations: &[ChainRecommendation],
        path: &Path,
    ) -> Result<()>;

    /// Write common quantities
    fn export_common_quantities(&self, quantities: &[CommonQuantity], path: &Path) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// JSON exporter for reports
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Whether to export as JSON Lines (one record per line)
    pub json_lines: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            json_lines: false,
        }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    /// Set JSON Lines format
    pub fn as_json_lines(mut self) -> Self {
        self.json_lines = true;
        self.pretty_print = false; // JSON Lines shouldn't be pretty printed
        self
    }

    fn write_records<T: Serialize>(&self, records: &[T], path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| RxError::from(e).with_file(path))?;
        let mut writer = BufWriter::new(file);

        if self.json_lines {
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        } else if self.pretty_print {
            serde_json::to_writer_pretty(&mut writer, records)?;
        } else {
            serde_json::to_writer(&mut writer, records)?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl ReportExporter for JsonExporter {
    fn export_metrics(&self, rows: &[MetricRow], path: &Path) -> Result<()> {
        self.write_records(rows, path)
    }

    fn export_recommendations(
        &self,
        recommendations: &[ChainRecommendation],
        path: &Path,
    ) -> Result<()> {
        self.write_records(recommendations, path)
    }

    fn export_common_quantities(&self, quantities: &[CommonQuantity], path: &Path) -> Result<()> {
        self.write_records(quantities, path)
    }

    fn format(&self) -> ExportFormat {
        if self.json_lines {
            ExportFormat::JsonLines
        } else {
            ExportFormat::Json
        }
    }
}

/// CSV exporter for reports
///
/// Nested reports are flattened: one row per (drug, chain) with its rank, and
/// one row per (drug, quantity).
pub struct CsvExporter {
    /// Whether to include headers
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

#[derive(Serialize)]
struct ChainRow<'a> {
    ndc: &'a str,
    rank: usize,
    chain: &'a str,
    avg_price: f64,
}

#[derive(Serialize)]
struct QuantityRow<'a> {
    ndc: &'a str,
    quantity: i64,
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enable or disable the header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    fn write_rows<T, I>(&self, rows: I, path: &Path) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.include_headers)
            .from_path(path)
            .map_err(|e| RxError::from(e).with_file(path))?;

        for row in rows {
            writer.serialize(row).map_err(|e| self.export_error(e, path))?;
        }

        writer.flush()?;
        Ok(())
    }

    fn export_error(&self, err: csv::Error, path: &Path) -> RxError {
        RxError::Export {
            message: format!("Failed to write '{}': {}", path.display(), err),
            format: ExportFormat::Csv,
            suggestion: None,
        }
    }
}

impl ReportExporter for CsvExporter {
    fn export_metrics(&self, rows: &[MetricRow], path: &Path) -> Result<()> {
        self.write_rows(rows, path)
    }

    fn export_recommendations(
        &self,
        recommendations: &[ChainRecommendation],
        path: &Path,
    ) -> Result<()> {
        let rows = recommendations.iter().flat_map(|rec| {
            rec.chain.iter().enumerate().map(move |(idx, chain)| ChainRow {
                ndc: rec.ndc.as_str(),
                rank: idx + 1,
                chain: &chain.name,
                avg_price: chain.avg_price,
            })
        });
        self.write_rows(rows, path)
    }

    fn export_common_quantities(&self, quantities: &[CommonQuantity], path: &Path) -> Result<()> {
        let rows = quantities.iter().flat_map(|q| {
            q.most_prescribed_quantity.iter().map(move |&quantity| QuantityRow {
                ndc: q.ndc.as_str(),
                quantity,
            })
        });
        self.write_rows(rows, path)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Get an exporter for a format
pub fn exporter_for(format: ExportFormat, pretty_print: bool) -> Box<dyn ReportExporter> {
    match format {
        ExportFormat::Json => Box::new(JsonExporter::new().with_pretty_print(pretty_print)),
        ExportFormat::JsonLines => Box::new(JsonExporter::new().as_json_lines()),
        ExportFormat::Csv => Box::new(CsvExporter::new()),
    }
}

/// Paths of the three report files in `dir`
pub fn report_paths(dir: &Path, format: ExportFormat) -> [PathBuf; 3] {
    let path = |stem: &str| dir.join(format!("{}.{}", stem, format.extension()));
    [
        path(METRICS_REPORT),
        path(RECOMMENDATIONS_REPORT),
        path(COMMON_QUANTITIES_REPORT),
    ]
}

/// Write all three reports into `dir` (created if needed) and return the
/// written paths
pub fn write_reports<P: AsRef<Path>>(
    dir: P,
    reports: &Reports,
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    write_reports_with(dir.as_ref(), reports, exporter_for(format, true).as_ref())
}

/// Write all three reports with a specific exporter
pub fn write_reports_with(
    dir: &Path,
    reports: &Reports,
    exporter: &dyn ReportExporter,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| RxError::from(e).with_file(dir))?;

    let [metrics, recommendations, quantities] = report_paths(dir, exporter.format());
    exporter.export_metrics(&reports.metrics, &metrics)?;
    exporter.export_recommendations(&reports.recommendations, &recommendations)?;
    exporter.export_common_quantities(&reports.common_quantities, &quantities)?;

    tracing::info!(
        dir = %dir.display(),
        format = %exporter.format(),
        "reports written"
    );

    Ok(vec![metrics, recommendations, quantities])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_reports() -> Reports {
        Reports {
            metrics: vec![MetricRow {
                npi: Npi::new("1"),
                ndc: Ndc::new("D1"),
                fills: 2,
                reverted: 1,
                avg_price: 7.5,
                total_price: 15.0,
            }],
            recommendations: vec![ChainRecommendation {
                ndc: Ndc::new("D1"),
                chain: vec![
                    ChainPrice { name: "saver".into(), avg_price: 5.0 },
                    ChainPrice { name: "health".into(), avg_price: 10.0 },
                ],
            }],
            common_quantities: vec![CommonQuantity {
                ndc: Ndc::new("D1"),
                most_prescribed_quantity: vec![60, 30],
            }],
        }
    }

    #[test]
    fn test_json_reports_are_plain_arrays() {
        let dir = TempDir::new().unwrap();
        let paths = write_reports(dir.path(), &sample_reports(), ExportFormat::Json).unwrap();
        assert!(paths[0].ends_with("json_df_counts.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths[1]).unwrap()).unwrap();
        assert_eq!(value[0]["ndc"], "D1");
        assert_eq!(value[0]["chain"][0]["name"], "saver");
        assert_eq!(value[0]["chain"][1]["avg_price"], 10.0);

        let counts: Vec<MetricRow> =
            serde_json::from_str(&std::fs::read_to_string(&paths[0]).unwrap()).unwrap();
        assert_eq!(counts, sample_reports().metrics);
    }

    #[test]
    fn test_json_lines_one_record_per_line() {
        let dir = TempDir::new().unwrap();
        let paths = write_reports(dir.path(), &sample_reports(), ExportFormat::JsonLines).unwrap();
        assert!(paths[2].ends_with("json_df_common.jsonl"));

        let contents = std::fs::read_to_string(&paths[2]).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines, vec![r#"{"ndc":"D1","most_prescribed_quantity":[60,30]}"#]);
    }

    #[test]
    fn test_csv_flattens_nested_reports() {
        let dir = TempDir::new().unwrap();
        let paths = write_reports(dir.path(), &sample_reports(), ExportFormat::Csv).unwrap();

        let counts = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(counts, "npi,ndc,fills,reverted,avg_price,total_price\n1,D1,2,1,7.5,15.0\n");

        let recom = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(recom, "ndc,rank,chain,avg_price\nD1,1,saver,5.0\nD1,2,health,10.0\n");

        let common = std::fs::read_to_string(&paths[2]).unwrap();
        assert_eq!(common, "ndc,quantity\nD1,60\nD1,30\n");
    }

    #[test]
    fn test_empty_reports_still_write_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let paths = write_reports(out, &Reports::default(), ExportFormat::Json).unwrap();
        for path in paths {
            assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "[]");
        }
    }
}
