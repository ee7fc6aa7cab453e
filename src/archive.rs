/*!
 * Extraction of gzip-compressed tar bundles holding the input folders
 */

use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::{Result, RxError};

/// Summary of an extracted bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBundle {
    /// Directory the bundle was unpacked into
    pub directory: PathBuf,
    /// Number of regular files written
    pub files: usize,
}

/// Unpack a `.tar.gz` archive into `out_dir`, creating it if needed.
///
/// Entries whose path would escape `out_dir` are rejected.
pub fn extract_tar_gz<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_path: P,
    out_dir: Q,
) -> Result<ExtractedBundle> {
    let archive_path = archive_path.as_ref();
    let out_dir = out_dir.as_ref();

    if !archive_path.is_file() {
        return Err(RxError::file_not_found_with_suggestion(archive_path.to_path_buf()));
    }

    fs::create_dir_all(out_dir).map_err(|e| RxError::from(e).with_file(out_dir))?;

    tracing::info!(
        archive = %archive_path.display(),
        out_dir = %out_dir.display(),
        "extracting archive"
    );

    let file = File::open(archive_path).map_err(|e| RxError::from(e).with_file(archive_path))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let archive_err = |message: String| RxError::Archive {
        message,
        path: Some(archive_path.to_path_buf()),
    };

    let mut files = 0;
    let entries = archive
        .entries()
        .map_err(|e| archive_err(format!("Failed to read tar entries: {}", e)))?;

    for entry_result in entries {
        let mut entry = entry_result
            .map_err(|e| archive_err(format!("Failed to read tar entry: {}", e)))?;
        let entry_path = entry
            .path()
            .map_err(|e| archive_err(format!("Invalid entry path: {}", e)))?
            .into_owned();

        if !is_contained(&entry_path) {
            return Err(archive_err(format!(
                "Entry '{}' would be extracted outside of the output directory",
                entry_path.display()
            )));
        }

        let is_file = entry.header().entry_type().is_file();
        let unpacked = entry.unpack_in(out_dir).map_err(|e| {
            archive_err(format!("Failed to extract '{}': {}", entry_path.display(), e))
        })?;

        if unpacked && is_file {
            files += 1;
            tracing::debug!(entry = %entry_path.display(), "extracted");
        }
    }

    tracing::info!(files, out_dir = %out_dir.display(), "archive extracted");

    Ok(ExtractedBundle {
        directory: out_dir.to_path_buf(),
        files,
    })
}

/// Whether the archive path stays inside the extraction root
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
