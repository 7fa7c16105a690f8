// src/export.rs
//
// Terminal packaging step. The bundle is all-or-nothing: every artifact is
// checked before the archive file is created, and a failed write removes
// the partial archive.

use crate::error::AuditError;
use crate::types::AuditArtifacts;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn export_bundle(
    archive_path: &Path,
    artifacts: &AuditArtifacts,
) -> Result<PathBuf, AuditError> {
    // Validate all inputs up front so no archive file is produced for an
    // incomplete run.
    for path in artifacts.paths() {
        let meta = fs::metadata(path).map_err(|e| {
            AuditError::PackagingError(format!("artifact missing: {} ({e})", path.display()))
        })?;
        if meta.len() == 0 {
            return Err(AuditError::PackagingError(format!(
                "artifact is empty: {}",
                path.display()
            )));
        }
    }

    match write_archive(archive_path, artifacts) {
        Ok(()) => {
            info!("📦 Audit bundle written: {}", archive_path.display());
            Ok(archive_path.to_path_buf())
        }
        Err(e) => {
            let _ = fs::remove_file(archive_path);
            Err(AuditError::PackagingError(e.to_string()))
        }
    }
}

fn write_archive(archive_path: &Path, artifacts: &AuditArtifacts) -> io::Result<()> {
    let file = File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    // Flat archive: entries by basename only. Inputs and outputs carry fixed
    // distinct names per run, so collisions do not arise.
    for path in artifacts.paths() {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| io::Error::other(format!("unusable file name: {}", path.display())))?;

        zip.start_file(name, options)?;
        let mut reader = File::open(path)?;
        io::copy(&mut reader, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
