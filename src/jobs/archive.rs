//! # Empaquetado de Resultados
//! src/jobs/archive.rs
//!
//! Junta archivos de resultado en un único `.zip` descargable. Cada archivo
//! entra con su nombre base.

use crate::error::{Result, SessionError};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const ZIP_EXTENSION: &str = "zip";

/// Nombre aleatorio estilo `xxxxxxxx.xxx.zip`
pub fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let mut part = |len: usize| -> String {
        (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect()
    };
    let stem = part(8);
    let ext = part(3);
    format!("{}.{}.{}", stem, ext, ZIP_EXTENSION)
}

/// Agrega `.zip` al nombre si no lo tiene
pub fn with_zip_extension(name: &str) -> String {
    let has_ext = Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(ZIP_EXTENSION))
        .unwrap_or(false);

    if has_ext {
        name.to_string()
    } else {
        format!("{}.{}", name, ZIP_EXTENSION)
    }
}

/// Escribe `files` en un zip nuevo en `zip_path` (sobrescribe si existe).
///
/// Si falla, el zip parcial se borra.
pub fn write_zip(zip_path: &Path, files: &[PathBuf]) -> Result<()> {
    if files.iter().any(|file| file == zip_path) {
        return Err(SessionError::Archive {
            path: zip_path.to_path_buf(),
            message: "archive would overwrite one of its own entries".to_string(),
        });
    }

    let written = write_entries(zip_path, files);
    if written.is_err() && zip_path.exists() {
        if let Err(e) = fs::remove_file(zip_path) {
            warn!(path = %zip_path.display(), error = %e, "failed to remove partial archive");
        }
    }
    written
}

fn write_entries(zip_path: &Path, files: &[PathBuf]) -> Result<()> {
    let archive_err = |message: String| SessionError::Archive {
        path: zip_path.to_path_buf(),
        message,
    };

    let file = File::create(zip_path)
        .map_err(|e| SessionError::io(format!("failed to create {}", zip_path.display()), e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in files {
        let entry = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| archive_err(format!("invalid file name: {}", path.display())))?;

        zip.start_file(entry, options)
            .map_err(|e| archive_err(format!("failed to add '{}': {}", entry, e)))?;

        let mut source = File::open(path)
            .map_err(|e| SessionError::io(format!("failed to open {}", path.display()), e))?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| SessionError::io(format!("failed to write '{}' to zip", entry), e))?;
    }

    zip.finish()
        .map_err(|e| archive_err(format!("failed to finalize archive: {}", e)))?;

    Ok(())
}
