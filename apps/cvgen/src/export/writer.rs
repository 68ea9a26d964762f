//! Serializes tables to CSV and persists files atomically: each destination is
//! written to a temp file beside it and renamed into place.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::export::{Table, TabularExport};

pub fn render_table(table: &Table) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    if let Some(explanation) = &table.explanation {
        writer.write_record(explanation)?;
    }
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
}

/// Writes every table into `dir`. All tables are rendered before the first
/// file is touched, so a rendering failure leaves the directory unchanged.
pub fn write_tables(export: &TabularExport, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let rendered = export
        .tables()
        .into_iter()
        .map(|table| Ok((dir.join(table.file_name), render_table(table)?)))
        .collect::<Result<Vec<_>, AppError>>()?;

    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(rendered.len());
    for (path, bytes) in rendered {
        persist_bytes(&path, &bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        written.push(path);
    }

    info!(
        "Exported {} entries to {}",
        export.entry_rows.rows.len(),
        dir.display()
    );
    Ok(written)
}

/// Replaces `path` with `bytes` in one rename. Readers never see a partial file.
pub fn persist_bytes(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.persist(path).map_err(|e| AppError::Io(e.error))?;
    Ok(())
}
