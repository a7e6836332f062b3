//! Selective ZIP extraction
//!
//! Streams the entries of a ZIP archive whose extension matches a filter into a
//! destination directory, recreating their relative paths. Everything else is
//! skipped without touching the filesystem.
//!
//! Extraction is best effort: a corrupt archive, a wrong password or an I/O error
//! while copying ends the extraction and is reported through
//! [`ExtractionOutcome::Failed`], together with whatever was extracted before
//! the failure. Only bad caller input is returned as an `Err`.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

use anyhow::Context;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What an extraction wrote and what it left out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Paths of extracted files, relative to the destination, in archive order
    pub extracted: Vec<PathBuf>,
    /// Total decompressed bytes written
    pub bytes_written: u64,
    /// Directory entries skipped
    pub skipped_directories: usize,
    /// File entries skipped because their extension did not match
    pub skipped_filtered: usize,
    /// File entries skipped because their name escapes the destination
    pub skipped_unsafe: usize,
}

/// Result of one best-effort extraction
#[derive(Debug)]
pub enum ExtractionOutcome {
    Completed(ExtractionReport),
    Failed {
        partial: ExtractionReport,
        error: PipelineError,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Completed(_))
    }

    pub fn report(&self) -> &ExtractionReport {
        match self {
            ExtractionOutcome::Completed(report) => report,
            ExtractionOutcome::Failed { partial, .. } => partial,
        }
    }
}

/// Check that an archive path is usable before any I/O against it
pub fn validate_archive_path(archive_path: &Path) -> Result<()> {
    if archive_path.as_os_str().is_empty() {
        return Err(PipelineError::InvalidArgument("archive path can't be empty"));
    }
    if !archive_path.is_file() {
        return Err(PipelineError::NotFound(archive_path.to_path_buf()));
    }
    Ok(())
}

/// Extension of an entry name: everything from the last `.` of the final path
/// segment, including the dot. `None` when there is no dot or nothing follows it.
pub fn entry_extension(name: &str) -> Option<&str> {
    let file_name = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(name);
    let dot = file_name.rfind('.')?;
    let ext = &file_name[dot..];
    (ext.len() > 1).then_some(ext)
}

/// Extracts entries with one extension from ZIP archives
#[derive(Debug, Clone)]
pub struct SelectiveExtractor {
    extension: String,
    buffer_size: usize,
}

impl SelectiveExtractor {
    pub fn new(extension: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            extension: extension.into(),
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.extension, config.buffer_size)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Case-sensitive extension match
    pub fn matches(&self, entry_name: &str) -> bool {
        entry_extension(entry_name) == Some(self.extension.as_str())
    }

    /// Extract matching entries of `archive_path` into `destination`
    ///
    /// An empty password is treated as no password. Existing files at a
    /// destination path are overwritten.
    pub fn extract(
        &self,
        archive_path: &Path,
        destination: &Path,
        password: Option<&str>,
    ) -> Result<ExtractionOutcome> {
        validate_archive_path(archive_path)?;

        let password = password.filter(|p| !p.is_empty());
        let mut report = ExtractionReport::default();

        match self.extract_entries(archive_path, destination, password, &mut report) {
            Ok(()) => {
                info!(
                    "Extracted {} file(s) ({} bytes) from {}",
                    report.extracted.len(),
                    report.bytes_written,
                    archive_path.display()
                );
                Ok(ExtractionOutcome::Completed(report))
            }
            Err(e) => {
                warn!("Extraction of {} failed: {:#}", archive_path.display(), e);
                Ok(ExtractionOutcome::Failed {
                    partial: report,
                    error: PipelineError::Extraction {
                        archive: archive_path.to_path_buf(),
                        reason: format!("{:#}", e),
                    },
                })
            }
        }
    }

    /// Names of the entries `extract` would write, in archive order
    pub fn matching_entries(&self, archive_path: &Path) -> Result<Vec<String>> {
        validate_archive_path(archive_path)?;

        let to_extraction_error = |e: anyhow::Error| PipelineError::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("{:#}", e),
        };

        let mut archive = open_archive(archive_path).map_err(to_extraction_error)?;

        let mut names = Vec::new();
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .with_context(|| format!("Failed to read entry #{}", i))
                .map_err(to_extraction_error)?;
            if !entry.is_dir() && entry.enclosed_name().is_some() && self.matches(entry.name()) {
                names.push(entry.name().to_string());
            }
        }

        Ok(names)
    }

    fn extract_entries(
        &self,
        archive_path: &Path,
        destination: &Path,
        password: Option<&str>,
        report: &mut ExtractionReport,
    ) -> anyhow::Result<()> {
        // The archive owns the file handle; both are released when this returns
        let mut archive = open_archive(archive_path)?;
        let mut buffer = vec![0u8; self.buffer_size];

        for i in 0..archive.len() {
            // Metadata only, so non-matching encrypted entries never need a password
            let (name, relative, is_dir) = {
                let raw = archive
                    .by_index_raw(i)
                    .with_context(|| format!("Failed to read entry #{}", i))?;
                (
                    raw.name().to_string(),
                    raw.enclosed_name().map(|p| p.to_path_buf()),
                    raw.is_dir(),
                )
            };

            if is_dir {
                report.skipped_directories += 1;
                continue;
            }

            if !self.matches(&name) {
                debug!("Skipping {}", name);
                report.skipped_filtered += 1;
                continue;
            }

            let Some(relative) = relative else {
                warn!("Skipping entry with unsafe path: {}", name);
                report.skipped_unsafe += 1;
                continue;
            };

            let mut entry = match password {
                Some(password) => archive.by_index_decrypt(i, password.as_bytes()),
                None => archive.by_index(i),
            }
            .with_context(|| format!("Failed to open '{}'", name))?;

            let out_path = destination.join(&relative);
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }

            let written = write_entry(&mut entry, &out_path, &mut buffer)
                .with_context(|| format!("Failed to extract '{}'", name))?;

            info!("File extracted: {}", name);
            report.bytes_written += written;
            report.extracted.push(relative);
        }

        Ok(())
    }
}

fn open_archive(archive_path: &Path) -> anyhow::Result<zip::ZipArchive<BufReader<File>>> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open ZIP: {}", archive_path.display()))?;
    zip::ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read ZIP: {}", archive_path.display()))
}

/// Copy an entry to a new file. A partially written file is removed on failure.
fn write_entry<R: Read>(reader: &mut R, out_path: &Path, buffer: &mut [u8]) -> io::Result<u64> {
    let result = File::create(out_path).and_then(|mut file| {
        let written = copy_with_buffer(reader, &mut file, buffer)?;
        file.flush()?;
        Ok(written)
    });

    if result.is_err() && out_path.exists() {
        let _ = fs::remove_file(out_path);
    }
    result
}

/// Stream-copy through a caller-provided buffer
fn copy_with_buffer<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut [u8],
) -> io::Result<u64> {
    let mut total = 0u64;
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    Ok(total)
}
