//! Resolve a variable identifier to a record file and load it.

use clap::ValueEnum;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::ReportError;
use crate::record::{FlatRecord, RecordCollection};
use crate::{CompressionFormat, InputFormat};

/// Where record files live and how they are encoded.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    dir: PathBuf,
    format: InputFormat,
    compression: Option<CompressionFormat>,
}

impl SourceResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            format: InputFormat::Json,
            compression: None,
        }
    }

    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, compression: Option<CompressionFormat>) -> Self {
        self.compression = compression;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<source_id>.<ext>` plus the compression suffix, if any.
    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let mut name = format!("{}.{}", source_id, self.format.extension());
        if let Some(compression) = self.compression {
            name.push('.');
            name.push_str(compression.extension());
        }
        self.dir.join(name)
    }

    /// Find the record file of `source_id` and its compression. Without an explicit
    /// compression the plain file wins, then the first `<id>.<ext>.<gz|zst|bz2|xz>` on disk.
    fn locate(&self, source_id: &str) -> Option<(PathBuf, Option<CompressionFormat>)> {
        let path = self.path_for(source_id);
        if path.is_file() {
            return Some((path, self.compression));
        }
        if self.compression.is_some() {
            return None;
        }
        CompressionFormat::value_variants()
            .iter()
            .map(|c| {
                self.dir.join(format!(
                    "{}.{}.{}",
                    source_id,
                    self.format.extension(),
                    c.extension()
                ))
            })
            .find(|p| p.is_file())
            .map(|p| {
                let compression = CompressionFormat::from_extension(&p);
                (p, compression)
            })
    }

    /// Read every record of `source_id`. The file is closed before this returns.
    pub fn load(&self, source_id: &str) -> Result<RecordCollection, ReportError> {
        let Some((path, compression)) = self.locate(source_id) else {
            return Err(ReportError::SourceNotFound {
                source_id: source_id.to_string(),
                path: self.path_for(source_id),
            });
        };

        let io_err = |source| ReportError::Io {
            source_id: source_id.to_string(),
            source,
        };
        let file = File::open(&path).map_err(io_err)?;
        let reader = open_reader(file, compression).map_err(io_err)?;
        let records = match self.format {
            InputFormat::Json => read_json_array(reader, source_id)?,
            InputFormat::Jsonl => read_json_lines(reader, source_id)?,
        };

        let collection = RecordCollection::new(source_id, records);
        tracing::info!(
            source = source_id,
            path = %path.display(),
            compression = ?compression,
            records = collection.len(),
            "loaded records"
        );
        if collection.is_empty() {
            tracing::warn!(source = source_id, "source has no records");
        }
        Ok(collection)
    }
}

/// Wrap a file in the decoder for `compression`.
fn open_reader(
    file: File,
    compression: Option<CompressionFormat>,
) -> std::io::Result<Box<dyn BufRead>> {
    let inner = BufReader::new(file);
    let reader: Box<dyn Read> = match compression {
        None => return Ok(Box::new(inner)),
        Some(CompressionFormat::Gzip) => Box::new(flate2::read::GzDecoder::new(inner)),
        Some(CompressionFormat::Zstd) => Box::new(zstd::Decoder::new(inner)?),
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::read::BzDecoder::new(inner)),
        Some(CompressionFormat::Xz) => Box::new(xz2::read::XzDecoder::new(inner)),
    };
    Ok(Box::new(BufReader::new(reader)))
}

fn malformed(source_id: &str, err: serde_json::Error) -> ReportError {
    // Decoder failures surface through serde_json as I/O errors.
    if err.is_io() {
        return ReportError::Io {
            source_id: source_id.to_string(),
            source: err.into(),
        };
    }
    ReportError::Malformed {
        source_id: source_id.to_string(),
        reason: err.to_string(),
    }
}

fn read_json_array(
    reader: impl Read,
    source_id: &str,
) -> Result<Vec<FlatRecord>, ReportError> {
    serde_json::from_reader(reader).map_err(|e| malformed(source_id, e))
}

fn read_json_lines(
    reader: impl BufRead,
    source_id: &str,
) -> Result<Vec<FlatRecord>, ReportError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ReportError::Io {
            source_id: source_id.to_string(),
            source,
        })?;
        let line = line.trim().trim_end_matches(',');
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| ReportError::Malformed {
            source_id: source_id.to_string(),
            reason: format!("line {}: {}", i + 1, e),
        })?;
        records.push(record);
    }
    Ok(records)
}
