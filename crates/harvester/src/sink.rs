//! Metadata persistence.
//!
//! Every accepted record is appended as one JSON object per line (JSONL). The file is opened
//! in append mode, so repeated runs add to it rather than replacing it.

use std::{
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
};

use super::*;

/// Destination for accepted records.
pub trait MetadataSink {
  /// Appends `record` after everything written before it.
  fn append(&mut self, record: &PaperRecord) -> Result<()>;

  /// Makes everything appended so far durable.
  fn flush(&mut self) -> Result<()> { Ok(()) }
}

/// Appends records as JSON lines to a file.
#[derive(Debug)]
pub struct JsonlSink {
  /// Location of the file, for error messages
  path:    PathBuf,
  /// Buffered handle opened in append mode
  writer:  BufWriter<File>,
  /// Lines written through this handle
  written: usize,
}

impl JsonlSink {
  /// Opens `path` for appending, creating it and its parent directories if needed.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let filesystem = |source| HarvestError::Filesystem { path: path.clone(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent).map_err(filesystem)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path).map_err(filesystem)?;

    debug!("Appending metadata to {path:?}");
    Ok(Self { path, writer: BufWriter::new(file), written: 0 })
  }

  /// Path of the underlying file.
  pub fn path(&self) -> &Path { &self.path }

  /// Lines written through this sink.
  pub fn written(&self) -> usize { self.written }
}

impl MetadataSink for JsonlSink {
  fn append(&mut self, record: &PaperRecord) -> Result<()> {
    let filesystem = |source| HarvestError::Filesystem { path: self.path.clone(), source };
    serde_json::to_writer(&mut self.writer, record).map_err(|e| {
      if e.is_io() {
        filesystem(std::io::Error::from(e))
      } else {
        HarvestError::Json(e)
      }
    })?;
    self.writer.write_all(b"\n").map_err(filesystem)?;
    self.written += 1;
    trace!(identifier = %record.identifier, "Appended metadata line");
    Ok(())
  }

  fn flush(&mut self) -> Result<()> {
    self
      .writer
      .flush()
      .and_then(|()| self.writer.get_ref().sync_data())
      .map_err(|source| HarvestError::Filesystem { path: self.path.clone(), source })
  }
}

impl MetadataSink for Vec<PaperRecord> {
  fn append(&mut self, record: &PaperRecord) -> Result<()> {
    self.push(record.clone());
    Ok(())
  }
}
