//! Line-delimited dump files
//!
//! Dumps are read on a blocking thread (decompression is CPU bound) and lines
//! are handed over through a channel of capacity one. Each line is tagged
//! with the byte offset it starts at in the decompressed stream, which is
//! also its cursor.

use crate::import::source::{Enumerated, Enumerator, ImportError};
use crate::types::{Cursor, ItemRef};
use async_trait::async_trait;
use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Compression of a dump file, detected from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Plain,
}

impl Compression {
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            _ => Compression::Plain,
        }
    }

    fn open(self, path: &Path) -> Result<Box<dyn BufRead + Send>, ImportError> {
        let file = File::open(path)?;
        let reader: Box<dyn Read + Send> = match self {
            Compression::Gzip => Box::new(MultiGzDecoder::new(file)),
            Compression::Bzip2 => Box::new(BzDecoder::new(file)),
            Compression::Plain => Box::new(file),
        };
        Ok(Box::new(BufReader::with_capacity(1024 * 1024, reader))) // 1MB buffer
    }
}

/// Enumerator over the non-empty lines of a dump file
pub struct DumpLines {
    name: String,
    rx: mpsc::Receiver<Result<Enumerated, ImportError>>,
    cancel: CancellationToken,
    // Downloaded dumps are removed once the enumerator is dropped
    _download: Option<TempPath>,
}

impl DumpLines {
    /// Open a dump and start scanning it.
    ///
    /// With `resume = Some(Cursor::Offset(n))`, every line starting at or
    /// before offset `n` is skipped.
    pub fn open(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        resume: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Self, ImportError> {
        let after = match resume {
            None => None,
            Some(Cursor::Offset(offset)) => Some(*offset),
            Some(other) => {
                return Err(ImportError::Config(format!(
                    "cursor '{}' is not a dump offset",
                    other
                )))
            }
        };

        let path = path.as_ref().to_path_buf();
        let compression = Compression::detect(&path);
        let reader = compression.open(&path)?;
        info!("Scanning {:?} dump {}", compression, path.display());

        let (tx, rx) = mpsc::channel(1);
        let cancel = cancel.child_token();
        let producer_cancel = cancel.clone();
        tokio::task::spawn_blocking(move || scan(reader, path, after, tx, producer_cancel));

        Ok(Self {
            name: name.into(),
            rx,
            cancel,
            _download: None,
        })
    }

    /// Open a downloaded dump that is deleted when the enumerator goes away.
    ///
    /// The temp path must keep the original file extension so the
    /// compression can be detected.
    pub fn open_download(
        name: impl Into<String>,
        download: TempPath,
        resume: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Self, ImportError> {
        let mut lines = Self::open(name, &download, resume, cancel)?;
        lines._download = Some(download);
        Ok(lines)
    }
}

impl Drop for DumpLines {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Enumerator for DumpLines {
    async fn next_item(&mut self) -> Result<Option<Enumerated>, ImportError> {
        match self.rx.recv().await {
            Some(Ok(entry)) => Ok(Some(entry)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

fn scan(
    mut reader: Box<dyn BufRead + Send>,
    path: PathBuf,
    after: Option<u64>,
    tx: mpsc::Sender<Result<Enumerated, ImportError>>,
    cancel: CancellationToken,
) {
    let mut buf = Vec::with_capacity(4096);
    let mut offset: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        buf.clear();
        let read = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = tx.blocking_send(Err(ImportError::Io(e)));
                return;
            }
        };

        let start = offset;
        offset += read as u64;

        if after.is_some_and(|after| start <= after) {
            skipped += 1;
            continue;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        let entry = Enumerated::new(
            ItemRef::Line {
                offset: start,
                line: line.to_string(),
            },
            Cursor::Offset(start),
        );
        if tx.blocking_send(Ok(entry)).is_err() {
            return;
        }
    }

    debug!(
        "Finished {} at offset {} ({} lines skipped on resume)",
        path.display(),
        offset,
        skipped
    );
}
