//! The session's private log file.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::process::OutputSink;

/// A uniquely named temporary file that receives a child's output.
///
/// Each spawned process truncates it. The file is removed when the log is
/// closed or dropped.
#[derive(Debug)]
pub(crate) struct PrivateLog {
    file: NamedTempFile,
}

impl PrivateLog {
    pub(crate) fn new() -> io::Result<Self> {
        let file = tempfile::Builder::new().prefix("autoauth-").suffix(".log").tempfile()?;
        tracing::debug!(path = %file.path().display(), "Created private log");
        Ok(Self { file })
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    /// A fresh sink for the next process, truncating earlier output.
    pub(crate) fn sink(&self) -> io::Result<OutputSink> {
        OutputSink::log_file(self.path())
    }

    pub(crate) fn read(&self) -> Option<String> {
        std::fs::read(self.path())
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn close(self) -> io::Result<()> {
        self.file.close()
    }
}
