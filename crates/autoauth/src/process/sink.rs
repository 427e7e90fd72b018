//! Destinations for a child's live output.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Where output is copied as it is read.
#[derive(Debug)]
pub enum OutputSink {
    /// The caller's stdout.
    Stdout,

    /// A log file, truncated when the sink is opened.
    File {
        /// Open handle.
        file: File,
        /// Path, for reading the log back.
        path: PathBuf,
    },

    /// Nowhere.
    Discard,
}

impl OutputSink {
    /// Open `path` for writing, truncating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn log_file(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;
        Ok(Self::File { file, path })
    }

    /// Path of the log file, if output goes to one.
    #[must_use]
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(data)?;
                stdout.flush()
            }
            Self::File { file, .. } => file.write_all(data),
            Self::Discard => Ok(()),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().flush(),
            Self::File { file, .. } => file.flush(),
            Self::Discard => Ok(()),
        }
    }

    /// Read the log back. `None` for other sinks or on any read error.
    pub fn read_log(&mut self) -> Option<String> {
        let Self::File { file, path } = self else {
            return None;
        };
        file.flush().ok()?;
        std::fs::read(path.as_path())
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("child.log");
        std::fs::write(&path, "stale").unwrap();

        let mut sink = OutputSink::log_file(&path).unwrap();
        sink.write(b"Password: ").unwrap();
        assert_eq!(sink.log_path(), Some(path.as_path()));
        assert_eq!(sink.read_log().as_deref(), Some("Password: "));
    }

    #[test]
    fn discard_has_no_log() {
        let mut sink = OutputSink::Discard;
        sink.write(b"ignored").unwrap();
        assert!(sink.read_log().is_none());
        assert!(sink.log_path().is_none());
    }
}
