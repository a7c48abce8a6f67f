//! Cumulative test output log

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::common::{Error, Result};

/// Append-only log of every runner output, test by test
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    /// Open (creating if needed) the log in append mode
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| Error::FileWrite {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one test's output followed by a blank separator line
    pub async fn append(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.writer.write_all(line.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
        }
        self.writer.write_all(b"\n").await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_append_keeps_previous_runs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tests-log.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut log = RunLog::open(&path).await.unwrap();
        log.append(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        log.append(&["third".to_string()]).await.unwrap();
        log.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "earlier run\nfirst\nsecond\n\nthird\n\n");
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_is_write_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("tests-log.log");

        let err = RunLog::open(&path).await.err().unwrap();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert!(err.to_string().starts_with("Failed to write file"));
    }
}
