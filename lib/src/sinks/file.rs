use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::errors::SinkError;
use crate::sinks::Sink;

/// Configuration for a raw binary file sink.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct FileConfig {
    /// Path to the output file.
    pub file: PathBuf,
}

/// A sink that appends raw bytes to a file.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Creates (or truncates) the file at the configured path.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError::Io` if the file cannot be created.
    pub async fn new(config: FileConfig) -> Result<Self, SinkError> {
        trace!("Creating file sink (file: {})", config.file.display());
        let file = File::create(&config.file).await?;
        Ok(FileSink {
            path: config.file,
            file: Some(file),
        })
    }

    fn file(&mut self) -> Result<&mut File, SinkError> {
        self.file.as_mut().ok_or(SinkError::Closed)
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn append(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.file()?.write_all(data).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.file()?.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!("Closed file sink {}", self.path.display());
        }
        Ok(())
    }

    async fn discard(&mut self) -> Result<(), SinkError> {
        drop(self.file.take());
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Discarded {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Nothing to discard at {}", self.path.display());
                Ok(())
            }
            Err(e) => Err(SinkError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_append_and_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let mut sink = FileSink::new(FileConfig { file: path.clone() }).await.unwrap();

        sink.append(&[1, 2, 3]).await.unwrap();
        sink.flush().await.unwrap();
        sink.append(&[4]).await.unwrap();
        sink.close().await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        assert!(matches!(sink.append(&[5]).await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        let mut sink = FileSink::new(FileConfig { file: path.clone() }).await.unwrap();
        assert!(path.exists());

        sink.discard().await.unwrap();
        assert!(!path.exists());
        // second discard has nothing left to remove
        sink.discard().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_in_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let config = FileConfig {
            file: dir.path().join("missing").join("capture.bin"),
        };
        assert!(matches!(FileSink::new(config).await, Err(SinkError::Io(_))));
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cfg.bin");
        let mut sink = crate::sinks::from_config(crate::sinks::SinkConfig::File(FileConfig { file: path.clone() }))
            .await
            .unwrap();
        sink.append(b"iq").await.unwrap();
        sink.close().await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"iq".to_vec());
    }
}
