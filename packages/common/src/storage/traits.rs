use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::locator::BlobLocator;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Outcome of a successful write.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub locator: BlobLocator,
    pub size: u64,
    /// Lowercase hex SHA-256 of the stored bytes.
    pub sha256: String,
}

/// Backend-agnostic storage for uploaded document bodies.
///
/// Every write allocates a new locator; identical uploads are stored twice so
/// that deleting one document never affects another.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, data: &[u8]) -> Result<StoredBlob, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(reader).await
    }

    async fn put_stream(&self, reader: BoxReader) -> Result<StoredBlob, StorageError>;

    async fn read(&self, locator: &BlobLocator) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.open(locator).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Open a blob for streaming.
    async fn open(&self, locator: &BlobLocator) -> Result<BoxReader, StorageError>;

    async fn exists(&self, locator: &BlobLocator) -> Result<bool, StorageError>;

    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, locator: &BlobLocator) -> Result<bool, StorageError>;
}
