use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::error::StorageError;
use super::locator::BlobLocator;
use super::traits::{BlobStore, BoxReader, StoredBlob};

/// Local-disk blob store.
///
/// Layout: `{base_path}/{first 2 locator chars}/{remaining 30 chars}`.
/// Writes land in `{base_path}/.tmp` first and are renamed into place, so a
/// crashed upload never leaves a partial blob under a valid locator.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    fn blob_path(&self, locator: &BlobLocator) -> PathBuf {
        self.base_path
            .join(locator.shard_prefix())
            .join(locator.shard_suffix())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    /// Copy `reader` into a temp file, enforcing the size limit.
    async fn spool(&self, mut reader: BoxReader) -> Result<(PathBuf, u64, String), StorageError> {
        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path).await?;
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }

            total += n as u64;
            if total > self.max_size {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::SizeLimitExceeded {
                    actual: total,
                    limit: self.max_size,
                });
            }

            hasher.update(&buf[..n]);
            temp_file.write_all(&buf[..n]).await?;
        }

        temp_file.flush().await?;
        drop(temp_file);

        Ok((temp_path, total, hex::encode(hasher.finalize())))
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put_stream(&self, reader: BoxReader) -> Result<StoredBlob, StorageError> {
        let (temp_path, size, sha256) = self.spool(reader).await?;

        let locator = BlobLocator::generate();
        let blob_path = self.blob_path(&locator);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(locator = %locator, size, "Stored blob");

        Ok(StoredBlob {
            locator,
            size,
            sha256,
        })
    }

    async fn open(&self, locator: &BlobLocator) -> Result<BoxReader, StorageError> {
        match fs::File::open(self.blob_path(locator)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(locator)).await?)
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(locator)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
