mod error;
mod locator;
mod traits;

pub mod filesystem;

pub use filesystem::FilesystemBlobStore;
pub use error::StorageError;
pub use locator::BlobLocator;
pub use traits::{BlobStore, BoxReader, StoredBlob};
