pub mod backend;
pub mod records;

pub use backend::{create_store, ObjectStorage, StorageError};
pub use records::{MemoryVideoStore, StoreError, Video, VideoStore};
