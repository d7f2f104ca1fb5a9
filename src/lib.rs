// ShaleDB storage engine core

pub mod catalog;
pub mod common;
pub mod storage;

// Re-export key items for convenient access
pub use catalog::Catalog;
pub use common::types::{Page, PageId, PagePtr, Permissions, TableId, TransactionId};
pub use storage::buffer::{
    BufferPool, BufferPoolConfig, BufferPoolError, EvictionPolicy, LockManager, LockMode,
    TransactionAborted,
};
pub use storage::disk::{HeapFile, PageStore, TableFile, TableFileError};
pub use storage::tuple::{Field, RecordId, Tuple};
