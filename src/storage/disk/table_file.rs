use thiserror::Error;

use crate::common::types::{Page, PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::BufferPoolError;
use crate::storage::tuple::Tuple;

#[derive(Error, Debug)]
pub enum TableFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("page {0} is out of range")]
    PageOutOfRange(PageId),
    #[error("page {0} belongs to another table")]
    WrongTable(PageId),
    #[error("record size {0} cannot hold any payload on a page")]
    InvalidRecordSize(usize),
    #[error("record of {got} bytes exceeds the slot capacity of {max}")]
    TupleTooLarge { got: usize, max: usize },
    #[error("tuple has no record id")]
    MissingRecordId,
    #[error("slot {slot} of page {page} is empty")]
    SlotEmpty { page: PageId, slot: usize },
    #[error("record decode failed: {0}")]
    Decode(#[from] bincode::Error),
}

/// Page access seam implemented by the buffer pool. Table file mutations
/// fetch every page they touch through it, so each page is locked under
/// the requesting transaction before its bytes change.
pub trait PageStore {
    fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PagePtr, BufferPoolError>;
}

/// Per-table storage collaborator: byte-level page I/O plus the
/// table-specific mutation logic. Mutations return exactly the pages
/// whose bytes changed; the buffer pool marks those dirty and reinstalls
/// them in its cache.
pub trait TableFile: Send + Sync {
    fn table_id(&self) -> TableId;

    /// Number of pages currently allocated in the backing file.
    fn num_pages(&self) -> Result<u32, TableFileError>;

    /// Read one page from disk. Fails if the page number is out of range.
    fn read_page(&self, pid: PageId) -> Result<Page, TableFileError>;

    /// Persist a page's current bytes at its slot. Idempotent.
    fn write_page(&self, page: &Page) -> Result<(), TableFileError>;

    /// Append a zeroed page to the file and return its identity.
    fn allocate_page(&self) -> Result<PageId, TableFileError>;

    fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        store: &dyn PageStore,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;

    fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        store: &dyn PageStore,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;
}
