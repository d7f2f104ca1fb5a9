use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current process-wide page size in bytes.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Override the process-wide page size. Only for test harnesses; pages
/// created before and after an override are not interchangeable.
pub fn set_page_size(bytes: usize) {
    PAGE_SIZE.store(bytes, Ordering::Relaxed);
}

/// Restore the default page size. Only for test harnesses.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}

/// Table identifier type
pub type TableId = u32;

/// Identity of one fixed-size disk block: the owning table plus the page
/// number within that table's file. Sole key for both the page cache and
/// the lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique-per-transaction token. Created by the caller before any page
/// access and threaded through every buffer pool operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Draw a fresh transaction id from the process-wide counter.
    pub fn new() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Access level a transaction requests on a page. ReadOnly maps to a
/// shared lock, ReadWrite to an exclusive lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// In-memory image of one disk block. The dirtying transaction doubles as
/// the dirty flag: `None` means the cached bytes match the disk image.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    dirtier: Option<TransactionId>,
}

impl Page {
    /// Create a zeroed page of the current page size.
    pub fn new(id: PageId) -> Self {
        Self {
            id,
            data: vec![0; page_size()],
            dirtier: None,
        }
    }

    /// Wrap bytes read from disk. The page starts clean.
    pub fn with_data(id: PageId, data: Vec<u8>) -> Self {
        Self {
            id,
            data,
            dirtier: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the page bytes. Callers are responsible for holding
    /// the page's exclusive lock and for marking the page dirty afterwards.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// The transaction that last dirtied this page, if any.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }
}

/// Smart pointer to a cached page
pub type PagePtr = Arc<RwLock<Page>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_unique() {
        let a = TransactionId::new();
        let b = TransactionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_page_dirty_tracking() {
        let tid = TransactionId::new();
        let mut page = Page::new(PageId::new(1, 0));
        assert!(!page.is_dirty());
        assert_eq!(page.dirtier(), None);

        page.mark_dirty(tid);
        assert!(page.is_dirty());
        assert_eq!(page.dirtier(), Some(tid));

        page.mark_clean();
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_new_page_is_zeroed() {
        let page = Page::new(PageId::new(1, 3));
        assert_eq!(page.data().len(), page_size());
        assert!(page.data().iter().all(|&b| b == 0));
    }
}
