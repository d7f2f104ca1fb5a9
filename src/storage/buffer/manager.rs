use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::common::types::{PageId, PagePtr, Permissions, TableId, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::lock_manager::{LockManager, LockMode};
use crate::storage::disk::table_file::{PageStore, TableFile, TableFileError};
use crate::storage::tuple::Tuple;

/// Default number of resident pages when callers do not size the pool.
pub const DEFAULT_PAGES: usize = 50;

/// Default upper bound on a single lock acquisition's timeout budget.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

/// What eviction may do with dirty pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Only clean pages are evictable. If every resident page is dirty
    /// the request fails with `PoolExhausted`. Uncommitted bytes never
    /// reach disk, so aborts stay fully isolated without recovery
    /// machinery.
    NoSteal,
    /// Any resident page is evictable; dirty victims are flushed first.
    /// A later abort of the dirtying transaction cannot undo a stolen
    /// write, which is why this is not the default.
    Steal,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferPoolConfig {
    pub eviction_policy: EvictionPolicy,
    pub lock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            eviction_policy: EvictionPolicy::NoSteal,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Fixed-capacity cache mediating all page access, and the owner of the
/// lock discipline: a transaction gets a page only after the lock manager
/// grants the matching lock, and a transaction's dirty pages are flushed
/// or discarded when it completes.
pub struct BufferPool {
    num_pages: usize,
    pages: RwLock<HashMap<PageId, PagePtr>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    config: BufferPoolConfig,
}

impl BufferPool {
    /// Create a pool caching up to `num_pages` pages, with the default
    /// no-steal eviction policy and lock timeout.
    pub fn new(num_pages: usize, catalog: Arc<Catalog>) -> Self {
        Self::with_config(num_pages, catalog, BufferPoolConfig::default())
    }

    pub fn with_config(num_pages: usize, catalog: Arc<Catalog>, config: BufferPoolConfig) -> Self {
        Self {
            num_pages,
            pages: RwLock::new(HashMap::with_capacity(num_pages)),
            lock_manager: LockManager::new(),
            catalog,
            config,
        }
    }

    /// Retrieve a page on behalf of a transaction, acquiring the lock that
    /// matches the requested permission. Blocks while the page is held
    /// incompatibly; an exhausted wait budget surfaces as
    /// `TransactionAborted`. On a miss the page is loaded from its table
    /// file, evicting a resident page first when the pool is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PagePtr, BufferPoolError> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        self.lock_manager
            .acquire(tid, pid, mode, self.config.lock_timeout)?;

        if let Some(ptr) = self.pages.read().get(&pid) {
            return Ok(ptr.clone());
        }

        let mut pages = self.pages.write();
        // Another transaction may have loaded the page between the read
        // and write guards.
        if let Some(ptr) = pages.get(&pid) {
            return Ok(ptr.clone());
        }

        if pages.len() >= self.num_pages {
            self.evict_page(&mut pages)?;
        }

        let file = self.table_file(pid.table_id)?;
        let page = file.read_page(pid)?;
        let ptr: PagePtr = Arc::new(RwLock::new(page));
        pages.insert(pid, ptr.clone());
        Ok(ptr)
    }

    /// Release one page lock mid-transaction. This breaks strict
    /// two-phase locking and with it serializability; it exists for
    /// operators that do their own fine-grained latching (B+Tree style),
    /// not for ordinary callers.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    /// True iff the transaction currently holds a lock on the page.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Add a tuple to a table. The table file fetches every page it
    /// touches back through this pool, so each one is exclusively locked
    /// by `tid` before its bytes change; the modified pages are then
    /// marked dirty and reinstalled in the cache.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), BufferPoolError> {
        let file = self.table_file(table_id)?;
        let modified = file.insert_tuple(tid, tuple, self)?;
        self.install_dirty(tid, modified);
        Ok(())
    }

    /// Remove a stored tuple, located by its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferPoolError> {
        let rid = tuple.record_id().ok_or(TableFileError::MissingRecordId)?;
        let file = self.table_file(rid.page.table_id)?;
        let modified = file.delete_tuple(tid, tuple, self)?;
        self.install_dirty(tid, modified);
        Ok(())
    }

    /// Commit (`commit = true`) or abort a transaction, then release all
    /// of its locks.
    ///
    /// Commit flushes every cached dirty page in the transaction's lock
    /// inventory; abort discards them so the next fetch re-reads the
    /// pre-transaction disk image. A flush failure propagates before any
    /// lock is released, leaving the caller able to abort instead.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), BufferPoolError> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            self.discard_pages(tid);
        }
        self.lock_manager.release_all(tid);
        debug!("{} complete, commit={}", tid, commit);
        Ok(())
    }

    /// Convenience form of [`transaction_complete`] that commits.
    ///
    /// [`transaction_complete`]: Self::transaction_complete
    pub fn commit_transaction(&self, tid: TransactionId) -> Result<(), BufferPoolError> {
        self.transaction_complete(tid, true)
    }

    /// Write every dirty page in the transaction's lock inventory to its
    /// table file.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferPoolError> {
        for pid in self.lock_manager.held_pages(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flush every dirty cached page. Checkpoint-style shutdown helper,
    /// not part of the per-transaction protocol.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let resident: Vec<PageId> = self.pages.read().keys().copied().collect();
        info!("flushing all pages ({} resident)", resident.len());
        for pid in resident {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without flushing. Used by
    /// recovery-style collaborators to guarantee a rolled-back page is
    /// never served stale.
    pub fn discard_page(&self, pid: PageId) {
        self.pages.write().remove(&pid);
    }

    /// Number of pages currently resident in the cache.
    pub fn cached_page_count(&self) -> usize {
        self.pages.read().len()
    }

    fn table_file(&self, table_id: TableId) -> Result<Arc<dyn TableFile>, BufferPoolError> {
        self.catalog
            .table_file(table_id)
            .ok_or(BufferPoolError::UnknownTable(table_id))
    }

    /// Write one page back to its table file if it is cached and dirty;
    /// no-op otherwise.
    fn flush_page(&self, pid: PageId) -> Result<(), BufferPoolError> {
        let ptr = self.pages.read().get(&pid).cloned();
        let Some(ptr) = ptr else {
            return Ok(());
        };

        let mut page = ptr.write();
        if !page.is_dirty() {
            return Ok(());
        }
        let file = self.table_file(pid.table_id)?;
        file.write_page(&page)?;
        page.mark_clean();
        Ok(())
    }

    /// Drop the transaction's cached dirty pages without flushing. Under
    /// two-phase locking only `tid` can have dirtied a page it holds, so
    /// this erases exactly the uncommitted writes.
    fn discard_pages(&self, tid: TransactionId) {
        let mut pages = self.pages.write();
        for pid in self.lock_manager.held_pages(tid) {
            let dirty = pages.get(&pid).is_some_and(|ptr| ptr.read().is_dirty());
            if dirty {
                debug!("discarding dirty page {} on abort of {}", pid, tid);
                pages.remove(&pid);
            }
        }
    }

    /// Mark mutated pages dirty and (re)install them, overwriting any
    /// stale cached copy.
    fn install_dirty(&self, tid: TransactionId, modified: Vec<PagePtr>) {
        let mut pages = self.pages.write();
        for ptr in modified {
            let pid = {
                let mut page = ptr.write();
                page.mark_dirty(tid);
                page.id()
            };
            pages.insert(pid, ptr);
        }
    }

    /// Free one cache slot. Victim selection is arbitrary; no recency
    /// tracking is kept.
    fn evict_page(&self, pages: &mut HashMap<PageId, PagePtr>) -> Result<(), BufferPoolError> {
        match self.config.eviction_policy {
            EvictionPolicy::NoSteal => {
                let victim = pages
                    .iter()
                    .find(|(_, ptr)| !ptr.read().is_dirty())
                    .map(|(pid, _)| *pid);
                match victim {
                    Some(pid) => {
                        debug!("evicting clean page {}", pid);
                        pages.remove(&pid);
                        Ok(())
                    }
                    None => Err(BufferPoolError::PoolExhausted),
                }
            }
            EvictionPolicy::Steal => {
                let Some(pid) = pages.keys().next().copied() else {
                    return Err(BufferPoolError::PoolExhausted);
                };
                let ptr = pages[&pid].clone();
                {
                    let mut page = ptr.write();
                    if page.is_dirty() {
                        debug!("flushing dirty page {} before eviction", pid);
                        let file = self.table_file(pid.table_id)?;
                        file.write_page(&page)?;
                        page.mark_clean();
                    }
                }
                pages.remove(&pid);
                Ok(())
            }
        }
    }
}

impl PageStore for BufferPool {
    fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PagePtr, BufferPoolError> {
        BufferPool::get_page(self, tid, pid, perm)
    }
}
