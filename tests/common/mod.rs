use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use shaledb::{
    BufferPool, BufferPoolConfig, Catalog, Field, HeapFile, TableFile, TableId, Tuple,
};

pub const TEST_TABLE_ID: TableId = 1;
pub const TEST_RECORD_BYTES: usize = 64;

/// Create a catalog holding one heap table backed by a temp directory.
/// The concrete `HeapFile` handle is returned alongside so tests can
/// inspect the disk image directly.
pub fn create_test_table() -> Result<(Arc<Catalog>, Arc<HeapFile>, TempDir)> {
    let dir = TempDir::new()?;
    let catalog = Arc::new(Catalog::new());
    let heap = Arc::new(HeapFile::new(
        dir.path().join("test_table.shale"),
        TEST_TABLE_ID,
        TEST_RECORD_BYTES,
    )?);
    catalog.register_table("test_table", heap.clone());
    Ok((catalog, heap, dir))
}

/// Append `n` zeroed pages so page fetches have something to load.
pub fn allocate_pages(heap: &HeapFile, n: u32) -> Result<()> {
    for _ in 0..n {
        heap.allocate_page()?;
    }
    Ok(())
}

/// Pool config with a short lock timeout, for contention tests that
/// expect aborts instead of five-second stalls.
pub fn short_timeout_config() -> BufferPoolConfig {
    BufferPoolConfig {
        lock_timeout: Duration::from_millis(50),
        ..BufferPoolConfig::default()
    }
}

pub fn create_test_pool(num_pages: usize, catalog: Arc<Catalog>) -> BufferPool {
    BufferPool::new(num_pages, catalog)
}

pub fn int_tuple(value: i64) -> Tuple {
    Tuple::new(vec![Field::Int(value)])
}

/// Count occupied slots across every allocated page of the table, read
/// straight from disk.
pub fn count_records_on_disk(heap: &HeapFile) -> Result<usize> {
    use shaledb::PageId;

    let mut count = 0;
    for page_no in 0..heap.num_pages()? {
        let page = heap.read_page(PageId::new(heap.table_id(), page_no))?;
        for slot in 0..slots_per_test_page() {
            if heap.decode_slot(&page, slot).is_ok() {
                count += 1;
            }
        }
    }
    Ok(count)
}

fn slots_per_test_page() -> usize {
    // 4096 * 8 bits / (64 * 8 + 1) bits per slot
    63
}
