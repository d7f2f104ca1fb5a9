use std::sync::Arc;

use anyhow::Result;

mod common;
use common::{
    allocate_pages, create_test_pool, create_test_table, int_tuple, TEST_TABLE_ID,
};

use shaledb::{
    BufferPool, BufferPoolConfig, BufferPoolError, EvictionPolicy, PageId, Permissions,
    TableFile, TransactionId,
};

#[test]
fn test_get_page_loads_and_caches() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    allocate_pages(&heap, 2)?;
    let pool = create_test_pool(10, catalog);
    let tid = TransactionId::new();
    let pid = PageId::new(TEST_TABLE_ID, 0);

    let first = pool.get_page(tid, pid, Permissions::ReadOnly)?;
    assert_eq!(first.read().id(), pid);
    assert_eq!(pool.cached_page_count(), 1);

    // A second fetch must serve the same cached page.
    let second = pool.get_page(tid, pid, Permissions::ReadOnly)?;
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pool.cached_page_count(), 1);

    pool.transaction_complete(tid, true)?;
    Ok(())
}

#[test]
fn test_capacity_bound() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    allocate_pages(&heap, 5)?;
    let pool = create_test_pool(3, catalog);
    let tid = TransactionId::new();

    for page_no in 0..5 {
        pool.get_page(tid, PageId::new(TEST_TABLE_ID, page_no), Permissions::ReadOnly)?;
        assert!(pool.cached_page_count() <= 3);
    }
    assert_eq!(pool.cached_page_count(), 3);

    pool.transaction_complete(tid, true)?;
    Ok(())
}

#[test]
fn test_capacity_one_eviction_cycle() -> Result<()> {
    // Smallest interesting pool: fetching a second page evicts the first
    // (a plain discard since it was never mutated), and the first can
    // then be reloaded from the table file.
    let (catalog, heap, _dir) = create_test_table()?;
    allocate_pages(&heap, 2)?;
    let pool = create_test_pool(1, catalog);
    let tid = TransactionId::new();
    let p1 = PageId::new(TEST_TABLE_ID, 0);
    let p2 = PageId::new(TEST_TABLE_ID, 1);

    pool.get_page(tid, p1, Permissions::ReadWrite)?;
    assert_eq!(pool.cached_page_count(), 1);

    pool.get_page(tid, p2, Permissions::ReadWrite)?;
    assert_eq!(pool.cached_page_count(), 1);

    let reloaded = pool.get_page(tid, p1, Permissions::ReadOnly)?;
    assert_eq!(reloaded.read().id(), p1);
    assert_eq!(pool.cached_page_count(), 1);

    pool.transaction_complete(tid, true)?;
    Ok(())
}

#[test]
fn test_no_steal_refuses_to_evict_dirty() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    allocate_pages(&heap, 2)?;
    let pool = create_test_pool(1, catalog);
    let tid = TransactionId::new();

    // Fills the single slot with a dirty page.
    let mut tuple = int_tuple(1);
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut tuple)?;
    assert_eq!(pool.cached_page_count(), 1);

    let result = pool.get_page(tid, PageId::new(TEST_TABLE_ID, 1), Permissions::ReadOnly);
    assert!(matches!(result, Err(BufferPoolError::PoolExhausted)));

    pool.transaction_complete(tid, false)?;
    Ok(())
}

#[test]
fn test_steal_flushes_before_evicting() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    allocate_pages(&heap, 2)?;
    let pool = BufferPool::with_config(
        1,
        catalog,
        BufferPoolConfig {
            eviction_policy: EvictionPolicy::Steal,
            ..BufferPoolConfig::default()
        },
    );
    let tid = TransactionId::new();

    let mut tuple = int_tuple(7);
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut tuple)?;
    let rid = tuple.record_id().unwrap();

    // Fetching another page forces the dirty page out through a flush.
    pool.get_page(tid, PageId::new(TEST_TABLE_ID, 1), Permissions::ReadOnly)?;
    assert_eq!(pool.cached_page_count(), 1);

    let on_disk = heap.read_page(rid.page)?;
    let fields = heap.decode_slot(&on_disk, rid.slot)?;
    assert_eq!(fields, int_tuple(7).fields());

    pool.transaction_complete(tid, true)?;
    Ok(())
}

#[test]
fn test_flush_all_pages() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    let pool = create_test_pool(10, catalog);
    let tid = TransactionId::new();

    let mut first = int_tuple(10);
    let mut second = int_tuple(11);
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut first)?;
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut second)?;

    pool.flush_all_pages()?;

    let rid = first.record_id().unwrap();
    let on_disk = heap.read_page(rid.page)?;
    assert_eq!(heap.decode_slot(&on_disk, rid.slot)?, int_tuple(10).fields());

    pool.transaction_complete(tid, true)?;
    Ok(())
}

#[test]
fn test_discard_page_drops_unflushed_writes() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    let pool = create_test_pool(10, catalog);
    let tid = TransactionId::new();

    let mut tuple = int_tuple(3);
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut tuple)?;
    let rid = tuple.record_id().unwrap();

    pool.discard_page(rid.page);
    assert_eq!(pool.cached_page_count(), 0);

    // The slot write never reached disk, so a reload sees an empty slot.
    let reloaded = pool.get_page(tid, rid.page, Permissions::ReadOnly)?;
    assert!(heap.decode_slot(&reloaded.read(), rid.slot).is_err());

    pool.transaction_complete(tid, false)?;
    Ok(())
}

#[test]
fn test_unknown_table() -> Result<()> {
    let (catalog, _heap, _dir) = create_test_table()?;
    let pool = create_test_pool(10, catalog);
    let tid = TransactionId::new();

    let result = pool.get_page(tid, PageId::new(99, 0), Permissions::ReadOnly);
    assert!(matches!(result, Err(BufferPoolError::UnknownTable(99))));

    pool.transaction_complete(tid, false)?;
    Ok(())
}

#[test]
fn test_delete_tuple() -> Result<()> {
    let (catalog, heap, _dir) = create_test_table()?;
    let pool = create_test_pool(10, catalog);
    let tid = TransactionId::new();

    let mut tuple = int_tuple(42);
    pool.insert_tuple(tid, TEST_TABLE_ID, &mut tuple)?;
    let rid = tuple.record_id().unwrap();

    pool.delete_tuple(tid, &tuple)?;
    pool.transaction_complete(tid, true)?;

    let on_disk = heap.read_page(rid.page)?;
    assert!(heap.decode_slot(&on_disk, rid.slot).is_err());
    Ok(())
}
