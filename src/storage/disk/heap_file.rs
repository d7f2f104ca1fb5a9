use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Page, PageId, PagePtr, Permissions, TableId, TransactionId, page_size};
use crate::storage::buffer::BufferPoolError;
use crate::storage::disk::layout;
use crate::storage::disk::table_file::{PageStore, TableFile, TableFileError};
use crate::storage::tuple::{Field, RecordId, Tuple};

/// Heap-organized table file: an unordered collection of slotted pages,
/// one file per table. Records are fixed-size slots holding
/// bincode-encoded field sequences.
pub struct HeapFile {
    table_id: TableId,
    record_bytes: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open or create the backing file for a table. `record_bytes` is the
    /// fixed slot size; every stored record must fit in it, length prefix
    /// included.
    pub fn new(
        path: impl AsRef<Path>,
        table_id: TableId,
        record_bytes: usize,
    ) -> Result<Self, TableFileError> {
        if record_bytes <= layout::RECORD_LEN_PREFIX
            || layout::slots_per_page(page_size(), record_bytes) == 0
        {
            return Err(TableFileError::InvalidRecordSize(record_bytes));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            table_id,
            record_bytes,
            file: Mutex::new(file),
        })
    }

    pub fn record_bytes(&self) -> usize {
        self.record_bytes
    }

    fn slots(&self) -> usize {
        layout::slots_per_page(page_size(), self.record_bytes)
    }

    fn page_offset(page_no: u32) -> u64 {
        page_no as u64 * page_size() as u64
    }

    fn check_table(&self, pid: PageId) -> Result<(), TableFileError> {
        if pid.table_id != self.table_id {
            return Err(TableFileError::WrongTable(pid));
        }
        Ok(())
    }

    /// Encode a tuple's fields for slot storage, enforcing the slot
    /// capacity.
    pub fn encode_tuple(&self, tuple: &Tuple) -> Result<Vec<u8>, TableFileError> {
        let payload = bincode::serialize(&tuple.fields())?;
        let max = self.record_bytes - layout::RECORD_LEN_PREFIX;
        if payload.len() > max {
            return Err(TableFileError::TupleTooLarge {
                got: payload.len(),
                max,
            });
        }
        Ok(payload)
    }

    /// Decode the record stored in a slot of a page owned by this table.
    pub fn decode_slot(&self, page: &Page, slot: usize) -> Result<Vec<Field>, TableFileError> {
        if !layout::slot_used(page.data(), slot) {
            return Err(TableFileError::SlotEmpty {
                page: page.id(),
                slot,
            });
        }
        let bytes = layout::read_record(page.data(), self.slots(), self.record_bytes, slot);
        Ok(bincode::deserialize(bytes)?)
    }
}

impl TableFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn num_pages(&self) -> Result<u32, TableFileError> {
        let file = self.file.lock();
        let len = file.metadata()?.len();
        Ok((len / page_size() as u64) as u32)
    }

    fn read_page(&self, pid: PageId) -> Result<Page, TableFileError> {
        self.check_table(pid)?;

        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let offset = Self::page_offset(pid.page_no);
        if offset + page_size() as u64 > len {
            return Err(TableFileError::PageOutOfRange(pid));
        }

        let mut data = vec![0u8; page_size()];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;

        Ok(Page::with_data(pid, data))
    }

    fn write_page(&self, page: &Page) -> Result<(), TableFileError> {
        self.check_table(page.id())?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(Self::page_offset(page.id().page_no)))?;
        file.write_all(page.data())?;
        file.flush()?;

        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, TableFileError> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let page_no = (len / page_size() as u64) as u32;

        file.seek(SeekFrom::End(0))?;
        file.write_all(&vec![0u8; page_size()])?;
        file.flush()?;

        debug!("table {} grew to page {}", self.table_id, page_no);
        Ok(PageId::new(self.table_id, page_no))
    }

    fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        store: &dyn PageStore,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let payload = self.encode_tuple(tuple)?;
        let slots = self.slots();

        // Scan existing pages for a free slot.
        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let pid = PageId::new(self.table_id, page_no);
            let ptr = store.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut page = ptr.write();
            if let Some(slot) = layout::find_free_slot(page.data(), slots) {
                layout::write_record(page.data_mut(), slots, self.record_bytes, slot, &payload);
                layout::set_slot_used(page.data_mut(), slot, true);
                tuple.set_record_id(RecordId::new(pid, slot));
                drop(page);
                return Ok(vec![ptr]);
            }
        }

        // Every page is full; grow the file and use the fresh page.
        let pid = self.allocate_page()?;
        let ptr = store.get_page(tid, pid, Permissions::ReadWrite)?;
        {
            let mut page = ptr.write();
            layout::write_record(page.data_mut(), slots, self.record_bytes, 0, &payload);
            layout::set_slot_used(page.data_mut(), 0, true);
        }
        tuple.set_record_id(RecordId::new(pid, 0));
        Ok(vec![ptr])
    }

    fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        store: &dyn PageStore,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let rid = tuple.record_id().ok_or(TableFileError::MissingRecordId)?;
        self.check_table(rid.page)?;

        let ptr = store.get_page(tid, rid.page, Permissions::ReadWrite)?;
        {
            let mut page = ptr.write();
            if !layout::slot_used(page.data(), rid.slot) {
                return Err(TableFileError::SlotEmpty {
                    page: rid.page,
                    slot: rid.slot,
                }
                .into());
            }
            layout::set_slot_used(page.data_mut(), rid.slot, false);
            layout::clear_record(page.data_mut(), self.slots(), self.record_bytes, rid.slot);
        }
        Ok(vec![ptr])
    }
}
