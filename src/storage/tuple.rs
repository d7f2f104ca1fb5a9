use serde::{Deserialize, Serialize};

use crate::common::types::PageId;

/// A single column value. Records are bincode-encoded sequences of fields,
/// stored in fixed-size heap file slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    Int(i64),
    Text(String),
}

/// Location of a stored tuple: the page holding it plus the slot index
/// within that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page: PageId, slot: usize) -> Self {
        Self { page, slot }
    }
}

/// One table row. The record id is absent until the tuple has been stored
/// by an insert, and identifies the tuple for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            record_id: None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.record_id = Some(rid);
    }
}
