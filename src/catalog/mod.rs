//! Table registry: resolves a page identity's owning table file.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::TableId;
use crate::storage::disk::TableFile;

/// Maps table identifiers to their storage files. The buffer pool
/// consults it on every cache miss and flush; query-side callers resolve
/// table names through it.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn TableFile>>>,
    names: RwLock<HashMap<String, TableId>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under a name. Re-registering a name or id
    /// replaces the previous entry.
    pub fn register_table(&self, name: &str, file: Arc<dyn TableFile>) {
        let table_id = file.table_id();
        self.tables.write().insert(table_id, file);
        self.names.write().insert(name.to_string(), table_id);
    }

    pub fn table_file(&self, table_id: TableId) -> Option<Arc<dyn TableFile>> {
        self.tables.read().get(&table_id).cloned()
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.names.read().get(name).copied()
    }
}
