pub mod types;

pub use types::{Page, PageId, PagePtr, Permissions, TableId, TransactionId};
pub use types::{DEFAULT_PAGE_SIZE, page_size, reset_page_size, set_page_size};
