pub mod heap_file;
pub mod layout;
pub mod table_file;

pub use heap_file::HeapFile;
pub use table_file::{PageStore, TableFile, TableFileError};
