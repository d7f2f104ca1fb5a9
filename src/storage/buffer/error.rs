use thiserror::Error;

use crate::common::types::{TableId, TransactionId};
use crate::storage::disk::TableFileError;

/// A lock acquisition exhausted its timeout budget. Recoverable: the
/// caller is expected to roll the transaction back (which releases its
/// locks) and retry. Not a bug.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{0} aborted: lock acquisition timed out")]
pub struct TransactionAborted(pub TransactionId);

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error(transparent)]
    Aborted(#[from] TransactionAborted),
    #[error("buffer pool exhausted: no resident page can be evicted")]
    PoolExhausted,
    #[error("unknown table {0}")]
    UnknownTable(TableId),
    #[error("table file error: {0}")]
    TableFile(#[from] TableFileError),
}
