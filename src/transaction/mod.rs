// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Transactions of the in-memory engine. Rows are versioned (MVCC): readers
// work from a snapshot of committed transactions, writers take a row lock,
// append a new version and keep an undo log so a rollback leaves no trace.
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{RowKey, TransactionManager};
pub use state::{Snapshot, Transaction, TransactionId, TransactionState};
