// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each transaction moves through defined states: Active -> Committed/Aborted.
// A snapshot records which transactions were committed when it was taken;
// row versions written by anything else are invisible to it.
//
// ============================================================================

use super::Change;
use crate::core::{Result, StoreError};
use std::collections::HashSet;
use std::sync::Arc;

/// Unique identifier for a transaction. Zero is reserved for read-only
/// snapshots, which never own a row version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub const READ_ONLY: TransactionId = TransactionId(0);

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state following the State Pattern
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// The set of transactions whose writes a reader may see.
///
/// A snapshot is only valid while the table lock it was taken under is held;
/// the engine prunes superseded versions as soon as no holder can need them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tx_id: TransactionId,
    /// Transactions in progress when the snapshot was taken.
    pub active: Arc<HashSet<u64>>,
    /// First transaction id not yet allocated at snapshot time.
    pub max_tx_id: u64,
}

impl Snapshot {
    /// Whether writes of `writer` are visible: own writes always are, other
    /// writers only once committed before the snapshot.
    pub fn sees(&self, writer: u64) -> bool {
        if writer == self.tx_id.0 {
            return true;
        }
        writer < self.max_tx_id && !self.active.contains(&writer)
    }
}

/// A write transaction of the in-memory engine with its undo log.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    changes: Vec<Change>,
}

impl Transaction {
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn record_change(&mut self, change: Change) -> Result<()> {
        if !self.state.is_active() {
            return Err(StoreError::backend(format!(
                "cannot record change: transaction {} is {}",
                self.id, self.state
            )));
        }

        self.changes.push(change);
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(StoreError::backend(format!(
                "cannot commit: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Marks the transaction aborted and hands back the undo log, newest
    /// change first.
    pub fn rollback(&mut self) -> Result<Vec<Change>> {
        if !self.state.is_active() {
            return Err(StoreError::backend(format!(
                "cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Aborted;
        let mut undo = std::mem::take(&mut self.changes);
        undo.reverse();
        Ok(undo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TableKind;

    fn snapshot(tx: u64, active: &[u64], max: u64) -> Snapshot {
        Snapshot {
            tx_id: TransactionId(tx),
            active: Arc::new(active.iter().copied().collect()),
            max_tx_id: max,
        }
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut txn = Transaction::new(TransactionId(7));

        assert_eq!(txn.state(), TransactionState::Active);
        assert!(txn.state().is_active());
        assert!(!txn.state().is_terminal());

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(txn.state().is_terminal());
        assert!(txn.commit().is_err());
        assert!(txn.rollback().is_err());
    }

    #[test]
    fn test_rollback_returns_changes_newest_first() {
        let mut txn = Transaction::new(TransactionId(3));
        txn.record_change(Change::Insert {
            table: TableKind::Comments,
            row_id: 10,
        })
        .unwrap();
        txn.record_change(Change::Update {
            table: TableKind::Creations,
            row_id: 1,
        })
        .unwrap();

        let undo = txn.rollback().unwrap();
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert_eq!(
            undo,
            vec![
                Change::Update {
                    table: TableKind::Creations,
                    row_id: 1
                },
                Change::Insert {
                    table: TableKind::Comments,
                    row_id: 10
                },
            ]
        );
        assert!(txn.record_change(Change::Insert {
            table: TableKind::Comments,
            row_id: 11,
        })
        .is_err());
    }

    #[test]
    fn test_snapshot_visibility() {
        let snap = snapshot(5, &[3], 6);
        assert!(snap.sees(5), "own writes are visible");
        assert!(snap.sees(2), "committed before the snapshot");
        assert!(!snap.sees(3), "still active when the snapshot was taken");
        assert!(!snap.sees(6), "started after the snapshot");
    }
}
