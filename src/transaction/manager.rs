// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Snapshot, TransactionId, TransactionState};
use crate::core::{EntityId, Result, StoreError};
use crate::storage::TableKind;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Identifies one row for write locking.
pub type RowKey = (TableKind, EntityId);

struct ManagerState {
    next_tx_id: u64,
    // Copy-on-Write so snapshots can share the set without copying it.
    active_ids: Arc<HashSet<u64>>,
    row_locks: HashMap<RowKey, TransactionId>,
}

/// Allocates transaction ids, hands out snapshots and arbitrates row locks.
///
/// Row locks are held until the owning transaction finishes. A writer that
/// finds the row locked waits until it is released or the lock timeout
/// elapses, in which case it gets a transient error and the caller may retry
/// the whole transaction.
pub struct TransactionManager {
    state: Mutex<ManagerState>,
    released: Notify,
    lock_timeout: Duration,
}

impl TransactionManager {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                next_tx_id: 1,
                active_ids: Arc::new(HashSet::new()),
                row_locks: HashMap::new(),
            }),
            released: Notify::new(),
            lock_timeout,
        }
    }

    pub fn begin(&self) -> Result<TransactionId> {
        let mut state = self.state.lock()?;
        let id = TransactionId(state.next_tx_id);
        state.next_tx_id += 1;

        let mut active = (*state.active_ids).clone();
        active.insert(id.0);
        state.active_ids = Arc::new(active);

        Ok(id)
    }

    /// Snapshot of everything committed so far, seen through `tx_id` so the
    /// transaction's own writes are included. Writers take one per statement
    /// (read committed); readers pass [`TransactionId::READ_ONLY`].
    pub fn snapshot(&self, tx_id: TransactionId) -> Result<Snapshot> {
        let state = self.state.lock()?;
        Ok(Snapshot {
            tx_id,
            active: Arc::clone(&state.active_ids),
            max_tx_id: state.next_tx_id,
        })
    }

    pub fn read_snapshot(&self) -> Result<Snapshot> {
        self.snapshot(TransactionId::READ_ONLY)
    }

    /// Ids of transactions still in progress.
    pub fn active_ids(&self) -> Result<Arc<HashSet<u64>>> {
        Ok(Arc::clone(&self.state.lock()?.active_ids))
    }

    /// Acquires the write lock on `key` for `tx_id`, waiting for the current
    /// holder to finish. Re-entrant for the holder.
    pub async fn lock_row(&self, tx_id: TransactionId, key: RowKey) -> Result<()> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            // Registered before the check so a release in between is not missed.
            let released = self.released.notified();
            {
                let mut state = self.state.lock()?;
                match state.row_locks.get(&key) {
                    Some(owner) if *owner != tx_id => {}
                    _ => {
                        state.row_locks.insert(key, tx_id);
                        return Ok(());
                    }
                }
            }

            if tokio::time::timeout_at(deadline, released).await.is_err() {
                warn!(
                    "{} gave up waiting for lock on {}#{} after {:?}",
                    tx_id, key.0, key.1, self.lock_timeout
                );
                return Err(StoreError::transient(format!(
                    "lock wait timeout on {}#{}",
                    key.0, key.1
                )));
            }
        }
    }

    /// Ends a transaction: it leaves the active set (its versions become
    /// visible to new snapshots if committed) and its row locks are released.
    /// Rolled back transactions must have undone their writes before this.
    pub fn finish(&self, tx_id: TransactionId, outcome: TransactionState) -> Result<()> {
        let released_locks = {
            let mut state = self.state.lock()?;
            if state.active_ids.contains(&tx_id.0) {
                let mut active = (*state.active_ids).clone();
                active.remove(&tx_id.0);
                state.active_ids = Arc::new(active);
            }
            let before = state.row_locks.len();
            state.row_locks.retain(|_, owner| *owner != tx_id);
            before - state.row_locks.len()
        };

        if released_locks > 0 {
            self.released.notify_waiters();
        }
        debug!("{} finished as {} ({} row locks released)", tx_id, outcome, released_locks);
        Ok(())
    }

    pub fn active_count(&self) -> Result<usize> {
        Ok(self.state.lock()?.active_ids.len())
    }

    pub fn held_lock_count(&self) -> Result<usize> {
        Ok(self.state.lock()?.row_locks.len())
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: RowKey = (TableKind::Creations, 1);

    #[test]
    fn snapshots_exclude_active_transactions() {
        let manager = TransactionManager::default();
        let first = manager.begin().unwrap();
        let second = manager.begin().unwrap();
        assert!(second > first);

        manager.finish(first, TransactionState::Committed).unwrap();
        let snap = manager.read_snapshot().unwrap();
        assert!(snap.sees(first.0));
        assert!(!snap.sees(second.0));

        let own = manager.snapshot(second).unwrap();
        assert!(own.sees(second.0));
        assert_eq!(manager.active_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn row_lock_is_reentrant_for_its_holder() {
        let manager = TransactionManager::default();
        let tx = manager.begin().unwrap();
        manager.lock_row(tx, ROW).await.unwrap();
        manager.lock_row(tx, ROW).await.unwrap();
        assert_eq!(manager.held_lock_count().unwrap(), 1);

        manager.finish(tx, TransactionState::Committed).unwrap();
        assert_eq!(manager.held_lock_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn waiter_acquires_lock_after_release() {
        let manager = Arc::new(TransactionManager::default());
        let holder = manager.begin().unwrap();
        let waiter = manager.begin().unwrap();
        manager.lock_row(holder, ROW).await.unwrap();

        let waiting = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.lock_row(waiter, ROW).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished(), "waiter must block while the row is held");

        manager.finish(holder, TransactionState::Committed).unwrap();
        waiting.await.unwrap().unwrap();
        manager.finish(waiter, TransactionState::Committed).unwrap();
    }

    #[tokio::test]
    async fn lock_wait_times_out_as_transient() {
        let manager = TransactionManager::new(Duration::from_millis(30));
        let holder = manager.begin().unwrap();
        let waiter = manager.begin().unwrap();
        manager.lock_row(holder, ROW).await.unwrap();

        let err = manager.lock_row(waiter, ROW).await.unwrap_err();
        assert!(err.is_transient());

        // Other rows are independent.
        manager
            .lock_row(waiter, (TableKind::Creations, 2))
            .await
            .unwrap();
    }
}
