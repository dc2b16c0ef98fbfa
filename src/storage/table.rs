use std::collections::{BTreeMap, HashSet};

use super::TableKind;
use crate::core::{EntityId, Result, StoreError};
use crate::pagination::Chronological;
use crate::transaction::{Change, Snapshot, TransactionId};

/// A row type the in-memory engine can store.
pub trait Record: Chronological + Clone + Send + Sync + 'static {}

impl<T: Chronological + Clone + Send + Sync + 'static> Record for T {}

#[derive(Debug, Clone)]
struct MvccRow<R> {
    row: R,
    xmin: u64,         // Transaction that wrote this version
    xmax: Option<u64>, // Transaction that superseded it
}

impl<R> MvccRow<R> {
    fn is_visible(&self, snapshot: &Snapshot) -> bool {
        snapshot.sees(self.xmin) && !self.xmax.is_some_and(|writer| snapshot.sees(writer))
    }
}

/// Multi-versioned rows keyed by id. Ids are allocated from a per-table
/// sequence and never reused, so ascending key order is insertion order.
#[derive(Debug)]
pub struct Table<R> {
    kind: TableKind,
    rows: BTreeMap<EntityId, Vec<MvccRow<R>>>,
    next_row_id: EntityId,
}

impl<R: Record> Table<R> {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    /// Next id from the sequence. Like a database sequence, an id taken by
    /// a transaction that rolls back is not handed out again.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    /// Stores the first version of a row written by `tx`.
    pub fn insert(&mut self, row: R, tx: TransactionId) -> Result<Change> {
        let id = row.id();
        if self.rows.contains_key(&id) {
            return Err(StoreError::UniqueViolation(format!(
                "duplicate key {}#{}",
                self.kind, id
            )));
        }
        self.next_row_id = self.next_row_id.max(id + 1);
        self.rows.insert(
            id,
            vec![MvccRow {
                row,
                xmin: tx.as_u64(),
                xmax: None,
            }],
        );
        Ok(Change::Insert {
            table: self.kind,
            row_id: id,
        })
    }

    /// Writes a new version of the row visible to `snapshot`. Returns
    /// `None` when no such row exists.
    ///
    /// The caller must hold the row lock, so the visible version is always
    /// the newest one; anything else is a write-write conflict.
    pub fn update(
        &mut self,
        id: EntityId,
        snapshot: &Snapshot,
        apply: impl FnOnce(&mut R),
    ) -> Result<Option<(R, Change)>> {
        let Some(versions) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        let Some(position) = versions
            .iter()
            .rposition(|version| version.is_visible(snapshot))
        else {
            return Ok(None);
        };
        if position + 1 != versions.len() {
            return Err(StoreError::transient(format!(
                "write-write conflict on {}#{}",
                self.kind, id
            )));
        }

        let writer = snapshot.tx_id.as_u64();
        let latest = &mut versions[position];
        latest.xmax = Some(writer);
        let mut row = latest.row.clone();
        apply(&mut row);
        versions.push(MvccRow {
            row: row.clone(),
            xmin: writer,
            xmax: None,
        });

        Ok(Some((
            row,
            Change::Update {
                table: self.kind,
                row_id: id,
            },
        )))
    }

    pub fn get(&self, id: EntityId, snapshot: &Snapshot) -> Option<&R> {
        self.rows.get(&id).and_then(|versions| Self::visible(versions, snapshot))
    }

    /// Visible rows in ascending id order.
    pub fn scan<'a>(&'a self, snapshot: &'a Snapshot) -> impl Iterator<Item = &'a R> + 'a {
        self.rows
            .values()
            .filter_map(move |versions| Self::visible(versions, snapshot))
    }

    /// The visible row with the lowest id.
    pub fn first<'a>(&'a self, snapshot: &'a Snapshot) -> Option<&'a R> {
        self.scan(snapshot).next()
    }

    pub fn count(&self, snapshot: &Snapshot) -> usize {
        self.scan(snapshot).count()
    }

    /// Newest version of every row, committed or not. Uniqueness checks look
    /// here so two concurrent inserts cannot both succeed.
    pub fn latest(&self) -> impl Iterator<Item = &R> + '_ {
        self.rows
            .values()
            .filter_map(|versions| versions.last().map(|version| &version.row))
    }

    pub fn version_count(&self, id: EntityId) -> usize {
        self.rows.get(&id).map_or(0, Vec::len)
    }

    fn visible<'a>(versions: &'a [MvccRow<R>], snapshot: &Snapshot) -> Option<&'a R> {
        versions
            .iter()
            .rev()
            .find(|version| version.is_visible(snapshot))
            .map(|version| &version.row)
    }
}

/// Row-type independent maintenance, so the engine can walk an undo log
/// without knowing which table each change touched.
pub trait VersionedTable: Send + Sync {
    /// Reverts one change made by `tx`.
    fn undo(&mut self, change: &Change, tx: TransactionId);

    /// Drops versions superseded by a committed writer. No snapshot taken
    /// after that commit can see them, and older snapshots never outlive
    /// the table lock they were taken under.
    fn prune(&mut self, id: EntityId, active: &HashSet<u64>) -> usize;
}

impl<R: Record> VersionedTable for Table<R> {
    fn undo(&mut self, change: &Change, tx: TransactionId) {
        let writer = tx.as_u64();
        match change {
            Change::Insert { row_id, .. } => {
                if self
                    .rows
                    .get(row_id)
                    .and_then(|versions| versions.first())
                    .is_some_and(|version| version.xmin == writer)
                {
                    self.rows.remove(row_id);
                }
            }
            Change::Update { row_id, .. } => {
                let Some(versions) = self.rows.get_mut(row_id) else {
                    return;
                };
                if versions.last().is_some_and(|version| version.xmin == writer) {
                    versions.pop();
                }
                if let Some(previous) = versions.last_mut()
                    && previous.xmax == Some(writer)
                {
                    previous.xmax = None;
                }
            }
        }
    }

    fn prune(&mut self, id: EntityId, active: &HashSet<u64>) -> usize {
        let Some(versions) = self.rows.get_mut(&id) else {
            return 0;
        };
        let before = versions.len();
        versions.retain(|version| match version.xmax {
            None => true,
            Some(writer) => active.contains(&writer),
        });
        before - versions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::core::Creation;

    fn creation(id: EntityId) -> Creation {
        Creation {
            id,
            kind: None,
            title: format!("creation {id}"),
            content: None,
            likes: 0,
            comments: 0,
            asset_url: None,
            created_at: Utc::now(),
        }
    }

    fn snapshot(tx: u64, active: &[u64], max: u64) -> Snapshot {
        Snapshot {
            tx_id: TransactionId(tx),
            active: Arc::new(active.iter().copied().collect()),
            max_tx_id: max,
        }
    }

    fn committed_table() -> Table<Creation> {
        let mut table = Table::new(TableKind::Creations);
        let id = table.allocate_id();
        table.insert(creation(id), TransactionId(1)).unwrap();
        table
    }

    #[test]
    fn test_uncommitted_insert_is_invisible_to_others() {
        let mut table = Table::new(TableKind::Creations);
        let id = table.allocate_id();
        table.insert(creation(id), TransactionId(1)).unwrap();

        assert!(table.get(id, &snapshot(1, &[1], 2)).is_some());
        assert!(table.get(id, &snapshot(0, &[1], 2)).is_none());
        assert!(table.get(id, &snapshot(0, &[], 2)).is_some());
        assert_eq!(table.latest().count(), 1);
    }

    #[test]
    fn test_update_keeps_old_version_for_concurrent_readers() {
        let mut table = committed_table();
        let writer = snapshot(2, &[2], 3);

        let (row, change) = table.update(1, &writer, |c| c.likes += 1).unwrap().unwrap();
        assert_eq!(row.likes, 1);
        assert!(change.is_update());
        assert_eq!(table.version_count(1), 2);

        assert_eq!(table.get(1, &snapshot(0, &[2], 3)).unwrap().likes, 0);
        assert_eq!(table.get(1, &writer).unwrap().likes, 1);
        assert_eq!(table.get(1, &snapshot(0, &[], 3)).unwrap().likes, 1);
    }

    #[test]
    fn test_update_missing_row() {
        let mut table = committed_table();
        assert!(table.update(99, &snapshot(2, &[2], 3), |_| {}).unwrap().is_none());
    }

    #[test]
    fn test_update_of_row_superseded_by_another_writer_conflicts() {
        let mut table = committed_table();
        table.update(1, &snapshot(2, &[2], 3), |c| c.likes += 1).unwrap();

        let err = table
            .update(1, &snapshot(3, &[2, 3], 4), |c| c.likes += 1)
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut table = committed_table();
        let tx = TransactionId(2);
        let writer = snapshot(2, &[2], 3);
        let (_, first) = table.update(1, &writer, |c| c.likes += 1).unwrap().unwrap();
        let (_, second) = table.update(1, &writer, |c| c.comments += 1).unwrap().unwrap();
        let id = table.allocate_id();
        let insert = table.insert(creation(id), tx).unwrap();

        for change in [insert, second, first] {
            table.undo(&change, tx);
        }

        let reader = snapshot(0, &[], 3);
        let row = table.get(1, &reader).unwrap();
        assert_eq!((row.likes, row.comments), (0, 0));
        assert_eq!(table.version_count(1), 1);
        assert!(table.get(id, &reader).is_none());
        assert_eq!(table.allocate_id(), id + 1, "ids are not reused");
    }

    #[test]
    fn test_prune_drops_committed_superseded_versions() {
        let mut table = committed_table();
        table.update(1, &snapshot(2, &[2], 3), |c| c.likes += 1).unwrap();

        assert_eq!(table.prune(1, &HashSet::from([2])), 0);
        assert_eq!(table.prune(1, &HashSet::new()), 1);
        assert_eq!(table.version_count(1), 1);
        assert_eq!(table.first(&snapshot(0, &[], 3)).unwrap().likes, 1);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut table = committed_table();
        let err = table.insert(creation(1), TransactionId(2)).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }
}
