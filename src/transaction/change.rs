// ============================================================================
// Change Tracking
// ============================================================================
//
// Undo log entries. Rolling a transaction back replays its changes in
// reverse: an insert removes the row, an update drops the version the
// transaction appended and reopens the one it superseded.
//
// ============================================================================

use crate::core::EntityId;
use crate::storage::TableKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Insert { table: TableKind, row_id: EntityId },
    Update { table: TableKind, row_id: EntityId },
}

impl Change {
    pub fn table(&self) -> TableKind {
        match self {
            Change::Insert { table, .. } | Change::Update { table, .. } => *table,
        }
    }

    pub fn row_id(&self) -> EntityId {
        match self {
            Change::Insert { row_id, .. } | Change::Update { row_id, .. } => *row_id,
        }
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Change::Update { .. })
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Insert { table, row_id } => write!(f, "INSERT {table}#{row_id}"),
            Change::Update { table, row_id } => write!(f, "UPDATE {table}#{row_id}"),
        }
    }
}
