use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};

use super::engine::{CounterStore, EntityStore};
use super::table::{Record, Table, VersionedTable};
use super::TableKind;
use crate::core::{
    CatalogCounts, Comment, CommentDraft, CommentParent, Creation, DigitalLife, EntityId,
    LikeTarget, NewCreation, NewDigitalLife, NewThought, NewTool, Result, StoreError, Thought,
    Tool,
};
use crate::pagination::{Window, paginate};
use crate::transaction::{
    Change, Snapshot, Transaction, TransactionId, TransactionManager, TransactionState,
};

pub(crate) struct Tables {
    lives: Table<DigitalLife>,
    creations: Table<Creation>,
    comments: Table<Comment>,
    thoughts: Table<Thought>,
    tools: Table<Tool>,
}

impl Tables {
    fn new() -> Self {
        Self {
            lives: Table::new(TableKind::DigitalLife),
            creations: Table::new(TableKind::Creations),
            comments: Table::new(TableKind::Comments),
            thoughts: Table::new(TableKind::Thoughts),
            tools: Table::new(TableKind::Tools),
        }
    }

    fn table_mut(&mut self, kind: TableKind) -> &mut dyn VersionedTable {
        match kind {
            TableKind::DigitalLife => &mut self.lives,
            TableKind::Creations => &mut self.creations,
            TableKind::Comments => &mut self.comments,
            TableKind::Thoughts => &mut self.thoughts,
            TableKind::Tools => &mut self.tools,
        }
    }
}

/// Transactional in-memory backend.
///
/// All five tables sit behind one lock that is only ever held inside
/// synchronous sections, never across an `.await`. Row locks, which writers
/// do wait on, live in the [`TransactionManager`]. Lock order is tables
/// first, then the manager.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    transactions: TransactionManager,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(Duration::from_secs(2))
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            transactions: TransactionManager::new(lock_timeout),
        }
    }

    /// Transactions that have begun and not yet finished.
    pub fn active_transactions(&self) -> Result<usize> {
        self.transactions.active_count()
    }

    /// Number of stored versions of a row, including superseded ones.
    pub fn version_count(&self, kind: TableKind, id: EntityId) -> Result<usize> {
        let tables = self.tables.read()?;
        Ok(match kind {
            TableKind::DigitalLife => tables.lives.version_count(id),
            TableKind::Creations => tables.creations.version_count(id),
            TableKind::Comments => tables.comments.version_count(id),
            TableKind::Thoughts => tables.thoughts.version_count(id),
            TableKind::Tools => tables.tools.version_count(id),
        })
    }

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        let id = self.transactions.begin()?;
        Ok(MemoryTransaction {
            store: self,
            txn: Transaction::new(id),
        })
    }

    /// Runs `f` against a snapshot of committed data. The snapshot is taken
    /// under the table lock, so the pruning done by concurrent commits cannot
    /// remove a version it needs.
    fn read<T>(&self, f: impl FnOnce(&Tables, &Snapshot) -> T) -> Result<T> {
        let tables = self.tables.read()?;
        let snapshot = self.transactions.read_snapshot()?;
        Ok(f(&tables, &snapshot))
    }

    /// One-statement transaction for the plain insert paths.
    fn autocommit<T>(
        &self,
        f: impl FnOnce(&mut Tables, &Snapshot) -> Result<(T, Change)>,
    ) -> Result<T> {
        let mut txn = self.begin()?;
        let value = txn.write(|tables, snapshot, changes| {
            let (value, change) = f(tables, snapshot)?;
            changes.push(change);
            Ok(value)
        })?;
        txn.commit()?;
        Ok(value)
    }

    fn vacuum(&self, changes: &[Change]) -> Result<()> {
        if !changes.iter().any(Change::is_update) {
            return Ok(());
        }

        let mut tables = self.tables.write()?;
        let active = self.transactions.active_ids()?;
        let mut pruned = 0;
        for change in changes.iter().filter(|change| change.is_update()) {
            pruned += tables
                .table_mut(change.table())
                .prune(change.row_id(), &active);
        }
        debug!("vacuum pruned {} row versions", pruned);
        Ok(())
    }

    /// Id of the singleton life row under a fresh snapshot.
    fn life_id(&self) -> Result<Option<EntityId>> {
        self.read(|tables, snapshot| tables.lives.first(snapshot).map(|life| life.id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A write transaction in progress.
///
/// Dropping it without [`commit`](Self::commit) rolls it back, which is what
/// happens when the request future is cancelled between two statements.
struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    txn: Transaction,
}

impl MemoryTransaction<'_> {
    fn id(&self) -> TransactionId {
        self.txn.id()
    }

    async fn lock_row(&self, table: TableKind, id: EntityId) -> Result<()> {
        self.store.transactions.lock_row(self.id(), (table, id)).await
    }

    /// One statement: `f` runs under the table write lock with a fresh
    /// snapshot and reports every change it makes, including changes made
    /// before it fails, so a rollback can undo them.
    fn write<T>(
        &mut self,
        f: impl FnOnce(&mut Tables, &Snapshot, &mut Vec<Change>) -> Result<T>,
    ) -> Result<T> {
        let mut tables = self.store.tables.write()?;
        let snapshot = self.store.transactions.snapshot(self.id())?;
        let mut changes = Vec::new();
        let result = f(&mut tables, &snapshot, &mut changes);
        drop(tables);

        for change in changes {
            self.txn.record_change(change)?;
        }
        result
    }

    fn commit(mut self) -> Result<()> {
        self.txn.commit()?;
        self.store
            .transactions
            .finish(self.id(), TransactionState::Committed)?;
        self.store.vacuum(self.txn.changes())
    }

    fn rollback(mut self) -> Result<()> {
        self.abort()
    }

    fn abort(&mut self) -> Result<()> {
        let undo = self.txn.rollback()?;
        {
            let mut tables = self.store.tables.write()?;
            for change in &undo {
                tables.table_mut(change.table()).undo(change, self.id());
            }
        }
        self.store
            .transactions
            .finish(self.id(), TransactionState::Aborted)
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.txn.state().is_active() {
            debug!("{} dropped while active, rolling back", self.id());
            if let Err(err) = self.abort() {
                error!("rollback of {} failed: {}", self.id(), err);
            }
        }
    }
}

/// Appends a new version of `id` with `apply` applied and records the change.
fn bump<R: Record>(
    table: &mut Table<R>,
    id: EntityId,
    snapshot: &Snapshot,
    changes: &mut Vec<Change>,
    apply: impl FnOnce(&mut R),
) -> Result<Option<R>> {
    match table.update(id, snapshot, apply)? {
        Some((row, change)) => {
            changes.push(change);
            Ok(Some(row))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn init(&self) -> Result<()> {
        debug!("in-memory tables ready");
        Ok(())
    }

    async fn insert_life(&self, life: NewDigitalLife) -> Result<DigitalLife> {
        self.autocommit(|tables, snapshot| {
            let row = DigitalLife {
                id: tables.lives.allocate_id(),
                name: life.name,
                likes: 0,
                visitors: 0,
                comments: 0,
                lifespan: life.lifespan,
                created_at: Utc::now(),
            };
            let change = tables.lives.insert(row.clone(), snapshot.tx_id)?;
            Ok((row, change))
        })
    }

    async fn insert_creation(&self, creation: NewCreation) -> Result<Creation> {
        self.autocommit(|tables, snapshot| {
            let row = Creation {
                id: tables.creations.allocate_id(),
                kind: creation.kind,
                title: creation.title,
                content: creation.content,
                likes: 0,
                comments: 0,
                asset_url: creation.asset_url,
                created_at: Utc::now(),
            };
            let change = tables.creations.insert(row.clone(), snapshot.tx_id)?;
            Ok((row, change))
        })
    }

    async fn insert_thought(&self, thought: NewThought) -> Result<Thought> {
        self.autocommit(|tables, snapshot| {
            let row = Thought {
                id: tables.thoughts.allocate_id(),
                cycle_id: thought.cycle_id,
                agent_name: thought.agent_name,
                content: thought.content,
                created_at: Utc::now(),
            };
            let change = tables.thoughts.insert(row.clone(), snapshot.tx_id)?;
            Ok((row, change))
        })
    }

    async fn insert_tool(&self, tool: NewTool) -> Result<Tool> {
        self.autocommit(|tables, snapshot| {
            if tables.tools.latest().any(|existing| existing.name == tool.name) {
                return Err(StoreError::UniqueViolation(format!(
                    "tool name '{}' already exists",
                    tool.name
                )));
            }
            let row = Tool {
                id: tables.tools.allocate_id(),
                name: tool.name,
                description: tool.description,
                code: tool.code,
                dependencies: tool.dependencies,
                created_at: Utc::now(),
            };
            let change = tables.tools.insert(row.clone(), snapshot.tx_id)?;
            Ok((row, change))
        })
    }

    async fn life(&self) -> Result<Option<DigitalLife>> {
        self.read(|tables, snapshot| tables.lives.first(snapshot).cloned())
    }

    async fn creation(&self, id: EntityId) -> Result<Option<Creation>> {
        self.read(|tables, snapshot| tables.creations.get(id, snapshot).cloned())
    }

    async fn comment(&self, id: EntityId) -> Result<Option<Comment>> {
        self.read(|tables, snapshot| tables.comments.get(id, snapshot).cloned())
    }

    async fn thought(&self, id: EntityId) -> Result<Option<Thought>> {
        self.read(|tables, snapshot| tables.thoughts.get(id, snapshot).cloned())
    }

    async fn tool(&self, id: EntityId) -> Result<Option<Tool>> {
        self.read(|tables, snapshot| tables.tools.get(id, snapshot).cloned())
    }

    async fn list_creations(&self, window: Window) -> Result<Vec<Creation>> {
        self.read(|tables, snapshot| {
            paginate(tables.creations.scan(snapshot).cloned().collect(), window)
        })
    }

    async fn list_comments(&self, parent: CommentParent, window: Window) -> Result<Vec<Comment>> {
        let creation_id = parent.creation_id();
        self.read(|tables, snapshot| {
            let rows = tables
                .comments
                .scan(snapshot)
                .filter(|comment| comment.creation_id == creation_id)
                .cloned()
                .collect();
            paginate(rows, window)
        })
    }

    async fn list_thoughts(&self, window: Window) -> Result<Vec<Thought>> {
        self.read(|tables, snapshot| {
            paginate(tables.thoughts.scan(snapshot).cloned().collect(), window)
        })
    }

    async fn list_tools(&self, window: Window) -> Result<Vec<Tool>> {
        self.read(|tables, snapshot| paginate(tables.tools.scan(snapshot).cloned().collect(), window))
    }

    async fn catalog_counts(&self) -> Result<CatalogCounts> {
        self.read(|tables, snapshot| CatalogCounts {
            tools: tables.tools.count(snapshot) as i64,
            creations: tables.creations.count(snapshot) as i64,
        })
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn like_once(&self, target: LikeTarget) -> Result<Option<i64>> {
        let (table, id) = match target {
            LikeTarget::Creation(id) => (TableKind::Creations, id),
            LikeTarget::Life => match self.life_id()? {
                Some(id) => (TableKind::DigitalLife, id),
                None => return Ok(None),
            },
        };

        let mut txn = self.begin()?;
        txn.lock_row(table, id).await?;
        let likes = txn.write(|tables, snapshot, changes| match table {
            TableKind::DigitalLife => Ok(bump(&mut tables.lives, id, snapshot, changes, |life| {
                life.likes += 1
            })?
            .map(|life| life.likes)),
            _ => Ok(bump(&mut tables.creations, id, snapshot, changes, |creation| {
                creation.likes += 1
            })?
            .map(|creation| creation.likes)),
        })?;

        match likes {
            Some(_) => txn.commit()?,
            None => txn.rollback()?,
        }
        Ok(likes)
    }

    async fn comment_once(
        &self,
        parent: CommentParent,
        draft: CommentDraft,
    ) -> Result<Option<Comment>> {
        let (table, parent_id) = match parent {
            CommentParent::Creation(id) => (TableKind::Creations, id),
            CommentParent::Life => match self.life_id()? {
                Some(id) => (TableKind::DigitalLife, id),
                None => return Ok(None),
            },
        };

        let mut txn = self.begin()?;
        txn.lock_row(table, parent_id).await?;
        let comment = txn.write(|tables, snapshot, changes| {
            let parent_visible = match parent {
                CommentParent::Creation(id) => tables.creations.get(id, snapshot).is_some(),
                CommentParent::Life => tables.lives.get(parent_id, snapshot).is_some(),
            };
            if !parent_visible {
                return Ok(None);
            }

            let row = Comment {
                id: tables.comments.allocate_id(),
                content: draft.content,
                reply_content: draft.reply_content,
                creation_id: parent.creation_id(),
                created_at: Utc::now(),
            };
            changes.push(tables.comments.insert(row.clone(), snapshot.tx_id)?);

            let bumped = match parent {
                CommentParent::Creation(id) => bump(&mut tables.creations, id, snapshot, changes, |c| {
                    c.comments += 1
                })?
                .is_some(),
                CommentParent::Life => bump(&mut tables.lives, parent_id, snapshot, changes, |l| {
                    l.comments += 1
                })?
                .is_some(),
            };
            if !bumped {
                return Err(StoreError::ForeignKeyViolation(format!(
                    "{parent} disappeared while commenting"
                )));
            }
            Ok(Some(row))
        })?;

        match comment {
            Some(_) => txn.commit()?,
            None => txn.rollback()?,
        }
        Ok(comment)
    }
}
