use async_trait::async_trait;

use crate::core::{
    CatalogCounts, Comment, CommentDraft, CommentParent, Creation, DigitalLife, EntityId,
    LikeTarget, NewCreation, NewDigitalLife, NewThought, NewTool, Result, Thought, Tool,
};
use crate::pagination::Window;

/// Storage engine trait - reads and plain inserts over the entity tables.
///
/// Listings are ordered `(created_at DESC, id DESC)`. There is no way to
/// insert a comment or touch a counter through this trait; see
/// [`CounterStore`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Creates or migrates the schema. Idempotent.
    async fn init(&self) -> Result<()>;

    async fn insert_life(&self, life: NewDigitalLife) -> Result<DigitalLife>;

    async fn insert_creation(&self, creation: NewCreation) -> Result<Creation>;

    async fn insert_thought(&self, thought: NewThought) -> Result<Thought>;

    /// Fails with `UniqueViolation` when a tool with the same name exists.
    async fn insert_tool(&self, tool: NewTool) -> Result<Tool>;

    /// The singleton life row: the one with the lowest id.
    async fn life(&self) -> Result<Option<DigitalLife>>;

    async fn creation(&self, id: EntityId) -> Result<Option<Creation>>;

    async fn comment(&self, id: EntityId) -> Result<Option<Comment>>;

    async fn thought(&self, id: EntityId) -> Result<Option<Thought>>;

    async fn tool(&self, id: EntityId) -> Result<Option<Tool>>;

    async fn list_creations(&self, window: Window) -> Result<Vec<Creation>>;

    async fn list_comments(&self, parent: CommentParent, window: Window) -> Result<Vec<Comment>>;

    async fn list_thoughts(&self, window: Window) -> Result<Vec<Thought>>;

    async fn list_tools(&self, window: Window) -> Result<Vec<Tool>>;

    async fn catalog_counts(&self) -> Result<CatalogCounts>;
}

/// Counter mutations. Every method runs exactly one storage transaction and
/// never reads a counter into the caller to write it back.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically adds one like and returns the new count, or `None` when the
    /// target does not exist.
    async fn like_once(&self, target: LikeTarget) -> Result<Option<i64>>;

    /// Locks the parent, inserts the comment and bumps the parent's
    /// `comments` counter, all or nothing. `None` when the parent does not
    /// exist, in which case nothing was written.
    async fn comment_once(
        &self,
        parent: CommentParent,
        draft: CommentDraft,
    ) -> Result<Option<Comment>>;
}

/// Everything the service needs from a backend.
pub trait Store: EntityStore + CounterStore {}

impl<T: EntityStore + CounterStore + ?Sized> Store for T {}
