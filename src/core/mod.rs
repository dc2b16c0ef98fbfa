pub mod error;
pub mod types;

pub use error::{Result, StoreError};
pub use types::{
    CatalogCounts, Comment, CommentDraft, CommentParent, Creation, CreationKind, CreationSummary,
    DigitalLife, EntityId, LifeStatus, LikeTarget, NewCreation, NewDigitalLife, NewThought,
    NewTool, Thought, Tool,
};
