use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// Store-assigned surrogate key. Monotonically increasing per table.
pub type EntityId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "creation_type", rename_all = "lowercase")]
pub enum CreationKind {
    Article,
    Image,
}

/// The singleton profile row. `comments` counts comments whose
/// `creation_id` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DigitalLife {
    pub id: EntityId,
    pub name: String,
    pub likes: i64,
    pub visitors: i64,
    pub comments: i64,
    pub lifespan: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Creation {
    pub id: EntityId,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: Option<CreationKind>,
    pub title: String,
    pub content: Option<String>,
    pub likes: i64,
    pub comments: i64,
    pub asset_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: EntityId,
    pub content: String,
    pub reply_content: Option<String>,
    pub creation_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Thought {
    pub id: EntityId,
    pub cycle_id: Option<i64>,
    pub agent_name: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDigitalLife {
    pub name: String,
    pub lifespan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCreation {
    #[serde(rename = "type")]
    pub kind: Option<CreationKind>,
    pub title: String,
    pub content: Option<String>,
    pub asset_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewThought {
    pub cycle_id: Option<i64>,
    pub agent_name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTool {
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
    pub dependencies: Option<Vec<String>>,
}

/// Validated comment payload handed to the counter transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub content: String,
    pub reply_content: Option<String>,
}

/// Where a comment hangs: a creation, or the digital life itself
/// (stored as a null `creation_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentParent {
    Creation(EntityId),
    Life,
}

impl CommentParent {
    pub fn creation_id(&self) -> Option<EntityId> {
        match self {
            Self::Creation(id) => Some(*id),
            Self::Life => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeTarget {
    Creation(EntityId),
    Life,
}

impl std::fmt::Display for CommentParent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creation(id) => write!(f, "creation {id}"),
            Self::Life => write!(f, "digital life"),
        }
    }
}

impl std::fmt::Display for LikeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creation(id) => write!(f, "creation {id}"),
            Self::Life => write!(f, "digital life"),
        }
    }
}

/// Catalog sizes reported next to the life status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub tools: i64,
    pub creations: i64,
}

/// List item of the creations listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationSummary {
    pub id: EntityId,
    pub title: String,
    pub asset_url: Option<String>,
}

impl From<Creation> for CreationSummary {
    fn from(creation: Creation) -> Self {
        Self {
            id: creation.id,
            title: creation.title,
            asset_url: creation.asset_url,
        }
    }
}

/// The life row with the derived catalog counts next to its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeStatus {
    #[serde(flatten)]
    pub life: DigitalLife,
    pub tools: i64,
    pub creations: i64,
}

impl LifeStatus {
    pub fn new(life: DigitalLife, counts: CatalogCounts) -> Self {
        Self {
            life,
            tools: counts.tools,
            creations: counts.creations,
        }
    }
}
