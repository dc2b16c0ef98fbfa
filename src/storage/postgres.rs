use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use tracing::info;

use super::engine::{CounterStore, EntityStore};
use crate::core::{
    CatalogCounts, Comment, CommentDraft, CommentParent, Creation, DigitalLife, EntityId,
    LikeTarget, NewCreation, NewDigitalLife, NewThought, NewTool, Result, Thought, Tool,
};
use crate::pagination::Window;

const LIFE_COLUMNS: &str = "id, name, likes, visitors, comments, lifespan, created_at";
const CREATION_COLUMNS: &str = "id, type, title, content, likes, comments, asset_url, created_at";
const COMMENT_COLUMNS: &str = "id, content, reply_content, creation_id, created_at";
const THOUGHT_COLUMNS: &str = "id, cycle_id, agent_name, content, created_at";
const TOOL_COLUMNS: &str = "id, name, description, code, dependencies, created_at";

/// Oldest life row; every singleton read and write goes through it.
const SINGLETON_LIFE: &str = "(SELECT id FROM digital_life ORDER BY id ASC LIMIT 1)";

#[derive(FromRow)]
struct ToolRow {
    id: EntityId,
    name: String,
    description: Option<String>,
    code: Option<String>,
    dependencies: Option<Json<Vec<String>>>,
    created_at: DateTime<Utc>,
}

impl From<ToolRow> for Tool {
    fn from(row: ToolRow) -> Self {
        Tool {
            id: row.id,
            name: row.name,
            description: row.description,
            code: row.code,
            dependencies: row.dependencies.map(|Json(deps)| deps),
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL backend. Counters change only through single `UPDATE`
/// statements or inside a transaction that holds the parent's row lock.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn init(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("PostgreSQL schema is up to date");
        Ok(())
    }

    async fn insert_life(&self, life: NewDigitalLife) -> Result<DigitalLife> {
        let row = sqlx::query_as::<_, DigitalLife>(&format!(
            "INSERT INTO digital_life (name, lifespan) VALUES ($1, $2) RETURNING {LIFE_COLUMNS}"
        ))
        .bind(life.name)
        .bind(life.lifespan)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_creation(&self, creation: NewCreation) -> Result<Creation> {
        let row = sqlx::query_as::<_, Creation>(&format!(
            r#"
            INSERT INTO creations (type, title, content, asset_url)
            VALUES ($1, $2, $3, $4)
            RETURNING {CREATION_COLUMNS}
            "#
        ))
        .bind(creation.kind)
        .bind(creation.title)
        .bind(creation.content)
        .bind(creation.asset_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_thought(&self, thought: NewThought) -> Result<Thought> {
        let row = sqlx::query_as::<_, Thought>(&format!(
            r#"
            INSERT INTO thoughts (cycle_id, agent_name, content)
            VALUES ($1, $2, $3)
            RETURNING {THOUGHT_COLUMNS}
            "#
        ))
        .bind(thought.cycle_id)
        .bind(thought.agent_name)
        .bind(thought.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_tool(&self, tool: NewTool) -> Result<Tool> {
        let row = sqlx::query_as::<_, ToolRow>(&format!(
            r#"
            INSERT INTO tools (name, description, code, dependencies)
            VALUES ($1, $2, $3, $4)
            RETURNING {TOOL_COLUMNS}
            "#
        ))
        .bind(tool.name)
        .bind(tool.description)
        .bind(tool.code)
        .bind(tool.dependencies.map(Json))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn life(&self) -> Result<Option<DigitalLife>> {
        let row = sqlx::query_as::<_, DigitalLife>(&format!(
            "SELECT {LIFE_COLUMNS} FROM digital_life ORDER BY id ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn creation(&self, id: EntityId) -> Result<Option<Creation>> {
        let row = sqlx::query_as::<_, Creation>(&format!(
            "SELECT {CREATION_COLUMNS} FROM creations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn comment(&self, id: EntityId) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn thought(&self, id: EntityId) -> Result<Option<Thought>> {
        let row = sqlx::query_as::<_, Thought>(&format!(
            "SELECT {THOUGHT_COLUMNS} FROM thoughts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn tool(&self, id: EntityId) -> Result<Option<Tool>> {
        let row = sqlx::query_as::<_, ToolRow>(&format!(
            "SELECT {TOOL_COLUMNS} FROM tools WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Tool::from))
    }

    async fn list_creations(&self, window: Window) -> Result<Vec<Creation>> {
        let rows = sqlx::query_as::<_, Creation>(&format!(
            r#"
            SELECT {CREATION_COLUMNS} FROM creations
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_comments(&self, parent: CommentParent, window: Window) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS} FROM comments
            WHERE creation_id IS NOT DISTINCT FROM $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(parent.creation_id())
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_thoughts(&self, window: Window) -> Result<Vec<Thought>> {
        let rows = sqlx::query_as::<_, Thought>(&format!(
            r#"
            SELECT {THOUGHT_COLUMNS} FROM thoughts
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_tools(&self, window: Window) -> Result<Vec<Tool>> {
        let rows = sqlx::query_as::<_, ToolRow>(&format!(
            r#"
            SELECT {TOOL_COLUMNS} FROM tools
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(window.sql_limit())
        .bind(window.sql_offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Tool::from).collect())
    }

    async fn catalog_counts(&self) -> Result<CatalogCounts> {
        let (tools, creations): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tools)::BIGINT,
                (SELECT COUNT(*) FROM creations)::BIGINT
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(CatalogCounts { tools, creations })
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn like_once(&self, target: LikeTarget) -> Result<Option<i64>> {
        let like_life = format!(
            "UPDATE digital_life SET likes = likes + 1 WHERE id = {SINGLETON_LIFE} RETURNING likes"
        );
        let query = match target {
            LikeTarget::Creation(id) => {
                sqlx::query_scalar::<_, i64>(
                    "UPDATE creations SET likes = likes + 1 WHERE id = $1 RETURNING likes",
                )
                .bind(id)
            }
            LikeTarget::Life => sqlx::query_scalar::<_, i64>(&like_life),
        };
        let likes = query.fetch_optional(&self.pool).await?;
        Ok(likes)
    }

    async fn comment_once(
        &self,
        parent: CommentParent,
        draft: CommentDraft,
    ) -> Result<Option<Comment>> {
        let mut tx = self.pool.begin().await?;

        let parent_id: Option<EntityId> = match parent {
            CommentParent::Creation(id) => {
                sqlx::query_scalar("SELECT id FROM creations WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            CommentParent::Life => {
                sqlx::query_scalar(&format!(
                    "SELECT id FROM digital_life WHERE id = {SINGLETON_LIFE} FOR UPDATE"
                ))
                .fetch_optional(&mut *tx)
                .await?
            }
        };
        let Some(parent_id) = parent_id else {
            tx.rollback().await?;
            return Ok(None);
        };

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (content, reply_content, creation_id)
            VALUES ($1, $2, $3)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(draft.content)
        .bind(draft.reply_content)
        .bind(parent.creation_id())
        .fetch_one(&mut *tx)
        .await?;

        let counter_update = match parent {
            CommentParent::Creation(_) => {
                "UPDATE creations SET comments = comments + 1 WHERE id = $1"
            }
            CommentParent::Life => "UPDATE digital_life SET comments = comments + 1 WHERE id = $1",
        };
        sqlx::query(counter_update)
            .bind(parent_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(comment))
    }
}
