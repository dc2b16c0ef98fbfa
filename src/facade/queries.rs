use std::sync::Arc;

use crate::core::{
    Comment, CommentParent, Creation, CreationSummary, EntityId, LifeStatus, Thought, Tool,
};
use crate::error::{AppError, AppResult};
use crate::pagination::{PageLimit, PageRequest};
use crate::storage::Store;

/// Default and maximum page sizes of every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub creations: PageLimit,
    pub creation_comments: PageLimit,
    pub life_comments: PageLimit,
    pub thoughts: PageLimit,
    pub tools: PageLimit,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            creations: PageLimit::new(10, 100),
            creation_comments: PageLimit::new(10, 100),
            life_comments: PageLimit::new(10, 50),
            thoughts: PageLimit::new(10, 50),
            tools: PageLimit::new(10, 100),
        }
    }
}

/// Raw paging parameters as they arrive from a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self { page, limit }
    }

    fn resolve(self, limit: PageLimit) -> AppResult<PageRequest> {
        Ok(PageRequest::resolve(self.page, self.limit, limit)?)
    }
}

/// Read side of the service. Every method is a plain read against the
/// store, without an explicit transaction.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<dyn Store>,
    limits: PageLimits,
}

impl QueryFacade {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_limits(store, PageLimits::default())
    }

    pub fn with_limits(store: Arc<dyn Store>, limits: PageLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub async fn list_creations(&self, params: PageParams) -> AppResult<Vec<CreationSummary>> {
        let request = params.resolve(self.limits.creations)?;
        let rows = self.store.list_creations(request.window()).await?;
        Ok(rows.into_iter().map(CreationSummary::from).collect())
    }

    pub async fn get_creation(&self, id: EntityId) -> AppResult<Creation> {
        self.store
            .creation(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("creation {id} not found")))
    }

    /// NotFound for a missing creation takes precedence over paging errors.
    pub async fn list_comments_for_creation(
        &self,
        id: EntityId,
        params: PageParams,
    ) -> AppResult<Vec<Comment>> {
        self.get_creation(id).await?;
        let request = params.resolve(self.limits.creation_comments)?;
        Ok(self
            .store
            .list_comments(CommentParent::Creation(id), request.window())
            .await?)
    }

    pub async fn life_status(&self) -> AppResult<LifeStatus> {
        let life = self
            .store
            .life()
            .await?
            .ok_or_else(|| AppError::not_found("digital life not found"))?;
        let counts = self.store.catalog_counts().await?;
        Ok(LifeStatus::new(life, counts))
    }

    /// Comments without a creation parent. Empty when no life row exists.
    pub async fn list_life_comments(&self, params: PageParams) -> AppResult<Vec<Comment>> {
        let request = params.resolve(self.limits.life_comments)?;
        Ok(self
            .store
            .list_comments(CommentParent::Life, request.window())
            .await?)
    }

    pub async fn list_thoughts(&self, params: PageParams) -> AppResult<Vec<Thought>> {
        let request = params.resolve(self.limits.thoughts)?;
        Ok(self.store.list_thoughts(request.window()).await?)
    }

    pub async fn list_tools(&self, params: PageParams) -> AppResult<Vec<Tool>> {
        let request = params.resolve(self.limits.tools)?;
        Ok(self.store.list_tools(request.window()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CommentDraft, NewCreation, NewDigitalLife, NewThought, NewTool};
    use crate::storage::{CounterStore, EntityStore, MemoryStore};

    async fn facade() -> (Arc<MemoryStore>, QueryFacade) {
        let store = Arc::new(MemoryStore::new());
        let facade = QueryFacade::new(store.clone());
        (store, facade)
    }

    #[tokio::test]
    async fn comments_of_missing_creation_are_not_found_even_with_bad_paging() {
        let (_, facade) = facade().await;

        let err = facade
            .list_comments_for_creation(5, PageParams::new(Some(0), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn listings_enforce_their_own_limits() {
        let (_, facade) = facade().await;

        assert!(facade.list_tools(PageParams::new(None, Some(100))).await.is_ok());
        let err = facade
            .list_thoughts(PageParams::new(None, Some(51)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "limit must be between 1 and 50");
        assert!(matches!(
            facade.list_creations(PageParams::new(Some(0), None)).await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn creations_are_listed_as_summaries_newest_first() {
        let (store, facade) = facade().await;
        for title in ["A", "B", "C"] {
            store
                .insert_creation(NewCreation {
                    title: title.into(),
                    asset_url: Some(format!("/assets/{title}.png")),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let page = facade
            .list_creations(PageParams::new(Some(1), Some(2)))
            .await
            .unwrap();
        let titles: Vec<_> = page.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "B"]);
        assert_eq!(page[0].asset_url.as_deref(), Some("/assets/C.png"));

        let rest = facade
            .list_creations(PageParams::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].title, "A");
    }

    #[tokio::test]
    async fn life_status_includes_catalog_counts() {
        let (store, facade) = facade().await;
        assert!(matches!(facade.life_status().await, Err(AppError::NotFound(_))));
        assert!(
            facade
                .list_life_comments(PageParams::default())
                .await
                .unwrap()
                .is_empty()
        );

        store
            .insert_life(NewDigitalLife {
                name: "Aurora".into(),
                lifespan: None,
            })
            .await
            .unwrap();
        store
            .insert_creation(NewCreation {
                title: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_tool(NewTool {
                name: "ls".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_tool(NewTool {
                name: "cat".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let status = facade.life_status().await.unwrap();
        assert_eq!(status.life.name, "Aurora");
        assert_eq!((status.tools, status.creations), (2, 1));
    }

    #[tokio::test]
    async fn life_comments_exclude_creation_comments() {
        let (store, facade) = facade().await;
        store
            .insert_life(NewDigitalLife {
                name: "Aurora".into(),
                lifespan: None,
            })
            .await
            .unwrap();
        let creation = store
            .insert_creation(NewCreation {
                title: "A".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let draft = |content: &str| CommentDraft {
            content: content.into(),
            reply_content: None,
        };
        store
            .comment_once(CommentParent::Life, draft("life"))
            .await
            .unwrap();
        store
            .comment_once(CommentParent::Creation(creation.id), draft("creation"))
            .await
            .unwrap();
        store.insert_thought(NewThought::default()).await.unwrap();

        let comments = facade
            .list_life_comments(PageParams::default())
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].content, "life");
        assert_eq!(facade.list_thoughts(PageParams::default()).await.unwrap().len(), 1);
    }
}
