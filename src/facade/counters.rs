use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{
    Comment, CommentDraft, CommentParent, EntityId, LikeTarget, Result as StoreResult, StoreError,
};
use crate::error::{AppError, AppResult};
use crate::storage::Store;

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Bounded exponential backoff for transient storage failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based): base, 2×base, 4×base, …
    /// capped at `max_backoff_ms`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let base = self.base_backoff_ms.max(1);
        let cap = self.max_backoff_ms.max(base);

        let mut backoff = base;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(2).min(cap);
        }
        backoff
    }

    fn should_retry(&self, attempt: u32, err: &StoreError) -> bool {
        err.is_transient() && attempt <= self.max_retries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeCount {
    pub likes: i64,
}

/// The only write path for likes and comments.
///
/// Every operation is one [`CounterStore`](crate::storage::CounterStore)
/// transaction, replayed from scratch when it fails transiently.
#[derive(Clone)]
pub struct CounterEngine {
    store: Arc<dyn Store>,
    retry: RetryPolicy,
}

impl CounterEngine {
    pub fn new(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn like_creation(&self, id: EntityId) -> AppResult<LikeCount> {
        self.like(LikeTarget::Creation(id)).await
    }

    pub async fn like_life(&self) -> AppResult<LikeCount> {
        self.like(LikeTarget::Life).await
    }

    pub async fn comment_on_creation(&self, id: EntityId, content: &str) -> AppResult<Comment> {
        self.comment(CommentParent::Creation(id), content).await
    }

    pub async fn comment_on_life(&self, content: &str) -> AppResult<Comment> {
        self.comment(CommentParent::Life, content).await
    }

    async fn like(&self, target: LikeTarget) -> AppResult<LikeCount> {
        let likes = self
            .with_retry("like", || self.store.like_once(target))
            .await?
            .ok_or_else(|| not_found(target.to_string()))?;

        debug!("{} now has {} likes", target, likes);
        Ok(LikeCount { likes })
    }

    async fn comment(&self, parent: CommentParent, content: &str) -> AppResult<Comment> {
        let draft = validate_comment(content)?;
        let comment = self
            .with_retry("comment", || self.store.comment_once(parent, draft.clone()))
            .await?
            .ok_or_else(|| not_found(parent.to_string()))?;

        debug!("comment {} added to {}", comment.id, parent);
        Ok(comment)
    }

    async fn with_retry<F, Fut, T>(&self, operation: &str, mut attempt_once: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match attempt_once().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.retry.should_retry(attempt, &err) {
                        if err.is_transient() {
                            warn!(
                                "{} gave up after {} attempts: {}",
                                operation, attempt, err
                            );
                        }
                        return Err(AppError::from(err));
                    }

                    let backoff_ms = self.retry.backoff_ms(attempt);
                    warn!(
                        "{} retry on transient failure (attempt {} of {}): {} (backoff={}ms)",
                        operation,
                        attempt,
                        self.retry.max_retries + 1,
                        err,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn not_found(what: String) -> AppError {
    AppError::not_found(format!("{what} not found"))
}

/// Trims the content and enforces the length bounds before any storage
/// access.
pub fn validate_comment(content: &str) -> AppResult<CommentDraft> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::invalid_argument("comment content must not be empty"));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::invalid_argument(format!(
            "comment content must be at most {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok(CommentDraft {
        content: content.to_string(),
        reply_content: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::core::{
        CatalogCounts, Creation, DigitalLife, NewCreation, NewDigitalLife, NewThought, NewTool,
        Thought, Tool,
    };
    use crate::pagination::Window;
    use crate::storage::{CounterStore, EntityStore};

    /// Fails the first `failures` counter calls with `error`, then succeeds.
    struct FlakyStore {
        failures: u32,
        error: StoreError,
        calls: AtomicU32,
        drafts: Mutex<Vec<CommentDraft>>,
    }

    impl FlakyStore {
        fn new(failures: u32, error: StoreError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
                drafts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> StoreResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EntityStore for FlakyStore {
        async fn init(&self) -> StoreResult<()> {
            Ok(())
        }
        async fn insert_life(&self, _: NewDigitalLife) -> StoreResult<DigitalLife> {
            unimplemented!()
        }
        async fn insert_creation(&self, _: NewCreation) -> StoreResult<Creation> {
            unimplemented!()
        }
        async fn insert_thought(&self, _: NewThought) -> StoreResult<Thought> {
            unimplemented!()
        }
        async fn insert_tool(&self, _: NewTool) -> StoreResult<Tool> {
            unimplemented!()
        }
        async fn life(&self) -> StoreResult<Option<DigitalLife>> {
            Ok(None)
        }
        async fn creation(&self, _: EntityId) -> StoreResult<Option<Creation>> {
            Ok(None)
        }
        async fn comment(&self, _: EntityId) -> StoreResult<Option<Comment>> {
            Ok(None)
        }
        async fn thought(&self, _: EntityId) -> StoreResult<Option<Thought>> {
            Ok(None)
        }
        async fn tool(&self, _: EntityId) -> StoreResult<Option<Tool>> {
            Ok(None)
        }
        async fn list_creations(&self, _: Window) -> StoreResult<Vec<Creation>> {
            Ok(Vec::new())
        }
        async fn list_comments(&self, _: CommentParent, _: Window) -> StoreResult<Vec<Comment>> {
            Ok(Vec::new())
        }
        async fn list_thoughts(&self, _: Window) -> StoreResult<Vec<Thought>> {
            Ok(Vec::new())
        }
        async fn list_tools(&self, _: Window) -> StoreResult<Vec<Tool>> {
            Ok(Vec::new())
        }
        async fn catalog_counts(&self) -> StoreResult<CatalogCounts> {
            Ok(CatalogCounts::default())
        }
    }

    #[async_trait]
    impl CounterStore for FlakyStore {
        async fn like_once(&self, target: LikeTarget) -> StoreResult<Option<i64>> {
            self.next()?;
            Ok(match target {
                LikeTarget::Creation(1) | LikeTarget::Life => Some(7),
                LikeTarget::Creation(_) => None,
            })
        }

        async fn comment_once(
            &self,
            parent: CommentParent,
            draft: CommentDraft,
        ) -> StoreResult<Option<Comment>> {
            self.next()?;
            self.drafts.lock().unwrap().push(draft.clone());
            Ok(Some(Comment {
                id: 1,
                content: draft.content,
                reply_content: draft.reply_content,
                creation_id: parent.creation_id(),
                created_at: Utc::now(),
            }))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn engine(store: &Arc<FlakyStore>) -> CounterEngine {
        CounterEngine::new(store.clone(), fast_retry())
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        let backoffs: Vec<_> = (1..=6).map(|attempt| policy.backoff_ms(attempt)).collect();
        assert_eq!(backoffs, vec![10, 20, 40, 80, 160, 200]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = Arc::new(FlakyStore::new(3, StoreError::transient("deadlock detected")));

        let likes = engine(&store).like_creation(1).await.unwrap();

        assert_eq!(likes, LikeCount { likes: 7 });
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_transient_failure() {
        let store = Arc::new(FlakyStore::new(10, StoreError::transient("lock wait timeout")));

        let err = engine(&store).like_life().await.unwrap_err();

        assert!(matches!(err, AppError::TransientStorageFailure(_)));
        assert_eq!(store.calls(), 4, "one attempt plus three retries");
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let store = Arc::new(FlakyStore::new(
            1,
            StoreError::ForeignKeyViolation("comments_creation_id_fkey".into()),
        ));

        let err = engine(&store).comment_on_creation(1, "hi").await.unwrap_err();

        assert!(matches!(err, AppError::ForeignKeyViolation(_)));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn missing_target_is_not_found() {
        let store = Arc::new(FlakyStore::new(0, StoreError::transient("unused")));

        let err = engine(&store).like_creation(2).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.to_string(), "creation 2 not found");
    }

    #[tokio::test]
    async fn invalid_content_never_reaches_the_store() {
        let store = Arc::new(FlakyStore::new(0, StoreError::transient("unused")));
        let engine = engine(&store);
        let too_long = "x".repeat(MAX_COMMENT_CHARS + 1);

        for content in ["", "   \n\t", too_long.as_str()] {
            let err = engine.comment_on_life(content).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn content_is_trimmed_and_counted_in_characters() {
        let store = Arc::new(FlakyStore::new(0, StoreError::transient("unused")));
        let long = "é".repeat(MAX_COMMENT_CHARS);

        let comment = engine(&store).comment_on_life(&format!("  {long}  ")).await.unwrap();

        assert_eq!(comment.content, long);
        assert_eq!(comment.creation_id, None);
        assert_eq!(store.drafts.lock().unwrap().len(), 1);
    }
}
