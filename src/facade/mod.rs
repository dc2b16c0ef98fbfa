//! Service layer between the HTTP handlers and the store: counter writes
//! with retry, and paginated reads.

pub mod counters;
pub mod queries;

pub use counters::{CounterEngine, LikeCount, MAX_COMMENT_CHARS, RetryPolicy, validate_comment};
pub use queries::{PageLimits, PageParams, QueryFacade};
