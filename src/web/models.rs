use serde::{Deserialize, Serialize};

use crate::facade::PageParams;

/// `?page=&limit=`; `page_size` and `pageSize` are accepted for `limit`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    #[serde(alias = "page_size", alias = "pageSize")]
    pub limit: Option<u32>,
}

impl From<PageQuery> for PageParams {
    fn from(query: PageQuery) -> Self {
        PageParams::new(query.page, query.limit)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}
