//! Deterministic windowing over rows ordered newest first.
//!
//! Every listing is ordered by `(created_at DESC, id DESC)`. Ids are unique, so
//! the order is total and consecutive pages partition the sequence without gaps
//! or duplicates, even when several rows share a timestamp.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::{Comment, Creation, DigitalLife, EntityId, Thought, Tool};

/// Default and maximum page size of one listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit {
    pub default_size: u32,
    pub max_size: u32,
}

impl PageLimit {
    pub const fn new(default_size: u32, max_size: u32) -> Self {
        Self {
            default_size,
            max_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page must be greater than 0")]
    ZeroPage,
    #[error("limit must be between 1 and {max}")]
    SizeOutOfRange { max: u32 },
}

/// A validated `(page, page_size)` pair. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, limit: PageLimit) -> Result<Self, PageError> {
        if page == 0 {
            return Err(PageError::ZeroPage);
        }
        if page_size == 0 || page_size > limit.max_size {
            return Err(PageError::SizeOutOfRange {
                max: limit.max_size,
            });
        }
        Ok(Self { page, page_size })
    }

    /// Fills missing values with page 1 and the endpoint's default size.
    pub fn resolve(
        page: Option<u32>,
        page_size: Option<u32>,
        limit: PageLimit,
    ) -> Result<Self, PageError> {
        Self::new(
            page.unwrap_or(1),
            page_size.unwrap_or(limit.default_size),
            limit,
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn window(&self) -> Window {
        let offset = u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size);
        Window::new(offset, self.page_size)
    }
}

/// Raw `(offset, limit)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u32,
}

impl Window {
    pub const fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Offset as a SQL bind value.
    pub fn sql_offset(&self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }

    pub fn sql_limit(&self) -> i64 {
        i64::from(self.limit)
    }

    /// Cuts the window out of rows that are already ordered. An offset past
    /// the end yields an empty list.
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let Ok(offset) = usize::try_from(self.offset) else {
            return Vec::new();
        };
        rows.into_iter()
            .skip(offset)
            .take(self.limit as usize)
            .collect()
    }
}

/// Rows that carry the ordering key.
pub trait Chronological {
    fn id(&self) -> EntityId;
    fn created_at(&self) -> DateTime<Utc>;
}

pub fn newest_first<T: Chronological>(left: &T, right: &T) -> Ordering {
    right
        .created_at()
        .cmp(&left.created_at())
        .then_with(|| right.id().cmp(&left.id()))
}

/// Sorts newest first and applies the window.
pub fn paginate<T: Chronological>(mut rows: Vec<T>, window: Window) -> Vec<T> {
    rows.sort_by(newest_first);
    window.slice(rows)
}

macro_rules! impl_chronological {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Chronological for $ty {
                fn id(&self) -> EntityId {
                    self.id
                }

                fn created_at(&self) -> DateTime<Utc> {
                    self.created_at
                }
            }
        )*
    };
}

impl_chronological!(DigitalLife, Creation, Comment, Thought, Tool);
