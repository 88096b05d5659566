//! Page bounds and page metadata for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size when the caller gives none or an out-of-range one.
pub const DEFAULT_LIMIT: i64 = 10;
/// Largest page size a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// A normalized page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp raw query values: page < 1 becomes 1, a limit outside
    /// `1..=MAX_LIMIT` becomes `DEFAULT_LIMIT`.
    pub fn normalize(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| (1..=MAX_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIMIT);
        Self { page, limit }
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Page metadata for a listing with `total` matching rows.
    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            total,
            page: self.page,
            limit: self.limit,
            total_pages: (total + self.limit - 1) / self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::normalize(None, None)
    }
}

/// Page metadata returned alongside list results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// One page of items.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub pagination: PageInfo,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: PageRequest, total: i64, items: Vec<T>) -> Self {
        Self {
            pagination: request.info(total),
            items,
        }
    }

    /// Convert every item, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            pagination: self.pagination,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
