use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query; anything below 1 falls back to the defaults and
/// `limit` is capped at [`MAX_LIMIT`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}
fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit }.normalized()
    }

    pub fn normalized(self) -> Self {
        Self {
            page: if self.page < 1 { DEFAULT_PAGE } else { self.page },
            limit: if self.limit < 1 {
                DEFAULT_LIMIT
            } else {
                self.limit.min(MAX_LIMIT)
            },
        }
    }

    /// Saturates instead of overflowing for absurd page numbers; such a page is
    /// simply empty.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(1))
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        (total - 1) / self.limit.max(1) + 1
    }
}

/// One page of results plus the counts needed to walk the rest.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}
