//! Page-based listing.
//!
//! Out-of-range requests are clamped rather than rejected: `page` below 1
//! becomes 1 and `per_page` is held to `1..=MAX_PER_PAGE`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// 1-indexed.
    #[param(minimum = 1, default = 1)]
    #[serde(default)]
    pub page: Option<i64>,

    #[param(minimum = 1, maximum = 100, default = 20)]
    #[serde(default)]
    pub per_page: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

impl PaginationParams {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// `(LIMIT, OFFSET)` for the clamped page.
    pub fn limit_offset(&self) -> (i64, i64) {
        let per_page = self.per_page();
        (per_page, (self.page() - 1).saturating_mul(per_page))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    /// At least 1, even for an empty result.
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    fn describe(params: &PaginationParams, total_count: i64) -> Self {
        let (page, per_page) = (params.page(), params.per_page());
        let total_pages = ((total_count + per_page - 1) / per_page).max(1);
        Self {
            page,
            per_page,
            total_count,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T: Serialize> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn from_params(data: Vec<T>, params: &PaginationParams, total_count: i64) -> Self {
        Self {
            data,
            pagination: PaginationMeta::describe(params, total_count),
        }
    }
}
