use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

/// PageParams
///
/// Query parameters accepted by every paginated feed (`?page=N`, 1-based).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// Requested page number. Defaults to the first page.
    #[param(value_type = Option<u32>)]
    pub page: Option<String>,
}

impl PageParams {
    /// The requested page. A value that is not a page number names no page.
    pub fn number(&self) -> Result<u32, AppError> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw.parse().map_err(|_| AppError::NotFound),
        }
    }
}

/// PageInfo
///
/// Pagination metadata returned with each feed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PageInfo {
    pub number: u32,
    pub per_page: u32,
    #[ts(type = "number")]
    pub total: i64,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Paginator
///
/// Turns a requested page number into a `LIMIT`/`OFFSET` window and validates it
/// once the total is known. The first page always exists, even when empty; any
/// other page past the end is not found.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: u32,
}

impl Paginator {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Returns `(limit, offset)` for the page. Page 0 does not exist.
    pub fn window(&self, number: u32) -> Result<(i64, i64), AppError> {
        if number == 0 {
            return Err(AppError::NotFound);
        }
        let limit = i64::from(self.per_page);
        Ok((limit, i64::from(number - 1) * limit))
    }

    pub fn page_info(&self, number: u32, total: i64) -> Result<PageInfo, AppError> {
        let per_page = i64::from(self.per_page);
        let total = total.max(0);
        let num_pages = u32::try_from(((total + per_page - 1) / per_page).max(1)).unwrap_or(u32::MAX);
        if number == 0 || number > num_pages {
            return Err(AppError::NotFound);
        }
        Ok(PageInfo {
            number,
            per_page: self.per_page,
            total,
            num_pages,
            has_next: number < num_pages,
            has_previous: number > 1,
        })
    }
}
