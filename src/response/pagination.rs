//! Pagination headers for list endpoints

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

pub const X_PAGINATION_PAGE: HeaderName = HeaderName::from_static("x-pagination-page");
pub const X_PAGINATION_PAGE_SIZE: HeaderName = HeaderName::from_static("x-pagination-page-size");
pub const X_PAGINATION_TOTAL_COUNT: HeaderName = HeaderName::from_static("x-pagination-total-count");
pub const X_PAGINATION_PAGE_COUNT: HeaderName = HeaderName::from_static("x-pagination-page-count");

/// Describes the page a list handler returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDirective {
    /// 1-based page number
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
}

impl PaginationDirective {
    pub fn new(page: u64, page_size: u64, total_count: u64) -> Self {
        Self {
            page: page.max(1),
            page_size,
            total_count,
        }
    }

    /// Number of pages; zero when the page size is zero
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }

    /// Offset of the first element on this page
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size)
    }
}

/// Writes pagination metadata onto a response
pub trait PaginationWriter: Send + Sync {
    fn write_headers(&self, directive: &PaginationDirective, headers: &mut HeaderMap);

    /// Header names this writer produces, spelled as they should be advertised
    fn header_names(&self) -> Vec<&'static str>;
}

/// Default writer emitting `X-Pagination-*` headers
#[derive(Debug, Clone, Default)]
pub struct HeaderPaginationWriter;

impl PaginationWriter for HeaderPaginationWriter {
    fn write_headers(&self, directive: &PaginationDirective, headers: &mut HeaderMap) {
        headers.insert(X_PAGINATION_PAGE, HeaderValue::from(directive.page));
        headers.insert(X_PAGINATION_PAGE_SIZE, HeaderValue::from(directive.page_size));
        headers.insert(X_PAGINATION_TOTAL_COUNT, HeaderValue::from(directive.total_count));
        headers.insert(X_PAGINATION_PAGE_COUNT, HeaderValue::from(directive.page_count()));
    }

    fn header_names(&self) -> Vec<&'static str> {
        vec![
            "X-Pagination-Page",
            "X-Pagination-Page-Size",
            "X-Pagination-Total-Count",
            "X-Pagination-Page-Count",
        ]
    }
}
