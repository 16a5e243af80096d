//! Page-at-a-time bulk writes.
//!
//! Items are written in fixed-size pages. A failing page is recorded and
//! skipped; later pages still run, so partial progress is kept.

use std::fmt::Display;
use std::future::Future;

use serde::Serialize;
use tracing::{debug, warn};

/// Default rows per page for bulk upserts.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// A page that could not be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageError {
    pub page: usize,
    pub rows: usize,
    pub error: String,
}

/// Outcome of a paged write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub pages: usize,
    pub written: u64,
    pub failed: u64,
    pub page_errors: Vec<PageError>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.page_errors.is_empty()
    }
}

/// Write `items` in pages of `page_size` (minimum 1).
///
/// `write` receives the page index and the page's rows and returns the
/// number of rows written. Errors are counted per page and never abort
/// the remaining pages.
pub async fn write_paged<T, F, Fut, E>(items: &[T], page_size: usize, mut write: F) -> BatchReport
where
    F: FnMut(usize, &[T]) -> Fut,
    Fut: Future<Output = Result<u64, E>>,
    E: Display,
{
    let page_size = page_size.max(1);
    let mut report = BatchReport::default();

    for (page, chunk) in items.chunks(page_size).enumerate() {
        report.pages += 1;
        match write(page, chunk).await {
            Ok(n) => {
                debug!(page, rows = chunk.len(), written = n, "batch page written");
                report.written += n;
            }
            Err(e) => {
                warn!(page, rows = chunk.len(), error = %e, "batch page failed, continuing");
                report.failed += chunk.len() as u64;
                report.page_errors.push(PageError {
                    page,
                    rows: chunk.len(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}
