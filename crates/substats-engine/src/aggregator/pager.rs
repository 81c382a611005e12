//! Cursor pagination over the billing API
//!
//! Walks a list query page by page, advancing `starting_after` to the last
//! item of each page until the remote reports no more pages. A fixed delay
//! separates consecutive page requests.

use crate::billing::{BillingApi, Cursored, PagedQuery};
use crate::metrics::EngineMetrics;
use std::time::Duration;
use substats_common::Result;
use tracing::{debug, warn};

/// Sequential page walker for one list query
pub struct Pager<'a, Q: PagedQuery> {
    api: &'a dyn BillingApi,
    query: Q,
    delay: Duration,
    metrics: Option<&'a EngineMetrics>,
    started: bool,
    exhausted: bool,
    pages: usize,
}

impl<'a, Q: PagedQuery> Pager<'a, Q> {
    pub fn new(
        api: &'a dyn BillingApi,
        query: Q,
        delay: Duration,
        metrics: Option<&'a EngineMetrics>,
    ) -> Self {
        Self {
            api,
            query,
            delay,
            metrics,
            started: false,
            exhausted: false,
            pages: 0,
        }
    }

    /// Fetch the next page, or `None` once the collection is exhausted.
    ///
    /// A failed page ends the walk; the error is returned to the caller so
    /// the aggregation is abandoned rather than reported as complete.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Q::Item>>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.started && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.started = true;

        if let Some(metrics) = self.metrics {
            metrics.remote_requests.with_label_values(&[Q::RESOURCE]).inc();
        }

        let page = match self.query.fetch(self.api).await {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                if let Some(metrics) = self.metrics {
                    metrics.remote_failures.with_label_values(&[Q::RESOURCE]).inc();
                }
                warn!(
                    resource = Q::RESOURCE,
                    page = self.pages + 1,
                    error = %e,
                    "Page request failed"
                );
                return Err(e);
            }
        };
        self.pages += 1;

        match page.data.last() {
            Some(last) if page.has_more => {
                let cursor = last.cursor_id().to_string();
                self.query.set_starting_after(cursor);
            }
            _ => self.exhausted = true,
        }

        debug!(
            resource = Q::RESOURCE,
            page = self.pages,
            items = page.data.len(),
            has_more = !self.exhausted,
            "Fetched page"
        );
        Ok(Some(page.data))
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }
}
