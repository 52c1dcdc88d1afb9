//! Result streaming across subqueries
//!
//! [`ResultStream`] pulls records one at a time. Subqueries are drained
//! strictly in plan order and a page is only fetched when the buffered page
//! is empty and the consumer asks for another record. Once the global cap is
//! reached the stream ends without touching the catalog again.
//!
//! Use [`ResultStream::next`] directly, or [`ResultStream::into_stream`] to
//! get a [`futures::Stream`] for use with `StreamExt`/`TryStreamExt`.

use crate::catalog::{GranuleCatalog, PageCursor, RawRecord};
use crate::error::Result;
use crate::normalize::{normalize, FeatureCollection, GranuleFeature};
use crate::subquery::{PagingMode, QueryPlan, SubQuery};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

/// A planned search bound to a catalog.
pub struct CmrQuery {
    plan: QueryPlan,
    catalog: Arc<dyn GranuleCatalog>,
}

impl CmrQuery {
    pub fn new(plan: QueryPlan, catalog: Arc<dyn GranuleCatalog>) -> Self {
        Self { plan, catalog }
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Sum of the totals each subquery reports. Ignores the result cap.
    pub async fn count(&self) -> Result<u64> {
        let mut total = 0;
        for query in &self.plan.subqueries {
            total += self.catalog.count(query).await?;
        }
        Ok(total)
    }

    /// Start streaming. The stream can only be consumed once.
    pub fn results(self) -> ResultStream {
        ResultStream {
            catalog: self.catalog,
            pending: self.plan.subqueries.into_iter().collect(),
            paging: self.plan.paging,
            max_results: self.plan.max_results,
            cursor: None,
            buffer: VecDeque::new(),
            yielded: 0,
            subquery_number: 0,
            finished: false,
        }
    }
}

/// Lazy, capped sequence of features from every subquery in order.
pub struct ResultStream {
    catalog: Arc<dyn GranuleCatalog>,
    pending: VecDeque<SubQuery>,
    paging: PagingMode,
    max_results: Option<usize>,
    cursor: Option<Box<dyn PageCursor>>,
    buffer: VecDeque<RawRecord>,
    yielded: usize,
    subquery_number: usize,
    finished: bool,
}

impl ResultStream {
    /// Next feature, or `None` when every subquery is exhausted or the cap
    /// is reached. An error ends the stream.
    ///
    /// Usually one pull costs at most one page fetch. A page holding only
    /// sentinel records, or a subquery with no results, does not satisfy the
    /// pull, so the same call keeps fetching until a record turns up or the
    /// plan runs out.
    pub async fn next(&mut self) -> Option<Result<GranuleFeature>> {
        loop {
            if self.finished {
                return None;
            }
            if self.max_results_reached() {
                tracing::debug!(yielded = self.yielded, "Max results reached, terminating");
                self.finish();
                return None;
            }

            if let Some(record) = self.buffer.pop_front() {
                let Some(raw) = record else {
                    continue;
                };
                self.yielded += 1;
                let feature = normalize(&raw);
                // Checked again here so the next pull never fetches a page
                // beyond the cap.
                if self.max_results_reached() {
                    tracing::debug!(yielded = self.yielded, "Max results reached, terminating");
                    self.finish();
                }
                return Some(feature);
            }

            if self.cursor.is_none() {
                let Some(query) = self.pending.pop_front() else {
                    tracing::debug!(yielded = self.yielded, "All subqueries exhausted");
                    self.finish();
                    return None;
                };
                self.subquery_number += 1;
                tracing::debug!(subquery = self.subquery_number, "Running subquery");
                self.cursor = Some(self.catalog.pages(&query, self.paging));
            }

            let Some(cursor) = self.cursor.as_mut() else {
                continue;
            };
            match cursor.next_page().await {
                Ok(Some(page)) => self.buffer.extend(page),
                Ok(None) => {
                    tracing::debug!(
                        subquery = self.subquery_number,
                        "End of available results reached"
                    );
                    self.cursor = None;
                }
                Err(e) => {
                    self.finish();
                    return Some(Err(e));
                }
            }
        }
    }

    /// Drain the stream into a feature collection, stopping at the first error.
    pub async fn collect(mut self) -> Result<FeatureCollection> {
        let mut features = Vec::new();
        while let Some(feature) = self.next().await {
            features.push(feature?);
        }
        Ok(FeatureCollection { features })
    }

    /// Adapt into a [`futures::Stream`]. Cap, ordering and laziness are the
    /// same as pulling with [`ResultStream::next`].
    pub fn into_stream(self) -> BoxStream<'static, Result<GranuleFeature>> {
        stream::unfold(self, |mut results| async move {
            results.next().await.map(|item| (item, results))
        })
        .boxed()
    }

    /// Number of features yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn max_results_reached(&self) -> bool {
        self.max_results
            .is_some_and(|max_results| self.yielded >= max_results)
    }

    fn finish(&mut self) {
        self.finished = true;
        self.cursor = None;
        self.pending.clear();
        self.buffer.clear();
    }
}
