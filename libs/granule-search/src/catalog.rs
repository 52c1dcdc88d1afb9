//! Paged access to the granule catalog
//!
//! Each subquery is read through a [`PageCursor`], one page per call, so the
//! result stream only issues a request when a consumer actually needs more
//! records.

use crate::config::SearchConfig;
use crate::error::Result;
use crate::subquery::{PagingMode, SubQuery};
use crate::transport::{check_status, HttpTransport, Transport, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A record as returned by the catalog. `None` is a "no value" sentinel.
pub type RawRecord = Option<Value>;

const HITS_HEADER: &str = "CMR-Hits";
const SCROLL_HEADER: &str = "CMR-Scroll-Id";

/// Pages of one subquery's results.
#[async_trait]
pub trait PageCursor: Send {
    /// Fetch the next page; `None` once the subquery is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>>;
}

/// The external catalog, keyed by subquery.
#[async_trait]
pub trait GranuleCatalog: Send + Sync {
    /// Total number of records the catalog reports for `query`.
    async fn count(&self, query: &SubQuery) -> Result<u64>;

    /// Open a lazy page cursor over `query`. No request is made until the
    /// first page is pulled.
    fn pages(&self, query: &SubQuery, paging: PagingMode) -> Box<dyn PageCursor>;
}

/// Catalog client for the CMR granule search endpoint.
#[derive(Clone)]
pub struct CmrCatalog {
    transport: Arc<dyn Transport>,
    url: String,
}

impl CmrCatalog {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    /// Catalog backed by an HTTP transport configured from `config`.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(Arc::new(transport), config.search_url()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl GranuleCatalog for CmrCatalog {
    async fn count(&self, query: &SubQuery) -> Result<u64> {
        let mut form: Vec<_> = query
            .form()
            .into_iter()
            .filter(|(k, _)| k != "page_size" && k != "scroll")
            .collect();
        form.push(("page_size".to_string(), "0".to_string()));

        let response = self.transport.post(&self.url, &form, &[]).await?;
        check_status(&response)?;
        Ok(hits(&response).unwrap_or(0))
    }

    fn pages(&self, query: &SubQuery, paging: PagingMode) -> Box<dyn PageCursor> {
        Box::new(CmrPageCursor {
            transport: Arc::clone(&self.transport),
            url: self.url.clone(),
            form: query.form(),
            paging,
            scroll_id: None,
            hits: None,
            received: 0,
            done: false,
        })
    }
}

struct CmrPageCursor {
    transport: Arc<dyn Transport>,
    url: String,
    form: Vec<(String, String)>,
    paging: PagingMode,
    scroll_id: Option<String>,
    hits: Option<u64>,
    received: u64,
    done: bool,
}

#[async_trait]
impl PageCursor for CmrPageCursor {
    async fn next_page(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.done {
            return Ok(None);
        }

        let headers: Vec<(String, String)> = self
            .scroll_id
            .iter()
            .map(|id| (SCROLL_HEADER.to_string(), id.clone()))
            .collect();

        let response = match self.transport.post(&self.url, &self.form, &headers).await {
            Ok(response) => response,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        if let Err(e) = check_status(&response) {
            self.done = true;
            return Err(e);
        }

        if self.hits.is_none() {
            self.hits = hits(&response);
        }
        if let Some(id) = response.header(SCROLL_HEADER) {
            self.scroll_id = Some(id.to_string());
        }

        let records: Vec<RawRecord> = match response.body.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| (!item.is_null()).then(|| item.clone()))
                .collect(),
            _ => Vec::new(),
        };
        self.received += records.len() as u64;

        tracing::debug!(
            records = records.len(),
            received = self.received,
            hits = ?self.hits,
            has_cursor = self.scroll_id.is_some(),
            "Fetched catalog page"
        );

        if records.is_empty() {
            self.done = true;
            return Ok(None);
        }

        self.done = self.paging == PagingMode::SinglePage
            || self.scroll_id.is_none()
            || self.hits.is_some_and(|hits| self.received >= hits);

        Ok(Some(records))
    }
}

fn hits(response: &TransportResponse) -> Option<u64> {
    response
        .header(HITS_HEADER)
        .and_then(|h| h.trim().parse().ok())
        .or_else(|| response.body.get("hits").and_then(Value::as_u64))
}
