//! Granule search against the CMR catalog
//!
//! This crate turns user-facing search parameters into backend queries, runs
//! them against the catalog and streams normalized granule features back.
//!
//! # Architecture Overview
//!
//! ```text
//! SearchParams
//!      |
//! Translation -> validated (key, value) pairs
//!      |
//! Decomposition -> QueryPlan (cartesian product of subqueries)
//!      |
//! Catalog paging -> raw UMM records
//!      |
//! Normalization -> GranuleFeature stream (capped, lazy)
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use granule_search::{search, ParamValue, SearchConfig, SearchParams};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let params = SearchParams::new()
//!     .with("platform", ParamValue::list(["Sentinel-1A", "Sentinel-1B"]))
//!     .with("beamMode", "IW");
//! let query = search(params, &SearchConfig::default(), Some(10))?;
//! let collection = query.results().collect().await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod field_map;
pub mod normalize;
pub mod params;
pub mod path;
pub mod stream;
pub mod subquery;
pub mod translate;
pub mod transport;

use std::sync::Arc;

// Re-export main types
pub use catalog::{CmrCatalog, GranuleCatalog, PageCursor, RawRecord};
pub use config::SearchConfig;
pub use error::{Error, Result};
pub use normalize::{normalize, FeatureCollection, GranuleFeature, GranuleProperties, Polygon};
pub use params::{ParamValue, Scalar, SearchParams};
pub use stream::{CmrQuery, ResultStream};
pub use subquery::{decompose, PagingMode, PlanOptions, QueryPlan, SubQuery};
pub use translate::{translate, BackendPair};
pub use transport::{HttpTransport, Transport, TransportResponse};

/// Plan `params` and bind the plan to an HTTP catalog built from `config`.
///
/// Nothing is sent until the query is counted or its results are pulled.
/// Parameter errors surface here, before any network traffic.
pub fn search(
    params: SearchParams,
    config: &SearchConfig,
    max_results: Option<usize>,
) -> Result<CmrQuery> {
    let catalog = CmrCatalog::from_config(config)?;
    build_query(params, config, max_results, Arc::new(catalog))
}

/// Like [`search`], against any catalog.
pub fn build_query(
    params: SearchParams,
    config: &SearchConfig,
    max_results: Option<usize>,
    catalog: Arc<dyn GranuleCatalog>,
) -> Result<CmrQuery> {
    let plan = decompose(params, &config.plan_options(max_results))?;
    Ok(CmrQuery::new(plan, catalog))
}
