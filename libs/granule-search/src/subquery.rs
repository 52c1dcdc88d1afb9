//! Subquery decomposition
//!
//! The catalog takes one value per request for most parameters, so a search
//! with list-valued parameters is split into the cartesian product of those
//! values. Broadcast parameters are attached to every subquery instead, and
//! large identifier lists are deduplicated and chunked so no single request
//! grows unbounded.

use crate::error::Result;
use crate::field_map::{BROADCAST_PARAMS, CHUNKED_PARAMS, CHUNK_SIZE};
use crate::params::{ParamValue, SearchParams};
use crate::translate::{normalize_params, translate_param, BackendPair};
use std::collections::HashSet;
use std::sync::Arc;

/// How results are paged out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingMode {
    /// The whole capped result fits in one page; no continuation cursor.
    SinglePage,
    /// Full pages, continued with the catalog's scroll cursor.
    Cursor,
}

/// Settings that shape every subquery of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub provider: String,
    /// Largest page the catalog will return.
    pub page_size: usize,
    /// Global result cap; `None` is unbounded.
    pub max_results: Option<usize>,
}

/// One fully-resolved catalog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQuery {
    /// One value per cartesian dimension.
    pub params: Vec<BackendPair>,
    /// Broadcast parameters and request options shared by all subqueries.
    pub extra_params: Arc<Vec<BackendPair>>,
}

impl SubQuery {
    /// Complete form body for this request.
    pub fn form(&self) -> Vec<BackendPair> {
        self.params
            .iter()
            .chain(self.extra_params.iter())
            .cloned()
            .collect()
    }

    /// All values sent under `key`.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.params
            .iter()
            .chain(self.extra_params.iter())
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Ordered subqueries plus the paging settings they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub subqueries: Vec<SubQuery>,
    pub page_size: usize,
    pub paging: PagingMode,
    pub max_results: Option<usize>,
}

impl QueryPlan {
    pub fn len(&self) -> usize {
        self.subqueries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subqueries.is_empty()
    }
}

/// Split a parameter set into the subqueries needed to cover it.
pub fn decompose(params: SearchParams, options: &PlanOptions) -> Result<QueryPlan> {
    let mut params = normalize_params(params)?;

    for name in CHUNKED_PARAMS {
        if let Some(value) = params.remove(name) {
            params.insert(*name, chunk_identifiers(value));
        }
    }

    let mut dimensions = Vec::new();
    let mut broadcast = Vec::new();
    for (name, value) in params.iter() {
        let pairs = translate_param(name, value)?;
        if BROADCAST_PARAMS.contains(&name) {
            broadcast.extend(pairs);
        } else {
            dimensions.push(pairs);
        }
    }

    let (page_size, paging) = match options.max_results {
        Some(cap) if cap <= options.page_size => (cap, PagingMode::SinglePage),
        _ => (options.page_size, PagingMode::Cursor),
    };

    let mut extra_params = broadcast;
    extra_params.extend(shared_params(&options.provider));
    extra_params.push(("page_size".to_string(), page_size.to_string()));
    if paging == PagingMode::Cursor {
        extra_params.push(("scroll".to_string(), "true".to_string()));
    }
    let extra_params = Arc::new(extra_params);

    let subqueries: Vec<SubQuery> = cartesian_product(&dimensions)
        .into_iter()
        .map(|params| SubQuery {
            params,
            extra_params: Arc::clone(&extra_params),
        })
        .collect();

    tracing::debug!(
        subqueries = subqueries.len(),
        page_size,
        paging = ?paging,
        "Built query plan"
    );

    Ok(QueryPlan {
        subqueries,
        page_size,
        paging,
        max_results: options.max_results,
    })
}

/// Request options attached to every subquery.
fn shared_params(provider: &str) -> Vec<BackendPair> {
    [
        ("provider", provider),
        ("options[temporal][and]", "true"),
        ("sort_key[]", "-end_date"),
        ("sort_key[]", "granule_ur"),
        ("options[platform][ignore_case]", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Deduplicate identifiers (first occurrence wins) and group them into
/// chunks of at most [`CHUNK_SIZE`]. Each chunk is one list item.
fn chunk_identifiers(value: ParamValue) -> ParamValue {
    let mut seen = HashSet::new();
    let distinct: Vec<ParamValue> = value
        .into_items()
        .into_iter()
        .filter(|item| seen.insert(item.to_string()))
        .collect();

    ParamValue::List(
        distinct
            .chunks(CHUNK_SIZE)
            .map(|chunk| ParamValue::List(chunk.to_vec()))
            .collect(),
    )
}

fn cartesian_product(dimensions: &[Vec<BackendPair>]) -> Vec<Vec<BackendPair>> {
    dimensions.iter().fold(vec![Vec::new()], |combos, dimension| {
        combos
            .iter()
            .flat_map(|combo| {
                dimension.iter().map(move |pair| {
                    let mut next = combo.clone();
                    next.push(pair.clone());
                    next
                })
            })
            .collect()
    })
}
