//! The bookmark query engine.
//!
//! A query is an ordered list of `action:arg` terms. Each term compiles
//! into a pure stage over a record sequence; stages run in term order
//! over a snapshot of the store.

pub mod compare;
pub mod dates;
pub mod sort;
pub mod terms;

mod compile;

pub use compile::{Compiler, Pipeline, QueryError, Stage, StageFactory};
pub use terms::{parse_args, parse_query};

use anyhow::Result;

use crate::models::{QueryRequest, QueryResult, QueryTerm, QUERY_RESULT_VERSION};
use crate::store::BookmarkStore;

/// Terms of a request: the tokenized query string followed by any
/// explicit terms.
pub fn request_terms(request: &QueryRequest) -> Vec<QueryTerm> {
    let mut terms = request
        .query
        .as_deref()
        .map(parse_query)
        .unwrap_or_default();
    terms.extend(request.terms.iter().cloned());
    terms
}

/// Compile the request with the default compiler and run it over the
/// store's current contents.
///
/// Compile failures are returned as `QueryError` inside the `anyhow`
/// error so callers can tell them apart from store failures.
pub fn run_query(store: &BookmarkStore, request: &QueryRequest) -> Result<QueryResult> {
    run_query_with(&Compiler::new(), store, request)
}

pub fn run_query_with(
    compiler: &Compiler,
    store: &BookmarkStore,
    request: &QueryRequest,
) -> Result<QueryResult> {
    let terms = request_terms(request);
    let pipeline = compiler.compile(&terms)?;
    let bookmarks = pipeline.apply(store.all()?);

    tracing::debug!(terms = terms.len(), matched = bookmarks.len(), "query executed");

    Ok(QueryResult {
        version: QUERY_RESULT_VERSION.to_string(),
        total: bookmarks.len(),
        terms,
        bookmarks,
    })
}
