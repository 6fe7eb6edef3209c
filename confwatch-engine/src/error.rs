//! Error types for confwatch-engine.

use thiserror::Error;

use confwatch_core::{GatewayError, PageQuery};

/// Errors from watch registration and registry lifecycle.
#[derive(Debug, Error)]
pub enum WatchError {
    /// `WatchRegistry::start` was called outside a Tokio runtime.
    #[error("watch registry needs a running Tokio runtime")]
    NoRuntime,

    /// The registry has been shut down; no new watches are accepted.
    #[error("watch registry is shut down")]
    ShutDown,
}

/// A paged aggregation that could not be completed. No partial results are kept.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("page {page} of listing ({query}) failed: {source}")]
    Page {
        page: u32,
        query: String,
        #[source]
        source: GatewayError,
    },

    #[error("page size must be at least 1")]
    InvalidPageSize,
}

impl AggregateError {
    pub(crate) fn page(query: &PageQuery, source: GatewayError) -> Self {
        AggregateError::Page {
            page: query.page_no,
            query: query.to_string(),
            source,
        }
    }

    /// The page that failed, if the aggregation reached the registry.
    pub fn failed_page(&self) -> Option<u32> {
        match self {
            AggregateError::Page { page, .. } => Some(*page),
            AggregateError::InvalidPageSize => None,
        }
    }
}
