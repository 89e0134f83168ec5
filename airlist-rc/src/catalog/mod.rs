//! Catalog collaborator interface
//!
//! The remote music catalog is externally owned and subject to concurrent
//! mutation by other actors; the engine only talks to it through this
//! trait and never assumes a previously observed size or listing is still
//! valid.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpCatalog;

/// Catalog item identifier, opaque to the engine
pub type CatalogId = String;

/// One entry of the target collection as reported by `Catalog::list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Catalog item identifier
    pub id: CatalogId,
    /// Zero-based position within the collection at read time
    pub position: usize,
    /// Display name, when the catalog provides one
    pub name: Option<String>,
}

/// Removal scope for `Catalog::remove`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveScope {
    /// Remove every occurrence of the item
    All,
    /// Remove the single occurrence at this position
    At(usize),
}

/// Best-effort track metadata used to enrich summary reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackDetail {
    pub title: String,
    pub artists: String,
}

/// Classified catalog API errors
///
/// Transient and RateLimited are retryable infrastructure faults; the
/// rest are terminal for the current call. A raw transport error never
/// crosses this boundary.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Network or server-side fault, retryable
    #[error("transient catalog failure: {0}")]
    Transient(String),

    /// Rate limit response, retryable after the server-specified delay
    #[error("rate limited by catalog")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Upstream authentication failure, fatal to the scheduler
    #[error("catalog authentication failure: {0}")]
    Auth(String),

    /// The catalog refused an insert because the item is already present
    #[error("item already present in collection")]
    Duplicate,

    /// The catalog rejected the request for a non-retryable reason
    #[error("catalog rejected request: {0}")]
    Rejected(String),

    /// Response body could not be interpreted
    #[error("catalog response parse failure: {0}")]
    Parse(String),
}

impl CatalogError {
    /// Whether a bounded local retry is appropriate
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::Transient(_) | CatalogError::RateLimited { .. }
        )
    }
}

/// Remote music catalog operations consumed by the engine
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Search for a track by title and artist
    ///
    /// `Ok(None)` means the search completed and found nothing; transient
    /// faults are classified errors, never conflated with absence.
    async fn search(&self, title: &str, artist: &str)
        -> Result<Option<CatalogId>, CatalogError>;

    /// Append an item to the target collection
    async fn insert(&self, id: &str) -> Result<(), CatalogError>;

    /// Remove an item from the target collection
    async fn remove(&self, id: &str, scope: RemoveScope) -> Result<(), CatalogError>;

    /// Fetch one page of the target collection
    async fn list(
        &self,
        page_token: Option<String>,
    ) -> Result<(Vec<CollectionItem>, Option<String>), CatalogError>;

    /// Current total item count of the target collection
    async fn size(&self) -> Result<usize, CatalogError>;

    /// Best-effort track metadata lookup for reporting
    async fn track_detail(&self, id: &str) -> Result<Option<TrackDetail>, CatalogError> {
        let _ = id;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CatalogError::Transient("timeout".into()).is_retryable());
        assert!(CatalogError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_retryable());
        assert!(!CatalogError::Auth("expired token".into()).is_retryable());
        assert!(!CatalogError::Duplicate.is_retryable());
        assert!(!CatalogError::Rejected("bad id".into()).is_retryable());
    }
}
