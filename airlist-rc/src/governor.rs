//! Collection size governor
//!
//! Enforces the maximum item count on the target collection by evicting
//! the oldest member before an insert would exceed the cap. The
//! collection is externally owned and may be mutated concurrently, so
//! the count is re-queried on every call rather than cached.

use crate::catalog::{Catalog, RemoveScope};

pub struct SizeGovernor {
    max_size: usize,
}

impl SizeGovernor {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }

    /// Make room for one pending insert, best effort
    ///
    /// Failure to determine the size or to evict is logged and swallowed;
    /// the pending insert proceeds regardless (availability over strict
    /// size enforcement — an over-cap collection is corrected on the next
    /// insert).
    pub async fn ensure_capacity(&self, catalog: &dyn Catalog) {
        let count = match catalog.size().await {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(error = %err, "Could not determine collection size, skipping eviction");
                return;
            }
        };

        if count < self.max_size {
            return;
        }

        let oldest = match catalog.list(None).await {
            Ok((items, _)) => items.into_iter().next(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not list collection for eviction");
                return;
            }
        };

        let Some(oldest) = oldest else {
            tracing::warn!(count, "Collection reports items but first page is empty");
            return;
        };

        tracing::info!(
            id = %oldest.id,
            name = oldest.name.as_deref().unwrap_or("?"),
            count,
            max_size = self.max_size,
            "Evicting oldest collection item before insert"
        );

        if let Err(err) = catalog.remove(&oldest.id, RemoveScope::At(oldest.position)).await {
            tracing::warn!(id = %oldest.id, error = %err, "Eviction failed, insert proceeds anyway");
        }
    }
}
