//! Periodic duplicate reconciliation sweep
//!
//! Pages through the entire target collection once, counts occurrences
//! per catalog id, and collapses every id seen more than once by
//! removing all of its occurrences and re-inserting exactly one. The
//! remove-all-then-re-add strategy is idempotent to re-run if
//! interrupted, unlike position-targeted removal, which is fragile when
//! the collection mutates under a paginated read.

use crate::catalog::{Catalog, CatalogError, CatalogId, RemoveScope};
use std::collections::HashMap;
use std::time::Duration;

/// Result of one sweep pass
#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    /// Total items scanned across all pages
    pub scanned: usize,
    /// Distinct catalog ids that had duplicates collapsed
    pub duplicates_collapsed: usize,
    /// Ids re-inserted by the sweep; the caller registers these with the
    /// recently-inserted set so the next tick does not re-process them
    pub reinserted: Vec<CatalogId>,
}

pub struct ReconciliationSweep {
    /// Pause between each remove/re-add pair; reads immediately after a
    /// write may be stale under the catalog's consistency model
    pause: Duration,
}

impl ReconciliationSweep {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }

    /// Run one full-collection sweep, best effort per catalog id
    pub async fn sweep(&self, catalog: &dyn Catalog) -> Result<SweepOutcome, CatalogError> {
        tracing::info!("Starting duplicate sweep (remove-all and re-add strategy)");

        // Page through the whole collection once, keeping first-seen order
        let mut order: Vec<CatalogId> = Vec::new();
        let mut counts: HashMap<CatalogId, usize> = HashMap::new();
        let mut names: HashMap<CatalogId, String> = HashMap::new();
        let mut scanned = 0usize;
        let mut page_token: Option<String> = None;

        loop {
            let (items, next) = catalog.list(page_token.take()).await?;
            scanned += items.len();
            for item in items {
                let count = counts.entry(item.id.clone()).or_insert(0);
                if *count == 0 {
                    order.push(item.id.clone());
                }
                *count += 1;
                if let Some(name) = item.name {
                    names.entry(item.id).or_insert(name);
                }
            }
            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::info!(scanned, "Fetched full collection for duplicate sweep");

        let mut outcome = SweepOutcome {
            scanned,
            ..Default::default()
        };

        for id in order {
            let count = counts[&id];
            if count <= 1 {
                continue;
            }
            let name = names.get(&id).map(String::as_str).unwrap_or("?");
            tracing::info!(id = %id, name, count, "Collapsing duplicated item");

            // Partial failure on one id never halts the pass
            if let Err(err) = catalog.remove(&id, RemoveScope::All).await {
                tracing::warn!(id = %id, error = %err, "Failed to remove duplicated item, continuing");
                continue;
            }
            if let Err(err) = catalog.insert(&id).await {
                tracing::warn!(id = %id, error = %err, "Failed to re-insert item after removal, continuing");
                continue;
            }

            outcome.duplicates_collapsed += 1;
            outcome.reinserted.push(id);

            if !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        if outcome.duplicates_collapsed == 0 {
            tracing::info!("No duplicated items found");
        } else {
            tracing::info!(
                collapsed = outcome.duplicates_collapsed,
                "Finished collapsing duplicated items"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CollectionItem;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PAGE_SIZE: usize = 2;

    /// In-memory playlist with small pages and optional per-id failures
    struct PagedCatalog {
        items: Mutex<Vec<CatalogId>>,
        fail_remove_for: Option<CatalogId>,
    }

    impl PagedCatalog {
        fn with_items(ids: &[&str]) -> Self {
            Self {
                items: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
                fail_remove_for: None,
            }
        }

        fn contents(&self) -> Vec<CatalogId> {
            self.items.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Catalog for PagedCatalog {
        async fn search(
            &self,
            _title: &str,
            _artist: &str,
        ) -> Result<Option<CatalogId>, CatalogError> {
            Ok(None)
        }

        async fn insert(&self, id: &str) -> Result<(), CatalogError> {
            self.items.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn remove(&self, id: &str, scope: RemoveScope) -> Result<(), CatalogError> {
            if self.fail_remove_for.as_deref() == Some(id) {
                return Err(CatalogError::Transient("remove failed".into()));
            }
            let mut items = self.items.lock().unwrap();
            match scope {
                RemoveScope::All => items.retain(|i| i != id),
                RemoveScope::At(pos) => {
                    if pos < items.len() && items[pos] == id {
                        items.remove(pos);
                    }
                }
            }
            Ok(())
        }

        async fn list(
            &self,
            page_token: Option<String>,
        ) -> Result<(Vec<CollectionItem>, Option<String>), CatalogError> {
            let items = self.items.lock().unwrap();
            let offset: usize = page_token
                .as_deref()
                .map(|t| t.parse().unwrap_or(0))
                .unwrap_or(0);
            let page: Vec<CollectionItem> = items
                .iter()
                .enumerate()
                .skip(offset)
                .take(PAGE_SIZE)
                .map(|(position, id)| CollectionItem {
                    id: id.clone(),
                    position,
                    name: None,
                })
                .collect();
            let next = if offset + PAGE_SIZE < items.len() {
                Some((offset + PAGE_SIZE).to_string())
            } else {
                None
            };
            Ok((page, next))
        }

        async fn size(&self) -> Result<usize, CatalogError> {
            Ok(self.items.lock().unwrap().len())
        }
    }

    #[tokio::test]
    async fn test_collapses_to_single_occurrence() {
        let catalog = PagedCatalog::with_items(&["a", "b", "a", "c", "a", "b"]);
        let sweep = ReconciliationSweep::new(Duration::ZERO);

        let outcome = sweep.sweep(&catalog).await.unwrap();

        assert_eq!(outcome.scanned, 6);
        assert_eq!(outcome.duplicates_collapsed, 2);
        assert_eq!(outcome.reinserted, vec!["a".to_string(), "b".to_string()]);

        let contents = catalog.contents();
        assert_eq!(contents.iter().filter(|i| *i == "a").count(), 1);
        assert_eq!(contents.iter().filter(|i| *i == "b").count(), 1);
        assert_eq!(contents.iter().filter(|i| *i == "c").count(), 1);
    }

    #[tokio::test]
    async fn test_clean_collection_untouched() {
        let catalog = PagedCatalog::with_items(&["a", "b", "c"]);
        let sweep = ReconciliationSweep::new(Duration::ZERO);

        let outcome = sweep.sweep(&catalog).await.unwrap();

        assert_eq!(outcome.duplicates_collapsed, 0);
        assert!(outcome.reinserted.is_empty());
        assert_eq!(catalog.contents(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_partial_failure_continues_to_next_id() {
        let mut catalog = PagedCatalog::with_items(&["a", "a", "b", "b"]);
        catalog.fail_remove_for = Some("a".to_string());
        let sweep = ReconciliationSweep::new(Duration::ZERO);

        let outcome = sweep.sweep(&catalog).await.unwrap();

        // "a" failed and was skipped; "b" was still collapsed
        assert_eq!(outcome.duplicates_collapsed, 1);
        assert_eq!(outcome.reinserted, vec!["b".to_string()]);

        let contents = catalog.contents();
        assert_eq!(contents.iter().filter(|i| *i == "a").count(), 2);
        assert_eq!(contents.iter().filter(|i| *i == "b").count(), 1);
    }
}
