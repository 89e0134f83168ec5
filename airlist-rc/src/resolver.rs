//! Staged catalog resolution
//!
//! Resolves a `(title, artist)` pair against the catalog search
//! capability through up to three title rewrites, in order:
//!
//! 1. title verbatim
//! 2. parenthetical content stripped (`"Song (Radio Edit)"` → `"Song"`)
//! 3. bracketed content and `feat.` suffix stripped
//!
//! A rewrite identical (case-insensitive) to an earlier attempt is
//! skipped; the first match short-circuits. A transient search fault
//! aborts the whole resolution immediately so it is never mistaken for
//! "not found".

use crate::catalog::{Catalog, CatalogError, CatalogId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static FEAT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\s\-]*\b(?:feat|ft|featuring)\.?\s+.*$").unwrap());

/// Title rewrite strategies, in default order of application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Verbatim,
    StripParenthetical,
    StripBracketsAndFeat,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [
        Strategy::Verbatim,
        Strategy::StripParenthetical,
        Strategy::StripBracketsAndFeat,
    ];

    /// Stable name recorded in `NotFound` outcomes and failure records
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Verbatim => "verbatim",
            Strategy::StripParenthetical => "strip_parenthetical",
            Strategy::StripBracketsAndFeat => "strip_brackets_feat",
        }
    }

    /// Apply this rewrite to a title, normalizing whitespace
    pub fn rewrite(&self, title: &str) -> String {
        let rewritten = match self {
            Strategy::Verbatim => title.to_string(),
            Strategy::StripParenthetical => PARENTHETICAL.replace_all(title, " ").into_owned(),
            Strategy::StripBracketsAndFeat => {
                let no_brackets = BRACKETED.replace_all(title, " ");
                FEAT_SUFFIX.replace(&no_brackets, "").into_owned()
            }
        };
        collapse_whitespace(&rewritten)
    }

    fn index(&self) -> usize {
        match self {
            Strategy::Verbatim => 0,
            Strategy::StripParenthetical => 1,
            Strategy::StripBracketsAndFeat => 2,
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outcome of one resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// A rewrite matched; remaining rewrites were not attempted
    Found(CatalogId),
    /// Every attempted rewrite completed and found nothing
    NotFound { tried: Vec<&'static str> },
    /// A retryable infrastructure fault interrupted resolution
    TransientError,
}

/// Per-artist success counts used to order rewrite attempts
///
/// Purely an ordering optimization: the rewrite that has historically
/// succeeded most often for an artist is tried first.
#[derive(Debug, Default, Clone)]
struct StrategyStats {
    successes: [u32; 3],
}

impl StrategyStats {
    fn record(&mut self, strategy: Strategy) {
        self.successes[strategy.index()] += 1;
    }

    fn best(&self) -> Option<Strategy> {
        let (idx, &count) = self
            .successes
            .iter()
            .enumerate()
            .max_by_key(|(_, &count)| count)?;
        if count == 0 {
            return None;
        }
        Some(Strategy::ORDER[idx])
    }
}

/// Staged fuzzy-match resolver over the catalog search capability
pub struct CatalogResolver {
    catalog: Arc<dyn Catalog>,
    artist_hints: Mutex<HashMap<String, StrategyStats>>,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            artist_hints: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a title/artist pair to a catalog id
    ///
    /// Returns `Err` only for non-retryable faults the engine must see
    /// directly (upstream auth failure); every other condition is a
    /// classified `ResolutionOutcome`.
    pub async fn resolve(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<ResolutionOutcome, CatalogError> {
        let mut tried_titles: Vec<String> = Vec::new();
        let mut tried: Vec<&'static str> = Vec::new();

        for strategy in self.strategy_order(artist) {
            let candidate = strategy.rewrite(title);
            if candidate.is_empty() {
                continue;
            }
            let key = candidate.to_lowercase();
            if tried_titles.contains(&key) {
                continue;
            }
            tried_titles.push(key);
            tried.push(strategy.name());

            tracing::debug!(
                strategy = strategy.name(),
                candidate = %candidate,
                artist = %artist,
                "Catalog search attempt"
            );

            match self.catalog.search(&candidate, artist).await {
                Ok(Some(id)) => {
                    self.record_success(artist, strategy);
                    return Ok(ResolutionOutcome::Found(id));
                }
                Ok(None) => continue,
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %err,
                        "Transient fault during resolution, aborting rewrites"
                    );
                    return Ok(ResolutionOutcome::TransientError);
                }
                Err(err @ CatalogError::Auth(_)) => return Err(err),
                Err(err) => {
                    // Query-shape rejections count as a failed attempt and
                    // the next rewrite still gets its chance
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %err,
                        "Search rejected for this rewrite"
                    );
                    continue;
                }
            }
        }

        Ok(ResolutionOutcome::NotFound { tried })
    }

    /// Default strategy order with the artist's historically most
    /// successful rewrite moved to the front
    fn strategy_order(&self, artist: &str) -> Vec<Strategy> {
        let mut order = Strategy::ORDER.to_vec();
        let hints = self.artist_hints.lock().expect("artist hint lock poisoned");
        if let Some(best) = hints.get(&artist.to_lowercase()).and_then(|s| s.best()) {
            if let Some(pos) = order.iter().position(|s| *s == best) {
                order.remove(pos);
                order.insert(0, best);
            }
        }
        order
    }

    fn record_success(&self, artist: &str, strategy: Strategy) {
        let mut hints = self.artist_hints.lock().expect("artist hint lock poisoned");
        hints
            .entry(artist.to_lowercase())
            .or_default()
            .record(strategy);
    }
}
