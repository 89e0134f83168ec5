//! Reconciliation engine
//!
//! Composition root driving one tick: intake event → resolve →
//! suppress/insert → evict if needed → opportunistically drain the retry
//! queue → opportunistically run the duplicate sweep → persist.
//!
//! All mutable structures live behind one owned state object; the cycle
//! task and the control-surface handlers funnel every mutation through
//! the same methods, so an admin-triggered sweep or drain is exactly the
//! operation the cycle would have run.

use crate::catalog::{Catalog, CatalogError, CatalogId};
use crate::config::Config;
use crate::feed::{BroadcastEvent, Feed};
use crate::governor::SizeGovernor;
use crate::notifier::Notifier;
use crate::recent::RecentlyInserted;
use crate::report::{AddedRecord, DailyLog, FailureRecord};
use crate::resolver::{CatalogResolver, ResolutionOutcome};
use crate::retry_queue::RetryQueue;
use crate::scheduler::{CycleScheduler, SchedulerSignal, TickDecision, Transition};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::sweep::ReconciliationSweep;
use airlist_common::events::{EngineEvent, ServiceState};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};

const EVENT_BUS_CAPACITY: usize = 100;
const STATUS_RECENT_LIMIT: usize = 10;

/// Point-in-time view of the engine for the control surface
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub scheduler_state: ServiceState,
    pub last_event: Option<BroadcastEvent>,
    pub queue_depth: usize,
    pub recent_adds: Vec<AddedRecord>,
    pub recent_failures: Vec<FailureRecord>,
}

/// Mutable engine state, guarded by a single lock
struct Inner {
    scheduler: CycleScheduler,
    recent: RecentlyInserted,
    retry: RetryQueue,
    daily: DailyLog,
    last_event: Option<BroadcastEvent>,
    last_inserted_source_id: Option<String>,
    last_sweep_at: Option<DateTime<Utc>>,
}

pub struct Engine {
    feed: Arc<dyn Feed>,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn SnapshotStore>,
    notifier: Arc<dyn Notifier>,
    resolver: CatalogResolver,
    governor: SizeGovernor,
    sweep: ReconciliationSweep,
    tick_interval: Duration,
    sweep_interval: ChronoDuration,
    inner: Mutex<Inner>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl Engine {
    /// Build the engine, restoring any persisted snapshot
    pub async fn new(
        config: &Config,
        feed: Arc<dyn Feed>,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn SnapshotStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let now = Utc::now();
        let snapshot = match store.load().await {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "Could not load snapshot, starting fresh");
                Snapshot::default()
            }
        };

        let mut scheduler = CycleScheduler::new(config.active_window(), now);
        scheduler.restore(snapshot.service_state, now);

        let inner = Inner {
            scheduler,
            recent: RecentlyInserted::from_entries(
                config.recent_capacity,
                snapshot.recently_inserted,
            ),
            retry: RetryQueue::from_items(
                config.retry_queue_capacity,
                config.max_retry_attempts,
                snapshot.retry_queue,
            ),
            daily: DailyLog::new(now.date_naive()),
            last_event: None,
            last_inserted_source_id: snapshot.last_inserted_source_id,
            last_sweep_at: snapshot
                .last_sweep_unix
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        };

        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);

        Self {
            feed,
            catalog: catalog.clone(),
            store,
            notifier,
            resolver: CatalogResolver::new(catalog),
            governor: SizeGovernor::new(config.max_playlist_size),
            sweep: ReconciliationSweep::new(Duration::from_millis(config.sweep_pause_ms)),
            tick_interval: Duration::from_secs(config.tick_interval_secs),
            sweep_interval: ChronoDuration::seconds(config.sweep_interval_secs as i64),
            inner: Mutex::new(inner),
            event_tx,
        }
    }

    // ========================================================================
    // Event bus
    // ========================================================================

    /// Subscribe to the engine event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast(&self, event: EngineEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    fn broadcast_transition(&self, transition: &Transition) {
        self.broadcast(EngineEvent::StateChanged {
            from: transition.from,
            to: transition.to,
            reason: transition.reason.clone(),
            timestamp: transition.at,
        });
    }

    // ========================================================================
    // Cycle driver
    // ========================================================================

    /// Run the serialized tick loop until shutdown is signalled
    ///
    /// One tick at a time; a tick in flight is never preempted, shutdown
    /// and pause only affect whether the next one starts.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.tick_interval.as_secs(),
            "Reconciliation cycle started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown signalled, stopping cycle");
                    break;
                }
            }
        }

        self.persist().await;
    }

    /// One reconciliation tick
    pub async fn tick(&self) {
        let now = Utc::now();

        let decision = {
            let mut inner = self.inner.lock().await;
            inner.scheduler.on_tick(now)
        };
        self.apply_decision(&decision).await;

        let permitted = if self.state().await == ServiceState::Initializing {
            self.probe_upstream(now).await
        } else {
            decision.permitted
        };

        if !permitted {
            self.persist().await;
            return;
        }

        // Intake one event from the feed
        match self.feed.poll_once().await {
            Ok(Some(event)) => self.process_event(event).await,
            Ok(None) => tracing::debug!("No new track information this cycle"),
            Err(err) => tracing::warn!(error = %err, "Feed poll failed"),
        }

        // At most one retry lookup per cycle
        self.drain_retry_once().await;

        if self.sweep_due(now).await {
            self.run_sweep_now().await;
        }

        self.persist().await;
    }

    /// Confirm upstream auth with a cheap catalog call while initializing
    async fn probe_upstream(&self, now: DateTime<Utc>) -> bool {
        match self.catalog.size().await {
            Ok(count) => {
                tracing::info!(count, "Upstream catalog reachable, leaving initialization");
                let decision = {
                    let mut inner = self.inner.lock().await;
                    inner.scheduler.mark_ready(now)
                };
                let permitted = decision.permitted;
                self.apply_decision(&decision).await;
                permitted
            }
            Err(err) => {
                self.note_catalog_error(&err).await;
                tracing::warn!(error = %err, "Upstream probe failed, staying in initialization");
                false
            }
        }
    }

    /// Broadcast transitions and perform one-time scheduler side effects
    async fn apply_decision(&self, decision: &TickDecision) {
        for transition in &decision.transitions {
            self.broadcast_transition(transition);
        }

        for signal in &decision.signals {
            match signal {
                SchedulerSignal::DailyRollover => {
                    let summary = {
                        let mut inner = self.inner.lock().await;
                        let summary = inner.daily.render_summary();
                        inner.daily.roll_over(Utc::now().date_naive());
                        summary
                    };
                    self.notifier.send("Daily summary", &summary).await;
                }
                SchedulerSignal::SessionEnded => {
                    let line = {
                        let inner = self.inner.lock().await;
                        inner.daily.render_session()
                    };
                    self.notifier.send("Session summary", &line).await;
                }
                SchedulerSignal::SessionStarted => {
                    self.notifier
                        .send("Session", "Broadcast monitoring session started")
                        .await;
                }
            }
        }
    }

    // ========================================================================
    // Event intake
    // ========================================================================

    /// Resolve and insert one broadcast event
    async fn process_event(&self, event: BroadcastEvent) {
        let source_id = event.source_id.clone().unwrap_or_else(|| {
            synthesize_source_id(&self.feed.station_id(), &event.title, &event.artist)
        });

        {
            let mut inner = self.inner.lock().await;
            if inner.last_inserted_source_id.as_deref() == Some(source_id.as_str()) {
                tracing::debug!(
                    title = %event.title,
                    source_id = %source_id,
                    "Same broadcast occurrence as last cycle, skipping"
                );
                inner.last_event = Some(event);
                return;
            }
            inner.last_event = Some(event.clone());
        }

        tracing::info!(title = %event.title, artist = %event.artist, "New broadcast track");

        match self.resolver.resolve(&event.title, &event.artist).await {
            Ok(ResolutionOutcome::Found(id)) => {
                self.insert_track(&id, &event.title, &event.artist).await;
            }
            Ok(ResolutionOutcome::NotFound { tried }) => {
                let reason = format!("not found after strategies: {}", tried.join(", "));
                tracing::info!(title = %event.title, %reason, "Track not resolvable");
                self.record_failure(&event.title, &event.artist, &reason).await;
                self.broadcast(EngineEvent::ResolutionFailed {
                    title: event.title.clone(),
                    artist: event.artist.clone(),
                    reason,
                    timestamp: Utc::now(),
                });
                // One bounded round of queued re-attempts before abandoning
                let mut inner = self.inner.lock().await;
                inner.retry.enqueue(&event.title, &event.artist, &source_id);
            }
            Ok(ResolutionOutcome::TransientError) => {
                let reason = "search failed on persistent network/API error, queued for retry";
                self.record_failure(&event.title, &event.artist, reason).await;
                let mut inner = self.inner.lock().await;
                inner.retry.enqueue(&event.title, &event.artist, &source_id);
            }
            Err(err) => {
                self.note_catalog_error(&err).await;
                return;
            }
        }

        // Remember the occurrence regardless of outcome so the same
        // broadcast is not re-processed every cycle while it plays
        let mut inner = self.inner.lock().await;
        inner.last_inserted_source_id = Some(source_id);
    }

    /// Idempotent insert path used by both intake and retry draining
    async fn insert_track(&self, id: &CatalogId, title: &str, artist: &str) {
        {
            let inner = self.inner.lock().await;
            if inner.recent.contains(id) {
                tracing::info!(id = %id, title, "Recently inserted, suppressing catalog write");
                drop(inner);
                self.broadcast(EngineEvent::TrackSuppressed {
                    catalog_id: id.clone(),
                    timestamp: Utc::now(),
                });
                return;
            }
        }

        self.governor.ensure_capacity(self.catalog.as_ref()).await;

        match self.catalog.insert(id).await {
            Ok(()) => {
                // Best-effort enrichment for the daily summary
                let catalog_title = match self.catalog.track_detail(id).await {
                    Ok(Some(detail)) => Some(format!("{} by {}", detail.title, detail.artists)),
                    _ => None,
                };

                tracing::info!(id = %id, title, artist, "Added track to collection");
                let mut inner = self.inner.lock().await;
                inner.recent.record(id);
                inner.daily.record_added(AddedRecord {
                    at: Utc::now(),
                    title: title.to_string(),
                    artist: artist.to_string(),
                    catalog_title,
                    catalog_id: id.clone(),
                });
                drop(inner);
                self.broadcast(EngineEvent::TrackAdded {
                    catalog_id: id.clone(),
                    title: title.to_string(),
                    artist: artist.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(CatalogError::Duplicate) => {
                tracing::warn!(id = %id, title, "Catalog rejected insert as duplicate");
                let mut inner = self.inner.lock().await;
                inner.recent.record(id);
                inner.daily.record_failure(FailureRecord {
                    at: Utc::now(),
                    title: title.to_string(),
                    artist: artist.to_string(),
                    reason: "catalog blocked add as duplicate (already in collection)".to_string(),
                });
            }
            Err(err) => {
                self.note_catalog_error(&err).await;
                tracing::error!(id = %id, title, error = %err, "Failed to add track");
                self.record_failure(title, artist, &format!("insert failed: {}", err))
                    .await;
            }
        }
    }

    // ========================================================================
    // Retry queue draining
    // ========================================================================

    /// Retry the head of the queue once; also the admin drain trigger
    pub async fn drain_retry_once(&self) {
        let item = {
            let mut inner = self.inner.lock().await;
            inner.retry.pop_head()
        };
        let Some(item) = item else {
            return;
        };

        tracing::info!(
            title = %item.title,
            artist = %item.artist,
            attempt = item.attempts,
            "Retrying queued lookup"
        );

        match self.resolver.resolve(&item.title, &item.artist).await {
            Ok(ResolutionOutcome::Found(id)) => {
                // Success or not, the item leaves the queue; insert
                // failures are recorded by the insert path itself
                self.insert_track(&id, &item.title, &item.artist).await;
            }
            Ok(ResolutionOutcome::NotFound { .. }) | Ok(ResolutionOutcome::TransientError) => {
                let mut inner = self.inner.lock().await;
                if !inner.retry.requeue(item.clone()) {
                    let reason = format!(
                        "abandoned after {} retry attempts",
                        item.attempts
                    );
                    inner.daily.record_failure(FailureRecord {
                        at: Utc::now(),
                        title: item.title.clone(),
                        artist: item.artist.clone(),
                        reason,
                    });
                    drop(inner);
                    self.broadcast(EngineEvent::RetryAbandoned {
                        title: item.title,
                        artist: item.artist,
                        attempts: item.attempts,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(err) => {
                self.note_catalog_error(&err).await;
                let mut inner = self.inner.lock().await;
                inner.retry.requeue(item);
            }
        }
    }

    // ========================================================================
    // Duplicate sweep
    // ========================================================================

    async fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.last_sweep_at {
            Some(last) => now.signed_duration_since(last) >= self.sweep_interval,
            None => {
                // First run: baseline now so a restart loop cannot hammer
                // the catalog with full scans
                inner.last_sweep_at = Some(now);
                false
            }
        }
    }

    /// Run the duplicate sweep immediately; also the admin sweep trigger
    pub async fn run_sweep_now(&self) {
        tracing::info!("Starting duplicate sweep");
        match self.sweep.sweep(self.catalog.as_ref()).await {
            Ok(outcome) => {
                let mut inner = self.inner.lock().await;
                for id in &outcome.reinserted {
                    inner.recent.record(id);
                }
                inner.last_sweep_at = Some(Utc::now());
                drop(inner);
                self.broadcast(EngineEvent::SweepCompleted {
                    scanned: outcome.scanned,
                    duplicates_collapsed: outcome.duplicates_collapsed,
                    timestamp: Utc::now(),
                });
            }
            Err(err) => {
                self.note_catalog_error(&err).await;
                tracing::warn!(error = %err, "Duplicate sweep failed");
                let mut inner = self.inner.lock().await;
                inner.last_sweep_at = Some(Utc::now());
            }
        }
    }

    // ========================================================================
    // Control surface operations
    // ========================================================================

    /// Manual pause: suspends ticking, not state persistence
    pub async fn pause(&self) -> crate::Result<ServiceState> {
        let transition = {
            let mut inner = self.inner.lock().await;
            inner.scheduler.pause(Utc::now())?
        };
        self.broadcast_transition(&transition);
        self.persist().await;
        Ok(transition.to)
    }

    /// Manual resume; the window decides the target state
    pub async fn resume(&self) -> crate::Result<ServiceState> {
        let transition = {
            let mut inner = self.inner.lock().await;
            inner.scheduler.resume(Utc::now())?
        };
        self.broadcast_transition(&transition);
        self.persist().await;
        Ok(transition.to)
    }

    pub async fn state(&self) -> ServiceState {
        self.inner.lock().await.scheduler.state()
    }

    pub async fn status(&self) -> EngineStatus {
        let inner = self.inner.lock().await;
        EngineStatus {
            scheduler_state: inner.scheduler.state(),
            last_event: inner.last_event.clone(),
            queue_depth: inner.retry.depth(),
            recent_adds: inner.daily.recent_added(STATUS_RECENT_LIMIT),
            recent_failures: inner.daily.recent_failures(STATUS_RECENT_LIMIT),
        }
    }

    pub async fn scheduler_history(&self) -> Vec<Transition> {
        self.inner.lock().await.scheduler.history()
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    /// Record a terminal failure for the daily summary
    async fn record_failure(&self, title: &str, artist: &str, reason: &str) {
        let mut inner = self.inner.lock().await;
        inner.daily.record_failure(FailureRecord {
            at: Utc::now(),
            title: title.to_string(),
            artist: artist.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Auth failures halt the scheduler; everything else is the caller's
    /// problem to log
    async fn note_catalog_error(&self, err: &CatalogError) {
        if let CatalogError::Auth(msg) = err {
            let transition = {
                let mut inner = self.inner.lock().await;
                inner
                    .scheduler
                    .mark_error(&format!("upstream auth failure: {}", msg), Utc::now())
            };
            if let Some(transition) = transition {
                tracing::error!(reason = %transition.reason, "Scheduler halted");
                self.broadcast_transition(&transition);
            }
        }
    }

    /// Save the snapshot; failures are logged, never fatal
    pub async fn persist(&self) {
        let snapshot = {
            let inner = self.inner.lock().await;
            Snapshot {
                last_inserted_source_id: inner.last_inserted_source_id.clone(),
                last_sweep_unix: inner.last_sweep_at.map(|t| t.timestamp()),
                service_state: inner.scheduler.state(),
                retry_queue: inner.retry.items(),
                recently_inserted: inner.recent.entries(),
            }
        };
        if let Err(err) = self.store.save(&snapshot).await {
            tracing::warn!(error = %err, "Failed to save snapshot");
        }
    }
}

/// Deterministic source id for feed events that carry none
fn synthesize_source_id(station: &str, title: &str, artist: &str) -> String {
    let normalize = |s: &str| {
        s.trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    };
    format!(
        "{}_{}_{}",
        normalize(station),
        normalize(title),
        normalize(artist)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_source_id_is_deterministic() {
        let a = synthesize_source_id("radiox", "Some Song", "The Band");
        let b = synthesize_source_id("radiox", "  some   song ", "THE BAND");
        assert_eq!(a, b);
        assert_eq!(a, "radiox_some_song_the_band");
    }

    #[test]
    fn test_synthesized_source_id_distinguishes_tracks() {
        let a = synthesize_source_id("radiox", "Song One", "Band");
        let b = synthesize_source_id("radiox", "Song Two", "Band");
        assert_ne!(a, b);
    }
}
