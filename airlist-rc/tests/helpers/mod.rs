//! Shared test fixtures: in-memory mock collaborators and engine wiring

#![allow(dead_code)]

use airlist_rc::catalog::{
    Catalog, CatalogError, CatalogId, CollectionItem, RemoveScope, TrackDetail,
};
use airlist_rc::config::Config;
use airlist_rc::engine::Engine;
use airlist_rc::feed::{BroadcastEvent, Feed, FeedError};
use airlist_rc::notifier::Notifier;
use airlist_rc::snapshot::{Snapshot, SnapshotStore};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Feed mock that replays a scripted sequence of events
pub struct MockFeed {
    events: Mutex<VecDeque<BroadcastEvent>>,
    pub poll_calls: Mutex<u32>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            poll_calls: Mutex::new(0),
        }
    }

    pub fn push(&self, title: &str, artist: &str, source_id: Option<&str>) {
        self.events.lock().unwrap().push_back(BroadcastEvent {
            title: title.to_string(),
            artist: artist.to_string(),
            source_id: source_id.map(|s| s.to_string()),
        });
    }

    pub fn polls(&self) -> u32 {
        *self.poll_calls.lock().unwrap()
    }
}

#[async_trait]
impl Feed for MockFeed {
    async fn poll_once(&self) -> Result<Option<BroadcastEvent>, FeedError> {
        *self.poll_calls.lock().unwrap() += 1;
        Ok(self.events.lock().unwrap().pop_front())
    }

    fn station_id(&self) -> String {
        "teststation".to_string()
    }
}

#[derive(Default)]
struct CatalogState {
    playlist: Vec<CatalogId>,
    search_map: HashMap<String, String>,
    search_calls: u32,
    insert_calls: u32,
    size_calls: u32,
    fail_search: Option<CatalogError>,
    fail_size: Option<CatalogError>,
}

/// In-memory catalog with scripted search results and call counters
pub struct MockCatalog {
    state: Mutex<CatalogState>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Map a lowercase search title to a catalog id
    pub fn add_match(&self, title: &str, id: &str) {
        self.state
            .lock()
            .unwrap()
            .search_map
            .insert(title.to_lowercase(), id.to_string());
    }

    pub fn preload_playlist(&self, ids: &[&str]) {
        self.state.lock().unwrap().playlist = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_fail_search(&self, err: Option<CatalogError>) {
        self.state.lock().unwrap().fail_search = err;
    }

    pub fn set_fail_size(&self, err: Option<CatalogError>) {
        self.state.lock().unwrap().fail_size = err;
    }

    pub fn playlist(&self) -> Vec<CatalogId> {
        self.state.lock().unwrap().playlist.clone()
    }

    pub fn search_calls(&self) -> u32 {
        self.state.lock().unwrap().search_calls
    }

    pub fn insert_calls(&self) -> u32 {
        self.state.lock().unwrap().insert_calls
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn search(&self, title: &str, _artist: &str) -> Result<Option<CatalogId>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        if let Some(err) = &state.fail_search {
            return Err(err.clone());
        }
        Ok(state.search_map.get(&title.to_lowercase()).cloned())
    }

    async fn insert(&self, id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        state.playlist.push(id.to_string());
        Ok(())
    }

    async fn remove(&self, id: &str, scope: RemoveScope) -> Result<(), CatalogError> {
        let mut state = self.state.lock().unwrap();
        match scope {
            RemoveScope::All => state.playlist.retain(|i| i != id),
            RemoveScope::At(pos) => {
                if pos < state.playlist.len() && state.playlist[pos] == id {
                    state.playlist.remove(pos);
                }
            }
        }
        Ok(())
    }

    async fn list(
        &self,
        _page_token: Option<String>,
    ) -> Result<(Vec<CollectionItem>, Option<String>), CatalogError> {
        let state = self.state.lock().unwrap();
        Ok((
            state
                .playlist
                .iter()
                .enumerate()
                .map(|(position, id)| CollectionItem {
                    id: id.clone(),
                    position,
                    name: None,
                })
                .collect(),
            None,
        ))
    }

    async fn size(&self) -> Result<usize, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.size_calls += 1;
        if let Some(err) = &state.fail_size {
            return Err(err.clone());
        }
        Ok(state.playlist.len())
    }

    async fn track_detail(&self, _id: &str) -> Result<Option<TrackDetail>, CatalogError> {
        Ok(None)
    }
}

/// Snapshot store backed by a shared in-memory slot
#[derive(Clone)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.slot.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> airlist_rc::Result<()> {
        *self.slot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> airlist_rc::Result<Option<Snapshot>> {
        Ok(self.slot.lock().unwrap().clone())
    }
}

/// Notifier that collects sent reports
pub struct MockNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, subject: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
    }
}

/// Config with identities filled in and sweep pauses disabled
pub fn test_config() -> Config {
    Config {
        station_slug: "teststation".to_string(),
        playlist_id: "pl-test".to_string(),
        catalog_base_url: "http://catalog.invalid".to_string(),
        feed_base_url: "http://feed.invalid".to_string(),
        sweep_pause_ms: 0,
        ..Default::default()
    }
}

/// Fully mocked engine plus handles to every collaborator
pub struct TestRig {
    pub engine: Arc<Engine>,
    pub feed: Arc<MockFeed>,
    pub catalog: Arc<MockCatalog>,
    pub store: MemorySnapshotStore,
    pub notifier: Arc<MockNotifier>,
}

pub async fn build_rig(config: Config) -> TestRig {
    let feed = Arc::new(MockFeed::new());
    let catalog = Arc::new(MockCatalog::new());
    let store = MemorySnapshotStore::new();
    let notifier = Arc::new(MockNotifier::new());

    let engine = Arc::new(
        Engine::new(
            &config,
            feed.clone(),
            catalog.clone(),
            Arc::new(store.clone()),
            notifier.clone(),
        )
        .await,
    );

    TestRig {
        engine,
        feed,
        catalog,
        store,
        notifier,
    }
}
