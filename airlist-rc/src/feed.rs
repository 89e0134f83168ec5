//! Broadcast metadata feed
//!
//! Pull-based "now playing" source. The engine decides cadence by calling
//! `poll_once`; the feed has no control-flow authority over the engine.
//! `Ok(None)` means "no new track-type message this poll", not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

const USER_AGENT: &str = concat!("airlist/", env!("CARGO_PKG_VERSION"));
const POLL_TIMEOUT_SECS: u64 = 10;

/// One "now playing" occurrence from the broadcast source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    pub title: String,
    pub artist: String,
    /// Unique id for this broadcast occurrence; absent when the feed
    /// omits one (the engine synthesizes a deterministic substitute)
    pub source_id: Option<String>,
}

/// Metadata feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network fault or timeout, worth retrying next tick
    #[error("transient feed failure: {0}")]
    Transient(String),

    /// Feed payload could not be interpreted
    #[error("feed parse failure: {0}")]
    Parse(String),
}

/// Pull-based broadcast metadata source
#[async_trait]
pub trait Feed: Send + Sync {
    /// Poll for the current track once, within a bounded timeout
    async fn poll_once(&self) -> Result<Option<BroadcastEvent>, FeedError>;

    /// Stable identifier of the monitored station, used when synthesizing
    /// source ids for events the feed did not tag
    fn station_id(&self) -> String;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    slug: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct NowPlayingResponse {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    id: Option<String>,
}

/// Polling HTTP feed against a broadcast metadata service
///
/// Resolves the configured station slug to a channel id through the
/// service's directory endpoint once, then polls the now-playing endpoint
/// for that channel. A failed directory lookup is retried on the next
/// poll rather than treated as fatal.
pub struct HttpFeed {
    client: reqwest::Client,
    base_url: String,
    station_slug: String,
    channel_id: Mutex<Option<String>>,
}

impl HttpFeed {
    pub fn new(base_url: &str, station_slug: &str) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            station_slug: station_slug.to_string(),
            channel_id: Mutex::new(None),
        })
    }

    /// Resolve and cache the channel id for the configured station slug
    async fn channel_id(&self) -> Result<String, FeedError> {
        let mut cached = self.channel_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let url = format!("{}/v1/stations", self.base_url);
        tracing::info!(station = %self.station_slug, url = %url, "Resolving station channel id");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Transient(format!(
                "directory lookup returned HTTP {}",
                response.status()
            )));
        }

        let entries: Vec<DirectoryEntry> = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        let channel = entries
            .into_iter()
            .find(|e| e.slug.eq_ignore_ascii_case(&self.station_slug))
            .map(|e| e.channel_id)
            .ok_or_else(|| {
                FeedError::Parse(format!(
                    "station slug '{}' not present in directory",
                    self.station_slug
                ))
            })?;

        *cached = Some(channel.clone());
        Ok(channel)
    }
}

#[async_trait]
impl Feed for HttpFeed {
    async fn poll_once(&self) -> Result<Option<BroadcastEvent>, FeedError> {
        let channel = self.channel_id().await?;
        let url = format!("{}/v1/channels/{}/now-playing", self.base_url, channel);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Transient(format!(
                "now-playing returned HTTP {}",
                response.status()
            )));
        }

        let payload: NowPlayingResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))?;

        // Heartbeats and non-track messages are "nothing new this poll"
        if payload.kind.as_deref() != Some("track") {
            return Ok(None);
        }

        let title = payload.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let artist = payload.artist.map(|a| a.trim().to_string()).unwrap_or_default();
        if title.is_empty() || artist.is_empty() {
            tracing::debug!("Track message without usable title/artist, skipping");
            return Ok(None);
        }

        tracing::info!(title = %title, artist = %artist, "Now playing");
        Ok(Some(BroadcastEvent {
            title,
            artist,
            source_id: payload.id,
        }))
    }

    fn station_id(&self) -> String {
        self.station_slug.clone()
    }
}
