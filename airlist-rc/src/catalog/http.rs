//! HTTP music catalog client
//!
//! reqwest-backed implementation of the `Catalog` trait. Every outbound
//! call goes through a bounded retry loop with exponential backoff; a
//! 429 honors the server's Retry-After hint. After retries exhaust, the
//! error surfaces to the caller as `Transient` rather than a raw
//! transport failure.

use super::{Catalog, CatalogError, CatalogId, CollectionItem, RemoveScope, TrackDetail};
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

const USER_AGENT: &str = concat!("airlist/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Bounded retry policy for outbound catalog calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Base delay, doubled per attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Run `call` under the retry policy, sleeping between retryable failures
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let mut last_err = CatalogError::Transient("no attempts made".to_string());

    for attempt in 0..policy.max_attempts {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                let wait = match &err {
                    CatalogError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(*secs),
                    _ => policy.delay_for(attempt),
                };
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "Retryable catalog failure"
                );
                last_err = err;
                if attempt + 1 < policy.max_attempts {
                    tokio::time::sleep(wait).await;
                }
            }
            Err(err) => return Err(err),
        }
    }

    tracing::error!(
        operation,
        attempts = policy.max_attempts,
        "Catalog call failed after all retries"
    );
    Err(CatalogError::Transient(format!(
        "{} failed after {} attempts: {}",
        operation, policy.max_attempts, last_err
    )))
}

/// Map a transport-level failure to the classified taxonomy
fn classify_transport(err: reqwest::Error) -> CatalogError {
    if err.is_decode() {
        CatalogError::Parse(err.to_string())
    } else {
        // Timeouts, connect failures, and anything else transport-level
        CatalogError::Transient(err.to_string())
    }
}

/// Map an HTTP status to the classified taxonomy
fn classify_status(status: u16, retry_after_secs: Option<u64>, body: &str) -> CatalogError {
    match status {
        401 => CatalogError::Auth(format!("HTTP 401: {}", body)),
        403 if body.to_ascii_lowercase().contains("duplicate") => CatalogError::Duplicate,
        403 => CatalogError::Auth(format!("HTTP 403: {}", body)),
        409 => CatalogError::Duplicate,
        429 => CatalogError::RateLimited { retry_after_secs },
        500..=599 => CatalogError::Transient(format!("HTTP {}: {}", status, body)),
        _ => CatalogError::Rejected(format!("HTTP {}: {}", status, body)),
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Vec<TrackEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    id: String,
    title: Option<String>,
    artists: Option<Vec<ArtistEntry>>,
}

#[derive(Debug, Deserialize)]
struct ArtistEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    items: Vec<ListItem>,
    /// Starting offset of this page within the collection
    #[serde(default)]
    offset: usize,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResponse {
    total: usize,
}

/// HTTP implementation of the `Catalog` trait
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    playlist_id: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HttpCatalog {
    pub fn new(
        base_url: &str,
        playlist_id: &str,
        token: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CatalogError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            playlist_id: playlist_id.to_string(),
            token,
            retry,
        })
    }

    fn tracks_url(&self) -> String {
        format!("{}/v1/playlists/{}/tracks", self.base_url, self.playlist_id)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send a request and classify the response status
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, CatalogError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        Err(classify_status(status.as_u16(), retry_after, &body))
    }

    async fn search_once(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<SearchResponse, CatalogError> {
        let url = format!("{}/v1/search", self.base_url);
        let response = self
            .send(self.client.get(&url).query(&[
                ("type", "track"),
                ("title", title),
                ("artist", artist),
                ("limit", "1"),
            ]))
            .await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn insert_once(&self, id: &str) -> Result<(), CatalogError> {
        self.send(
            self.client
                .post(self.tracks_url())
                .json(&serde_json::json!({ "id": id })),
        )
        .await?;
        Ok(())
    }

    async fn remove_once(&self, id: &str, scope: RemoveScope) -> Result<(), CatalogError> {
        let body = match scope {
            RemoveScope::All => serde_json::json!({ "id": id, "scope": "all" }),
            RemoveScope::At(position) => {
                serde_json::json!({ "id": id, "scope": "position", "position": position })
            }
        };
        self.send(self.client.delete(self.tracks_url()).json(&body))
            .await?;
        Ok(())
    }

    async fn list_once(&self, page_token: Option<&str>) -> Result<ListResponse, CatalogError> {
        let mut req = self.client.get(self.tracks_url());
        if let Some(token) = page_token {
            req = req.query(&[("page_token", token)]);
        }
        let response = self.send(req).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn size_once(&self) -> Result<PlaylistResponse, CatalogError> {
        let url = format!("{}/v1/playlists/{}", self.base_url, self.playlist_id);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn track_detail_once(&self, id: &str) -> Result<TrackEntry, CatalogError> {
        let url = format!("{}/v1/tracks/{}", self.base_url, id);
        let response = self.send(self.client.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<CatalogId>, CatalogError> {
        let parsed = with_retry(&self.retry, "search", || self.search_once(title, artist)).await?;

        match parsed.tracks.into_iter().next() {
            Some(track) => {
                tracing::info!(
                    id = %track.id,
                    title = track.title.as_deref().unwrap_or("?"),
                    "Catalog search hit"
                );
                Ok(Some(track.id))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, id: &str) -> Result<(), CatalogError> {
        with_retry(&self.retry, "insert", || self.insert_once(id)).await
    }

    async fn remove(&self, id: &str, scope: RemoveScope) -> Result<(), CatalogError> {
        with_retry(&self.retry, "remove", || self.remove_once(id, scope)).await
    }

    async fn list(
        &self,
        page_token: Option<String>,
    ) -> Result<(Vec<CollectionItem>, Option<String>), CatalogError> {
        let parsed = with_retry(&self.retry, "list", || {
            self.list_once(page_token.as_deref())
        })
        .await?;

        let page_offset = parsed.offset;
        let items = parsed
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| CollectionItem {
                id: item.id,
                position: page_offset + idx,
                name: item.name,
            })
            .collect();

        Ok((items, parsed.next_page_token))
    }

    async fn size(&self) -> Result<usize, CatalogError> {
        let parsed = with_retry(&self.retry, "size", || self.size_once()).await?;
        Ok(parsed.total)
    }

    async fn track_detail(&self, id: &str) -> Result<Option<TrackDetail>, CatalogError> {
        match with_retry(&self.retry, "track_detail", || self.track_detail_once(id)).await {
            Ok(track) => Ok(Some(TrackDetail {
                title: track.title.unwrap_or_default(),
                artists: track
                    .artists
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| a.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            })),
            // Missing tracks degrade to the broadcast metadata in reports
            Err(CatalogError::Rejected(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
