//! airlist-rc configuration
//!
//! Loaded from a TOML file (resolved CLI > env > platform config dir),
//! then overridden by command-line flags in `main`. Every knob has a
//! compiled default so the service runs with nothing but a station slug,
//! playlist id, and the two service base URLs.

use crate::error::{Error, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP control surface port
    pub port: u16,

    /// Station slug monitored on the broadcast metadata service
    pub station_slug: String,
    /// Target playlist id on the catalog
    pub playlist_id: String,
    /// Base URL of the catalog API
    pub catalog_base_url: String,
    /// Base URL of the broadcast metadata service
    pub feed_base_url: String,
    /// Bearer token for the catalog API
    pub catalog_token: Option<String>,

    /// Seconds between reconciliation ticks
    pub tick_interval_secs: u64,
    /// Seconds between duplicate sweeps
    pub sweep_interval_secs: u64,
    /// Milliseconds to pause between each sweep remove/re-add pair
    pub sweep_pause_ms: u64,

    /// Maximum queued failed lookups
    pub retry_queue_capacity: usize,
    /// Retry attempts before a queued lookup is abandoned
    pub max_retry_attempts: u32,
    /// Capacity of the recently-inserted suppression set
    pub recent_capacity: usize,
    /// Maximum target collection size before oldest-eviction
    pub max_playlist_size: usize,

    /// Outbound catalog call retry attempts
    pub http_retry_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per attempt
    pub http_retry_base_delay_ms: u64,

    /// Active window start, "HH:MM" local time; absent = always active
    pub window_start: Option<String>,
    /// Active window end, "HH:MM" local time
    pub window_end: Option<String>,

    /// Snapshot file location
    pub snapshot_path: PathBuf,
    /// Optional webhook for summary reports; reports go to the log when
    /// unset
    pub notify_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5750,
            station_slug: String::new(),
            playlist_id: String::new(),
            catalog_base_url: String::new(),
            feed_base_url: String::new(),
            catalog_token: None,
            tick_interval_secs: 120,
            sweep_interval_secs: 30 * 60,
            sweep_pause_ms: 1500,
            retry_queue_capacity: 20,
            max_retry_attempts: 3,
            recent_capacity: 50,
            max_playlist_size: 100,
            http_retry_attempts: 3,
            http_retry_base_delay_ms: 5000,
            window_start: None,
            window_end: None,
            snapshot_path: PathBuf::from("airlist-state.json"),
            notify_url: None,
        }
    }
}

impl Config {
    /// Load from a TOML file, or defaults when no file is present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => airlist_common::config::load_toml(path)
                .map_err(|e| Error::Config(e.to_string())),
            None => Ok(Self::default()),
        }
    }

    /// Reject configurations that cannot identify the external systems
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("station_slug", &self.station_slug),
            ("playlist_id", &self.playlist_id),
            ("catalog_base_url", &self.catalog_base_url),
            ("feed_base_url", &self.feed_base_url),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must be set", field)));
            }
        }

        match (&self.window_start, &self.window_end) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Config(
                    "window_start and window_end must be set together".to_string(),
                ));
            }
            _ => {}
        }
        // Surface bad time strings at startup rather than first tick
        self.active_window_checked()?;

        Ok(())
    }

    /// Parsed active window; `None` means always active
    ///
    /// Invalid strings were rejected by `validate`, so this degrades to
    /// always-active rather than failing mid-tick.
    pub fn active_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        self.active_window_checked().ok().flatten()
    }

    fn active_window_checked(&self) -> Result<Option<(NaiveTime, NaiveTime)>> {
        let (Some(start), Some(end)) = (&self.window_start, &self.window_end) else {
            return Ok(None);
        };
        Ok(Some((parse_time(start)?, parse_time(end)?)))
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("invalid time of day '{}', expected HH:MM", s)))
}
