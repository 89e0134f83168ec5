//! Event types for the airlist event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service lifecycle state driven by the cycle scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Starting up, upstream auth not yet confirmed
    Initializing,
    /// Ticking normally inside the active window
    Playing,
    /// Manually paused via the control surface
    Paused,
    /// Outside the configured active time-of-day window
    OutOfHours,
    /// Unrecoverable upstream failure; terminal until restart
    Error,
}

impl Default for ServiceState {
    fn default() -> Self {
        ServiceState::Initializing
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Initializing => write!(f, "initializing"),
            ServiceState::Playing => write!(f, "playing"),
            ServiceState::Paused => write!(f, "paused"),
            ServiceState::OutOfHours => write!(f, "out_of_hours"),
            ServiceState::Error => write!(f, "error"),
        }
    }
}

/// Airlist event types, broadcast to SSE listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Scheduler moved between states
    StateChanged {
        from: ServiceState,
        to: ServiceState,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A track was inserted into the target collection
    TrackAdded {
        catalog_id: String,
        title: String,
        artist: String,
        timestamp: DateTime<Utc>,
    },

    /// An insert was suppressed because the track was recently added
    TrackSuppressed {
        catalog_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A lookup definitively failed (all rewrite strategies exhausted)
    ResolutionFailed {
        title: String,
        artist: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A retry item hit its attempt limit and was discarded
    RetryAbandoned {
        title: String,
        artist: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A duplicate sweep finished
    SweepCompleted {
        scanned: usize,
        duplicates_collapsed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Event type string for the SSE `event:` field
    pub fn type_str(&self) -> &'static str {
        match self {
            EngineEvent::StateChanged { .. } => "StateChanged",
            EngineEvent::TrackAdded { .. } => "TrackAdded",
            EngineEvent::TrackSuppressed { .. } => "TrackSuppressed",
            EngineEvent::ResolutionFailed { .. } => "ResolutionFailed",
            EngineEvent::RetryAbandoned { .. } => "RetryAbandoned",
            EngineEvent::SweepCompleted { .. } => "SweepCompleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EngineEvent::TrackAdded {
            catalog_id: "cat-1".to_string(),
            title: "Song".to_string(),
            artist: "Band".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"TrackAdded\""));
        assert_eq!(event.type_str(), "TrackAdded");
    }

    #[test]
    fn test_service_state_display() {
        assert_eq!(ServiceState::OutOfHours.to_string(), "out_of_hours");
        assert_eq!(ServiceState::Playing.to_string(), "playing");
    }
}
