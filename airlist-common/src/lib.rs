//! # Airlist Common Library
//!
//! Shared code for the airlist services:
//! - Error taxonomy
//! - Event types (EngineEvent enum, ServiceState)
//! - Configuration file resolution

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EngineEvent, ServiceState};
