//! Cineview Player - Adaptive Video Playback Controller
//!
//! This crate provides the playback core behind the Cineview catalog:
//! - HLS manifest acquisition and parsing (master -> variants -> segments)
//! - Pre-flight structure validation of the variant ladder
//! - Quality tier selection
//! - The playback lifecycle state machine with fault classification and
//!   bounded retry
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Cineview Player                        │
//! ├────────────────────────────────────────────────────────────┤
//! │                                                            │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐            │
//! │  │  Manifest  │  │ Structure  │  │   Stream   │            │
//! │  │   Parser   │  │ Validator  │  │  Selector  │            │
//! │  └─────┬──────┘  └─────┬──────┘  └─────┬──────┘            │
//! │        │               │               │                   │
//! │        └───────────────┼───────────────┘                   │
//! │                        │                                   │
//! │   ┌────────────┐ ┌─────┴──────┐ ┌─────────────┐            │
//! │   │  Manifest  │ │  Playback  │ │   Decoder   │            │
//! │   │  Fetcher   ├─┤  Session   ├─┤    Sink     │ (external) │
//! │   └────────────┘ └─────┬──────┘ └─────────────┘            │
//! │                        │                                   │
//! │                  ┌─────┴──────┐                            │
//! │                  │ Fault Log  │                            │
//! │                  └────────────┘                            │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod decoder;
pub mod error;
pub mod faults;
pub mod fetch;
pub mod manifest;
pub mod select;
pub mod session;
pub mod types;
pub mod validate;

pub use decoder::{DecoderEvent, DecoderSink};
pub use error::{Error, Result};
pub use faults::{FaultCounters, FaultFamily, FaultLog, FaultRecord};
pub use fetch::{AuthProvider, HttpManifestFetcher, ManifestFetcher, NoAuth};
pub use manifest::{ManifestDocument, ManifestKind, SegmentRef, VariantRef};
pub use select::{list_tiers, select_by_index, select_default, BandwidthEstimator};
pub use session::{PlaybackSession, SelectedTier};
pub use types::{PlayerConfig, PlayerState, Profile, Resolution, SessionId, StreamId};
pub use validate::{validate, ValidationResult, VariantCheck};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Cineview Player initialized");
}
