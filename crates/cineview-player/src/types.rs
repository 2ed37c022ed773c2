//! Core types for the playback controller

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque key identifying a logical video asset.
///
/// Supplied by the caller; every playlist and segment URL is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// A stream id must be non-empty; surrounding whitespace is rejected
    /// rather than silently trimmed so derived URLs stay predictable.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() || id.trim() != id {
            return None;
        }
        Some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery profile selecting which rendition ladder the origin serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Profile {
    Web,
    Mobile,
}

impl Profile {
    /// Path component used in origin URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Web => "web",
            Profile::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse a `WIDTHxHEIGHT` attribute value
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.split_once(['x', 'X'])?;
        Some(Self {
            width: w.trim().parse().ok()?,
            height: h.trim().parse().ok()?,
        })
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Player state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    /// Initial state, no content requested
    Idle,
    /// Fetching and parsing the master playlist
    Resolving,
    /// Pre-flight structure check of the variant ladder
    Validating,
    /// Default tier selected, waiting on decoder attachment
    Attaching,
    /// Decoder is streaming segments
    Playing,
    /// Non-fatal fault hit, bounded retry in progress
    Recovering,
    /// Terminal: unrecoverable error, see `last_error`
    Failed,
    /// Terminal: caller stopped the session, decoder released
    Stopped,
}

impl PlayerState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, target),
            // From Idle
            (Idle, Resolving) | (Idle, Stopped) |
            // From Resolving
            (Resolving, Validating) | (Resolving, Attaching) | (Resolving, Failed) | (Resolving, Stopped) |
            // From Validating
            (Validating, Attaching) | (Validating, Failed) | (Validating, Stopped) |
            // From Attaching
            (Attaching, Playing) | (Attaching, Recovering) | (Attaching, Failed) | (Attaching, Stopped) |
            // From Playing
            (Playing, Attaching) | (Playing, Recovering) | (Playing, Failed) | (Playing, Stopped) |
            // From Recovering
            (Recovering, Playing) | (Recovering, Failed) | (Recovering, Stopped) |
            // From Failed (explicit fresh start only)
            (Failed, Resolving)
        )
    }

    /// Terminal states accept no further decoder events
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerState::Failed | PlayerState::Stopped)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Resolving => write!(f, "resolving"),
            PlayerState::Validating => write!(f, "validating"),
            PlayerState::Attaching => write!(f, "attaching"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Recovering => write!(f, "recovering"),
            PlayerState::Failed => write!(f, "failed"),
            PlayerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Bounded retry budget for network faults
    pub max_network_retries: u32,
    /// Bounded re-attachment budget for one recovery episode
    pub max_recovery_attempts: u32,
    /// Fixed delay between retry attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Run the structure validator before first playback
    pub validate_before_playback: bool,
    /// Number of fault records retained for observability
    pub fault_log_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_network_retries: 3,
            max_recovery_attempts: 3,
            retry_delay_ms: 1_000,
            validate_before_playback: true,
            fault_log_capacity: 64,
        }
    }
}
