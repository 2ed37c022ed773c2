//! Manifest model and parsing
//!
//! A manifest is one M3U8 document: either a master playlist referencing
//! quality variants, or a media playlist referencing playable segments.
//! Documents are immutable once parsed and may be shared freely.

mod parser;

pub use parser::parse;

use crate::error::{Error, Result};
use crate::types::Resolution;
use serde::{Deserialize, Serialize};
use url::Url;

/// Manifest shape classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestKind {
    /// References quality variants, no segments
    Master,
    /// References playable segments
    Media,
    /// Matches neither shape; never handed to selection or playback
    Unknown,
}

/// One quality tier inside a master playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRef {
    /// Bits per second, 0 when the attribute is absent
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    /// Comma-list from the CODECS attribute, surrounding quotes stripped
    pub codecs: Option<String>,
    /// URI line following the variant's attribute line, as written in the
    /// manifest (absolute or relative)
    pub uri: String,
}

/// One playable chunk inside a media playlist.
///
/// Playback order is the declaration order; sequence numbers are implicit
/// via position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub uri: String,
    /// Seconds, from the preceding duration tag
    pub duration: f64,
}

/// Parsed form of one M3U8 document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub kind: ManifestKind,
    pub version: Option<u32>,
    /// Present only for media playlists
    pub target_duration: Option<u64>,
    pub variants: Vec<VariantRef>,
    pub segments: Vec<SegmentRef>,
}

impl ManifestDocument {
    /// Total declared duration of a media playlist, in seconds
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

/// Quick content sniff for diagnostics: does this text even claim to be an
/// extended M3U playlist?
pub fn looks_like_playlist(content: &str) -> bool {
    content.trim_start().starts_with("#EXTM3U")
}

/// Resolve a manifest-relative reference against the URL of the manifest it
/// appeared in.
///
/// Descending master -> variant -> segment, each level resolves against the
/// fetching manifest's own URL, never the master's.
pub fn resolve_reference(base: &Url, reference: &str) -> Result<Url> {
    base.join(reference)
        .map_err(|e| Error::MalformedManifest(format!("invalid URI '{reference}': {e}")))
}
