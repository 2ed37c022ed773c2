//! Decoder sink boundary
//!
//! The platform's decode/render surface is an external collaborator. The
//! controller attaches a media playlist URL to it and consumes a small closed
//! set of typed events; it never reaches into the decode pipeline itself.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Events a decoder sink reports back to the controller.
///
/// Delivered by explicit message passing: the integration layer forwards each
/// event to [`PlaybackSession::handle_decoder_event`](crate::session::PlaybackSession::handle_decoder_event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DecoderEvent {
    /// Attachment succeeded, the sink is streaming
    Ready,
    /// Decode pipeline fault; the sink itself decides fatality
    Fault { is_fatal: bool, detail: String },
    /// The sink stopped on its own (end of stream or external teardown)
    Stopped,
}

/// Platform media decode/render surface.
///
/// The controller depends only on this minimal contract, not on any
/// particular decoder implementation.
#[async_trait]
pub trait DecoderSink: Send + Sync {
    /// Point the sink at a media playlist and begin streaming
    async fn attach(&self, media_playlist_url: &Url) -> Result<()>;

    /// Release the attachment. Must be safe to call repeatedly and without a
    /// prior attach.
    async fn detach(&self);

    /// Decoder-internal recovery for a non-fatal pipeline fault; no manifest
    /// re-fetch is involved
    async fn recover(&self) -> Result<()>;
}
