//! Single-pass line-oriented M3U8 parser
//!
//! Tolerant by contract: unknown tags are skipped, malformed entries are
//! dropped rather than failing the document, CRLF input parses the same as
//! LF. Only empty input fails the call outright.

use super::{ManifestDocument, ManifestKind, SegmentRef, VariantRef};
use crate::error::{Error, Result};
use crate::types::Resolution;
use tracing::{debug, trace};

const TAG_VERSION: &str = "#EXT-X-VERSION:";
const TAG_TARGET_DURATION: &str = "#EXT-X-TARGETDURATION:";
const TAG_STREAM_INF: &str = "#EXT-X-STREAM-INF:";
const TAG_INF: &str = "#EXTINF:";

/// What the parser is waiting to associate with the next URI line.
///
/// A variant attribute line or a segment duration tag arms the pending slot;
/// the slot is cleared when a URI consumes it or another tag replaces it.
/// A slot still armed at a tag line or at end of input is a dangling entry
/// and is dropped.
#[derive(Debug)]
enum Pending {
    None,
    Variant(VariantAttrs),
    Segment(f64),
}

#[derive(Debug, Default)]
struct VariantAttrs {
    bandwidth: u64,
    resolution: Option<Resolution>,
    codecs: Option<String>,
}

/// Parse raw playlist text into a [`ManifestDocument`]
pub fn parse(raw: &str) -> Result<ManifestDocument> {
    if raw.trim().is_empty() {
        return Err(Error::MalformedManifest("empty manifest body".into()));
    }

    let mut version = None;
    let mut target_duration = None;
    let mut variants = Vec::new();
    let mut segments = Vec::new();
    let mut pending = Pending::None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('#') {
            // A variant's URI must immediately follow its attribute line;
            // any tag or comment in between orphans the declaration. A
            // pending segment duration survives interleaved tags.
            if matches!(pending, Pending::Variant(_)) {
                debug!("Dropping variant attribute line with no immediate URI");
                pending = Pending::None;
            }

            if let Some(payload) = line.strip_prefix(TAG_VERSION) {
                // Non-integer payload is non-fatal: leave version unset
                version = payload.trim().parse::<u32>().ok();
            } else if let Some(payload) = line.strip_prefix(TAG_TARGET_DURATION) {
                target_duration = payload.trim().parse::<u64>().ok();
            } else if let Some(payload) = line.strip_prefix(TAG_STREAM_INF) {
                pending = Pending::Variant(parse_variant_attrs(payload));
            } else if let Some(payload) = line.strip_prefix(TAG_INF) {
                // "#EXTINF:<duration>,[<title>]" - duration defaults to 0
                // when the payload does not parse
                let duration = payload
                    .split(',')
                    .next()
                    .and_then(|d| d.trim().parse::<f64>().ok())
                    .unwrap_or(0.0);
                pending = Pending::Segment(duration);
            } else {
                // Unknown tag: forward-compatible, never rejected
                trace!(tag = line, "Skipping unrecognized tag");
            }
        } else {
            // Bare URI line: associate with whatever is armed
            match std::mem::replace(&mut pending, Pending::None) {
                Pending::Variant(attrs) => variants.push(VariantRef {
                    bandwidth: attrs.bandwidth,
                    resolution: attrs.resolution,
                    codecs: attrs.codecs,
                    uri: line.to_string(),
                }),
                Pending::Segment(duration) => segments.push(SegmentRef {
                    uri: line.to_string(),
                    duration,
                }),
                // Orphan URI: no association to guess
                Pending::None => debug!(uri = line, "Ignoring URI with no preceding tag"),
            }
        }
    }

    let kind = classify(&variants, &segments);
    debug!(
        ?kind,
        variants = variants.len(),
        segments = segments.len(),
        "Manifest parsed"
    );

    Ok(ManifestDocument {
        kind,
        version,
        target_duration,
        variants,
        segments,
    })
}

/// Master iff it has variants and zero segments; media iff it has segments;
/// anything else is unknown. The three are mutually exclusive and exhaustive.
fn classify(variants: &[VariantRef], segments: &[SegmentRef]) -> ManifestKind {
    if !segments.is_empty() {
        ManifestKind::Media
    } else if !variants.is_empty() {
        ManifestKind::Master
    } else {
        ManifestKind::Unknown
    }
}

/// Parse a STREAM-INF attribute list: comma-separated KEY=VALUE pairs where
/// values may be quoted (commas inside quotes do not split).
fn parse_variant_attrs(payload: &str) -> VariantAttrs {
    let mut attrs = VariantAttrs::default();

    for pair in split_attr_list(payload) {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = strip_quotes(value.trim());

        match key.trim() {
            "BANDWIDTH" => attrs.bandwidth = value.parse().unwrap_or(0),
            "RESOLUTION" => attrs.resolution = Resolution::parse(value),
            "CODECS" => attrs.codecs = Some(value.to_string()),
            _ => {}
        }
    }

    attrs
}

/// Split on commas that are not inside a quoted value
fn split_attr_list(payload: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (idx, ch) in payload.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&payload[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&payload[start..]);
    parts
}

/// Strip exactly one pair of surrounding double quotes, if present
fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
