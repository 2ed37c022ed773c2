//! Pre-flight manifest structure validation
//!
//! Probes every variant of a master playlist and reports which ones resolve
//! to playable segments. Advisory: skipping it saves a round of fetches, but
//! running it before first playback turns malformed-upstream manifests into
//! diagnoses instead of decoder errors.

use crate::error::Result;
use crate::fetch::ManifestFetcher;
use crate::manifest::{self, ManifestDocument, ManifestKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};
use url::Url;

/// Outcome of probing one variant's media playlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantCheck {
    /// Variant URI as declared in the master playlist
    pub uri: String,
    pub usable: bool,
    pub segment_count: usize,
    pub error: Option<String>,
}

/// Aggregated validation outcome, one check per variant in declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub checks: Vec<VariantCheck>,
}

/// Validate a master playlist by fetching and parsing every variant's media
/// playlist.
///
/// Per-variant failures are isolated: one variant failing to fetch or parse
/// never affects another's outcome. The probes run concurrently; they are
/// independent, side-effect-free reads.
#[instrument(skip(master, fetcher), fields(variants = master.variants.len()))]
pub async fn validate(
    master: &ManifestDocument,
    master_url: &Url,
    fetcher: Arc<dyn ManifestFetcher>,
) -> ValidationResult {
    if master.kind != ManifestKind::Master || master.variants.is_empty() {
        warn!(kind = ?master.kind, "Validation rejected non-master document");
        return ValidationResult {
            valid: false,
            checks: Vec::new(),
        };
    }

    let mut probes: JoinSet<(usize, VariantCheck)> = JoinSet::new();
    for (index, variant) in master.variants.iter().enumerate() {
        let uri = variant.uri.clone();
        let base = master_url.clone();
        let fetcher = Arc::clone(&fetcher);
        probes.spawn(async move {
            let check = probe_variant(&base, &uri, fetcher.as_ref()).await;
            (index, check)
        });
    }

    let mut checks: Vec<Option<VariantCheck>> = vec![None; master.variants.len()];
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((index, check)) => checks[index] = Some(check),
            Err(e) => warn!(error = %e, "Variant probe task failed"),
        }
    }

    // A panicked probe counts as an unusable variant, not a batch failure
    let checks: Vec<VariantCheck> = checks
        .into_iter()
        .enumerate()
        .map(|(index, check)| {
            check.unwrap_or_else(|| VariantCheck {
                uri: master.variants[index].uri.clone(),
                usable: false,
                segment_count: 0,
                error: Some("probe aborted".into()),
            })
        })
        .collect();

    let usable = checks.iter().filter(|c| c.usable).count();
    debug!(usable, total = checks.len(), "Validation complete");

    ValidationResult {
        valid: usable > 0,
        checks,
    }
}

/// A variant is usable when its media playlist parses to `Media` kind with at
/// least one segment
async fn probe_variant(base: &Url, uri: &str, fetcher: &dyn ManifestFetcher) -> VariantCheck {
    match probe(base, uri, fetcher).await {
        Ok(doc) => {
            let usable = doc.kind == ManifestKind::Media && !doc.segments.is_empty();
            VariantCheck {
                uri: uri.to_string(),
                usable,
                segment_count: doc.segments.len(),
                error: (!usable).then(|| format!("parsed as {:?} with no segments", doc.kind)),
            }
        }
        Err(e) => VariantCheck {
            uri: uri.to_string(),
            usable: false,
            segment_count: 0,
            error: Some(e.to_string()),
        },
    }
}

async fn probe(base: &Url, uri: &str, fetcher: &dyn ManifestFetcher) -> Result<ManifestDocument> {
    let url = manifest::resolve_reference(base, uri)?;
    let raw = fetcher.fetch_manifest(&url).await?;
    manifest::parse(&raw)
}
