//! Stream selection
//!
//! Static tier selection over a validated master playlist. True adaptive
//! downshift is an extension point: the bandwidth estimator records what a
//! future policy would need, but nothing here re-selects on its own.

use crate::error::{Error, Result};
use crate::manifest::{ManifestDocument, ManifestKind, VariantRef};
use std::time::Duration;
use tracing::debug;

/// Expose the available quality tiers in declaration order.
///
/// Only master documents have tiers; anything else never reaches selection.
pub fn list_tiers(master: &ManifestDocument) -> Result<&[VariantRef]> {
    if master.kind != ManifestKind::Master {
        return Err(Error::MalformedManifest(format!(
            "tier listing requires a master playlist, got {:?}",
            master.kind
        )));
    }
    Ok(&master.variants)
}

/// Default policy: highest bandwidth wins, first-declared wins ties
pub fn select_default(tiers: &[VariantRef]) -> Option<&VariantRef> {
    // max_by_key returns the last maximum; scan manually to keep the
    // first-declared tie winner
    let mut best: Option<&VariantRef> = None;
    for tier in tiers {
        match best {
            Some(current) if tier.bandwidth <= current.bandwidth => {}
            _ => best = Some(tier),
        }
    }
    best
}

/// Manual tier override by position
pub fn select_by_index(tiers: &[VariantRef], index: usize) -> Result<&VariantRef> {
    tiers.get(index).ok_or(Error::OutOfRange {
        index,
        len: tiers.len(),
    })
}

/// EWMA throughput estimator fed by segment fetch measurements
#[derive(Debug, Default)]
pub struct BandwidthEstimator {
    estimate_bps: u64,
}

impl BandwidthEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one transfer measurement
    pub fn record_measurement(&mut self, bytes: usize, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let sample = ((bytes as f64 * 8.0) / secs) as u64;

        if self.estimate_bps == 0 {
            self.estimate_bps = sample;
        } else {
            // EWMA with alpha = 0.2
            self.estimate_bps =
                ((self.estimate_bps as f64 * 0.8) + (sample as f64 * 0.2)) as u64;
        }

        debug!(
            bytes,
            elapsed_ms = elapsed.as_millis(),
            sample_mbps = sample as f64 / 1_000_000.0,
            estimate_mbps = self.estimate_bps as f64 / 1_000_000.0,
            "Bandwidth measurement recorded"
        );
    }

    /// Current throughput estimate in bits per second, 0 before any sample
    pub fn estimate_bps(&self) -> u64 {
        self.estimate_bps
    }
}
