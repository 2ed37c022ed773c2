//! Playback session - the controller state machine
//!
//! Orchestrates fetch -> parse -> validate -> select -> decoder attachment
//! and owns the fault classification and retry policy. All mutation of the
//! session happens here; collaborators only answer questions.

use crate::decoder::{DecoderEvent, DecoderSink};
use crate::error::{Error, Result};
use crate::faults::{FaultCounters, FaultFamily, FaultLog, FaultRecord};
use crate::fetch::{master_playlist_url, ManifestFetcher};
use crate::manifest::{self, ManifestDocument, ManifestKind, SegmentRef, VariantRef};
use crate::select::{select_by_index, select_default, BandwidthEstimator};
use crate::types::{PlayerConfig, PlayerState, Profile, SessionId, StreamId};
use crate::validate::{validate, ValidationResult};
use bytes::Bytes;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Master playlist together with the URL it was fetched from, kept for
/// resolving variant references
#[derive(Debug, Clone)]
struct MasterContext {
    doc: Arc<ManifestDocument>,
    url: Url,
}

/// Currently selected quality tier
#[derive(Debug, Clone)]
pub struct SelectedTier {
    pub index: usize,
    pub variant: VariantRef,
    /// Variant URI resolved against the master playlist's URL
    pub media_url: Url,
}

/// Playback session managing a single stream
pub struct PlaybackSession {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    config: PlayerConfig,
    /// Content origin all stream URLs derive from
    origin: Url,
    /// Manifest/segment retrieval
    fetcher: Arc<dyn ManifestFetcher>,
    /// Platform decode/render surface
    decoder: Arc<dyn DecoderSink>,
    /// Current player state
    state: RwLock<PlayerState>,
    /// State change broadcaster
    state_tx: watch::Sender<PlayerState>,
    /// Stream requested by the caller
    stream_id: RwLock<Option<StreamId>>,
    /// Master playlist of the active attempt
    master: RwLock<Option<MasterContext>>,
    /// Pre-flight validation outcome, kept for diagnostics
    validation: RwLock<Option<ValidationResult>>,
    /// Currently selected tier
    selected: RwLock<Option<SelectedTier>>,
    /// Terminal error, observable by the caller
    last_error: RwLock<Option<Error>>,
    /// Fault history and counters
    faults: Mutex<FaultLog>,
    /// Throughput estimate fed by segment fetches
    bandwidth: Mutex<BandwidthEstimator>,
    /// Retry timer owned by the Recovering state
    retry_timer: Mutex<Option<AbortHandle>>,
    /// Re-attachment attempts in the current Recovering episode
    recover_attempts: AtomicU32,
    /// Bumped by stop(); results from an older generation are discarded
    generation: AtomicU64,
    /// Self-reference for the retry timer task
    weak: Weak<PlaybackSession>,
}

impl PlaybackSession {
    /// Create a new session bound to an origin, a fetcher, and a decoder sink
    pub fn new(
        config: PlayerConfig,
        origin: Url,
        fetcher: Arc<dyn ManifestFetcher>,
        decoder: Arc<dyn DecoderSink>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(PlayerState::Idle);
        let fault_log_capacity = config.fault_log_capacity;

        Arc::new_cyclic(|weak| Self {
            id: SessionId::new(),
            config,
            origin,
            fetcher,
            decoder,
            state: RwLock::new(PlayerState::Idle),
            state_tx,
            stream_id: RwLock::new(None),
            master: RwLock::new(None),
            validation: RwLock::new(None),
            selected: RwLock::new(None),
            last_error: RwLock::new(None),
            faults: Mutex::new(FaultLog::new(fault_log_capacity)),
            bandwidth: Mutex::new(BandwidthEstimator::new()),
            retry_timer: Mutex::new(None),
            recover_attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            weak: weak.clone(),
        })
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current state
    pub async fn state(&self) -> PlayerState {
        *self.state.read().await
    }

    /// Subscribe to state changes for UI binding
    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    /// Terminal error of the last failed attempt, if any
    pub async fn last_error(&self) -> Option<Error> {
        self.last_error.read().await.clone()
    }

    /// Recorded fault history, oldest first
    pub async fn fault_history(&self) -> Vec<FaultRecord> {
        self.faults.lock().await.records().cloned().collect()
    }

    /// Current per-family fault counters
    pub async fn fault_counters(&self) -> FaultCounters {
        self.faults.lock().await.counters()
    }

    /// Stream requested by the active attempt
    pub async fn stream_id(&self) -> Option<StreamId> {
        self.stream_id.read().await.clone()
    }

    /// Outcome of the pre-flight validation, when it ran
    pub async fn validation_report(&self) -> Option<ValidationResult> {
        self.validation.read().await.clone()
    }

    /// Currently selected tier
    pub async fn selected_tier(&self) -> Option<SelectedTier> {
        self.selected.read().await.clone()
    }

    /// Throughput estimate in bits per second, 0 before any segment fetch
    pub async fn bandwidth_estimate_bps(&self) -> u64 {
        self.bandwidth.lock().await.estimate_bps()
    }

    /// Quality tiers of the resolved master playlist, declaration order
    pub async fn list_available_tiers(&self) -> Result<Vec<VariantRef>> {
        let master = self.master.read().await;
        match master.as_ref() {
            Some(ctx) => Ok(ctx.doc.variants.clone()),
            None => Err(self.invalid_state().await),
        }
    }

    /// Begin playback of a stream.
    ///
    /// Valid from `Idle` or from a terminal `Failed` session (a fresh
    /// attempt); any other state rejects the call rather than racing two
    /// attachment sequences against one decoder.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn start(&self, stream_id: StreamId, profile: Profile) -> Result<()> {
        if self.transition(PlayerState::Resolving).await.is_err() {
            // A second start while one is in flight is rejected, never raced
            return Err(self.invalid_state().await);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        self.recover_attempts.store(0, Ordering::SeqCst);

        *self.last_error.write().await = None;
        *self.validation.write().await = None;
        *self.selected.write().await = None;
        *self.master.write().await = None;
        *self.stream_id.write().await = Some(stream_id.clone());

        info!(stream = %stream_id, %profile, "Resolving master playlist");

        let master_url = match master_playlist_url(&self.origin, profile, &stream_id) {
            Ok(url) => url,
            Err(e) => return self.fail(e).await,
        };

        // The initial resolve is not retried: a missing asset should surface
        // as a failure, not hide behind backoff.
        let raw = self.fetcher.fetch_manifest(&master_url).await;
        if self.is_stale(generation).await {
            debug!("Discarding master playlist result for stopped session");
            return Ok(());
        }
        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                self.record_fault(FaultFamily::Network, e.to_string()).await;
                return self.fail(e).await;
            }
        };

        let doc = match manifest::parse(&raw) {
            Ok(doc) => doc,
            Err(e) => return self.fail(e).await,
        };
        if doc.kind != ManifestKind::Master {
            return self
                .fail(Error::MalformedManifest(format!(
                    "expected master playlist, parsed {:?}",
                    doc.kind
                )))
                .await;
        }

        let master = MasterContext {
            doc: Arc::new(doc),
            url: master_url,
        };
        *self.master.write().await = Some(master.clone());

        if self.config.validate_before_playback {
            if self.transition(PlayerState::Validating).await.is_err() {
                debug!("Resolve raced by stop, abandoning attempt");
                return Ok(());
            }

            let report = validate(&master.doc, &master.url, Arc::clone(&self.fetcher)).await;
            if self.is_stale(generation).await {
                debug!("Discarding validation result for stopped session");
                return Ok(());
            }

            let valid = report.valid;
            *self.validation.write().await = Some(report);
            if !valid {
                return self.fail(Error::NoUsableVariant).await;
            }
        }

        if self.transition(PlayerState::Attaching).await.is_err() {
            debug!("Validation raced by stop, abandoning attempt");
            return Ok(());
        }

        let Some(default) = select_default(&master.doc.variants) else {
            return self.fail(Error::NoUsableVariant).await;
        };
        let index = master
            .doc
            .variants
            .iter()
            .position(|v| v == default)
            .unwrap_or(0);
        let tier = default.clone();

        self.attach_tier(generation, index, tier, &master).await
    }

    /// Stop the session. Valid at any point, idempotent, and race-safe: any
    /// in-flight result arriving afterwards is discarded, never applied.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_retry_timer().await;

        {
            let mut state = self.state.write().await;
            if *state == PlayerState::Stopped {
                return;
            }
            let from = *state;
            *state = PlayerState::Stopped;
            let _ = self.state_tx.send(PlayerState::Stopped);
            info!(%from, "Session stopped");
        }

        // Guaranteed release on every exit path
        self.decoder.detach().await;
    }

    /// Manual quality override. Valid while attached or attaching; the new
    /// tier's media playlist replaces the current attachment.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn select_tier(&self, index: usize) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);

        let master = {
            let guard = self.master.read().await;
            match guard.as_ref() {
                Some(ctx) => ctx.clone(),
                None => return Err(self.invalid_state().await),
            }
        };

        let tier = select_by_index(&master.doc.variants, index)?.clone();

        match self.state().await {
            PlayerState::Attaching => {}
            PlayerState::Playing => {
                self.transition(PlayerState::Attaching).await?;
            }
            _ => return Err(self.invalid_state().await),
        }

        self.cancel_retry_timer().await;
        self.decoder.detach().await;
        self.attach_tier(generation, index, tier, &master).await
    }

    /// Feed one decoder-reported event through the state machine
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn handle_decoder_event(&self, event: DecoderEvent) {
        let state = self.state().await;
        if state.is_terminal() {
            debug!(?event, %state, "Discarding decoder event in terminal state");
            return;
        }

        let attempts_made = self.recover_attempts.load(Ordering::SeqCst);
        let plan = plan_transition(state, &event, attempts_made, self.config.max_recovery_attempts);

        for effect in plan.effects {
            match effect {
                Effect::RecordFault { family, detail } => {
                    self.record_fault(family, detail).await;
                }
                Effect::SetLastError(e) => {
                    *self.last_error.write().await = Some(e);
                }
                Effect::CancelRetryTimer => self.cancel_retry_timer().await,
                Effect::DetachDecoder => self.decoder.detach().await,
                Effect::RecoverDecoder => {
                    // Decoder-internal recovery; no manifest re-fetch
                    if let Err(e) = self.decoder.recover().await {
                        warn!(error = %e, "Decoder recovery failed, re-attaching");
                        self.enter_recovering().await;
                        return;
                    }
                }
                Effect::ScheduleReattach => self.schedule_reattach().await,
            }
        }

        if let Some(next) = plan.next {
            if next == PlayerState::Playing {
                self.recover_attempts.store(0, Ordering::SeqCst);
            }
            if let Err(e) = self.transition(next).await {
                debug!(error = %e, "Dropping transition raced by stop");
            }
        }
    }

    /// Fetch one media segment of the selected tier, applying the bounded
    /// network retry policy. Segment bytes go to the decoder sink untouched.
    #[instrument(skip(self, segment), fields(session_id = %self.id, uri = %segment.uri))]
    pub async fn fetch_segment(&self, segment: &SegmentRef) -> Result<Bytes> {
        let generation = self.generation.load(Ordering::SeqCst);

        let media_url = {
            let selected = self.selected.read().await;
            match selected.as_ref() {
                Some(tier) => tier.media_url.clone(),
                None => return Err(self.invalid_state().await),
            }
        };
        // Segment references resolve against the media playlist's URL, not
        // the master's
        let url = manifest::resolve_reference(&media_url, &segment.uri)?;

        let mut attempts = 0u32;
        loop {
            let started = Instant::now();
            match self.fetcher.fetch_segment(&url).await {
                Ok(data) => {
                    self.bandwidth
                        .lock()
                        .await
                        .record_measurement(data.len(), started.elapsed());
                    return Ok(data);
                }
                Err(e) => {
                    if self.is_stale(generation).await {
                        return Err(e);
                    }
                    attempts += 1;
                    let network_count =
                        self.record_fault(FaultFamily::Network, e.to_string()).await;

                    if attempts > self.config.max_network_retries {
                        let exhausted = Error::RetriesExhausted {
                            attempts,
                            detail: e.to_string(),
                        };
                        let _ = self.fail(exhausted.clone()).await;
                        return Err(exhausted);
                    }

                    debug!(
                        attempts,
                        network_count,
                        delay_ms = self.config.retry_delay_ms,
                        "Segment fetch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                    if self.is_stale(generation).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Transition to a new state, enforcing the state machine table
    async fn transition(&self, next: PlayerState) -> Result<()> {
        let from = {
            let mut state = self.state.write().await;
            if !state.can_transition_to(next) {
                return Err(Error::InvalidTransition {
                    from: state.to_string(),
                    to: next.to_string(),
                });
            }
            let from = *state;
            *state = next;
            from
        };

        let _ = self.state_tx.send(next);
        info!(%from, to = %next, "State transition");
        Ok(())
    }

    /// True when the result in hand belongs to a stopped or superseded attempt
    async fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
            || self.state.read().await.is_terminal()
    }

    async fn invalid_state(&self) -> Error {
        Error::InvalidState {
            state: self.state().await.to_string(),
        }
    }

    async fn record_fault(&self, family: FaultFamily, detail: String) -> u32 {
        self.faults.lock().await.record(family, detail)
    }

    /// Terminal failure: set the observable error, release the decoder, and
    /// surface the error to the caller. A session in `Failed` accepts a
    /// fresh `start()`.
    async fn fail(&self, error: Error) -> Result<()> {
        warn!(code = error.error_code(), error = %error, "Playback failed");
        self.cancel_retry_timer().await;
        *self.last_error.write().await = Some(error.clone());

        {
            let mut state = self.state.write().await;
            if state.is_terminal() {
                // Raced by stop(); keep the terminal state already reached
                return Err(error);
            }
            *state = PlayerState::Failed;
        }
        let _ = self.state_tx.send(PlayerState::Failed);

        self.decoder.detach().await;
        Err(error)
    }

    /// Hand the tier's media playlist to the decoder and classify the result
    async fn attach_tier(
        &self,
        generation: u64,
        index: usize,
        tier: VariantRef,
        master: &MasterContext,
    ) -> Result<()> {
        let media_url = match manifest::resolve_reference(&master.url, &tier.uri) {
            Ok(url) => url,
            Err(e) => return self.fail(e).await,
        };

        info!(
            index,
            bandwidth = tier.bandwidth,
            url = %media_url,
            "Attaching tier to decoder"
        );
        *self.selected.write().await = Some(SelectedTier {
            index,
            variant: tier,
            media_url: media_url.clone(),
        });

        let attached = self.decoder.attach(&media_url).await;
        if self.is_stale(generation).await {
            // Late attach after stop: the handle must not outlive the session
            debug!("Releasing decoder attachment for stopped session");
            self.decoder.detach().await;
            return Ok(());
        }

        match attached {
            // Playing is entered on the decoder's ready event
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_fault(FaultFamily::Media, e.to_string()).await;
                if e.is_recoverable() {
                    self.enter_recovering().await;
                    Ok(())
                } else {
                    self.fail(e).await
                }
            }
        }
    }

    async fn enter_recovering(&self) {
        if self.state().await != PlayerState::Recovering {
            if let Err(e) = self.transition(PlayerState::Recovering).await {
                debug!(error = %e, "Cannot enter recovery");
                return;
            }
        }
        self.schedule_reattach().await;
    }

    /// Arm the Recovering retry timer. The timer is owned by the Recovering
    /// state: any transition out of it, and stop(), aborts the timer, so a
    /// stale retry can never fire into a later attempt.
    fn schedule_reattach(
        &self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let Some(session) = self.weak.upgrade() else {
                return;
            };
            let generation = self.generation.load(Ordering::SeqCst);
            let delay = Duration::from_millis(self.config.retry_delay_ms);

            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                session.retry_attach(generation).await;
            })
            .abort_handle();

            let mut timer = self.retry_timer.lock().await;
            if let Some(previous) = timer.replace(handle) {
                previous.abort();
            }
        })
    }

    async fn cancel_retry_timer(&self) {
        if let Some(handle) = self.retry_timer.lock().await.take() {
            handle.abort();
        }
    }

    /// One re-attachment attempt out of the Recovering state
    async fn retry_attach(&self, generation: u64) {
        if self.is_stale(generation).await || self.state().await != PlayerState::Recovering {
            debug!("Skipping stale recovery attempt");
            return;
        }

        let attempt = self.recover_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.config.max_recovery_attempts {
            let _ = self
                .fail(Error::RetriesExhausted {
                    attempts: attempt - 1,
                    detail: "recovery re-attachment budget exhausted".into(),
                })
                .await;
            return;
        }

        let selected = self.selected.read().await.clone();
        let Some(tier) = selected else {
            let _ = self.fail(self.invalid_state().await).await;
            return;
        };

        info!(attempt, url = %tier.media_url, "Recovery re-attachment");
        self.decoder.detach().await;
        let attached = self.decoder.attach(&tier.media_url).await;
        if self.is_stale(generation).await {
            self.decoder.detach().await;
            return;
        }

        match attached {
            // Ready event moves Recovering -> Playing
            Ok(()) => {}
            Err(e) => {
                self.record_fault(FaultFamily::Media, e.to_string()).await;
                if e.is_recoverable() {
                    self.schedule_reattach().await;
                } else {
                    let _ = self.fail(e).await;
                }
            }
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        // The timer task holds a strong reference while armed; abort it so a
        // dropped session cannot leave a sleeping retry behind.
        if let Ok(mut timer) = self.retry_timer.try_lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

// ----------------------------------------------------------------------
// Pure transition planning
// ----------------------------------------------------------------------

/// Side effects the session executes after planning a transition
#[derive(Debug)]
enum Effect {
    RecordFault { family: FaultFamily, detail: String },
    SetLastError(Error),
    DetachDecoder,
    RecoverDecoder,
    ScheduleReattach,
    CancelRetryTimer,
}

#[derive(Debug)]
struct Plan {
    next: Option<PlayerState>,
    effects: Vec<Effect>,
}

impl Plan {
    fn stay() -> Self {
        Self {
            next: None,
            effects: Vec::new(),
        }
    }
}

/// Pure transition function: `(state, event, attempts) -> (state, effects)`.
///
/// No hidden captured state; the session executes the returned effects.
fn plan_transition(
    state: PlayerState,
    event: &DecoderEvent,
    attempts_made: u32,
    max_attempts: u32,
) -> Plan {
    use PlayerState::*;

    match (state, event) {
        // Attachment confirmed
        (Attaching | Recovering, DecoderEvent::Ready) => Plan {
            next: Some(Playing),
            effects: vec![Effect::CancelRetryTimer],
        },
        (Playing, DecoderEvent::Ready) => Plan::stay(),

        // Fatal media fault: no retry would make progress
        (
            Attaching | Playing | Recovering,
            DecoderEvent::Fault {
                is_fatal: true,
                detail,
            },
        ) => Plan {
            next: Some(Failed),
            effects: vec![
                Effect::RecordFault {
                    family: FaultFamily::Media,
                    detail: detail.clone(),
                },
                Effect::SetLastError(Error::DecodeFault {
                    fatal: true,
                    detail: detail.clone(),
                }),
                Effect::CancelRetryTimer,
                Effect::DetachDecoder,
            ],
        },

        // Non-fatal fault mid-playback: decoder-internal recovery, playback
        // continues
        (
            Playing,
            DecoderEvent::Fault {
                is_fatal: false,
                detail,
            },
        ) => Plan {
            next: None,
            effects: vec![
                Effect::RecordFault {
                    family: FaultFamily::Media,
                    detail: detail.clone(),
                },
                Effect::RecoverDecoder,
            ],
        },

        // Non-fatal fault while attaching: bounded re-attachment
        (
            Attaching,
            DecoderEvent::Fault {
                is_fatal: false,
                detail,
            },
        ) => Plan {
            next: Some(Recovering),
            effects: vec![
                Effect::RecordFault {
                    family: FaultFamily::Media,
                    detail: detail.clone(),
                },
                Effect::ScheduleReattach,
            ],
        },

        // Fault during recovery: keep retrying while budget remains
        (
            Recovering,
            DecoderEvent::Fault {
                is_fatal: false,
                detail,
            },
        ) => {
            if attempts_made < max_attempts {
                Plan {
                    next: None,
                    effects: vec![
                        Effect::RecordFault {
                            family: FaultFamily::Media,
                            detail: detail.clone(),
                        },
                        Effect::ScheduleReattach,
                    ],
                }
            } else {
                Plan {
                    next: Some(Failed),
                    effects: vec![
                        Effect::RecordFault {
                            family: FaultFamily::Media,
                            detail: detail.clone(),
                        },
                        Effect::SetLastError(Error::RetriesExhausted {
                            attempts: attempts_made,
                            detail: detail.clone(),
                        }),
                        Effect::CancelRetryTimer,
                        Effect::DetachDecoder,
                    ],
                }
            }
        }

        // The sink tore itself down: end of playback
        (_, DecoderEvent::Stopped) => Plan {
            next: Some(Stopped),
            effects: vec![Effect::CancelRetryTimer, Effect::DetachDecoder],
        },

        // Events with no attachment to speak of
        _ => Plan::stay(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault(fatal: bool) -> DecoderEvent {
        DecoderEvent::Fault {
            is_fatal: fatal,
            detail: "pipeline desync".into(),
        }
    }

    #[test]
    fn ready_confirms_attachment() {
        let plan = plan_transition(PlayerState::Attaching, &DecoderEvent::Ready, 0, 3);
        assert_eq!(plan.next, Some(PlayerState::Playing));

        let plan = plan_transition(PlayerState::Recovering, &DecoderEvent::Ready, 0, 3);
        assert_eq!(plan.next, Some(PlayerState::Playing));
    }

    #[test]
    fn fatal_fault_fails_immediately() {
        for state in [
            PlayerState::Attaching,
            PlayerState::Playing,
            PlayerState::Recovering,
        ] {
            let plan = plan_transition(state, &fault(true), 0, 3);
            assert_eq!(plan.next, Some(PlayerState::Failed), "{state}");
            assert!(plan
                .effects
                .iter()
                .any(|e| matches!(e, Effect::DetachDecoder)));
        }
    }

    #[test]
    fn non_fatal_fault_in_playback_recovers_in_place() {
        let plan = plan_transition(PlayerState::Playing, &fault(false), 0, 3);
        assert_eq!(plan.next, None);
        assert!(plan
            .effects
            .iter()
            .any(|e| matches!(e, Effect::RecoverDecoder)));
    }

    #[test]
    fn non_fatal_attach_fault_enters_recovery() {
        let plan = plan_transition(PlayerState::Attaching, &fault(false), 0, 3);
        assert_eq!(plan.next, Some(PlayerState::Recovering));
        assert!(plan
            .effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleReattach)));
    }

    #[test]
    fn recovery_budget_bounds_retries() {
        let plan = plan_transition(PlayerState::Recovering, &fault(false), 1, 3);
        assert_eq!(plan.next, None);

        let plan = plan_transition(PlayerState::Recovering, &fault(false), 3, 3);
        assert_eq!(plan.next, Some(PlayerState::Failed));
        assert!(plan
            .effects
            .iter()
            .any(|e| matches!(e, Effect::SetLastError(Error::RetriesExhausted { .. }))));
    }

    #[test]
    fn sink_stop_ends_playback() {
        let plan = plan_transition(PlayerState::Playing, &DecoderEvent::Stopped, 0, 3);
        assert_eq!(plan.next, Some(PlayerState::Stopped));
        assert!(plan
            .effects
            .iter()
            .any(|e| matches!(e, Effect::DetachDecoder)));
    }

    #[test]
    fn events_before_attachment_are_inert() {
        for state in [PlayerState::Idle, PlayerState::Resolving, PlayerState::Validating] {
            let plan = plan_transition(state, &DecoderEvent::Ready, 0, 3);
            assert_eq!(plan.next, None, "{state}");
            assert!(plan.effects.is_empty());
        }
    }

    #[test]
    fn every_fault_is_recorded() {
        for state in [
            PlayerState::Attaching,
            PlayerState::Playing,
            PlayerState::Recovering,
        ] {
            for fatal in [true, false] {
                let plan = plan_transition(state, &fault(fatal), 0, 3);
                assert!(
                    plan.effects
                        .iter()
                        .any(|e| matches!(e, Effect::RecordFault { .. })),
                    "{state} fatal={fatal}"
                );
            }
        }
    }
}
