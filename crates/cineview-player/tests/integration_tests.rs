//! Integration tests for the playback controller
//!
//! Drive the full session state machine against in-memory fetcher and
//! decoder implementations plugged into the trait seams.

use async_trait::async_trait;
use bytes::Bytes;
use cineview_player::{
    DecoderEvent, DecoderSink, Error, FaultFamily, ManifestFetcher, PlaybackSession, PlayerConfig,
    PlayerState, Profile, Result, SegmentRef, StreamId,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeFetcher {
    manifests: Mutex<HashMap<String, String>>,
    segment_scripts: Mutex<HashMap<String, VecDeque<Result<Bytes>>>>,
    manifest_calls: AtomicUsize,
    delay_ms: u64,
}

impl FakeFetcher {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn slow(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay_ms,
            ..Self::default()
        })
    }

    fn put_manifest(&self, url: &str, body: &str) {
        self.manifests
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    fn script_segment(&self, url: &str, result: Result<Bytes>) {
        self.segment_scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
    }
}

#[async_trait]
impl ManifestFetcher for FakeFetcher {
    async fn fetch_manifest(&self, url: &Url) -> Result<String> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.manifests
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or(Error::FetchStatus {
                status: 404,
                body: "not found".into(),
            })
    }

    async fn fetch_segment(&self, url: &Url) -> Result<Bytes> {
        let scripted = self
            .segment_scripts
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(|queue| queue.pop_front());
        scripted.unwrap_or(Err(Error::FetchStatus {
            status: 404,
            body: "no segment".into(),
        }))
    }
}

#[derive(Default)]
struct FakeDecoder {
    attached: Mutex<Option<Url>>,
    attach_results: Mutex<VecDeque<Result<()>>>,
    attach_count: AtomicUsize,
    detach_count: AtomicUsize,
    recover_count: AtomicUsize,
}

impl FakeDecoder {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script_attach(&self, result: Result<()>) {
        self.attach_results.lock().unwrap().push_back(result);
    }

    fn attached_url(&self) -> Option<Url> {
        self.attached.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecoderSink for FakeDecoder {
    async fn attach(&self, media_playlist_url: &Url) -> Result<()> {
        self.attach_count.fetch_add(1, Ordering::SeqCst);
        if let Some(Err(e)) = self.attach_results.lock().unwrap().pop_front() {
            return Err(e);
        }
        *self.attached.lock().unwrap() = Some(media_playlist_url.clone());
        Ok(())
    }

    async fn detach(&self) {
        self.detach_count.fetch_add(1, Ordering::SeqCst);
        *self.attached.lock().unwrap() = None;
    }

    async fn recover(&self) -> Result<()> {
        self.recover_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

const MASTER_URL: &str = "https://origin.test/stream/web/movie-1";
const LOW_URL: &str = "https://origin.test/stream/web/movie-1/low.m3u8";
const HIGH_URL: &str = "https://origin.test/stream/web/movie-1/high.m3u8";

const MASTER_BODY: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\n\
movie-1/low.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720\n\
movie-1/high.m3u8\n";

const MEDIA_BODY: &str = "#EXTM3U\n\
#EXT-X-TARGETDURATION:6\n\
#EXTINF:6.0,\n\
seg-000.ts\n\
#EXTINF:6.0,\n\
seg-001.ts\n\
#EXT-X-ENDLIST\n";

fn origin() -> Url {
    Url::parse("https://origin.test/").unwrap()
}

fn stream() -> StreamId {
    StreamId::new("movie-1").unwrap()
}

fn quick_config() -> PlayerConfig {
    PlayerConfig {
        retry_delay_ms: 10,
        ..PlayerConfig::default()
    }
}

fn seed_catalog(fetcher: &FakeFetcher) {
    fetcher.put_manifest(MASTER_URL, MASTER_BODY);
    fetcher.put_manifest(LOW_URL, MEDIA_BODY);
    fetcher.put_manifest(HIGH_URL, MEDIA_BODY);
}

fn session_with(
    fetcher: Arc<FakeFetcher>,
    decoder: Arc<FakeDecoder>,
    config: PlayerConfig,
) -> Arc<PlaybackSession> {
    PlaybackSession::new(config, origin(), fetcher, decoder)
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn start_resolves_validates_and_attaches_best_tier() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher.clone(), decoder.clone(), quick_config());

    session.start(stream(), Profile::Web).await.unwrap();

    assert_eq!(session.state().await, PlayerState::Attaching);
    assert_eq!(decoder.attached_url().unwrap().as_str(), HIGH_URL);

    let report = session.validation_report().await.unwrap();
    assert!(report.valid);
    assert_eq!(report.checks.len(), 2);
    assert!(report.checks.iter().all(|c| c.usable && c.segment_count == 2));

    let tiers = session.list_available_tiers().await.unwrap();
    assert_eq!(tiers.len(), 2);
    assert_eq!(tiers[0].bandwidth, 800_000);

    let selected = session.selected_tier().await.unwrap();
    assert_eq!(selected.index, 1);
    assert_eq!(selected.variant.bandwidth, 2_000_000);

    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(session.state().await, PlayerState::Playing);
    assert!(session.last_error().await.is_none());
}

#[tokio::test]
async fn state_changes_are_broadcast() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder, quick_config());

    let mut rx = session.subscribe_state();
    session.start(stream(), Profile::Web).await.unwrap();

    assert_eq!(*rx.borrow_and_update(), PlayerState::Attaching);
    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(*rx.borrow_and_update(), PlayerState::Playing);
}

#[tokio::test]
async fn validation_can_be_skipped() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let config = PlayerConfig {
        validate_before_playback: false,
        ..quick_config()
    };
    let session = session_with(fetcher.clone(), decoder, config);

    session.start(stream(), Profile::Web).await.unwrap();

    // Only the master playlist is fetched when validation is off
    assert_eq!(fetcher.manifest_calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state().await, PlayerState::Attaching);
    assert!(session.validation_report().await.is_none());
}

// =============================================================================
// Failure paths
// =============================================================================

#[tokio::test]
async fn missing_master_fails_without_attachment() {
    let fetcher = FakeFetcher::new(); // empty catalog: every fetch is a 404
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder.clone(), quick_config());

    let err = session.start(stream(), Profile::Web).await.unwrap_err();

    assert!(matches!(err, Error::FetchStatus { status: 404, .. }));
    assert_eq!(session.state().await, PlayerState::Failed);
    assert!(session
        .last_error()
        .await
        .unwrap()
        .to_string()
        .contains("404"));
    // No decoder attachment ever occurred
    assert_eq!(decoder.attach_count.load(Ordering::SeqCst), 0);

    let history = session.fault_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].family, FaultFamily::Network);
}

#[tokio::test]
async fn media_playlist_at_master_location_is_malformed() {
    let fetcher = FakeFetcher::new();
    fetcher.put_manifest(MASTER_URL, MEDIA_BODY);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder, quick_config());

    let err = session.start(stream(), Profile::Web).await.unwrap_err();

    assert!(matches!(err, Error::MalformedManifest(_)));
    assert_eq!(session.state().await, PlayerState::Failed);
}

#[tokio::test]
async fn one_broken_variant_does_not_fail_validation() {
    let fetcher = FakeFetcher::new();
    fetcher.put_manifest(MASTER_URL, MASTER_BODY);
    // low.m3u8 missing entirely; high.m3u8 healthy
    fetcher.put_manifest(HIGH_URL, MEDIA_BODY);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder, quick_config());

    session.start(stream(), Profile::Web).await.unwrap();

    let report = session.validation_report().await.unwrap();
    assert!(report.valid);
    assert!(!report.checks[0].usable);
    assert!(report.checks[0].error.as_ref().unwrap().contains("404"));
    assert!(report.checks[1].usable);
    assert_eq!(session.state().await, PlayerState::Attaching);
}

#[tokio::test]
async fn all_variants_broken_is_no_usable_variant() {
    let fetcher = FakeFetcher::new();
    fetcher.put_manifest(MASTER_URL, MASTER_BODY);
    // Both media playlists parse to Unknown
    fetcher.put_manifest(LOW_URL, "#EXTM3U\n#EXT-X-VERSION:3\n");
    fetcher.put_manifest(HIGH_URL, "#EXTM3U\n#EXT-X-VERSION:3\n");
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder.clone(), quick_config());

    let err = session.start(stream(), Profile::Web).await.unwrap_err();

    assert!(matches!(err, Error::NoUsableVariant));
    assert_eq!(session.state().await, PlayerState::Failed);
    assert_eq!(decoder.attach_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_session_accepts_a_fresh_start() {
    let fetcher = FakeFetcher::new();
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher.clone(), decoder, quick_config());

    assert!(session.start(stream(), Profile::Web).await.is_err());
    assert_eq!(session.state().await, PlayerState::Failed);

    seed_catalog(&fetcher);
    session.start(stream(), Profile::Web).await.unwrap();
    assert_eq!(session.state().await, PlayerState::Attaching);
    assert!(session.last_error().await.is_none());
}

// =============================================================================
// Stop semantics
// =============================================================================

#[tokio::test]
async fn stop_during_resolve_discards_the_late_result() {
    let fetcher = FakeFetcher::slow(100);
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder.clone(), quick_config());

    let running = session.clone();
    let start_task =
        tokio::spawn(async move { running.start(stream(), Profile::Web).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.state().await, PlayerState::Resolving);
    session.stop().await;
    assert_eq!(session.state().await, PlayerState::Stopped);

    // The fetch resolves afterwards; its result must not resurrect the session
    start_task.await.unwrap().unwrap();
    assert_eq!(session.state().await, PlayerState::Stopped);
    assert_eq!(decoder.attach_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder.clone(), quick_config());

    session.start(stream(), Profile::Web).await.unwrap();
    session.stop().await;
    session.stop().await;

    assert_eq!(session.state().await, PlayerState::Stopped);
    assert!(decoder.attached_url().is_none());
}

#[tokio::test]
async fn second_start_while_resolving_is_rejected() {
    let fetcher = FakeFetcher::slow(100);
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder, quick_config());

    let running = session.clone();
    let start_task =
        tokio::spawn(async move { running.start(stream(), Profile::Web).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let err = session.start(stream(), Profile::Web).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));

    start_task.await.unwrap().unwrap();
}

// =============================================================================
// Decoder fault handling
// =============================================================================

async fn playing_session() -> (Arc<FakeFetcher>, Arc<FakeDecoder>, Arc<PlaybackSession>) {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher.clone(), decoder.clone(), quick_config());
    session.start(stream(), Profile::Web).await.unwrap();
    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(session.state().await, PlayerState::Playing);
    (fetcher, decoder, session)
}

#[tokio::test]
async fn fatal_decode_fault_is_terminal() {
    let (_fetcher, decoder, session) = playing_session().await;

    session
        .handle_decoder_event(DecoderEvent::Fault {
            is_fatal: true,
            detail: "codec reset loop".into(),
        })
        .await;

    assert_eq!(session.state().await, PlayerState::Failed);
    assert!(matches!(
        session.last_error().await,
        Some(Error::DecodeFault { fatal: true, .. })
    ));
    assert!(decoder.attached_url().is_none());
    assert_eq!(session.fault_counters().await.media, 1);
}

#[tokio::test]
async fn non_fatal_fault_recovers_in_place() {
    let (_fetcher, decoder, session) = playing_session().await;

    session
        .handle_decoder_event(DecoderEvent::Fault {
            is_fatal: false,
            detail: "frame drop burst".into(),
        })
        .await;

    assert_eq!(session.state().await, PlayerState::Playing);
    assert_eq!(decoder.recover_count.load(Ordering::SeqCst), 1);
    assert_eq!(session.fault_counters().await.media, 1);
}

#[tokio::test]
async fn non_fatal_attach_error_retries_then_plays() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    decoder.script_attach(Err(Error::DecodeFault {
        fatal: false,
        detail: "sink busy".into(),
    }));
    let session = session_with(fetcher, decoder.clone(), quick_config());

    session.start(stream(), Profile::Web).await.unwrap();
    assert_eq!(session.state().await, PlayerState::Recovering);

    // Retry timer fires, second attach succeeds
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(decoder.attach_count.load(Ordering::SeqCst), 2);
    assert_eq!(decoder.attached_url().unwrap().as_str(), HIGH_URL);

    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(session.state().await, PlayerState::Playing);
}

#[tokio::test]
async fn stop_cancels_the_recovery_timer() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    decoder.script_attach(Err(Error::DecodeFault {
        fatal: false,
        detail: "sink busy".into(),
    }));
    let config = PlayerConfig {
        retry_delay_ms: 30,
        ..quick_config()
    };
    let session = session_with(fetcher, decoder.clone(), config);

    session.start(stream(), Profile::Web).await.unwrap();
    assert_eq!(session.state().await, PlayerState::Recovering);
    session.stop().await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    // The armed retry never fired into the stopped session
    assert_eq!(decoder.attach_count.load(Ordering::SeqCst), 1);
    assert_eq!(session.state().await, PlayerState::Stopped);
}

#[tokio::test]
async fn decoder_stop_event_ends_the_session() {
    let (_fetcher, decoder, session) = playing_session().await;

    session.handle_decoder_event(DecoderEvent::Stopped).await;

    assert_eq!(session.state().await, PlayerState::Stopped);
    assert!(decoder.attached_url().is_none());

    // Late events after the terminal state are inert
    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(session.state().await, PlayerState::Stopped);
}

// =============================================================================
// Tier override
// =============================================================================

#[tokio::test]
async fn manual_tier_override_reattaches() {
    let (_fetcher, decoder, session) = playing_session().await;

    session.select_tier(0).await.unwrap();
    assert_eq!(session.state().await, PlayerState::Attaching);
    assert_eq!(decoder.attached_url().unwrap().as_str(), LOW_URL);
    assert_eq!(session.selected_tier().await.unwrap().index, 0);

    session.handle_decoder_event(DecoderEvent::Ready).await;
    assert_eq!(session.state().await, PlayerState::Playing);
}

#[tokio::test]
async fn tier_override_bounds_and_state_checks() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let session = session_with(fetcher, decoder, quick_config());

    // Before any resolution there is nothing to select from
    assert!(matches!(
        session.select_tier(0).await.unwrap_err(),
        Error::InvalidState { .. }
    ));

    session.start(stream(), Profile::Web).await.unwrap();
    assert!(matches!(
        session.select_tier(7).await.unwrap_err(),
        Error::OutOfRange { index: 7, len: 2 }
    ));
}

// =============================================================================
// Segment fetching and the network retry budget
// =============================================================================

const SEG_URL: &str = "https://origin.test/stream/web/movie-1/seg-000.ts";

fn segment() -> SegmentRef {
    SegmentRef {
        uri: "seg-000.ts".into(),
        duration: 6.0,
    }
}

#[tokio::test]
async fn segment_fetch_retries_transient_failures() {
    let (fetcher, _decoder, session) = playing_session().await;

    fetcher.script_segment(SEG_URL, Err(Error::Network("connection reset".into())));
    fetcher.script_segment(SEG_URL, Err(Error::Network("connection reset".into())));
    fetcher.script_segment(SEG_URL, Ok(Bytes::from_static(&[0u8; 1024])));

    let data = session.fetch_segment(&segment()).await.unwrap();
    assert_eq!(data.len(), 1024);

    // Both transient failures were counted and playback survived
    assert_eq!(session.fault_counters().await.network, 2);
    assert_eq!(session.state().await, PlayerState::Playing);
    assert!(session.bandwidth_estimate_bps().await > 0);
}

#[tokio::test]
async fn exhausted_segment_retries_fail_the_session() {
    let fetcher = FakeFetcher::new();
    seed_catalog(&fetcher);
    let decoder = FakeDecoder::new();
    let config = PlayerConfig {
        max_network_retries: 1,
        retry_delay_ms: 5,
        ..PlayerConfig::default()
    };
    let session = session_with(fetcher.clone(), decoder, config);
    session.start(stream(), Profile::Web).await.unwrap();
    session.handle_decoder_event(DecoderEvent::Ready).await;

    // No scripted segment: every attempt 404s
    let err = session.fetch_segment(&segment()).await.unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(session.state().await, PlayerState::Failed);
    assert!(matches!(
        session.last_error().await,
        Some(Error::RetriesExhausted { .. })
    ));
}
