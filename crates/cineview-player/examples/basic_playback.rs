//! Basic playback example
//!
//! Demonstrates manifest parsing, tier selection, and the playback state
//! machine without touching the network.
//!
//! Run with: cargo run -p cineview-player --example basic_playback

use cineview_player::{
    list_tiers, manifest, select_default, PlayerConfig, PlayerState,
};

const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:4
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
low.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1280x720
high.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080
full.m3u8
";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cineview_player=debug")
        .init();

    println!("Cineview Player - Basic Playback Example");
    println!("========================================\n");

    let config = PlayerConfig::default();
    println!("Configuration:");
    println!("  - Request timeout: {} ms", config.request_timeout_ms);
    println!(
        "  - Network retries: {} (delay {} ms)",
        config.max_network_retries, config.retry_delay_ms
    );
    println!("  - Pre-flight validation: {}\n", config.validate_before_playback);

    // Parse an inline master playlist
    let doc = manifest::parse(MASTER)?;
    println!("Parsed manifest: kind={:?}, version={:?}", doc.kind, doc.version);

    println!("\nAvailable tiers:");
    let tiers = list_tiers(&doc)?;
    for (index, tier) in tiers.iter().enumerate() {
        let label = tier
            .resolution
            .map(|r| r.quality_name())
            .unwrap_or("unknown");
        println!(
            "  [{index}] {label:>6}  {:>7} kbps  {}",
            tier.bandwidth / 1000,
            tier.uri
        );
    }

    let best = select_default(tiers).expect("non-empty tier list");
    println!("\nDefault selection: {} ({} bps)", best.uri, best.bandwidth);

    // Walk the state machine
    println!("\nPlayer state transitions:");
    let transitions = [
        (PlayerState::Idle, PlayerState::Resolving),
        (PlayerState::Resolving, PlayerState::Validating),
        (PlayerState::Validating, PlayerState::Attaching),
        (PlayerState::Attaching, PlayerState::Playing),
        (PlayerState::Playing, PlayerState::Recovering),
        (PlayerState::Recovering, PlayerState::Playing),
        (PlayerState::Playing, PlayerState::Stopped),
    ];
    for (from, to) in transitions {
        let symbol = if from.can_transition_to(to) { "ok " } else { "NO " };
        println!("  {symbol} {from} -> {to}");
    }

    println!("\nBlocked transitions:");
    for (from, to) in [
        (PlayerState::Idle, PlayerState::Playing),
        (PlayerState::Stopped, PlayerState::Resolving),
        (PlayerState::Failed, PlayerState::Playing),
    ] {
        assert!(!from.can_transition_to(to));
        println!("  NO  {from} -> {to}");
    }

    println!("\nExample complete!");
    Ok(())
}
