//! Checksum Integrity Monitor
//!
//! Streams one pair's book for 30 seconds and prints every verification:
//! matching checksums, mismatches, resyncs and integrity errors.
//!
//! Run: cargo run --bin checksum_monitor -- [PAIR]

use colored::*;
use kraken_feed::{BookEvent, ConnectionEvent, FeedConfig, FeedConnection, FeedEvent, Hooks};
use kraken_types::Depth;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let pair = std::env::args().nth(1).unwrap_or_else(|| "XBT/USD".to_string());

    println!("{}", "═".repeat(65).cyan());
    println!("{}", "  CHECKSUM INTEGRITY MONITOR".cyan().bold());
    println!("{}", "  CRC32 verification of the local book".cyan());
    println!("{}", "═".repeat(65).cyan());
    println!();

    let hooks = Hooks::new().on_integrity_error(|err| {
        eprintln!("  {} {}", "INTEGRITY".red().bold(), err);
    });
    let config = FeedConfig::new().with_pair(pair.as_str()).with_depth(Depth::D10);
    let feed = Arc::new(FeedConnection::new(config).with_hooks(hooks));
    let mut events = feed.take_event_receiver().expect("Events already taken");

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut snapshot_count = 0u64;
    let mut verified_count = 0u64;
    let mut mismatch_count = 0u64;
    let mut resync_count = 0u64;
    let start = Instant::now();

    println!(
        "  {:>12}  {:>15}  {:>12}  {:>8}",
        "EVENT".white().bold(),
        "CHECKSUM".white().bold(),
        "STATUS".white().bold(),
        "TOTAL".white().bold()
    );
    println!("  {}", "─".repeat(52));

    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = &mut deadline => break,
        };

        match event {
            FeedEvent::Connection(ConnectionEvent::Connected { version, .. }) => {
                println!("  {} Connected (API {})", "✓".green(), version);
            }
            FeedEvent::Book(BookEvent::Snapshot { .. }) => {
                snapshot_count += 1;
                println!(
                    "  {:>12}  {:>15}  {:>12}  {:>8}",
                    "SNAPSHOT".cyan(),
                    "-",
                    "LOADED".green(),
                    snapshot_count + verified_count
                );
            }
            FeedEvent::Book(BookEvent::Update { snapshot, .. }) => {
                let Some(result) = snapshot.last_verification else {
                    continue;
                };
                verified_count += 1;
                // Only print every 10th verification
                if verified_count % 10 == 0 {
                    println!(
                        "  {:>12}  {:>15}  {:>12}  {:>8}",
                        format!("UPDATE #{}", verified_count).yellow(),
                        result.expected_checksum,
                        "VALID".green(),
                        snapshot_count + verified_count
                    );
                }
            }
            FeedEvent::Book(BookEvent::ChecksumMismatch { result, .. }) => {
                mismatch_count += 1;
                println!(
                    "  {:>12}  {:>15}  {:>12}  {:>8}",
                    "MISMATCH".red(),
                    result.expected_checksum,
                    format!("got {}", result.computed_checksum).red(),
                    snapshot_count + verified_count
                );
            }
            FeedEvent::Book(BookEvent::ResyncRequested { .. }) => {
                resync_count += 1;
                println!("  {:>12}  {}", "RESYNC".magenta(), "waiting for snapshot".dimmed());
            }
            _ => {}
        }
    }

    feed.shutdown();
    let _ = task.await;

    println!();
    println!("{}", "═".repeat(65).cyan());
    println!("  {}", "INTEGRITY REPORT".white().bold());
    println!("{}", "═".repeat(65).cyan());
    println!();
    println!("  Elapsed:          {:.1}s", start.elapsed().as_secs_f64());
    println!("  Snapshots:        {}", snapshot_count);
    println!("  Verified updates: {}", verified_count);
    println!("  Mismatches:       {}", mismatch_count);
    println!("  Resyncs:          {}", resync_count);
    let all_valid = if mismatch_count == 0 { "YES".green() } else { "NO".red() };
    println!("  All Valid:        {}", all_valid);
    println!();
    println!(
        "  {} Kraken's CRC32 checksum detects: missed messages, corruption, sequence gaps",
        "Note:".dimmed()
    );

    Ok(())
}
