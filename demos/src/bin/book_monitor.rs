//! Live Book Monitor
//!
//! Keeps a checksum-verified book and redraws the top levels, spread and
//! volume split on every verified update.
//!
//! Run: cargo run --bin book_monitor -- [PAIR] [DEPTH]
//! Logs: RUST_LOG=kraken_feed=debug cargo run --bin book_monitor

use colored::*;
use kraken_book::{OrderbookSnapshot, ReconciliationResult};
use kraken_feed::{DisplaySink, FeedConfig, FeedConnection, FeedEvent, Hooks};
use kraken_types::{Depth, PriceLevel};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHOWN_LEVELS: usize = 10;

/// Spread relative to the mid price, in basis points
fn spread_bps(spread: Decimal, mid: Decimal) -> Option<Decimal> {
    if mid.is_zero() {
        return None;
    }
    Some((spread / mid * Decimal::from(10_000)).round_dp(2))
}

/// Redraws the terminal on every verified book
struct TerminalDisplay {
    frames: u64,
}

impl TerminalDisplay {
    fn row(level: &PriceLevel, color: Color) -> String {
        format!(
            "  {:>16}  {:>18}",
            level.price_text.color(color),
            level.volume_text
        )
    }
}

impl DisplaySink for TerminalDisplay {
    fn show(&mut self, snapshot: &OrderbookSnapshot) {
        self.frames += 1;

        // clear screen, cursor home
        print!("\x1B[2J\x1B[H");
        println!("{}", "═".repeat(60).cyan());
        println!(
            "  {} {}   {}",
            "BOOK".cyan().bold(),
            snapshot.pair.white().bold(),
            format!("frame #{}", self.frames).dimmed()
        );
        println!("{}", "═".repeat(60).cyan());

        println!("  {:>16}  {:>18}", "PRICE".white().bold(), "VOLUME".white().bold());
        for level in snapshot.asks.iter().take(SHOWN_LEVELS).rev() {
            println!("{}", Self::row(level, Color::Red));
        }
        println!("  {}", "─".repeat(38));
        for level in snapshot.bids.iter().take(SHOWN_LEVELS) {
            println!("{}", Self::row(level, Color::Green));
        }
        println!();

        if let (Some(spread), Some(mid)) = (snapshot.spread(), snapshot.mid_price()) {
            let bps = spread_bps(spread, mid).map(|b| format!(" ({} bps)", b)).unwrap_or_default();
            println!(
                "  {} {}{}   {} {}",
                "SPREAD:".yellow(),
                spread,
                bps.dimmed(),
                "MID:".yellow(),
                mid
            );
        }
        let totals = snapshot.volume_totals();
        if let (Some(bid_pct), Some(ask_pct)) = (totals.bid_percentage(), totals.ask_percentage()) {
            println!(
                "  {} {}% / {}%   {} {}",
                "BID/ASK VOLUME:".yellow(),
                bid_pct.to_string().green(),
                ask_pct.to_string().red(),
                "IMBALANCE:".yellow(),
                snapshot
                    .imbalance()
                    .map(|i| i.round_dp(3).to_string())
                    .unwrap_or_default()
            );
        }

        match &snapshot.last_verification {
            Some(result) if result.valid => {
                println!("  {} checksum {}", "✓".green(), result.expected_checksum)
            }
            Some(result) => println!("  {} checksum {}", "✗".red(), result.expected_checksum),
            None => println!("  {}", "awaiting first checksum".dimmed()),
        }
    }

    fn resyncing(&mut self, pair: &str, result: Option<&ReconciliationResult>) {
        match result {
            Some(result) => println!(
                "\n  {} {} expected {} computed {}, requesting fresh snapshot",
                "RESYNC".magenta().bold(),
                pair,
                result.expected_checksum,
                result.computed_checksum
            ),
            None => println!(
                "\n  {} {} rejected a message, requesting fresh snapshot",
                "RESYNC".magenta().bold(),
                pair
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let pair = args.next().unwrap_or_else(|| "XBT/USD".to_string());
    let depth = match args.next() {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .and_then(Depth::from_u32)
            .ok_or_else(|| format!("unsupported depth {:?}, use 10, 25, 100, 500 or 1000", raw))?,
        None => Depth::D10,
    };

    let hooks = Hooks::new()
        .on_reconnect_attempt(|attempt, delay| info!(attempt, ?delay, "reconnecting"))
        .on_integrity_error(|err| eprintln!("{} {}", "INTEGRITY".red().bold(), err));

    let config = FeedConfig::new().with_pair(pair.as_str()).with_depth(depth);
    let feed = Arc::new(
        FeedConnection::new(config)
            .with_hooks(hooks)
            .with_display(TerminalDisplay { frames: 0 }),
    );
    let mut events = feed.take_event_receiver().expect("Events already taken");

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(FeedEvent::Subscription(event)) => info!(?event, "subscription"),
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    feed.shutdown();
    task.await??;

    let stats = feed.total_stats();
    println!();
    println!("  Snapshots:          {}", stats.snapshots);
    println!("  Updates:            {}", stats.updates);
    println!("  Checksum failures:  {}", stats.checksum_failures);
    println!("  Resyncs:            {}", stats.resyncs);
    println!("  Malformed records:  {}", stats.malformed_records);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_bps() {
        let bps = spread_bps(Decimal::new(10, 0), Decimal::new(50_000, 0));
        assert_eq!(bps, Some(Decimal::new(2, 0)));
        assert_eq!(spread_bps(Decimal::ONE, Decimal::ZERO), None);
    }
}
