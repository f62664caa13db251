//! Ironvale host process.
//!
//! Loads a world file, builds its shards and steps them at the configured
//! tick rate. Networking is not part of this binary; broadcasts are only
//! counted and logged.
//!
//! ```text
//! ironvale-host world.json
//! RUST_LOG=ironvale_core=debug ironvale-host world.json
//! ```

mod world_file;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

/// Seconds between throughput summaries.
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ironvale_host=info,ironvale_core=info".into()),
        )
        .init();

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: ironvale-host <world.json>");
    };
    let world_file::Loaded {
        config,
        mut world,
        ticks,
    } = world_file::load(&path)?;

    let interval = Duration::from_secs_f32(config.tick_interval());
    info!(
        shards = world.len(),
        tick_rate = config.tick_rate,
        "host started"
    );

    let mut tick: u64 = 0;
    let mut broadcasts: usize = 0;
    let mut last_report = Instant::now();
    let mut next_tick = Instant::now();
    while ticks.map_or(true, |limit| tick < limit) {
        let started = Instant::now();
        let sent: usize = world.step().iter().map(Vec::len).sum();
        broadcasts += sent;
        tick += 1;
        debug!(tick, broadcasts = sent, "tick");

        let elapsed = started.elapsed();
        if elapsed > interval {
            warn!(tick, ?elapsed, "tick overran its interval");
        }
        if last_report.elapsed() >= REPORT_INTERVAL {
            info!(tick, broadcasts, "throughput");
            broadcasts = 0;
            last_report = Instant::now();
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            // fell behind; do not try to catch up with a burst
            next_tick = now;
        }
    }

    for index in 0..world.len() {
        if let Some(shard) = world.shard_mut(index) {
            shard.save_all();
        }
    }
    info!(tick, "host stopped");
    Ok(())
}
