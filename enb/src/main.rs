//! MU-MIMO Scheduler Simulator
//!
//! Drives one downlink scheduler instance over a synthetic cell: random
//! channel feedback, full-buffer traffic for every UE, and random NACKs that
//! feed retransmissions back into the next TTIs.

mod config;
mod sim;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use common::types::UeId;
use config::EnbConfig;
use mac::{DownlinkScheduler, RetransmissionGrant, TtiSchedule};
use sim::{CountingLinkAdaptation, SharedHarq, SyntheticFeedback};

/// MU-MIMO downlink scheduler simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short, long)]
    log_level: Option<String>,

    /// Number of TTIs to run; overrides the config
    #[arg(long)]
    ttis: Option<u64>,

    /// Number of active UEs; overrides the config
    #[arg(long)]
    ues: Option<u32>,

    /// Channel seed; overrides the config
    #[arg(long)]
    seed: Option<u64>,

    /// Write per-TTI schedules as JSON lines to this file
    #[arg(long)]
    dump_schedule: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EnbConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => EnbConfig::default(),
    };
    if let Some(ttis) = args.ttis {
        config.simulation.num_ttis = ttis;
    }
    if let Some(ues) = args.ues {
        config.simulation.num_ues = ues;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    fmt().with_env_filter(env_filter).with_target(true).init();

    let scheduler_config = config.scheduler_config()?;
    info!(
        cell = scheduler_config.cell_id.0,
        bandwidth_mhz = config.cell.bandwidth_mhz,
        ues = config.simulation.num_ues,
        ttis = config.simulation.num_ttis,
        "starting scheduler simulation"
    );

    let num_prbs = scheduler_config.bandwidth.num_prbs();
    let harq = SharedHarq::new();
    let mut scheduler = DownlinkScheduler::new(
        scheduler_config,
        Box::new(SyntheticFeedback::new(num_prbs, config.simulation.seed)),
        Box::new(harq.clone()),
        Box::new(CountingLinkAdaptation::default()),
    )?;

    let active_users: BTreeSet<UeId> = (1..=config.simulation.num_ues).map(UeId).collect();
    let mut nack_rng = StdRng::seed_from_u64(config.simulation.seed ^ 0x5eed);

    let mut dump = match &args.dump_schedule {
        Some(path) => Some(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create dump file {}", path))?,
        ),
        None => None,
    };

    let mut ticker = (config.simulation.tti_period_us > 0).then(|| {
        tokio::time::interval(Duration::from_micros(config.simulation.tti_period_us))
    });

    let mut fill_level_sum = 0.0;
    let mut dropped_total = 0usize;

    for tti in 0..config.simulation.num_ttis {
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await;
        }

        let schedule = scheduler.schedule(tti, &active_users);
        fill_level_sum += schedule.diagnostics.final_fill_level;
        dropped_total += schedule.diagnostics.dropped_retransmissions;

        inject_nacks(
            &schedule,
            &harq,
            config.simulation.nack_probability,
            &mut nack_rng,
        );

        if let Some(file) = dump.as_mut() {
            serde_json::to_writer(&mut *file, &schedule)?;
            writeln!(file)?;
        }

        debug!(
            tti,
            scheduled_users = schedule.allocations.len(),
            fill = schedule.diagnostics.final_fill_level,
            "TTI done"
        );
    }

    info!(
        mean_fill_level = fill_level_sum / config.simulation.num_ttis.max(1) as f64,
        dropped_retransmissions = dropped_total,
        "simulation finished"
    );

    Ok(())
}

/// Randomly NACK scheduled users without a pending retransmission, feeding
/// the exact resource footprint back into the HARQ ledger.
fn inject_nacks(
    schedule: &TtiSchedule,
    harq: &SharedHarq,
    nack_probability: f64,
    rng: &mut StdRng,
) {
    for (&user, allocation) in &schedule.allocations {
        if allocation.prbs.is_empty() || harq.has_pending(user) {
            continue;
        }
        if rng.gen_bool(nack_probability) {
            let prbs: Vec<usize> = allocation.prbs.keys().copied().collect();
            let pmi = allocation
                .prbs
                .values()
                .next()
                .map(|prb_allocation| prb_allocation.pmi)
                .unwrap_or(common::types::Pmi(0));
            let process = common::types::ProcessId((user.0 % 8) as u8);
            debug!(%user, prbs = prbs.len(), "transmission NACKed, queueing retransmission");
            harq.add_pending(
                user,
                RetransmissionGrant {
                    process,
                    prbs,
                    pmi,
                },
            );
        }
    }
}
