//! Sweep command - reclaim expired sessions.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use frsh_session::{CancellationToken, Frsh, SweepReport};
use serde::Serialize;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Maximum concurrent workers (default: sweep.concurrency from config)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Re-read each session record before reclaiming it
    #[arg(long)]
    pub recheck: bool,
}

#[derive(Debug, Serialize)]
struct SweepSummary {
    candidates: usize,
    claimed: usize,
    reclaimed: usize,
    cancelled: bool,
    workers: Vec<WorkerSummary>,
}

#[derive(Debug, Serialize)]
struct WorkerSummary {
    worker: usize,
    claimed: usize,
    reclaimed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&SweepReport> for SweepSummary {
    fn from(report: &SweepReport) -> Self {
        Self {
            candidates: report.candidates,
            claimed: report.claimed_count(),
            reclaimed: report.reclaimed_count(),
            cancelled: report.cancelled,
            workers: report
                .workers
                .iter()
                .map(|w| WorkerSummary {
                    worker: w.worker,
                    claimed: w.claimed,
                    reclaimed: w.reclaimed.clone(),
                    error: w.outcome.as_ref().err().map(ToString::to_string),
                })
                .collect(),
        }
    }
}

/// Run the sweep command. Ctrl-C stops workers from claiming further sessions.
pub async fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.session_config()?;
    if args.recheck {
        config = config.with_recheck_primary(true);
    }
    let concurrency = args.concurrency.unwrap_or(config.sweep_concurrency);

    let store = ctx.open_store()?;
    let frsh = Frsh::new(Arc::new(store.clone()), config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing claimed work");
            on_signal.cancel();
        }
    });

    let report = frsh.sweep_expired_with_cancel(concurrency, cancel).await;
    signal_task.abort();
    let report = report?;
    ctx.save_store(&store)?;

    let summary = SweepSummary::from(&report);
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, ctx.verbose);
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} sweep worker(s) failed",
            report.failures().count()
        );
    }
    Ok(())
}

fn print_summary(summary: &SweepSummary, verbose: bool) {
    let dim = Style::new().dim();
    let green = Style::new().green();
    let red = Style::new().red();

    println!("{}", style("Sweep").bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!("  {:<12} {}", "candidates:", summary.candidates);
    println!("  {:<12} {}", "claimed:", summary.claimed);
    println!(
        "  {:<12} {}",
        "reclaimed:",
        green.apply_to(summary.reclaimed)
    );
    if summary.cancelled {
        println!("  {}", dim.apply_to("cancelled before all candidates were claimed"));
    }

    for worker in &summary.workers {
        match &worker.error {
            Some(error) => println!(
                "  {} worker {}: {}",
                red.apply_to("✗"),
                worker.worker,
                error
            ),
            None if verbose => println!(
                "  {} worker {}: claimed {}, reclaimed {}",
                green.apply_to("✓"),
                worker.worker,
                worker.claimed,
                worker.reclaimed.len()
            ),
            None => {}
        }
    }
}
