//! gatecount-sync - pushes hourly Traf-Sys gate counts into LibInsight
//!
//! One run pulls a window of days from Traf-Sys, sums counts per site and
//! hour, and posts the totals to LibInsight. Schedule it (cron, systemd
//! timer) to keep LibInsight current.
//!
//! Module structure:
//! - `domain/` - Core types (counts, windows, aggregation)
//! - `io/` - External interfaces (Traf-Sys, LibInsight)
//! - `services/` - Business logic (normalization, delivery, pipeline)
//! - `infra/` - Infrastructure (Config, logging, run metrics)

use chrono::Local;
use clap::{CommandFactory, Parser};
use gatecount_sync::infra::logging;
use gatecount_sync::infra::{Config, FetchWindow, RunEnv};
use gatecount_sync::services::Pipeline;
use std::fmt::Display;
use tracing::{error, info};

/// Pull Traf-Sys gate counts and post hourly totals to LibInsight
///
/// Requires TRAFSYS_USER, TRAFSYS_PASS, and LIBINSIGHT_URL in the environment.
#[derive(Parser, Debug)]
#[command(name = "gatecount-sync", version, about)]
struct Args {
    /// Number of days ago to start Traf-Sys counts, e.g., 7 would mean the
    /// first day included is a week ago
    #[arg(long = "days-ago-start", default_value_t = 0, allow_negative_numbers = true)]
    days_ago_start: i64,

    /// Number of days ago to end Traf-Sys counts, e.g., 2 would include from
    /// start through the day before yesterday, while 0 would gather all
    /// available data from start through today
    #[arg(long = "days-ago-end", default_value_t = 1, allow_negative_numbers = true)]
    days_ago_end: i64,

    /// Show debug logging (RUST_LOG overrides this)
    #[arg(short, long)]
    verbose: bool,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

/// Print `msg` and usage to stderr, then exit 1
fn usage(msg: &dyn Display) -> ! {
    eprintln!("{}", msg);
    eprintln!();
    eprintln!("{}", Args::command().render_help());
    std::process::exit(1);
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Scoped to this run; the runtime is single-threaded so every event lands here
    let _log_guard = logging::install(args.verbose);

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path).unwrap_or_else(|e| usage(&e));
    let window =
        FetchWindow::validate(args.days_ago_start, args.days_ago_end, config.max_days_ago_start())
            .unwrap_or_else(|e| usage(&e));
    let env = RunEnv::from_env().unwrap_or_else(|e| usage(&e));

    info!(
        git_hash = %env!("GIT_HASH"),
        config_file = %config.config_file(),
        trafsys_url = %config.trafsys_base_url(),
        days_ago_start = %window.start_days_ago(),
        days_ago_end = %window.end_days_ago(),
        "gatecount_sync_starting"
    );

    let run_span = tracing::info_span!("run");
    let pipeline = Pipeline::from_config(&config, &env.libinsight_url, run_span)?;

    let today = Local::now().date_naive();
    match pipeline.run(&env.credentials, window, today).await {
        Ok(summary) => {
            summary.log();
            info!("gatecount_sync_complete");
            Ok(())
        }
        Err(e) => {
            pipeline.metrics().report().log();
            error!(error = %e, "gatecount_sync_failed");
            Err(e.into())
        }
    }
}
