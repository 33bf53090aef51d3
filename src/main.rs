mod chart;
mod clock;
mod config;
mod day_cycle;
mod energy;
mod error;
mod fronius;
mod payload;
mod pipeline;
mod power;
mod samples;
mod store;
mod sun;

use crate::chart::PngChart;
use crate::clock::TimeContext;
use crate::config::Config;
use crate::day_cycle::Overrides;
use crate::error::{PipelineError, StoreError};
use crate::fronius::FroniusClient;
use crate::pipeline::Pipeline;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Solar inverter monitor.
/// Reads a Fronius inverter once per invocation, keeps today's generation in CSV files and
/// draws a chart of the day for a web server to publish. After sunset the day is closed with an
/// archival chart, a row in the daily totals and an entry at the top of the history page.
#[derive(Parser, Debug)]
#[command(
    version,
    long_about,
    after_help = "Meant to be run every minute from cron, e.g. `* * * * * pvmon >> /var/log/pvmon.log`.\n\
                  Every invocation works out what to do from the clock and the files already written today."
)]
struct Pvmon {
    /// Sample the inverter even if the sun is down.
    #[arg(short = 'd', long)]
    force_day: bool,
    /// Close the day now: draw the archival chart and record the daily total.
    /// An archival chart that already exists is never replaced.
    #[arg(short = 'e', long, long_help)]
    force_eod: bool,
    /// Write every file to the current directory instead of the web server.
    #[arg(short, long)]
    test: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stdout)
        .compact()
        .init();

    let args = Pvmon::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Pvmon) -> Result<(), PipelineError> {
    let overrides = Overrides {
        force_day: args.force_day,
        force_eod: args.force_eod,
    };

    let mut config = Config::deployment();
    if args.test {
        info!("test mode on");
        let here = std::env::current_dir().map_err(|source| StoreError::Io {
            path: ".".to_string(),
            source,
        })?;
        config = config.with_test_output(here);
    }
    if overrides.force_eod {
        info!("forced end of day on");
    }
    if overrides.force_day {
        info!("forced daytime on");
    }

    let ctx = TimeContext::current(&config)?;
    debug!(
        now = %ctx.now_iso(),
        sunrise = %clock::iso(&ctx.sunrise),
        sunset = %clock::iso(&ctx.sunset),
        "time context"
    );

    let inverter = FroniusClient::new(&config)?;
    let renderer = PngChart::new(&config);
    let report = Pipeline::new(&config, &ctx, &inverter, &renderer).run(overrides)?;
    debug!(
        decision = ?report.decision,
        status = report.status.as_deref().unwrap_or("OK"),
        appended = report.appended,
        live_rendered = report.live_rendered,
        archive = ?report.archive,
        summary_appended = report.summary_appended,
        "run complete"
    );
    Ok(())
}
