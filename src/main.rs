//! s7comm-poller: reads configured S7 points and writes them as JSON lines.
//!
//! Records go to stdout, logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use s7comm_poller::{Client, Config, CycleReport, JsonLinesSink, Poller, TickSchedule};

/// Scheduler tick length.
const TICK: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(name = "s7comm-poller")]
#[command(about = "Poll Siemens S7 PLC values and print them as JSON lines")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "s7comm.toml")]
    config: PathBuf,

    /// Run a single read cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "s7comm-poller stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> s7comm_poller::Result<()> {
    let config = Config::load(&cli.config)?;
    let poller =
        Poller::new(&config.nodes, config.max_items_per_request)?.with_tags(config.tags.clone());
    info!(
        config = %cli.config.display(),
        groups = poller.groups().len(),
        "configuration loaded"
    );

    let client_config = config.client_config()?;
    let mut client = Client::connect(&client_config)?;
    let mut sink = JsonLinesSink::new(std::io::stdout().lock());

    if cli.once {
        log_report(&poller.run_cycle(&mut client, &mut sink));
        return client.close();
    }

    let mut schedule = TickSchedule::new(config.ticks_per_interval(TICK));
    debug!(ticks = schedule.ticks_per_interval(), "read cadence");
    let mut session = Some(client);
    loop {
        std::thread::sleep(TICK);
        if !schedule.tick() {
            continue;
        }

        if session.is_none() {
            match Client::connect(&client_config) {
                Ok(client) => session = Some(client),
                Err(e) => {
                    warn!(plc = %client_config.plc_addr, error = %e, "reconnect failed");
                    continue;
                }
            }
        }
        let Some(client) = session.as_mut() else {
            continue;
        };

        let report = poller.run_cycle(client, &mut sink);
        log_report(&report);
        if report.batches > 0 && report.batches_failed == report.batches {
            warn!("every batch failed, reconnecting on next cycle");
            if let Some(client) = session.take() {
                if let Err(e) = client.close() {
                    debug!(error = %e, "close failed");
                }
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    debug!(
        groups = report.groups_emitted,
        fields = report.fields_decoded,
        batches = report.batches,
        batches_failed = report.batches_failed,
        items_failed = report.items_failed,
        "cycle finished"
    );
}
