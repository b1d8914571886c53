use chrono::DateTime;
use clap::Parser;
use data_collection::SampleLog;
use leapsim::clock::{SimConfig, TimeSimulator, MAX_LEAD_SECONDS};
use leapsim::driver::{report_line, Driver};
use leapsim::refclock::{Publisher, TransportTarget};
use log::*;

mod data_collection;

/// SHM/SOCK refclock for ntpd and chronyd that simulates a leap second.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// SHM unit number, or absolute path of a chrony SOCK refclock socket
    target: TransportTarget,
    /// Seconds before the leap the simulated clock reads at start
    #[arg(
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i64).range(-MAX_LEAD_SECONDS..=MAX_LEAD_SECONDS)
    )]
    secs_before_leap: i64,
    /// TOML config file (defaults to $CONFIG_FILE, then built-in defaults)
    #[arg(long)]
    config: Option<String>,
    /// Write every sample to this CSV file
    #[arg(long)]
    record: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> leapsim::Result<()> {
    let config = SimConfig::load(args.config.as_deref())?;
    let leap_time = DateTime::from_timestamp(config.leap_target, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| config.leap_target.to_string());
    info!(
        "Leap second at {leap_time}, starting {}s before it",
        args.secs_before_leap
    );

    let publisher = Publisher::open(&args.target, &config)?;
    let mut sample_log = args.record.as_deref().map(SampleLog::create).transpose()?;
    let simulator = TimeSimulator::new(config.leap_target, args.secs_before_leap);
    let mut driver = Driver::new(simulator, publisher, config.interval());

    driver
        .run(|simulator, sample| {
            println!("{}", report_line(simulator, sample));
            if let Some(log) = sample_log.as_mut() {
                log.record(simulator, sample)?;
            }
            Ok(())
        })
        .await
}
