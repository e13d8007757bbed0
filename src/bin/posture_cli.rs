use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use posture_monitor::analysis::SensitivityLevel;
use posture_monitor::capture::synthetic::{PostureScript, ScriptedCapture, SyntheticPoseEstimator};
use posture_monitor::capture::{ManualTimeSource, TimeSource, TokioTimeSource};
use posture_monitor::managers::MessageBus;
use posture_monitor::notify::LogNotifier;
use posture_monitor::service::{build_runtime, MonitorService};
use posture_monitor::stats::read_daily_stats;
use posture_monitor::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use posture_monitor::{telemetry, AppConfig, ControlAction, CoreEvent, MonitorSession, SessionPorts};
use tokio::sync::broadcast::{self, error::TryRecvError};

#[path = "posture_cli/telemetry.rs"]
mod telemetry_utils;
use telemetry_utils::{drain_metrics, TelemetryAggregator};

fn main() -> ExitCode {
    posture_monitor::init_logging();
    let cli = Cli::parse();
    match cli.execute() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("posture_cli error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "posture_cli", about = "Posture monitor simulation and statistics CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<ExitCode> {
        match self.command {
            Command::Simulate(args) => simulate_command(args),
            Command::Stats(args) => stats_command(args),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the monitor against a scripted pose source and print produced events.
    Simulate(SimulateArgs),
    /// Print the stored statistics for one day.
    Stats(StatsArgs),
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    /// JSON config file (defaults to assets/monitor_config.json).
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON store file; an in-memory store is used when omitted.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Number of sampling ticks to run.
    #[arg(long, default_value_t = 100)]
    ticks: u64,
    /// Posture script, e.g. good:30,bad:40,absent:5,slump:40.
    #[arg(long, default_value = "good:20,bad:50,good:30")]
    script: PostureScript,
    /// Seed for landmark jitter.
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Emit landmarks as an unmirrored camera sees them.
    #[arg(long, default_value_t = false)]
    unmirrored: bool,
    /// Sensitivity level (1 = low, 2 = medium, 3 = high).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    sensitivity: Option<u8>,
    /// Tick at which to send the calibrate action.
    #[arg(long, default_value_t = 5)]
    calibrate_at: u64,
    /// Do not calibrate; rely on a stored baseline.
    #[arg(long, default_value_t = false)]
    skip_calibration: bool,
    /// Run on the async service in real time instead of a manual clock.
    #[arg(long, default_value_t = false)]
    live: bool,
    /// Print a telemetry summary to stderr when done.
    #[arg(long, value_enum)]
    telemetry: Option<TelemetryFormat>,
}

#[derive(Args, Debug, Clone)]
struct StatsArgs {
    /// JSON config file; its storage path is used when --store is omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON store file.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Day to print (YYYY-MM-DD); defaults to today (UTC).
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum TelemetryFormat {
    Json,
    Table,
}

fn load_config(path: Option<&PathBuf>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    }
}

fn simulate_command(args: SimulateArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref());
    if config.monitor.tick_interval_ms == 0 {
        bail!("tick_interval_ms must be greater than zero");
    }

    let store: Arc<dyn KeyValueStore> = match &args.store {
        Some(path) => Arc::new(
            JsonFileStore::open(path).with_context(|| format!("opening store {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let mut metrics_rx = telemetry::hub().collector().subscribe();
    let bus = MessageBus::new();
    let manual_clock = (!args.live).then(|| Arc::new(ManualTimeSource::new()));
    let clock: Arc<dyn TimeSource> = match &manual_clock {
        Some(manual) => manual.clone(),
        None => Arc::new(TokioTimeSource::new()),
    };

    let mut estimator = SyntheticPoseEstimator::new(args.script.clone(), args.seed);
    if args.unmirrored {
        estimator = estimator.unmirrored();
    }
    let ports = SessionPorts {
        capture: Arc::new(ScriptedCapture::new()),
        estimator: Arc::new(estimator),
        notifier: Arc::new(LogNotifier::new()),
        store,
        clock,
    };
    let mut session = MonitorSession::new(config, ports, bus.event_sender());
    session.restore().context("restoring stored state")?;

    if let Some(level) = args.sensitivity {
        let level = SensitivityLevel::try_from(level).map_err(anyhow::Error::msg)?;
        session.set_sensitivity(level);
    }

    let mut events = bus.subscribe();
    let session = match manual_clock {
        Some(clock) => run_manual(session, &clock, &args, &mut events)?,
        None => run_live(session, &bus, &args, &mut events)?,
    };

    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({
            "calibrated": session.is_calibrated(),
            "sensitivity": session.sensitivity(),
            "loopStarts": session.supervisor().loop_starts(),
            "loopStops": session.supervisor().loop_stops(),
        }))?
    );

    if let Some(format) = args.telemetry {
        let mut aggregator = TelemetryAggregator::default();
        drain_metrics(&mut metrics_rx, &mut aggregator);
        let snapshot = telemetry::hub().snapshot();
        let report = aggregator.into_report(snapshot.total_events, snapshot.dropped_events);
        match format {
            TelemetryFormat::Json => report.print_json()?,
            TelemetryFormat::Table => report.print_table(),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_manual(
    mut session: MonitorSession,
    clock: &ManualTimeSource,
    args: &SimulateArgs,
    events: &mut broadcast::Receiver<CoreEvent>,
) -> Result<MonitorSession> {
    let tick = session.config().monitor.tick_interval();
    let flush_every = session.config().monitor.flush_interval();

    if let Err(err) = session.start_monitoring() {
        log::warn!("[posture_cli] Capture not started yet: {err}");
    }

    let mut since_flush = Duration::ZERO;
    for index in 0..args.ticks {
        if index == args.calibrate_at && !args.skip_calibration {
            if let Err(err) = session.handle_action(ControlAction::Calibrate) {
                log::warn!("[posture_cli] Calibration failed: {err}");
            }
        }

        session.tick();
        clock.advance(tick);
        since_flush += tick;
        if since_flush >= flush_every {
            session.flush_stats();
            since_flush = Duration::ZERO;
        }
        print_events(events)?;
    }

    session.shutdown();
    print_events(events)?;
    Ok(session)
}

fn run_live(
    session: MonitorSession,
    bus: &MessageBus,
    args: &SimulateArgs,
    events: &mut broadcast::Receiver<CoreEvent>,
) -> Result<MonitorSession> {
    let tick = session.config().monitor.tick_interval();
    let receiver = bus
        .take_control_receiver()
        .context("control receiver already taken")?;
    let control = bus.control_sender();
    let runtime = build_runtime().context("building runtime")?;

    let total = tick.saturating_mul(u32::try_from(args.ticks).unwrap_or(u32::MAX));
    let calibrate_after = tick.saturating_mul(u32::try_from(args.calibrate_at).unwrap_or(u32::MAX));
    let calibrate = !args.skip_calibration;

    runtime.block_on(async move {
        let service = MonitorService::new(session, receiver);
        let handle = tokio::spawn(service.run_until(tokio::time::sleep(total)));

        control
            .send(ControlAction::StartMonitoring)
            .await
            .context("sending startMonitoring")?;
        if calibrate {
            tokio::spawn(async move {
                tokio::time::sleep(calibrate_after).await;
                let _ = control.send(ControlAction::Calibrate).await;
            });
        }

        tokio::pin!(handle);
        let session = loop {
            tokio::select! {
                joined = &mut handle => break joined.context("monitor service panicked")?,
                received = events.recv() => match received {
                    Ok(event) => println!("{}", event.to_json()?),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("[posture_cli] Skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
            }
        };
        print_events(events)?;
        Ok::<_, anyhow::Error>(session)
    })
}

fn print_events(events: &mut broadcast::Receiver<CoreEvent>) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => println!("{}", event.to_json()?),
            Err(TryRecvError::Lagged(skipped)) => {
                log::warn!("[posture_cli] Skipped {skipped} events");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

fn stats_command(args: StatsArgs) -> Result<ExitCode> {
    let path = match args.store {
        Some(path) => path,
        None => load_config(args.config.as_ref()).storage.path,
    };
    if !path.exists() {
        bail!("store file {} does not exist", path.display());
    }

    let store = JsonFileStore::open(&path).with_context(|| format!("opening store {}", path.display()))?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    match read_daily_stats(&store, date).context("reading daily stats")? {
        Some(stats) => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            match stats.good_ratio() {
                Some(ratio) => eprintln!("Good posture: {:.1}% of counted frames", ratio * 100.0),
                None => eprintln!("Good posture: no frames counted"),
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No statistics recorded for {date}");
            Ok(ExitCode::from(2))
        }
    }
}
