use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use mocap_config::{AppConfig, PolicyKind};
use mocap_feed::{FeedClient, FeedEvent};
use mocap_sink::{CsvRecorder, FlushOutcome, SerialActuator};
use mocap_trigger::{PipelineStatus, TriggerPipeline};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "mocap-led", about = "Drive an LED from live motion-capture poses")]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pose feed address (`host:port`), or `-` to read stdin.
    #[arg(long)]
    feed: Option<String>,

    /// Serial device for the LED controller.
    #[arg(long)]
    port: Option<PathBuf>,

    /// CSV file written on shutdown.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Trigger policy.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Debug-level logging by default.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective configuration as TOML and exit.
    PrintConfig,
    /// Write the effective configuration to the config file and exit.
    SaveConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    PeriodicPulse,
    ThresholdHold,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::PeriodicPulse => PolicyKind::PeriodicPulse,
            PolicyArg::ThresholdHold => PolicyKind::ThresholdHold,
        }
    }
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(feed) = &self.feed {
            config.feed.address = feed.clone();
        }
        if let Some(port) = &self.port {
            config.actuator.port = Some(port.clone());
        }
        if let Some(output) = &self.output {
            config.recorder.output = output.clone();
        }
        if let Some(policy) = self.policy {
            config.trigger.policy = policy.into();
        }
    }
}

fn load_config(cli: &Cli) -> AppConfig {
    let loaded = match &cli.config {
        Some(path) => mocap_config::load_config_from(path),
        None => mocap_config::load_config(),
    };
    loaded.unwrap_or_else(|e| {
        warn!(?e, "Failed to load config, using defaults");
        AppConfig::default()
    })
}

/// Open the LED controller, falling back to log-only operation.
async fn open_actuator(config: &AppConfig) -> SerialActuator {
    let Some(port) = &config.actuator.port else {
        info!("No actuator port configured, running log-only");
        return SerialActuator::disconnected();
    };
    match SerialActuator::open(port) {
        Ok(actuator) => {
            // The controller resets when the port opens.
            tokio::time::sleep(Duration::from_millis(config.actuator.settle_ms)).await;
            info!(?port, "Actuator ready");
            actuator
        }
        Err(e) => {
            warn!(?port, %e, "Actuator not available, running log-only");
            SerialActuator::disconnected()
        }
    }
}

async fn open_feed(address: &str) -> Result<FeedClient> {
    if address == "-" {
        Ok(FeedClient::stdin())
    } else {
        FeedClient::connect(address).await
    }
}

fn log_status(status: &PipelineStatus) {
    let position = status.position.map(|p| [p.x, p.y, p.z]);
    info!(
        session_active = status.session_active,
        frame = ?status.frame_number,
        capture_time = ?status.session_time,
        ?position,
        speed = status.speed,
        led = status.actuator_state,
        actuator_available = status.actuator_available,
        rows = status.recorded_rows,
        "Status"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "mocap_led=debug,mocap_trigger=debug,mocap_feed=debug,mocap_sink=debug"
    } else {
        "mocap_led=info,mocap_trigger=info,mocap_feed=info,mocap_sink=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut config = load_config(&cli);
    cli.apply(&mut config);
    config.validate()?;

    match cli.command {
        Some(Command::PrintConfig) => {
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Some(Command::SaveConfig) => {
            match &cli.config {
                Some(path) => mocap_config::save_config_to(&config, path)?,
                None => mocap_config::save_config(&config)?,
            }
            return Ok(());
        }
        None => {}
    }

    info!(
        feed = %config.feed.address,
        policy = ?config.trigger.policy,
        output = ?config.recorder.output,
        "Mocap LED trigger starting"
    );

    let actuator = open_actuator(&config).await;
    let recorder = if config.recorder.enabled {
        CsvRecorder::new(&config.recorder.output)
    } else {
        CsvRecorder::disabled()
    };
    let mut pipeline = TriggerPipeline::from_config(&config, actuator, recorder);
    let mut feed = open_feed(&config.feed.address).await?;

    let status_every = (config.status_interval_ms > 0)
        .then(|| Duration::from_millis(config.status_interval_ms));
    let mut status_tick = tokio::time::interval(status_every.unwrap_or(Duration::from_secs(3600)));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Some(FeedEvent::Frame(frame)) => {
                    pipeline.on_frame(&frame);
                }
                Some(FeedEvent::Pose(sample)) => {
                    pipeline.on_pose(&sample);
                }
                None => {
                    info!("Pose feed ended");
                    break;
                }
            },
            _ = status_tick.tick(), if status_every.is_some() => {
                log_status(&pipeline.status());
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    error!(?e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    pipeline.shutdown();
    match pipeline.recorder().flush() {
        Ok(FlushOutcome::Saved { path, rows }) => info!(?path, rows, "Session saved"),
        Ok(FlushOutcome::NothingToSave) => info!("Nothing to save"),
        Ok(FlushOutcome::Disabled) => info!("Recording disabled, nothing written"),
        Err(e) => error!(%e, "Failed to save recorded samples"),
    }

    Ok(())
}
