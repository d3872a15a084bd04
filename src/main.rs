//! sacctl - command-line control for Sinclair air conditioners
//!
//! Usage:
//!   sacctl --host 192.168.1.50 status
//!   sacctl --host 192.168.1.50 set --power on --mode cool --temp 24
//!   sacctl --config sinclair.toml watch

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use sinclair_ac::{
    DeviceClient, DeviceConfig, DeviceSnapshot, Event, FanSpeed, Mode, StatePatch, VerticalSwing,
};

#[derive(Parser)]
#[command(name = "sacctl", about = "Control a Sinclair AC unit on the local network")]
struct Cli {
    /// Device IP address (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Path to a TOML config file with a [device] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the current device state
    Status {
        /// Print the last known state without asking the device
        #[arg(long)]
        cached: bool,
    },
    /// Change device settings; only the given flags are touched
    Set {
        /// on | off
        #[arg(long)]
        power: Option<String>,
        /// auto | cool | dry | fan | heat
        #[arg(long)]
        mode: Option<String>,
        /// Target temperature in degrees C
        #[arg(long)]
        temp: Option<i64>,
        /// auto | low | medium | high | 0-5
        #[arg(long)]
        fan: Option<String>,
        /// default | full | top | upper | middle | lower | bottom
        #[arg(long)]
        swing: Option<String>,
        /// on | off - display panel light
        #[arg(long)]
        lights: Option<String>,
        /// on | off
        #[arg(long)]
        turbo: Option<String>,
        /// on | off
        #[arg(long)]
        quiet: Option<String>,
    },
    /// Send raw property codes and values
    Cmd {
        /// Property codes, comma separated (e.g. Pow,SetTem)
        #[arg(long = "opt", value_delimiter = ',')]
        codes: Vec<String>,
        /// Matching values, comma separated (e.g. 1,24)
        #[arg(long = "val", value_delimiter = ',')]
        values: Vec<i64>,
    },
    /// Stream state-change events until interrupted
    Watch,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli.command, config))
}

/// Initialize tracing output. Set `verbose` for debug-level detail.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { "info" };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_file(false)
                .compact(),
        )
        .with(tracing_subscriber::EnvFilter::new(level))
        .try_init();
}

fn build_config(cli: &Cli) -> anyhow::Result<DeviceConfig> {
    let mut config = match &cli.config {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if cli.verbose {
        config.verbose = true;
    }
    if config.host.is_empty() {
        bail!("no device host given; use --host or a config file");
    }
    Ok(config)
}

async fn run(cmd: Cmd, config: DeviceConfig) -> anyhow::Result<()> {
    let client = DeviceClient::connect(config).await?;

    let result = match cmd {
        Cmd::Status { cached } => {
            let snapshot = client.status(!cached).await?;
            print_snapshot(&snapshot);
            Ok(())
        }
        Cmd::Set {
            power,
            mode,
            temp,
            fan,
            swing,
            lights,
            turbo,
            quiet,
        } => {
            let patch = StatePatch {
                power: power.as_deref().map(parse_on_off).transpose()?,
                mode: mode.as_deref().map(parse_mode).transpose()?,
                target_temp: temp,
                fan_speed: fan.as_deref().map(parse_fan).transpose()?,
                swing: swing.as_deref().map(parse_swing).transpose()?,
                lights: lights.as_deref().map(parse_on_off).transpose()?,
                turbo: turbo.as_deref().map(parse_on_off).transpose()?,
                quiet: quiet.as_deref().map(parse_on_off).transpose()?,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("nothing to set; pass at least one flag");
            }
            let snapshot = client.set_state(patch).await?;
            print_snapshot(&snapshot);
            Ok(())
        }
        Cmd::Cmd { codes, values } => {
            if codes.len() != values.len() {
                bail!(
                    "--opt and --val must pair up ({} codes, {} values)",
                    codes.len(),
                    values.len()
                );
            }
            if codes.is_empty() {
                bail!("nothing to send; pass --opt and --val");
            }
            let pairs = codes.into_iter().zip(values).collect();
            let snapshot = client.send_command(pairs).await?;
            print_snapshot(&snapshot);
            Ok(())
        }
        Cmd::Watch => watch(&client).await,
    };

    client.shutdown().await;
    result
}

async fn watch(client: &DeviceClient) -> anyhow::Result<()> {
    let mut events = client.subscribe();
    println!("watching; ctrl-c to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    eprintln!("(skipped {} events)", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

fn print_event(event: &Event) {
    match event {
        Event::Connected(snapshot) => {
            println!("connected to {} ({})", snapshot.name, snapshot.id);
        }
        Event::Status(snapshot) | Event::Update(snapshot) => {
            println!(
                "{}: power={} mode={} target={} room={}",
                event.kind(),
                fmt_opt(snapshot.power()),
                fmt_opt(snapshot.mode()),
                fmt_opt(snapshot.target_temp()),
                fmt_opt(snapshot.room_temp()),
            );
        }
        Event::Error { detail } => println!("error: {}", detail),
        Event::Disconnected => println!("disconnected, rediscovering"),
    }
}

fn print_snapshot(snapshot: &DeviceSnapshot) {
    println!("device:  {} ({})", snapshot.name, snapshot.id);
    println!("bound:   {}", snapshot.bound);
    println!("power:   {}", fmt_opt(snapshot.power()));
    println!("mode:    {}", fmt_opt(snapshot.mode()));
    println!("target:  {}", fmt_opt(snapshot.target_temp()));
    println!("room:    {}", fmt_opt(snapshot.room_temp()));
    println!("fan:     {}", fmt_opt(snapshot.fan_speed()));
    if !snapshot.props.is_empty() {
        println!("raw:");
        for (code, value) in &snapshot.props {
            println!("  {:<12} {}", code, value);
        }
    }
}

fn fmt_opt<T: std::fmt::Debug>(value: Option<T>) -> String {
    match value {
        Some(v) => format!("{:?}", v),
        None => "-".into(),
    }
}

fn parse_on_off(s: &str) -> anyhow::Result<bool> {
    match s {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        other => bail!("expected on|off, got {:?}", other),
    }
}

fn parse_mode(s: &str) -> anyhow::Result<Mode> {
    match s {
        "auto" => Ok(Mode::Auto),
        "cool" => Ok(Mode::Cool),
        "dry" => Ok(Mode::Dry),
        "fan" => Ok(Mode::Fan),
        "heat" => Ok(Mode::Heat),
        other => bail!("unknown mode {:?}", other),
    }
}

fn parse_fan(s: &str) -> anyhow::Result<FanSpeed> {
    let speed = match s {
        "auto" | "0" => FanSpeed::Auto,
        "low" | "1" => FanSpeed::Low,
        "2" => FanSpeed::MediumLow,
        "medium" | "3" => FanSpeed::Medium,
        "4" => FanSpeed::MediumHigh,
        "high" | "5" => FanSpeed::High,
        other => bail!("unknown fan speed {:?}", other),
    };
    Ok(speed)
}

fn parse_swing(s: &str) -> anyhow::Result<VerticalSwing> {
    let swing = match s {
        "default" => VerticalSwing::Default,
        "full" => VerticalSwing::Full,
        "top" => VerticalSwing::FixedTop,
        "upper" => VerticalSwing::FixedUpper,
        "middle" => VerticalSwing::FixedMiddle,
        "lower" => VerticalSwing::FixedLower,
        "bottom" => VerticalSwing::FixedBottom,
        other => bail!("unknown swing position {:?}", other),
    };
    Ok(swing)
}
