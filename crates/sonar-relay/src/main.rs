//! `sonar-relay`: read the sonar channels and relay readings over UDP.
//!
//! ```text
//! sonar-relay [CHANNEL] [--config PATH] [--simulate]
//! ```
//!
//! Without `CHANNEL`, every configured channel is polled. Log verbosity is
//! controlled with `RUST_LOG` (default `info`).

use anyhow::{Context, Result, bail};
use sonar_core::ChannelId;
use sonar_driver::DeviceRegistry;
use sonar_hardware::{Clock, GpioBackend, MonotonicClock};
use sonar_relay::{Poller, RelayConfig, UdpRelay, simulate};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: sonar-relay [CHANNEL] [--config PATH] [--simulate]";

#[derive(Debug, Default)]
struct Args {
    channel: Option<ChannelId>,
    config: Option<PathBuf>,
    simulate: bool,
    help: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "--simulate" => parsed.simulate = true,
                "-c" | "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                other if parsed.channel.is_none() && !other.starts_with('-') => {
                    let channel = other
                        .parse()
                        .with_context(|| format!("invalid channel '{other}'\n{USAGE}"))?;
                    parsed.channel = Some(channel);
                }
                other => bail!("unexpected argument '{other}'\n{USAGE}"),
            }
        }
        Ok(parsed)
    }
}

fn backend(config: &RelayConfig, clock: Arc<dyn Clock>) -> Result<Arc<dyn GpioBackend>> {
    if config.simulate {
        warn!("Using simulated sensors");
        return Ok(simulate::simulated_backend(&config.driver, clock));
    }
    hardware_backend(config)
}

#[cfg(feature = "hardware-gpio-cdev")]
fn hardware_backend(config: &RelayConfig) -> Result<Arc<dyn GpioBackend>> {
    let gpio = sonar_hardware::cdev::CdevGpio::open(&config.gpio_chip)
        .with_context(|| format!("opening {}", config.gpio_chip.display()))?;
    Ok(Arc::new(gpio))
}

#[cfg(not(feature = "hardware-gpio-cdev"))]
fn hardware_backend(_config: &RelayConfig) -> Result<Arc<dyn GpioBackend>> {
    bail!("built without the hardware-gpio-cdev feature; use --simulate or set simulate = true")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(channel) = args.channel {
        config.channels = vec![channel];
    }
    config.simulate |= args.simulate;
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let backend = backend(&config, Arc::clone(&clock))?;
    let registry = Arc::new(
        DeviceRegistry::init(backend, clock, config.driver.clone())
            .context("initializing sonar driver")?,
    );

    let relay = UdpRelay::bind(config.target, config.layout).await?;
    let poller = Poller::new(
        registry,
        &config.channels,
        relay,
        config.converter(),
        config.payload,
        config.poll_interval(),
    )?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
        signal.cancel();
    });

    let stats = poller.run(shutdown).await;
    info!("Sent {} readings ({} read errors, {} send errors)", stats.sent, stats.read_errors, stats.send_errors);
    Ok(())
}
