//! Consumer of the sonar driver.
//!
//! Polls the selected channels, converts each round-trip time into a
//! dead-zone adjusted, range-clamped value and relays it over UDP as a
//! fixed-size binary [`ReadingRecord`].
//!
//! # Example
//!
//! ```no_run
//! use sonar_driver::DeviceRegistry;
//! use sonar_hardware::MonotonicClock;
//! use sonar_relay::{Poller, RelayConfig, UdpRelay, simulate};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config: RelayConfig = "target = \"127.0.0.1:14141\"".parse()?;
//! let clock = Arc::new(MonotonicClock::new());
//! let backend = simulate::simulated_backend(&config.driver, clock.clone());
//! let registry = Arc::new(DeviceRegistry::init(backend, clock, config.driver.clone())?);
//!
//! let relay = UdpRelay::bind(config.target, config.layout).await?;
//! let poller = Poller::new(
//!     registry,
//!     &config.channels,
//!     relay,
//!     config.converter(),
//!     config.payload,
//!     config.poll_interval(),
//! )?;
//! let stats = poller.run(CancellationToken::new()).await;
//! println!("{stats:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod poller;
pub mod record;
pub mod sender;
pub mod simulate;

pub use config::RelayConfig;
pub use distance::DistanceConverter;
pub use error::{RelayError, Result};
pub use poller::{PollStats, Poller};
pub use record::{PayloadUnit, ReadingRecord, RecordLayout};
pub use sender::UdpRelay;
