//! Global measurement serialization and rate limiting.
//!
//! At most one trigger/echo cycle runs at a time across all channels, and a
//! new cycle may not start until the minimum interval has passed since the
//! last recorded measurement.

use crate::config::RateLimitPolicy;
use sonar_core::{Error, Result, Timestamp};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    last_measurement: Option<Timestamp>,
}

/// Mutual exclusion for measurement cycles plus the last-measurement time.
#[derive(Debug)]
pub struct SerializationGate {
    state: Mutex<GateState>,
    min_interval_ns: u64,
    policy: RateLimitPolicy,
}

/// Exclusive access to the gate. Released on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    state: MutexGuard<'a, GateState>,
    min_interval_ns: u64,
    policy: RateLimitPolicy,
}

impl SerializationGate {
    pub fn new(min_interval: Duration, policy: RateLimitPolicy) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            min_interval_ns: u64::try_from(min_interval.as_nanos()).unwrap_or(u64::MAX),
            policy,
        }
    }

    /// Wait for exclusive access.
    ///
    /// An uncontended gate is taken even if `cancel` has already fired.
    ///
    /// # Errors
    ///
    /// Returns `Error::Interrupted` if `cancel` fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GateGuard<'_>> {
        let state = tokio::select! {
            biased;
            state = self.state.lock() => state,
            _ = cancel.cancelled() => {
                debug!("Gate acquisition interrupted");
                return Err(Error::Interrupted);
            }
        };

        Ok(GateGuard {
            state,
            min_interval_ns: self.min_interval_ns,
            policy: self.policy,
        })
    }

    /// Time of the last recorded measurement. Waits for any cycle in progress.
    pub async fn last_measurement(&self) -> Option<Timestamp> {
        self.state.lock().await.last_measurement
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }
}

impl GateGuard<'_> {
    /// Reject a cycle starting at `now` if it is too close to the last one.
    ///
    /// # Errors
    ///
    /// Returns `Error::TooFrequent` when less than the minimum interval has
    /// elapsed.
    pub fn check_rate_limit(&self, now: Timestamp) -> Result<()> {
        let Some(last) = self.state.last_measurement else {
            return Ok(());
        };

        let elapsed_ns = now.nanos_since(last);
        if elapsed_ns < self.min_interval_ns {
            debug!(elapsed_ns, "Consecutive calls");
            return Err(Error::TooFrequent {
                elapsed_ns,
                min_interval_ns: self.min_interval_ns,
            });
        }
        Ok(())
    }

    pub fn record_success(&mut self, now: Timestamp) {
        self.state.last_measurement = Some(now);
    }

    /// Record a cycle that triggered the sensor but produced no result.
    pub fn record_failure(&mut self, now: Timestamp) {
        if self.policy == RateLimitPolicy::EveryAttempt {
            self.state.last_measurement = Some(now);
        }
    }

    pub fn last_measurement(&self) -> Option<Timestamp> {
        self.state.last_measurement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MIN_INTERVAL: Duration = Duration::from_micros(600);

    fn at_us(us: u64) -> Timestamp {
        Timestamp::from_nanos(us * 1_000)
    }

    #[tokio::test]
    async fn test_first_measurement_is_not_limited() {
        let gate = SerializationGate::new(MIN_INTERVAL, RateLimitPolicy::SuccessOnly);
        let guard = gate.acquire(&CancellationToken::new()).await.unwrap();
        assert!(guard.check_rate_limit(Timestamp::ZERO).is_ok());
    }

    #[tokio::test]
    async fn test_interval_enforced() {
        let gate = SerializationGate::new(MIN_INTERVAL, RateLimitPolicy::SuccessOnly);
        let cancel = CancellationToken::new();

        let mut guard = gate.acquire(&cancel).await.unwrap();
        guard.record_success(at_us(1_000));
        drop(guard);

        let guard = gate.acquire(&cancel).await.unwrap();
        let err = guard.check_rate_limit(at_us(1_200)).unwrap_err();
        assert!(matches!(
            err,
            Error::TooFrequent {
                elapsed_ns: 200_000,
                min_interval_ns: 600_000
            }
        ));
        assert!(guard.check_rate_limit(at_us(1_600)).is_ok());
    }

    #[tokio::test]
    async fn test_failure_policy() {
        let cancel = CancellationToken::new();

        let gate = SerializationGate::new(MIN_INTERVAL, RateLimitPolicy::SuccessOnly);
        gate.acquire(&cancel).await.unwrap().record_failure(at_us(1_000));
        assert_eq!(gate.last_measurement().await, None);

        let gate = SerializationGate::new(MIN_INTERVAL, RateLimitPolicy::EveryAttempt);
        gate.acquire(&cancel).await.unwrap().record_failure(at_us(1_000));
        assert_eq!(gate.last_measurement().await, Some(at_us(1_000)));
    }

    #[tokio::test]
    async fn test_uncontended_acquire_ignores_cancellation() {
        let gate = SerializationGate::new(MIN_INTERVAL, RateLimitPolicy::SuccessOnly);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(gate.acquire(&cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_waiting_acquire_can_be_cancelled() {
        let gate = Arc::new(SerializationGate::new(
            MIN_INTERVAL,
            RateLimitPolicy::SuccessOnly,
        ));
        let held = gate.acquire(&CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        cancel.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
        drop(held);
    }

    #[tokio::test]
    async fn test_release_wakes_waiter() {
        let gate = Arc::new(SerializationGate::new(
            MIN_INTERVAL,
            RateLimitPolicy::SuccessOnly,
        ));
        let held = gate.acquire(&CancellationToken::new()).await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.acquire(&CancellationToken::new())
                    .await
                    .map(|guard| guard.last_measurement())
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut held = held;
        held.record_success(at_us(42));
        drop(held);

        assert_eq!(waiter.await.unwrap().unwrap(), Some(at_us(42)));
    }
}
