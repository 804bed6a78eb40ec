use std::time::Duration;

use unite_config::AppConfig;
use unite_retry::RetryPolicy;
use unite_types::Timelocks;

/// Runtime knobs for the coordinator
#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    /// Seconds a committed resolver has to get both escrows funded
    pub grace_period_secs: u64,

    /// Interval between escrow state polls for one order
    pub poll_interval: Duration,

    /// Interval between expiry / cancellation sweeps
    pub sweep_interval: Duration,

    /// Timelocks handed to resolvers in escrow instructions
    pub timelocks: Timelocks,

    /// Retry policy for the coordinator's own destination withdrawal
    pub withdraw_retry: RetryPolicy,

    /// Maximum orders inspected per status in one sweep
    pub sweep_batch: usize,
}

impl CoordinatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            grace_period_secs: config.coordinator.grace_period_secs,
            poll_interval: config.coordinator.poll_interval(),
            sweep_interval: config.coordinator.sweep_interval(),
            timelocks: config.timelocks.timelocks(),
            withdraw_retry: RetryPolicy::new(
                Duration::from_millis(config.resolver.retry_initial_delay_ms),
                Duration::from_millis(config.resolver.retry_max_delay_ms),
                5,
            ),
            ..Self::default()
        }
    }

    pub fn with_grace_period(mut self, secs: u64) -> Self {
        self.grace_period_secs = secs;
        self
    }

    pub fn with_timelocks(mut self, timelocks: Timelocks) -> Self {
        self.timelocks = timelocks;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_withdraw_retry(mut self, policy: RetryPolicy) -> Self {
        self.withdraw_retry = policy;
        self
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            grace_period_secs: 300, // 5 minutes
            poll_interval: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(10),
            timelocks: Timelocks::default(),
            withdraw_retry: RetryPolicy::default(),
            sweep_batch: 500,
        }
    }
}
