//! Tuning options for the push channel.

use std::time::Duration;

use bc_core::config::ChannelConfig;
use bc_core::constants;

use crate::backoff::Backoff;

/// Options recognized by the channel client.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOptions {
    /// First reconnect wait.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Connection attempts after which reconnecting stops (`None` = unbounded).
    pub max_retries: Option<u32>,
    /// Keepalive period while open (`None` disables heartbeats).
    pub heartbeat_interval: Option<Duration>,
    /// Random jitter on reconnect waits, 0.0 to 1.0. Zero keeps exact timing.
    pub jitter_factor: f64,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(constants::DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(constants::DEFAULT_MAX_DELAY_MS),
            max_retries: None,
            heartbeat_interval: Some(Duration::from_millis(constants::DEFAULT_HEARTBEAT_INTERVAL_MS)),
            jitter_factor: 0.0,
        }
    }
}

impl ChannelOptions {
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the heartbeat period; a zero duration disables heartbeats.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval).filter(|d| !d.is_zero());
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat_interval = None;
        self
    }

    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// The reconnect schedule described by these options.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay).with_jitter(self.jitter_factor)
    }

    /// Effective heartbeat period, treating zero as disabled.
    pub fn heartbeat(&self) -> Option<Duration> {
        self.heartbeat_interval.filter(|d| !d.is_zero())
    }

    /// Whether `attempts` consecutive attempts have spent the retry budget.
    pub fn retries_exhausted(&self, attempts: u32) -> bool {
        self.max_retries.is_some_and(|max| attempts >= max)
    }
}

impl From<&ChannelConfig> for ChannelOptions {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_retries: config.max_retries,
            heartbeat_interval: Some(Duration::from_millis(config.heartbeat_interval_ms))
                .filter(|d| !d.is_zero()),
            jitter_factor: config.jitter_factor,
        }
    }
}
