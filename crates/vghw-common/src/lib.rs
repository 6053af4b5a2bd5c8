use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    /// WebSocket endpoint of the game server, e.g. `ws://localhost:8080/api/ws`.
    pub url: String,
    /// Sent to the server in the `VGHW-Username` cookie.
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
}

impl TargetConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

/// The sequence of load phases to run. Every phase joins the same level and
/// lasts the same amount of time; only the number of clients changes.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SweepConfig {
    pub level: u32,
    pub duration_secs: u64,
    pub concurrencies: Vec<usize>,
    /// Period between intermediate reports. Zero disables them and a single
    /// report covering the whole phase is produced instead.
    pub report_interval_ms: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            level: 1,
            duration_secs: 5,
            concurrencies: vec![10, 50, 100, 200],
            report_interval_ms: 0,
        }
    }
}

impl SweepConfig {
    /// One phase per configured concurrency level, in order.
    pub fn phases(&self) -> Vec<PhaseConfig> {
        self.concurrencies
            .iter()
            .map(|&concurrency| PhaseConfig {
                level: self.level,
                duration: Duration::from_secs(self.duration_secs),
                concurrency,
                report_interval: Duration::from_millis(self.report_interval_ms),
            })
            .collect()
    }
}

/// Parameters of a single load phase. Never changes once the phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConfig {
    /// Level every client joins after the server greets it.
    pub level: u32,
    pub duration: Duration,
    pub concurrency: usize,
    /// `Duration::ZERO` disables periodic reports.
    pub report_interval: Duration,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9100,
        }
    }
}

fn default_username() -> String {
    "floodie".to_string()
}

fn default_dial_timeout_ms() -> u64 {
    5_000
}
