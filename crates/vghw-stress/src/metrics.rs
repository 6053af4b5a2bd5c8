use crate::engine::driver::ACTIVE_DRIVERS;
use crate::sweep::Summary;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::atomic::Ordering;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref DRIVER_GAUGE: IntGauge = IntGauge::new(
        "vghw_stress_active_drivers",
        "Number of simulated clients currently connected"
    )
    .expect("metric can be created");
    pub static ref COMMANDS_SENT: IntCounter = IntCounter::new(
        "vghw_stress_commands_sent_total",
        "Total number of MOVE commands produced by movement emitters"
    )
    .expect("metric can be created");
    pub static ref UPDATES_RECEIVED: IntCounter = IntCounter::new(
        "vghw_stress_updates_received_total",
        "Total number of ENTITY_MOVE events received"
    )
    .expect("metric can be created");
    /// Connections that could not be established
    pub static ref DIAL_FAILURES: IntCounter = IntCounter::new(
        "vghw_stress_dial_failures_total",
        "Total number of failed connection attempts"
    )
    .expect("metric can be created");
    /// Drivers or emitters that ended with an unexpected error
    pub static ref DRIVER_FAILURES: IntCounter = IntCounter::new(
        "vghw_stress_driver_failures_total",
        "Total number of drivers and emitters terminated by an error"
    )
    .expect("metric can be created");

    // Figures of the most recent report window.
    pub static ref PHASE_CONCURRENCY: IntGauge = IntGauge::new(
        "vghw_stress_phase_concurrency",
        "Concurrency level of the most recently reported phase"
    )
    .expect("metric can be created");
    pub static ref PHASE_SEND_RATE: Gauge = Gauge::new(
        "vghw_stress_phase_send_rate",
        "Commands per second per client in the last report window"
    )
    .expect("metric can be created");
    pub static ref PHASE_UPDATE_RATE: Gauge = Gauge::new(
        "vghw_stress_phase_update_rate",
        "Entity updates per second per client in the last report window"
    )
    .expect("metric can be created");
    pub static ref PHASE_MOVEMENT_LATENCY: Gauge = Gauge::new(
        "vghw_stress_phase_movement_latency_seconds",
        "Rolling gap between entity updates at the end of the last report window"
    )
    .expect("metric can be created");
    pub static ref REPORTS_EMITTED: IntCounter = IntCounter::new(
        "vghw_stress_reports_total",
        "Total number of report windows produced"
    )
    .expect("metric can be created");
}

pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(DRIVER_GAUGE.clone()));
    let _ = REGISTRY.register(Box::new(COMMANDS_SENT.clone()));
    let _ = REGISTRY.register(Box::new(UPDATES_RECEIVED.clone()));
    let _ = REGISTRY.register(Box::new(DIAL_FAILURES.clone()));
    let _ = REGISTRY.register(Box::new(DRIVER_FAILURES.clone()));
    let _ = REGISTRY.register(Box::new(PHASE_CONCURRENCY.clone()));
    let _ = REGISTRY.register(Box::new(PHASE_SEND_RATE.clone()));
    let _ = REGISTRY.register(Box::new(PHASE_UPDATE_RATE.clone()));
    let _ = REGISTRY.register(Box::new(PHASE_MOVEMENT_LATENCY.clone()));
    let _ = REGISTRY.register(Box::new(REPORTS_EMITTED.clone()));
}

/// Publish the per-client figures of a report so a scraper sees the same
/// numbers that are printed.
pub fn record_summary(summary: &Summary) {
    PHASE_CONCURRENCY.set(summary.concurrency as i64);
    PHASE_SEND_RATE.set(summary.send_rate);
    PHASE_UPDATE_RATE.set(summary.update_rate);
    PHASE_MOVEMENT_LATENCY.set(summary.movement_latency.as_secs_f64());
    REPORTS_EMITTED.inc();
}

fn update_metrics() {
    let count = ACTIVE_DRIVERS.load(Ordering::SeqCst) as i64;
    DRIVER_GAUGE.set(count);
}

pub fn render_metrics() -> String {
    update_metrics();

    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| "# Error: Invalid UTF8".to_string())
}
