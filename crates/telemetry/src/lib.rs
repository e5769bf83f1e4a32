//! Logging and metrics for SlimSnap
//!
//! - Structured logging with tracing, filtered by `RUST_LOG` or the
//!   configured level
//! - An in-process metrics registry, exportable as JSON
//! - Timers feeding latency histograms

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use slimsnap_core::config::TelemetrySection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Metric names recorded by the compressor.
pub mod names {
    /// Images compressed successfully
    pub const IMAGES_COMPRESSED: &str = "images_compressed";
    /// Images whose compression failed
    pub const IMAGES_FAILED: &str = "images_failed";
    /// Bytes saved across compressed images
    pub const BYTES_SAVED: &str = "bytes_saved";
    /// Per-image compression latency, milliseconds
    pub const COMPRESS_MS: &str = "compress_ms";
    /// Images in the most recent batch
    pub const BATCH_SIZE: &str = "batch_size";
}

static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Initialize logging with the default configuration
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize logging. Fails if a global subscriber is already installed.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .compact(),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );

    Ok(())
}

/// Id of this process, for correlating log lines
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TelemetryConfig {
    /// Raise the level for `-v` flags: 1 = info, 2 = debug, 3+ = trace.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        self.log_level = level.to_string();
        self.show_target = verbose >= 2;
        self
    }
}

impl From<&TelemetrySection> for TelemetryConfig {
    fn from(section: &TelemetrySection) -> Self {
        Self {
            log_level: section.log_level.clone(),
            ..Self::default()
        }
    }
}

/// Counters, gauges and histograms kept in memory
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
    start_time: Instant,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by a specific amount
    pub fn increment_by(&self, name: &str, value: u64) {
        {
            let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(counter) = counters.get(name) {
                counter.fetch_add(value, Ordering::Relaxed);
                return;
            }
        }
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Current value of a counter, 0 if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &str, value: u64) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Record a histogram value
    pub fn histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write().unwrap_or_else(PoisonError::into_inner);
        histograms.entry(name.to_string()).or_default().push(value);
    }

    /// Statistics for one histogram
    pub fn histogram_stats(&self, name: &str) -> HistogramStats {
        let histograms = self.histograms.read().unwrap_or_else(PoisonError::into_inner);
        HistogramStats::from_values(histograms.get(name).map_or(&[][..], Vec::as_slice))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let histograms = self.histograms.read().unwrap_or_else(PoisonError::into_inner);

        let counter_values: HashMap<&str, u64> = counters
            .iter()
            .map(|(k, v)| (k.as_str(), v.load(Ordering::Relaxed)))
            .collect();

        let gauge_values: HashMap<&str, u64> = gauges
            .iter()
            .map(|(k, v)| (k.as_str(), v.load(Ordering::Relaxed)))
            .collect();

        let histogram_stats: HashMap<&str, HistogramStats> = histograms
            .iter()
            .map(|(k, v)| (k.as_str(), HistogramStats::from_values(v)))
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "uptime_secs": self.uptime_secs(),
            "counters": counter_values,
            "gauges": gauge_values,
            "histograms": histogram_stats,
        })
    }
}

/// Histogram statistics
#[derive(Debug, Default, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Get the global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Measures one operation into a histogram of the global registry.
///
/// The duration is recorded once: by [`Timer::stop`], or on drop.
pub struct Timer {
    name: String,
    start: Instant,
    recorded: bool,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let duration = self.start.elapsed();
        if !self.recorded {
            self.recorded = true;
            metrics().histogram(&self.name, duration.as_secs_f64() * 1000.0);
            tracing::trace!(
                metric = %self.name,
                duration_ms = duration.as_millis() as u64,
                "Timer completed"
            );
        }
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.record();
    }
}

/// A structured event, logged and optionally printed as JSON
#[derive(Debug, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id().to_string(),
            event_type: event_type.into(),
            data,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            event_type = %self.event_type,
            data = %self.data,
            "Event recorded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter() {
        let registry = MetricsRegistry::new();
        registry.increment(names::IMAGES_COMPRESSED);
        registry.increment(names::IMAGES_COMPRESSED);
        registry.increment_by(names::IMAGES_COMPRESSED, 3);

        assert_eq!(registry.counter(names::IMAGES_COMPRESSED), 5);
        assert_eq!(registry.counter(names::IMAGES_FAILED), 0);
    }

    #[test]
    fn test_metrics_gauge() {
        let registry = MetricsRegistry::new();
        registry.gauge("working_set", 2);
        registry.gauge("working_set", 3);

        let gauges = registry.gauges.read().unwrap();
        assert_eq!(gauges.get("working_set").unwrap().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_histogram_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = HistogramStats::from_values(&values);

        assert_eq!(stats.count, 10);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.mean, 5.5);
    }

    #[test]
    fn test_export_json_shape() {
        let registry = MetricsRegistry::new();
        registry.increment_by(names::BYTES_SAVED, 2048);
        registry.histogram(names::COMPRESS_MS, 12.5);

        let json = registry.export_json();
        assert_eq!(json["counters"]["bytes_saved"], 2048);
        assert_eq!(json["histograms"]["compress_ms"]["count"], 1);
        assert_eq!(json["session_id"], session_id());
    }

    #[test]
    fn test_timer_records_once() {
        let timer = Timer::start("test_timer_records_once");
        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.stop();
        assert!(duration.as_millis() >= 10);
        assert_eq!(metrics().histogram_stats("test_timer_records_once").count, 1);
    }

    #[test]
    fn test_timer_records_on_drop() {
        {
            let _timer = Timer::start("test_timer_records_on_drop");
        }
        assert_eq!(metrics().histogram_stats("test_timer_records_on_drop").count, 1);
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(TelemetryConfig::default().with_verbosity(0).log_level, "warn");
        assert_eq!(TelemetryConfig::default().with_verbosity(2).log_level, "debug");
        assert_eq!(TelemetryConfig::default().with_verbosity(9).log_level, "trace");
    }

    #[test]
    fn test_from_config_section() {
        let section = TelemetrySection {
            log_level: "slimsnap=debug".into(),
        };
        assert_eq!(TelemetryConfig::from(&section).log_level, "slimsnap=debug");
    }

    #[test]
    fn test_session_id() {
        assert!(Uuid::parse_str(session_id()).is_ok());
    }
}
