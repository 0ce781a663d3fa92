//! Prometheus-compatible metrics endpoint
//!
//! Exposes combat-mode counters in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Metrics registry for the combat-mode controller
#[derive(Debug)]
pub struct Metrics {
    // Inbound events
    pub joins: AtomicU64,
    pub quits: AtomicU64,
    pub pvp_events: AtomicU64,
    pub pvp_swings: AtomicU64,
    pub deaths: AtomicU64,

    // Session lifecycle
    pub sessions_entered: AtomicU64,
    pub timeouts_fired: AtomicU64,
    pub timeouts_superseded: AtomicU64,
    pub bystanders_rearmed: AtomicU64,

    // Collaborator failures
    pub schedule_failures: AtomicU64,
    pub apply_failures: AtomicU64,
    pub detect_failures: AtomicU64,

    // Gauges
    pub active_sessions: AtomicU64,
    pub fast_preferences: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            joins: AtomicU64::new(0),
            quits: AtomicU64::new(0),
            pvp_events: AtomicU64::new(0),
            pvp_swings: AtomicU64::new(0),
            deaths: AtomicU64::new(0),
            sessions_entered: AtomicU64::new(0),
            timeouts_fired: AtomicU64::new(0),
            timeouts_superseded: AtomicU64::new(0),
            bystanders_rearmed: AtomicU64::new(0),
            schedule_failures: AtomicU64::new(0),
            apply_failures: AtomicU64::new(0),
            detect_failures: AtomicU64::new(0),
            active_sessions: AtomicU64::new(0),
            fast_preferences: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Refresh the state gauges
    pub fn set_gauges(&self, active_sessions: usize, fast_preferences: usize) {
        self.active_sessions
            .store(active_sessions as u64, Ordering::Relaxed);
        self.fast_preferences
            .store(fast_preferences as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("crossplay_combat_joins_total", "Participants joined", "counter",
            self.joins.load(Ordering::Relaxed));
        metric!("crossplay_combat_quits_total", "Participants quit", "counter",
            self.quits.load(Ordering::Relaxed));
        metric!("crossplay_combat_pvp_events_total", "Permitted PvP damage events", "counter",
            self.pvp_events.load(Ordering::Relaxed));
        metric!("crossplay_combat_pvp_swings_total", "Swing refreshes during PvP", "counter",
            self.pvp_swings.load(Ordering::Relaxed));
        metric!("crossplay_combat_deaths_total", "Participant deaths", "counter",
            self.deaths.load(Ordering::Relaxed));

        metric!("crossplay_combat_sessions_entered_total", "Fresh PvP windows opened", "counter",
            self.sessions_entered.load(Ordering::Relaxed));
        metric!("crossplay_combat_timeouts_fired_total", "PvP windows closed by timeout", "counter",
            self.timeouts_fired.load(Ordering::Relaxed));
        metric!("crossplay_combat_timeouts_superseded_total", "Timeout firings discarded as stale", "counter",
            self.timeouts_superseded.load(Ordering::Relaxed));
        metric!("crossplay_combat_bystanders_rearmed_total", "Bystander windows re-armed by a nearby death", "counter",
            self.bystanders_rearmed.load(Ordering::Relaxed));

        metric!("crossplay_combat_schedule_failures_total", "Timeouts that could not be armed", "counter",
            self.schedule_failures.load(Ordering::Relaxed));
        metric!("crossplay_combat_apply_failures_total", "Category applications rejected by the host", "counter",
            self.apply_failures.load(Ordering::Relaxed));
        metric!("crossplay_combat_detect_failures_total", "Companion detection failures", "counter",
            self.detect_failures.load(Ordering::Relaxed));

        metric!("crossplay_combat_active_sessions", "Participants inside a PvP window", "gauge",
            self.active_sessions.load(Ordering::Relaxed));
        metric!("crossplay_combat_fast_preferences", "Participants preferring fast combat", "gauge",
            self.fast_preferences.load(Ordering::Relaxed));
        metric!("crossplay_combat_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics (alternative for direct API access)
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "events": {
                "joins": self.joins.load(Ordering::Relaxed),
                "quits": self.quits.load(Ordering::Relaxed),
                "pvp_events": self.pvp_events.load(Ordering::Relaxed),
                "pvp_swings": self.pvp_swings.load(Ordering::Relaxed),
                "deaths": self.deaths.load(Ordering::Relaxed),
            },
            "sessions": {
                "entered": self.sessions_entered.load(Ordering::Relaxed),
                "timeouts_fired": self.timeouts_fired.load(Ordering::Relaxed),
                "timeouts_superseded": self.timeouts_superseded.load(Ordering::Relaxed),
                "bystanders_rearmed": self.bystanders_rearmed.load(Ordering::Relaxed),
                "active": self.active_sessions.load(Ordering::Relaxed),
            },
            "failures": {
                "schedule": self.schedule_failures.load(Ordering::Relaxed),
                "apply": self.apply_failures.load(Ordering::Relaxed),
                "detect": self.detect_failures.load(Ordering::Relaxed),
            },
            "fast_preferences": self.fast_preferences.load(Ordering::Relaxed),
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    // JSON first: "/metrics/json" also starts with "/metrics"
                    let response = if request.starts_with("GET /metrics/json") {
                        http_ok("application/json", &metrics.to_json())
                    } else if request.starts_with("GET /metrics") {
                        http_ok("text/plain; version=0.0.4", &metrics.to_prometheus())
                    } else if request.starts_with("GET /health") {
                        http_ok("text/plain", "OK")
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

fn http_ok(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.joins.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.active_sessions.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_incr_and_gauges() {
        let metrics = Metrics::new();
        Metrics::incr(&metrics.pvp_events);
        Metrics::incr(&metrics.pvp_events);
        Metrics::add(&metrics.bystanders_rearmed, 5);
        Metrics::add(&metrics.bystanders_rearmed, 0);
        metrics.set_gauges(3, 7);

        assert_eq!(metrics.pvp_events.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.bystanders_rearmed.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.active_sessions.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.fast_preferences.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.timeouts_fired.store(12, Ordering::Relaxed);
        metrics.set_gauges(2, 0);

        let output = metrics.to_prometheus();

        assert!(output.contains("crossplay_combat_timeouts_fired_total 12"));
        assert!(output.contains("crossplay_combat_active_sessions 2"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE crossplay_combat_active_sessions gauge"));
    }

    #[test]
    fn test_json_format() {
        let metrics = Metrics::new();
        metrics.deaths.store(4, Ordering::Relaxed);

        let value: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(value["events"]["deaths"], 4);
        assert_eq!(value["failures"]["schedule"], 0);
    }
}
