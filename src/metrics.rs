//! Monotonic counters exposed on `/metrics`, plus Prometheus text rendering.

use std::sync::atomic::{AtomicU64, Ordering};

/// The relay's four counters (spec §4.B). Cheap to clone (an `Arc` wrapper is
/// expected at the call sites that share it across tasks).
#[derive(Debug, Default)]
pub struct Metrics {
    pub pkt_to_udp_total: AtomicU64,
    pub pkt_to_dc_total: AtomicU64,
    pub go_to_python_total: AtomicU64,
    pub python_to_go_total: AtomicU64,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pkt_to_udp(&self) {
        self.pkt_to_udp_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pkt_to_dc(&self) {
        self.pkt_to_dc_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_go_to_python(&self) {
        self.go_to_python_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_python_to_go(&self) {
        self.python_to_go_total.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pkt_to_udp_total: self.pkt_to_udp_total.load(Ordering::Relaxed),
            pkt_to_dc_total: self.pkt_to_dc_total.load(Ordering::Relaxed),
            go_to_python_total: self.go_to_python_total.load(Ordering::Relaxed),
            python_to_go_total: self.python_to_go_total.load(Ordering::Relaxed),
        }
    }

    /// Render the four counters in Prometheus text exposition format.
    #[must_use]
    pub fn render_prometheus(&self) -> String {
        render_prometheus_snapshot(&self.snapshot())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pkt_to_udp_total: u64,
    pub pkt_to_dc_total: u64,
    pub go_to_python_total: u64,
    pub python_to_go_total: u64,
}

fn render_prometheus_snapshot(snapshot: &MetricsSnapshot) -> String {
    use std::fmt::Write;

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} counter");
        let _ = writeln!(buf, "{name} {value}");
    }

    let mut buf = String::new();
    counter(
        &mut buf,
        "pkt_to_udp_total",
        "Packets forwarded from a DataChannel to a backend UDP socket",
        snapshot.pkt_to_udp_total,
    );
    counter(
        &mut buf,
        "pkt_to_dc_total",
        "Packets forwarded from a backend UDP socket to a DataChannel",
        snapshot.pkt_to_dc_total,
    );
    counter(
        &mut buf,
        "go_to_python_total",
        "Sidecar ingress packets received over POST /game-packet",
        snapshot.go_to_python_total,
    );
    counter(
        &mut buf,
        "python_to_go_total",
        "Sidecar egress packets sent over WS /ws-from-go",
        snapshot.python_to_go_total,
    );
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = Metrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pkt_to_udp_total, 0);
        assert_eq!(snapshot.pkt_to_dc_total, 0);
    }

    #[test]
    fn increments_are_observable() {
        let metrics = Metrics::new();
        metrics.inc_pkt_to_udp();
        metrics.inc_pkt_to_udp();
        metrics.inc_pkt_to_dc();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pkt_to_udp_total, 2);
        assert_eq!(snapshot.pkt_to_dc_total, 1);
    }

    #[test]
    fn prometheus_rendering_includes_help_and_type() {
        let metrics = Metrics::new();
        metrics.inc_pkt_to_udp();
        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("# HELP pkt_to_udp_total"));
        assert!(rendered.contains("# TYPE pkt_to_udp_total counter"));
        assert!(rendered.contains("pkt_to_udp_total 1"));
    }
}
