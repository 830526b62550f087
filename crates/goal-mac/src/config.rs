//! TOML-based configuration for the GOAL MAC.

use core::time::Duration;
use std::path::Path;

use serde::Deserialize;

use crate::backoff::BackoffKind;
use crate::error::MacError;

/// MAC configuration. Duration-valued options are expressed in seconds in
/// the TOML surface; accessor methods return `Duration`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// Maximum number of data packets bundled into one REQUEST round.
    pub max_burst: usize,
    /// Maximum retransmissions per packet before it is dropped.
    pub max_retrans: u8,
    /// Which backoff geometry to use when evaluating a REQUEST.
    pub backoff_kind: BackoffKind,
    /// Maximum VBF backoff delay, seconds.
    pub vbf_max_delay_secs: f64,
    /// Radius of the forwarding pipe, meters.
    pub pipe_width: f64,
    /// Acoustic transmission radius, meters.
    pub tx_radius: f64,
    /// Sound propagation speed, meters per second.
    pub prop_speed: f64,
    /// Gap between consecutive DATA packets of one burst, seconds.
    pub data_packet_interval_secs: f64,
    /// Guard pad around predicted receive windows, seconds.
    pub guard_time_secs: f64,
    /// How long receive-history entries are retained, seconds.
    pub recv_history_retention_secs: f64,
    /// Maximum random wait before starting the next round, seconds.
    pub next_round_max_wait_secs: f64,
    /// Slack added to timing estimates, seconds.
    pub estimate_error_secs: f64,
    /// Guard band of the reservation schedule, seconds.
    pub min_interval_secs: f64,
    /// Spacing interval for big (DATA) reservations, seconds.
    pub big_interval_secs: f64,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            max_burst: 5,
            max_retrans: 6,
            backoff_kind: BackoffKind::Vbf,
            vbf_max_delay_secs: 2.0,
            pipe_width: 100.0,
            tx_radius: 100.0,
            prop_speed: 1500.0,
            data_packet_interval_secs: 0.0001,
            guard_time_secs: 0.05,
            recv_history_retention_secs: 100.0,
            next_round_max_wait_secs: 1.0,
            estimate_error_secs: 0.005,
            min_interval_secs: 0.01,
            big_interval_secs: 1.0,
        }
    }
}

impl MacConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, MacError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MacError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, MacError> {
        toml::from_str(s).map_err(|e| MacError::Config(format!("failed to parse config: {e}")))
    }

    pub fn vbf_max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.vbf_max_delay_secs)
    }

    pub fn data_packet_interval(&self) -> Duration {
        Duration::from_secs_f64(self.data_packet_interval_secs)
    }

    pub fn guard_time(&self) -> Duration {
        Duration::from_secs_f64(self.guard_time_secs)
    }

    pub fn recv_history_retention(&self) -> Duration {
        Duration::from_secs_f64(self.recv_history_retention_secs)
    }

    pub fn next_round_max_wait(&self) -> Duration {
        Duration::from_secs_f64(self.next_round_max_wait_secs)
    }

    pub fn estimate_error(&self) -> Duration {
        Duration::from_secs_f64(self.estimate_error_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(self.min_interval_secs)
    }

    pub fn big_interval(&self) -> Duration {
        Duration::from_secs_f64(self.big_interval_secs)
    }

    /// One-way propagation delay across the full transmission radius.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs_f64(self.tx_radius / self.prop_speed)
    }

    /// Upper bound on the REQUEST → REPLY contention phase, used to place
    /// the DATA reservation far enough in the future.
    pub fn max_backoff(&self) -> Duration {
        self.max_delay() * 4
            + Duration::from_secs_f64(self.vbf_max_delay_secs * 1.5)
            + Duration::from_secs(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = MacConfig::default();
        assert_eq!(cfg.max_burst, 5);
        assert_eq!(cfg.max_retrans, 6);
        assert_eq!(cfg.vbf_max_delay(), Duration::from_secs(2));
        assert_eq!(cfg.guard_time(), Duration::from_millis(50));
        assert_eq!(cfg.min_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_derived_values() {
        let cfg = MacConfig::default();
        // 100 m at 1500 m/s
        assert!((cfg.max_delay().as_secs_f64() - 0.0666).abs() < 1e-3);
        // 4 * max_delay + 1.5 * vbf_max_delay + 2 s, up to the nanosecond
        // rounding of the Duration conversions
        let expected = 4.0 * (100.0 / 1500.0) + 1.5 * 2.0 + 2.0;
        assert!((cfg.max_backoff().as_secs_f64() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_parse_overrides() {
        let cfg = MacConfig::parse(
            r#"
            max_burst = 3
            backoff_kind = "hop-by-hop-vbf"
            tx_radius = 250.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_burst, 3);
        assert_eq!(cfg.backoff_kind, BackoffKind::HopByHopVbf);
        assert_eq!(cfg.tx_radius, 250.0);
        // untouched options keep their defaults
        assert_eq!(cfg.max_retrans, 6);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = MacConfig::parse("max_burst = \"lots\"").unwrap_err();
        assert!(matches!(err, MacError::Config(_)));
    }
}
