//! monitor.toml configuration parser.
//!
//! Durations are strings such as `"500ms"`, `"5s"` or `"2m"`; a bare number
//! is seconds. `bootstrap_timeout` additionally accepts `"-1"` or `"none"`
//! for "no limit".

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REST_BIND: &str = "0.0.0.0:50088";
pub const DEFAULT_REST_HISTORY: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub monitor: MonitorSection,
    #[serde(default)]
    pub reporter: ReporterConfig,
    #[serde(default)]
    pub probes: ProbesConfig,
    #[serde(default)]
    pub dependencies: DependenciesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    pub name: String,
    pub description: Option<String>,
    pub probe_interval: Option<String>,
    pub report_interval: Option<String>,
    pub probe_timeout: Option<String>,
    pub bootstrap_timeout: Option<String>,
    pub safe_mode_policy: Option<SafeModePolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub kind: ReporterKind,
    pub exit_on_probe_failure: Option<bool>,
    pub bind: Option<String>,
    pub history: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReporterKind {
    #[default]
    Log,
    Rest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbesConfig {
    pub port: Option<PortProbeConfig>,
    pub pid: Option<PidProbeConfig>,
    pub http: Option<HttpProbeConfig>,
    pub list_dir: Option<ListDirProbeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependenciesConfig {
    pub safe_mode: Option<SafeModeProbeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortProbeConfig {
    pub host: Option<String>,
    pub port: u16,
    pub connect_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidProbeConfig {
    pub pid_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProbeConfig {
    pub url: String,
    pub min_status: Option<u16>,
    pub max_status: Option<u16>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDirProbeConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeModeProbeConfig {
    pub url: String,
    pub timeout: Option<String>,
}

/// How a dependency that has left safe mode once is treated if it re-enters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafeModePolicy {
    /// A dependency in safe mode never satisfies the gate.
    Strict,
    /// Once observed out of safe mode, later re-entry is ignored (for
    /// example safe mode toggled manually by an operator).
    #[default]
    IgnoreReentry,
}

/// Timing parameters for a reporting loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Pause between scheduling passes.
    pub probe_interval: Duration,
    /// Minimum spacing between heartbeats.
    pub report_interval: Duration,
    /// Upper bound on a single ping.
    pub probe_timeout: Duration,
    /// Upper bound on the bootstrap phase; `None` waits forever.
    pub bootstrap_timeout: Option<Duration>,
    pub safe_mode_policy: SafeModePolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            bootstrap_timeout: None,
            safe_mode_policy: SafeModePolicy::default(),
        }
    }
}

impl LoopConfig {
    /// Build from millisecond values; a negative bootstrap timeout disables
    /// the limit.
    pub fn from_millis(
        probe_interval: u64,
        report_interval: u64,
        probe_timeout: u64,
        bootstrap_timeout: i64,
    ) -> Self {
        Self {
            probe_interval: Duration::from_millis(probe_interval),
            report_interval: Duration::from_millis(report_interval),
            probe_timeout: Duration::from_millis(probe_timeout),
            bootstrap_timeout: u64::try_from(bootstrap_timeout)
                .ok()
                .map(Duration::from_millis),
            safe_mode_policy: SafeModePolicy::default(),
        }
    }

    pub fn with_safe_mode_policy(mut self, policy: SafeModePolicy) -> Self {
        self.safe_mode_policy = policy;
        self
    }

    /// Probe interval and probe timeout must be positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "probe interval must be positive".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "probe timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.loop_config()?;
        Ok(config)
    }

    /// Resolve the `[monitor]` timings, applying defaults.
    pub fn loop_config(&self) -> Result<LoopConfig, ConfigError> {
        let m = &self.monitor;
        let config = LoopConfig {
            probe_interval: duration_or(
                "probe_interval",
                m.probe_interval.as_deref(),
                DEFAULT_PROBE_INTERVAL,
            )?,
            report_interval: duration_or(
                "report_interval",
                m.report_interval.as_deref(),
                DEFAULT_REPORT_INTERVAL,
            )?,
            probe_timeout: duration_or(
                "probe_timeout",
                m.probe_timeout.as_deref(),
                DEFAULT_PROBE_TIMEOUT,
            )?,
            bootstrap_timeout: match m.bootstrap_timeout.as_deref() {
                None => None,
                Some(value) => parse_limit(value).ok_or_else(|| ConfigError::Duration {
                    key: "bootstrap_timeout",
                    value: value.to_string(),
                })?,
            },
            safe_mode_policy: m.safe_mode_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Resolve an optional duration string, falling back to `default`.
pub fn duration_or(
    key: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => parse_duration(value).ok_or_else(|| ConfigError::Duration {
            key,
            value: value.to_string(),
        }),
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Like [`parse_duration`], but `"-1"` and `"none"` mean "no limit".
///
/// Returns `None` for an unparseable value, `Some(None)` for no limit.
pub fn parse_limit(s: &str) -> Option<Option<Duration>> {
    match s.trim() {
        "-1" | "none" => Some(None),
        other => parse_duration(other).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[monitor]
name = "NameNode Monitor"
probe_interval = "500ms"
report_interval = "5s"
probe_timeout = "30s"
bootstrap_timeout = "2m"
safe_mode_policy = "strict"

[reporter]
kind = "rest"
bind = "127.0.0.1:50088"
history = 64

[probes.port]
host = "localhost"
port = 8020

[probes.pid]
pid_file = "/var/run/hadoop/namenode.pid"

[probes.http]
url = "http://localhost:50070/"
min_status = 200
max_status = 299

[probes.list_dir]
path = "/"

[dependencies.safe_mode]
url = "http://localhost:50070/jmx?qry=Hadoop:service=NameNode,name=NameNodeInfo"
"#;

    #[test]
    fn parse_full_config() {
        let config = MonitorConfig::parse(FULL).unwrap();
        assert_eq!(config.monitor.name, "NameNode Monitor");
        assert_eq!(config.reporter.kind, ReporterKind::Rest);
        assert_eq!(config.reporter.history, Some(64));
        assert_eq!(config.probes.port.as_ref().unwrap().port, 8020);
        assert!(config.dependencies.safe_mode.is_some());

        let timing = config.loop_config().unwrap();
        assert_eq!(timing.probe_interval, Duration::from_millis(500));
        assert_eq!(timing.report_interval, Duration::from_secs(5));
        assert_eq!(timing.probe_timeout, Duration::from_secs(30));
        assert_eq!(timing.bootstrap_timeout, Some(Duration::from_secs(120)));
        assert_eq!(timing.safe_mode_policy, SafeModePolicy::Strict);
    }

    #[test]
    fn parse_minimal_uses_defaults() {
        let config = MonitorConfig::parse("[monitor]\nname = \"m\"\n").unwrap();
        assert_eq!(config.reporter.kind, ReporterKind::Log);
        assert!(config.probes.port.is_none());

        let timing = config.loop_config().unwrap();
        assert_eq!(timing, LoopConfig::default());
    }

    #[test]
    fn bootstrap_timeout_can_be_disabled() {
        let config = MonitorConfig::parse(
            "[monitor]\nname = \"m\"\nbootstrap_timeout = \"-1\"\n",
        )
        .unwrap();
        assert_eq!(config.loop_config().unwrap().bootstrap_timeout, None);
    }

    #[test]
    fn bad_duration_is_rejected() {
        let err = MonitorConfig::parse("[monitor]\nname = \"m\"\nprobe_interval = \"soon\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Duration { key: "probe_interval", .. }));
    }

    #[test]
    fn zero_probe_timeout_is_rejected() {
        let err = MonitorConfig::parse("[monitor]\nname = \"m\"\nprobe_timeout = \"0s\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = MonitorConfig::from_file(Path::new("/nonexistent/monitor.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn from_millis_maps_negative_bootstrap_to_unlimited() {
        let config = LoopConfig::from_millis(100, 1000, 500, -1);
        assert_eq!(config.bootstrap_timeout, None);
        assert_eq!(config.probe_interval, Duration::from_millis(100));

        let bounded = LoopConfig::from_millis(100, 1000, 500, 5000);
        assert_eq!(bounded.bootstrap_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("-1"), None);
    }

    #[test]
    fn parse_duration_rejects_overflowing_minutes() {
        let minutes = format!("{}m", u64::MAX / 60 + 1);
        assert_eq!(parse_duration(&minutes), None);
        let content = format!("[monitor]\nname = \"m\"\nprobe_interval = \"{minutes}\"\n");
        assert!(matches!(
            MonitorConfig::parse(&content),
            Err(ConfigError::Duration { key: "probe_interval", .. })
        ));
    }

    #[test]
    fn parse_limit_values() {
        assert_eq!(parse_limit("none"), Some(None));
        assert_eq!(parse_limit("-1"), Some(None));
        assert_eq!(parse_limit("3s"), Some(Some(Duration::from_secs(3))));
        assert_eq!(parse_limit("later"), None);
    }
}
