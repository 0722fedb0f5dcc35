use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use svcmon_core::{BootFlag, Probe, ProbeAbort, ProbeStatus};
use tracing::debug;

/// Succeeds while the process named in a pid file is alive.
#[derive(Debug)]
pub struct PidProbe {
    name: String,
    pid_file: PathBuf,
    boot: BootFlag,
}

impl PidProbe {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        let pid_file = pid_file.into();
        Self {
            name: format!("pid file {}", pid_file.display()),
            pid_file,
            boot: BootFlag::new(),
        }
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }
}

#[async_trait]
impl Probe for PidProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        debug!(pid_file = %self.pid_file.display(), "probing process");
        let content = match tokio::fs::read_to_string(&self.pid_file).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ProbeStatus::from_error(&self.name, "pid file is missing", &e));
            }
            Err(e) => {
                return Ok(ProbeStatus::from_error(&self.name, "cannot read pid file", &e));
            }
        };

        let status = match parse_pid(&content) {
            Err(reason) => ProbeStatus::failure(&self.name, reason),
            Ok(pid) if process_alive(pid) => {
                ProbeStatus::success(&self.name, format!("process {pid} is running"))
            }
            Ok(pid) => ProbeStatus::failure(&self.name, format!("process {pid} is not running")),
        };
        Ok(status)
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }
}

fn parse_pid(content: &str) -> Result<libc::pid_t, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("pid file is empty".to_string());
    }
    match trimmed.parse::<libc::pid_t>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(format!("pid file holds {trimmed:?}, not a process id")),
    }
}

/// Signal 0 checks for existence; EPERM means alive but owned by someone else.
fn process_alive(pid: libc::pid_t) -> bool {
    // SAFETY: signal 0 performs permission and existence checks only.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn pid_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_pid_rejects_junk() {
        assert_eq!(parse_pid(" 4242\n"), Ok(4242));
        assert_eq!(parse_pid("  \n"), Err("pid file is empty".to_string()));
        assert!(parse_pid("namenode").is_err());
        assert!(parse_pid("0").is_err());
        assert!(parse_pid("-12").is_err());
    }

    #[tokio::test]
    async fn own_process_is_alive() {
        let file = pid_file(&format!("{}\n", std::process::id()));
        let probe = PidProbe::new(file.path());
        let status = probe.ping(true).await.unwrap();
        assert!(status.is_success(), "{status}");
    }

    #[tokio::test]
    async fn missing_file_is_distinct_from_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PidProbe::new(dir.path().join("namenode.pid"));
        let status = missing.ping(false).await.unwrap();
        assert!(!status.is_success());
        assert_eq!(status.message(), "pid file is missing");

        let file = pid_file("");
        let empty = PidProbe::new(file.path());
        let status = empty.ping(false).await.unwrap();
        assert!(!status.is_success());
        assert_eq!(status.message(), "pid file is empty");
    }

    #[tokio::test]
    async fn dead_process_fails() {
        // Beyond the default pid_max, so nothing can be running there.
        let file = pid_file("4194304");
        let probe = PidProbe::new(file.path());
        let status = probe.ping(true).await.unwrap();
        assert!(!status.is_success());
        assert_eq!(status.message(), "process 4194304 is not running");
    }
}
