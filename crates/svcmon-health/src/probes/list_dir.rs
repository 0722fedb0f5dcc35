use std::path::PathBuf;

use async_trait::async_trait;
use svcmon_core::{BootFlag, Probe, ProbeAbort, ProbeStatus};

/// Lists a directory, typically on a network mount.
///
/// Listing runs on the blocking pool. A hung mount blocks that thread until
/// the kernel gives up, so the call cannot be cancelled.
#[derive(Debug)]
pub struct ListDirProbe {
    name: String,
    path: PathBuf,
    boot: BootFlag,
}

impl ListDirProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("list {}", path.display()),
            path,
            boot: BootFlag::new(),
        }
    }
}

#[async_trait]
impl Probe for ListDirProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let path = self.path.clone();
        let listing = tokio::task::spawn_blocking(move || -> std::io::Result<usize> {
            let mut entries = 0;
            for entry in std::fs::read_dir(&path)? {
                entry?;
                entries += 1;
            }
            Ok(entries)
        })
        .await;

        let status = match listing {
            Ok(Ok(entries)) => ProbeStatus::success(&self.name, format!("{entries} entries")),
            Ok(Err(e)) => ProbeStatus::from_error(&self.name, "listing failed", &e),
            Err(e) => ProbeStatus::from_error(&self.name, "listing task failed", &e),
        };
        Ok(status)
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }

    fn cancellable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fsimage"), b"").unwrap();
        std::fs::create_dir(dir.path().join("current")).unwrap();

        let probe = ListDirProbe::new(dir.path());
        assert!(!probe.cancellable());
        let status = probe.ping(true).await.unwrap();
        assert!(status.is_success(), "{status}");
        assert_eq!(status.message(), "2 entries");
    }

    #[tokio::test]
    async fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let probe = ListDirProbe::new(dir.path().join("gone"));
        let status = probe.ping(true).await.unwrap();
        assert!(!status.is_success());
        assert!(status.thrown().is_some());
    }
}
