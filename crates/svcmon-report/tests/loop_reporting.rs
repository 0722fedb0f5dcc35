//! Reporters driven by a real reporting loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use svcmon_core::{BootFlag, LoopConfig, Probe, ProbeAbort, ProbePhase, ProbeStatus};
use svcmon_health::{LoopExit, ReportingLoop};
use svcmon_report::{LogReporter, RestReporter, StatusCheckReporter};
use tokio::sync::watch;

/// Succeeds on every call except the ones listed in `failing`.
#[derive(Debug)]
struct Counting {
    calls: AtomicUsize,
    failing: Vec<usize>,
    boot: BootFlag,
}

impl Counting {
    fn new(failing: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failing: failing.to_vec(),
            boot: BootFlag::new(),
        })
    }
}

#[async_trait]
impl Probe for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            Ok(ProbeStatus::failure(self.name(), format!("call {call} failed")))
        } else {
            Ok(ProbeStatus::success(self.name(), format!("call {call} ok")))
        }
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }
}

fn config() -> LoopConfig {
    LoopConfig::from_millis(10, 100, 1_000, 5_000)
}

fn never() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    drop(tx);
    rx
}

#[tokio::test(start_paused = true)]
async fn status_check_succeeds_on_first_live_cycle() {
    let probe = Counting::new(&[]);
    let mut lp = ReportingLoop::new(
        "HAStatusCheck",
        Box::new(StatusCheckReporter),
        vec![probe.clone() as Arc<dyn Probe>],
        Vec::new(),
        config(),
    )
    .unwrap();
    assert!(lp.start_reporting());

    let exit = lp.run(never()).await.unwrap();
    assert!(matches!(exit, LoopExit::CycleCompleted));
    assert_eq!(exit.exit_code(), 0);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn status_check_fails_on_live_failure() {
    // Boots on call 0, fails on the first live ping.
    let probe = Counting::new(&[1]);
    let mut lp = ReportingLoop::new(
        "HAStatusCheck",
        Box::new(StatusCheckReporter),
        vec![probe as Arc<dyn Probe>],
        Vec::new(),
        config(),
    )
    .unwrap();
    assert!(lp.start_reporting());

    let exit = lp.run(never()).await.unwrap();
    assert!(matches!(exit, LoopExit::ProbeFailed(_)));
    assert!(exit.is_failure());
}

#[tokio::test(start_paused = true)]
async fn lenient_log_reporter_keeps_monitoring_through_failures() {
    let probe = Counting::new(&[2, 4]);
    let mut lp = ReportingLoop::new(
        "NameNode Monitor",
        Box::new(LogReporter::new(false)),
        vec![probe.clone() as Arc<dyn Probe>],
        Vec::new(),
        config(),
    )
    .unwrap();
    assert!(lp.start_reporting());

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let _ = tx.send(true);
    });
    let exit = lp.run(rx).await.unwrap();
    assert!(matches!(exit, LoopExit::Shutdown));
    assert!(probe.calls.load(Ordering::SeqCst) > 50);
}

#[tokio::test]
async fn rest_reporter_records_live_results() {
    let probe = Counting::new(&[]);
    let reporter = RestReporter::new("127.0.0.1:0", 8);
    let board = reporter.board().clone();
    let mut lp = ReportingLoop::new(
        "NameNode Monitor",
        Box::new(reporter),
        vec![probe as Arc<dyn Probe>],
        Vec::new(),
        LoopConfig::from_millis(5, 100, 1_000, 5_000),
    )
    .unwrap();
    assert!(lp.start_reporting());

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let _ = tx.send(true);
    });
    let exit = lp.run(rx).await.unwrap();
    assert!(matches!(exit, LoopExit::Shutdown));

    let last = board.last().unwrap();
    assert!(last.is_success());
    assert_eq!(last.phase(), Some(ProbePhase::Live));
    assert!(board.events().len() <= 8);
}
