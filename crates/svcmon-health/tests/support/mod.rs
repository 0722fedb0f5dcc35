//! Scripted probes and a recording handler for reporting-loop tests.

#![allow(dead_code)]

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use svcmon_core::{
    BootFlag, Probe, ProbeAbort, ProbeError, ProbeFailed, ProbePhase, ProbeStatus, SafeModeCheck,
};
use svcmon_health::{Flow, ProbeReportHandler};
use tokio::time::Instant;

/// What a scripted probe does on a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    Fail,
    Hang(Duration),
    Abort,
}

type Script = Box<dyn Fn(usize) -> Step + Send + Sync>;

/// A probe whose behaviour on call `n` comes from a script.
pub struct ScriptedProbe {
    name: String,
    script: Script,
    calls: AtomicUsize,
    call_log: Mutex<Vec<(Instant, bool)>>,
    in_safe_mode: Arc<AtomicBool>,
    safe_mode_capable: bool,
    cancellable: bool,
    init_error: bool,
    began_bootstrap: AtomicUsize,
    ended_bootstrap: AtomicUsize,
    boot: BootFlag,
}

impl std::fmt::Debug for ScriptedProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProbe").field("name", &self.name).finish()
    }
}

impl ScriptedProbe {
    pub fn new(name: &str, script: impl Fn(usize) -> Step + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            call_log: Mutex::new(Vec::new()),
            in_safe_mode: Arc::new(AtomicBool::new(false)),
            safe_mode_capable: false,
            cancellable: true,
            init_error: false,
            began_bootstrap: AtomicUsize::new(0),
            ended_bootstrap: AtomicUsize::new(0),
            boot: BootFlag::new(),
        }
    }

    pub fn always(name: &str, step: Step) -> Self {
        Self::new(name, move |_| step)
    }

    /// Report safe mode from a flag the test (or the script) controls.
    pub fn with_safe_mode(mut self, flag: Arc<AtomicBool>) -> Self {
        self.safe_mode_capable = true;
        self.in_safe_mode = flag;
        self
    }

    pub fn uncancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.init_error = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Start time and live flag of every call.
    pub fn call_log(&self) -> Vec<(Instant, bool)> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn bootstraps(&self) -> (usize, usize) {
        (
            self.began_bootstrap.load(Ordering::SeqCst),
            self.ended_bootstrap.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ProbeError> {
        if self.init_error {
            return Err(ProbeError::Resolve {
                target: self.name.clone(),
                reason: "no such host".to_string(),
            });
        }
        Ok(())
    }

    async fn ping(&self, live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().unwrap().push((Instant::now(), live_ping));
        match (self.script)(call) {
            Step::Succeed => Ok(ProbeStatus::success(&self.name, format!("call {call} ok"))),
            Step::Fail => Ok(ProbeStatus::failure(&self.name, format!("call {call} failed"))),
            Step::Hang(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ProbeStatus::success(&self.name, format!("call {call} woke")))
            }
            Step::Abort => Err(ProbeAbort::new(&self.name, "scripted abort")),
        }
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }

    fn begin_bootstrap(&self) {
        self.began_bootstrap.fetch_add(1, Ordering::SeqCst);
        self.boot.clear();
    }

    fn end_bootstrap(&self) {
        self.ended_bootstrap.fetch_add(1, Ordering::SeqCst);
        self.boot.set();
    }

    fn cancellable(&self) -> bool {
        self.cancellable
    }

    fn safe_mode(&self) -> Option<&dyn SafeModeCheck> {
        if self.safe_mode_capable { Some(self) } else { None }
    }
}

impl SafeModeCheck for ScriptedProbe {
    fn is_in_safe_mode(&self) -> bool {
        self.in_safe_mode.load(Ordering::SeqCst)
    }
}

/// Everything a handler saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start(String),
    StateChange(ProbePhase),
    Booted(String),
    Result(ProbePhase, String, bool),
    Heartbeat(Instant),
    Failure(String),
    TimedOut(ProbePhase, String, bool),
    CycleCompleted,
    Unregister,
}

/// Handler that records events and stops according to its settings.
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    pub accept_start: bool,
    pub stop_on_failure: bool,
    pub stop_on_timeout: bool,
    pub stop_on_cycle: bool,
}

impl Recorder {
    /// A recorder that never stops the loop by itself.
    pub fn continuing() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = Self {
            events: Arc::clone(&events),
            accept_start: true,
            stop_on_failure: false,
            stop_on_timeout: false,
            stop_on_cycle: false,
        };
        (recorder, events)
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

fn verdict(stop: bool) -> Flow {
    if stop { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
}

impl ProbeReportHandler for Recorder {
    fn start(&mut self, name: &str, _description: &str) -> bool {
        self.push(Event::Start(name.to_string()));
        self.accept_start
    }

    fn unregister(&mut self) {
        self.push(Event::Unregister);
    }

    fn probe_process_state_change(&mut self, phase: ProbePhase) {
        self.push(Event::StateChange(phase));
    }

    fn probe_booted(&mut self, status: &ProbeStatus) {
        self.push(Event::Booted(status.probe().to_string()));
    }

    fn probe_result(&mut self, phase: ProbePhase, status: &ProbeStatus) {
        self.push(Event::Result(phase, status.probe().to_string(), status.is_success()));
    }

    fn heartbeat(&mut self, _status: &ProbeStatus) {
        self.push(Event::Heartbeat(Instant::now()));
    }

    fn probe_failure(&mut self, failure: &ProbeFailed) -> Flow {
        self.push(Event::Failure(failure.status().probe().to_string()));
        verdict(self.stop_on_failure)
    }

    fn probe_timed_out(
        &mut self,
        phase: ProbePhase,
        probe: &dyn Probe,
        last_status: Option<&ProbeStatus>,
        _now: u64,
    ) -> Flow {
        self.push(Event::TimedOut(phase, probe.name().to_string(), last_status.is_some()));
        verdict(self.stop_on_timeout)
    }

    fn live_probe_cycle_completed(&mut self) -> Flow {
        self.push(Event::CycleCompleted);
        verdict(self.stop_on_cycle)
    }
}

pub fn count(events: &Arc<Mutex<Vec<Event>>>, pred: impl Fn(&Event) -> bool) -> usize {
    events.lock().unwrap().iter().filter(|e| pred(e)).count()
}

pub fn snapshot(events: &Arc<Mutex<Vec<Event>>>) -> Vec<Event> {
    events.lock().unwrap().clone()
}
