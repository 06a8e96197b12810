//! # Control loop: the supervisor state machine.
//!
//! [`Machine`] owns [`SupervisorState`] and applies one [`Control`] at a time.
//! Exit watchers, timers and the signal listener run as separate tasks but
//! never touch the state; they send into the loop's channel.
//!
//! ```text
//!                   ShutdownRequested
//!   ┌─────────┐   (SIGTERM → workers)    ┌──────────┐   all exited / reap timeout   ┌─────────┐
//!   │ Running │ ───────────────────────► │ Draining │ ────────────────────────────► │ Stopped │
//!   └─────────┘                          └──────────┘                                └─────────┘
//!     │  ▲  WorkerExited                   │  DrainTimedOut (1st) → SIGKILL stragglers,
//!     └──┘  → replace per RestartPolicy    │                        arm reap deadline
//!           (now, or RespawnDue later)     │  DrainTimedOut (2nd) → stop anyway
//! ```
//!
//! ## Rules
//! - Spawns happen only in `Running`; a `RespawnDue` arriving later is dropped.
//! - `ShutdownRequested` outside `Running` is counted and ignored.
//! - Each worker gets at most one SIGTERM and at most one SIGKILL.
//! - Exit events for unknown workers are ignored (idempotent per exit).
//! - Spawner/signaller failures and panics are logged, never propagated from `handle`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::config::SupervisorConfig;
use crate::core::control::{Control, ShutdownSignal};
use crate::core::handle::Status;
use crate::core::state::{Phase, ShutdownReport, SupervisorState, WorkerId, WorkerRecord};
use crate::error::{RuntimeError, SignalError, SpawnError};
use crate::events::{Bus, Event, EventKind};
use crate::process::{ExitFuture, ExitStatus, Signaller, SpawnRequest, Spawned, Spawner};
use crate::subscribers::panic_message;

/// Floor for retrying a failed spawn, whatever `spawn_retry` says.
const MIN_SPAWN_RETRY: Duration = Duration::from_millis(100);

pub(crate) struct Machine {
    cfg: SupervisorConfig,
    state: SupervisorState,
    report: ShutdownReport,
    bus: Bus,
    spawner: Arc<dyn Spawner>,
    tx: UnboundedSender<Control>,
    status: watch::Sender<Status>,
    deadline: Option<Instant>,
}

impl Machine {
    pub fn new(
        cfg: SupervisorConfig,
        bus: Bus,
        spawner: Arc<dyn Spawner>,
        tx: UnboundedSender<Control>,
        status: watch::Sender<Status>,
    ) -> Self {
        let target = cfg.resolved_workers();
        Self {
            cfg,
            state: SupervisorState::new(target),
            report: ShutdownReport::default(),
            bus,
            spawner,
            tx,
            status,
            deadline: None,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[cfg(test)]
    pub fn live(&self) -> usize {
        self.state.live()
    }

    pub fn report(&self) -> &ShutdownReport {
        &self.report
    }

    /// Fills every slot. The first failure aborts and is returned.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        for slot in 0..self.state.target {
            if let Err(source) = self.spawn_into(slot) {
                self.bus.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_slot(slot)
                        .with_reason(source.to_string()),
                );
                return Err(RuntimeError::StartupSpawn { slot, source });
            }
        }
        self.publish_status();
        Ok(())
    }

    /// Force-kills whatever `start` managed to spawn; `drive` then reaps them.
    pub fn abort_startup(&mut self) {
        self.state.phase = Phase::Draining;
        self.kill_stragglers();
        if self.state.live() == 0 {
            self.finish();
        } else {
            self.deadline = Some(Instant::now() + self.cfg.reap_timeout);
        }
        self.publish_status();
    }

    /// Processes control events until the phase is `Stopped`.
    pub async fn drive(&mut self, rx: &mut UnboundedReceiver<Control>) {
        while self.state.phase != Phase::Stopped {
            let next = match self.deadline {
                Some(at) => tokio::select! {
                    biased;
                    msg = rx.recv() => msg,
                    _ = tokio::time::sleep_until(at) => Some(Control::DrainTimedOut),
                },
                None => rx.recv().await,
            };
            // `self.tx` keeps the channel open.
            let Some(ctrl) = next else { break };
            self.handle(ctrl);
        }
    }

    /// Applies one control event.
    pub fn handle(&mut self, ctrl: Control) {
        match ctrl {
            Control::WorkerExited { id, status } => self.on_worker_exit(id, status),
            Control::ShutdownRequested { signal } => self.on_shutdown(signal),
            Control::DrainTimedOut => self.on_drain_timeout(),
            Control::RespawnDue { slot } => self.on_respawn_due(slot),
        }
        self.publish_status();
    }

    fn on_worker_exit(&mut self, id: WorkerId, status: ExitStatus) {
        let Some(rec) = self.state.remove(id) else {
            debug!(worker = %id, "exit for unknown worker ignored");
            return;
        };
        let uptime = rec.started.elapsed();
        let kind = if self.state.phase == Phase::Running {
            EventKind::WorkerExited
        } else {
            EventKind::WorkerStopped
        };

        self.bus.publish(
            Event::new(kind)
                .with_worker(id)
                .with_pid(rec.pid)
                .with_slot(rec.slot)
                .with_status(status)
                .with_uptime(uptime),
        );

        match self.state.phase {
            Phase::Running => {
                if !self.cfg.restart.replaces(&status) {
                    debug!(
                        worker = %id,
                        slot = rec.slot,
                        policy = self.cfg.restart.as_str(),
                        "exit not replaced by restart policy"
                    );
                    if self.state.live() == 0 {
                        warn!("worker pool is empty");
                    }
                    return;
                }
                let streak = self
                    .state
                    .record_crash(rec.slot, uptime, self.cfg.stable_after);
                let delay = self.cfg.backoff.next(streak);
                if delay.is_zero() {
                    self.replace(rec.slot, Some(rec.pid));
                } else {
                    self.schedule_respawn(rec.slot, delay, streak);
                }
            }
            Phase::Draining => {
                if self.state.live() == 0 {
                    self.finish();
                }
            }
            Phase::Stopped => {}
        }
    }

    fn on_respawn_due(&mut self, slot: usize) {
        if self.state.phase != Phase::Running {
            debug!(slot, phase = self.state.phase.as_str(), "deferred respawn dropped");
            return;
        }
        self.replace(slot, None);
    }

    fn on_shutdown(&mut self, signal: ShutdownSignal) {
        if self.state.phase != Phase::Running {
            self.report.ignored_signals += 1;
            self.bus
                .publish(Event::new(EventKind::ShutdownIgnored).with_signal_name(signal));
            return;
        }

        self.bus.publish(
            Event::new(EventKind::ShutdownRequested)
                .with_signal_name(signal)
                .with_count(self.state.live()),
        );
        self.state.phase = Phase::Draining;

        for rec in self.state.workers_mut() {
            if rec.terminate_sent {
                continue;
            }
            rec.terminate_sent = true;
            match deliver(rec.signaller.as_ref(), rec.pid, Stop::Graceful) {
                Ok(()) => {
                    self.report.graceful_sent += 1;
                    self.bus.publish(
                        Event::new(EventKind::GracefulSent)
                            .with_worker(rec.id)
                            .with_pid(rec.pid),
                    );
                }
                Err(e) if e.is_already_exited() => {
                    debug!(worker = %rec.id, pid = rec.pid, "worker gone before SIGTERM");
                }
                Err(e) => {
                    warn!(worker = %rec.id, pid = rec.pid, error = %e, "failed to send SIGTERM");
                }
            }
        }

        if self.state.live() == 0 {
            self.finish();
        } else {
            self.deadline = Some(Instant::now() + self.cfg.drain_timeout);
        }
    }

    fn on_drain_timeout(&mut self) {
        self.deadline = None;
        if self.state.phase != Phase::Draining {
            return;
        }

        if self.state.escalated {
            self.report.unreaped = self.state.pids();
            self.bus.publish(
                Event::new(EventKind::ReapTimedOut)
                    .with_count(self.state.live())
                    .with_timeout(self.cfg.reap_timeout),
            );
            self.finish();
            return;
        }

        self.bus.publish(
            Event::new(EventKind::DrainTimedOut)
                .with_count(self.state.live())
                .with_timeout(self.cfg.drain_timeout),
        );
        self.kill_stragglers();
        self.deadline = Some(Instant::now() + self.cfg.reap_timeout);
    }

    fn kill_stragglers(&mut self) {
        self.state.escalated = true;
        for rec in self.state.workers_mut() {
            if rec.kill_sent {
                continue;
            }
            rec.kill_sent = true;
            match deliver(rec.signaller.as_ref(), rec.pid, Stop::Forceful) {
                Ok(()) => {
                    self.report.force_killed.push(rec.pid);
                    self.bus.publish(
                        Event::new(EventKind::ForceKilled)
                            .with_worker(rec.id)
                            .with_pid(rec.pid),
                    );
                }
                Err(e) if e.is_already_exited() => {
                    debug!(worker = %rec.id, pid = rec.pid, "worker gone before SIGKILL");
                }
                Err(e) => {
                    warn!(worker = %rec.id, pid = rec.pid, error = %e, "failed to send SIGKILL");
                }
            }
        }
    }

    fn finish(&mut self) {
        self.deadline = None;
        if !self.state.escalated {
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
        }
        self.state.phase = Phase::Stopped;
    }

    fn replace(&mut self, slot: usize, previous_pid: Option<u32>) {
        if self.state.slot_occupied(slot) {
            debug!(slot, "slot already filled; replacement skipped");
            return;
        }
        match self.spawn_into(slot) {
            Ok((id, pid)) => {
                self.report.replaced += 1;
                self.bus.publish(
                    Event::new(EventKind::WorkerReplaced)
                        .with_worker(id)
                        .with_pid(pid)
                        .with_slot(slot)
                        .with_previous_pid(previous_pid),
                );
            }
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_slot(slot)
                        .with_reason(err.to_string()),
                );
                let streak = self
                    .state
                    .record_crash(slot, Duration::ZERO, self.cfg.stable_after);
                let delay = self
                    .cfg
                    .backoff
                    .next(streak)
                    .max(self.cfg.spawn_retry)
                    .max(MIN_SPAWN_RETRY);
                self.schedule_respawn(slot, delay, streak);
            }
        }
    }

    fn schedule_respawn(&self, slot: usize, delay: Duration, streak: u32) {
        self.bus.publish(
            Event::new(EventKind::RespawnScheduled)
                .with_slot(slot)
                .with_delay(delay)
                .with_attempt(streak),
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Control::RespawnDue { slot });
        });
    }

    fn spawn_into(&mut self, slot: usize) -> Result<(WorkerId, u32), SpawnError> {
        let id = self.state.allocate_id();
        let req = SpawnRequest { slot, worker: id };
        let spawner = Arc::clone(&self.spawner);

        let Spawned {
            pid,
            signaller,
            exit,
        } = std::panic::catch_unwind(AssertUnwindSafe(|| spawner.spawn(&req))).map_err(
            |panic| SpawnError::Panicked {
                info: panic_message(panic.as_ref()),
            },
        )??;

        self.watch_exit(id, exit);
        self.state.insert(WorkerRecord {
            id,
            pid,
            slot,
            signaller,
            started: Instant::now(),
            terminate_sent: false,
            kill_sent: false,
        });
        self.report.spawned += 1;
        self.bus.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_worker(id)
                .with_pid(pid)
                .with_slot(slot),
        );
        Ok((id, pid))
    }

    fn watch_exit(&self, id: WorkerId, exit: ExitFuture) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let status = match AssertUnwindSafe(exit).catch_unwind().await {
                Ok(status) => status,
                Err(panic) => {
                    let info = panic_message(panic.as_ref());
                    warn!(worker = %id, panic = %info, "exit watcher panicked");
                    ExitStatus::unknown()
                }
            };
            let _ = tx.send(Control::WorkerExited { id, status });
        });
    }

    fn publish_status(&self) {
        self.status.send_replace(Status {
            phase: self.state.phase,
            live: self.state.live(),
            target: self.state.target,
        });
    }
}

#[derive(Clone, Copy)]
enum Stop {
    Graceful,
    Forceful,
}

/// Sends one stop signal, containing signaller panics.
fn deliver(signaller: &dyn Signaller, pid: u32, stop: Stop) -> Result<(), SignalError> {
    let res = std::panic::catch_unwind(AssertUnwindSafe(|| match stop {
        Stop::Graceful => signaller.terminate(),
        Stop::Forceful => signaller.kill(),
    }));
    res.unwrap_or_else(|panic| {
        Err(SignalError::Os {
            pid,
            signal: match stop {
                Stop::Graceful => "SIGTERM",
                Stop::Forceful => "SIGKILL",
            },
            reason: format!("signaller panicked: {}", panic_message(panic.as_ref())),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct Journal {
        terminates: Mutex<Vec<u32>>,
        kills: Mutex<Vec<u32>>,
    }

    struct Recorder {
        pid: u32,
        journal: Arc<Journal>,
    }

    impl Signaller for Recorder {
        fn terminate(&self) -> Result<(), SignalError> {
            self.journal.terminates.lock().unwrap().push(self.pid);
            Ok(())
        }
        fn kill(&self) -> Result<(), SignalError> {
            self.journal.kills.lock().unwrap().push(self.pid);
            Ok(())
        }
    }

    /// Workers never exit on their own; the tests inject exits by hand.
    #[derive(Default)]
    struct Inert {
        next_pid: AtomicU32,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        panic_on_call: Option<usize>,
        faulty_on_call: Option<usize>,
        journal: Arc<Journal>,
    }

    /// Panics on SIGTERM and fails SIGKILL with an OS error.
    struct Faulty {
        pid: u32,
    }

    impl Signaller for Faulty {
        fn terminate(&self) -> Result<(), SignalError> {
            panic!("signaller exploded")
        }
        fn kill(&self) -> Result<(), SignalError> {
            Err(SignalError::Os {
                pid: self.pid,
                signal: "SIGKILL",
                reason: "operation not permitted".into(),
            })
        }
    }

    impl Spawner for Inert {
        fn spawn(&self, _req: &SpawnRequest) -> Result<Spawned, SpawnError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_call == Some(call) {
                panic!("spawner exploded");
            }
            if self.fail_on_call == Some(call) {
                return Err(SpawnError::Rejected {
                    reason: "no capacity".into(),
                });
            }
            let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
            let signaller: Box<dyn Signaller> = if self.faulty_on_call == Some(call) {
                Box::new(Faulty { pid })
            } else {
                Box::new(Recorder {
                    pid,
                    journal: Arc::clone(&self.journal),
                })
            };
            Ok(Spawned {
                pid,
                signaller,
                exit: futures::future::pending().boxed(),
            })
        }
    }

    fn machine(workers: usize, spawner: Inert) -> (Machine, Arc<Journal>) {
        let cfg = SupervisorConfig {
            workers,
            ..SupervisorConfig::default()
        };
        machine_with(cfg, spawner)
    }

    fn machine_with(cfg: SupervisorConfig, spawner: Inert) -> (Machine, Arc<Journal>) {
        let journal = Arc::clone(&spawner.journal);
        let (tx, _rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(Status::default());
        let m = Machine::new(cfg, Bus::new(64), Arc::new(spawner), tx, status);
        (m, journal)
    }

    fn first_live(m: &Machine) -> WorkerId {
        *m.state.ids().first().expect("a live worker")
    }

    #[tokio::test]
    async fn start_fills_every_slot() {
        let (mut m, _) = machine(2, Inert::default());
        m.start().unwrap();
        assert_eq!(m.phase(), Phase::Running);
        assert_eq!(m.live(), 2);
        assert_eq!(m.report().spawned, 2);
    }

    #[tokio::test]
    async fn crash_while_running_is_replaced_once() {
        let (mut m, _) = machine(2, Inert::default());
        m.start().unwrap();
        let dead = first_live(&m);

        m.handle(Control::WorkerExited {
            id: dead,
            status: ExitStatus::exited(1),
        });
        assert_eq!(m.live(), 2);
        assert_eq!(m.report().replaced, 1);

        // Same exit delivered twice changes nothing.
        m.handle(Control::WorkerExited {
            id: dead,
            status: ExitStatus::exited(1),
        });
        assert_eq!(m.live(), 2);
        assert_eq!(m.report().spawned, 3);
    }

    #[tokio::test]
    async fn exits_while_draining_are_not_replaced() {
        let (mut m, journal) = machine(2, Inert::default());
        m.start().unwrap();
        m.handle(Control::ShutdownRequested {
            signal: ShutdownSignal::Terminate,
        });
        assert_eq!(m.phase(), Phase::Draining);
        assert_eq!(journal.terminates.lock().unwrap().len(), 2);

        for id in m.state.ids() {
            m.handle(Control::WorkerExited {
                id,
                status: ExitStatus::signaled(15),
            });
        }
        assert_eq!(m.phase(), Phase::Stopped);
        assert_eq!(m.report().spawned, 2);
        assert_eq!(m.report().replaced, 0);
        assert!(m.report().clean());
    }

    #[tokio::test]
    async fn second_shutdown_sends_nothing() {
        let (mut m, journal) = machine(3, Inert::default());
        m.start().unwrap();
        for _ in 0..2 {
            m.handle(Control::ShutdownRequested {
                signal: ShutdownSignal::Terminate,
            });
        }
        assert_eq!(journal.terminates.lock().unwrap().len(), 3);
        assert_eq!(m.report().ignored_signals, 1);
        assert_eq!(m.phase(), Phase::Draining);
    }

    #[tokio::test]
    async fn drain_timeout_kills_each_straggler_once() {
        let (mut m, journal) = machine(2, Inert::default());
        m.start().unwrap();
        m.handle(Control::ShutdownRequested {
            signal: ShutdownSignal::Interrupt,
        });

        m.handle(Control::DrainTimedOut);
        assert_eq!(journal.kills.lock().unwrap().len(), 2);
        assert_eq!(m.phase(), Phase::Draining);

        // Reap deadline: stop even though exits were never reported.
        m.handle(Control::DrainTimedOut);
        assert_eq!(journal.kills.lock().unwrap().len(), 2);
        assert_eq!(m.phase(), Phase::Stopped);
        assert_eq!(m.report().unreaped.len(), 2);
    }

    #[tokio::test]
    async fn respawn_due_after_shutdown_is_dropped() {
        let (mut m, _) = machine(1, Inert::default());
        m.start().unwrap();
        m.handle(Control::ShutdownRequested {
            signal: ShutdownSignal::Manual,
        });
        m.handle(Control::RespawnDue { slot: 0 });
        assert_eq!(m.report().spawned, 1);
    }

    #[tokio::test]
    async fn startup_failure_reports_slot() {
        let spawner = Inert {
            fail_on_call: Some(1),
            ..Inert::default()
        };
        let (mut m, journal) = machine(3, spawner);
        let err = m.start().unwrap_err();
        assert!(matches!(err, RuntimeError::StartupSpawn { slot: 1, .. }));

        m.abort_startup();
        assert_eq!(*journal.kills.lock().unwrap(), vec![1000]);
        assert_eq!(m.phase(), Phase::Draining);
    }

    #[tokio::test]
    async fn panicking_spawner_during_replacement_is_contained() {
        let spawner = Inert {
            panic_on_call: Some(1),
            ..Inert::default()
        };
        let (mut m, _) = machine(1, spawner);
        m.start().unwrap();
        let dead = first_live(&m);

        m.handle(Control::WorkerExited {
            id: dead,
            status: ExitStatus::signaled(9),
        });
        assert_eq!(m.phase(), Phase::Running);
        assert_eq!(m.live(), 0);

        // The retry comes in as RespawnDue and succeeds.
        m.handle(Control::RespawnDue { slot: 0 });
        assert_eq!(m.live(), 1);
    }

    #[tokio::test]
    async fn faulty_signaller_does_not_stop_the_drain() {
        let spawner = Inert {
            faulty_on_call: Some(0),
            ..Inert::default()
        };
        let (mut m, journal) = machine(3, spawner);
        m.start().unwrap();

        m.handle(Control::ShutdownRequested {
            signal: ShutdownSignal::Terminate,
        });
        let mut terms = journal.terminates.lock().unwrap().clone();
        terms.sort_unstable();
        assert_eq!(terms, vec![1001, 1002]);
        assert_eq!(m.report().graceful_sent, 2);

        m.handle(Control::DrainTimedOut);
        let mut killed = m.report().force_killed.clone();
        killed.sort_unstable();
        assert_eq!(killed, vec![1001, 1002]);
        assert_eq!(m.phase(), Phase::Draining);

        for id in m.state.ids() {
            m.handle(Control::WorkerExited {
                id,
                status: ExitStatus::signaled(9),
            });
        }
        assert_eq!(m.phase(), Phase::Stopped);
        assert!(m.report().unreaped.is_empty());
    }

    #[test]
    fn deliver_turns_a_panic_into_an_error() {
        let err = deliver(&Faulty { pid: 7 }, 7, Stop::Graceful).unwrap_err();
        assert!(matches!(err, SignalError::Os { pid: 7, signal: "SIGTERM", .. }));
        assert!(err.to_string().contains("signaller exploded"), "{err}");
    }

    #[tokio::test]
    async fn failed_spawn_retry_has_a_floor() {
        let spawner = Inert {
            fail_on_call: Some(1),
            ..Inert::default()
        };
        let cfg = SupervisorConfig {
            workers: 1,
            spawn_retry: Duration::ZERO,
            ..SupervisorConfig::default()
        };
        let (mut m, _) = machine_with(cfg, spawner);
        let mut events = m.bus.subscribe();
        m.start().unwrap();

        let dead = first_live(&m);
        m.handle(Control::WorkerExited {
            id: dead,
            status: ExitStatus::exited(1),
        });

        let scheduled = loop {
            let ev = events.try_recv().expect("respawn scheduled");
            if ev.kind == EventKind::RespawnScheduled {
                break ev;
            }
        };
        assert_eq!(scheduled.delay_ms, Some(100));
    }
}
