//! In-memory worker processes for driving the supervisor under a paused clock.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use procvisor::{
    Event, EventKind, ExitStatus, SignalError, Signaller, SpawnError, SpawnRequest, Spawned,
    Spawner, Supervisor, SupervisorConfig,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

/// How a fake worker reacts to SIGTERM.
#[derive(Clone, Copy, Debug)]
pub enum Behavior {
    /// Exits with code 0 this long after SIGTERM.
    Cooperative { after: Duration },
    /// Ignores SIGTERM; only SIGKILL ends it.
    Stubborn,
}

impl Behavior {
    pub fn prompt() -> Self {
        Behavior::Cooperative {
            after: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
enum Cmd {
    Terminate,
    Kill,
    Exit(ExitStatus),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sent {
    Term(u32),
    Kill(u32),
}

struct Proc {
    pid: u32,
    slot: usize,
    tx: mpsc::UnboundedSender<Cmd>,
}

struct Inner {
    default: Behavior,
    per_slot: Mutex<HashMap<usize, Behavior>>,
    fail_calls: Mutex<HashSet<usize>>,
    panic_calls: Mutex<HashSet<usize>>,
    calls: AtomicUsize,
    next_pid: AtomicU32,
    procs: Mutex<Vec<Proc>>,
    sent: Mutex<Vec<Sent>>,
}

/// Fake [`Spawner`] whose workers are tokio tasks driven by signals and test commands.
#[derive(Clone)]
pub struct FakeSpawner {
    inner: Arc<Inner>,
}

impl FakeSpawner {
    pub fn new(default: Behavior) -> Self {
        Self {
            inner: Arc::new(Inner {
                default,
                per_slot: Mutex::new(HashMap::new()),
                fail_calls: Mutex::new(HashSet::new()),
                panic_calls: Mutex::new(HashSet::new()),
                calls: AtomicUsize::new(0),
                next_pid: AtomicU32::new(100),
                procs: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Workers spawned into `slot` use `behavior`.
    pub fn behave(self, slot: usize, behavior: Behavior) -> Self {
        self.inner.per_slot.lock().unwrap().insert(slot, behavior);
        self
    }

    /// The `call`-th spawn attempt (0-indexed) returns an error.
    pub fn fail_call(self, call: usize) -> Self {
        self.inner.fail_calls.lock().unwrap().insert(call);
        self
    }

    /// The `call`-th spawn attempt (0-indexed) panics.
    pub fn panic_call(self, call: usize) -> Self {
        self.inner.panic_calls.lock().unwrap().insert(call);
        self
    }

    /// Spawn attempts so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Successful spawns so far.
    pub fn spawned(&self) -> Vec<u32> {
        self.inner.procs.lock().unwrap().iter().map(|p| p.pid).collect()
    }

    /// Most recent pid spawned into `slot`.
    pub fn pid_in(&self, slot: usize) -> u32 {
        self.inner
            .procs
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.slot == slot)
            .map(|p| p.pid)
            .expect("slot was never filled")
    }

    /// Makes worker `pid` exit on its own.
    pub fn exit(&self, pid: u32, status: ExitStatus) {
        let procs = self.inner.procs.lock().unwrap();
        let proc = procs.iter().find(|p| p.pid == pid).expect("unknown pid");
        let _ = proc.tx.send(Cmd::Exit(status));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.sent.lock().unwrap().clone()
    }

    pub fn terms(&self) -> Vec<u32> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Term(pid) => Some(pid),
                Sent::Kill(_) => None,
            })
            .collect()
    }

    pub fn kills(&self) -> Vec<u32> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Kill(pid) => Some(pid),
                Sent::Term(_) => None,
            })
            .collect()
    }
}

impl Spawner for FakeSpawner {
    fn spawn(&self, req: &SpawnRequest) -> Result<Spawned, SpawnError> {
        let call = self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.panic_calls.lock().unwrap().contains(&call) {
            panic!("fake spawner exploded on call {call}");
        }
        if self.inner.fail_calls.lock().unwrap().contains(&call) {
            return Err(SpawnError::Rejected {
                reason: format!("call {call} refused"),
            });
        }

        let pid = self.inner.next_pid.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .inner
            .per_slot
            .lock()
            .unwrap()
            .get(&req.slot)
            .copied()
            .unwrap_or(self.inner.default);

        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.procs.lock().unwrap().push(Proc {
            pid,
            slot: req.slot,
            tx: tx.clone(),
        });

        Ok(Spawned {
            pid,
            signaller: Box::new(FakeSignaller {
                pid,
                tx,
                inner: Arc::clone(&self.inner),
            }),
            exit: lifetime(behavior, rx).boxed(),
        })
    }
}

async fn lifetime(behavior: Behavior, mut rx: mpsc::UnboundedReceiver<Cmd>) -> ExitStatus {
    let mut deadline: Option<Instant> = None;
    loop {
        let cmd = match deadline {
            Some(at) => tokio::select! {
                cmd = rx.recv() => cmd,
                _ = tokio::time::sleep_until(at) => return ExitStatus::exited(0),
            },
            None => rx.recv().await,
        };
        match cmd {
            Some(Cmd::Terminate) => {
                if let (Behavior::Cooperative { after }, None) = (behavior, deadline) {
                    deadline = Some(Instant::now() + after);
                }
            }
            Some(Cmd::Kill) => return ExitStatus::signaled(9),
            Some(Cmd::Exit(status)) => return status,
            None => std::future::pending::<()>().await,
        }
    }
}

struct FakeSignaller {
    pid: u32,
    tx: mpsc::UnboundedSender<Cmd>,
    inner: Arc<Inner>,
}

impl FakeSignaller {
    fn send(&self, cmd: Cmd, sent: Sent) -> Result<(), SignalError> {
        self.tx
            .send(cmd)
            .map_err(|_| SignalError::AlreadyExited { pid: self.pid })?;
        self.inner.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl Signaller for FakeSignaller {
    fn terminate(&self) -> Result<(), SignalError> {
        self.send(Cmd::Terminate, Sent::Term(self.pid))
    }

    fn kill(&self) -> Result<(), SignalError> {
        self.send(Cmd::Kill, Sent::Kill(self.pid))
    }
}

pub fn config(workers: usize, drain: Duration) -> SupervisorConfig {
    SupervisorConfig {
        workers,
        drain_timeout: drain,
        reap_timeout: Duration::from_secs(1),
        ..SupervisorConfig::default()
    }
}

pub fn supervisor(cfg: SupervisorConfig, spawner: &FakeSpawner) -> Supervisor {
    Supervisor::builder(cfg)
        .with_spawner(spawner.clone())
        .with_os_signals(false)
        .build()
        .expect("build supervisor")
}

/// Receives until an event of `kind` arrives.
pub async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    loop {
        match rx.recv().await {
            Ok(ev) if ev.kind == kind => return ev,
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => panic!("bus closed before {kind:?}"),
        }
    }
}
