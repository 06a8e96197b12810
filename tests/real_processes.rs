#![cfg(unix)]

use std::time::Duration;

use procvisor::{CommandSpawner, Supervisor, SupervisorConfig};

fn shell(script: &str) -> CommandSpawner {
    CommandSpawner::new("/bin/sh").arg("-c").arg(script)
}

fn config(workers: usize, drain: Duration) -> SupervisorConfig {
    SupervisorConfig {
        workers,
        drain_timeout: drain,
        reap_timeout: Duration::from_secs(2),
        ..SupervisorConfig::default()
    }
}

#[tokio::test]
async fn cooperative_shells_drain_cleanly() {
    let sup = Supervisor::builder(config(2, Duration::from_secs(5)))
        .with_spawner(shell("trap 'exit 0' TERM; while :; do sleep 0.05; done"))
        .with_os_signals(false)
        .build()
        .unwrap();
    let handle = sup.handle();
    let run = tokio::spawn(sup.run());

    handle.wait_until(|s| s.live == 2).await.unwrap();
    // Let the shells install their traps.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("drain finished")
        .unwrap()
        .unwrap();
    assert_eq!(report.spawned, 2);
    assert_eq!(report.graceful_sent, 2);
    assert!(report.clean(), "{report:?}");
}

#[tokio::test]
async fn shell_ignoring_sigterm_is_killed() {
    let sup = Supervisor::builder(config(1, Duration::from_millis(300)))
        .with_spawner(shell("trap '' TERM; while :; do sleep 0.05; done"))
        .with_os_signals(false)
        .build()
        .unwrap();
    let handle = sup.handle();
    let run = tokio::spawn(sup.run());

    handle.wait_until(|s| s.live == 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown();

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("drain finished")
        .unwrap()
        .unwrap();
    assert_eq!(report.force_killed.len(), 1);
    assert!(report.unreaped.is_empty());
}

#[tokio::test]
async fn crashing_shell_is_replaced() {
    let sup = Supervisor::builder(config(1, Duration::from_secs(2)))
        .with_spawner(shell("sleep 0.1; exit 3"))
        .with_os_signals(false)
        .build()
        .unwrap();
    let handle = sup.handle();
    let mut events = sup.bus().subscribe();
    let run = tokio::spawn(sup.run());

    let replaced = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == procvisor::EventKind::WorkerReplaced {
                return ev;
            }
        }
    })
    .await
    .expect("replacement spawned");
    assert!(replaced.previous_pid.is_some());

    handle.shutdown();
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("drain finished")
        .unwrap()
        .unwrap();
    assert!(report.replaced >= 1);
}
