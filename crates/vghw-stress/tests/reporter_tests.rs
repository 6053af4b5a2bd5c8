use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vghw_common::PhaseConfig;
use vghw_stress::engine::reporter::{Counters, Reporter};

fn phase(report_interval: Duration) -> PhaseConfig {
    PhaseConfig {
        level: 1,
        duration: Duration::from_secs(1),
        concurrency: 4,
        report_interval,
    }
}

#[test]
fn test_reset_returns_previous_window() {
    let reporter = Reporter::new(phase(Duration::ZERO));
    reporter.mutate(|c| {
        c.commands_sent += 3;
        c.updates_received += 2;
        c.movement_latency = Duration::from_millis(33);
    });

    let first = reporter.reset_and_get();
    assert_eq!(first.counters.commands_sent, 3);
    assert_eq!(first.counters.updates_received, 2);
    assert_eq!(first.counters.movement_latency, Duration::from_millis(33));
    assert_eq!(first.config, phase(Duration::ZERO));

    let second = reporter.reset_and_get();
    assert_eq!(second.counters, Counters::default());
    assert!(second.captured_at >= first.captured_at);
}

#[tokio::test(start_paused = true)]
async fn test_window_measures_time_since_last_reset() {
    let reporter = Reporter::new(phase(Duration::ZERO));
    tokio::time::sleep(Duration::from_millis(250)).await;
    let snapshot = reporter.reset_and_get();
    assert!(snapshot.window >= Duration::from_millis(250));
    assert!(snapshot.window < Duration::from_millis(260));

    tokio::time::sleep(Duration::from_millis(40)).await;
    let snapshot = reporter.reset_and_get();
    assert!(snapshot.window >= Duration::from_millis(40));
    assert!(snapshot.window < Duration::from_millis(50));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_mutators_lose_no_updates() {
    const WRITERS: u64 = 8;
    const UPDATES: u64 = 5_000;

    let reporter = Arc::new(Reporter::new(phase(Duration::ZERO)));
    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let reporter = Arc::clone(&reporter);
        handles.push(tokio::spawn(async move {
            for i in 0..UPDATES {
                reporter.mutate(|c| {
                    c.commands_sent += 1;
                    c.updates_received += 2;
                });
                if i % 500 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    let resetter = {
        let reporter = Arc::clone(&reporter);
        tokio::spawn(async move {
            let mut sent = 0;
            let mut updates = 0;
            for _ in 0..200 {
                let s = reporter.reset_and_get();
                sent += s.counters.commands_sent;
                updates += s.counters.updates_received;
                tokio::task::yield_now().await;
            }
            (sent, updates)
        })
    };

    for h in handles {
        h.await.unwrap();
    }
    let (mut sent, mut updates) = resetter.await.unwrap();
    let last = reporter.reset_and_get();
    sent += last.counters.commands_sent;
    updates += last.counters.updates_received;

    assert_eq!(sent, WRITERS * UPDATES);
    assert_eq!(updates, 2 * WRITERS * UPDATES);
}

#[tokio::test]
async fn test_periodic_disabled_for_zero_interval() {
    let reporter = Arc::new(Reporter::new(phase(Duration::ZERO)));
    let (tx, _rx) = mpsc::channel(1);
    assert!(reporter
        .start_periodic(CancellationToken::new(), tx)
        .is_none());
}

#[tokio::test]
async fn test_periodic_emits_until_cancelled() {
    let reporter = Arc::new(Reporter::new(phase(Duration::from_millis(20))));
    let (tx, mut rx) = mpsc::channel(1);
    let token = CancellationToken::new();
    let periodic = reporter.start_periodic(token.clone(), tx).unwrap();

    reporter.mutate(|c| c.updates_received += 7);
    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.counters.updates_received, 7);

    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.counters.updates_received, 0);

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), periodic.wait())
        .await
        .expect("emitter should stop on cancel");
}

#[tokio::test]
async fn test_slow_consumer_delays_but_does_not_skip() {
    let reporter = Arc::new(Reporter::new(phase(Duration::from_millis(10))));
    let (tx, mut rx) = mpsc::channel(1);
    let token = CancellationToken::new();
    let periodic = reporter.start_periodic(token.clone(), tx).unwrap();

    // Keep mutating while nobody is reading.
    for _ in 0..10 {
        reporter.mutate(|c| c.commands_sent += 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The emitter is now blocked handing over a second snapshot. Every
    // mutation must still show up once the consumer catches up.
    let mut total = 0;
    let mut received = 0;
    while total < 10 {
        let snapshot = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("snapshot should eventually arrive")
            .unwrap();
        total += snapshot.counters.commands_sent;
        received += 1;
    }
    assert_eq!(total, 10);
    assert!(received >= 2);

    token.cancel();
    periodic.wait().await;
}

#[tokio::test]
async fn test_cancellation_wins_over_pending_handoff() {
    let reporter = Arc::new(Reporter::new(phase(Duration::from_millis(5))));
    let (tx, _rx) = mpsc::channel(1);
    let token = CancellationToken::new();
    let periodic = reporter.start_periodic(token.clone(), tx).unwrap();

    // First snapshot fills the buffer, the next one blocks on handoff.
    tokio::time::sleep(Duration::from_millis(50)).await;

    token.cancel();
    tokio::time::timeout(Duration::from_millis(200), periodic.wait())
        .await
        .expect("blocked handoff must not delay shutdown");
}
