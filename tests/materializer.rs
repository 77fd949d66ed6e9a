mod common;

use std::sync::Arc;
use std::time::Duration;

use btcount::{MemoryAdapter, Materializer, Snapshot, Transaction};
use common::{ProbeStore, as_clock, at, clock_at, dec, hour};
use tokio_util::sync::CancellationToken;

fn setup(store: &Arc<ProbeStore>, clock: &Arc<btcount::ManualClock>) -> Materializer {
    Materializer::new(store.clone(), store.clone(), as_clock(clock))
        .with_retry_delay(Duration::from_secs(5))
}

#[tokio::test]
async fn test_sync_at_checkpoint_only_reads_checkpoint() {
    let store = ProbeStore::new();
    let clock = clock_at(at(2, 30));
    store.seed_ledger(&[("1", at(0, 10)), ("2", at(1, 10))]).await;
    store.seed_snapshots(&[(hour(1), "1"), (hour(2), "3")]).await;
    let materializer = setup(&store, &clock);

    assert_eq!(materializer.sync(hour(2)).await.unwrap(), 0);

    assert_eq!(ProbeStore::count(&store.latest_loads), 1);
    assert_eq!(ProbeStore::count(&store.ledger_loads), 0);
    assert_eq!(ProbeStore::count(&store.snapshot_saves), 0);
}

#[tokio::test]
async fn test_interrupted_batch_resumes_from_checkpoint() {
    let txs = [
        ("1", at(0, 10)),
        ("2", at(1, 10)),
        ("4", at(2, 10)),
        ("8", at(3, 10)),
    ];
    let clock = clock_at(at(4, 30));

    let store = ProbeStore::new();
    store.seed_ledger(&txs).await;
    let materializer = setup(&store, &clock);

    store.limit_snapshot_saves(2);
    assert!(materializer.sync(hour(4)).await.is_err());
    assert_eq!(
        store.inner.snapshots(),
        vec![
            Snapshot::new(hour(1), dec("1")),
            Snapshot::new(hour(2), dec("3")),
        ]
    );

    store.limit_snapshot_saves(usize::MAX);
    assert_eq!(materializer.sync(hour(4)).await.unwrap(), 2);

    let reference = MemoryAdapter::new();
    for (amount, timestamp) in txs {
        btcount::LedgerStore::save(&reference, &Transaction::new(dec(amount), timestamp))
            .await
            .unwrap();
    }
    let one_shot = Materializer::new(
        Arc::new(reference.clone()),
        Arc::new(reference.clone()),
        as_clock(&clock),
    );
    assert_eq!(one_shot.sync(hour(4)).await.unwrap(), 4);

    assert_eq!(store.inner.snapshots(), reference.snapshots());
}

#[tokio::test]
async fn test_checkpoints_advance_hour_by_hour() {
    let store = ProbeStore::new();
    let clock = clock_at(hour(0));
    let materializer = setup(&store, &clock);

    for n in 0..6 {
        store.seed_ledger(&[("1", at(n, 15)), ("0.5", at(n, 45))]).await;
        clock.set(at(n + 1, 5));
        assert_eq!(materializer.sync(hour(n + 1)).await.unwrap(), 1);
    }

    let stats = store.inner.snapshots();
    let timestamps: Vec<_> = stats.iter().map(|stat| stat.timestamp).collect();
    assert_eq!(timestamps, (1..=6).map(hour).collect::<Vec<_>>());
    assert_eq!(stats.last().map(|stat| stat.amount), Some(dec("9")));
}

#[tokio::test]
async fn test_sync_skips_quiet_hours() {
    let store = ProbeStore::new();
    let clock = clock_at(at(6, 0));
    store.seed_ledger(&[("3", at(0, 10)), ("4", at(4, 10))]).await;
    let materializer = setup(&store, &clock);

    assert_eq!(materializer.sync(hour(6)).await.unwrap(), 2);
    assert_eq!(
        store.inner.snapshots(),
        vec![
            Snapshot::new(hour(1), dec("3")),
            Snapshot::new(hour(5), dec("7")),
        ]
    );

    // Nothing new since the checkpoint.
    assert_eq!(materializer.sync(hour(6)).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_retries_bootstrap_then_ticks() {
    let store = ProbeStore::new();
    let clock = clock_at(at(2, 30));
    store.seed_ledger(&[("1", at(0, 10)), ("2", at(1, 10))]).await;
    store.fail_latest_loads(2);

    let materializer = setup(&store, &clock);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move { materializer.run(cancel).await }
    });

    for _ in 0..60 {
        if !store.inner.snapshots().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(ProbeStore::count(&store.latest_loads), 3);
    assert_eq!(
        store.inner.snapshots(),
        vec![
            Snapshot::new(hour(1), dec("1")),
            Snapshot::new(hour(2), dec("3")),
        ]
    );

    store.seed_ledger(&[("4", at(2, 40))]).await;
    clock.set(at(3, 1));
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;

    assert_eq!(
        store.inner.snapshots().last().copied(),
        Some(Snapshot::new(hour(3), dec("7")))
    );

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_while_bootstrap_keeps_failing() {
    let store = ProbeStore::new();
    let clock = clock_at(at(2, 30));
    store.seed_ledger(&[("1", at(0, 10))]).await;
    store.fail_latest_loads(usize::MAX);

    let materializer = setup(&store, &clock);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn({
        let cancel = cancel.clone();
        async move { materializer.run(cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), worker)
        .await
        .unwrap()
        .unwrap();

    assert!(ProbeStore::count(&store.latest_loads) >= 2);
    assert!(store.inner.snapshots().is_empty());
}
