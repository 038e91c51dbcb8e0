use chrono::Utc;
use mvptimer_devkit::{
    base_time, kill_row, minutes_before, RecordingSink, StubWindowLookup, TestHarness,
};
use mvptimer_kernel::cycle::CycleError;
use mvptimer_kernel::models::{KillRow, MonsterIdentity, TimerBoard, WindowKey};
use mvptimer_kernel::sinks::spawn_presentation_task;
use mvptimer_kernel::state::shutdown_channel;
use mvptimer_kernel::windows::WindowCache;
use std::sync::Arc;
use std::time::Duration;

fn lookup() -> StubWindowLookup {
    StubWindowLookup::new()
        .with_window("1039", "prt_maze03", 120, 130)
        .with_window("1038", "moc_pryd04", 60, 70)
        .with_window("1115", "pay_fild11", 120, 130)
        .with_unknown("1087", "gef_fild14")
}

fn page(now: chrono::DateTime<Utc>) -> Vec<KillRow> {
    vec![
        kill_row("Orc Hero", "1087", "gef_fild14", minutes_before(now, 10)),
        kill_row("Eddga", "1115", "pay_fild11", minutes_before(now, 30)),
        kill_row("Osiris", "1038", "moc_pryd04", minutes_before(now, 65)),
        kill_row("Baphomet", "1039", "prt_maze03", minutes_before(now, 140)),
    ]
}

fn labels(entries: &[mvptimer_kernel::models::TimerEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.label.as_str()).collect()
}

#[tokio::test]
async fn test_first_cycle_classifies_and_persists() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_rows(page(now));

    let mut cycle = h.cycle();
    let board = cycle.run_cycle_at(now).await.unwrap();

    assert_eq!(labels(&board.spawned), ["Baphomet (prt_maze03)"]);
    assert_eq!(labels(&board.spawning), ["Osiris (moc_pryd04)"]);
    assert_eq!(labels(&board.pending), ["Eddga (pay_fild11)"]);
    assert_eq!(board.generated_at, now);

    // Unknown windows keep their ledger entry but produce no timer.
    assert_eq!(cycle.ledger().len(), 4);
    assert!(h.read_file(&h.ledger_path()).is_some());

    let cache = WindowCache::load(h.windows_path());
    assert_eq!(cache.len(), 3);
    assert!(cache.get(&WindowKey::new("1087", "gef_fild14")).is_none());
}

#[tokio::test]
async fn test_first_row_per_identity_wins() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_rows(vec![
        kill_row("Baphomet", "1039", "prt_maze03", minutes_before(now, 10)),
        kill_row("Baphomet", "1039", "prt_maze03", minutes_before(now, 140)),
    ]);

    let mut cycle = h.cycle();
    let board = cycle.run_cycle_at(now).await.unwrap();

    let identity = MonsterIdentity::new("Baphomet", "1039", "prt_maze03");
    assert_eq!(cycle.ledger().get(&identity), Some(minutes_before(now, 10)));
    assert_eq!(labels(&board.pending), ["Baphomet (prt_maze03)"]);
    assert!(board.spawned.is_empty());
}

#[tokio::test]
async fn test_double_scrape_failure_changes_nothing() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_rows(page(now));

    let mut cycle = h.cycle();
    cycle.run_cycle_at(now).await.unwrap();

    let ledger_before = h.read_file(&h.ledger_path());
    let windows_before = h.read_file(&h.windows_path());
    let entries_before = cycle.ledger().entries().clone();
    let lookups_before = h.lookup.calls();

    h.source.push_failure("login form").push_failure("login form");
    let err = cycle.run_cycle_at(now).await.unwrap_err();

    assert!(matches!(err, CycleError::Scrape(_)));
    assert_eq!(h.source.fetches(), 3);
    assert_eq!(h.source.reauths(), 1);
    assert_eq!(h.lookup.calls(), lookups_before);
    assert_eq!(cycle.ledger().entries(), &entries_before);
    assert_eq!(h.read_file(&h.ledger_path()), ledger_before);
    assert_eq!(h.read_file(&h.windows_path()), windows_before);
}

#[tokio::test]
async fn test_single_failure_recovers_after_relogin() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_failure("session expired").push_rows(page(now));

    let board = h.cycle().run_cycle_at(now).await.unwrap();

    assert_eq!(board.len(), 3);
    assert_eq!(h.source.fetches(), 2);
    assert_eq!(h.source.reauths(), 1);
}

#[tokio::test]
async fn test_empty_page_keeps_ledger() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_rows(page(now)).push_rows(Vec::new());

    let mut cycle = h.cycle();
    let first = cycle.run_cycle_at(now).await.unwrap();
    let second = cycle.run_cycle_at(now).await.unwrap();

    assert_eq!(cycle.ledger().len(), 4);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_window_cache_survives_cycles_and_restart() {
    let h = TestHarness::new(lookup());
    let now = base_time();
    h.source.push_rows(page(now)).push_rows(page(now)).push_rows(page(now));

    let mut cycle = h.cycle();
    cycle.run_cycle_at(now).await.unwrap();
    // Three concrete windows plus the unknown one.
    assert_eq!(h.lookup.calls(), 4);

    cycle.run_cycle_at(now).await.unwrap();
    // Only the unknown window is asked again.
    assert_eq!(h.lookup.calls(), 5);

    drop(cycle);
    let mut restarted = h.cycle();
    assert_eq!(restarted.ledger().len(), 4);
    let board = restarted.run_cycle_at(now).await.unwrap();
    assert_eq!(h.lookup.calls(), 6);
    assert_eq!(board.len(), 3);
}

#[tokio::test]
async fn test_stale_kill_is_tracked_but_hidden() {
    let h = TestHarness::new(lookup()).with_max_stale(1000.0);
    let now = base_time();
    h.source.push_rows(vec![
        kill_row("Baphomet", "1039", "prt_maze03", minutes_before(now, 1200)),
        kill_row("Eddga", "1115", "pay_fild11", minutes_before(now, 30)),
    ]);

    let mut cycle = h.cycle();
    let board = cycle.run_cycle_at(now).await.unwrap();

    assert_eq!(labels(&board.pending), ["Eddga (pay_fild11)"]);
    assert!(board.spawned.is_empty());
    assert_eq!(cycle.ledger().len(), 2);
    assert!(cycle
        .resolver()
        .cache()
        .get(&WindowKey::new("1039", "prt_maze03"))
        .is_some());
}

#[tokio::test]
async fn test_failed_cycle_publishes_nothing() {
    let h = TestHarness::new(lookup());
    let (runner, mut boards) = h.runner();
    h.source.push_rows(page(Utc::now()));

    assert_eq!(runner.run_once().await.unwrap(), 3);
    let first: Arc<TimerBoard> = boards.borrow_and_update().clone().unwrap();

    h.source.push_failure("down").push_failure("down");
    assert!(runner.run_once().await.is_err());

    assert!(!boards.has_changed().unwrap());
    let current = boards.borrow().clone().unwrap();
    assert!(Arc::ptr_eq(&first, &current));

    let health = runner.health().get_health();
    assert_eq!(health.cycles_ok, 1);
    assert_eq!(health.cycles_failed, 1);
    assert_eq!(health.ledger_entries, 4);
    assert!(health.last_error.is_some());
}

#[tokio::test]
async fn test_presentation_skips_unchanged_boards() {
    let h = TestHarness::new(lookup());
    let (runner, boards) = h.runner();
    let sink = RecordingSink::new();
    let task = spawn_presentation_task(Box::new(sink.clone()), boards);

    let now = Utc::now();
    h.source.push_rows(page(now));
    runner.run_once().await.unwrap();
    assert!(sink.wait_for_deliveries(1, Duration::from_secs(2)).await);

    h.source.push_rows(page(now));
    runner.run_once().await.unwrap();

    h.source.push_rows(vec![kill_row("Eddga", "1115", "pay_fild11", minutes_before(now, 200))]);
    runner.run_once().await.unwrap();
    assert!(sink.wait_for_deliveries(2, Duration::from_secs(2)).await);

    drop(runner);
    task.await.unwrap();

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries[1].contains("Spawned: Eddga (pay_fild11), Baphomet (prt_maze03)"));
}

#[tokio::test]
async fn test_periodic_loop_stops_and_logs_out() {
    let h = TestHarness::new(lookup());
    let (runner, mut boards) = h.runner();
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    h.source.push_rows(page(Utc::now()));

    let handle = runner.spawn_periodic(Duration::from_millis(20), shutdown_rx);
    tokio::time::timeout(Duration::from_secs(2), boards.changed())
        .await
        .expect("first board in time")
        .unwrap();

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(h.source.closes(), 1);
    assert!(h.read_file(&h.ledger_path()).is_some());
}
