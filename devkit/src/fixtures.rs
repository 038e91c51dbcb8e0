use chrono::{DateTime, Duration, TimeZone, Utc};
use mvptimer_kernel::models::KillRow;

/// Routes `tracing` output through the test harness capture. Safe to call
/// from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fixed "now" used across scenarios.
pub fn base_time() -> DateTime<Utc> {
    at(2024, 5, 1, 18, 0)
}

pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture time {year}-{month}-{day} {hour}:{minute}"))
}

pub fn minutes_before(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now - Duration::minutes(minutes)
}

pub fn kill_row(
    monster_name: &str,
    monster_id: &str,
    map_name: &str,
    killed_at: DateTime<Utc>,
) -> KillRow {
    KillRow {
        monster_name: monster_name.to_string(),
        monster_id: monster_id.to_string(),
        map_name: map_name.to_string(),
        killed_at,
        player: Some("Tester".to_string()),
    }
}
