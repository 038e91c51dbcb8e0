/*!
 * Timer classification.
 *
 * ROLE: places every tracked kill against its respawn window at a fixed
 * instant and sorts the result into the spawned, spawning and pending
 * buckets.
 *
 * ARCHITECTURE: pure functions over the ledger and a window source; no I/O
 * and no clock access of their own.
 */

use crate::models::{LastKillsMap, RespawnWindow, TimerBoard, TimerEntry, TimerStatus};
use crate::windows::WindowSource;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

/// Places an elapsed time against a window. Spawning is the half-open band
/// `(min, max]`.
pub fn status_for(elapsed_minutes: f64, window: RespawnWindow) -> TimerStatus {
    let min = f64::from(window.min_minutes());
    let max = f64::from(window.max_minutes());
    if elapsed_minutes > max {
        TimerStatus::Spawned
    } else if elapsed_minutes > min {
        TimerStatus::Spawning
    } else {
        TimerStatus::Pending
    }
}

/// Builds the three timer buckets for `now`.
///
/// Identities without a known window are left out, as are kills older than
/// `max_stale_minutes` when a cutoff is set. Every bucket is sorted by
/// anchor, then magnitude, then label.
pub fn classify<W>(
    now: DateTime<Utc>,
    ledger: &LastKillsMap,
    windows: &W,
    max_stale_minutes: Option<f64>,
) -> TimerBoard
where
    W: WindowSource + ?Sized,
{
    let mut board = TimerBoard::empty(now);

    for (identity, last_kill) in ledger {
        let Some(window) = windows.window(&identity.window_key()) else {
            continue;
        };

        let elapsed = elapsed_minutes(now, *last_kill);
        if max_stale_minutes.is_some_and(|cutoff| elapsed > cutoff) {
            continue;
        }

        let status = status_for(elapsed, window);
        let edge = match status {
            TimerStatus::Spawned | TimerStatus::Spawning => window.max_minutes(),
            TimerStatus::Pending => window.min_minutes(),
        };
        let entry = TimerEntry {
            anchor: *last_kill + Duration::minutes(i64::from(edge)),
            magnitude_minutes: elapsed - f64::from(edge),
            label: identity.label(),
        };

        match status {
            TimerStatus::Spawned => board.spawned.push(entry),
            TimerStatus::Spawning => board.spawning.push(entry),
            TimerStatus::Pending => board.pending.push(entry),
        }
    }

    for bucket in [&mut board.spawned, &mut board.spawning, &mut board.pending] {
        bucket.sort_by(compare_entries);
    }
    board
}

fn elapsed_minutes(now: DateTime<Utc>, last_kill: DateTime<Utc>) -> f64 {
    (now - last_kill).num_milliseconds() as f64 / 60_000.0
}

fn compare_entries(a: &TimerEntry, b: &TimerEntry) -> Ordering {
    a.anchor
        .cmp(&b.anchor)
        .then_with(|| a.magnitude_minutes.total_cmp(&b.magnitude_minutes))
        .then_with(|| a.label.cmp(&b.label))
}
