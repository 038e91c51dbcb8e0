/*!
 * Text rendering of a [`TimerBoard`].
 *
 * ROLE: turns the three timer buckets into the message shown on the console,
 * in Discord and on `GET /timers/text`.
 *
 * LAYOUT: one section per non-empty bucket ("Spawned", "Spawning",
 * "Will spawn"), then a "Last update" footer in the server zone. Rows are
 * either relative ("2h30m ago") or clock times in the local zone.
 */

use crate::models::{TimerBoard, TimerEntry, TimerStatus};
use chrono_tz::Tz;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Plain,
    Discord,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// "3h 5m ago" instead of clock times.
    pub relative: bool,
    pub server_tz: Tz,
    pub local_tz: Tz,
    pub flavor: Flavor,
}

pub fn render(board: &TimerBoard, opts: &RenderOptions) -> String {
    BoardText { board, opts }.to_string()
}

struct BoardText<'a> {
    board: &'a TimerBoard,
    opts: &'a RenderOptions,
}

impl fmt::Display for BoardText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = self.opts;
        if opts.flavor == Flavor::Discord {
            f.write_str("_ _")?;
        }

        let sections = [
            (TimerStatus::Spawned, ":white_check_mark:", "Spawned"),
            (TimerStatus::Spawning, ":warning:", "Spawning"),
            (TimerStatus::Pending, ":stop_sign:", "Will spawn"),
        ];

        for (status, emoji, title) in sections {
            let entries = self.board.bucket(status);
            if entries.is_empty() {
                continue;
            }
            match opts.flavor {
                Flavor::Plain if status == TimerStatus::Spawned => writeln!(f, "{title}:")?,
                Flavor::Plain => write!(f, "\n{title}:\n")?,
                Flavor::Discord => write!(f, "\n{emoji} {title}:\n```")?,
            }
            for entry in entries {
                f.write_str("\n")?;
                write_row(f, status, entry, opts)?;
            }
            f.write_str(match opts.flavor {
                Flavor::Plain => "\n",
                Flavor::Discord => "\n```",
            })?;
        }

        let generated = self.board.generated_at.with_timezone(&opts.server_tz);
        write!(f, "\nLast update: {}.", generated.format("%d %b %Y %H:%M %Z"))
    }
}

fn write_row(
    f: &mut fmt::Formatter<'_>,
    status: TimerStatus,
    entry: &TimerEntry,
    opts: &RenderOptions,
) -> fmt::Result {
    let minutes = entry.magnitude_minutes;
    let label = &entry.label;

    if opts.relative {
        match status {
            TimerStatus::Spawned => {
                let (h, m) = hours_minutes(minutes);
                write!(f, "{h:>3}h{m:>2}m ago {label}")
            }
            TimerStatus::Spawning => write!(f, "in <{}m {label}", minutes.abs().ceil() as i64),
            TimerStatus::Pending => {
                let (h, m) = hours_minutes(minutes.abs());
                write!(f, "in {h:>2}h{m:>2}m+ {label}")
            }
        }
    } else {
        let clock = entry.anchor.with_timezone(&opts.local_tz).format("%H:%M");
        match status {
            TimerStatus::Spawned => write!(f, "{clock} {label}"),
            TimerStatus::Spawning => write!(f, "<{clock} {label}"),
            TimerStatus::Pending => write!(f, "{clock}+ {label}"),
        }
    }
}

fn hours_minutes(minutes: f64) -> (i64, i64) {
    ((minutes / 60.0).floor() as i64, (minutes % 60.0).floor() as i64)
}
