/*!
 * Shared state and the channels between tasks.
 *
 * ROLE: the board channel hands the latest board from the refresh loop to
 * the sinks and the HTTP API; the shutdown channel stops every task.
 *
 * ARCHITECTURE: both are `watch` channels, so readers only ever see the most
 * recent value. Plain shared data goes behind a `parking_lot` mutex.
 */

use crate::models::TimerBoard;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Single-slot channel carrying the latest board; `None` until the first
/// successful cycle.
pub type BoardSender = watch::Sender<Option<Arc<TimerBoard>>>;
pub type BoardReceiver = watch::Receiver<Option<Arc<TimerBoard>>>;

pub fn board_channel() -> (BoardSender, BoardReceiver) {
    watch::channel(None)
}

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}
