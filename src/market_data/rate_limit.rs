// =============================================================================
// Request Budget — keeps the market-data client under its per-minute quota
// =============================================================================
//
// The market-data API allows a fixed number of requests per rolling minute
// and answers 429 beyond it.  Every outbound request first takes a slot from
// the current one-minute window; when the window is spent the caller sleeps
// until it rolls over.  The budget is shared by all screener workers.
//
// A caller that knows how many requests a unit of work will make can take
// them up front with `reserve` and run the work inside the returned
// `Reservation`.  Requests made inside it draw on the prepaid slots and never
// wait, so a deadline placed around the work measures upstream latency only.
// =============================================================================

use std::cell::Cell;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

const WINDOW: Duration = Duration::from_secs(60);

/// Fraction of the budget at which a warning is emitted once per window.
const WARN_RATIO: f64 = 0.8;

tokio::task_local! {
    /// Slots already paid for by the enclosing `Reservation`.
    static PREPAID: Cell<u32>;
}

struct Window {
    started: Instant,
    used: u32,
    warned: bool,
}

/// Per-minute request budget shared across tasks.
pub struct RequestBudget {
    limit: u32,
    window: Mutex<Window>,
}

/// Serialisable view of the current window.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetSnapshot {
    pub limit: u32,
    pub used: u32,
    pub resets_in_ms: u64,
}

/// Slots taken ahead of time; see [`RequestBudget::reserve`].
#[derive(Debug)]
#[must_use = "a reservation does nothing until work is run inside it"]
pub struct Reservation {
    slots: u32,
}

impl Reservation {
    pub fn slots(&self) -> u32 {
        self.slots
    }

    /// Run `work` with the reserved slots available to every
    /// [`RequestBudget::acquire`] it makes.  Unused slots are forfeited.
    pub async fn run<F: Future>(self, work: F) -> F::Output {
        PREPAID.scope(Cell::new(self.slots), work).await
    }
}

/// Take one prepaid slot from the current task's reservation, if any.
fn take_prepaid() -> bool {
    PREPAID
        .try_with(|left| {
            let n = left.get();
            if n > 0 {
                left.set(n - 1);
            }
            n > 0
        })
        .unwrap_or(false)
}

impl RequestBudget {
    /// A budget of `limit` requests per minute (at least 1).
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
                warned: false,
            }),
        }
    }

    /// Take `n` slots from the current window if they all fit, otherwise
    /// report how long until the window rolls over.
    fn try_take(&self, n: u32) -> Result<(), Duration> {
        let mut w = self.window.lock();
        if w.started.elapsed() >= WINDOW {
            w.started = Instant::now();
            w.used = 0;
            w.warned = false;
        }

        if w.used + n <= self.limit {
            w.used += n;
            if !w.warned && f64::from(w.used) >= f64::from(self.limit) * WARN_RATIO {
                w.warned = true;
                warn!(used = w.used, limit = self.limit, "request budget nearly spent for this minute");
            }
            return Ok(());
        }

        Err(WINDOW.saturating_sub(w.started.elapsed()))
    }

    /// Wait until `n` slots fit in one window, then take them all.  `n` is
    /// capped at the per-minute limit.
    async fn take(&self, n: u32) {
        loop {
            match self.try_take(n) {
                Ok(()) => return,
                Err(wait) => {
                    debug!(slots = n, wait_ms = wait.as_millis() as u64, "request budget exhausted — waiting");
                    tokio::time::sleep(wait.max(Duration::from_millis(10))).await;
                }
            }
        }
    }

    /// Wait until a slot is available, then take it.  Inside a
    /// [`Reservation`] a prepaid slot is used instead and this never waits.
    pub async fn acquire(&self) {
        if take_prepaid() {
            return;
        }
        self.take(1).await;
    }

    /// Take `n` slots now, waiting for the window to roll over if needed.
    pub async fn reserve(&self, n: u32) -> Reservation {
        let slots = n.min(self.limit);
        if slots > 0 {
            self.take(slots).await;
        }
        Reservation { slots }
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let w = self.window.lock();
        BudgetSnapshot {
            limit: self.limit,
            used: w.used,
            resets_in_ms: WINDOW.saturating_sub(w.started.elapsed()).as_millis() as u64,
        }
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("RequestBudget")
            .field("limit", &snap.limit)
            .field("used", &snap.used)
            .finish()
    }
}
