//! Watchdog timer and its service thread.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use thiserror::Error;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("watchdog delay must be greater than zero")]
    ZeroDelay,
    #[error("watchdog delay {0:?} is out of range")]
    DelayTooLong(Duration),
    #[error("cannot spawn timer thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("watchdog {0} has been destroyed")]
    Destroyed(u64),
}

/// Timer parameters.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub delay: Duration,
    pub periodic: bool,
    pub name: Option<String>,
}

impl WatchdogConfig {
    /// One-shot timer expiring `delay` after each start.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            periodic: false,
            name: None,
        }
    }

    pub fn from_millis(delay_ms: u32) -> Self {
        Self::new(Duration::from_millis(u64::from(delay_ms)))
    }

    /// Re-arms every `delay` after the first expiry.
    pub fn periodic(mut self) -> Self {
        self.periodic = true;
        self
    }

    /// Names the timer thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct Shared {
    id: u64,
    config: WatchdogConfig,
    state: Mutex<TimerState>,
    wake: Condvar,
    fired: AtomicU64,
}

/// Information handed to the callback on each expiry.
pub struct Expiry {
    sequence: u64,
    deadline: Instant,
    handle: WatchdogHandle,
}

impl Expiry {
    /// 1 for the first expiry since construction, then 2, 3, ...
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The instant the timer was due.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Handle to the watchdog that fired, usable to cancel or re-arm it.
    pub fn watchdog(&self) -> &WatchdogHandle {
        &self.handle
    }
}

/// Cloneable control handle for a [`Watchdog`].
#[derive(Clone)]
pub struct WatchdogHandle {
    shared: Arc<Shared>,
}

impl WatchdogHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Arms the timer. An armed timer restarts its countdown.
    pub fn start(&self) -> Result<(), WatchdogError> {
        let mut state = self.shared.state.lock();
        if state.shutdown {
            return Err(WatchdogError::Destroyed(self.shared.id));
        }
        state.deadline = Some(deadline_after(Instant::now(), self.shared.config.delay)?);
        drop(state);
        self.shared.wake.notify_one();
        log::debug!(
            "[WATCHDOG] {} armed for {:?}{}",
            self.shared.id,
            self.shared.config.delay,
            if self.shared.config.periodic { " (periodic)" } else { "" }
        );
        Ok(())
    }

    /// Disarms the timer. A callback already running is not interrupted.
    pub fn cancel(&self) {
        let was_armed = self.shared.state.lock().deadline.take().is_some();
        self.shared.wake.notify_one();
        if was_armed {
            log::debug!("[WATCHDOG] {} disarmed", self.shared.id);
        } else {
            log::trace!("[WATCHDOG] {} disarm attempt while not armed", self.shared.id);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    /// Number of expiries so far.
    pub fn fired(&self) -> u64 {
        self.shared.fired.load(Ordering::Acquire)
    }

    pub fn delay(&self) -> Duration {
        self.shared.config.delay
    }
}

impl fmt::Debug for WatchdogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogHandle")
            .field("id", &self.shared.id)
            .field("delay", &self.shared.config.delay)
            .field("periodic", &self.shared.config.periodic)
            .finish()
    }
}

/// Timer owning a service thread that runs the expiry callback.
///
/// Dropping the watchdog disarms it and joins the thread.
pub struct Watchdog {
    handle: WatchdogHandle,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Creates an inert watchdog. Nothing counts until [`start`](Self::start).
    pub fn new<F>(config: WatchdogConfig, callback: F) -> Result<Self, WatchdogError>
    where
        F: FnMut(&Expiry) + Send + 'static,
    {
        if config.delay.is_zero() {
            return Err(WatchdogError::ZeroDelay);
        }
        deadline_after(Instant::now(), config.delay)?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let thread_name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("watchdog-{id}"));
        let shared = Arc::new(Shared {
            id,
            config,
            state: Mutex::new(TimerState {
                deadline: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            fired: AtomicU64::new(0),
        });

        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(worker, callback))
            .map_err(WatchdogError::Spawn)?;

        Ok(Self {
            handle: WatchdogHandle { shared },
            thread: Some(thread),
        })
    }

    /// One-shot watchdog expiring `delay_ms` milliseconds after each start.
    pub fn construct<F>(delay_ms: u32, callback: F) -> Result<Self, WatchdogError>
    where
        F: FnMut(&Expiry) + Send + 'static,
    {
        Self::new(WatchdogConfig::from_millis(delay_ms), callback)
    }

    pub fn start(&self) -> Result<(), WatchdogError> {
        self.handle.start()
    }

    pub fn cancel(&self) {
        self.handle.cancel()
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_armed()
    }

    pub fn fired(&self) -> u64 {
        self.handle.fired()
    }

    pub fn delay(&self) -> Duration {
        self.handle.delay()
    }

    pub fn id(&self) -> u64 {
        self.handle.id()
    }

    pub fn handle(&self) -> WatchdogHandle {
        self.handle.clone()
    }

    /// Disarms the timer and releases its thread.
    pub fn destroy(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            let mut state = self.handle.shared.state.lock();
            state.deadline = None;
            state.shutdown = true;
        }
        self.handle.shared.wake.notify_all();

        if let Some(thread) = self.thread.take() {
            // A callback dropping its own watchdog cannot join itself.
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::error!("[WATCHDOG] {} callback panicked", self.handle.shared.id);
            }
        }
        log::debug!("[WATCHDOG] {} destroyed", self.handle.shared.id);
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Watchdog").field(&self.handle).finish()
    }
}

fn deadline_after(from: Instant, delay: Duration) -> Result<Instant, WatchdogError> {
    from.checked_add(delay).ok_or(WatchdogError::DelayTooLong(delay))
}

/// First tick of the `next + k * period` grid that lies after `now`.
/// Ticks missed while a callback overran are merged, not replayed.
fn realign(next: Instant, period: Duration, now: Instant) -> Option<Instant> {
    if next > now {
        return Some(next);
    }
    let skipped = now.duration_since(next).as_nanos() / period.as_nanos() + 1;
    u32::try_from(skipped)
        .ok()
        .and_then(|n| period.checked_mul(n))
        .and_then(|offset| next.checked_add(offset))
        .or_else(|| now.checked_add(period))
}

/// Timer thread: sleeps until the deadline, fires, and for periodic timers
/// schedules the next deadline from the previous one so ticks do not drift.
fn run<F>(shared: Arc<Shared>, mut callback: F)
where
    F: FnMut(&Expiry),
{
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let Some(deadline) = state.deadline else {
            shared.wake.wait(&mut state);
            continue;
        };
        if Instant::now() < deadline {
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        let next = if shared.config.periodic {
            deadline.checked_add(shared.config.delay)
        } else {
            None
        };
        state.deadline = next;
        let sequence = shared.fired.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("[WATCHDOG] {} expired (#{sequence})", shared.id);

        let expiry = Expiry {
            sequence,
            deadline,
            handle: WatchdogHandle {
                shared: Arc::clone(&shared),
            },
        };
        MutexGuard::unlocked(&mut state, || callback(&expiry));

        // Leave a deadline the callback set itself alone.
        if let Some(next) = next.filter(|next| state.deadline == Some(*next)) {
            state.deadline = realign(next, shared.config.delay, Instant::now());
            if state.deadline != Some(next) {
                log::debug!("[WATCHDOG] {} overran its period", shared.id);
            }
        }
    }
}
