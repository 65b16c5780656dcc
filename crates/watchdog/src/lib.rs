//! # watchdog
//!
//! Timers that turn an elapsed delay into a callback, the building block for
//! "after N ms" transitions in active objects.
//!
//! A [`Watchdog`] is created inert, armed with [`Watchdog::start`] and
//! disarmed with [`Watchdog::cancel`]. On expiry the callback runs on the
//! watchdog's own timer thread, concurrently with every other thread. The
//! usual callback raises an event on an active object; nothing here enforces
//! that.
//!
//! Cancelling does not recall a callback that is already running, so the
//! receiver of a timeout event must tolerate one arriving late.

mod timer;

pub use timer::{Expiry, Watchdog, WatchdogConfig, WatchdogError, WatchdogHandle};
