//! # example
//!
//! The Example active object: a three-state machine driven by two events,
//! plus the watchdog glue that turns a timeout into an `Example2` event.
//!
//! ```no_run
//! use example::Example;
//!
//! # fn main() -> Result<(), ao::ActiveError> {
//! let mut example = Example::new()?;
//! example.start()?;
//! example.event_one(1)?;
//! example.event_two(2)?;
//! example.stop()?;
//! example.destroy()?;
//! # Ok(())
//! # }
//! ```

pub mod machine;

use ao::mailbox::MailboxName;
use ao::{ActiveConfig, ActiveConfigBuilder, ActiveError, ActiveObject, EventSender, Phase, Stopped};
use watchdog::Expiry;

pub use machine::{ExampleEvent, ExampleMachine, ExampleSignal, ExampleState};

/// Base of the Example mailbox and thread names.
pub const TYPE_TAG: &str = "Example";

/// One Example active object.
#[derive(Debug)]
pub struct Example {
    ao: ActiveObject<ExampleMachine>,
}

impl Example {
    /// Example in the process-wide namespace with default settings.
    pub fn new() -> Result<Self, ActiveError> {
        Self::with_config(Self::config().build())
    }

    pub fn config() -> ActiveConfigBuilder<ExampleMachine> {
        ActiveConfig::builder(TYPE_TAG)
    }

    pub fn with_config(config: ActiveConfig<ExampleMachine>) -> Result<Self, ActiveError> {
        let ao = ActiveObject::new(ExampleMachine::default(), machine::table()?, config)?;
        Ok(Self { ao })
    }

    pub fn name(&self) -> &MailboxName {
        self.ao.name()
    }

    pub fn thread_name(&self) -> &str {
        self.ao.thread_name()
    }

    pub fn phase(&self) -> Phase {
        self.ao.phase()
    }

    pub fn start(&mut self) -> Result<(), ActiveError> {
        self.ao.start()
    }

    pub fn event_one(&self, param: i32) -> Result<(), ActiveError> {
        self.ao.raise(ExampleEvent::One { param })
    }

    pub fn event_two(&self, param2: i32) -> Result<(), ActiveError> {
        self.ao.raise(ExampleEvent::Two { param2 })
    }

    pub fn events(&self) -> ExampleEvents {
        ExampleEvents(self.ao.events())
    }

    pub fn stop(&mut self) -> Result<Stopped<ExampleMachine>, ActiveError> {
        self.ao.stop()
    }

    pub fn destroy(self) -> Result<(), ActiveError> {
        self.ao.destroy()
    }
}

/// Cloneable handle raising Example events from other threads.
#[derive(Debug, Clone)]
pub struct ExampleEvents(EventSender<ExampleMachine>);

impl ExampleEvents {
    pub fn event_one(&self, param: i32) -> Result<(), ActiveError> {
        self.0.raise(ExampleEvent::One { param })
    }

    pub fn event_two(&self, param2: i32) -> Result<(), ActiveError> {
        self.0.raise(ExampleEvent::Two { param2 })
    }
}

/// Watchdog callback raising `Example2` with the expiry sequence number.
///
/// A timeout that arrives after the object stopped is logged and dropped.
pub fn timeout(events: ExampleEvents) -> impl FnMut(&Expiry) + Send + 'static {
    move |expiry| {
        let param2 = i32::try_from(expiry.sequence()).unwrap_or(i32::MAX);
        log::debug!("[Example] timeout #{param2}");
        if let Err(err) = events.event_two(param2) {
            log::warn!("[Example] timeout dropped: {err}");
        }
    }
}
