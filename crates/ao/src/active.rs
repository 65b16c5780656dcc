//! Active objects: one thread, one mailbox, one state machine.
//!
//! An [`ActiveObject`] moves through three phases. It is `Constructed` by
//! [`ActiveObject::new`], `Running` after [`start`](ActiveObject::start)
//! and `Stopped` once [`stop`](ActiveObject::stop) is called or the machine
//! reaches its terminal state. `stop` joins the thread in both cases.
//! Events may be raised while constructed (they queue up) and while
//! running. Dropping the object stops it and closes its mailbox.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mailbox::{Envelope, Mailbox, MailboxConfig, MailboxError, MailboxName, Sender};
use thiserror::Error;

use crate::dispatch::{Dispatcher, MachineOutcome, Stopped, TraceHook};
use crate::fsm::{FsmError, Machine, TransitionTable};

/// Lifecycle phase of an [`ActiveObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Constructed = 0,
    Running = 1,
    Stopped = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Constructed,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "constructed",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Error, Debug)]
pub enum ActiveError {
    #[error("cannot {operation} an active object that is {phase}")]
    Lifecycle {
        operation: &'static str,
        phase: Phase,
    },
    #[error("cannot spawn dispatch thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("dispatch thread panicked")]
    Panicked,
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Fsm(#[from] FsmError),
}

/// Active object parameters.
pub struct ActiveConfig<M: Machine> {
    /// Base of the mailbox and thread names, e.g. `"Example"`.
    pub type_tag: String,
    /// Explicit instance number. Drawn from the namespace counter when unset.
    pub instance: Option<u32>,
    pub mailbox: MailboxConfig,
    pub trace_hook: Option<TraceHook<M>>,
}

impl<M: Machine> ActiveConfig<M> {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            instance: None,
            mailbox: MailboxConfig::default(),
            trace_hook: None,
        }
    }

    pub fn builder(type_tag: impl Into<String>) -> ActiveConfigBuilder<M> {
        ActiveConfigBuilder {
            config: Self::new(type_tag),
        }
    }
}

impl<M: Machine> Clone for ActiveConfig<M> {
    fn clone(&self) -> Self {
        Self {
            type_tag: self.type_tag.clone(),
            instance: self.instance,
            mailbox: self.mailbox.clone(),
            trace_hook: self.trace_hook.clone(),
        }
    }
}

impl<M: Machine> fmt::Debug for ActiveConfig<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveConfig")
            .field("type_tag", &self.type_tag)
            .field("instance", &self.instance)
            .field("mailbox", &self.mailbox)
            .field("trace_hook", &self.trace_hook.is_some())
            .finish()
    }
}

/// Builder for [`ActiveConfig`].
pub struct ActiveConfigBuilder<M: Machine> {
    config: ActiveConfig<M>,
}

impl<M: Machine> ActiveConfigBuilder<M> {
    pub fn instance(mut self, instance: u32) -> Self {
        self.config.instance = Some(instance);
        self
    }

    pub fn mailbox(mut self, mailbox: MailboxConfig) -> Self {
        self.config.mailbox = mailbox;
        self
    }

    /// Observes every dispatch outcome on the object's thread.
    pub fn trace_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MachineOutcome<M>) + Send + Sync + 'static,
    {
        self.config.trace_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> ActiveConfig<M> {
        self.config
    }
}

type Inbox<M> = Mailbox<Envelope<<M as Machine>::Event>>;

/// Retry interval for a kill frame that meets a full mailbox.
const KILL_RETRY: Duration = Duration::from_millis(5);

fn load_phase(phase: &AtomicU8) -> Phase {
    Phase::from_u8(phase.load(Ordering::Acquire))
}

fn raise_on<M: Machine>(
    sender: &Sender<Envelope<M::Event>>,
    phase: &AtomicU8,
    event: M::Event,
) -> Result<(), ActiveError> {
    match load_phase(phase) {
        Phase::Stopped => Err(ActiveError::Lifecycle {
            operation: "raise",
            phase: Phase::Stopped,
        }),
        _ => Ok(sender.send(&Envelope::Event(event))?),
    }
}

/// Cloneable handle raising events on an [`ActiveObject`] from any thread.
pub struct EventSender<M: Machine> {
    sender: Sender<Envelope<M::Event>>,
    phase: Arc<AtomicU8>,
}

impl<M: Machine> EventSender<M> {
    /// Queues `event`, blocking while the mailbox is full.
    pub fn raise(&self, event: M::Event) -> Result<(), ActiveError> {
        raise_on::<M>(&self.sender, &self.phase, event)
    }

    pub fn name(&self) -> &MailboxName {
        self.sender.name()
    }

    pub fn phase(&self) -> Phase {
        load_phase(&self.phase)
    }
}

impl<M: Machine> Clone for EventSender<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            phase: Arc::clone(&self.phase),
        }
    }
}

impl<M: Machine> fmt::Debug for EventSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender")
            .field("name", self.sender.name())
            .field("phase", &self.phase())
            .finish()
    }
}

/// Everything the dispatch thread hands back when it ends.
struct LoopExit<M: Machine> {
    dispatcher: Dispatcher<M>,
    mailbox: Inbox<M>,
    error: Option<MailboxError>,
}

/// State machine running on its own thread, fed through a named mailbox.
pub struct ActiveObject<M: Machine> {
    name: MailboxName,
    instance: u32,
    thread_name: String,
    phase: Arc<AtomicU8>,
    sender: Sender<Envelope<M::Event>>,
    mailbox: Option<Inbox<M>>,
    dispatcher: Option<Dispatcher<M>>,
    trace_hook: Option<TraceHook<M>>,
    thread: Option<JoinHandle<LoopExit<M>>>,
}

impl<M: Machine> ActiveObject<M> {
    /// Creates the mailbox and places the machine in its initial state.
    /// The thread is not started.
    pub fn new(
        machine: M,
        table: impl Into<Arc<TransitionTable<M>>>,
        config: ActiveConfig<M>,
    ) -> Result<Self, ActiveError> {
        let ActiveConfig {
            type_tag,
            instance,
            mailbox: mailbox_config,
            trace_hook,
        } = config;

        let instance =
            instance.unwrap_or_else(|| mailbox_config.namespace().next_instance(&type_tag));
        let name = MailboxName::derive(&type_tag, instance)?;
        let mailbox = Mailbox::create(name.clone(), &mailbox_config)?;
        log::debug!("[AO] {name} constructed");

        Ok(Self {
            thread_name: format!("{type_tag}Task{instance}"),
            instance,
            phase: Arc::new(AtomicU8::new(Phase::Constructed as u8)),
            sender: mailbox.sender(),
            mailbox: Some(mailbox),
            dispatcher: Some(Dispatcher::new(machine, table.into())),
            trace_hook,
            thread: None,
            name,
        })
    }

    pub fn name(&self) -> &MailboxName {
        &self.name
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn phase(&self) -> Phase {
        load_phase(&self.phase)
    }

    /// Handle for raising events from other threads, watchdog callbacks
    /// included.
    pub fn events(&self) -> EventSender<M> {
        EventSender {
            sender: self.sender.clone(),
            phase: Arc::clone(&self.phase),
        }
    }

    /// Queues `event`, blocking while the mailbox is full.
    pub fn raise(&self, event: M::Event) -> Result<(), ActiveError> {
        raise_on::<M>(&self.sender, &self.phase, event)
    }

    /// Spawns the dispatch thread.
    pub fn start(&mut self) -> Result<(), ActiveError> {
        let phase = self.phase();
        if phase != Phase::Constructed {
            return Err(ActiveError::Lifecycle {
                operation: "start",
                phase,
            });
        }
        let (Some(dispatcher), Some(mailbox)) = (self.dispatcher.take(), self.mailbox.take())
        else {
            return Err(ActiveError::Lifecycle {
                operation: "start",
                phase,
            });
        };

        let trace_hook = self.trace_hook.clone();
        let name = self.name.clone();
        let shared_phase = Arc::clone(&self.phase);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || run(name, dispatcher, mailbox, trace_hook, shared_phase));

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                self.phase.store(Phase::Running as u8, Ordering::Release);
                log::debug!("[AO] {} started on {}", self.name, self.thread_name);
                Ok(())
            }
            Err(err) => {
                // The closure and the mailbox inside it are gone.
                self.phase.store(Phase::Stopped as u8, Ordering::Release);
                Err(ActiveError::Spawn(err))
            }
        }
    }

    /// Sends a kill frame, joins the thread and returns what is left of the
    /// machine. Also joins a loop that already ended in the terminal state.
    pub fn stop(&mut self) -> Result<Stopped<M>, ActiveError> {
        let Some(thread) = self.thread.take() else {
            return Err(ActiveError::Lifecycle {
                operation: "stop",
                phase: self.phase(),
            });
        };
        log::debug!("[AO] {} stopping", self.name);

        self.phase.store(Phase::Stopped as u8, Ordering::Release);
        if let Err(err) = self.kill(&thread) {
            self.phase.store(Phase::Running as u8, Ordering::Release);
            self.thread = Some(thread);
            return Err(err.into());
        }

        let exit = thread.join().map_err(|_| ActiveError::Panicked)?;
        self.mailbox = Some(exit.mailbox);
        log::debug!(
            "[AO] {} stopped in {:?} after {} dispatches",
            self.name,
            exit.dispatcher.state(),
            exit.dispatcher.dispatched()
        );
        match exit.error {
            Some(err) => Err(err.into()),
            None => Ok(exit.dispatcher.into_stopped()),
        }
    }

    /// Queues the kill frame without blocking on a thread that is gone.
    fn kill(&self, handle: &JoinHandle<LoopExit<M>>) -> Result<(), MailboxError> {
        loop {
            match self.sender.try_send(&Envelope::Kill) {
                // A loop that already ended has sealed its mailbox.
                Ok(()) | Err(MailboxError::Closed(_)) => return Ok(()),
                Err(MailboxError::Full(_)) if handle.is_finished() => return Ok(()),
                Err(MailboxError::Full(_)) => thread::sleep(KILL_RETRY),
                Err(err) => return Err(err),
            }
        }
    }

    /// Closes the mailbox. Fails on a running object, which is then still
    /// stopped and released when dropped.
    pub fn destroy(mut self) -> Result<(), ActiveError> {
        let phase = self.phase();
        if phase == Phase::Running {
            return Err(ActiveError::Lifecycle {
                operation: "destroy",
                phase,
            });
        }
        if self.thread.is_some() {
            self.stop()?;
        }
        log::debug!("[AO] {} destroyed", self.name);
        match self.mailbox.take() {
            Some(mailbox) => Ok(mailbox.close()?),
            None => Ok(()),
        }
    }
}

impl<M: Machine> Drop for ActiveObject<M> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            log::warn!("[AO] {} dropped before stop, stopping it", self.name);
            if let Err(err) = self.stop() {
                log::error!("[AO] {} failed to stop: {err}", self.name);
            }
        }
        if let Some(mailbox) = self.mailbox.take() {
            if let Err(err) = mailbox.close() {
                log::error!("[AO] {} failed to close its mailbox: {err}", self.name);
            }
        }
    }
}

impl<M: Machine> fmt::Debug for ActiveObject<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("name", &self.name)
            .field("thread", &self.thread_name)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Dispatch loop: receive, dispatch, repeat until the terminal state.
fn run<M: Machine>(
    name: MailboxName,
    mut dispatcher: Dispatcher<M>,
    mailbox: Inbox<M>,
    trace_hook: Option<TraceHook<M>>,
    phase: Arc<AtomicU8>,
) -> LoopExit<M> {
    log::debug!("[AO] {name} loop entered in {:?}", dispatcher.state());
    let error = loop {
        let envelope = match mailbox.receive() {
            Ok(envelope) => envelope,
            Err(err) => {
                log::error!("[AO] {name} loop ended on mailbox error: {err}");
                break Some(err);
            }
        };
        let outcome = dispatcher.dispatch(envelope);
        if let Some(hook) = &trace_hook {
            hook(&outcome);
        }
        if dispatcher.is_terminated() {
            break None;
        }
    };
    phase.store(Phase::Stopped as u8, Ordering::Release);
    mailbox.seal();
    log::debug!("[AO] {name} loop exited");

    LoopExit {
        dispatcher,
        mailbox,
        error,
    }
}
