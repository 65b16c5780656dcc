//! Typed mailbox handles.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codec::{self, Message};
use crate::error::{MailboxError, MailboxResult, UnlinkError};
use crate::local::{LocalQueue, Status};
use crate::name::{MailboxName, Namespace};

#[cfg(all(feature = "posix-mq", target_os = "linux"))]
use crate::posix::{self, PosixQueue};

/// Default number of queued messages, matching the Linux `msg_max` default.
pub const DEFAULT_CAPACITY: usize = 10;

/// Upper bound accepted for [`MailboxConfig::capacity`].
pub const MAX_CAPACITY: usize = 1024;

/// Channel implementation behind a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// In-process queue registered in a [`Namespace`].
    #[default]
    Local,
    /// Kernel POSIX message queue. Needs the `posix-mq` feature on Linux.
    Posix,
}

impl Backend {
    pub fn is_available(self) -> bool {
        match self {
            Self::Local => true,
            Self::Posix => cfg!(all(feature = "posix-mq", target_os = "linux")),
        }
    }
}

/// Mailbox creation parameters.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub capacity: usize,
    pub backend: Backend,
    pub namespace: Option<Arc<Namespace>>,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            backend: Backend::Local,
            namespace: None,
        }
    }
}

impl MailboxConfig {
    pub fn builder() -> MailboxConfigBuilder {
        MailboxConfigBuilder::default()
    }

    /// Namespace used for names and local channels: the configured one or
    /// the process-wide one.
    pub fn namespace(&self) -> Arc<Namespace> {
        self.namespace.clone().unwrap_or_else(Namespace::global)
    }

    fn validate(&self) -> MailboxResult<()> {
        if self.capacity == 0 {
            return Err(MailboxError::InvalidConfig("capacity must be at least 1"));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(MailboxError::InvalidConfig("capacity exceeds MAX_CAPACITY"));
        }
        if !self.backend.is_available() {
            return Err(MailboxError::InvalidConfig(
                "POSIX backend needs the posix-mq feature on Linux",
            ));
        }
        Ok(())
    }
}

/// Builder for [`MailboxConfig`].
#[derive(Debug, Clone, Default)]
pub struct MailboxConfigBuilder {
    config: MailboxConfig,
}

impl MailboxConfigBuilder {
    /// Sets the maximum number of queued messages.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Uses a private namespace instead of the process-wide one.
    pub fn namespace(mut self, namespace: Arc<Namespace>) -> Self {
        self.config.namespace = Some(namespace);
        self
    }

    pub fn build(self) -> MailboxConfig {
        self.config
    }
}

enum Channel {
    Local {
        queue: Arc<LocalQueue>,
        namespace: Arc<Namespace>,
    },
    #[cfg(all(feature = "posix-mq", target_os = "linux"))]
    Posix(PosixQueue),
}

struct Shared {
    name: MailboxName,
    capacity: usize,
    message_size: usize,
    sealed: AtomicBool,
    channel: Channel,
}

impl Shared {
    fn status(&self, status: Status) -> MailboxError {
        let name = self.name.to_string();
        match status {
            Status::Full => MailboxError::Full(name),
            Status::Empty => MailboxError::Empty(name),
            Status::Closed => MailboxError::Closed(name),
        }
    }

    fn send_frame(&self, frame: &[u8], block: bool) -> MailboxResult<()> {
        if frame.len() != self.message_size {
            return Err(MailboxError::SizeMismatch {
                expected: self.message_size,
                actual: frame.len(),
            });
        }
        if self.sealed.load(Ordering::Acquire) {
            return Err(self.status(Status::Closed));
        }
        match &self.channel {
            Channel::Local { queue, .. } => queue.send(frame, block).map_err(|s| self.status(s))?,
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Channel::Posix(queue) => {
                // Best effort: another writer may fill the last slot first.
                if !block && queue.len() >= self.capacity {
                    return Err(self.status(Status::Full));
                }
                queue.send(frame)?
            }
        }
        log::trace!("[MAILBOX] Sending message to the mailbox {}", self.name);
        Ok(())
    }

    fn receive_frame(&self, block: bool) -> MailboxResult<Box<[u8]>> {
        let frame = match &self.channel {
            Channel::Local { queue, .. } => queue.receive(block).map_err(|s| self.status(s))?,
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Channel::Posix(queue) => {
                if !block && queue.len() == 0 {
                    return Err(self.status(Status::Empty));
                }
                queue.receive()?
            }
        };
        log::trace!("[MAILBOX] Receiving a message from {}", self.name);
        Ok(frame)
    }

    fn len(&self) -> usize {
        match &self.channel {
            Channel::Local { queue, .. } => queue.len(),
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Channel::Posix(queue) => queue.len(),
        }
    }

    fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
        match &self.channel {
            Channel::Local { queue, .. } => queue.close(),
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Channel::Posix(_) => {}
        }
    }

    fn release(&self) -> MailboxResult<()> {
        let result = match &self.channel {
            Channel::Local { queue, namespace } => {
                queue.close();
                namespace.unlink_if(&self.name, queue)
            }
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Channel::Posix(_) => posix::unlink(&self.name),
        };
        tolerate_cleanup(result)
    }
}

/// Applies the cleanup policy: benign unlink failures are logged, anything
/// else is returned.
pub(crate) fn tolerate_cleanup(result: Result<(), UnlinkError>) -> MailboxResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_benign() => {
            log::warn!("[MAILBOX] unlink: {err} (continue)");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn unlink_stale(name: &MailboxName, config: &MailboxConfig) -> MailboxResult<()> {
    let result = match config.backend {
        Backend::Local => config.namespace().unlink(name),
        #[cfg(all(feature = "posix-mq", target_os = "linux"))]
        Backend::Posix => posix::unlink(name),
        #[cfg(not(all(feature = "posix-mq", target_os = "linux")))]
        Backend::Posix => Ok(()),
    };
    match result {
        Ok(()) => {
            log::debug!("[MAILBOX] removed stale mailbox {name}");
            Ok(())
        }
        Err(UnlinkError::NotFound(_)) => {
            log::debug!("[MAILBOX] no stale mailbox named {name}");
            Ok(())
        }
        other => tolerate_cleanup(other),
    }
}

/// Named, bounded, blocking FIFO of `M` messages.
///
/// The mailbox is the reading end. Writers obtain cloneable [`Sender`]s.
/// Dropping the mailbox closes the channel and unlinks its name.
pub struct Mailbox<M> {
    shared: Arc<Shared>,
    released: bool,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message> Mailbox<M> {
    /// Creates a channel named `name`, replacing any stale one.
    pub fn create(name: MailboxName, config: &MailboxConfig) -> MailboxResult<Self> {
        config.validate()?;
        if M::SIZE == 0 {
            return Err(MailboxError::InvalidConfig("message size must be at least 1 byte"));
        }
        log::debug!("[MAILBOX] Opening the mailbox {name}");
        unlink_stale(&name, config)?;

        let channel = match config.backend {
            Backend::Local => {
                let namespace = config.namespace();
                let queue = Arc::new(LocalQueue::new(config.capacity));
                namespace.link(name.clone(), Arc::clone(&queue));
                Channel::Local { queue, namespace }
            }
            #[cfg(all(feature = "posix-mq", target_os = "linux"))]
            Backend::Posix => Channel::Posix(PosixQueue::open(&name, config.capacity, M::SIZE)?),
            #[cfg(not(all(feature = "posix-mq", target_os = "linux")))]
            Backend::Posix => {
                return Err(MailboxError::InvalidConfig(
                    "POSIX backend needs the posix-mq feature on Linux",
                ))
            }
        };

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                capacity: config.capacity,
                message_size: M::SIZE,
                sealed: AtomicBool::new(false),
                channel,
            }),
            released: false,
            _marker: PhantomData,
        })
    }

    pub fn name(&self) -> &MailboxName {
        &self.shared.name
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn message_size(&self) -> usize {
        self.shared.message_size
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a new writer handle.
    pub fn sender(&self) -> Sender<M> {
        Sender {
            shared: Arc::clone(&self.shared),
            _marker: PhantomData,
        }
    }

    /// Encodes and sends, blocking while the mailbox is full.
    pub fn send(&self, message: &M) -> MailboxResult<()> {
        self.shared.send_frame(&codec::to_frame(message)?, true)
    }

    /// Sends without blocking, failing with [`MailboxError::Full`].
    pub fn try_send(&self, message: &M) -> MailboxResult<()> {
        self.shared.send_frame(&codec::to_frame(message)?, false)
    }

    pub fn send_raw(&self, frame: &[u8]) -> MailboxResult<()> {
        self.shared.send_frame(frame, true)
    }

    /// Blocks until a message arrives and decodes it.
    pub fn receive(&self) -> MailboxResult<M> {
        let frame = self.shared.receive_frame(true)?;
        Ok(codec::from_frame(&frame)?)
    }

    /// Receives without blocking, failing with [`MailboxError::Empty`].
    pub fn try_receive(&self) -> MailboxResult<M> {
        let frame = self.shared.receive_frame(false)?;
        Ok(codec::from_frame(&frame)?)
    }

    pub fn receive_raw(&self) -> MailboxResult<Box<[u8]>> {
        self.shared.receive_frame(true)
    }

    /// Stops accepting messages while keeping the name. Later senders get
    /// [`MailboxError::Closed`] and queued messages can still be received.
    /// Local senders already blocked on a full queue wake with `Closed`; a
    /// sender parked inside a POSIX `mq_send` stays there.
    pub fn seal(&self) {
        log::trace!("[MAILBOX] Sealing the mailbox {}", self.shared.name);
        self.shared.seal();
    }

    /// Closes the channel and removes its name.
    pub fn close(mut self) -> MailboxResult<()> {
        self.released = true;
        log::debug!("[MAILBOX] Closing the mailbox {}", self.shared.name);
        self.shared.release()
    }
}

impl<M> Drop for Mailbox<M> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(err) = self.shared.release() {
                log::error!("[MAILBOX] failed to release {}: {err}", self.shared.name);
            }
        }
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("name", &self.shared.name)
            .field("capacity", &self.shared.capacity)
            .field("message_size", &self.shared.message_size)
            .finish()
    }
}

/// Writing end of a [`Mailbox`].
pub struct Sender<M> {
    shared: Arc<Shared>,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for Sender<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _marker: PhantomData,
        }
    }
}

impl<M: Message> Sender<M> {
    pub fn name(&self) -> &MailboxName {
        &self.shared.name
    }

    /// Encodes and sends, blocking while the mailbox is full.
    pub fn send(&self, message: &M) -> MailboxResult<()> {
        self.shared.send_frame(&codec::to_frame(message)?, true)
    }

    pub fn try_send(&self, message: &M) -> MailboxResult<()> {
        self.shared.send_frame(&codec::to_frame(message)?, false)
    }

    pub fn send_raw(&self, frame: &[u8]) -> MailboxResult<()> {
        self.shared.send_frame(frame, true)
    }
}

impl<M> fmt::Debug for Sender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Sender").field(&self.shared.name).finish()
    }
}
