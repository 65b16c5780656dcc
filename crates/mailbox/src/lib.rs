//! # mailbox
//!
//! Named, bounded, blocking FIFO channels carrying fixed-size messages.
//!
//! A mailbox has one reader and any number of writers. `send` blocks while
//! the channel holds `capacity` messages; `receive` blocks while it is
//! empty. Messages from one sender come out in the order they were sent.
//!
//! ## Module Overview
//! - [`codec`]   – [`Message`] trait, frame cursors and the versioned [`Envelope`].
//! - [`name`]    – [`MailboxName`] validation and the [`Namespace`] registry.
//! - [`mailbox`] – [`Mailbox`] and [`Sender`] handles over a [`Backend`].
//!
//! Names live in a [`Namespace`]: the process-wide one by default, or a
//! private one supplied through [`MailboxConfig`]. With the `posix-mq`
//! feature on Linux, [`Backend::Posix`] puts the channel in the kernel's
//! message queue namespace instead.

pub mod codec;
mod error;
mod local;
pub mod mailbox;
pub mod name;
#[cfg(all(feature = "posix-mq", target_os = "linux"))]
mod posix;

pub use codec::{Envelope, Message, Reader, Writer, ENVELOPE_HEADER_LEN, WIRE_VERSION};
pub use error::{CodecError, MailboxError, MailboxResult, UnlinkError};
pub use mailbox::{
    Backend, Mailbox, MailboxConfig, MailboxConfigBuilder, Sender, DEFAULT_CAPACITY, MAX_CAPACITY,
};
pub use name::{MailboxName, Namespace, MAX_NAME_LEN, NAME_PREFIX};
