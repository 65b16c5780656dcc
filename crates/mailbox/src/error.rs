//! Error types for mailbox operations.

use std::io;

use thiserror::Error;

/// Errors raised while encoding or decoding fixed-size messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame truncated: needed {needed} bytes at offset {offset}, frame is {len} bytes")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("unsupported wire version {0}")]
    UnknownVersion(u8),
    #[error("unknown frame kind {0}")]
    UnknownFrame(u8),
    #[error("unknown event tag {0}")]
    UnknownTag(u8),
    #[error("frame length {actual} does not match message size {expected}")]
    Length { expected: usize, actual: usize },
}

/// Failure to remove a name from the channel namespace.
///
/// `NotFound`, `PermissionDenied` and `NameTooLong` are cleanup failures:
/// callers log them and carry on. `Os` is anything else.
#[derive(Error, Debug)]
pub enum UnlinkError {
    #[error("no channel named {0}")]
    NotFound(String),
    #[error("no permission to unlink {0}")]
    PermissionDenied(String),
    #[error("name too long: {0}")]
    NameTooLong(String),
    #[error("failed to unlink {name}: {source}")]
    Os {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl UnlinkError {
    /// Returns `true` for the outcomes that are logged and tolerated.
    pub fn is_benign(&self) -> bool {
        !matches!(self, Self::Os { .. })
    }
}

/// Errors returned by [`Mailbox`](crate::Mailbox) and [`Sender`](crate::Sender).
#[derive(Error, Debug)]
pub enum MailboxError {
    #[error("invalid mailbox name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("invalid mailbox configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("cannot create mailbox {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Unlink(#[from] UnlinkError),
    #[error("message is {actual} bytes, mailbox expects {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("mailbox {0} is closed")]
    Closed(String),
    #[error("mailbox {0} is full")]
    Full(String),
    #[error("mailbox {0} is empty")]
    Empty(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("mailbox {name}: {source}")]
    Os {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type MailboxResult<T> = Result<T, MailboxError>;
