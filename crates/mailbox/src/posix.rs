//! POSIX message queue backend (`posix-mq` feature, Linux only).
//!
//! Queues are opened `O_CREAT | O_RDWR` with mode `0600`. Every message is
//! sent at priority 0 so the kernel keeps plain FIFO order.

use std::ffi::CString;
use std::io;

use nix::errno::Errno;
use nix::mqueue::{mq_close, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT};
use nix::sys::stat::Mode;

use crate::error::{MailboxError, UnlinkError};
use crate::name::MailboxName;

const PRIORITY: u32 = 0;

fn c_name(name: &MailboxName) -> Result<CString, MailboxError> {
    CString::new(name.as_str()).map_err(|_| MailboxError::InvalidName {
        name: name.to_string(),
        reason: "must not contain NUL",
    })
}

/// Removes `name` from the kernel's queue namespace.
pub(crate) fn unlink(name: &MailboxName) -> Result<(), UnlinkError> {
    let cname = CString::new(name.as_str()).map_err(|_| UnlinkError::NotFound(name.to_string()))?;
    match mq_unlink(cname.as_c_str()) {
        Ok(()) => Ok(()),
        Err(Errno::ENOENT) => Err(UnlinkError::NotFound(name.to_string())),
        Err(Errno::EACCES) => Err(UnlinkError::PermissionDenied(name.to_string())),
        Err(Errno::ENAMETOOLONG) => Err(UnlinkError::NameTooLong(name.to_string())),
        Err(errno) => Err(UnlinkError::Os {
            name: name.to_string(),
            source: io::Error::from(errno),
        }),
    }
}

/// Open descriptor on a kernel message queue.
pub(crate) struct PosixQueue {
    name: MailboxName,
    mqd: Option<MqdT>,
    message_size: usize,
}

impl PosixQueue {
    pub(crate) fn open(name: &MailboxName, capacity: usize, message_size: usize) -> Result<Self, MailboxError> {
        let cname = c_name(name)?;
        let attr = MqAttr::new(0, capacity as _, message_size as _, 0);
        let mqd = mq_open(
            cname.as_c_str(),
            MQ_OFlag::O_CREAT | MQ_OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
            Some(&attr),
        )
        .map_err(|errno| MailboxError::Create {
            name: name.to_string(),
            source: io::Error::from(errno),
        })?;
        Ok(Self {
            name: name.clone(),
            mqd: Some(mqd),
            message_size,
        })
    }

    fn descriptor(&self) -> Result<&MqdT, MailboxError> {
        self.mqd
            .as_ref()
            .ok_or_else(|| MailboxError::Closed(self.name.to_string()))
    }

    fn os_error(&self, errno: Errno) -> MailboxError {
        match errno {
            Errno::EBADF => MailboxError::Closed(self.name.to_string()),
            other => MailboxError::Os {
                name: self.name.to_string(),
                source: io::Error::from(other),
            },
        }
    }

    /// Blocks while the queue is full.
    pub(crate) fn send(&self, frame: &[u8]) -> Result<(), MailboxError> {
        let mqd = self.descriptor()?;
        loop {
            match mq_send(mqd, frame, PRIORITY) {
                Ok(()) => return Ok(()),
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(self.os_error(errno)),
            }
        }
    }

    /// Blocks while the queue is empty.
    pub(crate) fn receive(&self) -> Result<Box<[u8]>, MailboxError> {
        let mqd = self.descriptor()?;
        let mut frame = vec![0u8; self.message_size];
        let mut priority = 0u32;
        loop {
            match mq_receive(mqd, &mut frame, &mut priority) {
                Ok(len) if len == self.message_size => return Ok(frame.into_boxed_slice()),
                Ok(len) => {
                    return Err(MailboxError::SizeMismatch {
                        expected: self.message_size,
                        actual: len,
                    })
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(self.os_error(errno)),
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.mqd
            .as_ref()
            .and_then(|mqd| nix::mqueue::mq_getattr(mqd).ok())
            .map(|attr| attr.curmsgs() as usize)
            .unwrap_or(0)
    }

    pub(crate) fn close(&mut self) {
        if let Some(mqd) = self.mqd.take() {
            if let Err(errno) = mq_close(mqd) {
                log::warn!("[MAILBOX] mq_close failed for {}: {errno} (continue)", self.name);
            }
        }
    }
}

impl Drop for PosixQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached() -> PosixQueue {
        PosixQueue {
            name: MailboxName::new("/detached").unwrap(),
            mqd: None,
            message_size: 8,
        }
    }

    #[test]
    fn oversized_frames_surface_as_os_errors() {
        let err = detached().os_error(Errno::EMSGSIZE);
        match err {
            MailboxError::Os { name, source } => {
                assert_eq!(name, "/detached");
                assert_eq!(source.raw_os_error(), Some(Errno::EMSGSIZE as i32));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn closed_descriptor_reports_closed() {
        let queue = detached();
        assert!(matches!(queue.send(&[0; 8]), Err(MailboxError::Closed(_))));
        assert!(matches!(queue.os_error(Errno::EBADF), MailboxError::Closed(_)));
    }
}
