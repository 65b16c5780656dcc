//! Mailbox names and the process-wide channel namespace.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::{MailboxError, UnlinkError};
use crate::local::LocalQueue;

/// Prefix shared by every derived mailbox name.
pub const NAME_PREFIX: &str = "/mbox";

/// Longest name accepted, leaving room for the terminating NUL of a
/// 30-byte OS name buffer.
pub const MAX_NAME_LEN: usize = 29;

/// Validated channel name of the form `/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MailboxName(String);

impl MailboxName {
    pub fn new(name: impl Into<String>) -> Result<Self, MailboxError> {
        let name = name.into();
        let reason = if !name.starts_with('/') {
            Some("must start with '/'")
        } else if name.len() == 1 {
            Some("must not be empty after '/'")
        } else if name.len() > MAX_NAME_LEN {
            Some("longer than 29 bytes")
        } else if name[1..].contains('/') {
            Some("must not contain '/' after the first character")
        } else if name.bytes().any(|b| b == 0) {
            Some("must not contain NUL")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(MailboxError::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// Builds `/mbox{base}{instance}`.
    pub fn derive(base: &str, instance: u32) -> Result<Self, MailboxError> {
        Self::new(format!("{NAME_PREFIX}{base}{instance}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MailboxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MailboxName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Default)]
struct NamespaceInner {
    channels: HashMap<MailboxName, Arc<LocalQueue>>,
    counters: HashMap<String, u32>,
}

/// Registry of named in-process channels and per-type instance counters.
///
/// Names are unique within a namespace at any time. Linking a name that is
/// already present replaces the entry; holders of the old channel keep it
/// until they drop it, the same way an unlinked OS queue survives while
/// descriptors remain open.
#[derive(Default)]
pub struct Namespace {
    inner: Mutex<NamespaceInner>,
}

static GLOBAL: Lazy<Arc<Namespace>> = Lazy::new(|| Arc::new(Namespace::new()));

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// The namespace shared by the whole process.
    pub fn global() -> Arc<Namespace> {
        Arc::clone(&GLOBAL)
    }

    /// Returns the next instance number for `base`, starting at 1.
    pub fn next_instance(&self, base: &str) -> u32 {
        let mut inner = self.inner.lock();
        let counter = inner.counters.entry(base.to_owned()).or_insert(0);
        *counter = counter.wrapping_add(1);
        *counter
    }

    /// Derives a fresh name for another instance of `base`.
    pub fn next_name(&self, base: &str) -> Result<(MailboxName, u32), MailboxError> {
        let instance = self.next_instance(base);
        MailboxName::derive(base, instance).map(|name| (name, instance))
    }

    pub fn contains(&self, name: &MailboxName) -> bool {
        self.inner.lock().channels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `name`. Current holders keep using the channel until they
    /// close it.
    pub fn unlink(&self, name: &MailboxName) -> Result<(), UnlinkError> {
        match self.inner.lock().channels.remove(name) {
            Some(_) => Ok(()),
            None => Err(UnlinkError::NotFound(name.to_string())),
        }
    }

    /// Unlinks only if `name` still refers to `queue`.
    pub(crate) fn unlink_if(&self, name: &MailboxName, queue: &Arc<LocalQueue>) -> Result<(), UnlinkError> {
        let mut inner = self.inner.lock();
        match inner.channels.get(name) {
            Some(current) if Arc::ptr_eq(current, queue) => {
                inner.channels.remove(name);
                Ok(())
            }
            _ => Err(UnlinkError::NotFound(name.to_string())),
        }
    }

    pub(crate) fn link(&self, name: MailboxName, queue: Arc<LocalQueue>) {
        self.inner.lock().channels.insert(name, queue);
    }

    /// Unlinks every channel and resets all instance counters.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.counters.clear();
            inner.channels.drain().map(|(_, queue)| queue).collect()
        };
        for queue in drained {
            queue.close();
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Namespace")
            .field("channels", &inner.channels.keys().collect::<Vec<_>>())
            .field("counters", &inner.counters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_follow_prefix() {
        let name = MailboxName::derive("Example", 3).unwrap();
        assert_eq!(name.as_str(), "/mboxExample3");
    }

    #[test]
    fn invalid_names_are_rejected() {
        for bad in ["noslash", "/", "/a/b", "/this-name-is-far-too-long-for-a-queue"] {
            assert!(
                matches!(MailboxName::new(bad), Err(MailboxError::InvalidName { .. })),
                "{bad} accepted"
            );
        }
        assert!(MailboxName::new(format!("/{}", "x".repeat(28))).is_ok());
    }

    #[test]
    fn counters_are_per_base_and_monotonic() {
        let ns = Namespace::new();
        assert_eq!(ns.next_instance("A"), 1);
        assert_eq!(ns.next_instance("A"), 2);
        assert_eq!(ns.next_instance("B"), 1);
        ns.clear();
        assert_eq!(ns.next_instance("A"), 1);
    }

    #[test]
    fn unlink_missing_name_is_not_found() {
        let ns = Namespace::new();
        let name = MailboxName::new("/missing").unwrap();
        let err = ns.unlink(&name).unwrap_err();
        assert!(matches!(err, UnlinkError::NotFound(_)));
        assert!(err.is_benign());
    }
}
