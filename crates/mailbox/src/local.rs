//! In-process bounded channel backing [`Backend::Local`](crate::Backend::Local).

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Why a channel operation could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Full,
    Empty,
    Closed,
}

struct QueueState {
    frames: VecDeque<Box<[u8]>>,
    closed: bool,
}

/// Bounded FIFO of fixed-size frames.
///
/// One mutex guards the ring; `not_empty` parks the reader and `not_full`
/// parks writers. Frame sizes are checked by the mailbox before they get
/// here.
pub(crate) struct LocalQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl LocalQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub(crate) fn send(&self, frame: &[u8], block: bool) -> Result<(), Status> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(Status::Closed);
            }
            if state.frames.len() < self.capacity {
                break;
            }
            if !block {
                return Err(Status::Full);
            }
            self.not_full.wait(&mut state);
        }
        state.frames.push_back(frame.into());
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pops the oldest frame. Frames queued before a close are still handed
    /// out; an empty closed queue reports `Closed`.
    pub(crate) fn receive(&self, block: bool) -> Result<Box<[u8]>, Status> {
        let mut state = self.state.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Ok(frame);
            }
            if state.closed {
                return Err(Status::Closed);
            }
            if !block {
                return Err(Status::Empty);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Marks the queue closed and wakes every parked thread.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().frames.len()
    }
}
