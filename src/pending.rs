//! Table of in-flight requests.
//!
//! A fixed window of slots indexed by `id % window`. Each slot owns the
//! sending half of a oneshot channel, so a reply is delivered at most once
//! and a slot is freed the moment it is delivered. Closing the table drops
//! every sender: all waiters observe a closed channel, and later
//! registrations fail immediately.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{CloudError, Result};

struct Slot<T> {
    id: u32,
    tx: oneshot::Sender<T>,
}

struct Inner<T> {
    slots: Vec<Option<Slot<T>>>,
    in_flight: usize,
    closed: bool,
}

/// Pending-reply mailboxes keyed by request ID.
pub struct PendingTable<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> PendingTable<T> {
    /// Create a table with room for `window` outstanding requests.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        let mut slots = Vec::with_capacity(window);
        slots.resize_with(window, || None);
        Self {
            inner: Mutex::new(Inner {
                slots,
                in_flight: 0,
                closed: false,
            }),
        }
    }

    /// Number of requests currently awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }

    /// Claim the first free ID at or after `start`.
    ///
    /// IDs whose slot is still occupied by an older request are skipped, so a
    /// wrapped-around counter can never alias an outstanding request.
    pub fn register(&self, start: u32) -> Result<(u32, oneshot::Receiver<T>)> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(CloudError::NotConnected);
        }
        let window = inner.slots.len();
        for offset in 0..window {
            let id = start.wrapping_add(offset as u32);
            let index = id as usize % window;
            if inner.slots[index].is_none() {
                let (tx, rx) = oneshot::channel();
                inner.slots[index] = Some(Slot { id, tx });
                inner.in_flight += 1;
                return Ok((id, rx));
            }
        }
        Err(CloudError::Protocol("pending window exhausted".to_string()))
    }

    /// Hand `value` to the waiter registered under `id`.
    ///
    /// Gives the value back when no such request is pending or its waiter has
    /// gone away.
    pub fn deliver(&self, id: u32, value: T) -> std::result::Result<(), T> {
        let slot = {
            let mut inner = self.inner.lock();
            let index = id as usize % inner.slots.len();
            match &inner.slots[index] {
                Some(slot) if slot.id == id => {}
                _ => return Err(value),
            }
            inner.in_flight -= 1;
            inner.slots[index].take()
        };
        match slot {
            Some(slot) => slot.tx.send(value),
            None => Err(value),
        }
    }

    /// Forget a request whose waiter stopped waiting. Returns false when the
    /// slot was already delivered or reused.
    pub fn remove(&self, id: u32) -> bool {
        let mut inner = self.inner.lock();
        let index = id as usize % inner.slots.len();
        match &inner.slots[index] {
            Some(slot) if slot.id == id => {
                inner.slots[index] = None;
                inner.in_flight -= 1;
                true
            }
            _ => false,
        }
    }

    /// Fail every waiter and refuse new registrations. Returns how many
    /// requests were pending.
    pub fn close(&self) -> usize {
        let dropped: Vec<Slot<T>> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.in_flight = 0;
            inner.slots.iter_mut().filter_map(Option::take).collect()
        };
        dropped.len()
    }
}
