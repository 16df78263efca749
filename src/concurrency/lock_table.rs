//! Exclusive record locks with deadlock detection.
//!
//! The table keeps a wait-for graph: each waiting transaction points at the
//! uid it wants, and each uid points at the transaction holding it. A
//! request that would close a cycle is refused instead of queued.
//!
//! Locks are released in bulk when a transaction ends. Each released uid is
//! handed to the first transaction still queued on it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::common::{ConflictKind, Error, Result, Uid};

/// Handle a blocked requester sleeps on until its lock is granted.
#[derive(Debug, Default)]
pub struct Waiter {
    granted: Mutex<bool>,
    cond: Condvar,
}

impl Waiter {
    /// Block until the lock is handed over.
    pub fn wait(&self) {
        let mut granted = self.granted.lock();
        while !*granted {
            self.cond.wait(&mut granted);
        }
    }

    pub fn is_granted(&self) -> bool {
        *self.granted.lock()
    }

    fn grant(&self) {
        *self.granted.lock() = true;
        self.cond.notify_one();
    }
}

#[derive(Default)]
struct LockState {
    /// Uids each transaction holds.
    x2u: HashMap<u64, Vec<Uid>>,
    /// Holder of each locked uid.
    u2x: HashMap<Uid, u64>,
    /// Uid each blocked transaction is waiting for.
    waiting: HashMap<u64, Uid>,
    /// Queue of transactions blocked on each uid, oldest first.
    wait_list: HashMap<Uid, VecDeque<u64>>,
    waiters: HashMap<u64, Arc<Waiter>>,
}

impl LockState {
    fn holds(&self, xid: u64, uid: Uid) -> bool {
        self.x2u.get(&xid).is_some_and(|uids| uids.contains(&uid))
    }

    fn grant(&mut self, xid: u64, uid: Uid) {
        self.u2x.insert(uid, xid);
        self.x2u.entry(xid).or_default().push(uid);
    }

    fn dequeue(&mut self, xid: u64, uid: Uid) {
        if let Some(queue) = self.wait_list.get_mut(&uid) {
            queue.retain(|&x| x != xid);
            if queue.is_empty() {
                self.wait_list.remove(&uid);
            }
        }
    }

    /// Walk the wait-for chain from every waiting transaction.
    ///
    /// Each transaction waits for at most one uid and each uid has one
    /// holder, so every walk is a simple path. Nodes are stamped with the
    /// walk that first reached them; meeting the current stamp again means
    /// a cycle, meeting an older one means the rest was already cleared.
    fn has_deadlock(&self) -> bool {
        let mut stamps: HashMap<u64, u32> = HashMap::with_capacity(self.waiting.len());
        let mut stamp = 0u32;

        for &start in self.waiting.keys() {
            if stamps.contains_key(&start) {
                continue;
            }
            stamp += 1;

            let mut xid = start;
            loop {
                match stamps.get(&xid) {
                    Some(&seen) if seen == stamp => return true,
                    Some(_) => break,
                    None => {}
                }
                stamps.insert(xid, stamp);

                let Some(uid) = self.waiting.get(&xid) else {
                    break;
                };
                let Some(&holder) = self.u2x.get(uid) else {
                    break;
                };
                xid = holder;
            }
        }
        false
    }

    /// Hand `uid` to the oldest transaction still queued on it.
    fn wake(&mut self, uid: Uid) {
        self.u2x.remove(&uid);
        let Some(queue) = self.wait_list.get_mut(&uid) else {
            return;
        };

        let mut next = None;
        while let Some(xid) = queue.pop_front() {
            if let Some(waiter) = self.waiters.remove(&xid) {
                next = Some((xid, waiter));
                break;
            }
        }
        if queue.is_empty() {
            self.wait_list.remove(&uid);
        }

        if let Some((xid, waiter)) = next {
            self.waiting.remove(&xid);
            self.grant(xid, uid);
            waiter.grant();
        }
    }
}

/// Process-wide table of exclusive uid locks.
#[derive(Default)]
pub struct LockTable {
    state: Mutex<LockState>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the lock on `uid` for `xid`.
    ///
    /// Returns `None` when the lock is held on return, or a [`Waiter`] the
    /// caller must [`wait`](Waiter::wait) on before touching the record.
    ///
    /// # Errors
    /// `Error::Conflict(ConflictKind::Deadlock)` if waiting would close a
    /// cycle. The request is withdrawn and nothing else changes.
    pub fn add(&self, xid: u64, uid: Uid) -> Result<Option<Arc<Waiter>>> {
        let mut state = self.state.lock();
        if state.holds(xid, uid) {
            return Ok(None);
        }
        if !state.u2x.contains_key(&uid) {
            state.grant(xid, uid);
            return Ok(None);
        }

        state.waiting.insert(xid, uid);
        state.wait_list.entry(uid).or_default().push_back(xid);
        if state.has_deadlock() {
            state.waiting.remove(&xid);
            state.dequeue(xid, uid);
            tracing::debug!(xid, uid, "deadlock detected");
            return Err(Error::Conflict(ConflictKind::Deadlock));
        }

        let waiter = Arc::new(Waiter::default());
        state.waiters.insert(xid, Arc::clone(&waiter));
        Ok(Some(waiter))
    }

    /// Drop every lock `xid` holds, waking one waiter per released uid.
    pub fn remove(&self, xid: u64) {
        let mut state = self.state.lock();
        if let Some(uids) = state.x2u.remove(&xid) {
            for uid in uids {
                state.wake(uid);
            }
        }
        if let Some(uid) = state.waiting.remove(&xid) {
            state.dequeue(xid, uid);
        }
        state.waiters.remove(&xid);
    }

    /// Current holder of `uid`.
    pub fn holder(&self, uid: Uid) -> Option<u64> {
        self.state.lock().u2x.get(&uid).copied()
    }
}
