//! Process Lifecycle Registry
//!
//! Global record of who started whom and how each process ended.
//!
//! Each process id moves through `Running -> Exited(status) -> Reaped`.
//! Records live in one map keyed by pid behind a single lock, so
//! publishing an exit status and reaping it can never interleave: a
//! parent either finds the child still running and blocks, or finds the
//! status and takes it. Reaped records stay behind as tombstones so a
//! second wait fails instead of blocking.
//!
//! # Reclamation
//! - A parent's exit drops the finished records of its children (nobody
//!   can wait on them any more) and marks its running children orphaned
//! - An orphan's record is dropped as soon as it exits
//! - A record with no known parent is kept: its exit may have raced
//!   ahead of [`Registry::start_child`] linking it

use alloc::collections::BTreeMap;

use log::{debug, error, trace, warn};
use spin::Mutex;

use super::{Pid, Scheduler};
use crate::error::SyscallError;

/// Where a process is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    /// Terminated; the status waits for its parent.
    Exited(i32),
    /// The parent has collected the status.
    Reaped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    /// Not linked to a parent (yet).
    Unlinked,
    Linked(Pid),
    /// The parent exited first.
    Orphaned,
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    parent: Parent,
    state: LifecycleState,
}

impl Lifecycle {
    const fn running() -> Self {
        Self {
            parent: Parent::Unlinked,
            state: LifecycleState::Running,
        }
    }
}

/// Process-wide lifecycle records.
///
/// The kernel keeps one of these in a `static`; `new` is `const`.
pub struct Registry {
    records: Mutex<BTreeMap<Pid, Lifecycle>>,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Current state of `pid`, or None if no record is held.
    pub fn state(&self, pid: Pid) -> Option<LifecycleState> {
        self.records.lock().get(&pid).map(|rec| rec.state)
    }

    /// Parent `pid` is linked to, if any.
    pub fn parent_of(&self, pid: Pid) -> Option<Pid> {
        match self.records.lock().get(&pid)?.parent {
            Parent::Linked(parent) => Some(parent),
            Parent::Unlinked | Parent::Orphaned => None,
        }
    }

    /// Number of records held, tombstones included.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a child of `parent` through `spawn` and link it.
    ///
    /// `spawn` runs without the registry lock held, since loading a
    /// program may block. The link exists before this returns `Ok`; when
    /// `spawn` fails nothing is recorded.
    pub fn start_child<F>(&self, parent: Pid, spawn: F) -> Result<Pid, SyscallError>
    where
        F: FnOnce() -> Option<Pid>,
    {
        let child = match spawn() {
            Some(child) => child,
            None => {
                debug!("[PROCESS] {} failed to start a child", parent);
                return Err(SyscallError::SpawnFailed);
            }
        };

        let mut records = self.records.lock();
        let rec = records.entry(child).or_insert(Lifecycle::running());
        if rec.parent != Parent::Unlinked {
            error!("[PROCESS] pid {} already has a parent ({:?})", child, rec.parent);
            return Err(SyscallError::SpawnFailed);
        }
        rec.parent = Parent::Linked(parent);
        trace!("[PROCESS] linked {} -> {}", parent, child);
        Ok(child)
    }

    /// Publish `pid`'s exit status and wake its parent.
    ///
    /// The status is recorded under the registry lock, so it is visible to
    /// any later check by a waiting parent. Only the first exit of a pid is
    /// recorded.
    pub fn exit(&self, pid: Pid, status: i32, sched: &dyn Scheduler) {
        let waiter = {
            let mut records = self.records.lock();

            // Children of the exiting process can no longer be waited on.
            records.retain(|_, rec| {
                rec.parent != Parent::Linked(pid) || rec.state == LifecycleState::Running
            });
            for rec in records.values_mut() {
                if rec.parent == Parent::Linked(pid) {
                    rec.parent = Parent::Orphaned;
                }
            }

            let rec = records.entry(pid).or_insert(Lifecycle::running());
            if rec.state != LifecycleState::Running {
                warn!("[PROCESS] {} exited twice, keeping {:?}", pid, rec.state);
                return;
            }

            let parent = rec.parent;
            match parent {
                Parent::Orphaned => {
                    records.remove(&pid);
                    None
                }
                Parent::Linked(parent) => {
                    rec.state = LifecycleState::Exited(status);
                    Some(parent)
                }
                Parent::Unlinked => {
                    rec.state = LifecycleState::Exited(status);
                    None
                }
            }
        };

        if let Some(parent) = waiter {
            trace!("[PROCESS] waking {} for child {}", parent, pid);
            sched.wake(parent);
        }
    }

    /// Wait for `child` of `parent` to exit and collect its status.
    ///
    /// Fails at once if `child` is not a direct child of `parent` or was
    /// already reaped. Otherwise blocks through the scheduler until the
    /// child exits.
    pub fn wait(
        &self,
        parent: Pid,
        child: Pid,
        sched: &dyn Scheduler,
    ) -> Result<i32, SyscallError> {
        if let Some(result) = self.try_reap(parent, child) {
            return result;
        }

        debug!("[PROCESS] {} blocking on child {}", parent, child);
        let mut outcome = None;
        let mut ready = || {
            outcome = self.try_reap(parent, child);
            outcome.is_some()
        };
        sched.yield_until(&mut ready);

        outcome.unwrap_or(Err(SyscallError::BadWaitTarget))
    }

    /// One locked check of `child`. None while it is still running.
    fn try_reap(&self, parent: Pid, child: Pid) -> Option<Result<i32, SyscallError>> {
        let mut records = self.records.lock();
        let rec = match records.get_mut(&child) {
            Some(rec) if rec.parent == Parent::Linked(parent) => rec,
            _ => return Some(Err(SyscallError::BadWaitTarget)),
        };

        match rec.state {
            LifecycleState::Running => None,
            LifecycleState::Exited(status) => {
                rec.state = LifecycleState::Reaped;
                trace!("[PROCESS] {} reaped {} (status {})", parent, child, status);
                Some(Ok(status))
            }
            LifecycleState::Reaped => Some(Err(SyscallError::BadWaitTarget)),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
