//! Process State and Scheduler Interface
//!
//! A [`Process`] is the kernel's view of one user program for the
//! duration of a trap: its id, its command line, and its open files.
//! The scheduler and loader live elsewhere and are reached through
//! [`Scheduler`].
//!
//! # Design
//! - One thread of control per process, so a process needs no lock
//! - Exit tears down the descriptor table and publishes the status
//!   through the global [`Registry`]

mod registry;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use core::fmt;

use log::info;

use crate::fdt::DescriptorTable;
use crate::fs::{Console, FileSystem};

pub use registry::{LifecycleState, Registry};

/// Process identifier.
///
/// Ids are handed out by the scheduler and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scheduler and process loader.
pub trait Scheduler: Sync {
    /// Load and start `cmdline`. Returns the new process id once the
    /// program is known to have loaded, or None if it could not start.
    fn start_process(&self, cmdline: &str) -> Option<Pid>;

    /// Block the current thread until `ready` returns true.
    ///
    /// `ready` is evaluated before sleeping and again after every
    /// [`wake`](Self::wake). A wake that arrives after an evaluation
    /// returned false must not be lost.
    fn yield_until(&self, ready: &mut dyn FnMut() -> bool);

    /// Make `pid` re-evaluate whatever it is blocked on.
    fn wake(&self, pid: Pid);

    /// Tear down the current thread. Called once exit has been published.
    fn terminate_current(&self) -> !;

    /// Shut the machine down.
    fn power_off(&self) -> !;
}

/// The kernel services a trap handler can reach.
#[derive(Clone, Copy)]
pub struct System<'a> {
    pub registry: &'a Registry,
    pub fs: &'a dyn FileSystem,
    pub console: &'a dyn Console,
    pub scheduler: &'a dyn Scheduler,
}

/// Kernel-side state of one user process.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    cmdline: String,
    files: Option<Box<DescriptorTable>>,
    exit_status: Option<i32>,
}

impl Process {
    /// Create the state for a freshly started process.
    pub fn new(pid: Pid, cmdline: &str) -> Self {
        Self {
            pid,
            cmdline: cmdline.to_string(),
            files: Some(Box::default()),
            exit_status: None,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name: the first word of the command line.
    pub fn name(&self) -> &str {
        self.cmdline.split(' ').find(|word| !word.is_empty()).unwrap_or("")
    }

    /// The descriptor table, or None once the process has exited.
    pub fn files(&mut self) -> Option<&mut DescriptorTable> {
        self.files.as_deref_mut()
    }

    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Run the exit path: report, close every file, publish the status.
    ///
    /// Runs at most once; later calls are ignored.
    pub fn exit(&mut self, status: i32, sys: &System<'_>) {
        if self.exit_status.is_some() {
            return;
        }
        self.exit_status = Some(status);

        info!("[PROCESS] {} ({}) exiting with {}", self.name(), self.pid, status);
        let report = format!("{}: exit({})\n", self.name(), status);
        sys.console.put_bytes(report.as_bytes());

        if let Some(files) = self.files.take() {
            (*files).destroy();
        }

        sys.registry.exit(self.pid, status, sys.scheduler);
    }
}
