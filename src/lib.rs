//! trapgate - System Call Boundary for PantherOS
//!
//! The kernel side of the user/kernel trust boundary: a trapped user
//! process hands over an untrusted stack pointer, and this crate decodes
//! the request, validates every pointer it names, and routes it to the
//! file or process service.
//!
//! # Components
//! - [`mm`]: address types and the user address validator
//! - [`fdt`]: per-process descriptor table
//! - [`process`]: process state, scheduler interface, lifecycle registry
//! - [`syscall`]: call frame cursor and request dispatcher
//! - [`trap`]: entry points for the trap layer
//!
//! # Security Principles
//! - Every user byte is reached through a [`mm::UserRegion`], which only
//!   the validator can construct
//! - A bad pointer kills the calling process, never the kernel
//! - Exit status is published and reaped under one lock

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod fdt;
pub mod fs;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testutil;

pub use error::SyscallError;
pub use fdt::{DescriptorTable, Fd};
pub use fs::{Console, File, FileSystem};
pub use mm::{PageFlags, UserMemory, UserRegion, VirtAddr};
pub use process::{Pid, Process, Registry, Scheduler, System};
pub use syscall::{dispatch, CallFrame, Disposition, TrapFrame};
