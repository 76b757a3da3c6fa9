//! System Call Interface
//!
//! Provides a secure system call interface for user-mode applications.
//!
//! # Security Model
//! - Whitelist approach: only explicitly implemented requests are served
//! - All parameters are validated before use
//! - A malformed request kills the caller, never the kernel
//!
//! # Current Syscalls
//! - 0: halt() - power the machine off
//! - 1: exit(status) - terminate the current process
//! - 2: exec(cmdline) - start a child process
//! - 3: wait(pid) - collect a child's exit status
//! - 4: create(name, size) / 5: remove(name)
//! - 6: open(name) / 12: close(fd)
//! - 7: filesize(fd) / 10: seek(fd, pos) / 11: tell(fd)
//! - 8: read(fd, buf, len) / 9: write(fd, buf, len)

mod frame;
mod handler;
mod request;

pub use frame::{CallFrame, TrapFrame, WORD_SIZE};
pub use handler::{dispatch, Disposition};
pub use request::{numbers, Request};
