//! System call error taxonomy.
//!
//! Errors split into two classes:
//! - Fatal: the user program is broken or hostile. The kernel kills it with
//!   [`EXIT_FAILURE`](crate::config::EXIT_FAILURE).
//! - Ordinary: a normal failure result. The caller sees -1 and keeps running.

use core::fmt;

/// Error raised while decoding or serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// A user address failed validation.
    InvalidMemoryAccess,
    /// The request number is not one we serve.
    UnrecognizedRequest(u32),
    /// Descriptor out of range, reserved, or not open.
    InvalidDescriptor,
    /// Descriptor table is full.
    ResourceExhausted,
    /// `wait` on something that is not a live, unreaped child.
    BadWaitTarget,
    /// The scheduler could not start the requested program.
    SpawnFailed,
}

impl SyscallError {
    /// Whether this error terminates the calling process.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::InvalidMemoryAccess | Self::UnrecognizedRequest(_)
        )
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMemoryAccess => write!(f, "invalid user memory access"),
            Self::UnrecognizedRequest(n) => write!(f, "unrecognized request {}", n),
            Self::InvalidDescriptor => write!(f, "bad file descriptor"),
            Self::ResourceExhausted => write!(f, "descriptor table full"),
            Self::BadWaitTarget => write!(f, "not a waitable child"),
            Self::SpawnFailed => write!(f, "process creation failed"),
        }
    }
}
