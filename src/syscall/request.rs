//! Request Decoding
//!
//! Turns the words of a [`CallFrame`] into a typed [`Request`]. Each request
//! reads a fixed number of argument words; pointer arguments are carried
//! as [`VirtAddr`] and validated by the handler before any use.

use super::frame::CallFrame;
use crate::error::SyscallError;
use crate::mm::VirtAddr;

/// System call numbers
pub mod numbers {
    pub const SYS_HALT: u32 = 0;
    pub const SYS_EXIT: u32 = 1;
    pub const SYS_EXEC: u32 = 2;
    pub const SYS_WAIT: u32 = 3;
    pub const SYS_CREATE: u32 = 4;
    pub const SYS_REMOVE: u32 = 5;
    pub const SYS_OPEN: u32 = 6;
    pub const SYS_FILESIZE: u32 = 7;
    pub const SYS_READ: u32 = 8;
    pub const SYS_WRITE: u32 = 9;
    pub const SYS_SEEK: u32 = 10;
    pub const SYS_TELL: u32 = 11;
    pub const SYS_CLOSE: u32 = 12;
}

/// A decoded system call. Addresses are still untrusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Halt,
    Exit { status: i32 },
    Exec { cmdline: VirtAddr },
    Wait { pid: i32 },
    Create { name: VirtAddr, initial_size: u32 },
    Remove { name: VirtAddr },
    Open { name: VirtAddr },
    Filesize { fd: i32 },
    Read { fd: i32, buf: VirtAddr, len: u32 },
    Write { fd: i32, buf: VirtAddr, len: u32 },
    Seek { fd: i32, pos: u32 },
    Tell { fd: i32 },
    Close { fd: i32 },
}

impl Request {
    /// Read the request number and its arguments from `frame`.
    ///
    /// An unknown number fails before any argument is read.
    pub fn decode(frame: &mut CallFrame<'_>) -> Result<Self, SyscallError> {
        use numbers::*;

        let request = match frame.next_word()? {
            SYS_HALT => Self::Halt,
            SYS_EXIT => Self::Exit {
                status: frame.next_i32()?,
            },
            SYS_EXEC => Self::Exec {
                cmdline: frame.next_addr()?,
            },
            SYS_WAIT => Self::Wait {
                pid: frame.next_i32()?,
            },
            SYS_CREATE => Self::Create {
                name: frame.next_addr()?,
                initial_size: frame.next_word()?,
            },
            SYS_REMOVE => Self::Remove {
                name: frame.next_addr()?,
            },
            SYS_OPEN => Self::Open {
                name: frame.next_addr()?,
            },
            SYS_FILESIZE => Self::Filesize {
                fd: frame.next_i32()?,
            },
            SYS_READ => Self::Read {
                fd: frame.next_i32()?,
                buf: frame.next_addr()?,
                len: frame.next_word()?,
            },
            SYS_WRITE => Self::Write {
                fd: frame.next_i32()?,
                buf: frame.next_addr()?,
                len: frame.next_word()?,
            },
            SYS_SEEK => Self::Seek {
                fd: frame.next_i32()?,
                pos: frame.next_word()?,
            },
            SYS_TELL => Self::Tell {
                fd: frame.next_i32()?,
            },
            SYS_CLOSE => Self::Close {
                fd: frame.next_i32()?,
            },
            unknown => return Err(SyscallError::UnrecognizedRequest(unknown)),
        };
        Ok(request)
    }

    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Exit { .. } => "exit",
            Self::Exec { .. } => "exec",
            Self::Wait { .. } => "wait",
            Self::Create { .. } => "create",
            Self::Remove { .. } => "remove",
            Self::Open { .. } => "open",
            Self::Filesize { .. } => "filesize",
            Self::Read { .. } => "read",
            Self::Write { .. } => "write",
            Self::Seek { .. } => "seek",
            Self::Tell { .. } => "tell",
            Self::Close { .. } => "close",
        }
    }
}
