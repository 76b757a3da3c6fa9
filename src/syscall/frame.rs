//! Trap Frame and Call Frame Cursor
//!
//! The trap layer saves the user registers in a [`TrapFrame`]. The request
//! number and its arguments are not in registers: they sit on the user
//! stack, one 32-bit word each, starting at the saved stack pointer.
//! [`CallFrame`] walks that stack, validating every word before it reads it.

use log::trace;

use crate::error::SyscallError;
use crate::mm::{validate_user_read, UserMemory, VirtAddr};

/// Bytes per call frame word.
pub const WORD_SIZE: usize = 4;

/// User register state saved on trap entry.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// User stack pointer; points at the request number.
    pub esp: u32,
    /// Return value slot.
    pub eax: u32,
}

impl TrapFrame {
    pub const fn new(esp: u32) -> Self {
        Self { esp, eax: 0 }
    }

    /// Where the call frame starts.
    #[inline]
    pub const fn stack_pointer(&self) -> VirtAddr {
        VirtAddr::new(self.esp as usize)
    }
}

/// Cursor over the untrusted words of a system call.
///
/// Each read validates the word's bytes against the current address space
/// and advances by [`WORD_SIZE`]. Nothing read here is trusted until the
/// handler has validated it in turn.
pub struct CallFrame<'m> {
    mem: &'m dyn UserMemory,
    cursor: VirtAddr,
}

impl<'m> CallFrame<'m> {
    pub fn new(mem: &'m dyn UserMemory, sp: VirtAddr) -> Self {
        Self { mem, cursor: sp }
    }

    /// Address of the next word.
    #[inline]
    pub fn position(&self) -> VirtAddr {
        self.cursor
    }

    /// Read the next word.
    pub fn next_word(&mut self) -> Result<u32, SyscallError> {
        let region = validate_user_read(self.mem, self.cursor, WORD_SIZE).map_err(|e| {
            trace!("[SYSCALL] call frame word at {} is not readable", self.cursor);
            e
        })?;

        let mut bytes = [0u8; WORD_SIZE];
        self.mem.copy_in(&region, &mut bytes);
        self.cursor = self
            .cursor
            .checked_add(WORD_SIZE)
            .ok_or(SyscallError::InvalidMemoryAccess)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read the next word as a signed integer.
    pub fn next_i32(&mut self) -> Result<i32, SyscallError> {
        self.next_word().map(|word| word as i32)
    }

    /// Read the next word as a user address. The address itself is not
    /// checked; that is up to whoever dereferences it.
    pub fn next_addr(&mut self) -> Result<VirtAddr, SyscallError> {
        self.next_word().map(|word| VirtAddr::new(word as usize))
    }
}
