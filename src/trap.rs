//! Trap Entry Points
//!
//! Called by the architecture's trap stubs for traps taken from user mode.
//!
//! # Trap Types
//! - System call (`int 0x30`): decoded and served by [`crate::syscall`]
//! - Page fault: the user touched memory it doesn't own
//! - Anything else from user mode: unhandled
//!
//! # Security Considerations
//! - A fault in user code ends that process with status -1, never the kernel
//! - The exit path always runs to completion before the thread is torn down

use log::{error, warn};

use crate::config::EXIT_FAILURE;
use crate::mm::{UserMemory, VirtAddr};
use crate::process::{Process, System};
use crate::syscall::{dispatch, Disposition, TrapFrame};

/// Interrupt vector used for system calls.
pub const SYSCALL_VECTOR: u8 = 0x30;

/// Page fault vector.
pub const PAGE_FAULT_VECTOR: u8 = 0x0E;

/// Trap classes taken from user mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Syscall,
    PageFault,
    Other(u8),
}

impl From<u8> for TrapKind {
    fn from(vector: u8) -> Self {
        match vector {
            SYSCALL_VECTOR => TrapKind::Syscall,
            PAGE_FAULT_VECTOR => TrapKind::PageFault,
            other => TrapKind::Other(other),
        }
    }
}

/// Handle a trap from user mode.
///
/// Returns only when the process should resume. `fault_addr` is the
/// faulting address for page faults and ignored otherwise.
pub fn handle_user_trap(
    vector: u8,
    fault_addr: VirtAddr,
    tf: &mut TrapFrame,
    proc: &mut Process,
    mem: &mut dyn UserMemory,
    sys: &System<'_>,
) {
    match TrapKind::from(vector) {
        TrapKind::Syscall => match dispatch(tf, proc, mem, sys) {
            Disposition::Resume => {}
            Disposition::Terminated(_) => sys.scheduler.terminate_current(),
            Disposition::PowerOff => sys.scheduler.power_off(),
        },
        TrapKind::PageFault => {
            warn!("[TRAP] {} faulted at {}", proc.pid(), fault_addr);
            terminate(proc, sys)
        }
        TrapKind::Other(vector) => {
            error!("[TRAP] unhandled vector {:#04x} from {}", vector, proc.pid());
            terminate(proc, sys)
        }
    }
}

/// Kill the current process with [`EXIT_FAILURE`].
pub fn terminate(proc: &mut Process, sys: &System<'_>) -> ! {
    proc.exit(EXIT_FAILURE, sys);
    sys.scheduler.terminate_current()
}
