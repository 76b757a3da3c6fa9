//! Compile-time limits for the system call layer.

/// Slots in a descriptor table, reserved ones included.
pub const FDT_CAPACITY: usize = 128;

/// Console input. Never stored in a descriptor table.
pub const STDIN_FILENO: i32 = 0;

/// Console output. Never stored in a descriptor table.
pub const STDOUT_FILENO: i32 = 1;

/// First descriptor handed out for a real file.
pub const FIRST_FILE_FD: i32 = 2;

/// Largest slice written to the console in one call.
pub const CONSOLE_CHUNK: usize = 256;

/// Status recorded for a process killed by the kernel.
pub const EXIT_FAILURE: i32 = -1;

/// Longest user string (terminator excluded) copied into the kernel.
pub const MAX_USER_STRING: usize = 4096;
