//! File system and console interfaces
//!
//! These are implemented by the kernel's file system and console drivers.
//! The system call layer only forwards validated, kernel-side copies of
//! user data to them.

use alloc::boxed::Box;

/// An open file.
///
/// Offsets and sizes are 32-bit, matching the user ABI word.
pub trait File: Send {
    /// Read up to `buf.len()` bytes at the current position.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes at the current position.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position. Seeking past the end is allowed.
    fn seek(&mut self, pos: u32);

    fn tell(&self) -> u32;

    /// File size in bytes.
    fn length(&self) -> u32;

    /// Release the file. Consumes the handle so it can't be closed twice.
    fn close(self: Box<Self>);
}

/// The file system.
pub trait FileSystem: Sync {
    fn open(&self, name: &str) -> Option<Box<dyn File>>;

    /// Create a file of `initial_size` bytes. False if it exists or on failure.
    fn create(&self, name: &str, initial_size: u32) -> bool;

    fn remove(&self, name: &str) -> bool;
}

/// The system console, behind the reserved descriptors 0 and 1.
pub trait Console: Sync {
    fn put_bytes(&self, bytes: &[u8]);

    /// Block until a key is available.
    fn get_byte(&self) -> u8;
}
