//! File Descriptor Table
//!
//! Maps small integers handed to user code onto open files.
//! One table per process; nothing outside that process touches it.
//!
//! # Design
//! - Fixed-size array of file slots
//! - Slots 0 and 1 belong to the console and are never stored here
//! - Allocation takes the lowest free slot from [`FIRST_FILE_FD`] upward
//! - Dropping the table closes every file still in it

use alloc::boxed::Box;
use core::fmt;

use log::{debug, trace};

use crate::config::{FDT_CAPACITY, FIRST_FILE_FD};
use crate::fs::File;

/// A descriptor that names an allocatable slot.
///
/// This is a newtype to prevent using arbitrary integers as slot indices.
/// Only values in `FIRST_FILE_FD..FDT_CAPACITY` can be constructed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct Fd(u32);

impl Fd {
    /// Check a raw user value.
    ///
    /// Returns None for reserved, negative, or out-of-range values.
    #[inline]
    pub const fn new(raw: i32) -> Option<Self> {
        if raw >= FIRST_FILE_FD && (raw as usize) < FDT_CAPACITY {
            Some(Self(raw as u32))
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The value returned to user code.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd{}", self.0)
    }
}

/// Per-process descriptor table.
pub struct DescriptorTable {
    slots: [Option<Box<dyn File>>; FDT_CAPACITY],
}

impl DescriptorTable {
    /// Create a table with every slot empty.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Store `file` in the lowest free slot.
    ///
    /// When the table is full the file is handed back untouched; closing
    /// it is then up to the caller.
    pub fn allocate(&mut self, file: Box<dyn File>) -> Result<Fd, Box<dyn File>> {
        let first = FIRST_FILE_FD as usize;
        match self.slots[first..].iter().position(Option::is_none) {
            Some(offset) => {
                let index = first + offset;
                self.slots[index] = Some(file);
                trace!("[FDT] allocated fd{}", index);
                Ok(Fd(index as u32))
            }
            None => {
                debug!("[FDT] table full");
                Err(file)
            }
        }
    }

    /// Look up an open file by raw descriptor.
    ///
    /// Out-of-range and reserved values report not present.
    pub fn lookup(&self, raw: i32) -> Option<&(dyn File + 'static)> {
        let fd = Fd::new(raw)?;
        self.slots[fd.index()].as_deref()
    }

    /// Mutable variant of [`lookup`](Self::lookup).
    pub fn lookup_mut(&mut self, raw: i32) -> Option<&mut (dyn File + 'static)> {
        let fd = Fd::new(raw)?;
        self.slots[fd.index()].as_deref_mut()
    }

    /// Clear a slot and return what it held.
    ///
    /// Closing the returned file is the caller's job. Empty, reserved and
    /// out-of-range slots return None.
    pub fn release(&mut self, raw: i32) -> Option<Box<dyn File>> {
        let fd = Fd::new(raw)?;
        let file = self.slots[fd.index()].take();
        if file.is_some() {
            trace!("[FDT] released {}", fd);
        }
        file
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every open file and free the table.
    pub fn destroy(self) {
        debug!("[FDT] destroying table with {} open files", self.len());
        drop(self);
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DescriptorTable {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(file) = slot.take() {
                file.close();
            }
        }
    }
}

impl fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_some())
                    .map(|(index, _)| index),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{STDIN_FILENO, STDOUT_FILENO};
    use crate::testutil::SimFs;

    /// A file whose length tells it apart from every other.
    fn file_of_len(fs: &SimFs, len: usize) -> Box<dyn File> {
        let name = format!("len{}", len);
        fs.add_file(&name, &vec![0; len]);
        fs.open_file(&name)
    }

    #[test]
    fn test_fd_range() {
        assert!(Fd::new(-1).is_none());
        assert!(Fd::new(STDIN_FILENO).is_none());
        assert!(Fd::new(STDOUT_FILENO).is_none());
        assert_eq!(Fd::new(2).map(Fd::index), Some(2));
        assert_eq!(Fd::new(127).map(Fd::as_i32), Some(127));
        assert!(Fd::new(128).is_none());
        assert!(Fd::new(i32::MAX).is_none());
    }

    #[test]
    fn test_allocate_and_reuse() {
        let fs = SimFs::new();
        let mut table = DescriptorTable::new();

        let fds: Vec<i32> = (0..3)
            .map(|_| table.allocate(fs.handle()).ok().unwrap().as_i32())
            .collect();
        assert_eq!(fds, vec![2, 3, 4]);

        let released = table.release(3).unwrap();
        released.close();
        assert_eq!(table.allocate(fs.handle()).ok().unwrap().as_i32(), 3);
    }

    #[test]
    fn test_lookup_until_release() {
        let fs = SimFs::new();
        let mut table = DescriptorTable::new();

        let fds: Vec<i32> = [10, 20, 30]
            .into_iter()
            .map(|len| table.allocate(file_of_len(&fs, len)).ok().unwrap().as_i32())
            .collect();
        assert_eq!(fds, vec![2, 3, 4]);

        // Each descriptor names its own file
        assert_eq!(table.lookup(2).map(|f| f.length()), Some(10));
        assert_eq!(table.lookup(3).map(|f| f.length()), Some(20));
        assert_eq!(table.lookup_mut(4).map(|f| f.length()), Some(30));

        let file = table.release(3).unwrap();
        assert_eq!(file.length(), 20);
        assert!(table.lookup(3).is_none());
        assert!(table.release(3).is_none());
        file.close();

        // Neighbours are untouched
        assert_eq!(table.lookup(2).map(|f| f.length()), Some(10));
        assert_eq!(table.lookup(4).map(|f| f.length()), Some(30));

        // The freed slot gets the next file
        let fd = table.allocate(file_of_len(&fs, 40)).ok().unwrap();
        assert_eq!(fd.as_i32(), 3);
        assert_eq!(table.lookup(3).map(|f| f.length()), Some(40));
    }

    #[test]
    fn test_reserved_slots_never_present() {
        let fs = SimFs::new();
        let mut table = DescriptorTable::new();
        table.allocate(fs.handle()).ok().unwrap();

        for fd in [STDIN_FILENO, STDOUT_FILENO] {
            assert!(table.lookup(fd).is_none());
            assert!(table.release(fd).is_none());
        }
    }

    #[test]
    fn test_adversarial_values() {
        let mut table = DescriptorTable::new();
        for fd in [i32::MIN, -1, 128, 4096, i32::MAX] {
            assert!(table.lookup(fd).is_none());
            assert!(table.lookup_mut(fd).is_none());
            assert!(table.release(fd).is_none());
        }
    }

    #[test]
    fn test_full_table() {
        let fs = SimFs::new();
        let mut table = DescriptorTable::new();

        for expected in 2..128 {
            let fd = table.allocate(file_of_len(&fs, expected as usize)).ok().unwrap();
            assert_eq!(fd.as_i32(), expected);
        }
        assert_eq!(table.len(), 126);

        // The rejected file comes back, and no slot changed hands
        let rejected = table.allocate(file_of_len(&fs, 999));
        let file = rejected.err().unwrap();
        assert_eq!(file.length(), 999);
        file.close();

        assert_eq!(table.len(), 126);
        for fd in 2..128 {
            assert_eq!(table.lookup(fd).map(|f| f.length()), Some(fd as u32));
        }
        assert_eq!(fs.closed(), 1);
    }

    #[test]
    fn test_destroy_closes_each_file_once() {
        let fs = SimFs::new();
        let mut table = DescriptorTable::new();
        for _ in 0..5 {
            table.allocate(fs.handle()).ok().unwrap();
        }
        let released = table.release(4).unwrap();
        released.close();

        table.destroy();
        assert_eq!(fs.opened(), 5);
        assert_eq!(fs.closed(), 5);
    }
}
