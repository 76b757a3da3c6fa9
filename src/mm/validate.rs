//! User Address Validation
//!
//! The only road from a user-supplied address to user bytes.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Check every page a range touches, not just its first byte
//! - Strings are validated page by page as the terminator is searched for,
//!   so a scan never runs off a mapped page into an unmapped one
//! - Copy to kernel space (TOCTOU)

use alloc::vec;
use alloc::vec::Vec;

use bitflags::bitflags;
use log::trace;

use super::address::{VirtAddr, PAGE_SIZE, USER_TOP};
use crate::error::SyscallError;

bitflags! {
    /// Page attributes as reported by the current page table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Page is mapped to a physical frame.
        const PRESENT = 1 << 0;
        /// User writes are allowed.
        const WRITABLE = 1 << 1;
        /// Page is accessible from user mode.
        const USER = 1 << 2;
    }
}

impl PageFlags {
    /// What a user page must carry to be read on the user's behalf.
    pub const USER_READ: Self = Self::PRESENT.union(Self::USER);
    /// What a user page must carry to be written on the user's behalf.
    pub const USER_WRITE: Self = Self::USER_READ.union(Self::WRITABLE);
}

/// The current process's address space, as seen by the kernel.
///
/// Implemented by the virtual memory subsystem. Copies take a validated
/// region, so an implementation may assume every page it touches is
/// present and user-accessible.
pub trait UserMemory {
    /// Flags of the page containing `page`. Empty when unmapped.
    fn page_flags(&self, page: VirtAddr) -> PageFlags;

    /// Copy `region` into `dst`. `dst.len()` equals `region.len()`.
    fn copy_in(&self, region: &UserRegion, dst: &mut [u8]);

    /// Copy `src` into `region`. `src.len()` equals `region.len()`.
    fn copy_out(&mut self, region: &UserRegionMut, src: &[u8]);
}

/// A validated, readable user-space range.
///
/// This type guarantees that:
/// - The range is non-null and lies below [`USER_TOP`]
/// - The length doesn't overflow
/// - Every page it touches was present and user-accessible when checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRegion {
    addr: VirtAddr,
    len: usize,
}

impl UserRegion {
    #[inline]
    pub const fn addr(&self) -> VirtAddr {
        self.addr
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A sub-range of this region. `None` if it would leave the region.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(Self {
            addr: self.addr.checked_add(offset)?,
            len,
        })
    }
}

/// A validated, writable user-space range.
///
/// Same guarantees as [`UserRegion`], plus every page is writable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRegionMut {
    addr: VirtAddr,
    len: usize,
}

impl UserRegionMut {
    #[inline]
    pub const fn addr(&self) -> VirtAddr {
        self.addr
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A sub-range of this region. `None` if it would leave the region.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(Self {
            addr: self.addr.checked_add(offset)?,
            len,
        })
    }
}

/// Check `[addr, addr + len)` against the current address space.
///
/// Returns true iff the address is non-null, the whole range lies below
/// the user/kernel split, and every page it touches has `required`.
fn check_range(mem: &dyn UserMemory, addr: VirtAddr, len: usize, required: PageFlags) -> bool {
    if addr.is_null() || !addr.is_user() {
        return false;
    }

    let end = match addr.checked_add(len) {
        Some(end) => end,
        None => return false,
    };
    if end.as_usize() > USER_TOP {
        return false;
    }
    if len == 0 {
        return true;
    }

    // Walk every page from the first byte to the last one.
    let last = VirtAddr::new(end.as_usize() - 1).align_down();
    let mut page = addr.align_down();
    loop {
        if !mem.page_flags(page).contains(required) {
            trace!("[VALIDATE] page {} lacks {:?}", page, required);
            return false;
        }
        if page == last {
            return true;
        }
        page = VirtAddr::new(page.as_usize() + PAGE_SIZE);
    }
}

/// Probe whether `len` bytes at `addr` may be read on the user's behalf.
///
/// Read-only: nothing is dereferenced. The caller decides what a failure
/// means for the process.
pub fn validate(mem: &dyn UserMemory, addr: VirtAddr, len: usize) -> bool {
    check_range(mem, addr, len, PageFlags::USER_READ)
}

/// Validate a user-space read buffer
///
/// # Returns
/// * `Ok(UserRegion)` - Validated range
/// * `Err(SyscallError::InvalidMemoryAccess)` - Validation failed
pub fn validate_user_read(
    mem: &dyn UserMemory,
    addr: VirtAddr,
    len: usize,
) -> Result<UserRegion, SyscallError> {
    if check_range(mem, addr, len, PageFlags::USER_READ) {
        Ok(UserRegion { addr, len })
    } else {
        Err(SyscallError::InvalidMemoryAccess)
    }
}

/// Validate a user-space write buffer
///
/// Same as read validation, but every page must also be writable.
pub fn validate_user_write(
    mem: &dyn UserMemory,
    addr: VirtAddr,
    len: usize,
) -> Result<UserRegionMut, SyscallError> {
    if check_range(mem, addr, len, PageFlags::USER_WRITE) {
        Ok(UserRegionMut { addr, len })
    } else {
        Err(SyscallError::InvalidMemoryAccess)
    }
}

/// Copy a NUL-terminated user string into the kernel.
///
/// Validates one page fragment at a time before reading it, so the scan
/// for the terminator never touches a page it has not checked. The
/// returned bytes exclude the terminator.
///
/// Fails with `InvalidMemoryAccess` on a bad page or when no terminator
/// appears within `max_len` bytes.
pub fn copy_user_string(
    mem: &dyn UserMemory,
    addr: VirtAddr,
    max_len: usize,
) -> Result<Vec<u8>, SyscallError> {
    let mut out = Vec::new();
    let mut cursor = addr;

    loop {
        let budget = max_len + 1 - out.len();
        let chunk = cursor.bytes_to_page_end().min(budget);
        let region = validate_user_read(mem, cursor, chunk)?;

        let mut bytes = vec![0u8; chunk];
        mem.copy_in(&region, &mut bytes);

        if let Some(nul) = bytes.iter().position(|&b| b == 0) {
            out.extend_from_slice(&bytes[..nul]);
            return Ok(out);
        }

        out.extend_from_slice(&bytes);
        if out.len() > max_len {
            trace!("[VALIDATE] string at {} exceeds {} bytes", addr, max_len);
            return Err(SyscallError::InvalidMemoryAccess);
        }

        cursor = cursor
            .checked_add(chunk)
            .ok_or(SyscallError::InvalidMemoryAccess)?;
    }
}
