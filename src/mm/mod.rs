//! User memory access for the system call layer
//!
//! Provides:
//! - Typed user virtual addresses
//! - The address validator
//! - Validated region tokens, the only way to copy user bytes
//!
//! # Security Principles
//! - All user ranges are bounds-checked against the user/kernel split
//! - Every page a range touches is checked, not just the first
//! - No raw pointer to user memory leaves this module

pub mod address;
mod validate;

pub use address::{VirtAddr, PAGE_SIZE, USER_TOP};
pub use validate::{
    copy_user_string, validate, validate_user_read, validate_user_write, PageFlags, UserMemory,
    UserRegion, UserRegionMut,
};
