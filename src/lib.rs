//! # anonmap
//!
//! A single anonymous memory region taken straight from the operating
//! system's virtual memory manager, as an alternative to going through the
//! heap allocator.
//!
//! - [`RegionAllocator::acquire`] maps a private, read-write, zero-filled
//!   region of at least the requested size.
//! - [`RegionAllocator::release`] unmaps it again. The length passed in must
//!   be the length the region was acquired with, and a region can only be
//!   released once.
//! - [`Region`] is the opaque handle in between. It carries the base address
//!   and lengths, and only hands out the memory while the region is mapped.
//!
//! ```rust,no_run
//! use anonmap::RegionAllocator;
//!
//! # fn main() -> Result<(), anonmap::RegionError> {
//! let allocator = RegionAllocator::new();
//! let mut region = allocator.acquire(5 * size_of::<i32>())?;
//! println!("Memory allocation starts at {:p}", region.base());
//!
//! region.write_i32(0, 42)?;
//! assert_eq!(region.read_i32(0)?, 42);
//!
//! let len = region.len();
//! allocator.release(&mut region, len)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod region;
mod types;

#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) mod unix;
#[cfg(any(target_os = "linux", target_os = "macos"))]
use unix as platform;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
compile_error!("anonmap only supports Linux and macOS");

use log::debug;
use once_cell::sync::Lazy;

pub use error::RegionError;
pub use region::Region;
pub use types::{Protection, RegionState};

static PAGE_SIZE: Lazy<usize> = Lazy::new(page_size::get);

/// Returns the system's page size.
pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// Rounds `size` up to a whole number of pages, or `None` on overflow.
pub fn round_to_page_size(size: usize) -> Option<usize> {
    let page = page_size();
    match size % page {
        0 => Some(size),
        remainder => size.checked_add(page - remainder),
    }
}

/// Acquires and releases anonymous regions.
///
/// The allocator keeps no record of what it handed out; each [`Region`]
/// tracks its own lifecycle (`Mapped` -> `Released`).
#[derive(Debug, Clone, Copy)]
pub struct RegionAllocator {
    page_size: usize,
}

impl Default for RegionAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionAllocator {
    pub fn new() -> Self {
        Self {
            page_size: page_size(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Maps an anonymous, process-private, read-write region of at least
    /// `size_in_bytes` bytes. The OS picks the address.
    ///
    /// Zero-sized requests are rejected with [`RegionError::AllocationError`]
    /// without calling into the OS.
    pub fn acquire(&self, size_in_bytes: usize) -> Result<Region, RegionError> {
        if size_in_bytes == 0 {
            return Err(RegionError::AllocationError(
                "<anonmap> cannot map a zero-length region".to_string(),
            ));
        }

        let mapped_len = round_to_page_size(size_in_bytes).ok_or_else(|| {
            RegionError::AllocationError(format!(
                "<anonmap> {} bytes cannot be rounded to a page multiple",
                size_in_bytes
            ))
        })?;

        let base = platform::map_anonymous(mapped_len)?;
        debug!(
            "<anonmap> mapped {:p} ({} bytes requested, {} mapped)",
            base.as_ptr(),
            size_in_bytes,
            mapped_len
        );

        Ok(Region::from_mapping(base, size_in_bytes, mapped_len))
    }

    /// Unmaps `region`.
    ///
    /// `length_to_release` must equal [`Region::len`]. A different length, or
    /// a region that was already released, fails with
    /// [`RegionError::ReleaseError`] and leaves the region untouched.
    pub fn release(
        &self,
        region: &mut Region,
        length_to_release: usize,
    ) -> Result<(), RegionError> {
        region.release_with_len(length_to_release)
    }
}
