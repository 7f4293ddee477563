use crate::error::RegionError;
use crate::types::Protection;
use std::io;
use std::ptr::{self, NonNull};

/// Maps `len` bytes of anonymous, process-private, read-write memory.
/// The kernel picks the address; `len` must already be page-rounded.
pub(crate) fn map_anonymous(len: usize) -> Result<NonNull<u8>, RegionError> {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            Protection::ReadWrite.as_prot_flags(),
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(RegionError::AllocationError(format!(
            "<anonmap> could not map {} bytes [Err: {}]",
            len,
            io::Error::last_os_error()
        )));
    }

    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| {
        RegionError::AllocationError("<anonmap> kernel returned a null mapping".to_string())
    })
}

/// Removes the mapping at `base`.
///
/// # Safety
///
/// `base` and `len` must describe exactly one mapping created by
/// `map_anonymous` that has not been unmapped yet. munmap does not
/// complain about unmapped or foreign ranges, so the caller is the
/// only line of defence.
pub(crate) unsafe fn unmap(base: NonNull<u8>, len: usize) -> Result<(), RegionError> {
    let result = libc::munmap(base.as_ptr().cast::<libc::c_void>(), len);

    if result != 0 {
        return Err(RegionError::ReleaseError(format!(
            "<anonmap> could not unmap {:p} ({} bytes) [Err: {}]",
            base.as_ptr(),
            len,
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

/// Applies `protection` to the mapping at `base`.
///
/// # Safety
///
/// Same contract as [`unmap`]: the range must be a live mapping owned by
/// the caller.
pub(crate) unsafe fn protect(
    base: NonNull<u8>,
    len: usize,
    protection: Protection,
) -> Result<(), RegionError> {
    let result = libc::mprotect(
        base.as_ptr().cast::<libc::c_void>(),
        len,
        protection.as_prot_flags(),
    );

    if result != 0 {
        return Err(RegionError::ProtectionError(format!(
            "<anonmap> could not set {} on {:p} [Err: {}]",
            protection,
            base.as_ptr(),
            io::Error::last_os_error()
        )));
    }

    Ok(())
}
