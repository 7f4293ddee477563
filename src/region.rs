use crate::error::RegionError;
use crate::platform;
use crate::types::{Protection, RegionState};
use log::{debug, error};
use std::ptr::NonNull;

type Result<T> = std::result::Result<T, RegionError>;

/// One anonymous mapping obtained from [`RegionAllocator::acquire`].
///
/// The handle owns the mapping. Its memory is only reachable through the
/// methods below, all of which refuse to touch it once the region has been
/// released. A region that is still mapped when dropped is released then.
///
/// [`RegionAllocator::acquire`]: crate::RegionAllocator::acquire
#[derive(Debug)]
pub struct Region {
    base: NonNull<u8>,
    len: usize,
    mapped_len: usize,
    protection: Protection,
    state: RegionState,
}

// The mapping is exclusively owned by the handle, so moving it to another
// thread moves the only way to reach the memory.
unsafe impl Send for Region {}

impl Region {
    pub(crate) fn from_mapping(base: NonNull<u8>, len: usize, mapped_len: usize) -> Self {
        Self {
            base,
            len,
            mapped_len,
            protection: Protection::ReadWrite,
            state: RegionState::Mapped,
        }
    }

    /// Base address chosen by the OS. Only meant for reporting; the
    /// memory itself is reached through [`Region::with_data`] and friends.
    pub fn base(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Number of bytes requested at acquisition time.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: zero-length requests are refused by `acquire`.
    /// Present to pair with `len` under `clippy::len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes the OS actually mapped, rounded up to whole pages.
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }

    pub fn state(&self) -> RegionState {
        self.state
    }

    pub fn is_mapped(&self) -> bool {
        self.state == RegionState::Mapped
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Runs `action` over the first [`len`](Region::len) bytes of the region.
    ///
    /// Fails with [`RegionError::RegionReleased`] after release and with
    /// [`RegionError::ProtectionError`] while the region is `NoAccess`.
    pub fn with_data<F, T>(&self, action: F) -> Result<T>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        self.ensure_mapped()?;
        if !self.protection.is_readable() {
            return Err(RegionError::ProtectionError(format!(
                "<anonmap> region at {:p} is {}",
                self.base(),
                self.protection
            )));
        }

        // Mapped and readable: the first `len` bytes are valid for reads
        // for as long as `self` is borrowed.
        let data = unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.len) };
        action(data)
    }

    /// Mutable counterpart of [`Region::with_data`]; additionally requires
    /// the region to be `ReadWrite`.
    pub fn with_data_mut<F, T>(&mut self, action: F) -> Result<T>
    where
        F: FnOnce(&mut [u8]) -> Result<T>,
    {
        self.ensure_mapped()?;
        if !self.protection.is_writable() {
            return Err(RegionError::ProtectionError(format!(
                "<anonmap> region at {:p} is {}",
                self.base(),
                self.protection
            )));
        }

        let data = unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), self.len) };
        action(data)
    }

    /// Reads a native-endian `i32` starting at byte `offset`.
    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        let end = self.checked_end(offset, size_of::<i32>())?;
        self.with_data(|data| {
            let mut bytes = [0_u8; size_of::<i32>()];
            bytes.copy_from_slice(&data[offset..end]);
            Ok(i32::from_ne_bytes(bytes))
        })
    }

    /// Writes `value` as a native-endian `i32` starting at byte `offset`.
    pub fn write_i32(&mut self, offset: usize, value: i32) -> Result<()> {
        let end = self.checked_end(offset, size_of::<i32>())?;
        self.with_data_mut(|data| {
            data[offset..end].copy_from_slice(&value.to_ne_bytes());
            Ok(())
        })
    }

    /// Changes the protection of the whole mapping.
    pub fn protect(&mut self, protection: Protection) -> Result<()> {
        self.ensure_mapped()?;
        unsafe { platform::protect(self.base, self.mapped_len, protection)? };
        debug!(
            "<anonmap> {:p} protection {} -> {}",
            self.base(),
            self.protection,
            protection
        );
        self.protection = protection;
        Ok(())
    }

    /// Releases the region with the length it was acquired with.
    pub fn free(mut self) -> Result<()> {
        let len = self.len;
        self.release_with_len(len)
    }

    pub(crate) fn release_with_len(&mut self, length_to_release: usize) -> Result<()> {
        if self.state == RegionState::Released {
            return Err(RegionError::ReleaseError(format!(
                "<anonmap> region at {:p} was already released",
                self.base()
            )));
        }
        if length_to_release != self.len {
            return Err(RegionError::ReleaseError(format!(
                "<anonmap> release length {} does not match acquired length {} for {:p}",
                length_to_release,
                self.len,
                self.base()
            )));
        }

        // The whole page-rounded mapping goes back; the tail beyond `len`
        // was never reachable through the handle.
        unsafe { platform::unmap(self.base, self.mapped_len)? };
        self.state = RegionState::Released;
        debug!(
            "<anonmap> released {:p} ({} bytes, {} mapped)",
            self.base(),
            self.len,
            self.mapped_len
        );
        Ok(())
    }

    fn ensure_mapped(&self) -> Result<()> {
        match self.state {
            RegionState::Mapped => Ok(()),
            RegionState::Released => Err(RegionError::RegionReleased),
        }
    }

    fn checked_end(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(end),
            _ => Err(RegionError::OutOfBounds {
                offset,
                len,
                size: self.len,
            }),
        }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        if self.state == RegionState::Mapped {
            let len = self.len;
            if let Err(e) = self.release_with_len(len) {
                error!("<anonmap> failed to release region on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionAllocator;

    fn acquire(size: usize) -> Region {
        RegionAllocator::new()
            .acquire(size)
            .expect("Failed to acquire region")
    }

    #[test]
    fn test_new_region_is_mapped_read_write() {
        let region = acquire(20);
        assert!(region.is_mapped());
        assert!(!region.is_empty());
        assert_eq!(region.state(), RegionState::Mapped);
        assert_eq!(region.protection(), Protection::ReadWrite);
        assert_eq!(region.len(), 20);
        assert!(region.mapped_len() >= region.len());
        assert_eq!(region.mapped_len() % crate::page_size(), 0);
        assert_eq!(region.base() as usize % crate::page_size(), 0);
    }

    #[test]
    fn test_data_is_limited_to_requested_length() {
        let mut region = acquire(20);
        region
            .with_data_mut(|data| {
                assert_eq!(data.len(), 20);
                data.fill(0xAB);
                Ok(())
            })
            .expect("write should succeed");
        let sum: usize = region
            .with_data(|data| Ok(data.iter().map(|&b| b as usize).sum()))
            .expect("read should succeed");
        assert_eq!(sum, 20 * 0xAB);
    }

    #[test]
    fn test_i32_bounds() {
        let mut region = acquire(8);
        region.write_i32(4, -7).expect("last slot should be writable");
        assert_eq!(region.read_i32(4).expect("read"), -7);

        match region.write_i32(5, 1) {
            Err(RegionError::OutOfBounds { offset, len, size }) => {
                assert_eq!((offset, len, size), (5, 4, 8));
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
        assert!(matches!(
            region.read_i32(usize::MAX),
            Err(RegionError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_read_only_blocks_writes() {
        let mut region = acquire(16);
        region.write_i32(0, 9).expect("write");
        region.protect(Protection::ReadOnly).expect("protect read-only");

        assert!(matches!(
            region.write_i32(0, 10),
            Err(RegionError::ProtectionError(_))
        ));
        assert_eq!(region.read_i32(0).expect("read-only still readable"), 9);

        region.protect(Protection::NoAccess).expect("protect no-access");
        assert!(matches!(
            region.read_i32(0),
            Err(RegionError::ProtectionError(_))
        ));

        region.protect(Protection::ReadWrite).expect("protect read-write");
        region.write_i32(0, 10).expect("writable again");
        assert_eq!(region.read_i32(0).expect("read"), 10);
    }

    #[test]
    fn test_mismatched_length_keeps_region_usable() {
        let mut region = acquire(20);
        let err = region
            .release_with_len(40)
            .expect_err("longer release must be refused");
        assert!(matches!(err, RegionError::ReleaseError(_)));
        assert!(err.to_string().contains("does not match"));

        assert!(region.is_mapped());
        region.write_i32(0, 1).expect("still writable");
        region.release_with_len(20).expect("exact release");
    }

    #[test]
    fn test_released_region_refuses_access() {
        let mut region = acquire(20);
        region.release_with_len(20).expect("release");

        assert_eq!(region.state(), RegionState::Released);
        assert!(matches!(region.read_i32(0), Err(RegionError::RegionReleased)));
        assert!(matches!(
            region.write_i32(0, 1),
            Err(RegionError::RegionReleased)
        ));
        assert!(matches!(
            region.protect(Protection::ReadOnly),
            Err(RegionError::RegionReleased)
        ));
    }

    #[test]
    fn test_free_consumes_region() {
        let region = acquire(4096);
        region.free().expect("free should release the region");
    }
}
