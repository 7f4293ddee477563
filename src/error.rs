use thiserror::Error;

/// Errors that can occur while acquiring, using, or releasing a region.
#[derive(Error, Debug)]
pub enum RegionError {
    /// The OS declined to create the mapping, or the request was unusable
    /// (zero bytes, or too large to round up to whole pages).
    #[error("Allocation failed: {0}")]
    AllocationError(String),

    /// The mapping could not be removed: the region was already released,
    /// the supplied length does not match the acquired one, or the OS
    /// refused the unmap.
    #[error("Release failed: {0}")]
    ReleaseError(String),

    /// The region has been released and its memory may no longer be touched.
    #[error("Region has already been released")]
    RegionReleased,

    /// Changing or honouring the page protection failed.
    #[error("Memory protection failed: {0}")]
    ProtectionError(String),

    /// An access reached past the requested length of the region.
    #[error("Access of {len} bytes at offset {offset} is outside a region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
}
