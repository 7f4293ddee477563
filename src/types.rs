use std::fmt;

/// Page protection applied to a whole region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protection {
    /// Memory cannot be read or written.
    NoAccess,

    /// Memory can be read but not written.
    ReadOnly,

    /// Memory can be read and written. Freshly acquired regions start here.
    #[default]
    ReadWrite,
}

impl Protection {
    pub fn is_readable(self) -> bool {
        !matches!(self, Protection::NoAccess)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Protection::ReadWrite)
    }

    pub(crate) fn as_prot_flags(self) -> libc::c_int {
        match self {
            Protection::NoAccess => libc::PROT_NONE,
            Protection::ReadOnly => libc::PROT_READ,
            Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
        }
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protection::NoAccess => "no-access",
            Protection::ReadOnly => "read-only",
            Protection::ReadWrite => "read-write",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a region. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionState {
    Mapped,
    Released,
}

impl fmt::Display for RegionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionState::Mapped => f.write_str("mapped"),
            RegionState::Released => f.write_str("released"),
        }
    }
}
