//! Collaborator traits for region lookup and protection mutation.
//!
//! The guard never talks to the OS itself. It consumes two narrow collaborator
//! capabilities - resolving an address to a [`MemoryRegion`] snapshot, and changing a
//! region's protection - and everything else (process handles, privileges, platform
//! quirks) stays behind the implementations. [`LocalMemory`](crate::LocalMemory) provides
//! both for the current process on Linux; test code substitutes recording fakes.

use crate::{memory::MemoryRegion, memory::Protection, process::Process, Result};

/// Resolves an address to the region containing it.
pub trait RegionQuery {
    /// Snapshot the region of `process` that contains `address`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`](crate::Error::NotFound) when no mapped region contains the
    /// address; implementations may also surface their own plumbing failures (I/O,
    /// unparseable region data).
    fn query(&self, process: &Process, address: usize) -> Result<MemoryRegion>;
}

/// Changes a region's protection, reporting the mask it replaced.
pub trait ProtectionMutator {
    /// Set the protection of `region` in `process` to `protection`.
    ///
    /// Returns the previous mask so the caller can restore it later. The mutation is
    /// process-global: two callers racing on overlapping regions will trample each
    /// other's masks, and serializing them is the caller's responsibility.
    ///
    /// # Errors
    ///
    /// [`Error::AccessDenied`](crate::Error::AccessDenied) when the change is refused -
    /// insufficient rights, an unreachable process, or a disallowed combination such as
    /// requesting an executable mask on a mapping that forbids it.
    fn protect(
        &self,
        process: &Process,
        region: &MemoryRegion,
        protection: Protection,
    ) -> Result<Protection>;
}
