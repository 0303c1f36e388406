//! Protection masks and their safety classification.
//!
//! A region's protection is a plain bitmask; what the rest of the core cares about is a
//! small computed vocabulary on top of it: *bad* masks that must never be touched,
//! readable masks, and writable masks. The classification is always derived from the mask,
//! never stored separately, so a snapshot can't disagree with itself.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Enforced permission mask of a memory region.
    ///
    /// The four bits cover everything the core needs to reason about: the three access
    /// permissions plus the guard-page marker. Platform-specific encodings (the `PAGE_*`
    /// constants on Windows, `PROT_*` on POSIX) are translated into this mask by the
    /// collaborator that produced the snapshot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u8 {
        /// Region contents may be read
        const READ = 0b0001;
        /// Region contents may be written
        const WRITE = 0b0010;
        /// Region contents may be executed
        const EXECUTE = 0b0100;
        /// One-shot guard page; any touch raises an access violation
        const GUARD = 0b1000;
    }
}

impl Protection {
    /// The most permissive usable mask, requested first when escalating.
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);

    /// The reduced escalation mask, retried once when the permissive request is refused
    /// (e.g. a mapping where executable protection is disallowed).
    pub const RW: Self = Self::READ.union(Self::WRITE);

    /// Whether this mask must never be read, written, or protection-mutated.
    ///
    /// Bad masks are guard pages, no-access masks, and masks carrying bits this
    /// vocabulary does not define. Touching a guard page would consume its one-shot
    /// semantics out from under the owning code; the others cannot be accessed sanely
    /// at all.
    #[must_use]
    pub fn is_bad(&self) -> bool {
        self.contains(Self::GUARD)
            || self.is_empty()
            || self.bits() & !Self::all().bits() != 0
    }

    /// Whether a read access succeeds under this mask.
    #[must_use]
    pub fn can_read(&self) -> bool {
        !self.is_bad() && self.contains(Self::READ)
    }

    /// Whether a write access succeeds under this mask.
    #[must_use]
    pub fn can_write(&self) -> bool {
        !self.is_bad() && self.contains(Self::WRITE)
    }

    /// Whether instruction fetch succeeds under this mask.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        !self.is_bad() && self.contains(Self::EXECUTE)
    }
}

impl fmt::Display for Protection {
    /// Renders in `/proc/<pid>/maps` style (`rw-`, `r-x`, ...), with a trailing `g`
    /// for guard pages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.contains(Self::READ) { 'r' } else { '-' },
            if self.contains(Self::WRITE) { 'w' } else { '-' },
            if self.contains(Self::EXECUTE) { 'x' } else { '-' },
            if self.contains(Self::GUARD) { "g" } else { "" },
        )
    }
}
