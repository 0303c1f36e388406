//! Non-owning process identity.
//!
//! The interception core never enumerates, opens, or otherwise manages processes itself -
//! that work belongs to external collaborators. What the core needs is a stable key those
//! collaborators consume: [`Process`] carries the target's pid and nothing else, so holding
//! one grants no access and keeps no OS resources alive.

use std::fmt;

/// Identity of a target process.
///
/// A plain value type: cloning it is free and dropping it releases nothing. All access to
/// the process happens through collaborators implementing
/// [`RegionQuery`](crate::RegionQuery) and [`ProtectionMutator`](crate::ProtectionMutator),
/// which decide for themselves whether they can reach the identified process.
///
/// # Examples
///
/// ```rust
/// use interpose::Process;
///
/// let this = Process::current();
/// assert!(this.is_current());
/// assert_eq!(this, Process::from_pid(std::process::id()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Process {
    pid: u32,
}

impl Process {
    /// Identity of the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    /// Identity of an arbitrary process by pid.
    ///
    /// No validation happens here; a pid that names no live process simply makes every
    /// collaborator call fail.
    #[must_use]
    pub fn from_pid(pid: u32) -> Self {
        Self { pid }
    }

    /// The raw pid.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether this identity names the calling process.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.pid == std::process::id()
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process {}", self.pid)
    }
}
