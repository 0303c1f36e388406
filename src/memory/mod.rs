//! Protection-aware memory access.
//!
//! Everything needed to touch memory whose protection state is unknown without corrupting
//! that state: region snapshots, the computed protection vocabulary, the collaborator
//! traits that reach the OS, and the guard that ties them together.
//!
//! # Architecture
//!
//! The guard sits on top of two narrow collaborator capabilities and owns all the policy
//! between them:
//!
//! - [`RegionQuery`] - resolve an address to a [`MemoryRegion`] snapshot
//! - [`ProtectionMutator`] - change a region's protection, reporting the previous mask
//! - [`ProtectGuard`] - decide whether escalation is needed, bound the retry, guarantee
//!   restoration at scope exit
//!
//! Snapshots are immutable and stale the moment any thread mutates protection elsewhere;
//! the guard keeps the only copy it needs for restoration, and callers re-query rather
//! than cache.
//!
//! # Key Components
//!
//! - [`Protection`] - permission bitmask with the computed bad/readable/writable
//!   classification
//! - [`MemoryRegion`], [`RegionState`], [`RegionKind`] - the snapshot model
//! - [`ProtectGuard`], [`GuardAccess`] - scoped escalation with guaranteed restore
//! - [`LocalMemory`] (Linux) - both collaborators implemented against the current process
//!
//! # Examples
//!
//! ```rust,no_run
//! use interpose::{GuardAccess, LocalMemory, Process, ProtectGuard};
//!
//! # fn inspect(address: usize) -> interpose::Result<()> {
//! let memory = LocalMemory;
//! let process = Process::current();
//!
//! // Read access guaranteed in here, previous protection guaranteed after.
//! let guard = ProtectGuard::new(&memory, &process, address, GuardAccess::Read)?;
//! # drop(guard);
//! # Ok(())
//! # }
//! ```

mod guard;
#[cfg(target_os = "linux")]
mod local;
mod protect;
mod region;
mod source;

pub use guard::{GuardAccess, ProtectGuard};
#[cfg(target_os = "linux")]
pub use local::LocalMemory;
pub use protect::Protection;
pub use region::{MemoryRegion, RegionKind, RegionState};
pub use source::{ProtectionMutator, RegionQuery};
