//! # interpose Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the interpose library. Import this module to get quick access to the essential
//! types for guarded memory access and call interception.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all interpose operations
pub use crate::Error;

/// The result type used throughout interpose
pub use crate::Result;

/// Non-owning process identity consumed by every collaborator
pub use crate::Process;

// ================================================================================================
// Guarded Memory Access
// ================================================================================================

/// Scoped protection escalation with guaranteed restoration
pub use crate::memory::{GuardAccess, ProtectGuard};

/// Region snapshots and the protection mask vocabulary
pub use crate::memory::{MemoryRegion, Protection, RegionKind, RegionState};

/// Collaborator traits for region lookup and protection mutation
pub use crate::memory::{ProtectionMutator, RegionQuery};

/// Current-process collaborators for Linux
#[cfg(target_os = "linux")]
pub use crate::memory::LocalMemory;

// ================================================================================================
// Call Interception
// ================================================================================================

/// The transparent proxy and its ABI adapter boundary
pub use crate::intercept::{InterceptProxy, InterfaceId, ObjectId, SharedHandle, SharedObject};

/// Observer callback lists for intercepted operations
pub use crate::intercept::{CallbackHandle, CallbackList};

/// Proxy lifecycle stage, exposed for diagnostics and tests
pub use crate::intercept::LifeStage;

/// Scoped preservation of the thread-local platform error state
pub use crate::intercept::LastErrorPreserver;
