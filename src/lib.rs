// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'memory/local.rs' calls mprotect on regions of the current process
// - 'intercept/last_error.rs' reads and writes the thread's errno slot

//! # interpose
//!
//! [![Crates.io](https://img.shields.io/crates/v/interpose.svg)](https://crates.io/crates/interpose)
//! [![Documentation](https://docs.rs/interpose/badge.svg)](https://docs.rs/interpose)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/interpose/blob/main/LICENSE-APACHE)
//!
//! The interception core of a process-instrumentation toolkit. `interpose` lets a
//! controlling component safely read and write memory whose current protection state is
//! unknown - escalating and restoring page protection without corrupting it - and
//! substitute a transparent proxy for an already-instantiated binary-interface object,
//! so every call made through that object can be observed or overridden while remaining
//! indistinguishable from the original's reference-counting and identity-query behavior.
//!
//! ## Features
//!
//! - **🛡️ Protection-aware access** - Scoped guards that refuse untouchable regions,
//!   skip redundant escalations, and guarantee restoration at scope exit
//! - **🔁 Transparent interception** - Proxies that match the wrapped object's
//!   reference-count lifecycle exactly, down to the identity-query substitution
//! - **📢 Ordered observer broadcast** - Append-only callback lists per intercepted
//!   operation, each observer able to override the in-flight result
//! - **🕵️ Invisible instrumentation** - Thread-local platform error state is saved and
//!   restored around every delegation, so observers never leak through it
//! - **🧩 ABI-agnostic core** - One adapter trait isolates vtable and calling-convention
//!   concerns from the interception logic
//! - **🔧 Pluggable collaborators** - Region lookup and protection mutation are narrow
//!   traits; a Linux current-process implementation ships in the box
//!
//! ## Quick Start
//!
//! Add `interpose` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! interpose = "0.2"
//! ```
//!
//! ### Guarded memory access
//!
//! ```rust,no_run
//! use interpose::{GuardAccess, LocalMemory, Process, ProtectGuard};
//!
//! # fn patch(address: usize) -> interpose::Result<()> {
//! let memory = LocalMemory;
//! let process = Process::current();
//!
//! // Write access guaranteed inside the scope, previous protection restored after -
//! // zero syscalls if the region was already writable.
//! let guard = ProtectGuard::new(&memory, &process, address, GuardAccess::Write)?;
//! // ... write through `address` ...
//! drop(guard);
//! # Ok(())
//! # }
//! ```
//!
//! ### Intercepting an interface
//!
//! ```rust,ignore
//! use interpose::{CallbackList, InterceptProxy};
//!
//! let proxy = InterceptProxy::wrap(real_device);
//! on_state.register(|state: &StateFrame, status: &mut u32| {
//!     // observe, or override `*status` before the caller sees it
//! });
//! let status = proxy.intercept(&on_state, frame, |device, frame| device.poll(frame));
//! ```
//!
//! ## Architecture
//!
//! `interpose` is organized into two subsystems plus their shared plumbing:
//!
//! - [`memory`] - region snapshots, protection classification, collaborator traits, and
//!   the [`ProtectGuard`]
//! - [`intercept`] - the [`SharedObject`] ABI boundary, [`InterceptProxy`],
//!   [`CallbackList`], and the ambient error-state discipline
//! - [`prelude`] - convenient re-exports of the most commonly used types
//! - [`Error`] and [`Result`] - comprehensive error handling
//!
//! ## Concurrency
//!
//! Everything here is synchronous and completes through fast system-level calls; there
//! is no cancellation, and the only retry is the guard's single bounded fallback. The
//! proxy's external count supports concurrent acquires and releases from independently
//! obtained references. Guards belong to one logical operation each, and overlapping
//! escalations from different threads race by construction - serializing them is the
//! caller's responsibility.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Construction-time failures
//! propagate; teardown-time restoration failures are logged and swallowed, preserving
//! the no-panic-on-cleanup contract. Batch consumers should treat
//! [`Error::AccessDenied`] and [`Error::InvalidProtection`] as skip-and-continue:
//!
//! ```rust,no_run
//! use interpose::{Error, GuardAccess, LocalMemory, Process, ProtectGuard};
//!
//! let memory = LocalMemory;
//! let process = Process::current();
//! for address in [0x1000_usize, 0x2000, 0x3000] {
//!     match ProtectGuard::new(&memory, &process, address, GuardAccess::Read) {
//!         Ok(_guard) => { /* inspect */ }
//!         Err(Error::InvalidProtection { .. } | Error::AccessDenied { .. }) => continue,
//!         Err(e) => eprintln!("giving up on {address:#x}: {e}"),
//!     }
//! }
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub(crate) mod process;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use interpose::prelude::*;
///
/// let memory = LocalMemory;
/// let process = Process::current();
/// let region = memory.query(&process, 0x1000)?;
/// # Ok::<(), interpose::Error>(())
/// ```
pub mod prelude;

/// Protection-aware memory access: region snapshots, classification, collaborator
/// traits, and the restoration-guaranteeing guard.
pub mod memory;

/// Reference-counted call interception: the ABI adapter boundary, the proxy, observer
/// callback lists, and ambient error-state preservation.
pub mod intercept;

/// The main error type for all operations in this crate. Provides detailed error
/// information for guarded memory access and interception-proxy identity handling.
pub use error::Error;

/// Non-owning identity of a target process, the key every collaborator consumes.
pub use process::Process;

/// Scoped protection escalation with guaranteed restoration.
///
/// See [`memory::ProtectGuard`] for construction rules and the restoration contract.
///
/// # Example
///
/// ```rust,no_run
/// use interpose::{GuardAccess, LocalMemory, Process, ProtectGuard};
/// let memory = LocalMemory;
/// let process = Process::current();
/// let guard = ProtectGuard::new(&memory, &process, 0x1000, GuardAccess::Read)?;
/// assert!(guard.region().contains(0x1000));
/// # Ok::<(), interpose::Error>(())
/// ```
pub use memory::{GuardAccess, ProtectGuard};

/// The memory snapshot model: regions, their state and backing kind, and the
/// protection mask vocabulary.
pub use memory::{MemoryRegion, Protection, RegionKind, RegionState};

/// Collaborator traits the guard consumes: address-to-region resolution and protection
/// mutation.
pub use memory::{ProtectionMutator, RegionQuery};

/// Region query and protection mutation for the current process (Linux).
#[cfg(target_os = "linux")]
pub use memory::LocalMemory;

/// The interception surface: the ABI adapter trait, the transparent proxy, and the
/// observer callback lists.
pub use intercept::{
    CallbackHandle, CallbackList, InterceptProxy, InterfaceId, LifeStage, ObjectId,
    SharedHandle, SharedObject,
};

/// Universal `Result` type for this crate, wrapping [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
