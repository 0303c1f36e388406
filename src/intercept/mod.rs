//! Reference-counted call interception.
//!
//! Everything needed to substitute a transparent proxy for an already-instantiated
//! fixed-ABI interface instance: the ABI adapter boundary, the proxy with its external
//! reference count and lifecycle stage machine, the callback lists that connect
//! interception points to observers, and the ambient error-state discipline that keeps
//! instrumentation invisible.
//!
//! # Architecture
//!
//! - [`SharedObject`] - the one adapter boundary behind which vtable layout and calling
//!   convention live; the interception logic above it is ABI-agnostic
//! - [`InterceptProxy`] - wraps one real instance, forwards or intercepts, and matches
//!   the wrapped object's reference-count lifecycle exactly
//! - [`CallbackList`] - one ordered append-only observer list per intercepted operation
//! - [`last_error`] - scoped save/restore of the thread-local platform error code, so
//!   observers and diagnostics never leak through that channel
//! - [`ExternalRefs`] / [`LifeStage`] - the proxy's count and `Live -> Zero ->
//!   Destroyed` stage machine, separated out so the zero-transition is testable on its
//!   own
//!
//! # Key Components
//!
//! ```rust,ignore
//! // Wrap once, substitute everywhere the real reference was used:
//! let proxy = InterceptProxy::wrap(real);
//!
//! // Observers read and may override results, in registration order:
//! on_state.register(|args, result| { /* observe or override */ });
//! ```

pub mod last_error;

mod callbacks;
mod proxy;
mod refs;

pub use callbacks::{CallbackHandle, CallbackList};
pub use last_error::LastErrorPreserver;
pub use proxy::{InterceptProxy, InterfaceId, ObjectId, SharedHandle, SharedObject};
pub use refs::{ExternalRefs, LifeStage, ReleaseStep};
