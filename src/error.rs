use thiserror::Error;

use crate::{intercept::InterfaceId, memory::Protection};

macro_rules! maps_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of the interception core: guarded memory access,
/// collaborator queries, and interception-proxy identity handling. Construction-time failures
/// always propagate to the caller; the only swallowed path is a failed protection restore during
/// guard teardown, which is logged and surfaced as [`Error::RestoreFailed`] solely through the
/// explicit [`restore`](crate::ProtectGuard::restore) call.
///
/// # Error Categories
///
/// ## Guarded Memory Access
/// - [`Error::InvalidProtection`] - Region carries a protection mask that must never be touched
/// - [`Error::AccessDenied`] - Protection mutator refused the request, even after fallback
/// - [`Error::NotFound`] - No mapped region contains the requested address
/// - [`Error::RestoreFailed`] - A previously escalated region could not be restored
///
/// ## Interception
/// - [`Error::UnhandledIdentity`] - Identity query produced an interface the proxy does not wrap
///
/// ## Collaborator Plumbing
/// - [`Error::Io`] - Filesystem I/O while reading region information
/// - [`Error::Malformed`] - Region information that could not be parsed
///
/// # Examples
///
/// ```rust,no_run
/// use interpose::{Error, GuardAccess, LocalMemory, Process, ProtectGuard};
///
/// let memory = LocalMemory;
/// let process = Process::current();
/// match ProtectGuard::new(&memory, &process, 0x7f00_0000_0000, GuardAccess::Write) {
///     Ok(_guard) => println!("write access guaranteed"),
///     Err(Error::NotFound { address }) => eprintln!("nothing mapped at {address:#x}"),
///     Err(Error::InvalidProtection { .. }) => eprintln!("region is off limits, skipping"),
///     Err(e) => eprintln!("error: {e}"),
/// };
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The region carries a protection mask that is unsafe to touch.
    ///
    /// Guard pages, no-access mappings, and masks with undefined bits are classified *bad*
    /// and are never read, written, or protection-mutated by this layer. Batch consumers
    /// should skip the region and continue.
    #[error("memory at {address:#x} has a protection mask unsafe to touch ({protection})")]
    InvalidProtection {
        /// Base address of the offending region
        address: usize,
        /// The protection mask the region was snapshotted with
        protection: Protection,
    },

    /// The protection mutator refused the requested change.
    ///
    /// Reported after the bounded fallback: the permissive execute+read+write request and
    /// the reduced read+write retry both failed, or the mutator cannot reach the target
    /// process at all.
    #[error("protection change to {requested} refused for region at {address:#x}")]
    AccessDenied {
        /// Base address of the region the change targeted
        address: usize,
        /// The protection mask that was requested
        requested: Protection,
    },

    /// No mapped region contains the requested address.
    #[error("no mapped region contains address {address:#x}")]
    NotFound {
        /// The address that resolved to no region
        address: usize,
    },

    /// An identity query could not produce a wrapped interface for the requested identity.
    ///
    /// Raised by an interface instance that simply does not support the identity, and by
    /// the interception proxy when the wrapped object hands back a *different* instance:
    /// forwarding that raw handle would let instrumentation be bypassed silently, so the
    /// foreign handle is released and the call fails instead. The proxy path is
    /// additionally treated, in debug builds, as an internal-consistency failure, since
    /// it means the proxy's interface coverage has a gap.
    #[error("identity query produced an interface this proxy does not wrap: {requested}")]
    UnhandledIdentity {
        /// The interface identity that was requested
        requested: InterfaceId,
    },

    /// A previously escalated region could not be restored to its prior protection.
    ///
    /// Best-effort only: the drop path logs and swallows this, preserving the
    /// no-panic-on-cleanup contract. Callers that need to observe it must call
    /// [`restore`](crate::ProtectGuard::restore) explicitly. Protection is left altered
    /// when this occurs.
    #[error("failed to restore previous protection of region at {address:#x}")]
    RestoreFailed {
        /// Base address of the region left in its escalated state
        address: usize,
        /// The mutator failure that prevented restoration
        #[source]
        source: Box<Error>,
    },

    /// Region information is damaged and could not be parsed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An error occurred while accessing region information on disk.
    #[error("Error during I/O operation - {0}")]
    Io(#[from] std::io::Error),
}
