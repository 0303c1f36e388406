//! External reference counting for interception proxies.
//!
//! A proxy keeps its own count of outstanding references - distinct from the wrapped
//! object's internal count - plus a tagged lifecycle stage. Both live here, in a type
//! small enough to test exhaustively, so the zero-transition and its side effects are
//! explicit decisions in the proxy rather than something implicit in a destructor.

use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};

/// Lifecycle stage of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LifeStage {
    /// External references outstanding, proxy fully usable
    Live,
    /// External count reached zero; cleanup has run or is running
    Zero,
    /// Wrapped reference detached; any further use is outside the contract
    Destroyed,
}

const STAGE_LIVE: u8 = 0;
const STAGE_ZERO: u8 = 1;
const STAGE_DESTROYED: u8 = 2;

/// Outcome of one external release.
#[derive(Debug, Clone, Copy)]
pub struct ReleaseStep {
    /// The external count after the decrement
    pub count: i64,
    /// Whether this release performed the one zero-transition
    pub first_zero: bool,
}

/// Atomic external reference count plus the `Live -> Zero -> Destroyed` stage machine.
///
/// The count starts at one: wrapping adopts the single reference the caller is
/// substituting the proxy into. Concurrent [`acquire`](ExternalRefs::acquire) and
/// [`release`](ExternalRefs::release) from independently obtained references are the
/// expected case; the only ordering promised is that the zero-transition happens-before
/// whatever the releasing thread runs next (the cleanup hook, then destruction).
///
/// The transition to zero happens at most once. A count that is re-acquired after
/// reaching zero keeps working arithmetically, but never reports `first_zero` again.
#[derive(Debug)]
pub struct ExternalRefs {
    count: AtomicI64,
    stage: AtomicU8,
}

impl ExternalRefs {
    /// Fresh state: count one, stage [`LifeStage::Live`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(1),
            stage: AtomicU8::new(STAGE_LIVE),
        }
    }

    /// Increment the external count, returning the new value.
    pub fn acquire(&self) -> i64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the external count.
    ///
    /// `first_zero` is true exactly once, on the release that takes the count to zero
    /// while the stage is still [`LifeStage::Live`]; the stage is [`LifeStage::Zero`]
    /// from that point on. Underflow means a caller released a reference it never had.
    pub fn release(&self) -> ReleaseStep {
        let count = self.count.fetch_sub(1, Ordering::AcqRel) - 1;
        debug_assert!(count >= 0, "external reference count underflow: {count}");

        let first_zero = count == 0
            && self
                .stage
                .compare_exchange(STAGE_LIVE, STAGE_ZERO, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();

        ReleaseStep { count, first_zero }
    }

    /// Advance to [`LifeStage::Destroyed`]. Happens at most once per proxy.
    pub fn mark_destroyed(&self) {
        let previous = self.stage.swap(STAGE_DESTROYED, Ordering::AcqRel);
        debug_assert!(
            previous != STAGE_DESTROYED,
            "proxy lifecycle advanced to Destroyed twice"
        );
    }

    /// Current external count.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Current lifecycle stage.
    #[must_use]
    pub fn stage(&self) -> LifeStage {
        match self.stage.load(Ordering::Acquire) {
            STAGE_LIVE => LifeStage::Live,
            STAGE_ZERO => LifeStage::Zero,
            _ => LifeStage::Destroyed,
        }
    }
}

impl Default for ExternalRefs {
    fn default() -> Self {
        Self::new()
    }
}
