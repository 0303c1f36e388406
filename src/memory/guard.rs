//! Scoped protection escalation with guaranteed restoration.
//!
//! [`ProtectGuard`] is the sole sanctioned way to touch memory whose protection you do
//! not control: construct it for the access you need, perform the access, and let scope
//! exit put the original mask back. There is no raw "force access" primitive bypassing
//! this bookkeeping.
//!
//! Construction is where all the policy lives: regions with a bad mask are refused
//! outright, regions that already satisfy the request cost zero mutator calls, and
//! escalation asks for the most permissive usable mask with exactly one reduced retry
//! before giving up.

use crate::{
    memory::{MemoryRegion, Protection, ProtectionMutator, RegionQuery},
    process::Process,
    Error, Result,
};

/// The access a guard guarantees for its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GuardAccess {
    /// Reads from the region must succeed
    Read,
    /// Writes to the region must succeed
    Write,
}

/// Scoped object that temporarily escalates a region's protection and restores it.
///
/// A guard belongs to exactly one logical operation: it is not `Clone` (two guards must
/// never race to restore one region), and moving it transfers the restoration
/// responsibility wholesale. Guards from different threads targeting overlapping regions
/// race by construction - the underlying mutation is process-global - so serializing
/// overlapping escalations is the caller's job.
///
/// Restoration runs at scope exit, or earlier through the idempotent
/// [`restore`](ProtectGuard::restore). A restore failure during drop is logged and swallowed;
/// protection is then left altered, which is the documented residual risk of the
/// best-effort guarantee.
///
/// # Examples
///
/// ```rust,no_run
/// use interpose::{GuardAccess, LocalMemory, Process, ProtectGuard};
///
/// # fn patch(address: usize) -> interpose::Result<()> {
/// let memory = LocalMemory;
/// let process = Process::current();
/// let guard = ProtectGuard::new(&memory, &process, address, GuardAccess::Write)?;
/// // ... write through `address` ...
/// drop(guard); // previous protection is back before anything else runs
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ProtectGuard<'a, M: ProtectionMutator + ?Sized> {
    mutator: &'a M,
    process: &'a Process,
    access: GuardAccess,
    region: MemoryRegion,
    already_satisfied: bool,
    old_protect: Option<Protection>,
}

impl<'a, M: ProtectionMutator + ?Sized> ProtectGuard<'a, M> {
    /// Guard the region containing `address`, resolving it through the query collaborator.
    ///
    /// # Errors
    ///
    /// Whatever [`RegionQuery::query`] reports for an unresolvable address, plus every
    /// failure of [`ProtectGuard::for_region`].
    pub fn new(
        memory: &'a M,
        process: &'a Process,
        address: usize,
        access: GuardAccess,
    ) -> Result<Self>
    where
        M: RegionQuery,
    {
        let region = memory.query(process, address)?;
        Self::for_region(memory, process, region, access)
    }

    /// Guard an already-snapshotted region.
    ///
    /// The snapshot must be fresh: a stale one restores a stale mask.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidProtection`] when the region's mask is classified bad - such a
    /// region is never touched, and no mutator call is made. When escalation is needed
    /// and both the permissive request and the single reduced retry are refused, the
    /// retry's error propagates (typically [`Error::AccessDenied`]).
    pub fn for_region(
        mutator: &'a M,
        process: &'a Process,
        region: MemoryRegion,
        access: GuardAccess,
    ) -> Result<Self> {
        if region.protection.is_bad() {
            return Err(Error::InvalidProtection {
                address: region.base,
                protection: region.protection,
            });
        }

        let already_satisfied = match access {
            GuardAccess::Read => region.protection.can_read(),
            GuardAccess::Write => region.protection.can_write(),
        };

        let old_protect = if already_satisfied {
            None
        } else {
            let previous = match mutator.protect(process, &region, Protection::RWX) {
                Ok(previous) => previous,
                Err(refused) => {
                    // The mapping may disallow executable masks; retry once without.
                    log::debug!(
                        "permissive escalation refused for {process} at {:#x} ({refused}), retrying as {}",
                        region.base,
                        Protection::RW
                    );
                    mutator.protect(process, &region, Protection::RW)?
                }
            };
            Some(previous)
        };

        Ok(Self {
            mutator,
            process,
            access,
            region,
            already_satisfied,
            old_protect,
        })
    }

    /// Put the previous protection back.
    ///
    /// Idempotent: once the first call has run - successfully or not - later calls are
    /// no-ops, as is every call on a guard that never changed anything.
    ///
    /// # Errors
    ///
    /// [`Error::RestoreFailed`] wrapping the mutator's refusal. The guard's restoration
    /// state is consumed either way; there is no second attempt.
    pub fn restore(&mut self) -> Result<()> {
        let Some(previous) = self.old_protect.take() else {
            return Ok(());
        };

        match self.mutator.protect(self.process, &self.region, previous) {
            Ok(_) => Ok(()),
            Err(source) => Err(Error::RestoreFailed {
                address: self.region.base,
                source: Box::new(source),
            }),
        }
    }

    /// The access this guard guarantees.
    #[must_use]
    pub fn access(&self) -> GuardAccess {
        self.access
    }

    /// Whether the region satisfied the requested access without any mutation.
    #[must_use]
    pub fn already_satisfied(&self) -> bool {
        self.already_satisfied
    }

    /// The snapshot this guard operates on.
    #[must_use]
    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }
}

impl<M: ProtectionMutator + ?Sized> Drop for ProtectGuard<'_, M> {
    fn drop(&mut self) {
        // WARNING: protection stays altered if the restore fails here. Cleanup must not
        // panic, so the failure is logged and asserted rather than propagated.
        if let Err(err) = self.restore() {
            log::error!("{err}");
            debug_assert!(false, "{err}");
        }
    }
}
