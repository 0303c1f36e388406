//! Ordered broadcast lists connecting interception points to observers.
//!
//! One [`CallbackList`] serves one operation kind: a proxy that intercepts two
//! operations holds two lists, and ordering is guaranteed only within each. Lists are
//! append-only for the life of the process - there is no deregistration - and every
//! entry sees, and may override, the in-flight result before the next entry and before
//! the original caller.

type CallbackFn<A, R> = Box<dyn Fn(&A, &mut R) + Send + Sync>;

/// Receipt for a registered callback.
///
/// Carries the slot index the entry landed in. Nothing can be done with it today
/// beyond bookkeeping - the registry is append-only - but it gives a future removal
/// scheme an address without changing the registration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackHandle(usize);

impl CallbackHandle {
    /// Zero-based registration slot of the entry.
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Append-only, ordered broadcast list for one operation kind.
///
/// `A` is the operation's captured arguments (including output buffers), `R` its result
/// type. Registration is lock-free and may happen from any thread, though the intended
/// discipline is single-writer-at-setup: registration racing a broadcast is not part of
/// the correctness contract. Broadcasts themselves run on whatever thread triggered the
/// intercepted operation.
///
/// # Examples
///
/// ```rust
/// use interpose::CallbackList;
///
/// let on_read: CallbackList<(usize, usize), u32> = CallbackList::new();
/// on_read.register(|&(address, len), status| {
///     log::trace!("read of {len} bytes at {address:#x} -> {status}");
/// });
/// on_read.register(|_, status| *status = 0); // force success
///
/// let mut status = 5;
/// on_read.run_all(&(0x1000, 16), &mut status);
/// assert_eq!(status, 0);
/// ```
pub struct CallbackList<A, R> {
    entries: boxcar::Vec<CallbackFn<A, R>>,
}

impl<A, R> CallbackList<A, R> {
    /// New empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Append `callback` to the list.
    ///
    /// Entries run in registration order, each observing the overrides of those before
    /// it. The entry stays registered for the life of the process.
    pub fn register<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&A, &mut R) + Send + Sync + 'static,
    {
        CallbackHandle(self.entries.push(Box::new(callback)))
    }

    /// Broadcast to every registered entry, in registration order.
    ///
    /// `result` holds the delegate's real result on entry and the final - possibly
    /// overridden - value when the broadcast returns.
    pub fn run_all(&self, args: &A, result: &mut R) {
        for (_, callback) in self.entries.iter() {
            callback(args, result);
        }
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A, R> Default for CallbackList<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn handles_count_registration_slots() {
        let list: CallbackList<(), ()> = CallbackList::new();
        assert!(list.is_empty());

        let first = list.register(|(), ()| {});
        let second = list.register(|(), ()| {});
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn entries_run_in_registration_order() {
        let list: CallbackList<(), Vec<u32>> = CallbackList::new();
        list.register(|(), seen| seen.push(1));
        list.register(|(), seen| seen.push(2));
        list.register(|(), seen| seen.push(3));

        let mut seen = Vec::new();
        list.run_all(&(), &mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn each_entry_observes_the_previous_override() {
        let list: CallbackList<u32, u32> = CallbackList::new();
        // C1 sees the real result, C2 sees C1's override, the caller sees C2's.
        list.register(|args, result| {
            assert_eq!(*result, 100);
            *result = args + 1;
        });
        list.register(|_, result| {
            assert_eq!(*result, 8);
            *result = 42;
        });

        let mut result = 100;
        list.run_all(&7, &mut result);
        assert_eq!(result, 42);
    }

    #[test]
    fn broadcast_without_entries_leaves_the_result_alone() {
        let list: CallbackList<(), u32> = CallbackList::new();
        let mut result = 17;
        list.run_all(&(), &mut result);
        assert_eq!(result, 17);
    }

    #[test]
    fn registration_is_safe_from_many_threads() {
        let list: Arc<CallbackList<(), ()>> = Arc::new(CallbackList::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let list = Arc::clone(&list);
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let hits = Arc::clone(&hits);
                        list.register(move |(), ()| {
                            hits.fetch_add(1, Ordering::Relaxed);
                        });
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(list.len(), 100);
        list.run_all(&(), &mut ());
        assert_eq!(hits.load(Ordering::Relaxed), 100);
    }
}
