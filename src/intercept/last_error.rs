//! Ambient thread-local error state, made explicit.
//!
//! Every platform keeps a thread-local error code that unrelated calls clobber as a side
//! effect (`errno` on POSIX, `GetLastError` on Windows). Instrumentation must never be
//! observable through that channel: the wrapped object's calls have to see the caller's
//! ambient state, and the caller has to see whatever the wrapped object left behind - not
//! whatever logging or observer callbacks happened to do in between.
//!
//! [`LastErrorPreserver`] scopes that discipline: capture on entry, revert immediately
//! before delegating, update immediately after, and let drop re-instate the updated value
//! on every exit path, including unwinding ones.

/// Read the calling thread's ambient OS error code.
#[must_use]
pub fn get() -> i32 {
    platform::get()
}

/// Overwrite the calling thread's ambient OS error code.
pub fn set(code: i32) {
    platform::set(code);
}

#[cfg(unix)]
mod platform {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "emscripten"))]
    unsafe fn errno_location() -> *mut i32 {
        libc::__errno_location()
    }

    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    unsafe fn errno_location() -> *mut i32 {
        libc::__error()
    }

    #[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
    unsafe fn errno_location() -> *mut i32 {
        libc::__errno()
    }

    pub fn get() -> i32 {
        // SAFETY: the location is valid for the life of the calling thread.
        unsafe { *errno_location() }
    }

    pub fn set(code: i32) {
        // SAFETY: as above; errno is ours to write on this thread.
        unsafe { *errno_location() = code }
    }
}

#[cfg(windows)]
mod platform {
    #[link(name = "kernel32")]
    extern "system" {
        fn GetLastError() -> u32;
        fn SetLastError(code: u32);
    }

    pub fn get() -> i32 {
        // SAFETY: no preconditions; reads the thread's TEB error slot.
        unsafe { GetLastError() as i32 }
    }

    pub fn set(code: i32) {
        // SAFETY: no preconditions; writes the thread's TEB error slot.
        unsafe { SetLastError(code as u32) }
    }
}

/// Scoped save/restore of the thread's ambient error state.
///
/// The value written back at drop is the most recently captured one: the construction
/// snapshot until [`update`](LastErrorPreserver::update) runs, the post-delegate snapshot
/// afterwards. Anything executed between `update` and scope exit - observer callbacks,
/// logging, diagnostics - can clobber the ambient state freely without the original
/// caller ever seeing it.
///
/// # Examples
///
/// ```rust
/// use interpose::intercept::last_error::{self, LastErrorPreserver};
///
/// let mut preserver = LastErrorPreserver::new();
/// preserver.revert(); // delegate sees the caller's ambient state
/// // ... delegate call happens here, leaving its own error code ...
/// preserver.update(); // that code is what the caller must observe
/// last_error::set(999); // observers may clobber at will
/// drop(preserver); // the delegate's code is back
/// ```
#[derive(Debug)]
pub struct LastErrorPreserver {
    saved: i32,
}

impl LastErrorPreserver {
    /// Capture the current ambient error state.
    #[must_use]
    pub fn new() -> Self {
        Self { saved: get() }
    }

    /// Write the captured state back, so the next call runs under it.
    pub fn revert(&self) {
        set(self.saved);
    }

    /// Re-capture the ambient state, replacing the construction snapshot.
    pub fn update(&mut self) {
        self.saved = get();
    }
}

impl Default for LastErrorPreserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LastErrorPreserver {
    fn drop(&mut self) {
        set(self.saved);
    }
}
