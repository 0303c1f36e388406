//! Current-process collaborators for Linux.
//!
//! [`LocalMemory`] implements both collaborator traits against the running process:
//! region lookup parses `/proc/<pid>/maps`, protection mutation calls `mprotect`.
//! It exists so the guard has a real backend for self-instrumentation scenarios - the
//! common case for an injected payload inspecting its own host. Foreign processes are
//! readable through `/proc` but not mutable (Linux has no cross-process `mprotect`), and
//! the mutator says so instead of pretending.

use std::fs;

use crate::{
    memory::{MemoryRegion, Protection, ProtectionMutator, RegionKind, RegionState, RegionQuery},
    process::Process,
    Error, Result,
};

/// Region query and protection mutation for the current process.
///
/// Stateless; construct it freely. See the module docs for the foreign-process caveat.
///
/// # Examples
///
/// ```rust
/// use interpose::{LocalMemory, Process, RegionQuery};
///
/// let memory = LocalMemory;
/// let process = Process::current();
/// let code = LocalMemory::default as usize;
/// let region = memory.query(&process, code)?;
/// assert!(region.protection.can_execute());
/// # Ok::<(), interpose::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMemory;

impl LocalMemory {
    /// Parse one `/proc/<pid>/maps` line into a snapshot.
    ///
    /// Everything `/proc` reports is committed by definition, and maps entries are their
    /// own allocation unit, so `alloc_base` always equals `base`.
    fn parse_maps_line(line: &str) -> Result<MemoryRegion> {
        let mut fields = line.split_whitespace();
        let range = fields
            .next()
            .ok_or_else(|| maps_error!("empty maps line"))?;
        let perms = fields
            .next()
            .ok_or_else(|| maps_error!("maps line without permissions: '{}'", line))?;
        let pathname = fields.nth(3);

        let (base, end) = range
            .split_once('-')
            .ok_or_else(|| maps_error!("maps range without separator: '{}'", range))?;
        let base = usize::from_str_radix(base, 16)
            .map_err(|_| maps_error!("unparseable range start: '{}'", base))?;
        let end = usize::from_str_radix(end, 16)
            .map_err(|_| maps_error!("unparseable range end: '{}'", end))?;
        if end < base {
            return Err(maps_error!("inverted maps range: '{}'", range));
        }

        let perms = perms.as_bytes();
        if perms.len() < 4 {
            return Err(maps_error!("truncated permission field: '{}'", range));
        }
        let mut protection = Protection::empty();
        if perms[0] == b'r' {
            protection |= Protection::READ;
        }
        if perms[1] == b'w' {
            protection |= Protection::WRITE;
        }
        if perms[2] == b'x' {
            protection |= Protection::EXECUTE;
        }

        let kind = match pathname {
            // Kernel-provided ELF images mapped into every process
            Some("[vdso]" | "[vsyscall]") => RegionKind::Image,
            Some(path) if path.starts_with('/') => RegionKind::Mapped,
            _ => RegionKind::Private,
        };

        Ok(MemoryRegion {
            base,
            alloc_base: base,
            size: end - base,
            state: RegionState::Committed,
            protection,
            kind,
        })
    }
}

impl RegionQuery for LocalMemory {
    fn query(&self, process: &Process, address: usize) -> Result<MemoryRegion> {
        let maps = fs::read_to_string(format!("/proc/{}/maps", process.pid()))?;
        for line in maps.lines() {
            let region = Self::parse_maps_line(line)?;
            if region.contains(address) {
                return Ok(region);
            }
        }
        Err(Error::NotFound { address })
    }
}

impl ProtectionMutator for LocalMemory {
    fn protect(
        &self,
        process: &Process,
        region: &MemoryRegion,
        protection: Protection,
    ) -> Result<Protection> {
        if !process.is_current() {
            log::debug!("cannot mutate protection of foreign {process} from here");
            return Err(Error::AccessDenied {
                address: region.base,
                requested: protection,
            });
        }
        if protection.contains(Protection::GUARD) {
            // mprotect cannot express guard semantics
            return Err(Error::AccessDenied {
                address: region.base,
                requested: protection,
            });
        }

        let mut prot = libc::PROT_NONE;
        if protection.contains(Protection::READ) {
            prot |= libc::PROT_READ;
        }
        if protection.contains(Protection::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        if protection.contains(Protection::EXECUTE) {
            prot |= libc::PROT_EXEC;
        }

        // SAFETY: the range comes from a maps snapshot of this process, so it is
        // page-aligned and mapped; mprotect on it cannot touch anything we do not own.
        let outcome = unsafe { libc::mprotect(region.base as *mut libc::c_void, region.size, prot) };
        if outcome != 0 {
            log::debug!(
                "mprotect({:#x}, {:#x}, {protection}) failed: {}",
                region.base,
                region.size,
                std::io::Error::last_os_error()
            );
            return Err(Error::AccessDenied {
                address: region.base,
                requested: protection,
            });
        }

        Ok(region.protection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_file_backed_line() {
        let region = LocalMemory::parse_maps_line(
            "55d4b03a4000-55d4b03a6000 r-xp 00002000 08:02 1048602 /usr/bin/cat",
        )
        .unwrap();
        assert_eq!(region.base, 0x55d4_b03a_4000);
        assert_eq!(region.size, 0x2000);
        assert_eq!(region.protection, Protection::READ | Protection::EXECUTE);
        assert_eq!(region.kind, RegionKind::Mapped);
        assert_eq!(region.state, RegionState::Committed);
    }

    #[test]
    fn parses_anonymous_and_pseudo_paths() {
        let heap = LocalMemory::parse_maps_line(
            "5654b8a9c000-5654b8abd000 rw-p 00000000 00:00 0 [heap]",
        )
        .unwrap();
        assert_eq!(heap.kind, RegionKind::Private);
        assert_eq!(heap.protection, Protection::RW);

        let anon =
            LocalMemory::parse_maps_line("7f1c00000000-7f1c00021000 rw-p 00000000 00:00 0")
                .unwrap();
        assert_eq!(anon.kind, RegionKind::Private);

        let vdso = LocalMemory::parse_maps_line(
            "7ffd43ffa000-7ffd43ffc000 r-xp 00000000 00:00 0 [vdso]",
        )
        .unwrap();
        assert_eq!(vdso.kind, RegionKind::Image);
    }

    #[test]
    fn no_access_line_classifies_bad() {
        let region = LocalMemory::parse_maps_line(
            "7f1c00021000-7f1c00022000 ---p 00000000 00:00 0",
        )
        .unwrap();
        assert!(region.protection.is_bad());
    }

    #[test]
    fn rejects_damaged_lines() {
        assert!(matches!(
            LocalMemory::parse_maps_line("not-a-range rw-p 0 0 0"),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            LocalMemory::parse_maps_line(""),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            LocalMemory::parse_maps_line("0-1000"),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn query_resolves_our_own_code() {
        let memory = LocalMemory;
        let process = Process::current();
        let code = query_resolves_our_own_code as usize;

        let region = memory.query(&process, code).unwrap();
        assert!(region.contains(code));
        assert!(region.protection.can_execute());
    }

    #[test]
    fn query_misses_the_null_page() {
        let memory = LocalMemory;
        let process = Process::current();
        assert!(matches!(
            memory.query(&process, 0x10),
            Err(Error::NotFound { address: 0x10 })
        ));
    }

    #[test]
    fn protect_refuses_foreign_processes() {
        let memory = LocalMemory;
        let foreign = Process::from_pid(1);
        let region = MemoryRegion {
            base: 0x1000,
            alloc_base: 0x1000,
            size: 0x1000,
            state: RegionState::Committed,
            protection: Protection::READ,
            kind: RegionKind::Private,
        };
        assert!(matches!(
            memory.protect(&foreign, &region, Protection::RW),
            Err(Error::AccessDenied { .. })
        ));
    }
}
