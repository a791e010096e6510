//! Memory oracles.

use cfg_if::cfg_if;

use crate::alloc;

/// Source of "bytes currently in use" readings.
///
/// Only differences between two readings are meaningful. Differences may be
/// negative when memory is released between readings.
pub trait MemoryProbe {
    fn current_bytes(&self) -> i64;
}

impl<M: MemoryProbe + ?Sized> MemoryProbe for &M {
    #[inline]
    fn current_bytes(&self) -> i64 {
        (**self).current_bytes()
    }
}

/// Which allocations a [`HeapProbe`] attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeapScope {
    /// Allocations made by the calling thread.
    #[default]
    Thread,

    /// Allocations made by every thread.
    Process,
}

/// Net heap bytes tallied by [`AllocProfiler`](crate::AllocProfiler).
///
/// Reads zero forever unless `AllocProfiler` is the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapProbe {
    scope: HeapScope,
}

impl HeapProbe {
    #[inline]
    pub fn thread() -> Self {
        Self { scope: HeapScope::Thread }
    }

    #[inline]
    pub fn process() -> Self {
        Self { scope: HeapScope::Process }
    }

    #[inline]
    pub fn scope(&self) -> HeapScope {
        self.scope
    }
}

impl MemoryProbe for HeapProbe {
    #[inline]
    fn current_bytes(&self) -> i64 {
        match self.scope {
            HeapScope::Thread => alloc::thread_snapshot().net_bytes(),
            HeapScope::Process => alloc::process_snapshot().net_bytes(),
        }
    }
}

/// Resident set size of the process, as reported by the operating system.
///
/// On Linux this is the current `VmRSS`. On other Unix systems only the
/// high-water mark is available, so deltas never go negative there.
/// Elsewhere it reads zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct RssProbe;

impl MemoryProbe for RssProbe {
    fn current_bytes(&self) -> i64 {
        resident_bytes().unwrap_or(0) as i64
    }
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn resident_bytes() -> Option<u64> {
            let status = std::fs::read_to_string("/proc/self/status").ok()?;
            parse_vm_rss(&status)
        }
    } else if #[cfg(unix)] {
        fn resident_bytes() -> Option<u64> {
            let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();

            // SAFETY: `getrusage` initializes `usage` on success.
            let usage = unsafe {
                if libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) != 0 {
                    return None;
                }
                usage.assume_init()
            };

            // macOS reports bytes, other systems report kilobytes.
            let max_rss = usage.ru_maxrss as u64;
            if cfg!(target_os = "macos") {
                Some(max_rss)
            } else {
                Some(max_rss * 1024)
            }
        }
    } else {
        fn resident_bytes() -> Option<u64> {
            None
        }
    }
}

/// Parses `VmRSS` out of `/proc/self/status` contents.
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let rest = status.lines().find_map(|line| line.strip_prefix("VmRSS:"))?;
    let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
    Some(kb * 1024)
}
