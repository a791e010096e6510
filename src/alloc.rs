use std::{
    alloc::*,
    cell::Cell,
    sync::atomic::{AtomicBool, AtomicU64, Ordering::*},
};

// Use `AllocProfiler` when running crate-internal tests so that memory
// profiling can be tested against real allocations.
#[cfg(test)]
#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

/// Measures [`GlobalAlloc`] memory usage.
///
/// Memory profiling reads the net number of bytes this allocator has handed
/// out, so it must be registered as the
/// [`#[global_allocator]`](macro@global_allocator):
///
/// ```
/// use stint::AllocProfiler;
///
/// #[global_allocator]
/// static ALLOC: AllocProfiler = AllocProfiler::system();
/// ```
///
/// Other [`GlobalAlloc`] implementations can be wrapped with
/// [`AllocProfiler::new()`].
///
/// # Implementation
///
/// Every operation is tallied twice: into a thread-local tally without
/// synchronization, and into a process-wide tally with relaxed atomics. The
/// thread-local tally lets a profiling session ignore allocations made by
/// unrelated threads, such as a test harness running other tests.
#[derive(Debug, Default)]
pub struct AllocProfiler<Alloc = System> {
    alloc: Alloc,
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for AllocProfiler<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        tally(AllocOp::Alloc, layout.size());

        self.alloc.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        tally(AllocOp::Alloc, layout.size());

        self.alloc.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let shrink = new_size < layout.size();
        tally(
            AllocOp::realloc(shrink),
            if shrink { layout.size() - new_size } else { new_size - layout.size() },
        );

        self.alloc.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        tally(AllocOp::Dealloc, layout.size());

        self.alloc.dealloc(ptr, layout)
    }
}

impl AllocProfiler {
    /// Profiles the [`System`] allocator.
    #[inline]
    pub const fn system() -> Self {
        Self::new(System)
    }
}

impl<A> AllocProfiler<A> {
    /// Profiles a [`GlobalAlloc`].
    #[inline]
    pub const fn new(alloc: A) -> Self {
        Self { alloc }
    }
}

/// Allocation operation categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocOp {
    Grow,
    Shrink,
    Alloc,
    Dealloc,
}

impl AllocOp {
    pub const ALL: [Self; 4] = {
        use AllocOp::*;

        // Use same order as declared so that it can be indexed as-is.
        [Grow, Shrink, Alloc, Dealloc]
    };

    #[inline]
    fn realloc(shrink: bool) -> Self {
        if shrink {
            Self::Shrink
        } else {
            Self::Grow
        }
    }
}

/// The number of times an operation was performed and the bytes it moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocTally {
    pub count: u64,
    pub size: u64,
}

/// Point-in-time copy of allocation tallies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocSnapshot {
    tallies: [AllocTally; 4],
}

impl AllocSnapshot {
    #[inline]
    pub fn get(&self, op: AllocOp) -> AllocTally {
        self.tallies[op as usize]
    }

    /// Bytes allocated minus bytes freed.
    ///
    /// Snapshots are cumulative, so the difference between two snapshots is
    /// the net allocation in between, which is negative if more was freed.
    pub fn net_bytes(&self) -> i64 {
        let added = self.get(AllocOp::Alloc).size + self.get(AllocOp::Grow).size;
        let removed = self.get(AllocOp::Dealloc).size + self.get(AllocOp::Shrink).size;
        added as i64 - removed as i64
    }
}

struct SharedTally {
    count: AtomicU64,
    size: AtomicU64,
}

#[allow(clippy::declare_interior_mutable_const)]
const SHARED_ZERO: SharedTally = SharedTally { count: AtomicU64::new(0), size: AtomicU64::new(0) };

static PROCESS_TALLIES: [SharedTally; 4] = [SHARED_ZERO; 4];

static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Tallies of the current thread.
    ///
    /// This must stay `const`-initialized without `Drop` because it is accessed
    /// from within the allocator.
    static THREAD_TALLIES: Cell<[AllocTally; 4]> =
        const { Cell::new([AllocTally { count: 0, size: 0 }; 4]) };
}

#[inline]
fn tally(op: AllocOp, size: usize) {
    let shared = &PROCESS_TALLIES[op as usize];
    shared.count.fetch_add(1, Relaxed);
    shared.size.fetch_add(size as u64, Relaxed);

    // Thread-local storage may already be destroyed during thread teardown.
    _ = THREAD_TALLIES.try_with(|tallies| {
        let mut values = tallies.get();
        values[op as usize].count += 1;
        values[op as usize].size += size as u64;
        tallies.set(values);
    });

    if !INSTALLED.load(Relaxed) {
        INSTALLED.store(true, Relaxed);
    }
}

/// Returns `true` once an [`AllocProfiler`] has recorded any allocation.
#[inline]
pub fn is_installed() -> bool {
    INSTALLED.load(Relaxed)
}

/// Tallies of allocations made by the current thread.
pub fn thread_snapshot() -> AllocSnapshot {
    AllocSnapshot { tallies: THREAD_TALLIES.try_with(Cell::get).unwrap_or_default() }
}

/// Tallies of allocations made by all threads.
pub fn process_snapshot() -> AllocSnapshot {
    AllocSnapshot {
        tallies: AllocOp::ALL.map(|op| {
            let shared = &PROCESS_TALLIES[op as usize];
            AllocTally { count: shared.count.load(Relaxed), size: shared.size.load(Relaxed) }
        }),
    }
}
