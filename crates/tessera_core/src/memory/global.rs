//! # Global Memory
//!
//! Fixed-capacity block provider that every chunk and the system arena draw
//! their backing storage from. Blocks are handed out from a single address
//! space, so block ranges never overlap while both are alive.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Alignment of every block start address.
const BLOCK_ALIGN: usize = 16;

/// Global memory shared between the managers of one engine.
pub type SharedMemory = Arc<Mutex<GlobalMemory>>;

/// A block reserved from [`GlobalMemory`].
///
/// Blocks are not `Clone`: a block is returned exactly once through
/// [`GlobalMemory::free`].
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    address: usize,
    size: usize,
    tag: &'static str,
}

impl MemoryBlock {
    /// First address of the block.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> usize {
        self.address
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// One past the last address of the block.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.address + self.size
    }

    /// Diagnostic label the block was reserved under.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        self.tag
    }
}

/// Fixed-capacity, tag-accounted block allocator.
///
/// # Example
///
/// ```rust,ignore
/// let mut memory = GlobalMemory::new(1024 * 1024);
/// let block = memory.allocate(4096, "EntityManager").unwrap();
/// assert_eq!(memory.used(), 4096);
/// memory.free(block);
/// ```
#[derive(Debug)]
pub struct GlobalMemory {
    capacity: usize,
    used: usize,
    next_address: usize,
    live_blocks: usize,
    usage: BTreeMap<&'static str, usize>,
}

impl GlobalMemory {
    /// Creates a global memory pool of `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            // Address zero is never handed out.
            next_address: BLOCK_ALIGN,
            live_blocks: 0,
            usage: BTreeMap::new(),
        }
    }

    /// Creates a global memory pool wrapped for sharing between managers.
    #[must_use]
    pub fn shared(capacity: usize) -> SharedMemory {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by live blocks.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Bytes still available.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.capacity - self.used
    }

    /// Number of live blocks.
    #[inline]
    #[must_use]
    pub const fn live_blocks(&self) -> usize {
        self.live_blocks
    }

    /// Bytes currently held under `tag`.
    #[must_use]
    pub fn usage_of(&self, tag: &str) -> usize {
        self.usage.get(tag).copied().unwrap_or(0)
    }

    /// Reserves a block of `size` bytes under the diagnostic `tag`.
    ///
    /// # Returns
    ///
    /// The block, or None if the remaining capacity is too small.
    pub fn allocate(&mut self, size: usize, tag: &'static str) -> Option<MemoryBlock> {
        if size > self.available() {
            tracing::warn!(
                "Global memory exhausted: {} requested {} bytes, {} available",
                tag,
                size,
                self.available()
            );
            return None;
        }

        let address = self.next_address;
        let span = size.max(1).div_ceil(BLOCK_ALIGN) * BLOCK_ALIGN;
        self.next_address = address.checked_add(span)?;

        self.used += size;
        self.live_blocks += 1;
        *self.usage.entry(tag).or_insert(0) += size;

        tracing::trace!("Allocated {} bytes for {} at {:#x}", size, tag, address);
        Some(MemoryBlock { address, size, tag })
    }

    /// Returns a block to the pool.
    pub fn free(&mut self, block: MemoryBlock) {
        self.used -= block.size;
        self.live_blocks -= 1;
        if let Some(bytes) = self.usage.get_mut(block.tag) {
            *bytes -= block.size;
            if *bytes == 0 {
                self.usage.remove(block.tag);
            }
        }
        tracing::trace!("Freed {} bytes of {} at {:#x}", block.size, block.tag, block.address);
    }
}

impl Drop for GlobalMemory {
    fn drop(&mut self) {
        if self.live_blocks > 0 {
            tracing::warn!(
                "Global memory released with {} live blocks ({} bytes)",
                self.live_blocks,
                self.used
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free() {
        let mut memory = GlobalMemory::new(1024);

        let block = memory.allocate(100, "test").unwrap();
        assert_eq!(block.size(), 100);
        assert_eq!(memory.used(), 100);
        assert_eq!(memory.usage_of("test"), 100);
        assert_eq!(memory.live_blocks(), 1);

        memory.free(block);
        assert_eq!(memory.used(), 0);
        assert_eq!(memory.usage_of("test"), 0);
        assert_eq!(memory.live_blocks(), 0);
    }

    #[test]
    fn test_exhaustion() {
        let mut memory = GlobalMemory::new(64);

        let _a = memory.allocate(48, "a").unwrap();
        assert!(memory.allocate(32, "b").is_none());
        assert!(memory.allocate(16, "b").is_some());
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        let mut memory = GlobalMemory::new(4096);

        let a = memory.allocate(10, "a").unwrap();
        let b = memory.allocate(33, "b").unwrap();
        let c = memory.allocate(0, "c").unwrap();

        assert!(a.end() <= b.address());
        assert!(b.end() <= c.address());
        assert_eq!(a.address() % BLOCK_ALIGN, 0);
        assert_eq!(b.address() % BLOCK_ALIGN, 0);
        assert_ne!(a.address(), 0);
    }
}
