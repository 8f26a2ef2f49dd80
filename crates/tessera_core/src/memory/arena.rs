//! # Linear Arena
//!
//! A bump allocator over one block of global memory. The system manager
//! reserves one region per registered system from it; regions are released
//! all at once when the arena is reset or dropped.

use super::global::MemoryBlock;

/// A region handed out by [`LinearArena::reserve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaRegion {
    /// First address of the region.
    pub address: usize,
    /// Size of the region in bytes.
    pub size: usize,
}

/// A bump-pointer arena over a [`MemoryBlock`].
///
/// Reservations are fast (just bump an offset). Memory is released all at
/// once when the arena is reset or its block is handed back.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per thread.
///
/// # Example
///
/// ```rust,ignore
/// let block = memory.allocate(8 * 1024, "SystemManager")?;
/// let mut arena = LinearArena::new(block);
///
/// let region = arena.reserve(64, 8)?;
/// arena.reset();
/// ```
#[derive(Debug)]
pub struct LinearArena {
    /// The backing block.
    block: MemoryBlock,
    /// Current allocation offset.
    offset: usize,
    /// Number of live reservations.
    reservations: usize,
}

impl LinearArena {
    /// Creates an arena spanning the whole `block`.
    #[must_use]
    pub const fn new(block: MemoryBlock) -> Self {
        Self {
            block,
            offset: 0,
            reservations: 0,
        }
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.block.size()
    }

    /// Returns the current used space in bytes, including alignment padding.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity() - self.used()
    }

    /// Returns the number of reservations since the last reset.
    #[inline]
    #[must_use]
    pub const fn reservations(&self) -> usize {
        self.reservations
    }

    /// Reserves `size` bytes aligned to `align`.
    ///
    /// # Returns
    ///
    /// The reserved region, or None if out of space.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two.
    pub fn reserve(&mut self, size: usize, align: usize) -> Option<ArenaRegion> {
        assert!(align.is_power_of_two(), "Alignment must be a power of two");

        let base = self.block.address();
        let current = base + self.offset;
        let aligned = (current + align - 1) & !(align - 1);
        let new_offset = aligned - base + size;

        if new_offset > self.capacity() {
            return None;
        }

        self.offset = new_offset;
        self.reservations += 1;

        Some(ArenaRegion {
            address: aligned,
            size,
        })
    }

    /// Resets the arena, invalidating all previous reservations.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
        self.reservations = 0;
    }

    /// Gives the backing block back.
    #[must_use]
    pub fn into_block(self) -> MemoryBlock {
        self.block
    }
}
