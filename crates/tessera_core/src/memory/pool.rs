//! # Pool Allocator
//!
//! Fixed-slot allocator over a block reserved from global memory. Every slot
//! has a stable address inside the block, which is what entity containers
//! use to route a free back to the owning chunk.

use super::global::MemoryBlock;

/// A pool allocator for fixed-size objects laid out over one [`MemoryBlock`].
///
/// Objects can be allocated and freed individually. Freed slots go onto a
/// LIFO free list, so the most recently freed slot is handed out next.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let block = memory.allocate(PoolAllocator::<Particle>::block_size(1024), "particles")?;
/// let mut pool = PoolAllocator::new(block, 1024);
///
/// let handle = pool.allocate(Particle::default()).ok()?;
/// let address = pool.address_of(handle);
/// pool.free(handle);
/// ```
#[derive(Debug)]
pub struct PoolAllocator<T> {
    /// The storage array.
    storage: Box<[Option<T>]>,
    /// Free list - indices of available slots.
    free_list: Vec<usize>,
    /// Number of allocated objects.
    allocated_count: usize,
    /// The block the slots are laid out over.
    block: MemoryBlock,
}

/// Handle to an allocated object in a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: usize,
}

impl PoolHandle {
    /// Index of the slot inside its pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> PoolAllocator<T> {
    /// Distance in bytes between two consecutive slots.
    pub const SLOT_STRIDE: usize = if std::mem::size_of::<T>() == 0 {
        1
    } else {
        std::mem::size_of::<T>()
    };

    /// Bytes of backing memory needed for `capacity` slots.
    #[inline]
    #[must_use]
    pub const fn block_size(capacity: usize) -> usize {
        Self::SLOT_STRIDE * capacity
    }

    /// Creates a pool of `capacity` slots over `block`.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or the block is too small for it.
    #[must_use]
    pub fn new(block: MemoryBlock, capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            block.size() >= Self::block_size(capacity),
            "Block too small for pool capacity"
        );

        let storage: Vec<Option<T>> = (0..capacity).map(|_| None).collect();

        // Reversed so the lowest slot is popped first
        let free_list: Vec<usize> = (0..capacity).rev().collect();

        Self {
            storage: storage.into_boxed_slice(),
            free_list,
            allocated_count: 0,
            block,
        }
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of currently allocated objects.
    #[inline]
    #[must_use]
    pub const fn allocated_count(&self) -> usize {
        self.allocated_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.allocated_count
    }

    /// First address of the managed block.
    #[inline]
    #[must_use]
    pub const fn first_address(&self) -> usize {
        self.block.address()
    }

    /// One past the last slot address.
    #[inline]
    #[must_use]
    pub fn end_address(&self) -> usize {
        self.first_address() + Self::block_size(self.capacity())
    }

    /// Address of the slot behind `handle`.
    #[inline]
    #[must_use]
    pub const fn address_of(&self, handle: PoolHandle) -> usize {
        self.block.address() + handle.index * Self::SLOT_STRIDE
    }

    /// Resolves a slot address back to a handle.
    ///
    /// # Returns
    ///
    /// None if the address is outside the pool or not on a slot boundary.
    #[must_use]
    pub fn handle_at(&self, address: usize) -> Option<PoolHandle> {
        let offset = address.checked_sub(self.first_address())?;
        if offset % Self::SLOT_STRIDE != 0 {
            return None;
        }
        let index = offset / Self::SLOT_STRIDE;
        (index < self.capacity()).then_some(PoolHandle { index })
    }

    /// Allocates a slot and stores the object.
    ///
    /// # Errors
    ///
    /// Gives the value back if the pool is full.
    pub fn allocate(&mut self, value: T) -> Result<PoolHandle, T> {
        let Some(index) = self.free_list.pop() else {
            return Err(value);
        };

        self.storage[index] = Some(value);
        self.allocated_count += 1;

        Ok(PoolHandle { index })
    }

    /// Frees an allocated object, moving it out of its slot.
    ///
    /// # Returns
    ///
    /// The freed object, or None if handle was invalid or the slot empty.
    pub fn free(&mut self, handle: PoolHandle) -> Option<T> {
        let value = self.storage.get_mut(handle.index)?.take()?;
        self.free_list.push(handle.index);
        self.allocated_count -= 1;

        Some(value)
    }

    /// Gets a reference to an allocated object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.storage.get(handle.index)?.as_ref()
    }

    /// Gets a mutable reference to an allocated object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.storage.get_mut(handle.index)?.as_mut()
    }

    /// Drops every allocated object and resets the free list.
    ///
    /// # Returns
    ///
    /// The number of objects dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.allocated_count;
        for slot in self.storage.iter_mut() {
            *slot = None;
        }
        self.free_list.clear();
        self.free_list.extend((0..self.capacity()).rev());
        self.allocated_count = 0;
        dropped
    }

    /// Drops every object and gives the backing block back.
    #[must_use]
    pub fn into_block(mut self) -> MemoryBlock {
        self.clear();
        self.block
    }

    /// Iterates over all allocated objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|v| (PoolHandle { index }, v)))
    }

    /// Iterates mutably over all allocated objects.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.storage
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_mut().map(|v| (PoolHandle { index }, v)))
    }
}
