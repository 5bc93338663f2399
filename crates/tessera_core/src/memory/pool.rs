//! # Slot Pool
//!
//! Chunked, growable allocator for fixed-size slots.
//!
//! Every slot is either free (and then holds the index of the next free slot,
//! forming an embedded free list) or occupied by one value. Storage is a list
//! of boxed chunks: growth appends a chunk and never moves an existing one, so
//! an index handed out before growth stays valid after it.
//!
//! Each slot also carries a generation counter that is bumped on every
//! deallocation. A [`PoolHandle`] remembers the generation it was issued
//! with, which makes a handle to a freed (or freed and reused) slot detectable.

/// Default number of slots per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Handle to an allocated slot in a pool.
///
/// - `index`: stable position of the slot across pool growth
/// - `generation`: value of the slot generation when the handle was issued
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index into the pool.
    index: u32,
    /// Generation the slot had when this handle was issued.
    generation: u32,
}

impl PoolHandle {
    /// Null/invalid handle. Never resolves in any pool.
    pub const NULL: Self = Self {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Creates a handle from an index and a generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation this handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.index == u32::MAX && self.generation == u32::MAX
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Slot state: a link in the free list, or a stored value.
enum Slot<T> {
    Free { next: Option<u32> },
    Occupied(T),
}

struct Entry<T> {
    generation: u32,
    slot: Slot<T>,
}

/// A chunked pool of fixed-size slots.
///
/// - `allocate`: O(1) amortized; pops the free list, growing by one chunk
///   when the list is empty
/// - `deallocate`: O(1); drops the value and pushes the slot on the free
///   list (LIFO, the most recently freed slot is reused first)
/// - access: O(1) by handle (generation checked) or by raw index
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust
/// use tessera_core::memory::SlotPool;
///
/// let mut pool: SlotPool<u32> = SlotPool::new(64);
/// let handle = pool.allocate(42);
/// assert_eq!(pool.get(handle), Some(&42));
///
/// assert_eq!(pool.deallocate(handle), Some(42));
/// assert!(pool.get(handle).is_none());
/// ```
pub struct SlotPool<T> {
    /// Fixed-size chunks; appended on growth, never relocated.
    chunks: Vec<Box<[Entry<T>]>>,
    /// Slots per chunk.
    chunk_size: usize,
    /// First slot of the embedded free list.
    free_head: Option<u32>,
    /// Number of occupied slots.
    allocated_count: usize,
}

impl<T> SlotPool<T> {
    /// Creates an empty pool. No chunk is allocated until the first
    /// allocation.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero or does not fit the `u32` index space.
    #[must_use]
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Chunk size must be greater than zero");
        assert!(
            u32::try_from(chunk_size).is_ok(),
            "Chunk size cannot exceed u32::MAX"
        );

        Self {
            chunks: Vec::new(),
            chunk_size,
            free_head: None,
            allocated_count: 0,
        }
    }

    /// Returns the number of slots per chunk.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the number of chunks grown so far.
    #[inline]
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns the total number of slots, free or occupied.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    /// Returns the number of occupied slots.
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

    /// Returns `true` if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Stores `value` in a free slot and returns its handle.
    ///
    /// Grows the pool by one chunk if the free list is empty. Previously
    /// issued handles and indices are never invalidated by growth.
    pub fn allocate(&mut self, value: T) -> PoolHandle {
        let index = match self.free_head {
            Some(index) => index,
            None => self.grow(),
        };

        let slot = index as usize;
        let entry = &mut self.chunks[slot / self.chunk_size][slot % self.chunk_size];
        let next = match entry.slot {
            Slot::Free { next } => next,
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        };

        entry.slot = Slot::Occupied(value);
        self.free_head = next;
        self.allocated_count += 1;

        PoolHandle::new(index, entry.generation)
    }

    /// Frees a slot, returning the value it held.
    ///
    /// The slot generation is bumped, so `handle` (and every copy of it)
    /// stops resolving. Returns `None` if the handle is null, stale, or
    /// points at a free slot.
    pub fn deallocate(&mut self, handle: PoolHandle) -> Option<T> {
        let slot = handle.index as usize;
        let entry = self
            .chunks
            .get_mut(slot / self.chunk_size)?
            .get_mut(slot % self.chunk_size)?;

        if entry.generation != handle.generation || !matches!(entry.slot, Slot::Occupied(_)) {
            return None;
        }

        let previous = std::mem::replace(
            &mut entry.slot,
            Slot::Free {
                next: self.free_head,
            },
        );
        entry.generation = entry.generation.wrapping_add(1);
        self.free_head = Some(handle.index);
        self.allocated_count -= 1;

        match previous {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Checks if `handle` refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: PoolHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to the value behind `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        let entry = self.entry(handle.index)?;
        match &entry.slot {
            Slot::Occupied(value) if entry.generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Gets a mutable reference to the value behind `handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        let entry = self.entry_mut(handle.index)?;
        match &mut entry.slot {
            Slot::Occupied(value) if entry.generation == handle.generation => Some(value),
            _ => None,
        }
    }

    /// Gets the value stored at a raw index, whatever its generation.
    ///
    /// Returns `None` if the slot is free or out of range.
    #[inline]
    #[must_use]
    pub fn get_at(&self, index: u32) -> Option<&T> {
        match &self.entry(index)?.slot {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Gets the value stored at a raw index mutably, whatever its generation.
    #[inline]
    pub fn get_at_mut(&mut self, index: u32) -> Option<&mut T> {
        match &mut self.entry_mut(index)?.slot {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        }
    }

    /// Returns the current handle of an occupied slot.
    #[inline]
    #[must_use]
    pub fn handle_at(&self, index: u32) -> Option<PoolHandle> {
        let entry = self.entry(index)?;
        match entry.slot {
            Slot::Occupied(_) => Some(PoolHandle::new(index, entry.generation)),
            Slot::Free { .. } => None,
        }
    }

    /// Drops every stored value and links all slots back into the free list.
    ///
    /// Chunks are kept. Generations of occupied slots are bumped, so every
    /// handle issued before the call stops resolving.
    pub fn clear(&mut self) {
        let capacity = self.capacity();
        let mut next = 0usize;

        for entry in self.chunks.iter_mut().flat_map(|chunk| chunk.iter_mut()) {
            if matches!(entry.slot, Slot::Occupied(_)) {
                entry.generation = entry.generation.wrapping_add(1);
            }
            next += 1;
            entry.slot = Slot::Free {
                next: (next < capacity).then_some(next as u32),
            };
        }

        self.free_head = (capacity > 0).then_some(0);
        self.allocated_count = 0;
    }

    /// Iterates over all occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.iter())
            .enumerate()
            .filter_map(|(index, entry)| match &entry.slot {
                Slot::Occupied(value) => {
                    Some((PoolHandle::new(index as u32, entry.generation), value))
                }
                Slot::Free { .. } => None,
            })
    }

    /// Iterates mutably over all occupied slots in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> {
        self.chunks
            .iter_mut()
            .flat_map(|chunk| chunk.iter_mut())
            .enumerate()
            .filter_map(|(index, entry)| {
                let generation = entry.generation;
                match &mut entry.slot {
                    Slot::Occupied(value) => Some((PoolHandle::new(index as u32, generation), value)),
                    Slot::Free { .. } => None,
                }
            })
    }

    /// Appends one chunk and links its slots into the free list.
    ///
    /// Returns the index of the first new slot, which becomes the free head.
    fn grow(&mut self) -> u32 {
        let base = self.capacity();
        let end = base + self.chunk_size;
        assert!(
            end <= u32::MAX as usize,
            "Slot pool exhausted the u32 index space"
        );

        let tail = self.free_head;
        let chunk: Box<[Entry<T>]> = (base..end)
            .map(|index| Entry {
                generation: 0,
                slot: Slot::Free {
                    next: if index + 1 < end {
                        Some((index + 1) as u32)
                    } else {
                        tail
                    },
                },
            })
            .collect();

        self.chunks.push(chunk);
        self.free_head = Some(base as u32);

        tracing::trace!(
            chunks = self.chunks.len(),
            capacity = end,
            "slot pool grew by one chunk"
        );

        base as u32
    }

    #[inline]
    fn entry(&self, index: u32) -> Option<&Entry<T>> {
        let index = index as usize;
        self.chunks
            .get(index / self.chunk_size)?
            .get(index % self.chunk_size)
    }

    #[inline]
    fn entry_mut(&mut self, index: u32) -> Option<&mut Entry<T>> {
        let index = index as usize;
        self.chunks
            .get_mut(index / self.chunk_size)?
            .get_mut(index % self.chunk_size)
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}
