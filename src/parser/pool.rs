//! Index-addressed object arena with bulk reset.
//!
//! AST nodes are never freed one by one: the parser clears its pools at
//! the start of every `parse` call and hands out recycled slots. A slot
//! is `reset` on allocation, so a failed parse can never leave stale
//! state visible to the next one.

pub(crate) trait Poolable: Default {
    fn reset(&mut self);
}

/// Growable arena of `T` with a reset cursor.
pub(crate) struct Pool<T: Poolable> {
    items: Vec<T>,
    pos: usize,
}

impl<T: Poolable> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut items = Vec::with_capacity(capacity);
        items.resize_with(capacity, T::default);
        Pool { items, pos: 0 }
    }

    /// Recycle every slot. O(1): slots reset lazily on reuse.
    pub fn clear(&mut self) {
        self.pos = 0;
    }

    /// Allocate the next slot and return its index.
    pub fn next(&mut self) -> usize {
        if self.pos == self.items.len() {
            self.items.push(T::default());
        }
        let index = self.pos;
        self.items[index].reset();
        self.pos += 1;
        index
    }

    pub fn get(&self, index: usize) -> &T {
        &self.items[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}
