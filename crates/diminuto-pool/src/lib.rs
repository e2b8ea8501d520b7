//! FIFO of reusable [`diminuto_list`] nodes, amortizing allocation of
//! fixed-size, pool-managed objects.
//!
//! A node resident in a pool always carries an empty payload; whatever value
//! it held before being returned to the pool is dropped at `put` time. `get`
//! hands back an empty node — either one recycled from the free ring, or a
//! freshly heap-allocated one if the ring was empty — and it is up to the
//! caller (`diminuto-record`'s `Segment`, for instance) to populate the
//! payload.

use diminuto_list::{self as list, Handle};
use parking_lot::Mutex;

struct Inner<T> {
    root: Handle<T>,
    len: usize,
}

/// A mutex-serialized free list of `Handle<T>` nodes.
pub struct Pool<T> {
    inner: Mutex<Inner<T>>,
    /// Advisory per-node size the caller configured at `Pool::new`. Never
    /// inspected by the pool itself; callers (e.g. `segmentAllocate`) use it
    /// as a default allocation size.
    pub object_size: usize,
}

// SAFETY: all access to `Handle<T>` pointers goes through the pool's mutex;
// no two threads ever dereference a node concurrently.
unsafe impl<T: Send> Send for Pool<T> {}
unsafe impl<T: Send> Sync for Pool<T> {}

impl<T> Pool<T> {
    /// Establishes an empty pool. `object_size` is carried as a convenience
    /// default for callers that allocate fixed-size payloads; the pool
    /// itself does not use it.
    pub fn new(object_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: Handle::singleton(None),
                len: 0,
            }),
            object_size,
        }
    }

    /// Pre-loads the pool from externally supplied (already singleton)
    /// nodes. Any payload the nodes carry is dropped, matching `put`'s
    /// behavior for consistency.
    pub fn populate(&self, nodes: impl IntoIterator<Item = Handle<T>>) {
        let mut inner = self.inner.lock();
        for node in nodes {
            node.set_payload(None);
            let tail = list::previous(inner.root);
            list::insert_after(tail, node);
            inner.len += 1;
        }
    }

    /// Returns a node from the pool, or allocates a new empty one from the
    /// heap if the pool is exhausted. Only returns `None` if the system
    /// allocator itself reports failure through a fallible path; Rust's
    /// default global allocator aborts the process on OOM instead, so in
    /// practice this always returns `Some`.
    pub fn get(&self) -> Option<Handle<T>> {
        let mut inner = self.inner.lock();
        if let Some(node) = list::first(inner.root) {
            list::remove(node);
            inner.len -= 1;
            return Some(node);
        }
        drop(inner);
        Some(Handle::singleton(None))
    }

    /// Removes `node` from whatever list it is currently on, drops its
    /// payload, and enqueues it at the tail of the free ring.
    pub fn put(&self, node: Handle<T>) {
        list::remove(node);
        node.set_payload(None);

        let mut inner = self.inner.lock();
        let tail = list::previous(inner.root);
        list::insert_after(tail, node);
        inner.len += 1;
    }

    /// Number of nodes currently resident in the pool.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and deallocates every node currently in the pool.
    pub fn fini(&self) {
        let mut inner = self.inner.lock();
        while let Some(node) = list::first(inner.root) {
            list::remove(node);
            node.into_payload();
            inner.len -= 1;
        }
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.fini();
        let root = self.inner.lock().root;
        root.into_payload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_populate_get_put() {
        let pool: Pool<u32> = Pool::new(8);
        let nodes: Vec<_> = (0..10).map(|_| Handle::singleton(Some(0))).collect();
        pool.populate(nodes);
        assert_eq!(pool.len(), 10);

        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        let c = pool.get().unwrap();
        assert_eq!(pool.len(), 7);
        assert_ne!(a, b);
        assert_ne!(b, c);

        pool.put(a);
        pool.put(b);
        assert_eq!(pool.len(), 9);

        let d = pool.get().unwrap();
        assert!(d == a || d == b);

        assert_eq!(pool.len(), 8);

        pool.put(c);
        pool.put(d);
    }

    #[test]
    fn get_allocates_when_empty() {
        let pool: Pool<u32> = Pool::new(4);
        assert_eq!(pool.len(), 0);
        let n = pool.get().unwrap();
        assert_eq!(pool.len(), 0);
        pool.put(n);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn put_drops_prior_payload() {
        let pool: Pool<u32> = Pool::new(4);
        let n = Handle::singleton(Some(42));
        pool.put(n);
        let got = pool.get().unwrap();
        assert_eq!(got.payload(), None);
        pool.put(got);
    }

    proptest::proptest! {
        #[test]
        fn every_put_is_recoverable_by_get(n in 1usize..50) {
            let pool: Pool<u32> = Pool::new(4);
            let nodes: Vec<_> = (0..n).map(|_| pool.get().unwrap()).collect();
            for node in &nodes {
                pool.put(*node);
            }
            proptest::prop_assert_eq!(pool.len(), n);
            for _ in 0..n {
                proptest::prop_assert!(pool.get().is_some());
            }
            proptest::prop_assert_eq!(pool.len(), 0);
        }
    }
}
