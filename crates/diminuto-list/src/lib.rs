//! Intrusive circular doubly-linked list with root back-reference.
//!
//! A [`Handle<T>`] is the stable identity of a node: it never changes as the
//! node moves between lists, which is the load-bearing invariant the rest of
//! this workspace (`diminuto-pool`, `diminuto-record`) builds on. Handles are
//! heap addresses under the hood (`Box::into_raw`/`Box::from_raw`), never an
//! arena index, so callers may hold a `Handle<T>` across arbitrary list
//! mutations without it being invalidated.
//!
//! List operations never inspect `payload`; they only move `next`/`previous`/
//! `root` pointers around. Reading or writing the payload is a separate,
//! safe operation (`payload`/`payload_mut`).

use std::ptr::NonNull;

struct Node<T> {
    next: NonNull<Node<T>>,
    previous: NonNull<Node<T>>,
    root: NonNull<Node<T>>,
    payload: Option<T>,
}

/// Stable identity of a list node. Cheap to copy; does not imply ownership.
pub struct Handle<T>(NonNull<Node<T>>);

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Handle<T> {}
impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl<T> Eq for Handle<T> {}
impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:p})", self.0.as_ptr())
    }
}

impl<T> Handle<T> {
    /// Allocates a new node, singleton-rooted at itself, carrying `payload`.
    pub fn singleton(payload: Option<T>) -> Self {
        // SAFETY: we allocate the node with a temporary self-referencing
        // pointer, then immediately fix it up to point at the real address.
        let uninit = Box::new(Node {
            next: NonNull::dangling(),
            previous: NonNull::dangling(),
            root: NonNull::dangling(),
            payload,
        });
        let ptr = NonNull::from(Box::leak(uninit));
        // SAFETY: ptr was just allocated and is uniquely owned here.
        unsafe {
            let node = &mut *ptr.as_ptr();
            node.next = ptr;
            node.previous = ptr;
            node.root = ptr;
        }
        Handle(ptr)
    }

    /// SAFETY: the caller asserts `self` is not aliased by any other live
    /// reference obtained through `payload`/`payload_mut` at the same time.
    unsafe fn node(&self) -> &Node<T> {
        self.0.as_ref()
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn node_mut_ref(&self) -> &mut Node<T> {
        &mut *self.0.as_ptr()
    }

    /// Reads the payload.
    ///
    /// The output lifetime is deliberately decoupled from `&self` — `Handle`
    /// is a `Copy` pointer, not a borrow, so its own stack lifetime says
    /// nothing about how long the heap node behind it stays valid. The real
    /// invariant callers must respect is the same one the rest of this
    /// module respects: a node stays valid until `into_payload` consumes it,
    /// and its payload stays put until the next `set_payload`/`put`. Callers
    /// must not retain the reference across a call that could replace or
    /// free the payload (`set_payload`, `Pool::put`, `into_payload`).
    pub fn payload<'a>(&self) -> Option<&'a T> {
        unsafe { self.0.as_ref().payload.as_ref() }
    }

    /// Mutates the payload. Same aliasing caveat as [`Handle::payload`].
    pub fn payload_mut<'a>(&self) -> Option<&'a mut T> {
        unsafe { (*self.0.as_ptr()).payload.as_mut() }
    }

    /// Overwrites the payload, returning the previous value.
    pub fn set_payload(&self, payload: Option<T>) -> Option<T> {
        unsafe { std::mem::replace(&mut self.node_mut_ref().payload, payload) }
    }

    /// Reclaims the heap allocation backing this node, returning its
    /// payload. The node must have been removed from every list (singleton)
    /// before calling this, or the surrounding ring is left dangling.
    pub fn into_payload(self) -> Option<T> {
        // SAFETY: Handle::singleton is the only constructor, so this pointer
        // always came from a `Box::into_raw` of the same layout.
        let boxed = unsafe { Box::from_raw(self.0.as_ptr()) };
        boxed.payload
    }
}

/// Makes `node` a singleton list rooted at itself. Equivalent to discarding
/// `node`'s prior linkage without freeing it.
pub fn init<T>(node: Handle<T>) {
    remove(node);
}

/// Splices `node` in immediately after `anchor`, first removing it from
/// whatever list it currently occupies. `node` inherits `anchor.root`.
pub fn insert_after<T>(anchor: Handle<T>, node: Handle<T>) {
    remove(node);

    unsafe {
        let anchor_next = anchor.node().next;
        let n = node.node_mut_ref();
        n.previous = anchor.0;
        n.next = anchor_next;
        n.root = anchor.node().root;

        (*anchor_next.as_ptr()).previous = node.0;
        anchor.node_mut_ref().next = node.0;
    }
}

/// Restores `node` to singleton-rooted-at-self state. Returns `true` if the
/// node was actually attached to something (a link was removed), `false` if
/// it was already a singleton (no-op).
pub fn remove<T>(node: Handle<T>) -> bool {
    unsafe {
        if node.node().next == node.0 {
            debug_assert_eq!(node.node().previous, node.0);
            return false;
        }

        let prev = node.node().previous;
        let next = node.node().next;

        (*prev.as_ptr()).next = next;
        (*next.as_ptr()).previous = prev;

        let n = node.node_mut_ref();
        n.next = node.0;
        n.previous = node.0;
        n.root = node.0;
    }
    true
}

/// The node representing the anchor of the list `node` belongs to.
pub fn root<T>(node: Handle<T>) -> Handle<T> {
    Handle(unsafe { node.node().root })
}

/// The node following `node` in its list (may be `node` itself if singleton).
pub fn next<T>(node: Handle<T>) -> Handle<T> {
    Handle(unsafe { node.node().next })
}

/// The node preceding `node` in its list.
pub fn previous<T>(node: Handle<T>) -> Handle<T> {
    Handle(unsafe { node.node().previous })
}

/// First member of the list rooted at `root`, or `None` if empty.
pub fn first<T>(root: Handle<T>) -> Option<Handle<T>> {
    let candidate = next(root);
    (candidate != root).then_some(candidate)
}

/// Last member of the list rooted at `root`, or `None` if empty.
pub fn last<T>(root: Handle<T>) -> Option<Handle<T>> {
    let candidate = previous(root);
    (candidate != root).then_some(candidate)
}

/// Walks forward from `start` (inclusive) until back at `start`, calling
/// `f(node, context)` at each step. Returns the first node for which `f`
/// returns `true`, or `None` if the traversal completes a full circle.
pub fn apply<T, C>(
    start: Handle<T>,
    mut f: impl FnMut(Handle<T>, &mut C) -> bool,
    context: &mut C,
) -> Option<Handle<T>> {
    let mut node = start;
    loop {
        if f(node, context) {
            return Some(node);
        }
        node = next(node);
        if node == start {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_is_self_rooted() {
        let n = Handle::<u32>::singleton(Some(7));
        assert_eq!(next(n), n);
        assert_eq!(previous(n), n);
        assert_eq!(root(n), n);
        assert_eq!(n.payload().copied(), Some(7));
        n.into_payload();
    }

    #[test]
    fn insert_after_links_and_inherits_root() {
        let r = Handle::<u32>::singleton(None);
        let a = Handle::singleton(Some(1));
        let b = Handle::singleton(Some(2));

        insert_after(r, a);
        insert_after(a, b);

        assert_eq!(first(r), Some(a));
        assert_eq!(last(r), Some(b));
        assert_eq!(next(a), b);
        assert_eq!(previous(b), a);
        assert_eq!(root(a), r);
        assert_eq!(root(b), r);

        remove(a);
        remove(b);
        r.into_payload();
        a.into_payload();
        b.into_payload();
    }

    #[test]
    fn remove_already_singleton_is_noop() {
        let n = Handle::<u32>::singleton(None);
        assert!(!remove(n));
        n.into_payload();
    }

    #[test]
    fn remove_reports_something_removed() {
        let r = Handle::<u32>::singleton(None);
        let a = Handle::singleton(Some(1));
        insert_after(r, a);
        assert!(remove(a));
        assert_eq!(next(a), a);
        r.into_payload();
        a.into_payload();
    }

    #[test]
    fn apply_finds_matching_node_and_stops() {
        let r = Handle::<u32>::singleton(None);
        let a = Handle::singleton(Some(1));
        let b = Handle::singleton(Some(2));
        let c = Handle::singleton(Some(3));
        insert_after(r, a);
        insert_after(a, b);
        insert_after(b, c);

        let mut visited = Vec::new();
        let found = apply(
            first(r).unwrap(),
            |node, visited: &mut Vec<u32>| {
                visited.push(*node.payload().unwrap());
                *node.payload().unwrap() == 2
            },
            &mut visited,
        );

        assert_eq!(found, Some(b));
        assert_eq!(visited, vec![1, 2]);

        for n in [a, b, c] {
            remove(n);
            n.into_payload();
        }
        r.into_payload();
    }

    proptest::proptest! {
        #[test]
        fn detached_node_is_always_self_rooted(v in proptest::prelude::any::<u32>()) {
            let n = Handle::singleton(Some(v));
            proptest::prop_assert_eq!(next(n), n);
            proptest::prop_assert_eq!(previous(n), n);
            proptest::prop_assert_eq!(root(n), n);
            n.into_payload();
        }
    }
}
