//! Round-robin address pools.
//!
//! A pool is an ordered, duplicate-free list of addresses. Selection walks
//! the list circularly. The cursor is atomic so that selection only needs
//! shared access to the pool: concurrent readers may skip or repeat an
//! address under contention, but never read outside the list.

use std::sync::atomic::{AtomicUsize, Ordering};

/// An ordered set of addresses with round-robin selection.
#[derive(Debug, Default)]
pub struct AddressPool {
    addresses: Vec<String>,
    cursor: AtomicUsize,
}

impl AddressPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an address unless it is already a member.
    pub fn add_address(&mut self, addr: &str) {
        if self.addresses.iter().any(|a| a == addr) {
            return;
        }

        self.addresses.push(addr.to_string());
    }

    /// Remove an address if present.
    ///
    /// The last member takes the removed slot, so ordering among the
    /// remaining members changes. The cursor restarts at zero.
    pub fn remove_address(&mut self, addr: &str) {
        let Some(idx) = self.addresses.iter().position(|a| a == addr) else {
            return;
        };

        self.addresses.swap_remove(idx);
        *self.cursor.get_mut() = 0;
    }

    /// Advance the cursor and return the address it lands on.
    ///
    /// Returns `None` when the pool is empty.
    pub fn next(&self) -> Option<&str> {
        let len = self.addresses.len();
        if len == 0 {
            return None;
        }

        let step = self
            .cursor
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);

        self.addresses.get(step % len).map(String::as_str)
    }

    /// Current members in selection order.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// True if the pool has no members.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(addrs: &[&str]) -> AddressPool {
        let mut pool = AddressPool::new();
        for addr in addrs {
            pool.add_address(addr);
        }
        pool
    }

    #[test]
    fn test_next_cycles_through_all_members() {
        let pool = pool_of(&["a", "b", "c"]);

        let first: Vec<&str> = (0..3).filter_map(|_| pool.next()).collect();
        let second: Vec<&str> = (0..3).filter_map(|_| pool.next()).collect();

        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_next_advances_before_reading() {
        let pool = pool_of(&["a", "b", "c"]);

        assert_eq!(pool.next(), Some("b"));
        assert_eq!(pool.next(), Some("c"));
        assert_eq!(pool.next(), Some("a"));
    }

    #[test]
    fn test_next_on_empty_pool() {
        let pool = AddressPool::new();
        assert_eq!(pool.next(), None);
        assert_eq!(pool.next(), None);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut pool = pool_of(&["a", "b"]);
        pool.add_address("a");

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.addresses(), ["a", "b"]);
    }

    #[test]
    fn test_remove_swaps_last_into_place() {
        let mut pool = pool_of(&["a", "b", "c", "d"]);
        pool.remove_address("b");

        assert_eq!(pool.addresses(), ["a", "d", "c"]);
    }

    #[test]
    fn test_remove_resets_cursor() {
        let mut pool = pool_of(&["a", "b", "c"]);
        pool.next();
        pool.next();

        pool.remove_address("c");

        // cursor is back at 0, so the next step lands on index 1
        assert_eq!(pool.next(), Some("b"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut pool = pool_of(&["a"]);
        pool.remove_address("z");
        assert_eq!(pool.addresses(), ["a"]);

        let mut empty = AddressPool::new();
        empty.remove_address("z");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_remove_last_member_leaves_empty_pool() {
        let mut pool = pool_of(&["a"]);
        pool.remove_address("a");

        assert!(pool.is_empty());
        assert_eq!(pool.next(), None);

        pool.add_address("b");
        assert_eq!(pool.next(), Some("b"));
    }

    #[test]
    fn test_single_member_always_selected() {
        let pool = pool_of(&["only"]);
        for _ in 0..5 {
            assert_eq!(pool.next(), Some("only"));
        }
    }
}
