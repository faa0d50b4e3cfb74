//! Single-slot latest-value publication.
//!
//! Capture callbacks publish at their own rate and the UI polls whenever it
//! redraws; intermediate values are intentionally lost. Last-write-wins is
//! the contract, so this is an `ArcSwap`, not a queue.

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Lock-free cell holding the most recently published value.
#[derive(Debug)]
pub struct LatestCell<T> {
    slot: ArcSwap<T>,
}

impl<T> LatestCell<T> {
    /// Create a cell holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            slot: ArcSwap::from_pointee(initial),
        }
    }

    /// Replace the stored value. Any unread previous value is dropped.
    pub fn publish(&self, value: T) {
        self.slot.store(Arc::new(value));
    }

    /// Read the most recent value without blocking the publisher.
    pub fn load(&self) -> Arc<T> {
        self.slot.load_full()
    }
}

impl<T: Clone> LatestCell<T> {
    /// Clone the most recent value out of the cell.
    pub fn get(&self) -> T {
        (**self.slot.load()).clone()
    }
}

impl<T: Default> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_overwrites() {
        let cell = LatestCell::new(1u32);
        cell.publish(2);
        cell.publish(3);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn shared_across_threads() {
        let cell = Arc::new(LatestCell::new(0u64));
        let writer = Arc::clone(&cell);
        let handle = std::thread::spawn(move || {
            for i in 1..=100 {
                writer.publish(i);
            }
        });
        handle.join().unwrap();
        assert_eq!(cell.get(), 100);
    }
}
