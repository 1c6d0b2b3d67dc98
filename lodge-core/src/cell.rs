use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Single-slot "latest value" cell. Every write replaces the slot; readers only
/// ever see the most recent value.
#[derive(Debug, Clone)]
pub struct LatestCell<T> {
    tx: Arc<watch::Sender<T>>,
    writes: Arc<AtomicU64>,
}

impl<T: Clone> LatestCell<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self {
            tx: Arc::new(tx),
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    /// Writes `value` only when `predicate` accepts the current one.
    /// Returns whether the slot was written.
    pub fn set_if(&self, value: T, predicate: impl FnOnce(&T) -> bool) -> bool {
        let written = self.tx.send_if_modified(|current| {
            if predicate(current) {
                *current = value;
                true
            } else {
                false
            }
        });
        if written {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        written
    }

    /// Number of writes accepted so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let cell = LatestCell::new(0u32);
        cell.set(3);
        cell.set(1);
        assert_eq!(cell.get(), 1);
        assert_eq!(cell.writes(), 2);
    }

    #[test]
    fn test_set_if_rejected_write_is_not_counted() {
        let cell = LatestCell::new(false);
        assert!(cell.set_if(true, |current| !*current));
        assert!(!cell.set_if(true, |current| !*current));
        assert!(cell.get());
        assert_eq!(cell.writes(), 1);
    }

    #[tokio::test]
    async fn test_receiver_observes_overwrite() {
        let cell = LatestCell::new("loading".to_string());
        let mut rx = cell.subscribe();
        cell.set("ready".to_string());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "ready");
    }
}
