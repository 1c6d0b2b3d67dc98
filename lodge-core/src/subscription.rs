use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback a transport invokes for every delivery on a subscription.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

type Release = Box<dyn FnOnce() + Send>;

/// Handle for interest registered on a remote stream.
///
/// The release closure runs exactly once: on `unsubscribe`, or on drop if the
/// handle is discarded on an error path.
pub struct Subscription {
    topic: String,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            topic: topic.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A handle with nothing to release, for transports that keep no state.
    pub fn detached(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            release: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("Releasing subscription on {}", self.topic);
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Wraps `f` so deliveries are dropped once `live` is cleared.
///
/// Transports may still hold the callback after release and fire it late.
pub fn guarded<T, F>(live: &Arc<AtomicBool>, f: F) -> Callback<T>
where
    T: 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let live = Arc::clone(live);
    Arc::new(move |value: T| {
        if live.load(Ordering::Acquire) {
            f(value);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_release_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let sub = Subscription::new("presence-tickets-e1", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let counter = released.clone();
            let _sub = Subscription::new("capacity-P1", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guarded_callback_ignores_late_delivery() {
        let live = Arc::new(AtomicBool::new(true));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let cb: Callback<u32> = guarded(&live, move |v: u32| {
            counter.fetch_add(v as usize, Ordering::SeqCst);
        });

        cb(2);
        live.store(false, Ordering::Release);
        cb(5);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
