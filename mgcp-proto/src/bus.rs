//! Subject/observer broadcast bus (§4.1, §5).
//!
//! `notify` snapshots the observer list before fan-out, so observers added or removed from within
//! a callback never affect the in-flight broadcast, and a reentrant `notify` from inside an
//! observer starts a fresh snapshot of the then-current set. This mirrors the teacher's
//! `RwLock`-guarded shared state: readers (fan-out) never block writers (`observe`/`forget`) for
//! longer than a clone of the `Vec`.

use std::fmt;
use std::sync::{Arc, RwLock};

use crate::message::MessageDirection;

/// Receives messages fanned out by a `Bus`.
pub trait Observer<M>: Send + Sync {
    fn notify(&self, message: &M, direction: MessageDirection);
}

/// Registration handle returned by `Bus::observe`. Dropping it does not deregister; call
/// `Bus::forget` explicitly (scoped deregistration is the caller's responsibility, per §9's
/// redesign note on breaking the observer/subject cycle).
pub type ObserverId = u64;

struct Entry<M> {
    id: ObserverId,
    observer: Arc<dyn Observer<M>>,
}

impl<M> Clone for Entry<M> {
    fn clone(&self) -> Self {
        Entry { id: self.id, observer: self.observer.clone() }
    }
}

/// A registration/broadcast bus generic over the message type it carries. Used both by the
/// transactional mediator (fanning out responses) and the endpoint facade (fanning out `NTFY`
/// requests).
pub struct Bus<M> {
    observers: RwLock<Vec<Entry<M>>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl<M> fmt::Debug for Bus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus").field("observer_count", &self.observers.read().unwrap().len()).finish()
    }
}

impl<M> Default for Bus<M> {
    fn default() -> Self {
        Self { observers: RwLock::new(Vec::new()), next_id: std::sync::atomic::AtomicU64::new(0) }
    }
}

impl<M> Bus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Returns an id that can later be passed to `forget`.
    pub fn observe(&self, observer: Arc<dyn Observer<M>>) -> ObserverId {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.observers.write().unwrap().push(Entry { id, observer });
        id
    }

    /// Deregisters a previously registered observer. No-op if already forgotten.
    pub fn forget(&self, id: ObserverId) {
        self.observers.write().unwrap().retain(|e| e.id != id);
    }

    /// Invokes every currently-registered observer exactly once, in registration order, using a
    /// snapshot taken at the start of the call. An observer that panics is logged and does not
    /// prevent delivery to the rest.
    pub fn notify(&self, message: &M, direction: MessageDirection) {
        let snapshot: Vec<Entry<M>> = self.observers.read().unwrap().clone();
        for entry in snapshot {
            let observer = entry.observer.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer.notify(message, direction);
            }));
            if let Err(_panic) = result {
                tracing::error!(observer_id = entry.id, "observer panicked during notify; dropping its error");
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);
    impl Observer<u32> for Counting {
        fn notify(&self, _message: &u32, _direction: MessageDirection) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct OrderRecording(Arc<std::sync::Mutex<Vec<u32>>>, u32);
    impl Observer<u32> for OrderRecording {
        fn notify(&self, _message: &u32, _direction: MessageDirection) {
            self.0.lock().unwrap().push(self.1);
        }
    }

    #[test]
    fn notifies_every_registered_observer_once() {
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.observe(Arc::new(Counting(count.clone())));
        bus.observe(Arc::new(Counting(count.clone())));
        bus.notify(&42, MessageDirection::Outgoing);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn preserves_registration_order() {
        let bus = Bus::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            bus.observe(Arc::new(OrderRecording(order.clone(), i)));
        }
        bus.notify(&1, MessageDirection::Incoming);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn forget_removes_observer() {
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let id = bus.observe(Arc::new(Counting(count.clone())));
        bus.forget(id);
        bus.notify(&1, MessageDirection::Outgoing);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    struct InlineForgetter<'a>(&'a Bus<u32>, ObserverId, Arc<AtomicUsize>);
    impl<'a> Observer<u32> for InlineForgetter<'a> {
        fn notify(&self, _message: &u32, _direction: MessageDirection) {
            self.0.forget(self.1);
            self.2.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn mutation_during_notify_does_not_affect_in_flight_fanout() {
        let bus: Bus<u32> = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let victim_id = bus.observe(Arc::new(Counting(count.clone())));
        bus.observe(Arc::new(InlineForgetter(&bus, victim_id, count.clone())));
        bus.notify(&1, MessageDirection::Outgoing);
        // Both the victim and the forgetter ran during this fan-out, since the snapshot was taken
        // before either ran.
        assert_eq!(count.load(Ordering::SeqCst), 2);
        // A second notify no longer reaches the forgotten observer.
        bus.notify(&1, MessageDirection::Outgoing);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
