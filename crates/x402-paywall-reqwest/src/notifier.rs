//! Publishing completion events to interested observers.
//!
//! The interceptor emits a [`CompletionEvent`] after every paid request that
//! went through. Observers register with [`CompletionNotifier::subscribe`] and
//! stay registered until their [`Subscription`] is dropped or unsubscribed.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use x402_paywall_types::CompletionEvent;

#[cfg(feature = "telemetry")]
use tracing::{trace, warn};

type Observer = Arc<dyn Fn(&CompletionEvent) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: BTreeMap<u64, Observer>,
}

/// Fan-out of [`CompletionEvent`]s. Cheap to clone; clones share observers.
#[derive(Clone, Default)]
pub struct CompletionNotifier {
    observers: Arc<Mutex<Observers>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `observer`. It runs off the request path, on tokio's blocking
    /// pool, so it may block; events emitted concurrently can reach it in any order.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&CompletionEvent) + Send + Sync + 'static,
    {
        let mut observers = self.observers();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.entries.insert(id, Arc::new(observer));
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Registers an observer that forwards events into a channel.
    pub fn subscribe_channel(&self) -> (Subscription, mpsc::UnboundedReceiver<CompletionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Hands `event` to the observers registered right now and returns at once.
    ///
    /// Inside a tokio runtime the fan-out runs on the blocking pool. Outside of
    /// one there is nowhere to hand it off, so it runs on the calling thread.
    pub fn emit(&self, event: CompletionEvent) {
        let observers = self.snapshot();
        if observers.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || fan_out(&observers, &event));
            }
            Err(_) => fan_out(&observers, &event),
        }
    }

    /// Delivers `event` to every observer on the calling thread.
    pub fn deliver(&self, event: &CompletionEvent) {
        fan_out(&self.snapshot(), event);
    }

    pub fn observer_count(&self) -> usize {
        self.observers().entries.len()
    }

    fn snapshot(&self) -> Vec<Observer> {
        self.observers().entries.values().cloned().collect()
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A panicking observer is skipped; the others still get the event.
fn fan_out(observers: &[Observer], event: &CompletionEvent) {
    #[cfg(feature = "telemetry")]
    trace!(observers = observers.len(), nonce = %event.challenge.nonce, "Emitting completion event");
    for observer in observers {
        if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
            #[cfg(feature = "telemetry")]
            warn!(url = %event.url, "Completion observer panicked");
        }
    }
}

/// Handle to a registered observer. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    observers: std::sync::Weak<Mutex<Observers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self)
    }

    /// Keeps the observer registered for the lifetime of the notifier.
    pub fn detach(self) {
        std::mem::forget(self)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            let mut observers = observers.lock().unwrap_or_else(PoisonError::into_inner);
            observers.entries.remove(&self.id);
        }
    }
}
