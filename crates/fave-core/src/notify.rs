//! Change notification
//!
//! The store owns a [`ChangeNotifier`] and emits one [`ChangeEvent`] after
//! every mutation that changed state and was saved. Consumers register a
//! handler and get back a [`Subscription`]; the handler stays registered
//! until the subscription is unsubscribed or dropped.
//!
//! Delivery is synchronous and in registration order, so events for one
//! user arrive in the order the mutations were applied.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::models::ChangeEvent;

type Handler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

type SharedListeners = Arc<Mutex<Listeners>>;

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|e| e.into_inner())
}

/// Observer list for change events
#[derive(Default)]
pub struct ChangeNotifier {
    listeners: SharedListeners,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.handlers.push((id, Arc::new(handler)));

        Subscription {
            id: Some(id),
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Register a queue that receives a copy of every event
    pub fn subscribe_channel(&self) -> (Subscription, Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let subscription = self.subscribe(move |event| {
            // Receiver gone means nobody is listening anymore
            let _ = tx
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .send(event.clone());
        });
        (subscription, rx)
    }

    /// Deliver an event to every registered handler
    pub fn emit(&self, event: &ChangeEvent) {
        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<Handler> = lock(&self.listeners)
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).handlers.len()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a handler registered; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: Option<u64>,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the handler. Returns false if it was already gone.
    pub fn unsubscribe(mut self) -> bool {
        self.release()
    }

    /// Keep the handler registered for as long as the notifier lives
    pub fn detach(mut self) {
        self.id = None;
    }

    pub fn is_active(&self) -> bool {
        let Some(id) = self.id else {
            return false;
        };
        self.listeners
            .upgrade()
            .is_some_and(|listeners| lock(&listeners).handlers.iter().any(|(h, _)| *h == id))
    }

    fn release(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        let Some(listeners) = self.listeners.upgrade() else {
            return false;
        };

        let mut listeners = lock(&listeners);
        let before = listeners.handlers.len();
        listeners.handlers.retain(|(h, _)| *h != id);
        listeners.handlers.len() < before
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
