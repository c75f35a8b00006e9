//! Small typed event fan-out.
//!
//! Renderer modules and the document surface both need "subscribe and get
//! every later event" semantics without holding locks across awaits. An
//! [`Emitter`] keeps a list of channel senders; dropping an [`EventStream`]
//! unsubscribes the listener on the next fire.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Hands out [`EventStream`]s and broadcasts cloned events to all of them.
pub struct Emitter<T> {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a listener. Events fired before this call are not replayed.
    pub fn subscribe(&self) -> EventStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.lock().unwrap().push(tx);
        EventStream { rx }
    }

    /// Number of listeners still holding their stream.
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

impl<T: Clone> Emitter<T> {
    /// Deliver `event` to every live listener, pruning dropped ones.
    pub fn fire(&self, event: T) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a subscription. Drop it to unsubscribe.
pub struct EventStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> EventStream<T> {
    /// Wait for the next event. `None` once the emitter is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
