use crossbeam::queue::SegQueue;
use std::sync::Arc;

pub use crate::sequencing::bit_pattern;

// Server events for audio -> UI communication
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    CounterChanged(u16),
    PlayStateChanged(bool),
    NoteTriggered { index: usize, duration: f32, time: f64 },
    NoteRejected { index: usize },
}

/// Lock-free event queue for audio -> UI communication
pub struct ServerEventQueue {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventQueue {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Get a handle for sending events (for audio thread)
    pub fn sender(&self) -> ServerEventSender {
        ServerEventSender {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Get a handle for receiving events (for UI thread)
    pub fn receiver(&self) -> ServerEventReceiver {
        ServerEventReceiver {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl Default for ServerEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender handle for audio thread
#[derive(Clone)]
pub struct ServerEventSender {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventSender {
    /// Non-blocking
    pub fn send(&self, event: ServerEvent) {
        self.queue.push(event);
    }
}

/// Receiver handle for UI thread
pub struct ServerEventReceiver {
    queue: Arc<SegQueue<ServerEvent>>,
}

impl ServerEventReceiver {
    /// Drain every pending event in the order it was sent
    pub fn process_events<F>(&self, mut handle_event: F)
    where
        F: FnMut(ServerEvent),
    {
        while let Some(event) = self.queue.pop() {
            handle_event(event);
        }
    }

    pub fn has_events(&self) -> bool {
        !self.queue.is_empty()
    }
}
