use std::sync::{Arc, Mutex, PoisonError};

use readaloud_types::{ControlEvent, LifecycleEvent, PageText};

use crate::error::RelayError;

pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// Everything that moves over the bus: inbound control messages and
/// outbound lifecycle broadcasts share the one channel, as every context
/// sees every message and picks out its own.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Control(ControlEvent),
    Lifecycle(LifecycleEvent),
}

/// A direct answer to the sender of a single message.
#[derive(Debug)]
pub enum Reply {
    Ack { success: bool },
    PageText(PageText),
}

/// Single-shot responder carried inside a clone-able envelope. The first
/// context that answers consumes the sender; later answers are dropped.
#[derive(Clone)]
pub struct ReplySlot {
    tx: Arc<Mutex<Option<tokio::sync::oneshot::Sender<Reply>>>>,
}

impl ReplySlot {
    pub fn channel() -> (Self, tokio::sync::oneshot::Receiver<Reply>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn respond(&self, reply: Reply) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                if tx.send(reply).is_err() {
                    tracing::debug!("reply receiver already dropped");
                }
            }
            None => tracing::debug!("reply already sent"),
        }
    }
}

impl std::fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReplySlot")
    }
}

#[derive(Debug, Clone)]
pub struct Envelope {
    event: BusEvent,
    reply: Option<ReplySlot>,
}

impl Envelope {
    pub fn control(event: ControlEvent) -> Self {
        Self {
            event: BusEvent::Control(event),
            reply: None,
        }
    }

    pub fn lifecycle(event: LifecycleEvent) -> Self {
        Self {
            event: BusEvent::Lifecycle(event),
            reply: None,
        }
    }

    /// A control message whose sender wants a direct answer.
    pub fn request(event: ControlEvent) -> (Self, tokio::sync::oneshot::Receiver<Reply>) {
        let (slot, rx) = ReplySlot::channel();
        (
            Self {
                event: BusEvent::Control(event),
                reply: Some(slot),
            },
            rx,
        )
    }

    pub fn event(&self) -> &BusEvent {
        &self.event
    }

    pub fn ack(&self, success: bool) {
        self.respond(Reply::Ack { success });
    }

    pub fn respond(&self, reply: Reply) {
        if let Some(slot) = &self.reply {
            slot.respond(reply);
        }
    }
}

/// The host-provided broadcast channel all contexts attach to. Delivery
/// reaches only the listeners attached at send time; there is no queuing
/// and no retry, which is why the relay delays its forward after
/// provisioning a fresh context.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: tokio::sync::broadcast::Sender<Envelope>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Returns the number of listeners the message reached.
    pub fn send(&self, envelope: Envelope) -> Result<usize, RelayError> {
        self.tx.send(envelope).map_err(|_| RelayError::Forward)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
