// MessageBus: control and event channels between controller and core
// Single Responsibility: channel creation, subscription and publishing

use std::sync::Mutex;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::ProtocolError;
use crate::protocol::{ControlAction, CoreEvent};

/// Buffer size of both channels
///
/// Control actions are rare (user clicks); events are at most one
/// notification per episode plus one stats update per flush.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Owns the inbound control channel and the outbound event broadcast
///
/// - Control: `mpsc`, many controller handles, one consumer (the service)
/// - Events: `broadcast`, one producer (the session), any number of listeners
pub struct MessageBus {
    control_tx: mpsc::Sender<ControlAction>,
    control_rx: Mutex<Option<mpsc::Receiver<ControlAction>>>,
    events_tx: broadcast::Sender<CoreEvent>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (control_tx, control_rx) = mpsc::channel(capacity);
        let (events_tx, _) = broadcast::channel(capacity);
        Self {
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
            events_tx,
        }
    }

    // ========================================================================
    // CONTROL CHANNEL
    // ========================================================================

    /// Handle for submitting actions to the core
    pub fn control_sender(&self) -> mpsc::Sender<ControlAction> {
        self.control_tx.clone()
    }

    /// Take the single consumer end of the control channel
    ///
    /// Returns `None` if the receiver was already taken.
    pub fn take_control_receiver(&self) -> Option<mpsc::Receiver<ControlAction>> {
        self.control_rx.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Decode a raw controller message and queue it
    ///
    /// # Returns
    /// The decoded action; decode errors are returned without queueing.
    pub async fn submit_json(&self, raw: &str) -> Result<ControlAction, ProtocolError> {
        let action = ControlAction::from_json(raw)?;
        if self.control_tx.send(action.clone()).await.is_err() {
            log::warn!(
                "[MessageBus] Control channel closed, dropping '{}'",
                action.name()
            );
        }
        Ok(action)
    }

    // ========================================================================
    // EVENT CHANNEL
    // ========================================================================

    /// Publish an event to every current subscriber
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: CoreEvent) -> usize {
        match self.events_tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                log::trace!("[MessageBus] No subscribers for {:?}", event);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events_tx.subscribe()
    }

    /// Subscribe as a stream; lagged messages are skipped
    pub fn event_stream(&self) -> impl Stream<Item = CoreEvent> {
        BroadcastStream::new(self.events_tx.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!("[MessageBus] Event subscriber lagged: {}", err);
                None
            }
        })
    }

    /// Publisher handle for components that outlive a borrow of the bus
    pub fn event_sender(&self) -> broadcast::Sender<CoreEvent> {
        self.events_tx.clone()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
