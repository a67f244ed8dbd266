use crate::error::{BlockchainError, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

/// Full chain JSON after every local chain change
pub const CHAIN_CHANNEL: &str = "BLOCKCHAIN";
/// One transaction JSON per accepted submission
pub const TRANSACTION_CHANNEL: &str = "TRANSACTION";

/// Fire-and-forget publish/subscribe transport. Every subscriber gets every
/// message published on its channel after it subscribed, in publish order.
pub trait PubSub: Send + Sync {
    /// Returns how many subscribers the message was delivered to.
    fn publish(&self, channel: &str, message: &str) -> Result<usize>;
    fn subscribe(&self, channel: &str) -> Result<Receiver<String>>;
}

/// In-process broker. Nodes that share one broker see each other's messages,
/// including their own.
#[derive(Default)]
pub struct MemoryBroker {
    inner: Mutex<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    closed: bool,
    subscribers: HashMap<String, Vec<Sender<String>>>,
}

impl MemoryBroker {
    pub fn new() -> MemoryBroker {
        MemoryBroker::default()
    }

    /// Disconnect every subscriber. Listener loops end once they drain their
    /// queues, and later publishes fail.
    pub fn close(&self) {
        match self.inner.lock() {
            Ok(mut state) => {
                state.closed = true;
                state.subscribers.clear();
                info!("Message broker closed");
            }
            Err(_) => log::error!("Failed to acquire lock on message broker"),
        }
    }
}

impl PubSub for MemoryBroker {
    fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| BlockchainError::Network("message broker lock poisoned".to_string()))?;
        if state.closed {
            return Err(BlockchainError::Network("message broker is closed".to_string()));
        }

        let Some(subscribers) = state.subscribers.get_mut(channel) else {
            return Ok(0);
        };
        // Dropped receivers are pruned on the next publish.
        subscribers.retain(|sender| sender.send(message.to_string()).is_ok());
        debug!(
            "Published {} bytes on {channel} to {} subscribers",
            message.len(),
            subscribers.len()
        );
        Ok(subscribers.len())
    }

    fn subscribe(&self, channel: &str) -> Result<Receiver<String>> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| BlockchainError::Network("message broker lock poisoned".to_string()))?;
        if state.closed {
            return Err(BlockchainError::Network("message broker is closed".to_string()));
        }

        let (sender, receiver) = mpsc::channel();
        state
            .subscribers
            .entry(channel.to_string())
            .or_default()
            .push(sender);
        Ok(receiver)
    }
}
