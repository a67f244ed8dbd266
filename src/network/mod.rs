//! Node synchronization over publish/subscribe
//!
//! Nodes exchange whole chains and single transactions on two channels.
//! The transport is a trait; the in-process broker connects nodes that run
//! in one process.

pub mod node;
pub mod pubsub;
pub mod sync;

pub use node::Node;
pub use pubsub::{MemoryBroker, PubSub, CHAIN_CHANNEL, TRANSACTION_CHANNEL};
pub use sync::{NodeSync, SyncHandle};
