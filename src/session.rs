//! Client communication channel
//!
//! Defines the trait for tunneling messages between the session engine and
//! connected clients. The tunnel abstraction keeps the engine independent of
//! the transport; implementations might use WebSockets, Server-Sent Events,
//! or an in-process channel in tests.

use super::game::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Update messages notify clients about changes that affect their
    /// current view or state.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    ///
    /// Sync messages bring a client up to date with the current session
    /// state, typically when they connect or reconnect.
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    fn close(self);
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::{Arc, Mutex};

    use super::{SyncMessage, Tunnel, UpdateMessage};

    /// A tunnel that records everything sent through it
    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockTunnel {
        messages: Arc<Mutex<Vec<UpdateMessage>>>,
        states: Arc<Mutex<Vec<SyncMessage>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl MockTunnel {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn messages(&self) -> Vec<UpdateMessage> {
            self.messages.lock().unwrap().clone()
        }

        pub(crate) fn states(&self) -> Vec<SyncMessage> {
            self.states.lock().unwrap().clone()
        }

        pub(crate) fn is_closed(&self) -> bool {
            *self.closed.lock().unwrap()
        }

        pub(crate) fn clear(&self) {
            self.messages.lock().unwrap().clear();
            self.states.lock().unwrap().clear();
        }
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }

        fn send_state(&self, state: &SyncMessage) {
            self.states.lock().unwrap().push(state.clone());
        }

        fn close(self) {
            *self.closed.lock().unwrap() = true;
        }
    }
}
