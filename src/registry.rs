//! Session registry
//!
//! Maps each game room to exactly one live session and owns the async shell
//! around the synchronous engine: per-room serialization through a mutex,
//! alarm delivery after countdowns, and removal of stopped rooms.
//!
//! The engine itself never suspends. Countdowns are slept here, outside the
//! session lock, and delivered through [`Game::receive_alarm`], which
//! re-validates the session state before acting; a room stopped while a
//! countdown was in flight simply makes the alarm a no-op.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    game::{AlarmMessage, Game, IncomingMessage, Options},
    roster::Id,
    session::Tunnel,
};

/// Identifier of a game room (one per channel or socket group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room id from its external identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A room's session behind its per-room serialization lock
pub type SharedSession = Arc<Mutex<Game>>;

/// All live sessions, keyed by room
///
/// Cloning the registry is cheap and shares the underlying map, so every
/// front-end connection can hold its own handle. Sessions for different
/// rooms never contend with each other.
#[derive(Clone, Default)]
pub struct Registry {
    sessions: Arc<RwLock<HashMap<RoomId, SharedSession>>>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room's session, creating it if none exists
    ///
    /// Creation is atomic with respect to concurrent requests for the same
    /// room; at most one session per room can ever exist. The returned flag
    /// is `true` when this call created the session.
    pub async fn get_or_create(
        &self,
        room: RoomId,
        options: Options,
        host_id: Id,
    ) -> (SharedSession, bool) {
        if let Some(session) = self.sessions.read().await.get(&room) {
            return (Arc::clone(session), false);
        }

        let mut sessions = self.sessions.write().await;
        match sessions.entry(room) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                info!(room = %vacant.key(), "creating session");
                let session = Arc::new(Mutex::new(Game::new(options, host_id)));
                vacant.insert(Arc::clone(&session));
                (session, true)
            }
        }
    }

    /// Returns the room's live session, if any
    pub async fn get(&self, room: &RoomId) -> Option<SharedSession> {
        self.sessions.read().await.get(room).cloned()
    }

    /// Removes a room's session, returning whether one existed
    ///
    /// Called on explicit stop and by external idle detection when the room
    /// is empty.
    pub async fn remove(&self, room: &RoomId) -> bool {
        let removed = self.sessions.write().await.remove(room).is_some();
        if removed {
            info!(%room, "removed session");
        }
        removed
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Routes a participant's message to their room's session
    ///
    /// Holds the room's lock for the duration of the synchronous state
    /// transition only; countdowns the engine requests are handed to
    /// [`Registry::schedule_alarm`] and slept on a separate task. A session
    /// that stopped as a result of the message is removed from the registry.
    pub async fn dispatch_message<T, F>(
        &self,
        room: &RoomId,
        sender: Id,
        message: IncomingMessage,
        tunnel_finder: F,
    ) where
        T: Tunnel,
        F: Fn(Id) -> Option<T> + Clone + Send + 'static,
    {
        let Some(session) = self.get(room).await else {
            debug!(%room, "message for a room with no session");
            return;
        };

        let mut game = session.lock().await;
        game.receive_message(
            sender,
            message,
            |alarm, delay| {
                self.schedule_alarm(room.clone(), alarm, delay, tunnel_finder.clone());
            },
            tunnel_finder.clone(),
        );

        if game.is_stopped() {
            drop(game);
            self.remove(room).await;
        }
    }

    /// Delivers an alarm to a room's session after a delay
    ///
    /// The sleep happens on its own task with no lock held. If the room's
    /// session is gone by the time the delay elapses, the alarm is dropped;
    /// otherwise the engine re-validates it against the current state.
    pub fn schedule_alarm<T, F>(
        &self,
        room: RoomId,
        alarm: AlarmMessage,
        delay: web_time::Duration,
        tunnel_finder: F,
    ) where
        T: Tunnel,
        F: Fn(Id) -> Option<T> + Send + 'static,
    {
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let session = sessions.read().await.get(&room).cloned();
            let Some(session) = session else {
                warn!(%room, "dropping alarm for a removed session");
                return;
            };

            session.lock().await.receive_alarm(alarm, tunnel_finder);
        });
    }
}
