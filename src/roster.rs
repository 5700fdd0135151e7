//! Participant tracking for a session
//!
//! Tracks every connection in a session together with its role: the host
//! that drives the game, the players that guess, and freshly connected
//! sockets that have not picked a role yet. Keeps a reverse mapping by role
//! so broadcasts and role counts stay cheap.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{
    game::{SyncMessage, UpdateMessage},
    session::Tunnel,
};

/// A unique identifier for a participant in a session
///
/// Ids persist for the lifetime of the connection and are how clients are
/// addressed in scoreboards, guesses, and outbound messages.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The role of a participant, with its associated data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A connection that has not been assigned a role yet
    Unassigned,
    /// The session host who controls the game flow
    Host,
    /// A player participating in the game
    Player(PlayerRole),
}

/// The role of a participant without its associated data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum RoleKind {
    /// An unassigned connection
    Unassigned,
    /// A session host
    Host,
    /// A player
    Player,
}

impl Role {
    /// The kind of this role without its associated data
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Unassigned => RoleKind::Unassigned,
            Role::Host => RoleKind::Host,
            Role::Player(_) => RoleKind::Player,
        }
    }
}

/// Player-specific data carried by [`Role::Player`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerRole {
    /// The player's display name
    pub name: String,
}

/// Serialization helper for [`Roster`]
#[derive(Deserialize)]
struct RosterSerde {
    mapping: HashMap<Id, Role>,
}

/// All participants of one session, indexed by id and by role
#[derive(Default, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    /// Primary mapping from participant id to role
    mapping: HashMap<Id, Role>,

    /// Reverse mapping by role kind (rebuilt on deserialization)
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<RoleKind, HashSet<Id>>,
}

impl From<RosterSerde> for Roster {
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde { mapping } = serde;
        let mut reverse_mapping: EnumMap<RoleKind, HashSet<Id>> = EnumMap::default();
        for (id, role) in &mapping {
            reverse_mapping[role.kind()].insert(*id);
        }
        Self {
            mapping,
            reverse_mapping,
        }
    }
}

/// Errors that can occur when adding participants
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of participants
    #[error("maximum number of players reached")]
    MaximumPlayers,
}

impl Roster {
    /// Creates a roster with the host already registered
    pub fn with_host_id(host_id: Id) -> Self {
        Self {
            mapping: {
                let mut map = HashMap::default();
                map.insert(host_id, Role::Host);
                map
            },
            reverse_mapping: {
                let mut map: EnumMap<RoleKind, HashSet<Id>> = EnumMap::default();
                map[RoleKind::Host].insert(host_id);
                map
            },
        }
    }

    /// All participants with active tunnels, as (id, tunnel, role) tuples
    pub fn vec<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T, Role)> {
        self.reverse_mapping
            .values()
            .flat_map(|v| v.iter())
            .filter_map(|x| match (tunnel_finder(*x), self.mapping.get(x)) {
                (Some(t), Some(v)) => Some((*x, t, v.to_owned())),
                _ => None,
            })
            .collect_vec()
    }

    /// The number of participants with a given role kind
    pub fn specific_count(&self, filter: RoleKind) -> usize {
        self.reverse_mapping[filter].len()
    }

    /// Registers a new participant
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaximumPlayers`] when the session is full.
    pub fn add(&mut self, id: Id, role: Role) -> Result<(), Error> {
        let kind = role.kind();

        if self.mapping.len() >= crate::constants::game::MAX_PLAYER_COUNT {
            return Err(Error::MaximumPlayers);
        }

        self.mapping.insert(id, role);
        self.reverse_mapping[kind].insert(id);

        Ok(())
    }

    /// Changes the role of an existing participant
    ///
    /// Moves the participant between role buckets when the kind changes.
    /// Unknown ids are ignored.
    pub fn update_role(&mut self, id: Id, role: Role) {
        let old_kind = match self.mapping.get(&id) {
            Some(v) => v.kind(),
            _ => return,
        };
        let new_kind = role.kind();
        if old_kind != new_kind {
            self.reverse_mapping[old_kind].remove(&id);
            self.reverse_mapping[new_kind].insert(id);
        }
        self.mapping.insert(id, role);
    }

    /// The role of a participant, if registered
    pub fn get_role(&self, id: Id) -> Option<Role> {
        self.mapping.get(&id).map(std::borrow::ToOwned::to_owned)
    }

    /// Whether a participant is registered
    pub fn contains(&self, id: Id) -> bool {
        self.mapping.contains_key(&id)
    }

    /// The display name of a participant, players only
    pub fn get_name(&self, id: Id) -> Option<String> {
        self.get_role(id).and_then(|v| match v {
            Role::Player(player) => Some(player.name),
            _ => None,
        })
    }

    /// The display names of all registered players, sorted for stable output
    pub fn player_names(&self) -> Vec<String> {
        self.reverse_mapping[RoleKind::Player]
            .iter()
            .filter_map(|id| self.get_name(*id))
            .sorted()
            .collect_vec()
    }

    /// Closes the tunnel of a departing participant
    pub fn remove_session<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, id: &Id, tunnel_finder: F) {
        if let Some(x) = tunnel_finder(*id) {
            x.close();
        }
    }

    /// Sends an update message to one participant
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(id) else {
            return;
        };

        session.send_message(message);
    }

    /// Sends a state synchronization message to one participant
    pub fn send_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &SyncMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(session) = tunnel_finder(id) else {
            return;
        };

        session.send_state(message);
    }

    /// Sends a personalized message to every participant
    ///
    /// The sender closure may return `None` to skip a participant.
    pub fn announce_with<S, T: Tunnel, F: Fn(Id) -> Option<T>>(&self, sender: S, tunnel_finder: F)
    where
        S: Fn(Id, RoleKind) -> Option<UpdateMessage>,
    {
        for (id, session, role) in self.vec(tunnel_finder) {
            let Some(message) = sender(id, role.kind()) else {
                continue;
            };

            session.send_message(&message);
        }
    }

    /// Broadcasts an update message to everyone except unassigned connections
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        self.announce_with(
            |_, role_kind| {
                if matches!(role_kind, RoleKind::Unassigned) {
                    None
                } else {
                    Some(message.to_owned())
                }
            },
            tunnel_finder,
        );
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_tunnel(_: Id) -> Option<crate::session::test_utils::MockTunnel> {
        None
    }

    #[test]
    fn with_host_registers_host() {
        let host = Id::new();
        let roster = Roster::with_host_id(host);

        assert!(roster.contains(host));
        assert_eq!(roster.get_role(host), Some(Role::Host));
        assert_eq!(roster.specific_count(RoleKind::Host), 1);
        assert_eq!(roster.specific_count(RoleKind::Player), 0);
    }

    #[test]
    fn role_update_moves_buckets() {
        let mut roster = Roster::default();
        let id = Id::new();

        roster.add(id, Role::Unassigned).unwrap();
        assert_eq!(roster.specific_count(RoleKind::Unassigned), 1);

        roster.update_role(
            id,
            Role::Player(PlayerRole {
                name: "Alice".to_owned(),
            }),
        );
        assert_eq!(roster.specific_count(RoleKind::Unassigned), 0);
        assert_eq!(roster.specific_count(RoleKind::Player), 1);
        assert_eq!(roster.get_name(id), Some("Alice".to_owned()));
    }

    #[test]
    fn update_unknown_id_is_ignored() {
        let mut roster = Roster::default();
        roster.update_role(Id::new(), Role::Host);
        assert_eq!(roster.specific_count(RoleKind::Host), 0);
    }

    #[test]
    fn player_names_are_sorted() {
        let mut roster = Roster::default();
        for name in ["carol", "alice", "bob"] {
            roster
                .add(
                    Id::new(),
                    Role::Player(PlayerRole {
                        name: name.to_owned(),
                    }),
                )
                .unwrap();
        }
        roster.add(Id::new(), Role::Host).unwrap();

        assert_eq!(roster.player_names(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn capacity_limit() {
        let mut roster = Roster::default();
        for _ in 0..crate::constants::game::MAX_PLAYER_COUNT {
            roster.add(Id::new(), Role::Unassigned).unwrap();
        }
        assert_eq!(
            roster.add(Id::new(), Role::Unassigned),
            Err(Error::MaximumPlayers)
        );
    }

    #[test]
    fn remove_session_closes_the_tunnel() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add(id, Role::Unassigned).unwrap();

        let tunnel = crate::session::test_utils::MockTunnel::new();
        let handle = tunnel.clone();
        roster.remove_session(&id, move |lookup| (lookup == id).then(|| handle.clone()));

        assert!(tunnel.is_closed());
    }

    #[test]
    fn serde_rebuilds_reverse_mapping() {
        let mut roster = Roster::default();
        let player = Id::new();
        roster
            .add(
                player,
                Role::Player(PlayerRole {
                    name: "Alice".to_owned(),
                }),
            )
            .unwrap();

        let serialized = serde_json::to_string(&roster).unwrap();
        let restored: Roster = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored.specific_count(RoleKind::Player), 1);
        assert_eq!(restored.get_name(player), Some("Alice".to_owned()));
        assert!(restored.vec(no_tunnel).is_empty());
    }
}
