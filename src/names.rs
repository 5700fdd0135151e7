//! Player name assignment
//!
//! Maintains the bidirectional mapping between player ids and display names
//! for one session. Names must be unique within the session, are trimmed and
//! filtered for inappropriate content, and players that never pick a name get
//! a generated pet-style one so the roster and result listings stay readable.

use std::collections::{HashMap, HashSet};

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::names::MAX_NAME_LENGTH;
use super::roster::Id;

/// Serialization helper for [`Names`]
#[derive(Deserialize)]
struct NamesSerde {
    mapping: HashMap<Id, String>,
}

/// Unique display names for the players of one session
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "NamesSerde")]
pub struct Names {
    /// Primary mapping from player id to name
    mapping: HashMap<Id, String>,

    /// Reverse mapping from name to player id (rebuilt on deserialization)
    #[serde(skip_serializing)]
    reverse_mapping: HashMap<String, Id>,
    /// All taken names, for uniqueness checks (rebuilt on deserialization)
    #[serde(skip_serializing)]
    existing: HashSet<String>,
}

impl From<NamesSerde> for Names {
    fn from(serde: NamesSerde) -> Self {
        let NamesSerde { mapping } = serde;
        let mut reverse_mapping = HashMap::new();
        let mut existing = HashSet::new();
        for (id, name) in &mapping {
            reverse_mapping.insert(name.to_owned(), *id);
            existing.insert(name.to_owned());
        }
        Self {
            mapping,
            reverse_mapping,
            existing,
        }
    }
}

/// Reasons a requested name was rejected
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use by another player
    #[error("name already in-use")]
    Used,
    /// The player already has an assigned name
    #[error("player has an existing name")]
    Assigned,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

impl Names {
    /// The name assigned to a player, if any
    pub fn get_name(&self, id: &Id) -> Option<String> {
        self.mapping.get(id).map(std::borrow::ToOwned::to_owned)
    }

    /// The player id a name is assigned to, if any
    pub fn get_id(&self, name: &str) -> Option<Id> {
        self.reverse_mapping.get(name).copied()
    }

    /// Validates a requested name and assigns it to a player
    ///
    /// The name is trimmed of surrounding whitespace before all checks.
    ///
    /// # Errors
    ///
    /// * [`Error::TooLong`] when the name exceeds [`MAX_NAME_LENGTH`] bytes
    /// * [`Error::Empty`] when nothing remains after trimming
    /// * [`Error::Sinful`] when the name contains inappropriate content
    /// * [`Error::Assigned`] when the player already has a name
    /// * [`Error::Used`] when another player already holds the name
    pub fn set_name(&mut self, id: Id, name: &str) -> Result<String, Error> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(Error::TooLong);
        }
        let name = rustrict::trim_whitespace(name);
        if name.is_empty() {
            return Err(Error::Empty);
        }
        if name.is_inappropriate() {
            return Err(Error::Sinful);
        }
        if self.mapping.contains_key(&id) {
            return Err(Error::Assigned);
        }
        if !self.existing.insert(name.to_owned()) {
            return Err(Error::Used);
        }
        self.mapping.insert(id, name.to_owned());
        self.reverse_mapping.insert(name.to_owned(), id);
        Ok(name.to_owned())
    }

    /// Assigns a generated pet-style name to a player without one
    ///
    /// Retries with fresh generated names until an unused one is found, so
    /// the returned name is always unique within the session.
    pub fn assign_random(&mut self, id: Id) -> String {
        if let Some(name) = self.get_name(&id) {
            return name;
        }
        loop {
            let candidate = petname::petname(2, " ").unwrap_or_default().to_title_case();
            match self.set_name(id, &candidate) {
                Ok(name) => return name,
                Err(Error::Assigned) => {
                    // raced with a concurrent assignment for the same id
                    return self.get_name(&id).unwrap_or(candidate);
                }
                Err(_) => continue,
            }
        }
    }
}
