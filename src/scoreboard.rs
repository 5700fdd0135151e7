//! Session scoreboard
//!
//! Tracks per-player point totals for one game session. Scoring is flat:
//! one point per correctly guessed question, regardless of which hint part
//! the guess landed on. The ranked result set orders players by score
//! descending, with ties broken by who scored first.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::roster::Id;

/// Serialization helper for the scoreboard
#[derive(Deserialize)]
struct ScoreboardSerde {
    entries: Vec<(Id, u64)>,
}

/// Accumulated point totals for a session, in first-scored order
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "ScoreboardSerde")]
pub struct Scoreboard {
    /// One entry per player that has scored, ordered by first score
    entries: Vec<(Id, u64)>,

    /// Index into `entries` by player (rebuilt on deserialization)
    #[serde(skip)]
    positions: HashMap<Id, usize>,
    /// Ranked result set, computed once at settlement
    #[serde(skip)]
    ranking: once_cell_serde::sync::OnceCell<Vec<(Id, u64)>>,
}

impl From<ScoreboardSerde> for Scoreboard {
    fn from(serde: ScoreboardSerde) -> Self {
        let ScoreboardSerde { entries } = serde;
        let positions = entries
            .iter()
            .enumerate()
            .map(|(index, (id, _))| (*id, index))
            .collect();
        Self {
            entries,
            positions,
            ranking: once_cell_serde::sync::OnceCell::new(),
        }
    }
}

impl Scoreboard {
    /// Adds points to a player's total
    ///
    /// A player's first score fixes their position in the tie-break order.
    pub fn record(&mut self, player: Id, delta: u64) {
        self.ranking = once_cell_serde::sync::OnceCell::new();
        match self.positions.get(&player) {
            Some(&index) => self.entries[index].1 += delta,
            None => {
                self.positions.insert(player, self.entries.len());
                self.entries.push((player, delta));
            }
        }
    }

    /// A player's current total, if they have scored
    pub fn score(&self, player: Id) -> Option<u64> {
        self.positions
            .get(&player)
            .map(|&index| self.entries[index].1)
    }

    /// Whether no player has scored this session
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The ranked result set: score descending, ties in first-scored order
    ///
    /// The ranking is cached after the first call; `record` invalidates it,
    /// so calling this at settlement is cheap even when re-broadcast to
    /// late-joining clients.
    pub fn rank(&self) -> &[(Id, u64)] {
        self.ranking.get_or_init(|| {
            self.entries
                .iter()
                .copied()
                .sorted_by_key(|(_, points)| std::cmp::Reverse(*points))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_flat_points() {
        let mut board = Scoreboard::default();
        let alice = Id::new();
        assert!(board.is_empty());

        board.record(alice, 1);
        board.record(alice, 1);
        assert_eq!(board.score(alice), Some(2));
        assert!(!board.is_empty());
        assert_eq!(board.score(Id::new()), None);
    }

    #[test]
    fn ranks_descending_with_first_scored_tie_break() {
        let mut board = Scoreboard::default();
        let first = Id::new();
        let second = Id::new();
        let leader = Id::new();

        board.record(first, 1);
        board.record(second, 1);
        board.record(leader, 1);
        board.record(leader, 1);

        let ranked = board.rank();
        assert_eq!(ranked[0], (leader, 2));
        // first and second are tied; first scored earlier
        assert_eq!(ranked[1], (first, 1));
        assert_eq!(ranked[2], (second, 1));
    }

    #[test]
    fn ranking_updates_after_new_scores() {
        let mut board = Scoreboard::default();
        let alice = Id::new();
        let bob = Id::new();

        board.record(alice, 1);
        board.record(bob, 1);
        assert_eq!(board.rank()[0].0, alice);

        board.record(bob, 1);
        assert_eq!(board.rank()[0], (bob, 2));
    }

    #[test]
    fn serde_round_trip_rebuilds_positions() {
        let mut board = Scoreboard::default();
        let alice = Id::new();
        board.record(alice, 3);

        let json = serde_json::to_string(&board).unwrap();
        let mut restored: Scoreboard = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.score(alice), Some(3));

        restored.record(alice, 1);
        assert_eq!(restored.score(alice), Some(4));
    }
}
