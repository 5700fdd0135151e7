//! # Songuess Game Library
//!
//! This library provides the core session engine for a "guess the song"
//! party game. It owns a quiz round's lifecycle: validating uploaded
//! question sets, sequencing audio hint parts, arbitrating concurrent
//! player guesses against a fuzzy candidate index, scoring, and moving a
//! room through its game states. Transports (a chat bot or a WebSocket
//! server) drive the engine through messages and render the notifications
//! it emits; media acquisition is delegated to the clients themselves.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

use derive_where::derive_where;
use itertools::Itertools;
use serde::Serialize;

pub mod constants;

pub mod candidates;
pub mod game;
pub mod names;
pub mod question;
pub mod registry;
pub mod roster;
pub mod scoreboard;
pub mod session;

/// A truncated list that keeps the exact total count of items
///
/// Used wherever the engine caps what it sends to clients while still
/// reporting how many entries existed: candidate suggestion lists for
/// unrecognized guesses and large room rosters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    /// The exact total count of items before truncation
    exact_count: usize,
    /// The retained items, up to the limit
    items: Vec<T>,
}

impl<T: Clone> TruncatedVec<T> {
    /// Creates a truncated list from an iterator
    ///
    /// Keeps at most `limit` items; `exact_count` is the untruncated total.
    pub fn new<I: Iterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        let items = list.take(limit).collect_vec();
        Self { exact_count, items }
    }

    /// Maps a function over the retained items
    pub fn map<F, U>(self, f: F) -> TruncatedVec<U>
    where
        F: Fn(T) -> U,
    {
        TruncatedVec {
            exact_count: self.exact_count,
            items: self.items.into_iter().map(f).collect_vec(),
        }
    }

    /// The exact total count before truncation
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// Whether entries beyond the retained ones exist
    pub fn truncated(&self) -> bool {
        self.exact_count > self.items.len()
    }

    /// The retained items
    pub fn items(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_vec_new() {
        let data = vec!["a", "b", "c", "d", "e"];
        let truncated = TruncatedVec::new(data.into_iter(), 3, 5);

        assert_eq!(truncated.exact_count(), 5);
        assert_eq!(truncated.items(), &["a", "b", "c"]);
        assert!(truncated.truncated());
    }

    #[test]
    fn test_truncated_vec_limit_larger_than_items() {
        let data = vec![1, 2, 3];
        let truncated = TruncatedVec::new(data.into_iter(), 5, 3);

        assert_eq!(truncated.exact_count(), 3);
        assert_eq!(truncated.items(), &[1, 2, 3]);
        assert!(!truncated.truncated());
    }

    #[test]
    fn test_truncated_vec_map() {
        let data = vec![1, 2, 3];
        let truncated = TruncatedVec::new(data.into_iter(), 2, 3);
        let mapped = truncated.map(|x| format!("song_{x}"));

        assert_eq!(mapped.exact_count(), 3);
        assert_eq!(mapped.items(), &["song_1", "song_2"]);
    }
}
