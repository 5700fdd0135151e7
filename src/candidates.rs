//! Session-wide candidate answer index
//!
//! The index is the case-folded union of every question's accepted answers
//! plus the set's misleading distractors. It answers exactly one question —
//! "is this guess even a known answer?" — before the arbiter scores a guess
//! against the current question, and it powers the assistive suggestion list
//! for unrecognized guesses. It is rebuilt only when a new question set is
//! uploaded and is read-only for the lifetime of that set.

use std::collections::BTreeSet;

use crate::{TruncatedVec, constants::suggestions, question::QuestionSet};

/// Case-folded union of all known candidate answers for a loaded question set
#[derive(Debug, Default, Clone)]
pub struct CandidateIndex {
    // BTreeSet keeps suggestion output deterministic
    entries: BTreeSet<String>,
}

impl CandidateIndex {
    /// Builds the index from a normalized question set
    pub fn build(set: &QuestionSet) -> Self {
        let entries = set
            .questions
            .iter()
            .flat_map(|question| question.folded_candidates().map(str::to_owned))
            .chain(set.misleadings.iter().cloned())
            .collect();
        Self { entries }
    }

    /// Checks whether an already case-folded guess is a known candidate
    pub fn contains(&self, folded_guess: &str) -> bool {
        self.entries.contains(folded_guess)
    }

    /// Number of distinct candidates in the index
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no candidates
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every known candidate, folded, in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Suggests known candidates resembling an unrecognized guess
    ///
    /// A candidate matches when every whitespace-separated token of the
    /// folded guess appears somewhere in it as a substring. The result is
    /// assistive autocomplete feedback, capped at
    /// [`suggestions::LIMIT`] entries while reporting the exact match count
    /// so a front-end can flag that more exist.
    pub fn suggest(&self, folded_guess: &str) -> TruncatedVec<String> {
        let tokens: Vec<&str> = folded_guess.split_whitespace().collect();
        if tokens.is_empty() {
            return TruncatedVec::default();
        }

        let matches: Vec<&str> = self
            .entries
            .iter()
            .map(String::as_str)
            .filter(|candidate| tokens.iter().all(|token| candidate.contains(token)))
            .collect();

        let count = matches.len();
        TruncatedVec::new(matches.into_iter(), suggestions::LIMIT, count).map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::QuestionSet;
    use serde_json::json;

    fn index_of(candidates: &[&str]) -> CandidateIndex {
        CandidateIndex {
            entries: candidates.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    #[test]
    fn index_is_superset_of_per_question_candidates_and_misleadings() {
        let raw = json!({
            "title": "t",
            "author": "a",
            "questions": [
                {
                    "vid": "dQw4w9WgXcQ",
                    "title": "q1",
                    "parts": [[0, 3000]],
                    "candidates": ["Tokyo Drift", "TOKYO DRIFT '06"]
                },
                {
                    "vid": "abc123DEF45",
                    "title": "q2",
                    "parts": [[0, 2000]],
                    "candidates": ["Night Drive"]
                }
            ],
            "misleadings": ["Highway Star"]
        });
        let set = QuestionSet::validate(&raw).unwrap();
        let index = CandidateIndex::build(&set);

        for question in &set.questions {
            for folded in question.folded_candidates() {
                assert!(index.contains(folded), "missing {folded}");
            }
        }
        for misleading in &set.misleadings {
            assert!(index.contains(misleading));
        }
        assert!(index.contains("highway star"));
        assert!(!index.contains("Highway Star"));
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn single_token_substring_suggestion() {
        let index = index_of(&["tokyo drift", "night drive", "highway star"]);
        let suggestions = index.suggest("drift");
        assert_eq!(suggestions.items(), ["tokyo drift".to_owned()]);
        assert_eq!(suggestions.exact_count(), 1);
    }

    #[test]
    fn all_tokens_must_match() {
        let index = index_of(&["tokyo drift", "tokyo nights", "night drive"]);
        let suggestions = index.suggest("tokyo dri");
        assert_eq!(suggestions.items(), ["tokyo drift".to_owned()]);
        // Token order in the guess is irrelevant
        let suggestions = index.suggest("dri tokyo");
        assert_eq!(suggestions.items(), ["tokyo drift".to_owned()]);
    }

    #[test]
    fn suggestions_are_capped_with_exact_count() {
        let names: Vec<String> = (0..15).map(|i| format!("song number {i:02}")).collect();
        let index = index_of(&names.iter().map(String::as_str).collect::<Vec<_>>());
        let suggestions = index.suggest("song");
        assert_eq!(suggestions.items().len(), crate::constants::suggestions::LIMIT);
        assert_eq!(suggestions.exact_count(), 15);
    }

    #[test]
    fn blank_guess_suggests_nothing() {
        let index = index_of(&["tokyo drift"]);
        assert!(index.suggest("   ").items().is_empty());
        assert_eq!(index.suggest("").exact_count(), 0);
    }

    #[test]
    fn no_match_yields_empty_list() {
        let index = index_of(&["tokyo drift", "night drive"]);
        let suggestions = index.suggest("polka");
        assert!(suggestions.items().is_empty());
        assert_eq!(suggestions.exact_count(), 0);
    }
}
