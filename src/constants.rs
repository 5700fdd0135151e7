//! Configuration constants for the song guessing game
//!
//! This module contains the schema limits enforced on uploaded question
//! sets as well as the gameplay timing and sizing constants used by the
//! session engine.

/// Question-set schema constants
pub mod question_set {
    /// Maximum length of any string field in an uploaded question set
    pub const MAX_STR_LEN: usize = 100;
    /// Exact length of a media source id (e.g. an 11-character video id)
    pub const VID_LENGTH: usize = 11;
}

/// Gameplay constants for a running session
pub mod game {
    use web_time::Duration;

    /// Number of questions played per round unless the room picks another count
    pub const DEFAULT_QUESTION_COUNT: usize = 10;
    /// Countdown between a round starting and the first question loading
    pub const START_COUNTDOWN: Duration = Duration::from_secs(5);
    /// Pause between a question's reveal and the next question loading
    pub const PART_DELAY: Duration = Duration::from_secs(3);
    /// Maximum number of participants in a single room
    pub const MAX_PLAYER_COUNT: usize = 1000;
}

/// Guess suggestion constants
pub mod suggestions {
    /// Maximum number of candidate suggestions returned for an unrecognized guess
    pub const LIMIT: usize = 10;
}

/// Player name constants
pub mod names {
    /// Maximum length of a player's display name in bytes
    pub const MAX_NAME_LENGTH: usize = 30;
}
