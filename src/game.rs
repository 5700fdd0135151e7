//! Core session logic and state management
//!
//! This module contains the session state machine for one game room: question
//! set upload, the round lifecycle from start countdown through part playback
//! to settlement, guess arbitration against the candidate index, and
//! real-time communication with all connected participants.
//!
//! All state-mutating entry points are synchronous; countdowns and delays are
//! expressed as [`AlarmMessage`]s handed to a caller-supplied scheduler and
//! re-validated against the current state on delivery, so a stale alarm for a
//! stopped or advanced round is a silent no-op.

use std::{collections::HashSet, fmt::Debug};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    TruncatedVec,
    candidates::CandidateIndex,
    constants::game::{DEFAULT_QUESTION_COUNT, PART_DELAY, START_COUNTDOWN},
    names::{self, Names},
    question::{ErrorCode, QuestionSet},
    roster::{self, Id, PlayerRole, Role, RoleKind, Roster},
    scoreboard::Scoreboard,
    session::Tunnel,
};

/// Configuration options for a session
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, Validate)]
pub struct Options {
    /// Assign generated names instead of asking players to pick one
    #[garde(skip)]
    pub random_names: bool,
    /// Limit each player to one guess per part
    #[garde(skip)]
    pub guess_once_per_part: bool,
}

/// Where a running round currently is within a question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Between the start command (or a reveal) and the next question loading
    Delay,
    /// Question announced, waiting for the media-ready confirmation
    Loading,
    /// A part is playing and guesses are open
    Live,
}

/// Progress of a running round
#[derive(Debug)]
struct Round {
    /// Shuffled indices into the question set, truncated to the round length
    order: Vec<usize>,
    /// Index into `order` of the current question
    position: usize,
    /// Current part within the current question
    part: usize,
    phase: Phase,
    /// Players that guessed during the current part (reset every part)
    guessed: HashSet<Id>,
    /// Whether the current question was already answered correctly
    answered: bool,
}

/// Lifecycle state of a session
#[derive(Debug)]
enum Step {
    /// No question set uploaded yet
    Idle,
    /// A question set is loaded and the room is between rounds
    Waiting,
    /// A round is running
    Playing(Box<Round>),
    /// Terminated; the session rejects everything except removal
    Stopped,
}

/// One game room: participants, loaded question set, and round state
pub struct Game {
    /// All participants of the room
    pub roster: Roster,
    /// Name assignments and validation for players
    names: Names,
    /// Point totals for the current or just-settled round
    pub scoreboard: Scoreboard,
    step: Step,
    question_set: Option<QuestionSet>,
    /// Guess-admission index over the loaded set, rebuilt on upload
    candidates: CandidateIndex,
    /// Number of questions played per round
    question_count: usize,
    options: Options,
    /// Round counter used to invalidate alarms from earlier rounds
    round: u64,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("step", &self.step)
            .field(
                "question_set",
                &self.question_set.as_ref().map(|s| s.title.as_str()),
            )
            .finish_non_exhaustive()
    }
}

/// Messages received from participants, categorized by the sender's role
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Messages from the session host
    Host(IncomingHostMessage),
    /// Messages from unassigned connections (not yet players)
    Unassigned(IncomingUnassignedMessage),
    /// Messages from active players
    Player(IncomingPlayerMessage),
}

impl IncomingMessage {
    /// Validates that a message matches the sender's role
    fn follows(&self, sender_kind: RoleKind) -> bool {
        matches!(
            (self, sender_kind),
            (IncomingMessage::Host(_), RoleKind::Host)
                | (IncomingMessage::Player(_), RoleKind::Player)
                | (IncomingMessage::Unassigned(_), RoleKind::Unassigned)
        )
    }
}

/// Messages that can be sent by active players
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingPlayerMessage {
    /// A guess at the currently playing question
    Guess(String),
}

/// Messages that can be sent by unassigned connections
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingUnassignedMessage {
    /// Request to set a specific name and become a player
    NameRequest(String),
}

/// Messages that can be sent by the session host
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingHostMessage {
    /// Upload a question set document
    UploadSet(Value),
    /// Choose how many questions a round plays
    SetQuestionCount(usize),
    /// Start a round
    Start,
    /// Start another round with the same set, fresh shuffle and scoreboard
    Restart,
    /// Terminate the session
    Stop,
    /// Reveal the current question and move on
    NextQuestion,
    /// Advance to the next part of the current question
    RequestHint,
    /// Re-emit the current part without advancing
    ReplayPart,
    /// Close out the round and publish the scoreboard
    Settle,
    /// The current question's media finished loading
    MediaReady,
    /// The current question's media could not be resolved
    MediaFailed,
}

/// Why a command or guess was not accepted
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The command does not apply to the session's current state
    WrongState,
    /// The question was already answered or no question is accepting guesses
    TooLate,
    /// The player already used their guess for this part
    AlreadyGuessedThisPart,
}

/// Result of arbitrating one guess, in the order the checks apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// No question is accepting guesses, or it was already answered
    TooLate,
    /// The one-guess-per-part policy consumed this player's attempt
    AlreadyGuessedThisPart,
    /// The guess matches no known candidate; carries assistive suggestions
    Unrecognized(TruncatedVec<String>),
    /// A known candidate, but not an answer to the current question
    Wrong,
    /// The current question's answer
    Correct {
        /// Media source id of the answered question, for the reveal
        vid: String,
    },
}

/// Update messages sent to participants about session changes
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum UpdateMessage {
    /// Assign a unique id to a participant
    IdAssign(Id),
    /// Prompt the participant to choose a name
    NameChoose,
    /// Confirm a name assignment
    NameAssign(String),
    /// Report an error with name validation
    NameError(names::Error),
    /// Current player names in the room
    PlayerList(Vec<String>),
    /// A question set was accepted
    SetUploaded {
        /// Question set title
        title: String,
        /// Question set author
        author: String,
        /// Number of questions in the set
        questions: usize,
        /// Every known folded candidate, for client-side autocomplete
        candidates: Vec<String>,
    },
    /// An uploaded question set failed validation (sent to the uploader only)
    UploadRejected(ErrorCode),
    /// Number of questions the next round will play
    QuestionCount(usize),
    /// A round is starting after the countdown
    Started {
        /// Countdown until the first question loads, in milliseconds
        countdown_ms: u64,
    },
    /// Resolve and prepare this media source
    LoadQuestion {
        /// Opaque media source id
        vid: String,
    },
    /// Play this clip of the current question's media
    PlayPart {
        /// Clip start in milliseconds
        start_ms: i64,
        /// Clip end in milliseconds
        end_ms: i64,
    },
    /// Current round progress
    GameState {
        /// Zero-based index of the current question within the round
        question: usize,
        /// Number of questions in the round
        total: usize,
        /// Zero-based index of the current part
        part: usize,
    },
    /// A player's guess, shown to the whole room
    GuessBroadcast {
        /// Guessing player's name
        name: String,
        /// The guess as typed
        guess: String,
    },
    /// A command or guess was rejected (sent to the sender only)
    Rejected(Rejection),
    /// Candidate suggestions for an unrecognized guess (sent to the guesser only)
    Suggestions(TruncatedVec<String>),
    /// A player answered the current question
    CorrectGuess {
        /// Scoring player's name
        name: String,
        /// The player's new total
        score: u64,
        /// Media source id of the answered question
        vid: String,
    },
    /// The accepted answers of the question that just ended
    RevealAnswers {
        /// Question title
        title: String,
        /// Accepted answers as uploaded
        candidates: Vec<String>,
    },
    /// A question was skipped because its media could not be resolved
    QuestionSkipped {
        /// Title of the skipped question
        title: String,
    },
    /// Final ranked scoreboard of a settled round
    ShowResult {
        /// (name, points) ordered by rank; empty when no one scored
        results: Vec<(String, u64)>,
    },
    /// The session was terminated
    Stopped,
}

/// Summary of the loaded question set, for state synchronization
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SetSummary {
    /// Question set title
    pub title: String,
    /// Question set author
    pub author: String,
    /// Number of questions in the set
    pub questions: usize,
    /// Every known folded candidate, for client-side autocomplete
    pub candidates: Vec<String>,
}

/// Sync messages that bring a participant's view up to date with the session
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum SyncMessage {
    /// No question set uploaded yet
    Idle,
    /// Between rounds
    Waiting {
        /// The loaded question set, if any
        set: Option<SetSummary>,
        /// Number of questions the next round will play
        question_count: usize,
        /// Current player names in the room
        players: Vec<String>,
    },
    /// A round is running
    Playing {
        /// Zero-based index of the current question within the round
        question: usize,
        /// Number of questions in the round
        total: usize,
        /// Zero-based index of the current part
        part: usize,
        /// The recipient's current score
        score: u64,
    },
    /// The session was terminated
    Stopped,
}

/// Scheduled messages delivered back to the session after a delay
///
/// Alarms carry the round counter and question position they were scheduled
/// for; delivery re-validates both so that alarms outlived by a stop,
/// settlement, or restart do nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlarmMessage {
    /// Load the question at `position` once the delay elapses
    LoadQuestion {
        /// Round counter at scheduling time
        round: u64,
        /// Index into the shuffled order this alarm targets
        position: usize,
    },
}

fn millis(duration: web_time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Game {
    /// Creates a session with the given host and no question set
    pub fn new(options: Options, host_id: Id) -> Self {
        Self {
            roster: Roster::with_host_id(host_id),
            names: Names::default(),
            scoreboard: Scoreboard::default(),
            step: Step::Idle,
            question_set: None,
            candidates: CandidateIndex::default(),
            question_count: 0,
            options,
            round: 0,
        }
    }

    /// Whether the session was terminated
    pub fn is_stopped(&self) -> bool {
        matches!(self.step, Step::Stopped)
    }

    /// The phase of the running round, if one is running
    fn phase(&self) -> Option<Phase> {
        match &self.step {
            Step::Playing(round) => Some(round.phase),
            _ => None,
        }
    }

    /// Registers a new unassigned participant
    ///
    /// Sends the participant their id and either assigns a generated name or
    /// prompts them to choose one, depending on the session options.
    ///
    /// # Errors
    ///
    /// Returns [`roster::Error::MaximumPlayers`] when the room is full.
    pub fn add_unassigned<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher: Id,
        tunnel_finder: F,
    ) -> Result<(), roster::Error> {
        self.roster.add(watcher, Role::Unassigned)?;

        self.roster
            .send_message(&UpdateMessage::IdAssign(watcher), watcher, &tunnel_finder);

        self.handle_unassigned(watcher, tunnel_finder);

        Ok(())
    }

    fn handle_unassigned<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher: Id,
        tunnel_finder: F,
    ) {
        if self.options.random_names {
            let name = self.names.assign_random(watcher);
            self.promote_player(watcher, name, tunnel_finder);
        } else {
            self.roster
                .send_message(&UpdateMessage::NameChoose, watcher, tunnel_finder);
        }
    }

    fn assign_player_name<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher: Id,
        name: &str,
        tunnel_finder: F,
    ) -> Result<(), names::Error> {
        let name = self.names.set_name(watcher, name)?;

        self.promote_player(watcher, name, tunnel_finder);

        Ok(())
    }

    fn promote_player<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher: Id,
        name: String,
        tunnel_finder: F,
    ) {
        self.roster
            .update_role(watcher, Role::Player(PlayerRole { name: name.clone() }));

        self.roster
            .send_message(&UpdateMessage::NameAssign(name), watcher, &tunnel_finder);

        self.roster.announce(
            &UpdateMessage::PlayerList(self.roster.player_names()),
            &tunnel_finder,
        );

        self.roster
            .send_state(&self.state_message(watcher), watcher, tunnel_finder);
    }

    /// The message necessary to synchronize a participant's view
    pub fn state_message(&self, watcher_id: Id) -> SyncMessage {
        match &self.step {
            Step::Idle => SyncMessage::Idle,
            Step::Waiting => SyncMessage::Waiting {
                set: self.question_set.as_ref().map(|set| SetSummary {
                    title: set.title.clone(),
                    author: set.author.clone(),
                    questions: set.len(),
                    candidates: self.candidates.iter().map(str::to_owned).collect(),
                }),
                question_count: self.question_count,
                players: self.roster.player_names(),
            },
            Step::Playing(round) => SyncMessage::Playing {
                question: round.position,
                total: round.order.len(),
                part: round.part,
                score: self.scoreboard.score(watcher_id).unwrap_or(0),
            },
            Step::Stopped => SyncMessage::Stopped,
        }
    }

    /// Re-synchronizes a reconnecting participant
    pub fn update_session<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        watcher_id: Id,
        tunnel_finder: F,
    ) {
        let Some(role) = self.roster.get_role(watcher_id) else {
            return;
        };

        match role {
            Role::Host => {
                self.roster.send_state(
                    &self.state_message(watcher_id),
                    watcher_id,
                    tunnel_finder,
                );
            }
            Role::Player(player) => {
                self.roster.send_message(
                    &UpdateMessage::NameAssign(player.name),
                    watcher_id,
                    &tunnel_finder,
                );
                self.roster.send_state(
                    &self.state_message(watcher_id),
                    watcher_id,
                    tunnel_finder,
                );
            }
            Role::Unassigned => {
                self.handle_unassigned(watcher_id, tunnel_finder);
            }
        }
    }

    /// Handles an incoming message from a participant
    ///
    /// Validates that the message matches the sender's role and routes it to
    /// the handler for the current state. Countdowns are handed to
    /// `schedule_message`; the caller must deliver them back through
    /// [`Game::receive_alarm`] after the given delay.
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        watcher_id: Id,
        message: IncomingMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(role) = self.roster.get_role(watcher_id) else {
            return;
        };

        if !message.follows(role.kind()) {
            return;
        }

        if self.is_stopped() {
            self.roster
                .send_message(&UpdateMessage::Stopped, watcher_id, tunnel_finder);
            return;
        }

        match message {
            IncomingMessage::Unassigned(IncomingUnassignedMessage::NameRequest(name)) => {
                if self.options.random_names {
                    return;
                }
                if let Err(e) = self.assign_player_name(watcher_id, &name, &tunnel_finder) {
                    self.roster.send_message(
                        &UpdateMessage::NameError(e),
                        watcher_id,
                        tunnel_finder,
                    );
                }
            }
            IncomingMessage::Player(IncomingPlayerMessage::Guess(text)) => {
                self.handle_guess(watcher_id, &text, tunnel_finder);
            }
            IncomingMessage::Host(host_message) => {
                self.handle_host_message(watcher_id, host_message, schedule_message, tunnel_finder);
            }
        }
    }

    fn handle_host_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        host_id: Id,
        message: IncomingHostMessage,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        match message {
            IncomingHostMessage::UploadSet(raw) => {
                if matches!(self.step, Step::Playing(_)) {
                    self.reject(host_id, Rejection::WrongState, tunnel_finder);
                    return;
                }
                match QuestionSet::validate(&raw) {
                    Ok(set) => self.accept_set(set, tunnel_finder),
                    Err(code) => {
                        self.roster.send_message(
                            &UpdateMessage::UploadRejected(code),
                            host_id,
                            tunnel_finder,
                        );
                    }
                }
            }
            IncomingHostMessage::SetQuestionCount(count) => {
                if !matches!(self.step, Step::Waiting) {
                    self.reject(host_id, Rejection::WrongState, tunnel_finder);
                    return;
                }
                let len = self.question_set.as_ref().map_or(0, QuestionSet::len);
                self.question_count = count.clamp(1, len.max(1));
                self.roster.announce(
                    &UpdateMessage::QuestionCount(self.question_count),
                    tunnel_finder,
                );
            }
            IncomingHostMessage::Start | IncomingHostMessage::Restart => {
                if matches!(self.step, Step::Waiting) {
                    self.begin_round(schedule_message, tunnel_finder);
                } else {
                    self.reject(host_id, Rejection::WrongState, tunnel_finder);
                }
            }
            IncomingHostMessage::Stop => {
                if matches!(self.step, Step::Waiting | Step::Playing(_)) {
                    self.step = Step::Stopped;
                    self.roster.announce(&UpdateMessage::Stopped, tunnel_finder);
                } else {
                    self.reject(host_id, Rejection::WrongState, tunnel_finder);
                }
            }
            IncomingHostMessage::NextQuestion => match self.phase() {
                Some(Phase::Live | Phase::Loading) => {
                    self.reveal_and_advance(&mut schedule_message, tunnel_finder);
                }
                // a reveal or countdown already advanced past this request
                Some(Phase::Delay) => {}
                None => self.reject(host_id, Rejection::WrongState, tunnel_finder),
            },
            IncomingHostMessage::RequestHint => match self.phase() {
                Some(Phase::Live) => self.advance_part(&mut schedule_message, tunnel_finder),
                Some(_) => {}
                None => self.reject(host_id, Rejection::WrongState, tunnel_finder),
            },
            IncomingHostMessage::ReplayPart => match self.phase() {
                Some(Phase::Live) => self.play_current_part(tunnel_finder),
                Some(_) => {}
                None => self.reject(host_id, Rejection::WrongState, tunnel_finder),
            },
            IncomingHostMessage::Settle => {
                if matches!(self.step, Step::Playing(_)) {
                    self.settle(tunnel_finder);
                } else {
                    self.reject(host_id, Rejection::WrongState, tunnel_finder);
                }
            }
            IncomingHostMessage::MediaReady => self.media_ready(tunnel_finder),
            IncomingHostMessage::MediaFailed => self.skip_question(tunnel_finder),
        }
    }

    /// Handles a scheduled alarm
    ///
    /// The alarm is applied only if the session is still in the round and at
    /// the question position it was scheduled for; anything else is stale and
    /// ignored.
    pub fn receive_alarm<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        message: AlarmMessage,
        tunnel_finder: F,
    ) {
        match message {
            AlarmMessage::LoadQuestion { round, position } => {
                let current = match &self.step {
                    Step::Playing(r) => {
                        self.round == round
                            && r.position == position
                            && matches!(r.phase, Phase::Delay)
                    }
                    _ => false,
                };
                if current {
                    self.load_question(tunnel_finder);
                }
            }
        }
    }

    fn reject<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        watcher_id: Id,
        rejection: Rejection,
        tunnel_finder: F,
    ) {
        self.roster.send_message(
            &UpdateMessage::Rejected(rejection),
            watcher_id,
            tunnel_finder,
        );
    }

    fn accept_set<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, set: QuestionSet, tunnel_finder: F) {
        self.candidates = CandidateIndex::build(&set);
        self.question_count = set.len().min(DEFAULT_QUESTION_COUNT);
        self.roster.announce(
            &UpdateMessage::SetUploaded {
                title: set.title.clone(),
                author: set.author.clone(),
                questions: set.len(),
                candidates: self.candidates.iter().map(str::to_owned).collect(),
            },
            &tunnel_finder,
        );
        self.roster.announce(
            &UpdateMessage::QuestionCount(self.question_count),
            tunnel_finder,
        );
        self.question_set = Some(set);
        self.step = Step::Waiting;
    }

    fn begin_round<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(set) = &self.question_set else {
            return;
        };

        let mut order = (0..set.len()).collect_vec();
        fastrand::shuffle(&mut order);
        order.truncate(self.question_count.max(1));

        self.scoreboard = Scoreboard::default();
        self.round = self.round.wrapping_add(1);
        self.step = Step::Playing(Box::new(Round {
            order,
            position: 0,
            part: 0,
            phase: Phase::Delay,
            guessed: HashSet::new(),
            answered: false,
        }));

        self.roster.announce(
            &UpdateMessage::Started {
                countdown_ms: millis(START_COUNTDOWN),
            },
            tunnel_finder,
        );

        schedule_message(
            AlarmMessage::LoadQuestion {
                round: self.round,
                position: 0,
            },
            START_COUNTDOWN,
        );
    }

    fn load_question<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let Some(set) = &self.question_set else {
            return;
        };
        let Step::Playing(round) = &mut self.step else {
            return;
        };
        let Some(question) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
        else {
            return;
        };

        round.part = 0;
        round.guessed.clear();
        round.answered = false;
        round.phase = Phase::Loading;

        let vid = question.vid.clone();
        self.roster
            .announce(&UpdateMessage::LoadQuestion { vid }, tunnel_finder);
    }

    fn media_ready<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let Step::Playing(round) = &mut self.step else {
            return;
        };
        if !matches!(round.phase, Phase::Loading) {
            return;
        }
        round.phase = Phase::Live;
        self.play_current_part(tunnel_finder);
    }

    fn play_current_part<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        let Some(set) = &self.question_set else {
            return;
        };
        let Step::Playing(round) = &self.step else {
            return;
        };
        let Some(part) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
            .and_then(|question| question.parts.get(round.part))
        else {
            return;
        };

        self.roster.announce(
            &UpdateMessage::PlayPart {
                start_ms: part.start_ms,
                end_ms: part.end_ms,
            },
            &tunnel_finder,
        );
        self.roster.announce(
            &UpdateMessage::GameState {
                question: round.position,
                total: round.order.len(),
                part: round.part,
            },
            tunnel_finder,
        );
    }

    fn advance_part<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(set) = &self.question_set else {
            return;
        };
        let Step::Playing(round) = &mut self.step else {
            return;
        };
        let Some(question) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
        else {
            return;
        };

        if round.part + 1 < question.parts.len() {
            round.part += 1;
            round.guessed.clear();
            self.play_current_part(tunnel_finder);
        } else {
            self.reveal_and_advance(schedule_message, tunnel_finder);
        }
    }

    fn reveal_and_advance<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(set) = &self.question_set else {
            return;
        };
        let Step::Playing(round) = &mut self.step else {
            return;
        };
        let Some(question) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
        else {
            return;
        };

        let reveal = UpdateMessage::RevealAnswers {
            title: question.title.clone(),
            candidates: question.candidates.clone(),
        };

        round.position += 1;
        round.phase = Phase::Delay;
        let next = round.position;
        let finished = next >= round.order.len();

        self.roster.announce(&reveal, &tunnel_finder);

        if finished {
            self.settle(tunnel_finder);
        } else {
            schedule_message(
                AlarmMessage::LoadQuestion {
                    round: self.round,
                    position: next,
                },
                PART_DELAY,
            );
        }
    }

    fn skip_question<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let Some(set) = &self.question_set else {
            return;
        };
        let Step::Playing(round) = &mut self.step else {
            return;
        };
        if !matches!(round.phase, Phase::Loading) {
            return;
        }
        let Some(question) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
        else {
            return;
        };

        let notice = UpdateMessage::QuestionSkipped {
            title: question.title.clone(),
        };

        round.position += 1;
        round.phase = Phase::Delay;
        let finished = round.position >= round.order.len();

        self.roster.announce(&notice, &tunnel_finder);

        if finished {
            self.settle(tunnel_finder);
        } else {
            self.load_question(tunnel_finder);
        }
    }

    fn settle<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let results = self
            .scoreboard
            .rank()
            .iter()
            .map(|(id, points)| {
                (
                    self.names
                        .get_name(id)
                        .unwrap_or_else(|| "Unknown".to_owned()),
                    *points,
                )
            })
            .collect_vec();

        self.step = Step::Waiting;
        self.roster
            .announce(&UpdateMessage::ShowResult { results }, tunnel_finder);
    }

    /// Arbitrates one guess against the current question
    ///
    /// Checks apply in a fixed order: admission (a question must be live and
    /// unanswered), the optional one-guess-per-part throttle, candidate-index
    /// lookup with suggestions, and finally matching against the current
    /// question's accepted answers. A wrong or unrecognized guess still
    /// consumes the per-part attempt when the throttle is active.
    pub fn submit_guess(&mut self, player: Id, raw: &str) -> GuessOutcome {
        let Some(set) = &self.question_set else {
            return GuessOutcome::TooLate;
        };
        let Step::Playing(round) = &mut self.step else {
            return GuessOutcome::TooLate;
        };

        if !matches!(round.phase, Phase::Live) || round.answered {
            return GuessOutcome::TooLate;
        }

        if self.options.guess_once_per_part && round.guessed.contains(&player) {
            return GuessOutcome::AlreadyGuessedThisPart;
        }
        round.guessed.insert(player);

        let folded = raw.trim().to_lowercase();

        if !self.candidates.contains(&folded) {
            return GuessOutcome::Unrecognized(self.candidates.suggest(&folded));
        }

        let Some(question) = round
            .order
            .get(round.position)
            .and_then(|&index| set.questions.get(index))
        else {
            return GuessOutcome::TooLate;
        };

        if !question.accepts(&folded) {
            return GuessOutcome::Wrong;
        }

        round.answered = true;
        let vid = question.vid.clone();
        self.scoreboard.record(player, 1);
        GuessOutcome::Correct { vid }
    }

    fn handle_guess<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        player: Id,
        text: &str,
        tunnel_finder: F,
    ) {
        let name = self.roster.get_name(player).unwrap_or_default();

        match self.submit_guess(player, text) {
            GuessOutcome::TooLate => self.reject(player, Rejection::TooLate, tunnel_finder),
            GuessOutcome::AlreadyGuessedThisPart => {
                self.reject(player, Rejection::AlreadyGuessedThisPart, tunnel_finder);
            }
            GuessOutcome::Unrecognized(suggestions) => {
                self.roster.send_message(
                    &UpdateMessage::Suggestions(suggestions),
                    player,
                    tunnel_finder,
                );
            }
            GuessOutcome::Wrong => {
                self.roster.announce(
                    &UpdateMessage::GuessBroadcast {
                        name,
                        guess: text.to_owned(),
                    },
                    tunnel_finder,
                );
            }
            GuessOutcome::Correct { vid } => {
                self.roster.announce(
                    &UpdateMessage::GuessBroadcast {
                        name: name.clone(),
                        guess: text.to_owned(),
                    },
                    &tunnel_finder,
                );
                self.roster.announce(
                    &UpdateMessage::CorrectGuess {
                        name,
                        score: self.scoreboard.score(player).unwrap_or(1),
                        vid,
                    },
                    tunnel_finder,
                );
            }
        }
    }
}
