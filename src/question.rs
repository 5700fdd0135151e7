//! Question set schema validation and normalization
//!
//! This module defines the question-set data model and the validator that
//! turns an untrusted uploaded JSON document into a normalized
//! [`QuestionSet`]. Validation fails closed: the first structural violation
//! short-circuits with a stable integer error code so front-ends can show a
//! precise diagnostic without parsing error strings. Normalization
//! case-folds every candidate answer exactly once at load time; matching
//! never re-folds per guess.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::constants::question_set::{MAX_STR_LEN, VID_LENGTH};

/// Stable error codes for malformed question sets
///
/// Codes are grouped by field path: title-class errors in the 100s, author
/// in the 200s, the questions collection in the 300s, per-question fields in
/// the 3000s, per-part in the 33000s, per-candidate in the 34000s, and
/// misleading options in the 400s/4000s. The numeric values are a stable
/// contract with question-set authoring tools.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum ErrorCode {
    /// The top-level `title` field is missing
    #[error("question set has no title")]
    NoTitle = 100,
    /// The top-level `title` field is not a string
    #[error("question set title is not a string")]
    TitleWrongType = 101,
    /// The top-level `title` field exceeds the length limit
    #[error("question set title is too long")]
    TitleTooLong = 102,

    /// The `author` field is missing
    #[error("question set has no author")]
    NoAuthor = 200,
    /// The `author` field is not a string
    #[error("question set author is not a string")]
    AuthorWrongType = 201,
    /// The `author` field exceeds the length limit
    #[error("question set author is too long")]
    AuthorTooLong = 202,

    /// The `questions` field is missing
    #[error("question set has no questions field")]
    NoQuestions = 300,
    /// The `questions` field is not an array
    #[error("questions field is not an array")]
    QuestionsWrongType = 301,
    /// The `questions` array is empty
    #[error("questions array is empty")]
    EmptyQuestions = 302,

    /// A question entry is not an object
    #[error("question is not an object")]
    QuestionWrongType = 3000,

    /// A question has no `vid` field
    #[error("question has no vid")]
    QuestionNoVid = 3100,
    /// A question's `vid` field is not a string
    #[error("question vid is not a string")]
    QuestionVidWrongType = 3101,
    /// A question's `vid` field is not a well-formed media source id
    #[error("question vid is not a valid media source id")]
    QuestionVidBadFormat = 3102,

    /// A question has no `title` field
    #[error("question has no title")]
    QuestionNoTitle = 3200,
    /// A question's `title` field is not a string
    #[error("question title is not a string")]
    QuestionTitleWrongType = 3201,
    /// A question's `title` field is empty
    #[error("question title is empty")]
    QuestionEmptyTitle = 3202,
    /// A question's `title` field exceeds the length limit
    #[error("question title is too long")]
    QuestionTitleTooLong = 3203,

    /// A question has no `parts` field
    #[error("question has no parts")]
    QuestionNoParts = 3300,
    /// A question's `parts` field is not an array
    #[error("question parts is not an array")]
    QuestionPartsWrongType = 3301,
    /// A question's `parts` array is empty
    #[error("question parts array is empty")]
    QuestionEmptyParts = 3302,

    /// A part entry is not an array
    #[error("part is not an array")]
    PartWrongType = 33000,
    /// A part entry does not have exactly two elements
    #[error("part does not have exactly two elements")]
    PartWrongLen = 33001,
    /// A part's start or end time is not an integer
    #[error("part time is not an integer")]
    PartWrongTimeType = 33002,
    /// A part's end time is not after its start time
    #[error("part end time is not after its start time")]
    PartInvalidDuration = 33003,

    /// A question has no `candidates` field
    #[error("question has no candidates")]
    QuestionNoCandidates = 3400,
    /// A question's `candidates` field is not an array
    #[error("question candidates is not an array")]
    QuestionCandidatesWrongType = 3401,
    /// A question's `candidates` array is empty
    #[error("question candidates array is empty")]
    QuestionEmptyCandidates = 3402,

    /// A candidate entry is not a string
    #[error("candidate is not a string")]
    CandidateWrongType = 34000,
    /// A candidate entry is empty
    #[error("candidate is empty")]
    EmptyCandidate = 34001,
    /// A candidate entry exceeds the length limit
    #[error("candidate is too long")]
    CandidateTooLong = 34002,

    /// The `misleadings` field is missing
    #[error("question set has no misleadings field")]
    NoMisleadings = 400,
    /// The `misleadings` field is not an array
    #[error("misleadings field is not an array")]
    MisleadingsWrongType = 401,

    /// A misleading option is not a string
    #[error("misleading option is not a string")]
    MisleadingWrongType = 4000,
    /// A misleading option is empty
    #[error("misleading option is empty")]
    EmptyMisleading = 4001,
    /// A misleading option exceeds the length limit
    #[error("misleading option is too long")]
    MisleadingTooLong = 4002,
}

impl ErrorCode {
    /// Returns the stable integer value of this error code
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// A bounded time range of a question's media, used as a progressive hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Part {
    /// Start of the clip in milliseconds
    pub start_ms: i64,
    /// End of the clip in milliseconds, strictly after the start
    pub end_ms: i64,
}

/// A single question: one media source, its hint clips, and its accepted answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Opaque media source id resolved by the media provider
    pub vid: String,
    /// Display title, shown by authoring tools and at reveal
    pub title: String,
    /// Hint clips in reveal order
    pub parts: Vec<Part>,
    /// Accepted answers as uploaded, kept for the reveal broadcast
    pub candidates: Vec<String>,
    /// Case-folded accepted answers, built once at load for matching
    accepted: HashSet<String>,
}

impl Question {
    /// Checks whether an already case-folded guess is accepted for this question
    pub fn accepts(&self, folded_guess: &str) -> bool {
        self.accepted.contains(folded_guess)
    }

    /// Iterates over the case-folded accepted answers
    pub fn folded_candidates(&self) -> impl Iterator<Item = &str> {
        self.accepted.iter().map(String::as_str)
    }
}

/// A validated, normalized question set owned by a session
///
/// Immutable once loaded; the session shuffles a working copy of question
/// indices, never the set itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionSet {
    /// Question set title
    pub title: String,
    /// Question set author
    pub author: String,
    /// The questions in upload order
    pub questions: Vec<Question>,
    /// Case-folded distractor answers that match no question
    pub misleadings: Vec<String>,
}

impl QuestionSet {
    /// Number of questions in the set
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the set contains no questions (never true after validation)
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Validates an untrusted JSON document and normalizes it into a `QuestionSet`
    ///
    /// Walks the document in schema order and short-circuits with the error
    /// code of the first violation. The caller-supplied value is never
    /// mutated; on success a fresh normalized structure is returned with
    /// every candidate and misleading option case-folded exactly once.
    ///
    /// # Errors
    ///
    /// Returns the [`ErrorCode`] of the first structural violation.
    pub fn validate(raw: &Value) -> Result<QuestionSet, ErrorCode> {
        let title = require_str(
            raw,
            "title",
            ErrorCode::NoTitle,
            ErrorCode::TitleWrongType,
        )?;
        if title.chars().count() > MAX_STR_LEN {
            return Err(ErrorCode::TitleTooLong);
        }

        let author = require_str(
            raw,
            "author",
            ErrorCode::NoAuthor,
            ErrorCode::AuthorWrongType,
        )?;
        if author.chars().count() > MAX_STR_LEN {
            return Err(ErrorCode::AuthorTooLong);
        }

        let questions = raw.get("questions").ok_or(ErrorCode::NoQuestions)?;
        let questions = questions
            .as_array()
            .ok_or(ErrorCode::QuestionsWrongType)?;
        if questions.is_empty() {
            return Err(ErrorCode::EmptyQuestions);
        }

        let questions = questions
            .iter()
            .map(validate_question)
            .collect::<Result<Vec<_>, _>>()?;

        let misleadings = raw.get("misleadings").ok_or(ErrorCode::NoMisleadings)?;
        let misleadings = misleadings
            .as_array()
            .ok_or(ErrorCode::MisleadingsWrongType)?;
        let misleadings = misleadings
            .iter()
            .map(|option| {
                let option = option.as_str().ok_or(ErrorCode::MisleadingWrongType)?;
                if option.is_empty() {
                    return Err(ErrorCode::EmptyMisleading);
                }
                if option.chars().count() > MAX_STR_LEN {
                    return Err(ErrorCode::MisleadingTooLong);
                }
                Ok(option.to_lowercase())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QuestionSet {
            title: title.to_owned(),
            author: author.to_owned(),
            questions,
            misleadings,
        })
    }
}

fn require_str<'a>(
    object: &'a Value,
    field: &str,
    missing: ErrorCode,
    wrong_type: ErrorCode,
) -> Result<&'a str, ErrorCode> {
    let value = object.get(field).ok_or(missing)?;
    value.as_str().ok_or(wrong_type)
}

/// Checks a media source id: exact length, alphanumeric plus `_` and `-`
fn is_valid_vid(vid: &str) -> bool {
    let meaningful: String = vid.chars().filter(|c| *c != '_' && *c != '-').collect();
    vid.chars().count() == VID_LENGTH
        && !meaningful.is_empty()
        && meaningful.chars().all(char::is_alphanumeric)
}

fn validate_question(raw: &Value) -> Result<Question, ErrorCode> {
    if !raw.is_object() {
        return Err(ErrorCode::QuestionWrongType);
    }

    let vid = require_str(
        raw,
        "vid",
        ErrorCode::QuestionNoVid,
        ErrorCode::QuestionVidWrongType,
    )?;
    if !is_valid_vid(vid) {
        return Err(ErrorCode::QuestionVidBadFormat);
    }

    let title = require_str(
        raw,
        "title",
        ErrorCode::QuestionNoTitle,
        ErrorCode::QuestionTitleWrongType,
    )?;
    if title.is_empty() {
        return Err(ErrorCode::QuestionEmptyTitle);
    }
    if title.chars().count() > MAX_STR_LEN {
        return Err(ErrorCode::QuestionTitleTooLong);
    }

    let parts = raw.get("parts").ok_or(ErrorCode::QuestionNoParts)?;
    let parts = parts
        .as_array()
        .ok_or(ErrorCode::QuestionPartsWrongType)?;
    if parts.is_empty() {
        return Err(ErrorCode::QuestionEmptyParts);
    }
    let parts = parts
        .iter()
        .map(validate_part)
        .collect::<Result<Vec<_>, _>>()?;

    let candidates = raw.get("candidates").ok_or(ErrorCode::QuestionNoCandidates)?;
    let candidates = candidates
        .as_array()
        .ok_or(ErrorCode::QuestionCandidatesWrongType)?;
    if candidates.is_empty() {
        return Err(ErrorCode::QuestionEmptyCandidates);
    }
    let candidates = candidates
        .iter()
        .map(|candidate| {
            let candidate = candidate.as_str().ok_or(ErrorCode::CandidateWrongType)?;
            if candidate.is_empty() {
                return Err(ErrorCode::EmptyCandidate);
            }
            if candidate.chars().count() > MAX_STR_LEN {
                return Err(ErrorCode::CandidateTooLong);
            }
            Ok(candidate.to_owned())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let accepted = candidates
        .iter()
        .map(|candidate| candidate.to_lowercase())
        .collect();

    Ok(Question {
        vid: vid.to_owned(),
        title: title.to_owned(),
        parts,
        candidates,
        accepted,
    })
}

fn validate_part(raw: &Value) -> Result<Part, ErrorCode> {
    let pair = raw.as_array().ok_or(ErrorCode::PartWrongType)?;
    if pair.len() != 2 {
        return Err(ErrorCode::PartWrongLen);
    }
    let start_ms = pair[0].as_i64().ok_or(ErrorCode::PartWrongTimeType)?;
    let end_ms = pair[1].as_i64().ok_or(ErrorCode::PartWrongTimeType)?;
    if end_ms <= start_ms {
        return Err(ErrorCode::PartInvalidDuration);
    }
    Ok(Part { start_ms, end_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_set() -> Value {
        json!({
            "title": "City Pop Classics",
            "author": "dj_tester",
            "questions": [
                {
                    "vid": "dQw4w9WgXcQ",
                    "title": "Opening Theme",
                    "parts": [[0, 3000], [3000, 10_000]],
                    "candidates": ["Tokyo Drift", "tokyo drift (remix)"]
                },
                {
                    "vid": "abc123DEF45",
                    "title": "Ending Theme",
                    "parts": [[500, 4500]],
                    "candidates": ["Night Drive"]
                }
            ],
            "misleadings": ["Highway Star"]
        })
    }

    #[test]
    fn valid_set_normalizes_candidates() {
        let set = QuestionSet::validate(&sample_set()).unwrap();
        assert_eq!(set.title, "City Pop Classics");
        assert_eq!(set.len(), 2);
        assert!(set.questions[0].accepts("tokyo drift"));
        assert!(set.questions[0].accepts("tokyo drift (remix)"));
        assert!(!set.questions[0].accepts("Tokyo Drift"));
        assert_eq!(set.misleadings, vec!["highway star".to_owned()]);
        // Original casing survives for the reveal broadcast
        assert_eq!(set.questions[1].candidates, vec!["Night Drive".to_owned()]);
    }

    #[test]
    fn validation_leaves_input_untouched() {
        let raw = sample_set();
        let before = raw.clone();
        let _ = QuestionSet::validate(&raw).unwrap();
        assert_eq!(raw, before);
    }

    fn assert_code(raw: Value, expected: ErrorCode) {
        assert_eq!(QuestionSet::validate(&raw), Err(expected));
    }

    #[test]
    fn title_errors() {
        assert_code(json!({}), ErrorCode::NoTitle);
        assert_code(json!({"title": 5}), ErrorCode::TitleWrongType);
        assert_code(
            json!({"title": "x".repeat(101)}),
            ErrorCode::TitleTooLong,
        );
        assert_eq!(ErrorCode::NoTitle.code(), 100);
        assert_eq!(ErrorCode::TitleTooLong.code(), 102);
    }

    #[test]
    fn non_object_root_reports_missing_title() {
        assert_code(json!([1, 2, 3]), ErrorCode::NoTitle);
        assert_code(json!("just a string"), ErrorCode::NoTitle);
    }

    #[test]
    fn author_errors() {
        assert_code(json!({"title": "t"}), ErrorCode::NoAuthor);
        assert_code(json!({"title": "t", "author": []}), ErrorCode::AuthorWrongType);
        assert_code(
            json!({"title": "t", "author": "x".repeat(101)}),
            ErrorCode::AuthorTooLong,
        );
        assert_eq!(ErrorCode::NoAuthor.code(), 200);
    }

    #[test]
    fn questions_collection_errors() {
        let base = json!({"title": "t", "author": "a"});
        assert_code(base.clone(), ErrorCode::NoQuestions);

        let mut raw = base.clone();
        raw["questions"] = json!("nope");
        assert_code(raw, ErrorCode::QuestionsWrongType);

        let mut raw = base;
        raw["questions"] = json!([]);
        assert_code(raw, ErrorCode::EmptyQuestions);
        assert_eq!(ErrorCode::EmptyQuestions.code(), 302);
    }

    fn with_question(question: Value) -> Value {
        json!({
            "title": "t",
            "author": "a",
            "questions": [question],
            "misleadings": []
        })
    }

    #[test]
    fn question_errors() {
        assert_code(with_question(json!(7)), ErrorCode::QuestionWrongType);
        assert_code(with_question(json!({})), ErrorCode::QuestionNoVid);
        assert_code(
            with_question(json!({"vid": 11})),
            ErrorCode::QuestionVidWrongType,
        );
        assert_code(
            with_question(json!({"vid": "too short"})),
            ErrorCode::QuestionVidBadFormat,
        );
        assert_code(
            with_question(json!({"vid": "has spaces!!"})),
            ErrorCode::QuestionVidBadFormat,
        );
        assert_code(
            with_question(json!({"vid": "dQw4w9WgXcQ"})),
            ErrorCode::QuestionNoTitle,
        );
        assert_code(
            with_question(json!({"vid": "dQw4w9WgXcQ", "title": ""})),
            ErrorCode::QuestionEmptyTitle,
        );
        assert_eq!(ErrorCode::QuestionWrongType.code(), 3000);
        assert_eq!(ErrorCode::QuestionVidBadFormat.code(), 3102);
        assert_eq!(ErrorCode::QuestionTitleTooLong.code(), 3203);
    }

    #[test]
    fn part_errors() {
        let question = |parts: Value| {
            with_question(json!({
                "vid": "dQw4w9WgXcQ",
                "title": "q",
                "parts": parts,
                "candidates": ["a"]
            }))
        };
        assert_code(question(json!([])), ErrorCode::QuestionEmptyParts);
        assert_code(question(json!([{}])), ErrorCode::PartWrongType);
        assert_code(question(json!([[0, 1, 2]])), ErrorCode::PartWrongLen);
        assert_code(question(json!([[0.5, 3000]])), ErrorCode::PartWrongTimeType);
        assert_code(question(json!([["0", 3000]])), ErrorCode::PartWrongTimeType);
        assert_code(question(json!([[3000, 3000]])), ErrorCode::PartInvalidDuration);
        assert_code(question(json!([[3000, 100]])), ErrorCode::PartInvalidDuration);
        assert_eq!(ErrorCode::PartWrongType.code(), 33000);
        assert_eq!(ErrorCode::PartInvalidDuration.code(), 33003);
    }

    #[test]
    fn candidate_errors() {
        let question = |candidates: Value| {
            with_question(json!({
                "vid": "dQw4w9WgXcQ",
                "title": "q",
                "parts": [[0, 3000]],
                "candidates": candidates
            }))
        };
        assert_code(question(json!("x")), ErrorCode::QuestionCandidatesWrongType);
        assert_code(question(json!([])), ErrorCode::QuestionEmptyCandidates);
        assert_code(question(json!([1])), ErrorCode::CandidateWrongType);
        assert_code(question(json!([""])), ErrorCode::EmptyCandidate);
        assert_code(
            question(json!(["x".repeat(101)])),
            ErrorCode::CandidateTooLong,
        );
        assert_eq!(ErrorCode::CandidateWrongType.code(), 34000);
        assert_eq!(ErrorCode::CandidateTooLong.code(), 34002);
    }

    #[test]
    fn misleading_errors() {
        let base = |misleadings: Value| {
            json!({
                "title": "t",
                "author": "a",
                "questions": [{
                    "vid": "dQw4w9WgXcQ",
                    "title": "q",
                    "parts": [[0, 3000]],
                    "candidates": ["a"]
                }],
                "misleadings": misleadings
            })
        };
        let mut missing = base(json!([]));
        missing.as_object_mut().unwrap().remove("misleadings");
        assert_code(missing, ErrorCode::NoMisleadings);
        assert_code(base(json!({})), ErrorCode::MisleadingsWrongType);
        assert_code(base(json!([3])), ErrorCode::MisleadingWrongType);
        assert_code(base(json!([""])), ErrorCode::EmptyMisleading);
        assert_code(base(json!(["x".repeat(101)])), ErrorCode::MisleadingTooLong);
        // An empty misleadings list itself is fine
        assert!(QuestionSet::validate(&base(json!([]))).is_ok());
        assert_eq!(ErrorCode::NoMisleadings.code(), 400);
        assert_eq!(ErrorCode::EmptyMisleading.code(), 4001);
    }

    #[test]
    fn vid_of_only_separators_is_rejected() {
        assert_code(
            with_question(json!({"vid": "___________", "title": "q"})),
            ErrorCode::QuestionVidBadFormat,
        );
    }
}
