//! Survey authoring validation.
//!
//! Drafts come straight from an administrator form. Blank questions and blank
//! options are dropped first, ordinals default to the 1-based input position,
//! and only then is the answer key checked: every surviving question needs at
//! least two options and exactly one marked correct. This is the only path
//! that produces `is_correct` values for storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{SurveyKind, SurveyKindError, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerKeyError {
    #[error("question {question}: at least 2 options are required, found {found}")]
    TooFewOptions { question: u32, found: usize },

    #[error("question {question}: exactly 1 correct option is required, found {found}")]
    CorrectCount { question: u32, found: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurveyError {
    #[error("survey title cannot be empty")]
    EmptyTitle,

    #[error("survey type is required")]
    MissingType,

    #[error(transparent)]
    Kind(#[from] SurveyKindError),

    #[error(transparent)]
    AnswerKey(#[from] AnswerKeyError),
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

/// A survey as submitted by the authoring form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDraft {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub video_id: Option<VideoId>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

fn default_active() -> bool {
    true
}

//
// ─── VALIDATED ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOption {
    pub order: u32,
    pub text: String,
    pub is_correct: bool,
}

/// A question whose answer key is known to be well formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub order: u32,
    pub text: String,
    pub options: Vec<ValidatedOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSurvey {
    pub title: String,
    pub kind: SurveyKind,
    pub is_active: bool,
    pub questions: Vec<ValidatedQuestion>,
}

//
// ─── VALIDATION ────────────────────────────────────────────────────────────────
//

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// Validates a whole survey draft.
///
/// # Errors
///
/// Returns `SurveyError::EmptyTitle`/`MissingType` for missing header fields,
/// `SurveyError::Kind` for an unknown type or a `VIDEO` survey without video,
/// and `SurveyError::AnswerKey` when any question breaks the answer key.
pub fn validate_survey(draft: &SurveyDraft) -> Result<ValidatedSurvey, SurveyError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(SurveyError::EmptyTitle);
    }
    if draft.kind.trim().is_empty() {
        return Err(SurveyError::MissingType);
    }
    let kind = SurveyKind::from_parts(&draft.kind, draft.video_id)?;
    let questions = validate_questions(&draft.questions)?;

    Ok(ValidatedSurvey {
        title: title.to_owned(),
        kind,
        is_active: draft.is_active,
        questions,
    })
}

/// Normalizes and validates a replacement question set.
///
/// # Errors
///
/// Returns the first `AnswerKeyError` in question order.
pub fn validate_questions(
    drafts: &[QuestionDraft],
) -> Result<Vec<ValidatedQuestion>, AnswerKeyError> {
    let questions: Vec<ValidatedQuestion> = drafts
        .iter()
        .enumerate()
        .filter_map(|(i, q)| {
            let text = q.text.trim();
            if text.is_empty() {
                return None;
            }
            let options = q
                .options
                .iter()
                .enumerate()
                .filter_map(|(j, o)| {
                    let text = o.text.trim();
                    (!text.is_empty()).then(|| ValidatedOption {
                        order: o.order.unwrap_or_else(|| position(j)),
                        text: text.to_owned(),
                        is_correct: o.is_correct,
                    })
                })
                .collect();
            Some(ValidatedQuestion {
                order: q.order.unwrap_or_else(|| position(i)),
                text: text.to_owned(),
                options,
            })
        })
        .collect();

    for q in &questions {
        check_answer_key(q)?;
    }
    Ok(questions)
}

fn check_answer_key(question: &ValidatedQuestion) -> Result<(), AnswerKeyError> {
    if question.options.len() < 2 {
        return Err(AnswerKeyError::TooFewOptions {
            question: question.order,
            found: question.options.len(),
        });
    }
    let correct = question.options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(AnswerKeyError::CorrectCount {
            question: question.order,
            found: correct,
        });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(text: &str, correct: bool) -> OptionDraft {
        OptionDraft {
            order: None,
            text: text.into(),
            is_correct: correct,
        }
    }

    fn question(text: &str, options: Vec<OptionDraft>) -> QuestionDraft {
        QuestionDraft {
            order: None,
            text: text.into(),
            options,
        }
    }

    fn draft(kind: &str, video: Option<u64>, questions: Vec<QuestionDraft>) -> SurveyDraft {
        SurveyDraft {
            title: "Knowledge check".into(),
            kind: kind.into(),
            video_id: video.map(VideoId::new),
            is_active: true,
            questions,
        }
    }

    #[test]
    fn accepts_well_formed_question() {
        let out = validate_questions(&[question(
            "2 + 2?",
            vec![opt("3", false), opt("4", true), opt("5", false)],
        )])
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].order, 1);
        assert_eq!(out[0].options.iter().filter(|o| o.is_correct).count(), 1);
        assert_eq!(out[0].options[2].order, 3);
    }

    #[test]
    fn rejects_zero_correct() {
        let err = validate_questions(&[question("q", vec![opt("a", false), opt("b", false)])])
            .unwrap_err();
        assert_eq!(err, AnswerKeyError::CorrectCount { question: 1, found: 0 });
    }

    #[test]
    fn rejects_two_correct() {
        let err = validate_questions(&[question("q", vec![opt("a", true), opt("b", true)])])
            .unwrap_err();
        assert_eq!(err, AnswerKeyError::CorrectCount { question: 1, found: 2 });
    }

    #[test]
    fn blank_options_do_not_count() {
        let err = validate_questions(&[question("q", vec![opt("a", true), opt("   ", false)])])
            .unwrap_err();
        assert_eq!(err, AnswerKeyError::TooFewOptions { question: 1, found: 1 });
    }

    #[test]
    fn blank_questions_are_dropped_but_keep_input_position() {
        let out = validate_questions(&[
            question("  ", vec![]),
            question("real", vec![opt("a", true), opt("b", false)]),
        ])
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].order, 2);
    }

    #[test]
    fn explicit_order_wins() {
        let mut q = question("q", vec![opt("a", true), opt("b", false)]);
        q.order = Some(7);
        assert_eq!(validate_questions(&[q]).unwrap()[0].order, 7);
    }

    #[test]
    fn survey_requires_title_and_type() {
        let mut d = draft("FOLLOWUP", None, vec![]);
        d.title = " ".into();
        assert_eq!(validate_survey(&d).unwrap_err(), SurveyError::EmptyTitle);

        let d = draft("", None, vec![]);
        assert_eq!(validate_survey(&d).unwrap_err(), SurveyError::MissingType);

        let d = draft("exit", None, vec![]);
        assert!(matches!(validate_survey(&d), Err(SurveyError::Kind(_))));
    }

    #[test]
    fn video_survey_requires_video() {
        let err = validate_survey(&draft("VIDEO", None, vec![])).unwrap_err();
        assert_eq!(err, SurveyError::Kind(SurveyKindError::MissingVideo));

        let ok = validate_survey(&draft("video", Some(3), vec![])).unwrap();
        assert_eq!(ok.kind.video_id(), Some(VideoId::new(3)));
    }

    #[test]
    fn draft_deserializes_from_form_json() {
        let d: SurveyDraft = serde_json::from_str(
            r#"{"title":"T","type":"VIDEO","videoId":2,
                "questions":[{"text":"q","options":[
                    {"text":"a","isCorrect":true},{"text":"b"}]}]}"#,
        )
        .unwrap();
        assert!(d.is_active);
        let v = validate_survey(&d).unwrap();
        assert_eq!(v.questions[0].options.len(), 2);
    }
}
