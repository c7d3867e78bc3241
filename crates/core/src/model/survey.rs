use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, SurveyId, UserId, VideoId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurveyKindError {
    #[error("unknown survey type: {0}")]
    Unknown(String),

    #[error("video surveys require a video id")]
    MissingVideo,
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// What a survey is attached to.
///
/// `Pre` and `Post` exist in historical data only; the engine never gates on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyKind {
    Pre,
    Post,
    Video {
        #[serde(rename = "videoId")]
        video_id: VideoId,
    },
    #[serde(rename = "FOLLOWUP")]
    FollowUp,
}

impl SurveyKind {
    /// Storage/wire label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SurveyKind::Pre => "PRE",
            SurveyKind::Post => "POST",
            SurveyKind::Video { .. } => "VIDEO",
            SurveyKind::FollowUp => "FOLLOWUP",
        }
    }

    /// Rebuilds a kind from its label and the optional video column.
    ///
    /// # Errors
    ///
    /// Returns `SurveyKindError::Unknown` for unrecognized labels and
    /// `SurveyKindError::MissingVideo` for a `VIDEO` label without a video id.
    pub fn from_parts(label: &str, video_id: Option<VideoId>) -> Result<Self, SurveyKindError> {
        match label.trim().to_ascii_uppercase().as_str() {
            "PRE" => Ok(SurveyKind::Pre),
            "POST" => Ok(SurveyKind::Post),
            "FOLLOWUP" => Ok(SurveyKind::FollowUp),
            "VIDEO" => video_id
                .map(|video_id| SurveyKind::Video { video_id })
                .ok_or(SurveyKindError::MissingVideo),
            other => Err(SurveyKindError::Unknown(other.to_owned())),
        }
    }

    #[must_use]
    pub fn video_id(&self) -> Option<VideoId> {
        match self {
            SurveyKind::Video { video_id } => Some(*video_id),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_follow_up(&self) -> bool {
        matches!(self, SurveyKind::FollowUp)
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: OptionId,
    pub order: u32,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub order: u32,
    pub text: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// The single option flagged correct, if the key is intact.
    #[must_use]
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.is_correct)
    }

    #[must_use]
    pub fn option(&self, id: OptionId) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == id)
    }
}

//
// ─── SURVEY ────────────────────────────────────────────────────────────────────
//

/// A survey together with its ordered questions and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: SurveyId,
    pub title: String,
    #[serde(flatten)]
    pub kind: SurveyKind,
    pub is_active: bool,
    pub questions: Vec<Question>,
}

impl Survey {
    /// Sorts questions and their options by ordinal, ties by id.
    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.questions.sort_by_key(|q| (q.order, q.id));
        for q in &mut self.questions {
            q.options.sort_by_key(|o| (o.order, o.id));
        }
        self
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Learner-facing projection that never exposes the answer key.
    #[must_use]
    pub fn public_view(&self) -> SurveyView {
        SurveyView {
            id: self.id,
            title: self.title.clone(),
            kind: self.kind,
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    id: q.id,
                    order: q.order,
                    text: q.text.clone(),
                    options: q
                        .options
                        .iter()
                        .map(|o| OptionView {
                            id: o.id,
                            order: o.order,
                            text: o.text.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyView {
    pub id: SurveyId,
    pub title: String,
    #[serde(flatten)]
    pub kind: SurveyKind,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub order: u32,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: OptionId,
    pub order: u32,
    pub text: String,
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

/// One chosen option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: QuestionId,
    pub option_id: OptionId,
}

/// The latest answer set a user submitted for a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub user_id: UserId,
    pub survey_id: SurveyId,
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// Builds a response keeping at most one answer per question.
    ///
    /// Answers pointing at questions or options the survey doesn't have are
    /// discarded; for repeated questions the first entry wins.
    #[must_use]
    pub fn normalized(
        survey: &Survey,
        user_id: UserId,
        answers: &[Answer],
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let mut seen = HashSet::new();
        let answers = answers
            .iter()
            .filter(|a| {
                survey
                    .question(a.question_id)
                    .is_some_and(|q| q.option(a.option_id).is_some())
            })
            .filter(|a| seen.insert(a.question_id))
            .copied()
            .collect();

        Self {
            user_id,
            survey_id: survey.id,
            answers,
            submitted_at,
        }
    }

    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<OptionId> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .map(|a| a.option_id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
