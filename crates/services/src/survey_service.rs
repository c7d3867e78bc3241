use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use course_core::model::{Answer, Survey, SurveyId, SurveyResponse, SurveyView, UserId};
use course_core::scoring::{self, Score};
use storage::repository::{CatalogRepository, ResponseRepository, UserRepository};

use crate::Clock;
use crate::error::SurveyServiceError;

/// The caller's previous submission, re-scored against the current key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousAnswers {
    pub answers: Vec<Answer>,
    pub submitted_at: DateTime<Utc>,
    pub score: Score,
}

/// A survey as a learner sees it. Never carries the answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyForUser {
    pub survey: SurveyView,
    pub previous: Option<PreviousAnswers>,
}

/// Serves surveys to learners and scores their submissions.
#[derive(Clone)]
pub struct SurveyService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl SurveyService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            clock,
            users,
            catalog,
            responses,
        }
    }

    /// Fetch an active survey with the caller's prior answers, if any.
    ///
    /// # Errors
    ///
    /// Returns `SurveyServiceError::Inactive` for a retired survey and
    /// `SurveyServiceError::Storage` with `NotFound` for unknown ids.
    #[tracing::instrument(skip(self))]
    pub async fn get_survey(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> Result<SurveyForUser, SurveyServiceError> {
        self.users.get_user(user_id).await?;
        let survey = self.active_survey(survey_id).await?;
        let previous = self
            .responses
            .get_response(user_id, survey_id)
            .await?
            .map(|r| PreviousAnswers {
                score: scoring::score(&survey, &r.answers),
                submitted_at: r.submitted_at,
                answers: r.answers,
            });

        Ok(SurveyForUser {
            survey: survey.public_view(),
            previous,
        })
    }

    /// Store the caller's answers, replacing any earlier submission, and
    /// return the score.
    ///
    /// Answers for unknown questions or options are ignored; a question
    /// answered twice keeps its first answer.
    ///
    /// # Errors
    ///
    /// Returns `SurveyServiceError::Inactive` for a retired survey and
    /// `SurveyServiceError::Storage` for unknown ids or repository failure.
    #[tracing::instrument(skip(self, answers), fields(answer_count = answers.len()))]
    pub async fn submit(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
        answers: &[Answer],
    ) -> Result<Score, SurveyServiceError> {
        self.users.get_user(user_id).await?;
        let survey = self.active_survey(survey_id).await?;
        let response = SurveyResponse::normalized(&survey, user_id, answers, self.clock.now());
        self.responses.upsert_response(&response).await?;

        let score = scoring::score(&survey, &response.answers);
        tracing::info!(
            kind = survey.kind.label(),
            correct = score.correct,
            total = score.total,
            "survey submitted"
        );
        Ok(score)
    }

    async fn active_survey(&self, survey_id: SurveyId) -> Result<Survey, SurveyServiceError> {
        let survey = self.catalog.get_survey(survey_id).await?;
        if survey.is_active {
            Ok(survey)
        } else {
            Err(SurveyServiceError::Inactive)
        }
    }
}
