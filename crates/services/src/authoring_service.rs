use std::sync::Arc;

use course_core::answer_key::{self, QuestionDraft, SurveyDraft, SurveyError};
use course_core::model::{Survey, SurveyId, SurveyKind, UserId};
use storage::repository::{CatalogRepository, StorageError, SurveyPatch};

use crate::access::AccessService;
use crate::error::AuthoringError;

/// Administrator CRUD over surveys and their answer keys.
///
/// Every write is validated in full before storage is touched, so a rejected
/// draft leaves the catalog unchanged.
#[derive(Clone)]
pub struct SurveyAuthoringService {
    access: AccessService,
    catalog: Arc<dyn CatalogRepository>,
}

impl SurveyAuthoringService {
    #[must_use]
    pub fn new(access: AccessService, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { access, catalog }
    }

    /// Full survey including the answer key, for the authoring form.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Access` for non-admin callers and
    /// `AuthoringError::Storage` for unknown ids.
    pub async fn survey(&self, actor: UserId, id: SurveyId) -> Result<Survey, AuthoringError> {
        self.access.require_admin(actor).await?;
        Ok(self.catalog.get_survey(id).await?)
    }

    /// Every active survey, answer keys included.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Access` for non-admin callers.
    pub async fn list_surveys(&self, actor: UserId) -> Result<Vec<Survey>, AuthoringError> {
        self.access.require_admin(actor).await?;
        Ok(self.catalog.list_active_surveys().await?)
    }

    /// Validate and persist a new survey.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Survey` for malformed drafts,
    /// `AuthoringError::UnknownVideo` when a VIDEO survey points nowhere and
    /// `AuthoringError::ActiveSurveyExists` when the video already has one.
    #[tracing::instrument(skip(self, draft), fields(title = %draft.title, kind = %draft.kind))]
    pub async fn create_survey(
        &self,
        actor: UserId,
        draft: &SurveyDraft,
    ) -> Result<Survey, AuthoringError> {
        self.access.require_admin(actor).await?;
        let validated = answer_key::validate_survey(draft).inspect_err(|e| {
            tracing::warn!(error = %e, "survey draft rejected");
        })?;

        if let SurveyKind::Video { video_id } = validated.kind {
            match self.catalog.get_video(video_id).await {
                Ok(_) => {}
                Err(StorageError::NotFound) => return Err(AuthoringError::UnknownVideo(video_id)),
                Err(e) => return Err(e.into()),
            }
            if validated.is_active && self.catalog.active_video_survey(video_id).await?.is_some() {
                tracing::warn!(%video_id, "video already has an active survey");
                return Err(AuthoringError::ActiveSurveyExists(video_id));
            }
        }

        let created = self
            .catalog
            .create_survey(&validated)
            .await
            .map_err(|e| slot_conflict(e, validated.kind))?;
        tracing::info!(
            survey_id = %created.id,
            questions = created.questions.len(),
            "survey created"
        );
        Ok(created)
    }

    /// Replace the whole question set of a survey.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::AnswerKey` when any question is malformed and
    /// `AuthoringError::Storage` for unknown ids.
    #[tracing::instrument(skip(self, drafts), fields(questions = drafts.len()))]
    pub async fn replace_questions(
        &self,
        actor: UserId,
        id: SurveyId,
        drafts: &[QuestionDraft],
    ) -> Result<Survey, AuthoringError> {
        self.access.require_admin(actor).await?;
        let questions = answer_key::validate_questions(drafts).inspect_err(|e| {
            tracing::warn!(error = %e, "question set rejected");
        })?;
        let survey = self.catalog.replace_questions(id, &questions).await?;
        tracing::info!(questions = survey.questions.len(), "questions replaced");
        Ok(survey)
    }

    /// Change the title or active flag of a survey.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Survey` for a blank title and
    /// `AuthoringError::ActiveSurveyExists` when reactivation would give a
    /// video two active surveys.
    #[tracing::instrument(skip(self))]
    pub async fn update_survey(
        &self,
        actor: UserId,
        id: SurveyId,
        patch: SurveyPatch,
    ) -> Result<Survey, AuthoringError> {
        self.access.require_admin(actor).await?;
        let title = match patch.title.as_deref().map(str::trim) {
            Some("") => {
                tracing::warn!("blank survey title rejected");
                return Err(SurveyError::EmptyTitle.into());
            }
            other => other.map(str::to_owned),
        };
        let existing = self.catalog.get_survey(id).await?;
        let patch = SurveyPatch {
            title,
            is_active: patch.is_active,
        };
        let updated = self
            .catalog
            .update_survey(id, &patch)
            .await
            .map_err(|e| slot_conflict(e, existing.kind))?;
        tracing::info!(active = updated.is_active, "survey updated");
        Ok(updated)
    }

    /// Soft-delete: the survey stays for historical reports.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::Storage` for unknown ids.
    pub async fn deactivate_survey(
        &self,
        actor: UserId,
        id: SurveyId,
    ) -> Result<Survey, AuthoringError> {
        self.update_survey(
            actor,
            id,
            SurveyPatch {
                title: None,
                is_active: Some(false),
            },
        )
        .await
    }
}

fn slot_conflict(err: StorageError, kind: SurveyKind) -> AuthoringError {
    match (err, kind.video_id()) {
        (StorageError::Conflict, Some(video_id)) => AuthoringError::ActiveSurveyExists(video_id),
        (err, _) => err.into(),
    }
}
