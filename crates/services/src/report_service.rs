use std::sync::Arc;

use serde::Serialize;

use course_core::model::{SurveyId, UserId, VideoId};
use course_core::report::{self, Report, ReportInputs, SurveyDetail, VideoDetail};
use course_core::settings::EngineSettings;
use storage::repository::{
    CatalogRepository, ResponseRepository, UserRepository, WatchRepository,
};

use crate::access::AccessService;
use crate::error::ReportError;

/// What a drill-down is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailTarget {
    Video(VideoId),
    Survey(SurveyId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserDetail {
    Video(VideoDetail),
    Survey(SurveyDetail),
}

/// Administrator reporting over every learner.
#[derive(Clone)]
pub struct ReportService {
    settings: EngineSettings,
    access: AccessService,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    watch: Arc<dyn WatchRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl ReportService {
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        access: AccessService,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        watch: Arc<dyn WatchRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            settings,
            access,
            users,
            catalog,
            watch,
            responses,
        }
    }

    /// Build the aggregated report from five bulk reads.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Access` for non-admin callers and
    /// `ReportError::Storage` on repository failure.
    #[tracing::instrument(skip(self))]
    pub async fn report(&self, actor: UserId) -> Result<Report, ReportError> {
        self.access.require_admin(actor).await?;

        let videos = self.catalog.list_active_videos().await?;
        let learners = self.users.list_learners().await?;
        let video_ids: Vec<VideoId> = videos.iter().map(|v| v.id()).collect();
        let watch = self.watch.watch_for_videos(&video_ids).await?;
        let surveys = self.catalog.list_active_surveys().await?;
        let survey_ids: Vec<SurveyId> = surveys.iter().map(|s| s.id).collect();
        let responses = self.responses.responses_for_surveys(&survey_ids).await?;

        let report = report::build_report(&ReportInputs {
            videos: &videos,
            learners: &learners,
            watch: &watch,
            surveys: &surveys,
            responses: &responses,
            settings: self.settings,
        });
        tracing::debug!(
            videos = report.videos.len(),
            learners = learners.len(),
            "report built"
        );
        Ok(report)
    }

    /// One learner's record for a video or a stand-alone survey.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::Access` for non-admin callers and
    /// `ReportError::Storage` with `NotFound` for unknown ids.
    #[tracing::instrument(skip(self))]
    pub async fn user_detail(
        &self,
        actor: UserId,
        target: DetailTarget,
        user_id: UserId,
    ) -> Result<UserDetail, ReportError> {
        self.access.require_admin(actor).await?;
        let user = self.users.get_user(user_id).await?;

        match target {
            DetailTarget::Video(video_id) => {
                let video = self.catalog.get_video(video_id).await?;
                let watch = self.watch.get_watch(user_id, video_id).await?;
                let survey = self.catalog.active_video_survey(video_id).await?;
                let response = match &survey {
                    Some(s) => self.responses.get_response(user_id, s.id).await?,
                    None => None,
                };
                Ok(UserDetail::Video(report::video_detail(
                    &user,
                    &video,
                    watch.as_ref(),
                    survey.as_ref(),
                    response.as_ref(),
                    &self.settings,
                )))
            }
            DetailTarget::Survey(survey_id) => {
                let survey = self.catalog.get_survey(survey_id).await?;
                let response = self.responses.get_response(user_id, survey_id).await?;
                Ok(UserDetail::Survey(report::survey_detail(
                    &user,
                    &survey,
                    response.as_ref(),
                )))
            }
        }
    }
}
