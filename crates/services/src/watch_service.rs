use std::sync::Arc;

use serde::{Deserialize, Serialize};

use course_core::model::{ProgressView, SurveyId, UserId, Video, VideoId, WatchState, last_active};
use course_core::settings::EngineSettings;
use course_core::tracker::{Tick, TickContext, TickError};
use storage::repository::{
    CatalogRepository, ResponseRepository, StorageError, UserRepository, WatchRepository,
};

use crate::Clock;
use crate::error::WatchServiceError;

/// Raw tick body as the player sends it. Numbers may be fractional or
/// negative; they are sanitized before reaching the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTick {
    #[serde(default)]
    pub delta_seconds: Option<f64>,
    #[serde(default)]
    pub last_position_sec: Option<f64>,
    #[serde(default)]
    pub is_completed: Option<bool>,
}

impl ClientTick {
    #[must_use]
    pub fn new(delta_seconds: f64, last_position_sec: f64, is_completed: bool) -> Self {
        Self {
            delta_seconds: Some(delta_seconds),
            last_position_sec: Some(last_position_sec),
            is_completed: Some(is_completed),
        }
    }

    /// # Errors
    ///
    /// Returns `TickError::MissingField` when a required number is absent.
    pub fn sanitize(self) -> Result<Tick, TickError> {
        Tick::from_client(self.delta_seconds, self.last_position_sec, self.is_completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPayload {
    pub id: VideoId,
    pub order: u32,
    pub title: String,
    pub url: Option<String>,
    pub duration_seconds: u32,
}

impl From<&Video> for VideoPayload {
    fn from(video: &Video) -> Self {
        Self {
            id: video.id(),
            order: video.order(),
            title: video.title().to_owned(),
            url: video.url().map(ToString::to_string),
            duration_seconds: video.duration_seconds(),
        }
    }
}

/// Whether the caller already answered the survey attached to a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSurveyStatus {
    pub survey_id: Option<SurveyId>,
    pub already_filled: bool,
}

/// Everything the player page needs when a learner opens a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAccess {
    pub video: VideoPayload,
    pub progress: ProgressView,
    pub survey: VideoSurveyStatus,
}

/// Applies player ticks and serves per-video state.
#[derive(Clone)]
pub struct WatchService {
    clock: Clock,
    settings: EngineSettings,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    watch: Arc<dyn WatchRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl WatchService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: EngineSettings,
        users: Arc<dyn UserRepository>,
        catalog: Arc<dyn CatalogRepository>,
        watch: Arc<dyn WatchRepository>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            users,
            catalog,
            watch,
            responses,
        }
    }

    /// Fold one client tick into the caller's watch record.
    ///
    /// Ticks are safe to retry: watched time never decreases, never exceeds
    /// the duration, and completion is sticky.
    ///
    /// # Errors
    ///
    /// Returns `WatchServiceError::Tick` when required fields are missing,
    /// `WatchServiceError::VideoUnavailable` for an unknown or retired video,
    /// and `WatchServiceError::Storage` on repository failure.
    #[tracing::instrument(skip(self))]
    pub async fn record_tick(
        &self,
        user_id: UserId,
        video_id: VideoId,
        tick: ClientTick,
    ) -> Result<WatchState, WatchServiceError> {
        let tick = tick.sanitize()?;
        self.users.get_user(user_id).await?;
        let video = self.active_video(video_id).await?;
        let ctx = self.context(&video).await?;

        let transition = self.watch.apply_tick(user_id, video_id, tick, ctx).await?;
        tracing::debug!(
            delta = tick.delta_seconds,
            position = tick.last_position_sec,
            watched = transition.state.watched_seconds(),
            "tick merged"
        );
        if transition.newly_completed {
            tracing::info!(order = video.order(), "video completed");
        }
        Ok(transition.state)
    }

    /// Serve the player page for one video.
    ///
    /// Opening the last video of the sequence counts as its first access and
    /// anchors the follow-up window; other videos are read without writing.
    ///
    /// # Errors
    ///
    /// Returns `WatchServiceError::VideoUnavailable` for an unknown or retired
    /// video and `WatchServiceError::Storage` on repository failure.
    #[tracing::instrument(skip(self))]
    pub async fn open_video(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<VideoAccess, WatchServiceError> {
        self.users.get_user(user_id).await?;
        let video = self.active_video(video_id).await?;
        let ctx = self.context(&video).await?;

        let state = if ctx.anchors_followup {
            Some(self.watch.record_open(user_id, video_id, ctx).await?)
        } else {
            self.watch.get_watch(user_id, video_id).await?
        };

        Ok(VideoAccess {
            progress: progress_or_empty(video_id, state.as_ref()),
            survey: self.survey_status(user_id, video_id).await?,
            video: VideoPayload::from(&video),
        })
    }

    /// The active survey attached to a video and whether the caller filled it.
    ///
    /// # Errors
    ///
    /// Returns `WatchServiceError::VideoUnavailable` for an unknown or retired
    /// video and `WatchServiceError::Storage` on repository failure.
    pub async fn video_survey(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<VideoSurveyStatus, WatchServiceError> {
        self.users.get_user(user_id).await?;
        self.active_video(video_id).await?;
        self.survey_status(user_id, video_id).await
    }

    /// Coarse per-video progress derived from the watch record.
    ///
    /// # Errors
    ///
    /// Returns `WatchServiceError::VideoUnavailable` for an unknown or retired
    /// video and `WatchServiceError::Storage` on repository failure.
    pub async fn progress(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<ProgressView, WatchServiceError> {
        self.users.get_user(user_id).await?;
        self.active_video(video_id).await?;
        let state = self.watch.get_watch(user_id, video_id).await?;
        Ok(progress_or_empty(video_id, state.as_ref()))
    }

    async fn active_video(&self, video_id: VideoId) -> Result<Video, WatchServiceError> {
        match self.catalog.get_video(video_id).await {
            Ok(video) if video.is_active() => Ok(video),
            Ok(_) | Err(StorageError::NotFound) => Err(WatchServiceError::VideoUnavailable),
            Err(e) => Err(e.into()),
        }
    }

    async fn context(&self, video: &Video) -> Result<TickContext, WatchServiceError> {
        let active = self.catalog.list_active_videos().await?;
        Ok(TickContext {
            duration_seconds: video.duration_seconds(),
            settings: self.settings,
            now: self.clock.now(),
            anchors_followup: last_active(&active).is_some_and(|last| last.id() == video.id()),
        })
    }

    async fn survey_status(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<VideoSurveyStatus, WatchServiceError> {
        let Some(survey) = self.catalog.active_video_survey(video_id).await? else {
            return Ok(VideoSurveyStatus {
                survey_id: None,
                already_filled: false,
            });
        };
        let filled = self.responses.get_response(user_id, survey.id).await?;
        Ok(VideoSurveyStatus {
            survey_id: Some(survey.id),
            already_filled: filled.is_some(),
        })
    }
}

fn progress_or_empty(video_id: VideoId, state: Option<&WatchState>) -> ProgressView {
    state.map_or(
        ProgressView {
            video_id,
            watched_seconds: 0,
            is_completed: false,
            finished_at: None,
        },
        WatchState::progress_view,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{Role, User};
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::Storage;

    async fn setup() -> (WatchService, Storage) {
        let storage = Storage::in_memory();
        storage
            .users
            .upsert_user(&User::new(UserId::new(1), "a@example.com", Role::Learner))
            .await
            .unwrap();
        for i in 1..=3 {
            let order = u32::try_from(i).unwrap();
            let video =
                Video::new(VideoId::new(i), order, format!("v{i}"), None, 600, true).unwrap();
            storage.catalog.upsert_video(&video).await.unwrap();
        }
        let service = WatchService::new(
            fixed_clock(),
            EngineSettings::default(),
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.watch),
            Arc::clone(&storage.responses),
        );
        (service, storage)
    }

    #[tokio::test]
    async fn missing_delta_is_rejected() {
        let (service, _) = setup().await;
        let tick = ClientTick {
            last_position_sec: Some(3.0),
            ..ClientTick::default()
        };
        let err = service
            .record_tick(UserId::new(1), VideoId::new(1), tick)
            .await
            .unwrap_err();
        assert!(matches!(err, WatchServiceError::Tick(_)));
    }

    #[tokio::test]
    async fn negative_and_fractional_numbers_are_sanitized() {
        let (service, _) = setup().await;
        let state = service
            .record_tick(UserId::new(1), VideoId::new(1), ClientTick::new(-4.0, 12.9, false))
            .await
            .unwrap();
        assert_eq!(state.watched_seconds(), 0);
        assert_eq!(state.last_position_sec(), 12);
    }

    #[tokio::test]
    async fn retired_video_is_unavailable() {
        let (service, storage) = setup().await;
        let retired = storage
            .catalog
            .get_video(VideoId::new(2))
            .await
            .unwrap()
            .deactivated();
        storage.catalog.upsert_video(&retired).await.unwrap();

        let err = service
            .record_tick(UserId::new(1), VideoId::new(2), ClientTick::new(5.0, 5.0, false))
            .await
            .unwrap_err();
        assert!(matches!(err, WatchServiceError::VideoUnavailable));
        assert!(matches!(
            service.open_video(UserId::new(1), VideoId::new(42)).await,
            Err(WatchServiceError::VideoUnavailable)
        ));
    }

    #[tokio::test]
    async fn opening_only_the_last_video_writes_a_record() {
        let (service, storage) = setup().await;

        let first = service.open_video(UserId::new(1), VideoId::new(1)).await.unwrap();
        assert_eq!(first.progress.watched_seconds, 0);
        assert!(storage.watch.get_watch(UserId::new(1), VideoId::new(1)).await.unwrap().is_none());

        let last = service.open_video(UserId::new(1), VideoId::new(3)).await.unwrap();
        assert_eq!(last.video.order, 3);
        let stored = storage
            .watch
            .get_watch(UserId::new(1), VideoId::new(3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.started_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn progress_defaults_to_zero() {
        let (service, _) = setup().await;
        let view = service.progress(UserId::new(1), VideoId::new(2)).await.unwrap();
        assert_eq!(view.watched_seconds, 0);
        assert!(!view.is_completed);
    }

    #[tokio::test]
    async fn survey_and_progress_lookups_reject_unavailable_videos() {
        let (service, storage) = setup().await;
        let retired = storage
            .catalog
            .get_video(VideoId::new(3))
            .await
            .unwrap()
            .deactivated();
        storage.catalog.upsert_video(&retired).await.unwrap();

        for video in [VideoId::new(3), VideoId::new(999)] {
            assert!(matches!(
                service.video_survey(UserId::new(1), video).await,
                Err(WatchServiceError::VideoUnavailable)
            ));
            assert!(matches!(
                service.progress(UserId::new(1), video).await,
                Err(WatchServiceError::VideoUnavailable)
            ));
        }

        let status = service.video_survey(UserId::new(1), VideoId::new(1)).await.unwrap();
        assert_eq!(status.survey_id, None);
        assert!(!status.already_filled);
    }

    #[tokio::test]
    async fn progress_requires_a_known_user() {
        let (service, _) = setup().await;
        let err = service
            .progress(UserId::new(77), VideoId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WatchServiceError::Storage(StorageError::NotFound)));
    }
}
