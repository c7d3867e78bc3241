use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use course_core::model::{Survey, SurveyId, UserId, Video, VideoId, WatchState, last_active};
use course_core::scoring::percent;
use course_core::settings::EngineSettings;
use course_core::unlock::{self, Stage, UnlockInputs, UnlockState, VideoGate};
use storage::repository::{
    CatalogRepository, ResponseRepository, UserRepository, WatchRepository,
};

use crate::Clock;
use crate::error::DashboardError;

//
// ─── PAYLOAD ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextVideo {
    pub id: VideoId,
    pub order: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTotals {
    pub total: u32,
    pub unlocked: u32,
    pub progress_pct: u32,
    pub next_video: Option<NextVideo>,
}

/// One row per active video, in sequence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardItem {
    pub video_id: VideoId,
    pub order: u32,
    pub title: String,
    pub survey_id: Option<SurveyId>,
    pub survey_title: Option<String>,
    pub survey_completed: bool,
    pub video_completed: bool,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyTotals {
    pub total: u32,
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpStatus {
    pub survey_id: SurveyId,
    pub title: String,
    pub completed: bool,
    pub needed: bool,
    pub available_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub videos: VideoTotals,
    pub stage: Stage,
    pub unlocked: Vec<VideoId>,
    pub items: Vec<DashboardItem>,
    pub video_surveys: SurveyTotals,
    pub follow_up: Option<FollowUpStatus>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Learner-facing progress overview.
#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    settings: EngineSettings,
    users: Arc<dyn UserRepository>,
    catalog: Arc<dyn CatalogRepository>,
    watch: Arc<dyn WatchRepository>,
    responses: Arc<dyn ResponseRepository>,
}

impl DashboardService {
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

    /// Unlock state only, without the presentation extras.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Storage` on repository failure.
    pub async fn unlock_state(&self, user_id: UserId) -> Result<UnlockState, DashboardError> {
        let snapshot = self.snapshot(user_id).await?;
        Ok(UnlockState::from_gates(&snapshot.gates()))
    }

    /// Build the caller's dashboard.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Storage` with `NotFound` for an unknown user,
    /// or on repository failure.
    #[tracing::instrument(skip(self))]
    pub async fn dashboard(&self, user_id: UserId) -> Result<Dashboard, DashboardError> {
        let snapshot = self.snapshot(user_id).await?;
        let gates = snapshot.gates();
        let state = UnlockState::from_gates(&gates);

        let titles: HashMap<VideoId, &Video> =
            snapshot.videos.iter().map(|v| (v.id(), v)).collect();
        let items: Vec<DashboardItem> = gates
            .iter()
            .map(|g| item(g, &titles, &snapshot.surveys))
            .collect();

        let total = count(gates.len());
        let unlocked = count(state.unlocked.len());
        let next_video = state
            .next_video
            .and_then(|id| titles.get(&id))
            .map(|v| NextVideo {
                id: v.id(),
                order: v.order(),
                title: v.title().to_owned(),
            });
        let video_surveys = SurveyTotals {
            total: count(gates.iter().filter(|g| g.survey_id.is_some()).count()),
            completed: count(gates.iter().filter(|g| g.survey_completed).count()),
        };

        Ok(Dashboard {
            videos: VideoTotals {
                total,
                unlocked,
                progress_pct: percent(unlocked, total),
                next_video,
            },
            stage: state.stage,
            follow_up: snapshot.follow_up(&self.settings, self.clock.now()),
            unlocked: state.unlocked,
            items,
            video_surveys,
        })
    }

    async fn snapshot(&self, user_id: UserId) -> Result<Snapshot, DashboardError> {
        self.users.get_user(user_id).await?;
        let videos = self.catalog.list_active_videos().await?;
        let surveys = self.catalog.list_active_surveys().await?;
        let watch = self.watch.watch_for_user(user_id).await?;
        let responded = self
            .responses
            .responses_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.survey_id)
            .collect();
        Ok(Snapshot {
            videos,
            surveys,
            watch,
            responded,
        })
    }
}

struct Snapshot {
    videos: Vec<Video>,
    surveys: Vec<Survey>,
    watch: Vec<WatchState>,
    responded: HashSet<SurveyId>,
}

impl Snapshot {
    fn gates(&self) -> Vec<VideoGate> {
        let video_surveys: HashMap<VideoId, SurveyId> = self
            .surveys
            .iter()
            .filter_map(|s| s.kind.video_id().map(|v| (v, s.id)))
            .collect();
        unlock::gates(&UnlockInputs {
            videos: &self.videos,
            watch: &self.watch,
            video_surveys: &video_surveys,
            responded: &self.responded,
        })
    }

    fn follow_up(&self, settings: &EngineSettings, now: DateTime<Utc>) -> Option<FollowUpStatus> {
        let survey = self.surveys.iter().find(|s| s.kind.is_follow_up())?;
        let anchor = last_active(&self.videos).and_then(|last| {
            self.watch
                .iter()
                .find(|w| w.video_id() == last.id())
                .and_then(WatchState::started_at)
        });
        let window =
            unlock::follow_up_window(anchor, self.responded.contains(&survey.id), settings, now);
        Some(FollowUpStatus {
            survey_id: survey.id,
            title: survey.title.clone(),
            completed: window.completed,
            needed: window.needed,
            available_at: window.available_at,
        })
    }
}

fn item(gate: &VideoGate, videos: &HashMap<VideoId, &Video>, surveys: &[Survey]) -> DashboardItem {
    let survey = gate
        .survey_id
        .and_then(|id| surveys.iter().find(|s| s.id == id));
    DashboardItem {
        video_id: gate.video_id,
        order: gate.order,
        title: videos
            .get(&gate.video_id)
            .map(|v| v.title().to_owned())
            .unwrap_or_default(),
        survey_id: gate.survey_id,
        survey_title: survey.map(|s| s.title.clone()),
        survey_completed: gate.survey_completed,
        video_completed: gate.video_completed,
        unlocked: gate.unlocked(),
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
