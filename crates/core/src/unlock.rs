//! Unlock/stage calculation and the follow-up window.
//!
//! A video counts toward progress once its watch record is completed *or* the
//! learner has answered the video's survey; answering first is a legitimate
//! race with the player's completion tick and must not be penalized.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{SurveyId, Video, VideoId, WatchState};
use crate::settings::EngineSettings;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StageError {
    #[error("stage must be between 1 and 5, got {0}")]
    OutOfRange(u8),
}

//
// ─── STAGE ─────────────────────────────────────────────────────────────────────
//

/// Coarse 1..=5 progress bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stage(u8);

impl Stage {
    pub const MIN: Stage = Stage(1);
    pub const MAX: Stage = Stage(5);

    /// Step function over the unlocked count: thresholds 2, 4, 6 and 8, each
    /// reached at `>=`. Zero or one unlocked video is stage 1.
    #[must_use]
    pub fn from_unlocked(count: usize) -> Self {
        match count {
            0..=1 => Stage(1),
            2..=3 => Stage(2),
            4..=5 => Stage(3),
            6..=7 => Stage(4),
            _ => Stage(5),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Stage {
    type Error = StageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(Stage(value))
        } else {
            Err(StageError::OutOfRange(value))
        }
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── GATES ─────────────────────────────────────────────────────────────────────
//

/// Gating facts for one active video, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoGate {
    pub video_id: VideoId,
    pub order: u32,
    pub survey_id: Option<SurveyId>,
    pub video_completed: bool,
    pub survey_completed: bool,
}

impl VideoGate {
    #[must_use]
    pub fn unlocked(&self) -> bool {
        self.video_completed || self.survey_completed
    }
}

/// Everything the calculator reads for one learner.
#[derive(Debug, Clone, Copy)]
pub struct UnlockInputs<'a> {
    pub videos: &'a [Video],
    pub watch: &'a [WatchState],
    /// Active VIDEO survey per video.
    pub video_surveys: &'a HashMap<VideoId, SurveyId>,
    /// Surveys this learner has a response for.
    pub responded: &'a HashSet<SurveyId>,
}

/// Gates for every active video, ascending by `order`.
#[must_use]
pub fn gates(inputs: &UnlockInputs<'_>) -> Vec<VideoGate> {
    let completed: HashSet<VideoId> = inputs
        .watch
        .iter()
        .filter(|w| w.is_completed())
        .map(WatchState::video_id)
        .collect();

    crate::model::active_in_order(inputs.videos)
        .iter()
        .map(|v| {
            let survey_id = inputs.video_surveys.get(&v.id()).copied();
            VideoGate {
                video_id: v.id(),
                order: v.order(),
                survey_id,
                video_completed: completed.contains(&v.id()),
                survey_completed: survey_id.is_some_and(|s| inputs.responded.contains(&s)),
            }
        })
        .collect()
}

//
// ─── UNLOCK STATE ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockState {
    pub unlocked: Vec<VideoId>,
    pub next_video: Option<VideoId>,
    pub stage: Stage,
}

impl UnlockState {
    #[must_use]
    pub fn from_gates(gates: &[VideoGate]) -> Self {
        let unlocked: Vec<VideoId> = gates
            .iter()
            .filter(|g| g.unlocked())
            .map(|g| g.video_id)
            .collect();
        let next_video = gates.iter().find(|g| !g.unlocked()).map(|g| g.video_id);
        Self {
            stage: Stage::from_unlocked(unlocked.len()),
            unlocked,
            next_video,
        }
    }

    #[must_use]
    pub fn is_unlocked(&self, video_id: VideoId) -> bool {
        self.unlocked.contains(&video_id)
    }
}

#[must_use]
pub fn compute_unlock_state(inputs: &UnlockInputs<'_>) -> UnlockState {
    UnlockState::from_gates(&gates(inputs))
}

//
// ─── FOLLOW-UP WINDOW ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpWindow {
    pub available_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub needed: bool,
}

/// Follow-up availability anchored on the last video's `started_at`.
///
/// `needed` holds once `available_at` has passed and no response exists.
#[must_use]
pub fn follow_up_window(
    anchor: Option<DateTime<Utc>>,
    responded: bool,
    settings: &EngineSettings,
    now: DateTime<Utc>,
) -> FollowUpWindow {
    let available_at =
        anchor.and_then(|a| a.checked_add_months(Months::new(settings.followup_window_months())));
    FollowUpWindow {
        available_at,
        completed: responded,
        needed: !responded && available_at.is_some_and(|at| now >= at),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
