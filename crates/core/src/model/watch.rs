use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{UserId, VideoId};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a user's engagement with one video.
///
/// Transitions only move forward: `NotStarted -> InProgress -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchPhase {
    NotStarted,
    InProgress,
    Completed,
}

//
// ─── WATCH STATE ───────────────────────────────────────────────────────────────
//

/// Authoritative watch record for a (user, video) pair.
///
/// Only the tracker mutates this record (see `crate::tracker`). Fields are
/// private so `watched_seconds` monotonicity and completion stickiness can't
/// be bypassed by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchState {
    user_id: UserId,
    video_id: VideoId,
    watched_seconds: u32,
    last_position_sec: u32,
    is_completed: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl WatchState {
    /// Fresh record for a pair that has never been seen before.
    #[must_use]
    pub fn new(user_id: UserId, video_id: VideoId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            video_id,
            watched_seconds: 0,
            last_position_sec: 0,
            is_completed: false,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    /// Rehydrate a record from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        video_id: VideoId,
        watched_seconds: u32,
        last_position_sec: u32,
        is_completed: bool,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            video_id,
            watched_seconds,
            last_position_sec,
            is_completed,
            started_at,
            finished_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn phase(&self) -> WatchPhase {
        if self.is_completed {
            WatchPhase::Completed
        } else if self.watched_seconds > 0 || self.last_position_sec > 0 {
            WatchPhase::InProgress
        } else {
            WatchPhase::NotStarted
        }
    }

    /// Coarse progress shape kept for gating consumers that predate the
    /// single watch record.
    #[must_use]
    pub fn progress_view(&self) -> ProgressView {
        ProgressView {
            video_id: self.video_id,
            watched_seconds: self.watched_seconds,
            is_completed: self.is_completed,
            finished_at: self.finished_at,
        }
    }

    // Accessors
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn video_id(&self) -> VideoId {
        self.video_id
    }

    #[must_use]
    pub fn watched_seconds(&self) -> u32 {
        self.watched_seconds
    }

    #[must_use]
    pub fn last_position_sec(&self) -> u32 {
        self.last_position_sec
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Crate-internal mutation, driven by the tracker.
    pub(crate) fn set_watched_seconds(&mut self, value: u32) {
        self.watched_seconds = value;
    }

    pub(crate) fn set_last_position(&mut self, value: u32) {
        self.last_position_sec = value;
    }

    pub(crate) fn mark_completed(&mut self, at: DateTime<Utc>) {
        if !self.is_completed {
            self.is_completed = true;
            self.finished_at = Some(at);
        }
    }

    pub(crate) fn stamp_started(&mut self, at: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Derived progress flag for a (user, video) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub video_id: VideoId,
    pub watched_seconds: u32,
    pub is_completed: bool,
    pub finished_at: Option<DateTime<Utc>>,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_state_is_not_started() {
        let state = WatchState::new(UserId::new(1), VideoId::new(2), fixed_now());
        assert_eq!(state.phase(), WatchPhase::NotStarted);
        assert_eq!(state.watched_seconds(), 0);
        assert!(state.started_at().is_none());
    }

    #[test]
    fn mark_completed_is_sticky_and_stamps_once() {
        let now = fixed_now();
        let mut state = WatchState::new(UserId::new(1), VideoId::new(2), now);
        state.mark_completed(now);
        state.mark_completed(now + chrono::Duration::hours(1));
        assert_eq!(state.phase(), WatchPhase::Completed);
        assert_eq!(state.finished_at(), Some(now));
    }

    #[test]
    fn progress_view_mirrors_completion() {
        let now = fixed_now();
        let mut state = WatchState::new(UserId::new(1), VideoId::new(2), now);
        state.set_watched_seconds(30);
        let view = state.progress_view();
        assert_eq!(view.watched_seconds, 30);
        assert!(!view.is_completed);
        assert_eq!(state.phase(), WatchPhase::InProgress);
    }
}
