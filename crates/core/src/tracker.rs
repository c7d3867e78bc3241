//! Watch-progress transition function.
//!
//! Client ticks are untrusted: they may be duplicated, arrive after a seek-back
//! or carry a completion hint the player emitted too early. `advance` folds a
//! tick into the previous `WatchState` while keeping three guarantees:
//!
//! - `watched_seconds` never decreases and never exceeds the video duration;
//! - completion is sticky, and stamps `finished_at` exactly once;
//! - a zero-delta tick only moves `last_position_sec`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::WatchState;
use crate::settings::EngineSettings;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TickError {
    #[error("tick is missing required field `{0}`")]
    MissingField(&'static str),
}

//
// ─── TICK ──────────────────────────────────────────────────────────────────────
//

/// A sanitized client tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub delta_seconds: u32,
    pub last_position_sec: u32,
    pub completion_requested: bool,
}

impl Tick {
    #[must_use]
    pub fn new(delta_seconds: u32, last_position_sec: u32, completion_requested: bool) -> Self {
        Self {
            delta_seconds,
            last_position_sec,
            completion_requested,
        }
    }

    /// Builds a tick from raw client numbers.
    ///
    /// Negative, NaN and infinite values are clamped to zero and fractional
    /// seconds are floored; only a missing field is an error.
    ///
    /// # Errors
    ///
    /// Returns `TickError::MissingField` when `delta_seconds` or
    /// `last_position_sec` is absent.
    pub fn from_client(
        delta_seconds: Option<f64>,
        last_position_sec: Option<f64>,
        completion_requested: Option<bool>,
    ) -> Result<Self, TickError> {
        let delta = delta_seconds.ok_or(TickError::MissingField("deltaSeconds"))?;
        let position = last_position_sec.ok_or(TickError::MissingField("lastPositionSec"))?;
        Ok(Self {
            delta_seconds: clamp_seconds(delta),
            last_position_sec: clamp_seconds(position),
            completion_requested: completion_requested.unwrap_or(false),
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_seconds(raw: f64) -> u32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    let floored = raw.floor();
    if floored >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        floored as u32
    }
}

//
// ─── TRANSITION ────────────────────────────────────────────────────────────────
//

/// Inputs to a transition that don't come from the client.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub duration_seconds: u32,
    pub settings: EngineSettings,
    pub now: DateTime<Utc>,
    /// True when the video is the last active one in the sequence; its first
    /// access anchors the follow-up window.
    pub anchors_followup: bool,
}

/// Result of folding a tick into a watch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: WatchState,
    pub newly_completed: bool,
}

/// Folds `tick` into `previous`, returning the next authoritative state.
#[must_use]
pub fn advance(previous: WatchState, tick: Tick, ctx: &TickContext) -> Transition {
    let duration = ctx.duration_seconds;
    let threshold = ctx.settings.end_threshold(duration);
    let was_completed = previous.is_completed();

    let mut state = previous;
    let accumulated = state
        .watched_seconds()
        .saturating_add(tick.delta_seconds)
        .min(duration);

    let reached_end = duration > 0 && tick.last_position_sec >= threshold;
    let completes = (tick.completion_requested && reached_end)
        || (duration > 0 && accumulated >= threshold);

    state.set_last_position(tick.last_position_sec.min(duration));
    if ctx.anchors_followup {
        state.stamp_started(ctx.now);
    }

    if was_completed || completes {
        state.mark_completed(ctx.now);
        state.set_watched_seconds(duration);
    } else {
        state.set_watched_seconds(accumulated);
    }
    state.touch(ctx.now);

    Transition {
        newly_completed: !was_completed && state.is_completed(),
        state,
    }
}

/// Records a first access without playback (opening the video page).
#[must_use]
pub fn open(previous: WatchState, ctx: &TickContext) -> WatchState {
    let mut state = previous;
    if ctx.anchors_followup && state.started_at().is_none() {
        state.stamp_started(ctx.now);
        state.touch(ctx.now);
    }
    state
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UserId, VideoId, WatchPhase};
    use crate::time::fixed_now;

    fn ctx(duration: u32) -> TickContext {
        TickContext {
            duration_seconds: duration,
            settings: EngineSettings::default(),
            now: fixed_now(),
            anchors_followup: false,
        }
    }

    fn fresh() -> WatchState {
        WatchState::new(UserId::new(1), VideoId::new(1), fixed_now())
    }

    fn run(ticks: &[Tick], duration: u32) -> WatchState {
        let c = ctx(duration);
        ticks
            .iter()
            .fold(fresh(), |state, tick| advance(state, *tick, &c).state)
    }

    #[test]
    fn from_client_clamps_untrusted_values() {
        let tick = Tick::from_client(Some(-3.0), Some(12.9), None).unwrap();
        assert_eq!(tick, Tick::new(0, 12, false));

        let tick = Tick::from_client(Some(f64::NAN), Some(f64::INFINITY), Some(true)).unwrap();
        assert_eq!(tick, Tick::new(0, 0, true));
    }

    #[test]
    fn from_client_requires_fields() {
        assert_eq!(
            Tick::from_client(None, Some(1.0), None).unwrap_err(),
            TickError::MissingField("deltaSeconds")
        );
        assert_eq!(
            Tick::from_client(Some(1.0), None, None).unwrap_err(),
            TickError::MissingField("lastPositionSec")
        );
    }

    #[test]
    fn accumulates_deltas() {
        let state = run(&[Tick::new(10, 10, false), Tick::new(15, 25, false)], 600);
        assert_eq!(state.watched_seconds(), 25);
        assert_eq!(state.last_position_sec(), 25);
        assert_eq!(state.phase(), WatchPhase::InProgress);
    }

    #[test]
    fn seek_back_never_decreases_total() {
        let state = run(&[Tick::new(100, 100, false), Tick::new(0, 5, false)], 600);
        assert_eq!(state.watched_seconds(), 100);
        assert_eq!(state.last_position_sec(), 5);
    }

    #[test]
    fn duplicate_zero_delta_ticks_are_idempotent() {
        let c = ctx(600);
        let once = advance(fresh(), Tick::new(30, 30, false), &c).state;
        let twice = advance(once.clone(), Tick::new(0, 30, false), &c).state;
        let thrice = advance(twice.clone(), Tick::new(0, 30, false), &c).state;
        assert_eq!(once, twice);
        assert_eq!(twice, thrice);
    }

    #[test]
    fn total_is_clamped_to_duration() {
        let state = run(&[Tick::new(50, 50, false), Tick::new(50, 80, false)], 60);
        assert!(state.watched_seconds() <= 60);
    }

    #[test]
    fn completion_hint_without_reaching_end_is_ignored() {
        let state = run(&[Tick::new(10, 100, true)], 600);
        assert!(!state.is_completed());
        assert_eq!(state.watched_seconds(), 10);
        assert!(state.finished_at().is_none());
    }

    #[test]
    fn reaching_end_with_hint_snaps_to_duration() {
        let mut ticks: Vec<Tick> = (0..59).map(|i| Tick::new(10, (i + 1) * 10, false)).collect();
        assert_eq!(ticks.iter().map(|t| t.delta_seconds).sum::<u32>(), 590);
        ticks.push(Tick::new(0, 598, true));

        let state = run(&ticks, 600);
        assert!(state.is_completed());
        assert_eq!(state.watched_seconds(), 600);
        assert_eq!(state.finished_at(), Some(fixed_now()));
    }

    #[test]
    fn accumulated_total_alone_completes() {
        let state = run(&[Tick::new(596, 200, false)], 600);
        assert!(state.is_completed());
        assert_eq!(state.watched_seconds(), 600);
    }

    #[test]
    fn completion_is_sticky() {
        let c = ctx(600);
        let done = advance(fresh(), Tick::new(600, 600, true), &c);
        assert!(done.newly_completed);

        let later = TickContext {
            now: fixed_now() + chrono::Duration::minutes(5),
            ..c
        };
        let after = advance(done.state, Tick::new(0, 3, false), &later);
        assert!(!after.newly_completed);
        assert!(after.state.is_completed());
        assert_eq!(after.state.watched_seconds(), 600);
        assert_eq!(after.state.finished_at(), Some(fixed_now()));
    }

    #[test]
    fn zero_duration_video_never_completes() {
        let state = run(&[Tick::new(10, 10, true)], 0);
        assert!(!state.is_completed());
        assert_eq!(state.watched_seconds(), 0);
    }

    #[test]
    fn started_at_is_stamped_once_for_anchor_video() {
        let c = TickContext {
            anchors_followup: true,
            ..ctx(600)
        };
        let first = advance(fresh(), Tick::new(5, 5, false), &c).state;
        assert_eq!(first.started_at(), Some(fixed_now()));

        let later = TickContext {
            now: fixed_now() + chrono::Duration::days(3),
            ..c
        };
        let second = advance(first, Tick::new(5, 10, false), &later).state;
        assert_eq!(second.started_at(), Some(fixed_now()));
    }

    #[test]
    fn non_anchor_video_never_stamps_started_at() {
        let state = run(&[Tick::new(5, 5, false)], 600);
        assert!(state.started_at().is_none());
    }

    #[test]
    fn open_only_stamps_anchor_video() {
        let anchor = TickContext {
            anchors_followup: true,
            ..ctx(600)
        };
        assert_eq!(open(fresh(), &anchor).started_at(), Some(fixed_now()));
        assert!(open(fresh(), &ctx(600)).started_at().is_none());
    }
}
