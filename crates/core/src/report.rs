//! Administrator report aggregation.
//!
//! Callers load every record in a handful of bulk reads; the functions here
//! index them by `(user, video)` and `(user, survey)` once and join in memory.
//! A learner appears under a video only when they have a watch record for it
//! or a response to its survey.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{
    Survey, SurveyId, SurveyKind, SurveyResponse, User, UserId, Video, VideoId, WatchState,
};
use crate::scoring::{self, AnswerKey, QuestionBreakdown, Score};
use crate::settings::EngineSettings;

//
// ─── ROW PARTS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: UserId,
    pub email: String,
}

impl From<&User> for UserRef {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    pub id: VideoId,
    pub order: u32,
    pub title: String,
    pub duration_seconds: u32,
}

impl From<&Video> for VideoRef {
    fn from(video: &Video) -> Self {
        Self {
            id: video.id(),
            order: video.order(),
            title: video.title().to_owned(),
            duration_seconds: video.duration_seconds(),
        }
    }
}

/// Report-side view of a watch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSummary {
    pub duration_seconds: u32,
    pub watched_seconds: u32,
    pub watched_pct: u32,
    pub is_completed: bool,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_position_sec: u32,
}

impl WatchSummary {
    /// Summarizes `watch` against the video's authoritative duration.
    ///
    /// A record within the tolerance of the end counts as completed even if
    /// the tracker never flagged it; completed rows always report 100%.
    #[must_use]
    pub fn summarize(
        duration_seconds: u32,
        watch: Option<&WatchState>,
        settings: &EngineSettings,
    ) -> Self {
        let raw = watch.map_or(0, WatchState::watched_seconds);
        let watched_seconds = if duration_seconds > 0 {
            raw.min(duration_seconds)
        } else {
            raw
        };
        let by_time =
            duration_seconds > 0 && watched_seconds >= settings.end_threshold(duration_seconds);
        let is_completed = watch.is_some_and(WatchState::is_completed) || by_time;
        let watched_pct = match (duration_seconds, is_completed) {
            (0, _) => 0,
            (_, true) => 100,
            (d, false) => scoring::percent(watched_seconds, d),
        };
        let finished_at = if is_completed {
            watch.map(|w| w.finished_at().unwrap_or_else(|| w.updated_at()))
        } else {
            None
        };

        Self {
            duration_seconds,
            watched_seconds,
            watched_pct,
            is_completed,
            finished_at,
            last_position_sec: watch.map_or(0, WatchState::last_position_sec),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub survey_id: Option<SurveyId>,
    pub title: Option<String>,
    pub has_survey: bool,
    pub filled: bool,
    #[serde(flatten)]
    pub score: Option<Score>,
}

impl SurveySummary {
    fn new(survey: Option<&Survey>, score: Option<Score>) -> Self {
        Self {
            survey_id: survey.map(|s| s.id),
            title: survey.map(|s| s.title.clone()),
            has_survey: survey.is_some(),
            filled: score.is_some(),
            score,
        }
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub user: UserRef,
    pub watch: WatchSummary,
    pub survey: SurveySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSection {
    pub video: VideoRef,
    pub users: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRow {
    pub user: UserRef,
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpSection {
    pub survey_id: SurveyId,
    pub title: String,
    pub users: Vec<FollowUpRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub videos: Vec<VideoSection>,
    pub follow_up: Option<FollowUpSection>,
}

/// Bulk-loaded records a report is built from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub videos: &'a [Video],
    pub learners: &'a [User],
    pub watch: &'a [WatchState],
    pub surveys: &'a [Survey],
    pub responses: &'a [SurveyResponse],
    pub settings: EngineSettings,
}

/// Lookup tables built once per report.
#[derive(Debug)]
pub struct ReportIndex<'a> {
    watch: HashMap<(UserId, VideoId), &'a WatchState>,
    responses: HashMap<(UserId, SurveyId), &'a SurveyResponse>,
    video_surveys: HashMap<VideoId, &'a Survey>,
    keys: HashMap<SurveyId, AnswerKey>,
}

impl<'a> ReportIndex<'a> {
    #[must_use]
    pub fn new(
        watch: &'a [WatchState],
        surveys: &'a [Survey],
        responses: &'a [SurveyResponse],
    ) -> Self {
        let active = surveys.iter().filter(|s| s.is_active);
        Self {
            watch: watch
                .iter()
                .map(|w| ((w.user_id(), w.video_id()), w))
                .collect(),
            responses: responses
                .iter()
                .map(|r| ((r.user_id, r.survey_id), r))
                .collect(),
            video_surveys: active
                .clone()
                .filter_map(|s| s.kind.video_id().map(|v| (v, s)))
                .collect(),
            keys: active.map(|s| (s.id, AnswerKey::from_survey(s))).collect(),
        }
    }

    #[must_use]
    pub fn watch(&self, user: UserId, video: VideoId) -> Option<&'a WatchState> {
        self.watch.get(&(user, video)).copied()
    }

    #[must_use]
    pub fn response(&self, user: UserId, survey: SurveyId) -> Option<&'a SurveyResponse> {
        self.responses.get(&(user, survey)).copied()
    }

    #[must_use]
    pub fn video_survey(&self, video: VideoId) -> Option<&'a Survey> {
        self.video_surveys.get(&video).copied()
    }

    fn score(&self, response: &SurveyResponse) -> Option<Score> {
        self.keys
            .get(&response.survey_id)
            .map(|key| key.score(&response.answers))
    }
}

/// Builds the full admin report: one section per active video in order, plus
/// the follow-up section when an active FOLLOWUP survey exists.
#[must_use]
pub fn build_report(inputs: &ReportInputs<'_>) -> Report {
    let index = ReportIndex::new(inputs.watch, inputs.surveys, inputs.responses);

    let videos = crate::model::active_in_order(inputs.videos)
        .iter()
        .map(|video| video_section(video, inputs.learners, &index, &inputs.settings))
        .collect();

    let follow_up = inputs
        .surveys
        .iter()
        .find(|s| s.is_active && s.kind == SurveyKind::FollowUp)
        .map(|survey| follow_up_section(survey, inputs.learners, &index));

    Report { videos, follow_up }
}

fn video_section(
    video: &Video,
    learners: &[User],
    index: &ReportIndex<'_>,
    settings: &EngineSettings,
) -> VideoSection {
    let survey = index.video_survey(video.id());
    let users = learners
        .iter()
        .filter_map(|user| {
            let watch = index.watch(user.id, video.id());
            let response = survey.and_then(|s| index.response(user.id, s.id));
            if watch.is_none() && response.is_none() {
                return None;
            }
            Some(ReportRow {
                user: user.into(),
                watch: WatchSummary::summarize(video.duration_seconds(), watch, settings),
                survey: SurveySummary::new(survey, response.and_then(|r| index.score(r))),
            })
        })
        .collect();

    VideoSection {
        video: video.into(),
        users,
    }
}

fn follow_up_section(
    survey: &Survey,
    learners: &[User],
    index: &ReportIndex<'_>,
) -> FollowUpSection {
    let users = learners
        .iter()
        .filter_map(|user| {
            let response = index.response(user.id, survey.id)?;
            Some(FollowUpRow {
                user: user.into(),
                submitted_at: response.submitted_at,
                score: index.score(response)?,
            })
        })
        .collect();

    FollowUpSection {
        survey_id: survey.id,
        title: survey.title.clone(),
        users,
    }
}

//
// ─── DRILL-DOWN ────────────────────────────────────────────────────────────────
//

/// One learner's full record for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub user: UserRef,
    pub video: VideoRef,
    pub watch_summary: WatchSummary,
    pub survey: SurveySummary,
    pub submitted_at: Option<DateTime<Utc>>,
    pub breakdown: Vec<QuestionBreakdown>,
}

#[must_use]
pub fn video_detail(
    user: &User,
    video: &Video,
    watch: Option<&WatchState>,
    survey: Option<&Survey>,
    response: Option<&SurveyResponse>,
    settings: &EngineSettings,
) -> VideoDetail {
    let answered = survey.zip(response);
    VideoDetail {
        user: user.into(),
        video: video.into(),
        watch_summary: WatchSummary::summarize(video.duration_seconds(), watch, settings),
        survey: SurveySummary::new(survey, answered.map(|(s, r)| scoring::score(s, &r.answers))),
        submitted_at: response.map(|r| r.submitted_at),
        breakdown: answered
            .map(|(s, r)| scoring::breakdown(s, &r.answers))
            .unwrap_or_default(),
    }
}

/// One learner's answers to a non-video survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDetail {
    pub user: UserRef,
    pub survey: SurveySummary,
    pub submitted_at: Option<DateTime<Utc>>,
    pub breakdown: Vec<QuestionBreakdown>,
}

#[must_use]
pub fn survey_detail(
    user: &User,
    survey: &Survey,
    response: Option<&SurveyResponse>,
) -> SurveyDetail {
    SurveyDetail {
        user: user.into(),
        survey: SurveySummary::new(
            Some(survey),
            response.map(|r| scoring::score(survey, &r.answers)),
        ),
        submitted_at: response.map(|r| r.submitted_at),
        breakdown: response
            .map(|r| scoring::breakdown(survey, &r.answers))
            .unwrap_or_default(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, AnswerOption, OptionId, Question, QuestionId, Role};
    use crate::time::fixed_now;
    use crate::tracker::{self, Tick, TickContext};

    fn video(id: u64) -> Video {
        Video::new(VideoId::new(id), u32::try_from(id).unwrap(), format!("v{id}"), None, 600, true)
            .unwrap()
    }

    fn learner(id: u64) -> User {
        User::new(UserId::new(id), format!("u{id}@example.com"), Role::Learner)
    }

    fn watched(user: u64, video: u64, tick: Tick) -> WatchState {
        let ctx = TickContext {
            duration_seconds: 600,
            settings: EngineSettings::default(),
            now: fixed_now(),
            anchors_followup: false,
        };
        let fresh = WatchState::new(UserId::new(user), VideoId::new(video), fixed_now());
        tracker::advance(fresh, tick, &ctx).state
    }

    fn survey(id: u64, kind: SurveyKind) -> Survey {
        Survey {
            id: SurveyId::new(id),
            title: format!("s{id}"),
            kind,
            is_active: true,
            questions: vec![Question {
                id: QuestionId::new(id * 10),
                order: 1,
                text: "q".into(),
                options: vec![
                    AnswerOption {
                        id: OptionId::new(id * 100 + 1),
                        order: 1,
                        text: "yes".into(),
                        is_correct: true,
                    },
                    AnswerOption {
                        id: OptionId::new(id * 100 + 2),
                        order: 2,
                        text: "no".into(),
                        is_correct: false,
                    },
                ],
            }],
        }
    }

    fn response(user: u64, survey: u64, option: u64) -> SurveyResponse {
        SurveyResponse {
            user_id: UserId::new(user),
            survey_id: SurveyId::new(survey),
            answers: vec![Answer {
                question_id: QuestionId::new(survey * 10),
                option_id: OptionId::new(option),
            }],
            submitted_at: fixed_now(),
        }
    }

    #[test]
    fn summary_clamps_and_applies_tolerance() {
        let s = EngineSettings::default();
        let partial = watched(1, 1, Tick::new(300, 300, false));
        let summary = WatchSummary::summarize(600, Some(&partial), &s);
        assert_eq!(summary.watched_pct, 50);
        assert!(!summary.is_completed);
        assert_eq!(summary.finished_at, None);

        // Duration shortened after the record was written.
        let summary = WatchSummary::summarize(298, Some(&partial), &s);
        assert_eq!(summary.watched_seconds, 298);
        assert!(summary.is_completed);
        assert_eq!(summary.watched_pct, 100);
        assert_eq!(summary.finished_at, Some(partial.updated_at()));
    }

    #[test]
    fn summary_without_record_is_empty() {
        let summary = WatchSummary::summarize(600, None, &EngineSettings::default());
        assert_eq!(summary.watched_seconds, 0);
        assert!(!summary.is_completed);
        assert_eq!(summary.watched_pct, 0);
    }

    #[test]
    fn zero_interaction_pairs_are_omitted() {
        let videos = [video(1), video(2)];
        let learners = [learner(1), learner(2)];
        let watch = [watched(1, 1, Tick::new(600, 600, true))];
        let surveys = [survey(5, SurveyKind::Video { video_id: VideoId::new(2) })];
        let responses = [response(2, 5, 501)];

        let report = build_report(&ReportInputs {
            videos: &videos,
            learners: &learners,
            watch: &watch,
            surveys: &surveys,
            responses: &responses,
            settings: EngineSettings::default(),
        });

        assert_eq!(report.videos.len(), 2);
        let first = &report.videos[0];
        assert_eq!(first.users.len(), 1);
        assert_eq!(first.users[0].user.id, UserId::new(1));
        assert!(first.users[0].watch.is_completed);
        assert!(!first.users[0].survey.has_survey);

        let second = &report.videos[1];
        assert_eq!(second.users.len(), 1);
        assert_eq!(second.users[0].user.id, UserId::new(2));
        assert_eq!(second.users[0].watch.watched_seconds, 0);
        assert_eq!(second.users[0].survey.score.map(|s| s.score_pct), Some(100));
        assert!(report.follow_up.is_none());
    }

    #[test]
    fn follow_up_rows_come_from_responses() {
        let learners = [learner(1), learner(2)];
        let surveys = [survey(9, SurveyKind::FollowUp)];
        let responses = [response(2, 9, 902)];

        let report = build_report(&ReportInputs {
            videos: &[],
            learners: &learners,
            watch: &[],
            surveys: &surveys,
            responses: &responses,
            settings: EngineSettings::default(),
        });

        let follow_up = report.follow_up.unwrap();
        assert_eq!(follow_up.users.len(), 1);
        assert_eq!(follow_up.users[0].user.id, UserId::new(2));
        assert_eq!(follow_up.users[0].score.correct, 0);
    }

    #[test]
    fn inactive_survey_is_not_reported() {
        let mut s = survey(5, SurveyKind::Video { video_id: VideoId::new(1) });
        s.is_active = false;
        let report = build_report(&ReportInputs {
            videos: &[video(1)],
            learners: &[learner(1)],
            watch: &[],
            surveys: &[s],
            responses: &[response(1, 5, 501)],
            settings: EngineSettings::default(),
        });
        assert!(report.videos[0].users.is_empty());
    }

    #[test]
    fn video_detail_includes_breakdown() {
        let s = survey(5, SurveyKind::Video { video_id: VideoId::new(1) });
        let r = response(1, 5, 502);
        let w = watched(1, 1, Tick::new(30, 45, false));
        let detail = video_detail(
            &learner(1),
            &video(1),
            Some(&w),
            Some(&s),
            Some(&r),
            &EngineSettings::default(),
        );
        assert_eq!(detail.watch_summary.last_position_sec, 45);
        assert_eq!(detail.breakdown.len(), 1);
        assert_eq!(detail.breakdown[0].chosen_text.as_deref(), Some("no"));
        assert_eq!(detail.survey.score.map(|s| s.wrong), Some(1));
    }

    #[test]
    fn survey_detail_without_response_has_no_score() {
        let detail = survey_detail(&learner(1), &survey(9, SurveyKind::FollowUp), None);
        assert!(detail.survey.has_survey);
        assert!(!detail.survey.filled);
        assert!(detail.breakdown.is_empty());
    }
}
