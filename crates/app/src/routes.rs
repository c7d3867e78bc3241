//! JSON endpoints. Learner routes act on the caller; `/api/admin` routes
//! additionally require the admin policy to accept the caller.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use course_core::answer_key::{QuestionDraft, SurveyDraft};
use course_core::model::{Answer, ProgressView, Survey, SurveyId, UserId, VideoId, WatchState};
use course_core::report::Report;
use course_core::scoring::Score;
use services::{
    ClientTick, Dashboard, DetailTarget, SurveyForUser, UserDetail, VideoAccess, VideoSurveyStatus,
};
use storage::repository::SurveyPatch;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn api() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard", get(dashboard))
        .route("/api/videos/{video_id}", get(open_video))
        .route("/api/videos/{video_id}/ticks", post(record_tick))
        .route("/api/videos/{video_id}/progress", get(progress))
        .route("/api/videos/{video_id}/survey", get(video_survey))
        .route("/api/surveys/{survey_id}", get(get_survey))
        .route("/api/surveys/{survey_id}/responses", post(submit_survey))
        .route("/api/admin/surveys", get(list_surveys).post(create_survey))
        .route(
            "/api/admin/surveys/{survey_id}",
            get(admin_survey).patch(update_survey).delete(deactivate_survey),
        )
        .route(
            "/api/admin/surveys/{survey_id}/questions",
            put(replace_questions),
        )
        .route("/api/admin/report", get(report))
        .route(
            "/api/admin/report/videos/{video_id}/users/{user_id}",
            get(video_detail),
        )
        .route(
            "/api/admin/report/surveys/{survey_id}/users/{user_id}",
            get(survey_detail),
        )
}

async fn health() -> &'static str {
    "ok"
}

//
// ─── LEARNER ───────────────────────────────────────────────────────────────────
//

async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Dashboard> {
    Ok(Json(state.services.dashboard().dashboard(user.id).await?))
}

async fn open_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<VideoId>,
) -> ApiResult<VideoAccess> {
    Ok(Json(state.services.watch().open_video(user.id, video_id).await?))
}

async fn record_tick(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<VideoId>,
    body: Result<Json<ClientTick>, JsonRejection>,
) -> ApiResult<WatchState> {
    let Json(tick) = body?;
    let record = state
        .services
        .watch()
        .record_tick(user.id, video_id, tick)
        .await?;
    Ok(Json(record))
}

async fn progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<VideoId>,
) -> ApiResult<ProgressView> {
    Ok(Json(state.services.watch().progress(user.id, video_id).await?))
}

async fn video_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<VideoId>,
) -> ApiResult<VideoSurveyStatus> {
    Ok(Json(state.services.watch().video_survey(user.id, video_id).await?))
}

async fn get_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
) -> ApiResult<SurveyForUser> {
    Ok(Json(state.services.surveys().get_survey(user.id, survey_id).await?))
}

#[derive(Debug, Deserialize)]
struct SubmitBody {
    #[serde(default)]
    answers: Vec<Answer>,
}

async fn submit_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> ApiResult<Score> {
    let Json(body) = body?;
    let score = state
        .services
        .surveys()
        .submit(user.id, survey_id, &body.answers)
        .await?;
    Ok(Json(score))
}

//
// ─── ADMIN ─────────────────────────────────────────────────────────────────────
//

async fn list_surveys(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<Survey>> {
    Ok(Json(state.services.authoring().list_surveys(user.id).await?))
}

async fn create_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<SurveyDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Survey>), ApiError> {
    let Json(draft) = body?;
    let survey = state
        .services
        .authoring()
        .create_survey(user.id, &draft)
        .await?;
    Ok((StatusCode::CREATED, Json(survey)))
}

async fn admin_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
) -> ApiResult<Survey> {
    Ok(Json(state.services.authoring().survey(user.id, survey_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatchBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

async fn update_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
    body: Result<Json<PatchBody>, JsonRejection>,
) -> ApiResult<Survey> {
    let Json(body) = body?;
    let patch = SurveyPatch {
        title: body.title,
        is_active: body.is_active,
    };
    let survey = state
        .services
        .authoring()
        .update_survey(user.id, survey_id, patch)
        .await?;
    Ok(Json(survey))
}

async fn deactivate_survey(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
) -> ApiResult<Survey> {
    Ok(Json(
        state
            .services
            .authoring()
            .deactivate_survey(user.id, survey_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct QuestionsBody {
    #[serde(default)]
    questions: Vec<QuestionDraft>,
}

async fn replace_questions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(survey_id): Path<SurveyId>,
    body: Result<Json<QuestionsBody>, JsonRejection>,
) -> ApiResult<Survey> {
    let Json(body) = body?;
    let survey = state
        .services
        .authoring()
        .replace_questions(user.id, survey_id, &body.questions)
        .await?;
    Ok(Json(survey))
}

async fn report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Report> {
    Ok(Json(state.services.reports().report(user.id).await?))
}

async fn video_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((video_id, learner)): Path<(VideoId, UserId)>,
) -> ApiResult<UserDetail> {
    let detail = state
        .services
        .reports()
        .user_detail(user.id, DetailTarget::Video(video_id), learner)
        .await?;
    Ok(Json(detail))
}

async fn survey_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((survey_id, learner)): Path<(SurveyId, UserId)>,
) -> ApiResult<UserDetail> {
    let detail = state
        .services
        .reports()
        .user_detail(user.id, DetailTarget::Survey(survey_id), learner)
        .await?;
    Ok(Json(detail))
}
