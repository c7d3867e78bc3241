use std::collections::HashMap;

use chrono::{DateTime, Utc};
use course_core::model::{
    Answer, AnswerOption, OptionId, Question, QuestionId, Role, Survey, SurveyId, SurveyKind,
    SurveyResponse, User, UserId, Video, VideoId, WatchState,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, surfacing unique-constraint hits as `Conflict`.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(inner) if inner.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn get_u64(row: &SqliteRow, column: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

pub(crate) fn get_u32(row: &SqliteRow, column: &'static str) -> Result<u32, StorageError> {
    i64_to_u32(column, row.try_get::<i64, _>(column).map_err(ser)?)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    let role_str: String = row.try_get("role").map_err(ser)?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| StorageError::Serialization(format!("invalid role: {role_str}")))?;
    Ok(User::new(
        UserId::new(get_u64(row, "id")?),
        row.try_get::<String, _>("email").map_err(ser)?,
        role,
    ))
}

pub(crate) fn map_video_row(row: &SqliteRow) -> Result<Video, StorageError> {
    let url: Option<String> = row.try_get("url").map_err(ser)?;
    Video::new(
        VideoId::new(get_u64(row, "id")?),
        get_u32(row, "sort_order")?,
        row.try_get::<String, _>("title").map_err(ser)?,
        Video::parse_url(url.as_deref()).map_err(ser)?,
        get_u32(row, "duration_seconds")?,
        row.try_get("is_active").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_watch_row(row: &SqliteRow) -> Result<WatchState, StorageError> {
    Ok(WatchState::from_persisted(
        UserId::new(get_u64(row, "user_id")?),
        VideoId::new(get_u64(row, "video_id")?),
        get_u32(row, "watched_seconds")?,
        get_u32(row, "last_position_sec")?,
        row.try_get("is_completed").map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("started_at")
            .map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("finished_at")
            .map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}

pub(crate) fn map_response_row(row: &SqliteRow) -> Result<SurveyResponse, StorageError> {
    let raw: String = row.try_get("answers").map_err(ser)?;
    let answers: Vec<Answer> = serde_json::from_str(&raw).map_err(ser)?;
    Ok(SurveyResponse {
        user_id: UserId::new(get_u64(row, "user_id")?),
        survey_id: SurveyId::new(get_u64(row, "survey_id")?),
        answers,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn answers_to_json(answers: &[Answer]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

/// Joins survey, question and option rows into ordered `Survey` values.
///
/// Rows are expected to carry `id`/`title`/`kind`/`video_id`/`is_active`
/// (surveys), `id`/`survey_id`/`sort_order`/`text` (questions) and
/// `id`/`question_id`/`sort_order`/`text`/`is_correct` (options).
pub(crate) fn assemble_surveys(
    survey_rows: &[SqliteRow],
    question_rows: &[SqliteRow],
    option_rows: &[SqliteRow],
) -> Result<Vec<Survey>, StorageError> {
    let mut options: HashMap<QuestionId, Vec<AnswerOption>> = HashMap::new();
    for row in option_rows {
        options
            .entry(QuestionId::new(get_u64(row, "question_id")?))
            .or_default()
            .push(AnswerOption {
                id: OptionId::new(get_u64(row, "id")?),
                order: get_u32(row, "sort_order")?,
                text: row.try_get("text").map_err(ser)?,
                is_correct: row.try_get("is_correct").map_err(ser)?,
            });
    }

    let mut questions: HashMap<SurveyId, Vec<Question>> = HashMap::new();
    for row in question_rows {
        let id = QuestionId::new(get_u64(row, "id")?);
        questions
            .entry(SurveyId::new(get_u64(row, "survey_id")?))
            .or_default()
            .push(Question {
                id,
                order: get_u32(row, "sort_order")?,
                text: row.try_get("text").map_err(ser)?,
                options: options.remove(&id).unwrap_or_default(),
            });
    }

    let mut surveys = Vec::with_capacity(survey_rows.len());
    for row in survey_rows {
        let id = SurveyId::new(get_u64(row, "id")?);
        let label: String = row.try_get("kind").map_err(ser)?;
        let video_id = row
            .try_get::<Option<i64>, _>("video_id")
            .map_err(ser)?
            .map(|v| i64_to_u64("video_id", v).map(VideoId::new))
            .transpose()?;
        surveys.push(
            Survey {
                id,
                title: row.try_get("title").map_err(ser)?,
                kind: SurveyKind::from_parts(&label, video_id).map_err(ser)?,
                is_active: row.try_get("is_active").map_err(ser)?,
                questions: questions.remove(&id).unwrap_or_default(),
            }
            .ordered(),
        );
    }
    Ok(surveys)
}
