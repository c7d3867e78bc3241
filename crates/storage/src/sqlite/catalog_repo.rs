use course_core::answer_key::{ValidatedQuestion, ValidatedSurvey};
use course_core::model::{Survey, SurveyId, Video, VideoId};
use sqlx::{Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{assemble_surveys, db, id_to_i64, map_video_row};
use crate::repository::{CatalogRepository, StorageError, SurveyPatch};

const SURVEY_COLUMNS: &str = "id, title, kind, video_id, is_active";

async fn insert_questions(
    tx: &mut Transaction<'_, Sqlite>,
    survey_id: i64,
    questions: &[ValidatedQuestion],
) -> Result<(), StorageError> {
    for q in questions {
        let question_id = sqlx::query(
            r"
            INSERT INTO questions (survey_id, sort_order, text)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(survey_id)
        .bind(i64::from(q.order))
        .bind(q.text.as_str())
        .execute(&mut **tx)
        .await
        .map_err(db)?
        .last_insert_rowid();

        for o in &q.options {
            sqlx::query(
                r"
                INSERT INTO options (question_id, sort_order, text, is_correct)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(question_id)
            .bind(i64::from(o.order))
            .bind(o.text.as_str())
            .bind(o.is_correct)
            .execute(&mut **tx)
            .await
            .map_err(db)?;
        }
    }
    Ok(())
}

impl SqliteRepository {
    /// Loads surveys matching `filter` (a `WHERE` clause over `surveys`) with
    /// their questions and options in three queries.
    async fn load_surveys(
        &self,
        filter: &str,
        bind: Option<i64>,
    ) -> Result<Vec<Survey>, StorageError> {
        let survey_sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE {filter} ORDER BY id");
        let question_sql = format!(
            r"
            SELECT id, survey_id, sort_order, text FROM questions
            WHERE survey_id IN (SELECT id FROM surveys WHERE {filter})
            ORDER BY survey_id, sort_order, id
            "
        );
        let option_sql = format!(
            r"
            SELECT o.id, o.question_id, o.sort_order, o.text, o.is_correct
            FROM options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.survey_id IN (SELECT id FROM surveys WHERE {filter})
            ORDER BY o.question_id, o.sort_order, o.id
            "
        );

        let mut surveys = sqlx::query(&survey_sql);
        let mut questions = sqlx::query(&question_sql);
        let mut options = sqlx::query(&option_sql);
        if let Some(value) = bind {
            surveys = surveys.bind(value);
            questions = questions.bind(value);
            options = options.bind(value);
        }

        let survey_rows = surveys.fetch_all(&self.pool).await.map_err(db)?;
        let question_rows = questions.fetch_all(&self.pool).await.map_err(db)?;
        let option_rows = options.fetch_all(&self.pool).await.map_err(db)?;
        assemble_surveys(&survey_rows, &question_rows, &option_rows)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO videos (id, sort_order, title, url, duration_seconds, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                sort_order = excluded.sort_order,
                title = excluded.title,
                url = excluded.url,
                duration_seconds = excluded.duration_seconds,
                is_active = excluded.is_active
            ",
        )
        .bind(id_to_i64("video_id", video.id().value())?)
        .bind(i64::from(video.order()))
        .bind(video.title().to_owned())
        .bind(video.url().map(|u| u.as_str().to_owned()))
        .bind(i64::from(video.duration_seconds()))
        .bind(video.is_active())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Video, StorageError> {
        let row = sqlx::query(
            "SELECT id, sort_order, title, url, duration_seconds, is_active \
             FROM videos WHERE id = ?1",
        )
        .bind(id_to_i64("video_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;
        map_video_row(&row)
    }

    async fn list_active_videos(&self) -> Result<Vec<Video>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, sort_order, title, url, duration_seconds, is_active
            FROM videos
            WHERE is_active = 1
            ORDER BY sort_order, id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_video_row).collect()
    }

    async fn get_survey(&self, id: SurveyId) -> Result<Survey, StorageError> {
        self.load_surveys("id = ?1", Some(id_to_i64("survey_id", id.value())?))
            .await?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    async fn list_active_surveys(&self) -> Result<Vec<Survey>, StorageError> {
        self.load_surveys("is_active = 1", None).await
    }

    async fn active_video_survey(
        &self,
        video_id: VideoId,
    ) -> Result<Option<Survey>, StorageError> {
        Ok(self
            .load_surveys(
                "kind = 'VIDEO' AND is_active = 1 AND video_id = ?1",
                Some(id_to_i64("video_id", video_id.value())?),
            )
            .await?
            .into_iter()
            .next())
    }

    async fn create_survey(&self, survey: &ValidatedSurvey) -> Result<Survey, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;

        let id = sqlx::query(
            r"
            INSERT INTO surveys (title, kind, video_id, is_active)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(survey.title.as_str())
        .bind(survey.kind.label())
        .bind(
            survey
                .kind
                .video_id()
                .map(|v| id_to_i64("video_id", v.value()))
                .transpose()?,
        )
        .bind(survey.is_active)
        .execute(&mut *tx)
        .await
        .map_err(db)?
        .last_insert_rowid();

        insert_questions(&mut tx, id, &survey.questions).await?;
        tx.commit().await.map_err(db)?;

        self.get_survey(SurveyId::new(u64::try_from(id).map_err(|_| {
            StorageError::Serialization("survey_id sign overflow".into())
        })?))
        .await
    }

    async fn replace_questions(
        &self,
        id: SurveyId,
        questions: &[ValidatedQuestion],
    ) -> Result<Survey, StorageError> {
        let survey_id = id_to_i64("survey_id", id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        sqlx::query("SELECT 1 FROM surveys WHERE id = ?1")
            .bind(survey_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        sqlx::query(
            "DELETE FROM options \
             WHERE question_id IN (SELECT id FROM questions WHERE survey_id = ?1)",
        )
        .bind(survey_id)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        sqlx::query("DELETE FROM questions WHERE survey_id = ?1")
            .bind(survey_id)
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        insert_questions(&mut tx, survey_id, questions).await?;
        tx.commit().await.map_err(db)?;

        self.get_survey(id).await
    }

    async fn update_survey(
        &self,
        id: SurveyId,
        patch: &SurveyPatch,
    ) -> Result<Survey, StorageError> {
        let result = sqlx::query(
            r"
            UPDATE surveys SET
                title = COALESCE(?2, title),
                is_active = COALESCE(?3, is_active)
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("survey_id", id.value())?)
        .bind(patch.title.as_deref())
        .bind(patch.is_active)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        self.get_survey(id).await
    }
}
