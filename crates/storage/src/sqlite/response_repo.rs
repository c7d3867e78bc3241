use course_core::model::{SurveyId, SurveyResponse, UserId};

use super::SqliteRepository;
use super::mapping::{answers_to_json, db, id_to_i64, map_response_row};
use crate::repository::{ResponseRepository, StorageError};

#[async_trait::async_trait]
impl ResponseRepository for SqliteRepository {
    async fn upsert_response(&self, response: &SurveyResponse) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO survey_responses (user_id, survey_id, answers, submitted_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, survey_id) DO UPDATE SET
                answers = excluded.answers,
                submitted_at = excluded.submitted_at
            ",
        )
        .bind(id_to_i64("user_id", response.user_id.value())?)
        .bind(id_to_i64("survey_id", response.survey_id.value())?)
        .bind(answers_to_json(&response.answers)?)
        .bind(response.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_response(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> Result<Option<SurveyResponse>, StorageError> {
        sqlx::query(
            r"
            SELECT user_id, survey_id, answers, submitted_at
            FROM survey_responses
            WHERE user_id = ?1 AND survey_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("survey_id", survey_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .as_ref()
        .map(map_response_row)
        .transpose()
    }

    async fn responses_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SurveyResponse>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, survey_id, answers, submitted_at
            FROM survey_responses
            WHERE user_id = ?1
            ORDER BY survey_id
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(map_response_row).collect()
    }

    async fn responses_for_surveys(
        &self,
        survey_ids: &[SurveyId],
    ) -> Result<Vec<SurveyResponse>, StorageError> {
        if survey_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT user_id, survey_id, answers, submitted_at FROM survey_responses \
             WHERE survey_id IN (",
        );
        for i in 0..survey_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(") ORDER BY survey_id, user_id");

        let mut q = sqlx::query(&sql);
        for id in survey_ids {
            q = q.bind(id_to_i64("survey_id", id.value())?);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db)?;
        rows.iter().map(map_response_row).collect()
    }
}
