use course_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{db, id_to_i64, map_user_row};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, role)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                role = excluded.role
            ",
        )
        .bind(id_to_i64("user_id", user.id.value())?)
        .bind(&user.email)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let row = sqlx::query("SELECT id, email, role FROM users WHERE id = ?1")
            .bind(id_to_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;
        map_user_row(&row)
    }

    async fn list_learners(&self) -> Result<Vec<User>, StorageError> {
        let rows =
            sqlx::query("SELECT id, email, role FROM users WHERE role = 'learner' ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
        rows.iter().map(map_user_row).collect()
    }
}
