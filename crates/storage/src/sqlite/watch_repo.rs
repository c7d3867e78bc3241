use course_core::model::{UserId, VideoId, WatchState};
use course_core::tracker::{self, Tick, TickContext, Transition};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{db, id_to_i64, map_watch_row};
use crate::repository::{StorageError, WatchRepository};

const WATCH_COLUMNS: &str = "user_id, video_id, watched_seconds, last_position_sec, is_completed, \
                             started_at, finished_at, updated_at";

async fn load(
    conn: &mut SqliteConnection,
    user_id: UserId,
    video_id: VideoId,
) -> Result<Option<WatchState>, StorageError> {
    let sql =
        format!("SELECT {WATCH_COLUMNS} FROM watch_states WHERE user_id = ?1 AND video_id = ?2");
    sqlx::query(&sql)
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("video_id", video_id.value())?)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db)?
        .as_ref()
        .map(map_watch_row)
        .transpose()
}

async fn store(conn: &mut SqliteConnection, state: &WatchState) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO watch_states (
            user_id, video_id, watched_seconds, last_position_sec, is_completed,
            started_at, finished_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(user_id, video_id) DO UPDATE SET
            watched_seconds = excluded.watched_seconds,
            last_position_sec = excluded.last_position_sec,
            is_completed = excluded.is_completed,
            started_at = excluded.started_at,
            finished_at = excluded.finished_at,
            updated_at = excluded.updated_at
        ",
    )
    .bind(id_to_i64("user_id", state.user_id().value())?)
    .bind(id_to_i64("video_id", state.video_id().value())?)
    .bind(i64::from(state.watched_seconds()))
    .bind(i64::from(state.last_position_sec()))
    .bind(state.is_completed())
    .bind(state.started_at())
    .bind(state.finished_at())
    .bind(state.updated_at())
    .execute(&mut *conn)
    .await
    .map_err(db)?;
    Ok(())
}

impl SqliteRepository {
    /// Runs load-modify-store for one watch row under `BEGIN IMMEDIATE`, so
    /// the write lock is held from the read onward and concurrent ticks
    /// serialize instead of overwriting each other. Dropping the future
    /// before commit rolls the transaction back.
    async fn with_watch_row<T, F>(
        &self,
        user_id: UserId,
        video_id: VideoId,
        now: chrono::DateTime<chrono::Utc>,
        step: F,
    ) -> Result<T, StorageError>
    where
        F: FnOnce(WatchState) -> (WatchState, T) + Send,
        T: Send,
    {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(db)?;
        let previous = load(&mut tx, user_id, video_id)
            .await?
            .unwrap_or_else(|| WatchState::new(user_id, video_id, now));
        let (next, out) = step(previous);
        store(&mut tx, &next).await?;
        tx.commit().await.map_err(db)?;
        Ok(out)
    }
}

#[async_trait::async_trait]
impl WatchRepository for SqliteRepository {
    async fn get_watch(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<WatchState>, StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db)?;
        load(&mut *conn, user_id, video_id).await
    }

    async fn watch_for_user(&self, user_id: UserId) -> Result<Vec<WatchState>, StorageError> {
        let sql = format!(
            "SELECT {WATCH_COLUMNS} FROM watch_states WHERE user_id = ?1 ORDER BY video_id"
        );
        let rows = sqlx::query(&sql)
            .bind(id_to_i64("user_id", user_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.iter().map(map_watch_row).collect()
    }

    async fn watch_for_videos(
        &self,
        video_ids: &[VideoId],
    ) -> Result<Vec<WatchState>, StorageError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("SELECT {WATCH_COLUMNS} FROM watch_states WHERE video_id IN (");
        for i in 0..video_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push_str(") ORDER BY video_id, user_id");

        let mut q = sqlx::query(&sql);
        for id in video_ids {
            q = q.bind(id_to_i64("video_id", id.value())?);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db)?;
        rows.iter().map(map_watch_row).collect()
    }

    async fn apply_tick(
        &self,
        user_id: UserId,
        video_id: VideoId,
        tick: Tick,
        ctx: TickContext,
    ) -> Result<Transition, StorageError> {
        self.with_watch_row(user_id, video_id, ctx.now, |previous| {
            let transition = tracker::advance(previous, tick, &ctx);
            (transition.state.clone(), transition)
        })
        .await
    }

    async fn record_open(
        &self,
        user_id: UserId,
        video_id: VideoId,
        ctx: TickContext,
    ) -> Result<WatchState, StorageError> {
        self.with_watch_row(user_id, video_id, ctx.now, |previous| {
            let state = tracker::open(previous, &ctx);
            (state.clone(), state)
        })
        .await
    }
}
