use std::time::Duration;

use course_core::model::{Role, User, UserId, Video, VideoId};
use course_core::settings::EngineSettings;
use course_core::time::fixed_now;
use course_core::tracker::{Tick, TickContext};
use storage::repository::{CatalogRepository, UserRepository, WatchRepository};
use storage::sqlite::SqliteRepository;
use tempfile::TempDir;

const LEARNER: UserId = UserId::new(10);
const VIDEO: VideoId = VideoId::new(1);

/// File-backed database so every pooled connection is a real, separate
/// `SQLite` connection contending for the write lock.
async fn file_repo() -> (TempDir, SqliteRepository) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("course.db").display());
    let repo = SqliteRepository::connect(&url).await.unwrap();
    repo.migrate().await.unwrap();
    repo.upsert_user(&User::new(LEARNER, "learner@example.com", Role::Learner))
        .await
        .unwrap();
    let video = Video::new(VIDEO, 1, "Intro", None, 600, true).unwrap();
    repo.upsert_video(&video).await.unwrap();
    (dir, repo)
}

fn ctx() -> TickContext {
    TickContext {
        duration_seconds: 600,
        settings: EngineSettings::default(),
        now: fixed_now(),
        anchors_followup: false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ticks_each_apply_their_delta_once() {
    let (_dir, repo) = file_repo().await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.apply_tick(LEARNER, VIDEO, Tick::new(5, i * 5, false), ctx())
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let state = repo.get_watch(LEARNER, VIDEO).await.unwrap().unwrap();
    assert_eq!(state.watched_seconds(), 100);
    assert!(!state.is_completed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancelled_tick_does_not_hold_the_write_lock() {
    let (_dir, repo) = file_repo().await;

    for micros in [1, 5, 20, 50, 100, 500] {
        let _ = tokio::time::timeout(
            Duration::from_micros(micros),
            repo.apply_tick(LEARNER, VIDEO, Tick::new(5, 5, false), ctx()),
        )
        .await;
    }

    // Busy timeout is 5 s; a leaked transaction would stall past this.
    for _ in 0..5 {
        let next = tokio::time::timeout(
            Duration::from_secs(2),
            repo.apply_tick(LEARNER, VIDEO, Tick::new(1, 10, false), ctx()),
        )
        .await;
        assert!(matches!(next, Ok(Ok(_))), "tick after cancellation failed: {next:?}");
    }

    let state = repo.get_watch(LEARNER, VIDEO).await.unwrap().unwrap();
    assert!(state.watched_seconds() >= 5);
}
