use async_trait::async_trait;
use course_core::answer_key::{ValidatedQuestion, ValidatedSurvey};
use course_core::model::{
    AnswerOption, OptionId, Question, QuestionId, Role, Survey, SurveyId, SurveyKind,
    SurveyResponse, User, UserId, Video, VideoId, WatchState,
};
use course_core::tracker::{self, Tick, TickContext, Transition};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Partial update of a survey header. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyPatch {
    pub title: Option<String>,
    pub is_active: Option<bool>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// User directory, fed by the identity collaborator.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert or replace a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the email belongs to another user.
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no such user exists.
    async fn get_user(&self, id: UserId) -> Result<User, StorageError>;

    /// All users with the learner role, ascending by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_learners(&self) -> Result<Vec<User>, StorageError>;
}

/// Videos, surveys, questions and options.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Insert or replace a video under its own id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the video does not exist.
    async fn get_video(&self, id: VideoId) -> Result<Video, StorageError>;

    /// Active videos, ascending by `order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_active_videos(&self) -> Result<Vec<Video>, StorageError>;

    /// A survey with its ordered questions and options, active or not.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the survey does not exist.
    async fn get_survey(&self, id: SurveyId) -> Result<Survey, StorageError>;

    /// Every active survey with questions and options.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_active_surveys(&self) -> Result<Vec<Survey>, StorageError>;

    /// The active VIDEO survey attached to `video_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn active_video_survey(&self, video_id: VideoId)
    -> Result<Option<Survey>, StorageError>;

    /// Creates a survey and its question set in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if an active VIDEO survey already
    /// exists for the same video.
    async fn create_survey(&self, survey: &ValidatedSurvey) -> Result<Survey, StorageError>;

    /// Deletes every question of the survey and recreates them from
    /// `questions`, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the survey does not exist.
    async fn replace_questions(
        &self,
        id: SurveyId,
        questions: &[ValidatedQuestion],
    ) -> Result<Survey, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown survey and
    /// `StorageError::Conflict` when reactivating a VIDEO survey whose video
    /// already has another active one.
    async fn update_survey(&self, id: SurveyId, patch: &SurveyPatch)
    -> Result<Survey, StorageError>;
}

/// Per-(user, video) watch records.
#[async_trait]
pub trait WatchRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_watch(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<WatchState>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn watch_for_user(&self, user_id: UserId) -> Result<Vec<WatchState>, StorageError>;

    /// All users' records for the given videos.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn watch_for_videos(&self, video_ids: &[VideoId])
    -> Result<Vec<WatchState>, StorageError>;

    /// Loads (or creates) the record, folds `tick` into it and stores the
    /// result as one atomic step, so concurrent ticks each apply once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure; nothing is written then.
    async fn apply_tick(
        &self,
        user_id: UserId,
        video_id: VideoId,
        tick: Tick,
        ctx: TickContext,
    ) -> Result<Transition, StorageError>;

    /// Records a first access without playback.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn record_open(
        &self,
        user_id: UserId,
        video_id: VideoId,
        ctx: TickContext,
    ) -> Result<WatchState, StorageError>;
}

/// Latest survey response per (user, survey).
#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// Replaces any prior response for the same (user, survey).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn upsert_response(&self, response: &SurveyResponse) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_response(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> Result<Option<SurveyResponse>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn responses_for_user(&self, user_id: UserId)
    -> Result<Vec<SurveyResponse>, StorageError>;

    /// All users' responses for the given surveys.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn responses_for_surveys(
        &self,
        survey_ids: &[SurveyId],
    ) -> Result<Vec<SurveyResponse>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct CatalogState {
    videos: HashMap<VideoId, Video>,
    surveys: HashMap<SurveyId, Survey>,
    next_survey: u64,
    next_question: u64,
    next_option: u64,
}

impl CatalogState {
    fn video_slot_taken(&self, kind: SurveyKind, except: Option<SurveyId>) -> bool {
        let Some(video_id) = kind.video_id() else {
            return false;
        };
        self.surveys.values().any(|s| {
            s.is_active && Some(s.id) != except && s.kind.video_id() == Some(video_id)
        })
    }

    fn build_questions(&mut self, drafts: &[ValidatedQuestion]) -> Vec<Question> {
        drafts
            .iter()
            .map(|q| {
                self.next_question += 1;
                let id = QuestionId::new(self.next_question);
                let options = q
                    .options
                    .iter()
                    .map(|o| {
                        self.next_option += 1;
                        AnswerOption {
                            id: OptionId::new(self.next_option),
                            order: o.order,
                            text: o.text.clone(),
                            is_correct: o.is_correct,
                        }
                    })
                    .collect();
                Question {
                    id,
                    order: q.order,
                    text: q.text.clone(),
                    options,
                }
            })
            .collect()
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    users: Arc<Mutex<HashMap<UserId, User>>>,
    catalog: Arc<Mutex<CatalogState>>,
    watch: Arc<Mutex<HashMap<(UserId, VideoId), WatchState>>>,
    responses: Arc<Mutex<HashMap<(UserId, SurveyId), SurveyResponse>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(&self, user: &User) -> Result<(), StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        if guard
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StorageError::Conflict);
        }
        guard.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_learners(&self) -> Result<Vec<User>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        let mut learners: Vec<User> = guard
            .values()
            .filter(|u| u.role == Role::Learner)
            .cloned()
            .collect();
        learners.sort_by_key(|u| u.id);
        Ok(learners)
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_video(&self, video: &Video) -> Result<(), StorageError> {
        let mut guard = self.catalog.lock().map_err(poisoned)?;
        guard.videos.insert(video.id(), video.clone());
        Ok(())
    }

    async fn get_video(&self, id: VideoId) -> Result<Video, StorageError> {
        let guard = self.catalog.lock().map_err(poisoned)?;
        guard.videos.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_active_videos(&self) -> Result<Vec<Video>, StorageError> {
        let guard = self.catalog.lock().map_err(poisoned)?;
        let all: Vec<Video> = guard.videos.values().cloned().collect();
        Ok(course_core::model::active_in_order(&all))
    }

    async fn get_survey(&self, id: SurveyId) -> Result<Survey, StorageError> {
        let guard = self.catalog.lock().map_err(poisoned)?;
        guard
            .surveys
            .get(&id)
            .cloned()
            .map(Survey::ordered)
            .ok_or(StorageError::NotFound)
    }

    async fn list_active_surveys(&self) -> Result<Vec<Survey>, StorageError> {
        let guard = self.catalog.lock().map_err(poisoned)?;
        let mut surveys: Vec<Survey> = guard
            .surveys
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .map(Survey::ordered)
            .collect();
        surveys.sort_by_key(|s| s.id);
        Ok(surveys)
    }

    async fn active_video_survey(
        &self,
        video_id: VideoId,
    ) -> Result<Option<Survey>, StorageError> {
        let guard = self.catalog.lock().map_err(poisoned)?;
        Ok(guard
            .surveys
            .values()
            .find(|s| s.is_active && s.kind.video_id() == Some(video_id))
            .cloned()
            .map(Survey::ordered))
    }

    async fn create_survey(&self, survey: &ValidatedSurvey) -> Result<Survey, StorageError> {
        let mut guard = self.catalog.lock().map_err(poisoned)?;
        if survey.is_active && guard.video_slot_taken(survey.kind, None) {
            return Err(StorageError::Conflict);
        }
        guard.next_survey += 1;
        let id = SurveyId::new(guard.next_survey);
        let questions = guard.build_questions(&survey.questions);
        let created = Survey {
            id,
            title: survey.title.clone(),
            kind: survey.kind,
            is_active: survey.is_active,
            questions,
        }
        .ordered();
        guard.surveys.insert(id, created.clone());
        Ok(created)
    }

    async fn replace_questions(
        &self,
        id: SurveyId,
        questions: &[ValidatedQuestion],
    ) -> Result<Survey, StorageError> {
        let mut guard = self.catalog.lock().map_err(poisoned)?;
        if !guard.surveys.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        let rebuilt = guard.build_questions(questions);
        let survey = guard.surveys.get_mut(&id).ok_or(StorageError::NotFound)?;
        survey.questions = rebuilt;
        Ok(survey.clone().ordered())
    }

    async fn update_survey(
        &self,
        id: SurveyId,
        patch: &SurveyPatch,
    ) -> Result<Survey, StorageError> {
        let mut guard = self.catalog.lock().map_err(poisoned)?;
        let kind = guard
            .surveys
            .get(&id)
            .map(|s| s.kind)
            .ok_or(StorageError::NotFound)?;
        if patch.is_active == Some(true) && guard.video_slot_taken(kind, Some(id)) {
            return Err(StorageError::Conflict);
        }
        let survey = guard.surveys.get_mut(&id).ok_or(StorageError::NotFound)?;
        if let Some(title) = &patch.title {
            survey.title.clone_from(title);
        }
        if let Some(active) = patch.is_active {
            survey.is_active = active;
        }
        Ok(survey.clone().ordered())
    }
}

#[async_trait]
impl WatchRepository for InMemoryRepository {
    async fn get_watch(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<WatchState>, StorageError> {
        let guard = self.watch.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, video_id)).cloned())
    }

    async fn watch_for_user(&self, user_id: UserId) -> Result<Vec<WatchState>, StorageError> {
        let guard = self.watch.lock().map_err(poisoned)?;
        let mut rows: Vec<WatchState> = guard
            .values()
            .filter(|w| w.user_id() == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(WatchState::video_id);
        Ok(rows)
    }

    async fn watch_for_videos(
        &self,
        video_ids: &[VideoId],
    ) -> Result<Vec<WatchState>, StorageError> {
        let guard = self.watch.lock().map_err(poisoned)?;
        let mut rows: Vec<WatchState> = guard
            .values()
            .filter(|w| video_ids.contains(&w.video_id()))
            .cloned()
            .collect();
        rows.sort_by_key(|w| (w.video_id(), w.user_id()));
        Ok(rows)
    }

    async fn apply_tick(
        &self,
        user_id: UserId,
        video_id: VideoId,
        tick: Tick,
        ctx: TickContext,
    ) -> Result<Transition, StorageError> {
        // The lock spans load and store, matching the SQLite write transaction.
        let mut guard = self.watch.lock().map_err(poisoned)?;
        let previous = guard
            .get(&(user_id, video_id))
            .cloned()
            .unwrap_or_else(|| WatchState::new(user_id, video_id, ctx.now));
        let transition = tracker::advance(previous, tick, &ctx);
        guard.insert((user_id, video_id), transition.state.clone());
        Ok(transition)
    }

    async fn record_open(
        &self,
        user_id: UserId,
        video_id: VideoId,
        ctx: TickContext,
    ) -> Result<WatchState, StorageError> {
        let mut guard = self.watch.lock().map_err(poisoned)?;
        let previous = guard
            .get(&(user_id, video_id))
            .cloned()
            .unwrap_or_else(|| WatchState::new(user_id, video_id, ctx.now));
        let state = tracker::open(previous, &ctx);
        guard.insert((user_id, video_id), state.clone());
        Ok(state)
    }
}

#[async_trait]
impl ResponseRepository for InMemoryRepository {
    async fn upsert_response(&self, response: &SurveyResponse) -> Result<(), StorageError> {
        let mut guard = self.responses.lock().map_err(poisoned)?;
        guard.insert((response.user_id, response.survey_id), response.clone());
        Ok(())
    }

    async fn get_response(
        &self,
        user_id: UserId,
        survey_id: SurveyId,
    ) -> Result<Option<SurveyResponse>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, survey_id)).cloned())
    }

    async fn responses_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SurveyResponse>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        let mut rows: Vec<SurveyResponse> = guard
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.survey_id);
        Ok(rows)
    }

    async fn responses_for_surveys(
        &self,
        survey_ids: &[SurveyId],
    ) -> Result<Vec<SurveyResponse>, StorageError> {
        let guard = self.responses.lock().map_err(poisoned)?;
        let mut rows: Vec<SurveyResponse> = guard
            .values()
            .filter(|r| survey_ids.contains(&r.survey_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.survey_id, r.user_id));
        Ok(rows)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub watch: Arc<dyn WatchRepository>,
    pub responses: Arc<dyn ResponseRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Wraps one repository that implements every contract.
    #[must_use]
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: UserRepository
            + CatalogRepository
            + WatchRepository
            + ResponseRepository
            + Clone
            + 'static,
    {
        let users: Arc<dyn UserRepository> = Arc::new(repo.clone());
        let catalog: Arc<dyn CatalogRepository> = Arc::new(repo.clone());
        let watch: Arc<dyn WatchRepository> = Arc::new(repo.clone());
        let responses: Arc<dyn ResponseRepository> = Arc::new(repo);
        Self {
            users,
            catalog,
            watch,
            responses,
        }
    }
}
