//! Shared error types for the services crate.
//!
//! Every service error classifies itself into one [`ErrorKind`], which is all
//! a transport layer needs to pick a status code.

use thiserror::Error;

use course_core::answer_key::{AnswerKeyError, SurveyError};
use course_core::model::VideoId;
use course_core::tracker::TickError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Unauthorized,
    Forbidden,
    Internal,
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound => ErrorKind::NotFound,
        StorageError::Conflict => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    }
}

/// Errors emitted while resolving identities and admin rights.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccessError {
    #[error("unknown or missing identity")]
    Unauthorized,
    #[error("administrator access required")]
    Forbidden,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AccessError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Unauthorized => ErrorKind::Unauthorized,
            AccessError::Forbidden => ErrorKind::Forbidden,
            AccessError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `WatchService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchServiceError {
    #[error("video is not available")]
    VideoUnavailable,
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WatchServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatchServiceError::VideoUnavailable => ErrorKind::NotFound,
            WatchServiceError::Tick(_) => ErrorKind::Validation,
            WatchServiceError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DashboardError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `SurveyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurveyServiceError {
    #[error("survey is not active")]
    Inactive,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SurveyServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SurveyServiceError::Inactive => ErrorKind::NotFound,
            SurveyServiceError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `SurveyAuthoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthoringError {
    #[error("video {0} does not exist")]
    UnknownVideo(VideoId),
    #[error("video {0} already has an active survey")]
    ActiveSurveyExists(VideoId),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Survey(#[from] SurveyError),
    #[error(transparent)]
    AnswerKey(#[from] AnswerKeyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthoringError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthoringError::UnknownVideo(_)
            | AuthoringError::ActiveSurveyExists(_)
            | AuthoringError::Survey(_)
            | AuthoringError::AnswerKey(_) => ErrorKind::Validation,
            AuthoringError::Access(e) => e.kind(),
            AuthoringError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted by `ReportService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReportError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Access(e) => e.kind(),
            ReportError::Storage(e) => storage_kind(e),
        }
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_classify() {
        assert_eq!(
            SurveyServiceError::from(StorageError::NotFound).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            DashboardError::from(StorageError::Connection("gone".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            AuthoringError::from(AccessError::Forbidden).kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(
            WatchServiceError::from(TickError::MissingField("deltaSeconds")).kind(),
            ErrorKind::Validation
        );
    }
}
