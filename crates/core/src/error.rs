use thiserror::Error;

use crate::answer_key::{AnswerKeyError, SurveyError};
use crate::model::{SurveyKindError, VideoError};
use crate::tracker::TickError;
use crate::unlock::StageError;

/// Any domain rule violation raised by the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error(transparent)]
    AnswerKey(#[from] AnswerKeyError),
    #[error(transparent)]
    Survey(#[from] SurveyError),
    #[error(transparent)]
    SurveyKind(#[from] SurveyKindError),
    #[error(transparent)]
    Stage(#[from] StageError),
}
