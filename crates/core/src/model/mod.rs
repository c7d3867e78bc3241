mod ids;
mod survey;
mod user;
mod video;
mod watch;

pub use ids::{OptionId, ParseIdError, QuestionId, SurveyId, UserId, VideoId};

pub use survey::{
    Answer, AnswerOption, OptionView, Question, QuestionView, Survey, SurveyKind, SurveyKindError,
    SurveyResponse, SurveyView,
};
pub use user::{normalize_email, Role, User};
pub use video::{active_in_order, last_active, Video, VideoError};
pub use watch::{ProgressView, WatchPhase, WatchState};
