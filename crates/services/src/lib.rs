#![forbid(unsafe_code)]

pub mod access;
pub mod app_services;
pub mod authoring_service;
pub mod dashboard_service;
pub mod error;
pub mod report_service;
pub mod survey_service;
pub mod watch_service;

pub use course_core::Clock;

pub use access::{AccessService, AdminPolicy, EmailAllowList};
pub use app_services::AppServices;
pub use authoring_service::SurveyAuthoringService;
pub use dashboard_service::{Dashboard, DashboardService};
pub use error::{
    AccessError, AppServicesError, AuthoringError, DashboardError, ErrorKind, ReportError,
    SurveyServiceError, WatchServiceError,
};
pub use report_service::{DetailTarget, ReportService, UserDetail};
pub use survey_service::{SurveyForUser, SurveyService};
pub use watch_service::{ClientTick, VideoAccess, VideoSurveyStatus, WatchService};
