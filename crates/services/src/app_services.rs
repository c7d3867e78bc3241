use std::sync::Arc;

use course_core::settings::EngineSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::access::{AccessService, AdminPolicy};
use crate::authoring_service::SurveyAuthoringService;
use crate::dashboard_service::DashboardService;
use crate::error::AppServicesError;
use crate::report_service::ReportService;
use crate::survey_service::SurveyService;
use crate::watch_service::WatchService;

/// Assembles the engine's services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    access: Arc<AccessService>,
    watch: Arc<WatchService>,
    dashboard: Arc<DashboardService>,
    surveys: Arc<SurveyService>,
    authoring: Arc<SurveyAuthoringService>,
    reports: Arc<ReportService>,
}

impl AppServices {
    #[must_use]
    pub fn new(
        storage: &Storage,
        clock: Clock,
        settings: EngineSettings,
        policy: Arc<dyn AdminPolicy>,
    ) -> Self {
        let access = AccessService::new(Arc::clone(&storage.users), policy);
        let watch = Arc::new(WatchService::new(
            clock,
            settings,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.watch),
            Arc::clone(&storage.responses),
        ));
        let dashboard = Arc::new(DashboardService::new(
            clock,
            settings,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.watch),
            Arc::clone(&storage.responses),
        ));
        let surveys = Arc::new(SurveyService::new(
            clock,
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.responses),
        ));
        let authoring = Arc::new(SurveyAuthoringService::new(
            access.clone(),
            Arc::clone(&storage.catalog),
        ));
        let reports = Arc::new(ReportService::new(
            settings,
            access.clone(),
            Arc::clone(&storage.users),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.watch),
            Arc::clone(&storage.responses),
        ));

        Self {
            access: Arc::new(access),
            watch,
            dashboard,
            surveys,
            authoring,
            reports,
        }
    }

    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: EngineSettings,
        policy: Arc<dyn AdminPolicy>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, settings, policy))
    }

    #[must_use]
    pub fn access(&self) -> Arc<AccessService> {
        Arc::clone(&self.access)
    }

    #[must_use]
    pub fn watch(&self) -> Arc<WatchService> {
        Arc::clone(&self.watch)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn surveys(&self) -> Arc<SurveyService> {
        Arc::clone(&self.surveys)
    }

    #[must_use]
    pub fn authoring(&self) -> Arc<SurveyAuthoringService> {
        Arc::clone(&self.authoring)
    }

    #[must_use]
    pub fn reports(&self) -> Arc<ReportService> {
        Arc::clone(&self.reports)
    }
}
