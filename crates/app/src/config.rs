use std::net::SocketAddr;

use clap::Parser;

use course_core::EngineSettings;
use course_core::settings::{DEFAULT_COMPLETION_TOLERANCE_SECS, DEFAULT_FOLLOWUP_WINDOW_MONTHS};
use services::EmailAllowList;

/// Course progress server.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// `SQLite` database URL or file path; the file is created when missing.
    #[arg(long = "database-url", env = "COURSE_DB_URL", default_value = "sqlite://course.sqlite3")]
    pub db_url: String,

    /// The address to bind to.
    #[arg(short, long, env = "COURSE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Comma-separated emails granted administrator access.
    #[arg(long, env = "COURSE_ADMIN_EMAILS", default_value = "")]
    pub admin_emails: String,

    /// Seconds before the end of a video that count as watched to the end.
    #[arg(
        long,
        env = "COURSE_COMPLETION_TOLERANCE_SECS",
        default_value_t = DEFAULT_COMPLETION_TOLERANCE_SECS
    )]
    pub completion_tolerance_secs: u32,

    /// Months between first access to the last video and the follow-up survey.
    #[arg(
        long,
        env = "COURSE_FOLLOWUP_WINDOW_MONTHS",
        default_value_t = DEFAULT_FOLLOWUP_WINDOW_MONTHS
    )]
    pub followup_window_months: u32,
}

impl Config {
    /// The database location as a `sqlite:` URL. Bare paths are accepted.
    #[must_use]
    pub fn database_url(&self) -> String {
        normalize_sqlite_url(&self.db_url)
    }

    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings::new(self.completion_tolerance_secs, self.followup_window_months)
    }

    #[must_use]
    pub fn admin_policy(&self) -> EmailAllowList {
        EmailAllowList::parse(&self.admin_emails)
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite:") {
        return trimmed.to_owned();
    }
    format!("sqlite://{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let config = Config::try_parse_from(["app"]).unwrap();
        assert_eq!(config.engine_settings(), EngineSettings::default());
        assert!(config.admin_policy().is_empty());
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.database_url(), "sqlite://course.sqlite3");
    }

    #[test]
    fn bare_paths_become_sqlite_urls() {
        let config = Config::try_parse_from(["app", "--database-url", " data/course.db "]).unwrap();
        assert_eq!(config.database_url(), "sqlite://data/course.db");

        let config = Config::try_parse_from(["app", "--database-url", "sqlite::memory:"]).unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "app",
            "--admin-emails",
            "Boss@example.com,ops@example.com",
            "--completion-tolerance-secs",
            "2",
            "--followup-window-months",
            "3",
        ])
        .unwrap();
        assert_eq!(config.engine_settings(), EngineSettings::new(2, 3));
        assert!(config.admin_policy().contains("boss@example.com"));
        assert_eq!(config.admin_policy().len(), 2);
    }
}
