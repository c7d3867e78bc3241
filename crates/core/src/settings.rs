use serde::{Deserialize, Serialize};

/// End-of-video tolerance applied to both tick completion and report summaries.
pub const DEFAULT_COMPLETION_TOLERANCE_SECS: u32 = 5;

/// Months between first access to the last video and the follow-up survey.
pub const DEFAULT_FOLLOWUP_WINDOW_MONTHS: u32 = 6;

/// Tunables of the progress engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    completion_tolerance_secs: u32,
    followup_window_months: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            completion_tolerance_secs: DEFAULT_COMPLETION_TOLERANCE_SECS,
            followup_window_months: DEFAULT_FOLLOWUP_WINDOW_MONTHS,
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn new(completion_tolerance_secs: u32, followup_window_months: u32) -> Self {
        Self {
            completion_tolerance_secs,
            followup_window_months,
        }
    }

    #[must_use]
    pub fn completion_tolerance_secs(&self) -> u32 {
        self.completion_tolerance_secs
    }

    #[must_use]
    pub fn followup_window_months(&self) -> u32 {
        self.followup_window_months
    }

    /// Position (or accumulated total) at which a video counts as reaching its end.
    #[must_use]
    pub fn end_threshold(&self, duration_seconds: u32) -> u32 {
        duration_seconds.saturating_sub(self.completion_tolerance_secs)
    }
}
