use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::slug::BuildSlug;

/// A single Buildkite build with its normalized job sequence.
#[derive(Debug, Clone)]
pub struct Build {
    /// Build UUID as reported by Buildkite
    pub uuid: String,
    /// Slug the build was fetched by
    pub slug: BuildSlug,
    /// Web URL of the build
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    /// Presence of this timestamp is the only thing that makes a build traceable
    pub finished_at: Option<DateTime<Utc>>,
    /// Jobs, oldest first
    pub jobs: Vec<Job>,
}

impl Build {
    /// Historical start of the build span: scheduled, then created, then
    /// started, then finished.
    pub fn span_start(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
            .or(self.created_at)
            .or(self.started_at)
            .or(self.finished_at)
    }
}

/// A job that survived decoding. Unhandled variants never reach this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Command(CommandJob),
    /// Stage boundary marker, never materialized as a span
    Wait(WaitJob),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandJob {
    pub uuid: String,
    pub label: String,
    pub state: JobState,
    pub command: String,
    pub created_at: Option<DateTime<Utc>>,
    pub runnable_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Build started as a side effect of this job
    pub triggered: Option<BuildSlug>,
}

impl CommandJob {
    /// Label, falling back to the command and then the UUID when unlabeled.
    pub fn display_name(&self) -> &str {
        [&self.label, &self.command, &self.uuid]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .map_or(self.uuid.as_str(), String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitJob {
    pub uuid: String,
    pub state: JobState,
}

/// Job lifecycle state. GraphQL reports `PASSED`, REST reports `passed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Pending,
    Waiting,
    Scheduled,
    Assigned,
    Accepted,
    Running,
    Passed,
    Failed,
    Canceling,
    Canceled,
    TimingOut,
    TimedOut,
    Skipped,
    Broken,
    Blocked,
    Unblocked,
    Expired,
    Other(String),
}

impl From<String> for JobState {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "WAITING" => Self::Waiting,
            "SCHEDULED" => Self::Scheduled,
            "ASSIGNED" => Self::Assigned,
            "ACCEPTED" => Self::Accepted,
            "RUNNING" => Self::Running,
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "CANCELING" => Self::Canceling,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "TIMING_OUT" => Self::TimingOut,
            "TIMED_OUT" => Self::TimedOut,
            "SKIPPED" => Self::Skipped,
            "BROKEN" => Self::Broken,
            "BLOCKED" => Self::Blocked,
            "UNBLOCKED" => Self::Unblocked,
            "EXPIRED" => Self::Expired,
            _ => Self::Other(value),
        }
    }
}

impl From<JobState> for String {
    fn from(state: JobState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pending => "PENDING",
            Self::Waiting => "WAITING",
            Self::Scheduled => "SCHEDULED",
            Self::Assigned => "ASSIGNED",
            Self::Accepted => "ACCEPTED",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Canceling => "CANCELING",
            Self::Canceled => "CANCELED",
            Self::TimingOut => "TIMING_OUT",
            Self::TimedOut => "TIMED_OUT",
            Self::Skipped => "SKIPPED",
            Self::Broken => "BROKEN",
            Self::Blocked => "BLOCKED",
            Self::Unblocked => "UNBLOCKED",
            Self::Expired => "EXPIRED",
            Self::Other(other) => other.as_str(),
        };
        f.write_str(text)
    }
}
