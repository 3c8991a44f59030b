use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::Result;

/// Placeholder shown instead of the value of a secured variable.
pub const SECRET_MASK: &str = "********";

/// Status of a pipeline or step, as reported by `state.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Pending,
    InProgress,
    Running,
    Paused,
    Stopped,
    Completed,
    Successful,
    Failed,
    Error,
    /// Anything outside the known set, keeping the upstream text (possibly empty)
    Unknown(String),
}

impl PipelineStatus {
    /// Parses an upstream status name. Comparison ignores case.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "IN_PROGRESS" => Self::InProgress,
            "RUNNING" => Self::Running,
            "PAUSED" => Self::Paused,
            "STOPPED" => Self::Stopped,
            "COMPLETED" => Self::Completed,
            "SUCCESSFUL" => Self::Successful,
            "FAILED" => Self::Failed,
            "ERROR" => Self::Error,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// No further transitions happen once a pipeline reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Successful | Self::Failed | Self::Stopped | Self::Error
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Completed => "COMPLETED",
            Self::Successful => "SUCCESSFUL",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PipelineStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The commit that triggered a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
}

impl CommitInfo {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..8).unwrap_or(&self.hash)
    }
}

/// A pipeline variable. Secured variables only ever carry [`SECRET_MASK`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    pub secured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub name: String,
    pub status: PipelineStatus,
    pub result: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Whole seconds, present only when both timestamps are
    pub duration_seconds: Option<i64>,
}

impl Step {
    pub fn duration_str(&self) -> String {
        self.duration_seconds
            .map_or_else(|| "Not completed".to_string(), format_duration)
    }
}

/// One immutable snapshot of a monitored pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pipeline {
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub pipeline_definition_name: String,
    pub status: PipelineStatus,
    pub result: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub commit: CommitInfo,
    pub variables: Vec<Variable>,
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Elapsed run time in whole seconds, recomputed against the clock on
    /// every call while the pipeline is still running.
    pub fn duration_seconds(&self) -> Option<i64> {
        self.duration_seconds_at(Utc::now())
    }

    pub fn duration_seconds_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let created = self.created_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - created).num_seconds().max(0))
    }

    pub fn duration_str(&self) -> String {
        self.duration_seconds()
            .map_or_else(|| "Not started".to_string(), format_duration)
    }

    /// Status text with the result appended when upstream reports one that
    /// differs from the state (e.g. `COMPLETED (FAILED)`).
    pub fn status_label(&self) -> String {
        match &self.result {
            Some(result) if !result.eq_ignore_ascii_case(self.status.as_str()) => {
                format!("{} ({})", self.status, result)
            }
            _ => self.status.to_string(),
        }
    }

    /// Flat mapping handed to exporters, including the computed duration.
    pub fn to_display_map(&self) -> Result<IndexMap<String, Value>> {
        let mut map = IndexMap::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("repository".to_string(), Value::from(self.repository.as_str()));
        map.insert("branch".to_string(), Value::from(self.branch.as_str()));
        map.insert(
            "pipeline".to_string(),
            Value::from(self.pipeline_definition_name.as_str()),
        );
        map.insert("status".to_string(), Value::from(self.status.as_str()));
        map.insert("result".to_string(), serde_json::to_value(&self.result)?);
        map.insert("created_at".to_string(), serde_json::to_value(self.created_at)?);
        map.insert(
            "completed_at".to_string(),
            serde_json::to_value(self.completed_at)?,
        );
        map.insert(
            "duration_seconds".to_string(),
            serde_json::to_value(self.duration_seconds())?,
        );
        map.insert("duration".to_string(), Value::from(self.duration_str()));
        map.insert("commit".to_string(), serde_json::to_value(&self.commit)?);
        map.insert("variables".to_string(), serde_json::to_value(&self.variables)?);
        map.insert("steps".to_string(), serde_json::to_value(&self.steps)?);
        Ok(map)
    }
}

/// Formats seconds as `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let (minutes, seconds) = (total_seconds / 60, total_seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
