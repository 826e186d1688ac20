//! Per-host provisioning status.
//!
//! A [`StatusRecord`] is created when a host's run starts and only moves
//! forward. Once it reaches [`HostState::Completed`] or [`HostState::Failed`]
//! it is saved one last time and never touched again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::phase::PhaseKind;

/// `currentPhase` value before the first phase starts.
pub const INITIALIZING: &str = "Initializing";

/// Lifecycle state of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostState {
    /// Connecting or running phases.
    InProgress,
    /// Every mandatory phase succeeded.
    Completed,
    /// A fatal phase or the connection failed.
    Failed,
}

impl HostState {
    /// Whether the state is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "In Progress"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Durable snapshot of one host's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    /// Host address.
    pub host: String,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub end_time: Option<DateTime<Utc>>,
    /// Phase executing or last attempted, or [`INITIALIZING`].
    pub current_phase: String,
    /// Lifecycle state.
    pub state: HostState,
    /// Failure description, empty unless failed.
    #[serde(default)]
    pub error: String,
    /// Phases that finished successfully, in completion order.
    #[serde(default)]
    pub completed_phases: Vec<PhaseKind>,
}

impl StatusRecord {
    /// A fresh in-progress record for `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            start_time: Utc::now(),
            end_time: None,
            current_phase: INITIALIZING.to_string(),
            state: HostState::InProgress,
            error: String::new(),
            completed_phases: Vec::new(),
        }
    }

    /// Mark `phase` as the one now executing.
    pub fn begin_phase(&mut self, phase: PhaseKind) {
        if self.state.is_terminal() {
            return;
        }
        info!(host = %self.host, "Phase: {} -> {}", self.current_phase, phase);
        self.current_phase = phase.name().to_string();
    }

    /// Record that `phase` finished successfully. Duplicates are ignored.
    pub fn complete_phase(&mut self, phase: PhaseKind) {
        if self.state.is_terminal() || self.completed_phases.contains(&phase) {
            return;
        }
        self.completed_phases.push(phase);
    }

    /// Move to [`HostState::Failed`] with `error`.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let error = error.into();
        self.error = if error.trim().is_empty() {
            "unknown error".to_string()
        } else {
            error
        };
        self.state = HostState::Failed;
        self.end_time = Some(Utc::now());
    }

    /// Move to [`HostState::Completed`].
    pub fn complete(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.error.clear();
        self.state = HostState::Completed;
        self.end_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = StatusRecord::new("10.0.0.1");
        assert_eq!(record.state, HostState::InProgress);
        assert_eq!(record.current_phase, INITIALIZING);
        assert!(record.end_time.is_none());
        assert!(record.error.is_empty());
        assert!(record.completed_phases.is_empty());
    }

    #[test]
    fn test_complete_phase_is_deduplicated() {
        let mut record = StatusRecord::new("h");
        record.complete_phase(PhaseKind::RequirementCheck);
        record.complete_phase(PhaseKind::RequirementCheck);
        assert_eq!(record.completed_phases, vec![PhaseKind::RequirementCheck]);
    }

    #[test]
    fn test_fail_sets_error_and_end_time() {
        let mut record = StatusRecord::new("h");
        record.begin_phase(PhaseKind::ClusterInstall);
        record.fail("");
        assert_eq!(record.state, HostState::Failed);
        assert!(!record.error.is_empty());
        assert!(record.end_time.is_some());
    }

    #[test]
    fn test_terminal_state_is_frozen() {
        let mut record = StatusRecord::new("h");
        record.complete_phase(PhaseKind::RequirementCheck);
        record.complete();
        let end = record.end_time;

        record.fail("late failure");
        record.complete_phase(PhaseKind::Verify);
        record.begin_phase(PhaseKind::Backup);

        assert_eq!(record.state, HostState::Completed);
        assert!(record.error.is_empty());
        assert_eq!(record.end_time, end);
        assert_eq!(record.completed_phases, vec![PhaseKind::RequirementCheck]);
        assert_eq!(record.current_phase, INITIALIZING);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut record = StatusRecord::new("10.0.0.1");
        record.complete_phase(PhaseKind::RequirementCheck);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["host"], "10.0.0.1");
        assert_eq!(value["currentPhase"], "Initializing");
        assert_eq!(value["state"], "InProgress");
        assert_eq!(value["completedPhases"][0], "RequirementCheck");
        assert!(value["endTime"].is_null());
        assert!(value.get("startTime").is_some());
    }
}
