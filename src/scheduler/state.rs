//! ExecutionState and the per-batch state machine. Transitions are
//! monotone; `BatchExecution::transition` refuses anything not in the
//! documented diagram and returns `SchedulerError::InvariantViolated`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::FieldId;
use crate::plan::{Command, Plan};

use super::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Preparing,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
        )
    }

    /// Whether `self -> to` is one of the allowed state-machine edges.
    fn allows(self, to: BatchStatus) -> bool {
        use BatchStatus::*;
        match (self, to) {
            (Pending, Preparing) => true,
            (Preparing, Executing) => true,
            (Executing, Completed) => true,
            (Pending, Failed) | (Preparing, Failed) | (Executing, Failed) => true,
            (Pending, Cancelled) | (Preparing, Cancelled) | (Executing, Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchExecution {
    pub status: BatchStatus,
    pub original_times: (f64, f64),
    pub current_times: (f64, f64),
    pub water_levels_at_prep: BTreeMap<FieldId, f64>,
    pub updated_commands: Option<Vec<Command>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub log: Vec<String>,
    pub error: Option<String>,
    /// Fields whose inlet has already been closed by the Completion
    /// Monitor, so a repeat reading above target doesn't re-close it.
    #[serde(skip)]
    pub closed_field_inlets: std::collections::HashSet<FieldId>,
    #[serde(skip)]
    pub closed_regulators: std::collections::HashSet<crate::model::GateId>,
}

impl BatchExecution {
    pub fn new(original_times: (f64, f64)) -> Self {
        Self {
            status: BatchStatus::Pending,
            original_times,
            current_times: original_times,
            water_levels_at_prep: BTreeMap::new(),
            updated_commands: None,
            started_at: None,
            completed_at: None,
            log: Vec::new(),
            error: None,
            closed_field_inlets: std::collections::HashSet::new(),
            closed_regulators: std::collections::HashSet::new(),
        }
    }

    /// Attempt a state transition. Refuses (and logs) anything outside the
    /// state machine instead of silently allowing re-entry.
    pub fn transition(&mut self, to: BatchStatus, batch_index: usize) -> Result<(), SchedulerError> {
        if !self.status.allows(to) {
            let msg = format!(
                "batch {batch_index}: illegal transition {:?} -> {:?} refused",
                self.status, to
            );
            tracing::error!("{msg}");
            return Err(SchedulerError::InvariantViolated(msg));
        }

        tracing::info!(
            batch_index,
            from_status = ?self.status,
            to_status = ?to,
            "batch state transition"
        );
        self.log.push(format!(
            "{} {:?} -> {:?}",
            Utc::now().to_rfc3339(),
            self.status,
            to
        ));
        self.status = to;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Cancelled,
    Error,
}

/// Per-run execution state: the plan being executed plus one
/// `BatchExecution` per batch, keyed by 1-based batch index.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionState {
    pub execution_id: String,
    pub farm_id: String,
    pub plan: Plan,
    pub status: ExecutionStatus,
    pub batches: BTreeMap<usize, BatchExecution>,
    pub execution_start: Option<DateTime<Utc>>,
    pub last_water_level_update: Option<DateTime<Utc>>,
}

impl ExecutionState {
    pub fn new(farm_id: String, plan: Plan) -> Self {
        let mut batches = BTreeMap::new();
        for batch in &plan.batches {
            let step = plan.steps.get(batch.index - 1);
            let times = step.map(|s| (s.t_start_h, s.t_end_h)).unwrap_or((0.0, 0.0));
            batches.insert(batch.index, BatchExecution::new(times));
        }

        Self {
            execution_id: Uuid::new_v4().to_string(),
            farm_id,
            plan,
            status: ExecutionStatus::Running,
            batches,
            execution_start: None,
            last_water_level_update: None,
        }
    }

    pub fn all_terminal(&self) -> bool {
        self.batches.values().all(|b| b.status.is_terminal())
    }

    pub fn any_completed(&self) -> bool {
        self.batches
            .values()
            .any(|b| b.status == BatchStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusSnapshot {
    pub index: usize,
    pub status: BatchStatus,
    pub current_times: (f64, f64),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub current_batch: Option<usize>,
    pub total_batches: usize,
    pub execution_start: Option<DateTime<Utc>>,
    pub last_water_level_update: Option<DateTime<Utc>>,
    pub batches: Vec<BatchStatusSnapshot>,
}

impl From<&ExecutionState> for StatusSnapshot {
    fn from(state: &ExecutionState) -> Self {
        let current_batch = state
            .batches
            .iter()
            .find(|(_, b)| matches!(b.status, BatchStatus::Preparing | BatchStatus::Executing))
            .map(|(i, _)| *i);

        Self {
            execution_id: state.execution_id.clone(),
            status: state.status,
            current_batch,
            total_batches: state.batches.len(),
            execution_start: state.execution_start,
            last_water_level_update: state.last_water_level_update,
            batches: state
                .batches
                .iter()
                .map(|(index, b)| BatchStatusSnapshot {
                    index: *index,
                    status: b.status,
                    current_times: b.current_times,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_preparing_allowed() {
        let mut b = BatchExecution::new((0.0, 1.0));
        assert!(b.transition(BatchStatus::Preparing, 1).is_ok());
    }

    #[test]
    fn completed_is_terminal_and_refuses_further_transitions() {
        let mut b = BatchExecution::new((0.0, 1.0));
        b.transition(BatchStatus::Preparing, 1).unwrap();
        b.transition(BatchStatus::Executing, 1).unwrap();
        b.transition(BatchStatus::Completed, 1).unwrap();
        assert!(b.status.is_terminal());
        assert!(b.transition(BatchStatus::Executing, 1).is_err());
    }

    #[test]
    fn any_nonterminal_state_can_cancel() {
        let mut pending = BatchExecution::new((0.0, 1.0));
        assert!(pending.transition(BatchStatus::Cancelled, 1).is_ok());

        let mut executing = BatchExecution::new((0.0, 1.0));
        executing.transition(BatchStatus::Preparing, 2).unwrap();
        executing.transition(BatchStatus::Executing, 2).unwrap();
        assert!(executing.transition(BatchStatus::Cancelled, 2).is_ok());
    }

    #[test]
    fn skipping_preparing_is_refused() {
        let mut b = BatchExecution::new((0.0, 1.0));
        assert!(b.transition(BatchStatus::Executing, 1).is_err());
    }
}
