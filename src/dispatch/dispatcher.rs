//! Device Dispatcher — owns the outbound command queue and drains it
//! through an injected device-control callback.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{FieldId, GateId, PumpId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Pump,
    Regulator,
    FieldInletGate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Prepare,
    Running,
    Wrapup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    Start,
    Stop,
    Open,
    Close,
    Set,
}

/// One fully-resolved command ready to be handed to the device-control
/// callback.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceCommand {
    pub device_type: DeviceType,
    pub device_id: String,
    pub action: DeviceAction,
    pub value: Option<f64>,
    pub reason: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueuedCommand {
    pub command: DeviceCommand,
    pub phase: DispatchPhase,
    /// Smaller runs first.
    pub priority: u8,
}

/// Seam over the host-supplied device-control callback (pump/valve/gate
/// actuation). Idempotent and returns success/failure; no hard timeout is
/// imposed by the core.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    async fn actuate(&self, cmd: &DeviceCommand) -> bool;
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchStats {
    pub sent: u64,
    pub acked: u64,
    pub errors_by_device_type: HashMap<String, u64>,
}

pub struct DeviceDispatcher {
    queue: VecDeque<QueuedCommand>,
    stats: DispatchStats,
}

impl Default for DeviceDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDispatcher {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            stats: DispatchStats::default(),
        }
    }

    pub fn enqueue(&mut self, command: QueuedCommand) {
        let pos = self
            .queue
            .iter()
            .position(|q| (q.phase as u8, q.priority) > (command.phase as u8, command.priority))
            .unwrap_or(self.queue.len());
        self.queue.insert(pos, command);
    }

    pub fn enqueue_many(&mut self, commands: Vec<QueuedCommand>) {
        for command in commands {
            self.enqueue(command);
        }
    }

    /// Drain the queue in `(phase, priority)` order through the injected
    /// callback.
    pub async fn drain(&mut self, control: &dyn DeviceControl) {
        while let Some(queued) = self.queue.pop_front() {
            self.stats.sent += 1;
            let ok = control.actuate(&queued.command).await;
            if ok {
                self.stats.acked += 1;
                info!(
                    device_type = ?queued.command.device_type,
                    device_id = %queued.command.device_id,
                    action = ?queued.command.action,
                    "device command acked"
                );
            } else {
                *self
                    .stats
                    .errors_by_device_type
                    .entry(format!("{:?}", queued.command.device_type))
                    .or_insert(0) += 1;
                warn!(
                    device_type = ?queued.command.device_type,
                    device_id = %queued.command.device_id,
                    "device command callback returned failure"
                );
            }
        }
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Device-type/priority-tagged command factory helpers (bottom-up closure
/// priorities: field-inlet=1 < regulator=2 < pump=3).
pub fn close_field_inlet(field_id: &FieldId, gate_id: &GateId, phase: DispatchPhase) -> QueuedCommand {
    QueuedCommand {
        command: DeviceCommand {
            device_type: DeviceType::FieldInletGate,
            device_id: gate_id.to_string(),
            action: DeviceAction::Close,
            value: None,
            reason: "target water level reached".to_string(),
            description: format!("close field-inlet {gate_id} for field {field_id}"),
        },
        phase,
        priority: 1,
    }
}

pub fn close_regulator(gate_id: &GateId, phase: DispatchPhase) -> QueuedCommand {
    QueuedCommand {
        command: DeviceCommand {
            device_type: DeviceType::Regulator,
            device_id: gate_id.to_string(),
            action: DeviceAction::Close,
            value: None,
            reason: "all fields on segment complete".to_string(),
            description: format!("close regulator {gate_id}"),
        },
        phase,
        priority: 2,
    }
}

pub fn stop_pump(pump_id: &PumpId, phase: DispatchPhase) -> QueuedCommand {
    QueuedCommand {
        command: DeviceCommand {
            device_type: DeviceType::Pump,
            device_id: pump_id.to_string(),
            action: DeviceAction::Stop,
            value: None,
            reason: "all batches using this pump complete".to_string(),
            description: format!("stop pump {pump_id}"),
        },
        phase,
        priority: 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingControl {
        calls: Mutex<Vec<String>>,
        fail_device_ids: Vec<String>,
    }

    #[async_trait]
    impl DeviceControl for RecordingControl {
        async fn actuate(&self, cmd: &DeviceCommand) -> bool {
            self.calls.lock().unwrap().push(cmd.device_id.clone());
            !self.fail_device_ids.contains(&cmd.device_id)
        }
    }

    #[tokio::test]
    async fn drains_in_bottom_up_priority_order() {
        let mut dispatcher = DeviceDispatcher::new();
        dispatcher.enqueue(stop_pump(&PumpId::from("P1"), DispatchPhase::Wrapup));
        dispatcher.enqueue(close_regulator(&GateId::from("S1-G1"), DispatchPhase::Wrapup));
        dispatcher.enqueue(close_field_inlet(
            &FieldId::from("F1"),
            &GateId::from("S1-G2"),
            DispatchPhase::Wrapup,
        ));

        let control = RecordingControl {
            calls: Mutex::new(Vec::new()),
            fail_device_ids: Vec::new(),
        };
        dispatcher.drain(&control).await;

        let calls = control.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["S1-G2", "S1-G1", "P1"]);
    }

    #[tokio::test]
    async fn records_errors_by_device_type() {
        let mut dispatcher = DeviceDispatcher::new();
        dispatcher.enqueue(stop_pump(&PumpId::from("P1"), DispatchPhase::Wrapup));

        let control = RecordingControl {
            calls: Mutex::new(Vec::new()),
            fail_device_ids: vec!["P1".to_string()],
        };
        dispatcher.drain(&control).await;

        assert_eq!(dispatcher.stats().sent, 1);
        assert_eq!(dispatcher.stats().acked, 0);
        assert_eq!(dispatcher.stats().errors_by_device_type.get("Pump"), Some(&1));
    }
}
