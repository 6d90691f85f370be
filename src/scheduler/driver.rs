//! Batch Scheduler — the cooperative driver that owns one running
//! plan's `ExecutionState` and advances every batch through prepare ->
//! execute -> complete, dispatching device commands with the documented
//! bottom-up ordering.
//!
//! Composition over globals: one `BatchScheduler` value is built per
//! `start_execution` call and lives until the terminating transition,
//! mirroring `pipeline::processing_loop::ProcessingLoop`'s
//! `tokio::select!` over a `CancellationToken` and a tick timer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SchedulerConfig;
use crate::dispatch::{stop_pump, DeviceControl, DeviceDispatcher, DispatchPhase, QueuedCommand};
use crate::model::{FarmConfig, FieldId};
use crate::monitor::CompletionMonitor;
use crate::plan::{Command, CommandAction, CommandTarget, Plan};
use crate::regen::regenerate_batch;
use crate::waterlevel::{WaterLevelSource, WaterLevelStore};

use super::error::SchedulerError;
use super::state::{BatchStatus, ExecutionState, ExecutionStatus, StatusSnapshot};

pub struct BatchScheduler {
    farm_config: FarmConfig,
    store: Arc<RwLock<WaterLevelStore>>,
    source: Arc<Mutex<WaterLevelSource>>,
    dispatcher: Arc<Mutex<DeviceDispatcher>>,
    device_control: Arc<dyn DeviceControl>,
    monitor: Arc<Mutex<CompletionMonitor>>,
    config: SchedulerConfig,
    state: Arc<RwLock<ExecutionState>>,
    cancel_token: CancellationToken,
}

impl BatchScheduler {
    /// Build a scheduler for `plan`. Fails if the plan has no batches
    /// (require a loaded plan with at least one batch).
    pub fn new(
        farm_config: FarmConfig,
        plan: Plan,
        store: WaterLevelStore,
        source: WaterLevelSource,
        device_control: Arc<dyn DeviceControl>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if plan.batches.is_empty() {
            return Err(SchedulerError::EmptyPlan);
        }

        let state = ExecutionState::new(farm_config.farm_id.clone(), plan);
        Ok(Self {
            farm_config,
            store: Arc::new(RwLock::new(store)),
            source: Arc::new(Mutex::new(source)),
            dispatcher: Arc::new(Mutex::new(DeviceDispatcher::new())),
            device_control,
            monitor: Arc::new(Mutex::new(CompletionMonitor::new(
                config.completion_poll_interval_s,
            ))),
            config,
            state: Arc::new(RwLock::new(state)),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Start the cooperative driver loop as a background task. Returns
    /// immediately; callers poll `status()`.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let driver = Driver {
            farm_config: self.farm_config.clone(),
            store: self.store.clone(),
            source: self.source.clone(),
            dispatcher: self.dispatcher.clone(),
            device_control: self.device_control.clone(),
            monitor: self.monitor.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
            cancel_token: self.cancel_token.clone(),
        };

        tokio::spawn(async move {
            {
                let mut state = driver.state.write().await;
                state.execution_start = Some(Utc::now());
            }
            info!("batch scheduler driver started");
            driver.run().await;
            info!("batch scheduler driver stopped");
        })
    }

    /// Request cancellation. Non-terminal batches transition to
    /// `cancelled` at the next tick; no new commands are dispatched.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.read().await;
        StatusSnapshot::from(&*state)
    }

    /// Outside the cadence: regenerate one batch's commands from a
    /// custom water-level map (or the store's current readings when none
    /// is supplied), and install the result as a manual Completion Monitor
    /// override until the next live fetch.
    pub async fn manual_regenerate_batch(
        &self,
        batch_index: usize,
        custom_water_levels: Option<HashMap<FieldId, f64>>,
        custom_standards: Option<crate::config::RegenerationRules>,
    ) -> Result<crate::regen::BatchRegenerationResult, SchedulerError> {
        if batch_index == 0 {
            return Err(SchedulerError::BatchIndexOutOfRange(0));
        }
        let rules = custom_standards.unwrap_or_else(|| self.farm_config.regeneration_rules.clone());

        // Gather everything needed while only holding read locks (in the
        // same store-then-state order as the driver loop's `poll_completion`,
        // so manual regeneration can never deadlock against the live
        // cooperative loop).
        let (batch, step) = {
            let state = self.state.read().await;
            let batch = state
                .plan
                .batches
                .get(batch_index - 1)
                .cloned()
                .ok_or(SchedulerError::BatchIndexOutOfRange(batch_index))?;
            let step = state
                .plan
                .steps
                .get(batch_index - 1)
                .cloned()
                .ok_or(SchedulerError::BatchIndexOutOfRange(batch_index))?;
            (batch, step)
        };

        let batch_fields: Vec<&crate::model::Field> = batch
            .fields
            .iter()
            .filter_map(|id| self.farm_config.field(id))
            .collect();

        let readings = match custom_water_levels {
            Some(map) => map,
            None => {
                let store = self.store.read().await;
                batch_fields
                    .iter()
                    .filter_map(|f| store.latest(&f.id).map(|r| (f.id.clone(), r.value_mm)))
                    .collect()
            }
        };

        let result = regenerate_batch(&batch, &step, &batch_fields, &readings, &rules);

        {
            let mut monitor = self.monitor.lock().await;
            for (field_id, value_mm) in &readings {
                monitor.set_override(field_id.clone(), *value_mm);
            }
        }

        let mut state = self.state.write().await;
        if let Some(exec) = state.batches.get_mut(&batch_index) {
            exec.water_levels_at_prep = readings.into_iter().collect();
            if result.success {
                exec.updated_commands = Some(result.regenerated_commands.clone());
            } else {
                warn!(batch_index, error = ?result.error, "manual regeneration rejected, keeping prior commands");
            }
        }

        Ok(result)
    }

    /// Forces a resolution cycle outside the scheduler's cadence.
    pub async fn update_water_levels(&self, field_ids: Option<&[FieldId]>) -> Result<(), SchedulerError> {
        let mut source = self.source.lock().await;
        let mut store = self.store.write().await;
        source.resolve(&self.farm_config, &mut store, field_ids).await?;
        drop(store);
        drop(source);

        self.monitor.lock().await.clear_overrides();
        self.state.write().await.last_water_level_update = Some(Utc::now());
        Ok(())
    }

    pub fn farm_config(&self) -> &FarmConfig {
        &self.farm_config
    }

    /// The store's summary, for the HTTP control surface's
    /// `/waterlevels/summary`.
    pub async fn store_summary(
        &self,
        field_ids: Option<&[FieldId]>,
        id_format: crate::waterlevel::IdFormat,
    ) -> crate::waterlevel::StoreSummary {
        self.store.read().await.summary(field_ids, id_format)
    }

    /// Persist the current water-level cache to `path`.
    pub async fn persist_store(&self, path: &std::path::Path) -> Result<(), SchedulerError> {
        self.store.read().await.persist(path)?;
        Ok(())
    }
}

/// The state actually moved into the spawned task. Split from
/// `BatchScheduler` only so `start()` can clone handles into `'static`
/// task without requiring `BatchScheduler` itself to be `Clone`.
struct Driver {
    farm_config: FarmConfig,
    store: Arc<RwLock<WaterLevelStore>>,
    source: Arc<Mutex<WaterLevelSource>>,
    dispatcher: Arc<Mutex<DeviceDispatcher>>,
    device_control: Arc<dyn DeviceControl>,
    monitor: Arc<Mutex<CompletionMonitor>>,
    config: SchedulerConfig,
    state: Arc<RwLock<ExecutionState>>,
    cancel_token: CancellationToken,
}

impl Driver {
    async fn run(&self) {
        let tick_interval = std::time::Duration::from_secs(self.config.tick_interval_s);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    self.cancel_all_nonterminal().await;
                    break;
                }
                _ = tokio::time::sleep(tick_interval) => {}
            }

            if self.cancel_token.is_cancelled() {
                self.cancel_all_nonterminal().await;
                break;
            }

            self.tick().await;

            if self.finalize_if_all_terminal().await {
                break;
            }
        }
    }

    fn elapsed_h(&self, execution_start: chrono::DateTime<Utc>) -> f64 {
        (Utc::now() - execution_start).num_milliseconds() as f64 / 3_600_000.0
    }

    async fn tick(&self) {
        let execution_start = {
            let state = self.state.read().await;
            match state.execution_start {
                Some(t) => t,
                None => return,
            }
        };
        let elapsed_h = self.elapsed_h(execution_start);
        let pre_buffer_h = self.config.pre_buffer_minutes / 60.0;

        let indices: Vec<usize> = {
            let state = self.state.read().await;
            state.batches.keys().copied().collect()
        };

        // Phase 1: pending -> preparing, strict index order, and only once
        // the predecessor has entered executing or gone terminal.
        for index in &indices {
            let (is_pending, original_start, predecessor_ready) = {
                let state = self.state.read().await;
                let exec = &state.batches[index];
                let predecessor_ready = *index == 1
                    || state
                        .batches
                        .get(&(index - 1))
                        .map(|p| matches!(p.status, BatchStatus::Executing) || p.status.is_terminal())
                        .unwrap_or(true);
                (
                    exec.status == BatchStatus::Pending,
                    exec.original_times.0,
                    predecessor_ready,
                )
            };

            if !is_pending || !predecessor_ready {
                continue;
            }
            if original_start - elapsed_h > pre_buffer_h {
                continue;
            }

            self.prepare_batch(*index).await;
        }

        // Phase 2: preparing -> executing.
        for index in &indices {
            let (is_preparing, original_start) = {
                let state = self.state.read().await;
                let exec = &state.batches[index];
                (exec.status == BatchStatus::Preparing, exec.original_times.0)
            };
            if !is_preparing || original_start > elapsed_h {
                continue;
            }
            self.execute_batch(*index).await;
        }

        // Phase 3: executing -> completed.
        for index in &indices {
            let is_executing = {
                let state = self.state.read().await;
                state.batches[index].status == BatchStatus::Executing
            };
            if !is_executing {
                continue;
            }
            self.poll_completion(*index, elapsed_h).await;
        }
    }

    async fn prepare_batch(&self, index: usize) {
        {
            let mut state = self.state.write().await;
            if let Some(exec) = state.batches.get_mut(&index) {
                if let Err(e) = exec.transition(BatchStatus::Preparing, index) {
                    warn!(batch_index = index, error = %e, "refused transition to preparing");
                    return;
                }
            }
        }

        let batch_fields: Vec<FieldId> = {
            let state = self.state.read().await;
            state.plan.batches[index - 1].fields.clone()
        };

        let fetch_result = {
            let mut source = self.source.lock().await;
            let mut store = self.store.write().await;
            source
                .resolve(&self.farm_config, &mut store, Some(&batch_fields))
                .await
        };

        if let Err(e) = fetch_result {
            warn!(batch_index = index, error = %e, "water-level fetch failed during prepare, falling back to cached/config readings");
        } else {
            self.state.write().await.last_water_level_update = Some(Utc::now());
        }

        let readings: HashMap<FieldId, f64> = {
            let store = self.store.read().await;
            batch_fields
                .iter()
                .filter_map(|id| store.latest(id).map(|r| (id.clone(), r.value_mm)))
                .collect()
        };

        let mut state = self.state.write().await;
        let batch = state.plan.batches[index - 1].clone();
        let step = state.plan.steps[index - 1].clone();
        let batch_fields_refs: Vec<&crate::model::Field> = batch
            .fields
            .iter()
            .filter_map(|id| self.farm_config.field(id))
            .collect();

        let result = regenerate_batch(
            &batch,
            &step,
            &batch_fields_refs,
            &readings,
            &self.farm_config.regeneration_rules,
        );

        if let Some(exec) = state.batches.get_mut(&index) {
            exec.water_levels_at_prep = readings.into_iter().collect();
            if result.success {
                let adjustment_h = result.execution_time_adjustment_s / 3600.0;
                exec.current_times = (step.t_start_h, step.t_end_h + adjustment_h);
                exec.updated_commands = Some(result.regenerated_commands);
            } else {
                warn!(batch_index = index, error = ?result.error, "regeneration rejected, retaining original commands");
                exec.updated_commands = None;
            }
        }
    }

    async fn execute_batch(&self, index: usize) {
        let commands: Vec<Command> = {
            let mut state = self.state.write().await;
            let exec = match state.batches.get_mut(&index) {
                Some(e) => e,
                None => return,
            };
            if let Err(e) = exec.transition(BatchStatus::Executing, index) {
                warn!(batch_index = index, error = %e, "refused transition to executing");
                return;
            }
            exec.started_at = Some(Utc::now());
            exec.updated_commands
                .clone()
                .unwrap_or_else(|| state.plan.steps[index - 1].commands.clone())
        };

        if self.cancel_token.is_cancelled() {
            return;
        }

        // Pump shutdown is owned solely by the wrapup path
        // (`finalize_if_all_terminal`, driven by the Completion Monitor):
        // dispatching the step's own pumps-off commands here would stop a
        // pump mid-batch and double-dispatch its stop once the batch
        // actually finishes.
        let runnable: Vec<Command> = commands
            .into_iter()
            .filter(|c| !matches!((c.action, &c.target), (CommandAction::Stop, CommandTarget::Pump(_))))
            .collect();

        let queued = commands_to_queue(&runnable);
        let mut dispatcher = self.dispatcher.lock().await;
        dispatcher.enqueue_many(queued);
        dispatcher.drain(self.device_control.as_ref()).await;
    }

    async fn poll_completion(&self, index: usize, elapsed_h: f64) {
        let (batch, tolerance_mm, active_pumps) = {
            let state = self.state.read().await;
            (
                state.plan.batches[index - 1].clone(),
                self.farm_config.regeneration_rules.water_level_tolerance_mm,
                state.plan.calc.active_pumps.clone(),
            )
        };

        let store = self.store.read().await;
        let monitor = self.monitor.lock().await;

        let mut state = self.state.write().await;
        let exec = match state.batches.get_mut(&index) {
            Some(e) => e,
            None => return,
        };

        let tick = monitor.evaluate(
            &self.farm_config,
            &store,
            &batch,
            tolerance_mm,
            &mut exec.closed_field_inlets,
            &mut exec.closed_regulators,
        );

        let timed_out = elapsed_h >= exec.original_times.0 + (exec.original_times.1 - exec.original_times.0);
        let done = tick.batch_fully_done || timed_out;

        let mut to_dispatch = tick.commands;
        if done {
            if let Err(e) = exec.transition(BatchStatus::Completed, index) {
                warn!(batch_index = index, error = %e, "refused transition to completed");
            } else {
                exec.completed_at = Some(Utc::now());
            }
        }
        drop(state);
        drop(monitor);
        drop(store);

        if !to_dispatch.is_empty() {
            let mut dispatcher = self.dispatcher.lock().await;
            dispatcher.enqueue_many(std::mem::take(&mut to_dispatch));
            dispatcher.drain(self.device_control.as_ref()).await;
        }

        let _ = active_pumps; // pump stop is decided once, in finalize_if_all_terminal
    }

    async fn cancel_all_nonterminal(&self) {
        let mut state = self.state.write().await;
        let indices: Vec<usize> = state.batches.keys().copied().collect();
        for index in indices {
            if let Some(exec) = state.batches.get_mut(&index) {
                if !exec.status.is_terminal() {
                    let _ = exec.transition(BatchStatus::Cancelled, index);
                }
            }
        }
        state.status = ExecutionStatus::Cancelled;
    }

    /// Once every batch is terminal, dispatch the final pump-stop commands
    /// and settle the global status. Returns true once finalized (the
    /// caller should stop ticking).
    async fn finalize_if_all_terminal(&self) -> bool {
        let (all_terminal, any_completed, active_pumps, already_settled) = {
            let state = self.state.read().await;
            (
                state.all_terminal(),
                state.any_completed(),
                state.plan.calc.active_pumps.clone(),
                state.status != ExecutionStatus::Running,
            )
        };

        if !all_terminal {
            return false;
        }

        if !already_settled {
            let mut dispatcher = self.dispatcher.lock().await;
            for pump_id in &active_pumps {
                dispatcher.enqueue(stop_pump(pump_id, DispatchPhase::Wrapup));
            }
            dispatcher.drain(self.device_control.as_ref()).await;
        }

        let mut state = self.state.write().await;
        if state.status == ExecutionStatus::Running {
            state.status = if any_completed {
                ExecutionStatus::Completed
            } else {
                ExecutionStatus::Error
            };
        }

        true
    }
}

fn commands_to_queue(commands: &[Command]) -> Vec<QueuedCommand> {
    use crate::dispatch::{DeviceAction, DeviceCommand, DeviceType, DispatchPhase};

    commands
        .iter()
        .map(|c| {
            let (device_type, device_id) = match &c.target {
                CommandTarget::Pump(id) => (DeviceType::Pump, id.to_string()),
                CommandTarget::Gate(id) => (DeviceType::Regulator, id.to_string()),
                CommandTarget::Field(id) => (DeviceType::FieldInletGate, id.to_string()),
            };
            let action = match c.action {
                CommandAction::Start => DeviceAction::Start,
                CommandAction::Stop => DeviceAction::Stop,
                CommandAction::Open => DeviceAction::Open,
                CommandAction::Close => DeviceAction::Close,
                CommandAction::Set => DeviceAction::Set,
            };
            let priority = match device_type {
                DeviceType::Pump if action == DeviceAction::Start => 0,
                DeviceType::Regulator => 1,
                DeviceType::FieldInletGate => 2,
                DeviceType::Pump => 3,
            };
            QueuedCommand {
                command: DeviceCommand {
                    device_type,
                    device_id,
                    action,
                    value: c.value,
                    reason: "scheduled step command".to_string(),
                    description: format!("{:?} {:?}", action, c.target),
                },
                phase: DispatchPhase::Running,
                priority,
            }
        })
        .collect()
}
