//! Site orchestrator: owns every entity and advances them in a fixed order
//! each tick.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{SiteConfig, SiteSnapshot, SCHEMA_VERSION_V1};

use crate::environment::SiteEnvironment;
use crate::error::SimError;
use crate::escalation::EscalationManager;
use crate::machine::{MachineState, LOAD_MAX, LOAD_MIN};
use crate::worker::WorkerState;

mod step;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSlot {
    pub machine_id: String,
    pub machine_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSlot {
    pub worker_id: String,
    pub machine_id: String,
}

/// Entity roster a site is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteLayout {
    pub machines: Vec<MachineSlot>,
    pub workers: Vec<WorkerSlot>,
}

impl SiteLayout {
    /// Machines `CONST-001..` cycle through the configured types; workers
    /// `W1..` go round-robin over machines unless explicitly assigned.
    pub fn from_config(config: &SiteConfig) -> Self {
        let machines = (0..config.machine_count)
            .map(|index| MachineSlot {
                machine_id: SiteConfig::machine_id(index),
                machine_type: config
                    .machine_types
                    .get(index % config.machine_types.len().max(1))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        let workers = (0..config.worker_count)
            .map(|index| {
                let worker_id = SiteConfig::worker_id(index);
                let machine_id = config
                    .worker_assignments
                    .get(&worker_id)
                    .cloned()
                    .or_else(|| {
                        machines
                            .get(index % machines.len().max(1))
                            .map(|slot| slot.machine_id.clone())
                    })
                    .unwrap_or_default();
                WorkerSlot {
                    worker_id,
                    machine_id,
                }
            })
            .collect();
        Self { machines, workers }
    }
}

pub struct Site {
    config: SiteConfig,
    machines: BTreeMap<String, MachineState>,
    workers: BTreeMap<String, WorkerState>,
    /// Worker ids in roster order; escalation draws from this list.
    roster: Vec<String>,
    environment: SiteEnvironment,
    escalation: EscalationManager,
    trigger_level: bool,
    load_caps: BTreeMap<String, f64>,
    rest_orders: BTreeSet<String>,
    tick: u64,
    last_updated: f64,
}

impl Site {
    pub fn new(config: SiteConfig) -> Result<Self, SimError> {
        let layout = SiteLayout::from_config(&config);
        Self::with_layout(config, layout)
    }

    pub fn with_layout(config: SiteConfig, layout: SiteLayout) -> Result<Self, SimError> {
        crate::config::validate(&config)?;
        if layout.machines.is_empty() {
            return Err(SimError::NoMachines);
        }

        let mut machines = BTreeMap::new();
        for slot in layout.machines {
            if machines.contains_key(&slot.machine_id) {
                return Err(SimError::DuplicateMachine(slot.machine_id));
            }
            let machine = MachineState::new(&slot.machine_id, &slot.machine_type, config.seed);
            machines.insert(slot.machine_id, machine);
        }

        let mut workers = BTreeMap::new();
        let mut roster = Vec::with_capacity(layout.workers.len());
        for slot in layout.workers {
            if workers.contains_key(&slot.worker_id) {
                return Err(SimError::DuplicateWorker(slot.worker_id));
            }
            if !machines.contains_key(&slot.machine_id) {
                tracing::warn!(
                    worker_id = %slot.worker_id,
                    machine_id = %slot.machine_id,
                    "worker assigned to unknown machine; machine stress reads as zero"
                );
            }
            let worker = WorkerState::new(&slot.worker_id, &slot.machine_id, config.seed);
            roster.push(slot.worker_id.clone());
            workers.insert(slot.worker_id, worker);
        }
        for worker_id in config.worker_assignments.keys() {
            if !workers.contains_key(worker_id) {
                tracing::warn!(worker_id = %worker_id, "assignment names unknown worker");
            }
        }

        let environment =
            SiteEnvironment::new(config.seed, config.day_cycle_ticks, config.initial_weather);
        let escalation = EscalationManager::new(config.seed);
        tracing::info!(
            run_id = %config.run_id,
            seed = config.seed,
            machines = machines.len(),
            workers = workers.len(),
            "site initialised"
        );

        Ok(Self {
            config,
            machines,
            workers,
            roster,
            environment,
            escalation,
            trigger_level: false,
            load_caps: BTreeMap::new(),
            rest_orders: BTreeSet::new(),
            tick: 0,
            last_updated: 0.0,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn machine(&self, machine_id: &str) -> Option<&MachineState> {
        self.machines.get(machine_id)
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineState> {
        self.machines.values()
    }

    pub fn worker(&self, worker_id: &str) -> Option<&WorkerState> {
        self.workers.get(worker_id)
    }

    pub fn workers(&self) -> impl Iterator<Item = &WorkerState> {
        self.roster.iter().filter_map(|id| self.workers.get(id))
    }

    pub fn environment(&self) -> &SiteEnvironment {
        &self.environment
    }

    pub fn escalation(&self) -> &EscalationManager {
        &self.escalation
    }

    /// Escalation manager for explicit scenario plans. Trigger sampling at
    /// the next tick still reconciles against [`Site::set_escalation_trigger`].
    pub fn escalation_mut(&mut self) -> &mut EscalationManager {
        &mut self.escalation
    }

    pub fn escalation_trigger(&self) -> bool {
        self.trigger_level
    }

    /// Level signal sampled at the start of every tick.
    pub fn set_escalation_trigger(&mut self, active: bool) {
        if self.trigger_level != active {
            tracing::debug!(active, tick = self.tick, "escalation trigger changed");
        }
        self.trigger_level = active;
    }

    /// Cap a machine's engine load. Returns `false` for unknown machines.
    pub fn set_load_cap(&mut self, machine_id: &str, cap: f64) -> bool {
        if !self.machines.contains_key(machine_id) {
            return false;
        }
        let cap = cap.clamp(LOAD_MIN, LOAD_MAX);
        tracing::info!(machine_id, cap, "load cap applied");
        self.load_caps.insert(machine_id.to_string(), cap);
        true
    }

    pub fn clear_load_cap(&mut self, machine_id: &str) -> bool {
        self.load_caps.remove(machine_id).is_some()
    }

    pub fn load_cap(&self, machine_id: &str) -> Option<f64> {
        self.load_caps.get(machine_id).copied()
    }

    /// Put a worker on a supervisor-ordered break. Returns `false` for unknown workers.
    pub fn order_rest(&mut self, worker_id: &str) -> bool {
        if !self.workers.contains_key(worker_id) {
            return false;
        }
        tracing::info!(worker_id, "rest ordered");
        self.rest_orders.insert(worker_id.to_string());
        true
    }

    pub fn end_rest(&mut self, worker_id: &str) -> bool {
        self.rest_orders.remove(worker_id)
    }

    pub fn is_resting(&self, worker_id: &str) -> bool {
        self.rest_orders.contains(worker_id)
    }

    /// Current state without advancing; notifications are only carried by
    /// snapshots returned from [`Site::step`].
    pub fn snapshot(&self) -> SiteSnapshot {
        SiteSnapshot {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.config.run_id.clone(),
            tick: self.tick,
            last_updated: self.last_updated,
            machines: self
                .machines
                .iter()
                .map(|(id, machine)| (id.clone(), machine.to_record()))
                .collect(),
            workers: self
                .workers
                .iter()
                .map(|(id, worker)| (id.clone(), worker.to_record()))
                .collect(),
            environment: self.environment.to_record(),
            escalation: self.escalation.status(self.last_updated),
            notifications: Vec::new(),
        }
    }
}
