use std::collections::BTreeMap;

use super::*;
use crate::escalation::EscalationTransition;

impl Site {
    /// Advance every entity by one tick at wall-clock `now` (epoch seconds).
    pub fn step(&mut self, now: f64) -> SiteSnapshot {
        self.sync_escalation(now);

        let worker_factors = self
            .roster
            .iter()
            .map(|id| (id.clone(), self.escalation.get_factor(id, now)))
            .collect::<BTreeMap<_, _>>();
        let machine_factors = self.machine_factors(&worker_factors);

        self.environment.update();
        let ambient = self.environment.ambient_temp();
        let cooling = self.environment.cooling_efficiency();
        let humidity_factor = self.environment.fatigue_multiplier();

        for (id, machine) in &mut self.machines {
            let factor = machine_factors.get(id).copied().unwrap_or(0.0);
            let cap = self.load_caps.get(id).copied();
            machine.update(now, factor, ambient, cooling, cap);
        }

        for (id, worker) in &mut self.workers {
            let machine_stress = self
                .machines
                .get(worker.assigned_machine_id())
                .map(MachineState::stress_index)
                .unwrap_or(0.0);
            let factor = worker_factors.get(id).copied().unwrap_or(0.0);
            worker.update(
                now,
                machine_stress,
                factor,
                humidity_factor,
                self.rest_orders.contains(id),
            );
        }

        self.tick = self.tick.saturating_add(1);
        self.last_updated = now;
        let mut snapshot = self.snapshot();
        snapshot.notifications = self.escalation.take_notifications();
        snapshot
    }

    fn sync_escalation(&mut self, now: f64) {
        let transition = self
            .escalation
            .sync_trigger(self.trigger_level, now, &self.roster);
        if transition == Some(EscalationTransition::Deactivated) {
            tracing::debug!(tick = self.tick, "trigger released");
        }
        if self.escalation.take_reset_request() {
            self.reset_entities();
        }
    }

    /// A machine escalates as hard as the most escalated worker assigned to it.
    fn machine_factors(&self, worker_factors: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut factors = BTreeMap::new();
        for (id, worker) in &self.workers {
            let factor = worker_factors.get(id).copied().unwrap_or(0.0);
            let entry = factors
                .entry(worker.assigned_machine_id().to_string())
                .or_insert(0.0_f64);
            *entry = entry.max(factor);
        }
        factors
    }

    fn reset_entities(&mut self) {
        for machine in self.machines.values_mut() {
            machine.reset();
        }
        for worker in self.workers.values_mut() {
            worker.reset();
        }
        tracing::info!(
            tick = self.tick,
            machines = self.machines.len(),
            workers = self.workers.len(),
            "entities reset after escalation"
        );
    }
}
