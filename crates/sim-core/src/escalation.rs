//! Scripted risk escalation: picks target workers on activation and hands out
//! a jittered, phased intensity per target each tick.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{CriticalNotification, EscalationStatus, EscalationTier};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::noise::jitter;
use crate::seed::entity_rng;

pub const CRITICAL_TARGETS: usize = 2;
pub const WARNING_TARGETS: usize = 3;
/// Critical targets notify once their factor reaches this level.
pub const NOTIFY_THRESHOLD: f64 = 0.8;
pub const WARNING_CAP: f64 = 0.65;

const RAMP_PHASE_SECONDS: f64 = 10.0;
const ESCALATION_ENTITY_ID: &str = "escalation-manager";

/// Critical intensity before severity and noise: 0 -> 0.5 over the first
/// phase, 0.5 -> 1.0 over the second, then held at 1.0.
pub fn critical_curve(elapsed: f64) -> f64 {
    if elapsed <= 0.0 {
        0.0
    } else if elapsed < RAMP_PHASE_SECONDS {
        0.5 * elapsed / RAMP_PHASE_SECONDS
    } else if elapsed < 2.0 * RAMP_PHASE_SECONDS {
        0.5 + 0.5 * (elapsed - RAMP_PHASE_SECONDS) / RAMP_PHASE_SECONDS
    } else {
        1.0
    }
}

/// Warning intensity before severity and noise: 0 -> 0.5, then held.
pub fn warning_curve(elapsed: f64) -> f64 {
    if elapsed <= 0.0 {
        0.0
    } else if elapsed < RAMP_PHASE_SECONDS {
        0.5 * elapsed / RAMP_PHASE_SECONDS
    } else {
        0.5
    }
}

/// Per-target pacing, drawn fresh on every activation.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationTarget {
    pub worker_id: String,
    pub tier: EscalationTier,
    pub severity: f64,
    /// Seconds added to the shared elapsed time for this target.
    pub time_offset: f64,
    pub noise_amplitude: f64,
}

impl EscalationTarget {
    pub fn new(worker_id: impl Into<String>, tier: EscalationTier) -> Self {
        Self {
            worker_id: worker_id.into(),
            tier,
            severity: 1.0,
            time_offset: 0.0,
            noise_amplitude: 0.0,
        }
    }

    fn random<R: Rng + ?Sized>(rng: &mut R, worker_id: &str, tier: EscalationTier) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            tier,
            severity: rng.gen_range(0.8..=1.2),
            time_offset: rng.gen_range(-2.0..=2.0),
            noise_amplitude: rng.gen_range(0.02..=0.06),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationTransition {
    Activated,
    Deactivated,
}

#[derive(Debug, Clone)]
pub struct EscalationManager {
    active: bool,
    start_time: f64,
    targets: BTreeMap<String, EscalationTarget>,
    notified: BTreeSet<String>,
    pending_notifications: Vec<CriticalNotification>,
    reset_requested: bool,
    activations: u64,
    rng: ChaCha8Rng,
}

impl EscalationManager {
    pub fn new(site_seed: u64) -> Self {
        Self {
            active: false,
            start_time: 0.0,
            targets: BTreeMap::new(),
            notified: BTreeSet::new(),
            pending_notifications: Vec::new(),
            reset_requested: false,
            activations: 0,
            rng: entity_rng(site_seed, ESCALATION_ENTITY_ID),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activations(&self) -> u64 {
        self.activations
    }

    pub fn targets(&self) -> impl Iterator<Item = &EscalationTarget> {
        self.targets.values()
    }

    pub fn target(&self, worker_id: &str) -> Option<&EscalationTarget> {
        self.targets.get(worker_id)
    }

    pub fn status(&self, now: f64) -> EscalationStatus {
        EscalationStatus {
            active: self.active,
            elapsed_seconds: if self.active {
                (now - self.start_time).max(0.0)
            } else {
                0.0
            },
        }
    }

    /// Start a scenario, drawing targets from `candidates` without replacement.
    /// Critical slots fill first when fewer than five candidates exist.
    /// Returns `false` if a scenario is already live.
    pub fn activate(&mut self, now: f64, candidates: &[String]) -> bool {
        if self.active {
            return false;
        }
        let picked = candidates
            .choose_multiple(&mut self.rng, CRITICAL_TARGETS + WARNING_TARGETS)
            .cloned()
            .collect::<Vec<_>>();
        let mut targets = Vec::with_capacity(picked.len());
        for (index, worker_id) in picked.iter().enumerate() {
            let tier = if index < CRITICAL_TARGETS {
                EscalationTier::Critical
            } else {
                EscalationTier::Warning
            };
            targets.push(EscalationTarget::random(&mut self.rng, worker_id, tier));
        }
        self.install(now, targets);
        true
    }

    /// Start a scenario with explicit targets and pacing.
    pub fn activate_with_plan(&mut self, now: f64, targets: Vec<EscalationTarget>) -> bool {
        if self.active {
            return false;
        }
        self.install(now, targets);
        true
    }

    /// End the scenario and request a one-shot hard reset of every entity.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.targets.clear();
        self.notified.clear();
        self.reset_requested = true;
        tracing::info!(activation = self.activations, "escalation deactivated");
        true
    }

    /// Reconcile a sampled trigger level with the current state.
    pub fn sync_trigger(
        &mut self,
        level: bool,
        now: f64,
        candidates: &[String],
    ) -> Option<EscalationTransition> {
        match (level, self.active) {
            (true, false) => {
                self.activate(now, candidates);
                Some(EscalationTransition::Activated)
            }
            (false, true) => {
                self.deactivate();
                Some(EscalationTransition::Deactivated)
            }
            _ => None,
        }
    }

    /// Consume the reset request raised by the last deactivation.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_requested)
    }

    pub fn take_notifications(&mut self) -> Vec<CriticalNotification> {
        std::mem::take(&mut self.pending_notifications)
    }

    /// Intensity in `[0, 1]` for `worker_id` at `now`; 0 for non-targets.
    pub fn get_factor(&mut self, worker_id: &str, now: f64) -> f64 {
        if !self.active {
            return 0.0;
        }
        let Some(target) = self.targets.get(worker_id) else {
            return 0.0;
        };
        let elapsed = now - self.start_time;
        let personal_elapsed = elapsed + target.time_offset;
        let noise = jitter(&mut self.rng, target.noise_amplitude);
        match target.tier {
            EscalationTier::Critical => {
                let factor =
                    (critical_curve(personal_elapsed) * target.severity + noise).clamp(0.0, 1.0);
                if factor >= NOTIFY_THRESHOLD && self.notified.insert(worker_id.to_string()) {
                    tracing::warn!(
                        worker_id,
                        factor,
                        elapsed_seconds = elapsed,
                        "escalation target reached critical intensity"
                    );
                    self.pending_notifications.push(CriticalNotification {
                        worker_id: worker_id.to_string(),
                        factor,
                        elapsed_seconds: elapsed.max(0.0),
                        timestamp: now,
                    });
                }
                factor
            }
            EscalationTier::Warning => {
                (warning_curve(personal_elapsed) * target.severity + noise).clamp(0.0, WARNING_CAP)
            }
        }
    }

    fn install(&mut self, now: f64, targets: Vec<EscalationTarget>) {
        self.active = true;
        self.start_time = now;
        self.notified.clear();
        self.pending_notifications.clear();
        self.activations = self.activations.saturating_add(1);
        self.targets = targets
            .into_iter()
            .map(|target| (target.worker_id.clone(), target))
            .collect();
        let critical = self
            .targets
            .values()
            .filter(|target| target.tier == EscalationTier::Critical)
            .map(|target| target.worker_id.as_str())
            .collect::<Vec<_>>();
        tracing::info!(
            activation = self.activations,
            targets = self.targets.len(),
            ?critical,
            "escalation activated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("W{i}")).collect()
    }

    #[test]
    fn curves_follow_their_phases() {
        assert_eq!(critical_curve(-1.0), 0.0);
        assert_eq!(critical_curve(5.0), 0.25);
        assert_eq!(critical_curve(10.0), 0.5);
        assert_eq!(critical_curve(15.0), 0.75);
        assert_eq!(critical_curve(20.0), 1.0);
        assert_eq!(critical_curve(500.0), 1.0);
        assert_eq!(warning_curve(5.0), 0.25);
        assert_eq!(warning_curve(60.0), 0.5);
    }

    #[test]
    fn activation_draws_distinct_split_targets() {
        let mut manager = EscalationManager::new(42);
        assert!(manager.activate(100.0, &roster(10)));
        let targets = manager.targets().cloned().collect::<Vec<_>>();
        assert_eq!(targets.len(), 5);
        let critical = targets
            .iter()
            .filter(|t| t.tier == EscalationTier::Critical)
            .count();
        assert_eq!(critical, CRITICAL_TARGETS);
        for target in &targets {
            assert!((0.8..=1.2).contains(&target.severity));
            assert!((-2.0..=2.0).contains(&target.time_offset));
            assert!((0.02..=0.06).contains(&target.noise_amplitude));
        }
    }

    #[test]
    fn small_roster_fills_critical_first() {
        let mut manager = EscalationManager::new(1);
        manager.activate(0.0, &roster(3));
        let tiers = manager.targets().map(|t| t.tier).collect::<Vec<_>>();
        assert_eq!(tiers.len(), 3);
        assert_eq!(
            tiers.iter().filter(|t| **t == EscalationTier::Critical).count(),
            2
        );
    }

    #[test]
    fn second_activation_while_live_is_ignored() {
        let mut manager = EscalationManager::new(3);
        assert!(manager.activate(0.0, &roster(10)));
        let before = manager.targets().cloned().collect::<Vec<_>>();
        assert!(!manager.activate(5.0, &roster(10)));
        assert_eq!(manager.targets().cloned().collect::<Vec<_>>(), before);
        assert_eq!(manager.activations(), 1);
    }

    #[test]
    fn non_targets_and_inactive_return_zero() {
        let mut manager = EscalationManager::new(8);
        assert_eq!(manager.get_factor("W1", 10.0), 0.0);
        let plan = vec![EscalationTarget::new("W1", EscalationTier::Critical)];
        manager.activate_with_plan(0.0, plan);
        assert_eq!(manager.get_factor("W2", 30.0), 0.0);
        assert_eq!(manager.get_factor("W1", 30.0), 1.0);
    }

    #[test]
    fn deactivation_raises_one_shot_reset() {
        let mut manager = EscalationManager::new(8);
        assert!(!manager.deactivate());
        manager.activate(0.0, &roster(6));
        assert!(manager.deactivate());
        assert!(!manager.is_active());
        assert_eq!(manager.targets().count(), 0);
        assert!(manager.take_reset_request());
        assert!(!manager.take_reset_request());
    }

    #[test]
    fn trigger_level_maps_to_edges() {
        let mut manager = EscalationManager::new(2);
        let workers = roster(10);
        assert_eq!(manager.sync_trigger(false, 0.0, &workers), None);
        assert_eq!(
            manager.sync_trigger(true, 1.0, &workers),
            Some(EscalationTransition::Activated)
        );
        assert_eq!(manager.sync_trigger(true, 2.0, &workers), None);
        assert_eq!(
            manager.sync_trigger(false, 3.0, &workers),
            Some(EscalationTransition::Deactivated)
        );
        assert_eq!(manager.status(4.0), EscalationStatus::default());
    }

    #[test]
    fn notification_fires_once_per_activation() {
        let mut manager = EscalationManager::new(11);
        let plan = || vec![EscalationTarget::new("W3", EscalationTier::Critical)];
        manager.activate_with_plan(0.0, plan());
        for second in 0..60 {
            manager.get_factor("W3", f64::from(second));
        }
        let first = manager.take_notifications();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].worker_id, "W3");
        assert!(first[0].factor >= NOTIFY_THRESHOLD);

        manager.deactivate();
        manager.activate_with_plan(100.0, plan());
        for second in 100..160 {
            manager.get_factor("W3", f64::from(second));
        }
        assert_eq!(manager.take_notifications().len(), 1);
    }

    #[test]
    fn warning_targets_never_exceed_cap() {
        let mut manager = EscalationManager::new(5);
        let mut target = EscalationTarget::new("W4", EscalationTier::Warning);
        target.severity = 1.2;
        target.noise_amplitude = 0.06;
        target.time_offset = 2.0;
        manager.activate_with_plan(0.0, vec![target]);
        for tenth in 0..3_000 {
            let factor = manager.get_factor("W4", f64::from(tenth) / 10.0);
            assert!(factor <= WARNING_CAP);
        }
        assert!(manager.take_notifications().is_empty());
    }
}
