use contracts::{EscalationTier, RiskLevel, SiteConfig};
use proptest::prelude::*;
use sim_core::escalation::{critical_curve, WARNING_CAP};
use sim_core::{EscalationManager, EscalationTarget, Site};

fn roster() -> Vec<String> {
    (0..10).map(SiteConfig::worker_id).collect()
}

#[test]
fn property_w3_critical_scenario_reaches_full_intensity() {
    let mut manager = EscalationManager::new(1337);
    manager.activate_with_plan(
        1_000.0,
        vec![EscalationTarget::new("W3", EscalationTier::Critical)],
    );
    assert_eq!(manager.get_factor("W3", 1_015.0), 0.75);
    assert!(manager.take_notifications().is_empty());
    assert_eq!(manager.get_factor("W3", 1_025.0), 1.0);

    let notifications = manager.take_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].elapsed_seconds, 25.0);
    assert_eq!(manager.get_factor("W3", 1_030.0), 1.0);
    assert!(manager.take_notifications().is_empty());
}

#[test]
fn property_random_activation_covers_both_tiers_without_repeats() {
    for seed in 0..50 {
        let mut manager = EscalationManager::new(seed);
        assert!(manager.activate(0.0, &roster()));
        let mut ids = manager
            .targets()
            .map(|target| target.worker_id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        let critical = manager
            .targets()
            .filter(|target| target.tier == EscalationTier::Critical)
            .count();
        assert_eq!(critical, 2);
    }
}

#[test]
fn property_reactivation_redraws_targets() {
    let mut manager = EscalationManager::new(5);
    let mut draws = Vec::new();
    for round in 0..6 {
        let now = f64::from(round) * 100.0;
        manager.activate(now, &roster());
        let mut ids = manager
            .targets()
            .map(|target| target.worker_id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        draws.push(ids);
        manager.deactivate();
        assert!(manager.take_reset_request());
    }
    draws.dedup();
    assert!(draws.len() > 1, "every activation drew the same targets");
}

#[test]
fn property_site_critical_targets_reach_critical_risk() {
    let mut site = Site::new(SiteConfig::default()).expect("site");
    site.set_escalation_trigger(true);
    site.escalation_mut().activate_with_plan(
        0.0,
        vec![
            EscalationTarget::new("W3", EscalationTier::Critical),
            EscalationTarget::new("W9", EscalationTier::Warning),
        ],
    );
    let mut first_critical = None;
    for second in 0..180_u32 {
        let snapshot = site.step(f64::from(second));
        if first_critical.is_none()
            && snapshot.workers["W3"].cis_risk_level == RiskLevel::Critical
        {
            first_critical = Some(second);
        }
    }
    assert!(first_critical.is_some(), "W3 never reached critical risk");
    assert!(
        site.worker("W3").expect("W3").telemetry().cis_score
            > site.worker("W9").expect("W9").telemetry().cis_score
    );
}

proptest! {
    #[test]
    fn property_critical_factor_is_monotone_up_to_jitter(
        severity in 0.8_f64..=1.2,
        offset in -2.0_f64..=2.0,
        noise in 0.02_f64..=0.06,
        seed in 0_u64..1_000,
    ) {
        let mut manager = EscalationManager::new(seed);
        let mut target = EscalationTarget::new("W1", EscalationTier::Critical);
        target.severity = severity;
        target.time_offset = offset;
        target.noise_amplitude = noise;
        manager.activate_with_plan(0.0, vec![target]);

        let mut previous = 0.0_f64;
        for tenth in 0..400_u32 {
            let now = f64::from(tenth) / 10.0;
            let factor = manager.get_factor("W1", now);
            prop_assert!((0.0..=1.0).contains(&factor));
            prop_assert!(factor >= previous - 2.0 * noise - 1e-9);
            let ideal = (critical_curve(now + offset) * severity).clamp(0.0, 1.0);
            prop_assert!((factor - ideal).abs() <= noise + 1e-9);
            previous = factor;
        }
        prop_assert!(manager.take_notifications().len() <= 1);
    }

    #[test]
    fn property_warning_factor_is_capped(
        severity in 0.8_f64..=1.2,
        offset in -2.0_f64..=2.0,
        noise in 0.02_f64..=0.06,
        seed in 0_u64..1_000,
    ) {
        let mut manager = EscalationManager::new(seed);
        let mut target = EscalationTarget::new("W2", EscalationTier::Warning);
        target.severity = severity;
        target.time_offset = offset;
        target.noise_amplitude = noise;
        manager.activate_with_plan(0.0, vec![target]);
        for second in 0..120_u32 {
            let factor = manager.get_factor("W2", f64::from(second));
            prop_assert!((0.0..=WARNING_CAP).contains(&factor));
        }
        prop_assert!(manager.take_notifications().is_empty());
    }
}
