//! Worker physiology: heart rate, HRV, fatigue and stress driven by the
//! assigned machine, the environment, and the escalation scenario.

use contracts::{round_to, RiskLevel, WorkerRecord};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::noise::{jitter, NoiseChannel};
use crate::seed::{entity_rng, identity_rng};

pub const HEART_RATE_FLOOR: f64 = 50.0;
pub const HRV_MIN: f64 = 8.0;
pub const HRV_MAX: f64 = 90.0;

const FATIGUE_WEIGHT: f64 = 0.4;
const STRESS_WEIGHT: f64 = 0.3;
const MACHINE_STRESS_WEIGHT: f64 = 0.3;

const REST_HEART_RATE_RELAXATION: f64 = 0.15;
const REST_FATIGUE_RELIEF: f64 = 0.8;
const REST_STRESS_RELIEF: f64 = 3.0;
const REST_HRV_GAIN: f64 = 0.5;

/// Composite index over fatigue, personal stress and machine stress, each in
/// percent. Rounded to two decimals; thresholds live on [`RiskLevel`].
pub fn composite_index(fatigue: f64, stress: f64, machine_stress: f64) -> f64 {
    let raw = FATIGUE_WEIGHT * fatigue / 100.0
        + STRESS_WEIGHT * stress / 100.0
        + MACHINE_STRESS_WEIGHT * machine_stress / 100.0;
    round_to(raw.clamp(0.0, 1.0), 2)
}

/// Physiological constants fixed when the worker is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BioProfile {
    pub baseline_heart_rate: f64,
    pub max_heart_rate: f64,
    /// Fraction of the gap to the target heart rate closed per tick.
    pub reactivity: f64,
    pub jitter_amplitude: f64,
    /// Multiplier on fatigue gained under exertion.
    pub fatigue_resistance: f64,
    pub recovery_rate: f64,
    pub stress_sensitivity: f64,
    pub baseline_fatigue: f64,
    pub baseline_hrv: f64,
}

impl BioProfile {
    /// Draw a profile from a generator seeded by the worker id.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            baseline_heart_rate: rng.gen_range(62.0..78.0),
            max_heart_rate: rng.gen_range(175.0..195.0),
            reactivity: rng.gen_range(0.06..0.14),
            jitter_amplitude: rng.gen_range(0.8..2.0),
            fatigue_resistance: rng.gen_range(0.8..1.25),
            recovery_rate: rng.gen_range(0.005..0.02),
            stress_sensitivity: rng.gen_range(0.8..1.2),
            baseline_fatigue: rng.gen_range(5.0..15.0),
            baseline_hrv: rng.gen_range(45.0..70.0),
        }
    }

    pub fn headroom(&self) -> f64 {
        (self.max_heart_rate - self.baseline_heart_rate).max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerTelemetry {
    pub heart_rate: f64,
    pub hrv: f64,
    pub fatigue: f64,
    pub stress: f64,
    pub cis_score: f64,
    pub cis_risk_level: RiskLevel,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct WorkerState {
    id: String,
    assigned_machine_id: String,
    bio: BioProfile,
    telemetry: WorkerTelemetry,
    // Lagged heart rate before noise; the published value adds the noise channel.
    base_heart_rate: f64,
    heart_rate_noise: NoiseChannel,
    fatigue_noise: NoiseChannel,
    rng: ChaCha8Rng,
}

impl WorkerState {
    pub fn new(
        id: impl Into<String>,
        assigned_machine_id: impl Into<String>,
        site_seed: u64,
    ) -> Self {
        let id = id.into();
        let bio = BioProfile::generate(&mut identity_rng(&id));
        let rng = entity_rng(site_seed, &id);
        let mut worker = Self {
            id,
            assigned_machine_id: assigned_machine_id.into(),
            bio,
            telemetry: WorkerTelemetry {
                heart_rate: bio.baseline_heart_rate,
                hrv: bio.baseline_hrv,
                fatigue: bio.baseline_fatigue,
                stress: 0.0,
                cis_score: 0.0,
                cis_risk_level: RiskLevel::Safe,
                timestamp: 0.0,
            },
            base_heart_rate: bio.baseline_heart_rate,
            heart_rate_noise: NoiseChannel::new(0.3, bio.jitter_amplitude),
            fatigue_noise: NoiseChannel::new(0.5, 0.05),
            rng,
        };
        worker.reassess(0.0);
        worker
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn assigned_machine_id(&self) -> &str {
        &self.assigned_machine_id
    }

    pub fn bio_profile(&self) -> &BioProfile {
        &self.bio
    }

    pub fn telemetry(&self) -> &WorkerTelemetry {
        &self.telemetry
    }

    pub fn noise_levels(&self) -> [f64; 2] {
        [self.heart_rate_noise.value, self.fatigue_noise.value]
    }

    /// Advance one tick. `humidity_factor` is the environment's fatigue
    /// multiplier (1.0 in dry air). `force_rest` is a supervisor-ordered break
    /// and bypasses exertion physiology for the tick.
    pub fn update(
        &mut self,
        now: f64,
        machine_stress: f64,
        escalation_factor: f64,
        humidity_factor: f64,
        force_rest: bool,
    ) {
        let machine_stress = machine_stress.clamp(0.0, 100.0);
        let escalation = escalation_factor.clamp(0.0, 1.0);
        let humidity_factor = humidity_factor.max(1.0);
        let bio = self.bio;
        self.telemetry.timestamp = now;

        if force_rest {
            self.rest(machine_stress);
            return;
        }

        let t = &mut self.telemetry;
        let target_hr = bio.baseline_heart_rate
            + machine_stress * 0.25 * bio.stress_sensitivity
            + escalation * bio.headroom() * 0.75
            + t.fatigue * 0.15;
        self.base_heart_rate += (target_hr - self.base_heart_rate) * bio.reactivity;
        self.base_heart_rate = self
            .base_heart_rate
            .clamp(HEART_RATE_FLOOR, bio.max_heart_rate);
        t.heart_rate = (self.base_heart_rate + self.heart_rate_noise.advance(&mut self.rng))
            .clamp(HEART_RATE_FLOOR, bio.max_heart_rate);

        let elevation = t.heart_rate - bio.baseline_heart_rate;
        t.hrv = (bio.baseline_hrv - 0.6 * elevation - 15.0 * escalation
            + jitter(&mut self.rng, 2.0))
        .clamp(HRV_MIN, HRV_MAX);

        if escalation > 0.0 {
            t.fatigue += escalation * 0.8 * bio.fatigue_resistance * humidity_factor;
        } else {
            t.fatigue += (bio.baseline_fatigue - t.fatigue) * bio.recovery_rate;
            t.fatigue += 0.02 * (humidity_factor - 1.0);
        }
        t.fatigue += self.fatigue_noise.advance(&mut self.rng);
        t.fatigue = t.fatigue.clamp(0.0, 100.0);

        let relative_elevation = (elevation / bio.headroom()).clamp(0.0, 1.0);
        t.stress = (relative_elevation * 100.0 * bio.stress_sensitivity).clamp(0.0, 100.0);

        self.reassess(machine_stress);
    }

    /// Return to resting baseline and clear noise.
    pub fn reset(&mut self) {
        self.heart_rate_noise.clear();
        self.fatigue_noise.clear();
        self.base_heart_rate = self.bio.baseline_heart_rate;
        let t = &mut self.telemetry;
        t.heart_rate = self.bio.baseline_heart_rate;
        t.hrv = self.bio.baseline_hrv;
        t.fatigue = self.bio.baseline_fatigue;
        t.stress = 0.0;
        self.reassess(0.0);
    }

    pub fn to_record(&self) -> WorkerRecord {
        let t = &self.telemetry;
        WorkerRecord {
            worker_id: self.id.clone(),
            assigned_machine: self.assigned_machine_id.clone(),
            heart_rate_bpm: round_to(t.heart_rate, 0),
            hrv_ms: round_to(t.hrv, 0),
            fatigue_percent: round_to(t.fatigue, 1),
            stress_percent: round_to(t.stress, 1),
            cis_score: t.cis_score,
            cis_risk_level: t.cis_risk_level,
            timestamp: t.timestamp,
        }
    }

    fn rest(&mut self, machine_stress: f64) {
        let bio = self.bio;
        self.base_heart_rate +=
            (bio.baseline_heart_rate - self.base_heart_rate) * REST_HEART_RATE_RELAXATION;
        let t = &mut self.telemetry;
        t.heart_rate = (self.base_heart_rate + self.heart_rate_noise.value)
            .clamp(HEART_RATE_FLOOR, bio.max_heart_rate);
        t.fatigue = (t.fatigue - REST_FATIGUE_RELIEF).clamp(0.0, 100.0);
        t.stress = (t.stress - REST_STRESS_RELIEF).clamp(0.0, 100.0);
        t.hrv = (t.hrv + REST_HRV_GAIN).clamp(HRV_MIN, HRV_MAX);
        self.reassess(machine_stress);
    }

    fn reassess(&mut self, machine_stress: f64) {
        let t = &mut self.telemetry;
        t.cis_score = composite_index(t.fatigue, t.stress, machine_stress);
        t.cis_risk_level = RiskLevel::from_score(t.cis_score);
    }
}
