//! Machine physics: mode state machine, lagged rpm/load, coolant heat balance,
//! derived pressures/vibration/stress, and monotonic wear/fuel accumulators.

use contracts::{round_to, MachineRecord, OperatingMode};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::noise::{jitter, NoiseChannel};
use crate::profile::{profile_for, MachineProfile};
use crate::environment::thermal_penalty;
use crate::seed::{entity_rng, unit_interval_from_id};

pub const LOAD_MIN: f64 = 0.0;
pub const LOAD_MAX: f64 = 100.0;
pub const COOLANT_MIN: f64 = 20.0;
pub const COOLANT_MAX: f64 = 130.0;

const VARIANCE_MIN: f64 = 0.92;
const VARIANCE_MAX: f64 = 1.08;
/// A cap at or below this forces IDLE.
const IDLE_CAP_THRESHOLD: f64 = 10.0;
const GOVERNOR_RPM_FRACTION: f64 = 0.7;
const IDLE_TOGGLE_PROBABILITY: f64 = 0.03;
const ESCALATION_LOAD_BOOST: f64 = 20.0;
const HEAT_PER_LOAD: f64 = 1.2;
const HEAT_PER_ESCALATION: f64 = 0.8;
const HEAT_LOSS_COEFFICIENT: f64 = 0.025;
const ERROR_TRIP_TEMP: f64 = 128.0;
const ERROR_RECOVERY_TEMP: f64 = 90.0;

pub const FAULT_OVERHEAT: &str = "P0217";
pub const FAULT_LOW_OIL_PRESSURE: &str = "P0520";
pub const FAULT_LOW_FUEL: &str = "P0087";

/// Current machine readings. Only the owning [`MachineState`] writes these.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineTelemetry {
    pub rpm: f64,
    pub load: f64,
    pub coolant_temp: f64,
    pub oil_pressure: f64,
    pub hydraulic_pressure: f64,
    pub fuel_level: f64,
    pub degradation: f64,
    pub stress_index: f64,
    pub vibration: f64,
    pub operating_mode: OperatingMode,
    pub fault_codes: Vec<String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone)]
pub struct MachineState {
    id: String,
    machine_type: String,
    profile: &'static MachineProfile,
    variance: f64,
    telemetry: MachineTelemetry,
    // Noise-free lagged state; published readings are these plus noise.
    base_rpm: f64,
    base_load: f64,
    base_temp: f64,
    rpm_noise: NoiseChannel,
    load_noise: NoiseChannel,
    temp_noise: NoiseChannel,
    rng: ChaCha8Rng,
}

impl MachineState {
    /// Build a machine. Unregistered types run on the fallback profile.
    pub fn new(id: impl Into<String>, machine_type: impl Into<String>, site_seed: u64) -> Self {
        let id = id.into();
        let machine_type = machine_type.into();
        let profile = profile_for(&machine_type);
        let variance = unit_interval_from_id(&id, VARIANCE_MIN, VARIANCE_MAX);
        let rng = entity_rng(site_seed, &id);
        let mut machine = Self {
            id,
            machine_type,
            profile,
            variance,
            telemetry: MachineTelemetry {
                rpm: 0.0,
                load: 0.0,
                coolant_temp: profile.idle_temp,
                oil_pressure: 0.0,
                hydraulic_pressure: 0.0,
                fuel_level: 100.0,
                degradation: 0.0,
                stress_index: 0.0,
                vibration: 0.0,
                operating_mode: OperatingMode::Idle,
                fault_codes: Vec::new(),
                timestamp: 0.0,
            },
            base_rpm: 0.0,
            base_load: 0.0,
            base_temp: profile.idle_temp,
            rpm_noise: NoiseChannel::new(0.3, 8.0),
            load_noise: NoiseChannel::new(0.4, 0.8),
            temp_noise: NoiseChannel::new(0.2, 0.3),
            rng,
        };
        machine.settle_idle();
        machine
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    pub fn profile(&self) -> &'static MachineProfile {
        self.profile
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn telemetry(&self) -> &MachineTelemetry {
        &self.telemetry
    }

    pub fn stress_index(&self) -> f64 {
        self.telemetry.stress_index
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.telemetry.operating_mode
    }

    /// Current values of the rpm, load and temperature noise accumulators.
    pub fn noise_levels(&self) -> [f64; 3] {
        [
            self.rpm_noise.value,
            self.load_noise.value,
            self.temp_noise.value,
        ]
    }

    /// Advance one tick.
    ///
    /// `load_cap` is a supervisor override in percent; `None` leaves the
    /// machine uncapped.
    pub fn update(
        &mut self,
        now: f64,
        escalation_factor: f64,
        ambient_temp: f64,
        cooling_efficiency: f64,
        load_cap: Option<f64>,
    ) {
        let escalation = escalation_factor.clamp(0.0, 1.0);
        let cap = load_cap.map(|value| value.clamp(LOAD_MIN, LOAD_MAX));
        let profile = self.profile;
        self.telemetry.timestamp = now;

        let capped_idle = matches!(cap, Some(cap) if cap <= IDLE_CAP_THRESHOLD);
        self.telemetry.operating_mode = self.select_mode(escalation, cap);

        let (mut target_rpm, mut target_load) = match self.telemetry.operating_mode {
            OperatingMode::Idle => (profile.idle_rpm, profile.idle_load),
            OperatingMode::Working => (profile.work_rpm, profile.work_load),
            OperatingMode::HighLoad => (profile.peak_rpm, profile.peak_load),
            OperatingMode::Error => (0.0, 0.0),
        };
        target_rpm *= self.variance;
        target_load =
            (target_load * self.variance + ESCALATION_LOAD_BOOST * escalation).min(LOAD_MAX);
        if let Some(cap) = cap {
            target_load = target_load.min(cap);
            target_rpm = target_rpm.min(profile.work_rpm * GOVERNOR_RPM_FRACTION);
        }

        let responsiveness = profile.load_responsiveness;
        self.base_rpm += (target_rpm - self.base_rpm) * (responsiveness * 1.5).min(1.0);
        self.base_load += (target_load - self.base_load) * responsiveness;

        let load_fraction = (self.base_load / LOAD_MAX).clamp(0.0, 1.0);
        let heat_gen = load_fraction * HEAT_PER_LOAD
            + escalation * HEAT_PER_ESCALATION
            + thermal_penalty(ambient_temp);
        let heat_loss =
            (self.base_temp - ambient_temp) * HEAT_LOSS_COEFFICIENT * cooling_efficiency.max(0.0);
        self.base_temp = (self.base_temp + (heat_gen - heat_loss) / profile.thermal_inertia)
            .clamp(COOLANT_MIN, COOLANT_MAX);

        let rpm_ceiling = profile.peak_rpm * 1.1;
        self.telemetry.rpm =
            (self.base_rpm + self.rpm_noise.advance(&mut self.rng)).clamp(0.0, rpm_ceiling);
        self.telemetry.load =
            (self.base_load + self.load_noise.advance(&mut self.rng)).clamp(LOAD_MIN, LOAD_MAX);
        self.telemetry.coolant_temp = (self.base_temp + self.temp_noise.advance(&mut self.rng))
            .clamp(COOLANT_MIN, COOLANT_MAX);

        self.derive_readings(escalation);

        let load_fraction = self.telemetry.load / LOAD_MAX;
        self.telemetry.degradation += self.telemetry.stress_index / 100.0 * 1e-4 * self.variance;
        self.telemetry.fuel_level =
            (self.telemetry.fuel_level - load_fraction * 0.01 * self.variance).max(0.0);

        self.refresh_fault_codes();
        // A low cap always wins; the latch can only trip on an uncapped tick.
        if !capped_idle
            && self.telemetry.coolant_temp >= ERROR_TRIP_TEMP
            && self.telemetry.operating_mode != OperatingMode::Error
        {
            tracing::warn!(
                machine_id = %self.id,
                coolant_temp = self.telemetry.coolant_temp,
                "machine tripped into ERROR"
            );
            self.telemetry.operating_mode = OperatingMode::Error;
        }
    }

    /// Restore safe idle readings and clear noise. Identity, profile, variance,
    /// degradation and fuel are untouched.
    pub fn reset(&mut self) {
        self.rpm_noise.clear();
        self.load_noise.clear();
        self.temp_noise.clear();
        self.base_temp = self.profile.idle_temp;
        self.telemetry.coolant_temp = self.profile.idle_temp;
        self.telemetry.fault_codes.clear();
        self.settle_idle();
    }

    pub fn to_record(&self) -> MachineRecord {
        let t = &self.telemetry;
        MachineRecord {
            machine_id: self.id.clone(),
            machine_type: self.machine_type.clone(),
            engine_rpm: round_to(t.rpm, 0),
            engine_load: round_to(t.load, 1),
            coolant_temp: round_to(t.coolant_temp, 1),
            oil_pressure: round_to(t.oil_pressure, 1),
            hydraulic_pressure: round_to(t.hydraulic_pressure, 1),
            fuel_level: round_to(t.fuel_level, 1),
            degradation: round_to(t.degradation, 4),
            stress_index: round_to(t.stress_index, 1),
            vibration_mm_s: round_to(t.vibration, 2),
            operating_mode: t.operating_mode,
            fault_codes: t.fault_codes.clone(),
            timestamp: t.timestamp,
        }
    }

    fn select_mode(&mut self, escalation: f64, cap: Option<f64>) -> OperatingMode {
        if matches!(cap, Some(cap) if cap <= IDLE_CAP_THRESHOLD) {
            return OperatingMode::Idle;
        }
        let current = self.telemetry.operating_mode;
        if current == OperatingMode::Error && self.telemetry.coolant_temp > ERROR_RECOVERY_TEMP {
            return OperatingMode::Error;
        }
        if escalation > 0.5 {
            return OperatingMode::HighLoad;
        }
        if escalation > 0.1 {
            return OperatingMode::Working;
        }
        let toggle = self.rng.gen_bool(IDLE_TOGGLE_PROBABILITY);
        match current {
            OperatingMode::Idle if toggle => OperatingMode::Working,
            OperatingMode::Working if toggle => OperatingMode::Idle,
            OperatingMode::HighLoad => OperatingMode::Working,
            OperatingMode::Error => OperatingMode::Idle,
            other => other,
        }
    }

    fn derive_readings(&mut self, escalation: f64) {
        let profile = self.profile;
        let t = &mut self.telemetry;
        let load_fraction = t.load / LOAD_MAX;
        let temp_span = (profile.peak_temp - profile.idle_temp).max(1.0);
        let temp_fraction = ((t.coolant_temp - profile.idle_temp) / temp_span).clamp(0.0, 1.0);

        t.oil_pressure = (profile.oil_pressure_base + t.rpm / profile.peak_rpm * 35.0
            - 4.0 * t.degradation
            + jitter(&mut self.rng, 0.5))
        .max(0.0);
        t.hydraulic_pressure = (load_fraction * 3000.0 + jitter(&mut self.rng, 50.0)).max(0.0);
        t.vibration = (profile.vibration_base * self.variance
            + load_fraction * 4.0
            + 2.0 * t.degradation
            + jitter(&mut self.rng, 0.2))
        .max(0.0);
        t.stress_index = ((0.5 * load_fraction + 0.3 * temp_fraction + 0.2 * escalation) * 100.0
            + jitter(&mut self.rng, 0.5))
        .clamp(0.0, 100.0);
    }

    fn refresh_fault_codes(&mut self) {
        let t = &mut self.telemetry;
        t.fault_codes.clear();
        if t.coolant_temp >= 115.0 {
            t.fault_codes.push(FAULT_OVERHEAT.to_string());
        }
        if t.oil_pressure < 8.0 && t.rpm > 500.0 {
            t.fault_codes.push(FAULT_LOW_OIL_PRESSURE.to_string());
        }
        if t.fuel_level < 10.0 {
            t.fault_codes.push(FAULT_LOW_FUEL.to_string());
        }
    }

    fn settle_idle(&mut self) {
        let profile = self.profile;
        let t = &mut self.telemetry;
        t.operating_mode = OperatingMode::Idle;
        self.base_rpm = profile.idle_rpm * self.variance;
        self.base_load = profile.idle_load * self.variance;
        t.rpm = self.base_rpm;
        t.load = self.base_load;
        t.oil_pressure = (profile.oil_pressure_base + t.rpm / profile.peak_rpm * 35.0
            - 4.0 * t.degradation)
            .max(0.0);
        t.hydraulic_pressure = t.load / LOAD_MAX * 3000.0;
        t.vibration = profile.vibration_base * self.variance + t.load / LOAD_MAX * 4.0;
        t.stress_index = 50.0 * t.load / LOAD_MAX;
    }
}
