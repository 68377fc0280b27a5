//! v1 records exchanged between the site simulator and its consumers
//! (dashboard, alerting, predictive maintenance, persistence).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Machine types registered in the default site layout, in assignment order.
pub const DEFAULT_MACHINE_TYPES: [&str; 5] = ["Excavator", "Bulldozer", "Crane", "Loader", "Truck"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    pub schema_version: String,
    pub run_id: String,
    pub seed: u64,
    /// Ticks per second of wall-clock time.
    pub tick_hz: f64,
    pub machine_count: usize,
    pub worker_count: usize,
    pub machine_types: Vec<String>,
    /// Explicit worker -> machine assignment. Workers not listed are assigned round-robin.
    #[serde(default)]
    pub worker_assignments: BTreeMap<String, String>,
    /// Length of one simulated day/night cycle in ticks.
    pub day_cycle_ticks: u64,
    #[serde(default)]
    pub initial_weather: Weather,
    pub notes: Option<String>,
}

impl SiteConfig {
    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.tick_hz
    }

    pub fn machine_id(index: usize) -> String {
        format!("CONST-{:03}", index + 1)
    }

    pub fn worker_id(index: usize) -> String {
        format!("W{}", index + 1)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "site_local_001".to_string(),
            seed: 1337,
            tick_hz: 1.0,
            machine_count: 5,
            worker_count: 10,
            machine_types: DEFAULT_MACHINE_TYPES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            worker_assignments: BTreeMap::new(),
            day_cycle_ticks: 1440,
            initial_weather: Weather::Clear,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    Idle,
    Working,
    HighLoad,
    Error,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Working => "WORKING",
            Self::HighLoad => "HIGH_LOAD",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Safe,
    Warning,
    Critical,
}

impl RiskLevel {
    pub const WARNING_THRESHOLD: f64 = 0.40;
    pub const CRITICAL_THRESHOLD: f64 = 0.75;

    /// Classify a composite index score. Downstream alerting must use these
    /// thresholds verbatim.
    pub fn from_score(score: f64) -> Self {
        if score >= Self::CRITICAL_THRESHOLD {
            Self::Critical
        } else if score >= Self::WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Safe
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Weather {
    #[default]
    Clear,
    Overcast,
    Rain,
    Heatwave,
}

impl Weather {
    pub const ALL: [Weather; 4] = [
        Weather::Clear,
        Weather::Overcast,
        Weather::Rain,
        Weather::Heatwave,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Clear => 0,
            Self::Overcast => 1,
            Self::Rain => 2,
            Self::Heatwave => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MachineRecord {
    pub machine_id: String,
    pub machine_type: String,
    pub engine_rpm: f64,
    pub engine_load: f64,
    pub coolant_temp: f64,
    pub oil_pressure: f64,
    pub hydraulic_pressure: f64,
    pub fuel_level: f64,
    pub degradation: f64,
    pub stress_index: f64,
    pub vibration_mm_s: f64,
    pub operating_mode: OperatingMode,
    pub fault_codes: Vec<String>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub worker_id: String,
    pub assigned_machine: String,
    pub heart_rate_bpm: f64,
    pub hrv_ms: f64,
    pub fatigue_percent: f64,
    pub stress_percent: f64,
    pub cis_score: f64,
    pub cis_risk_level: RiskLevel,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentRecord {
    pub ambient_temp_c: f64,
    pub humidity_pct: f64,
    pub weather: Weather,
    pub wind_speed_kmh: f64,
    pub thermal_penalty: f64,
    pub fatigue_multiplier: f64,
    pub cooling_efficiency: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EscalationStatus {
    pub active: bool,
    pub elapsed_seconds: f64,
}

/// One-shot notice that a critical escalation target crossed into the danger band.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalNotification {
    pub worker_id: String,
    pub factor: f64,
    pub elapsed_seconds: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteSnapshot {
    pub schema_version: String,
    pub run_id: String,
    pub tick: u64,
    pub last_updated: f64,
    pub machines: BTreeMap<String, MachineRecord>,
    pub workers: BTreeMap<String, WorkerRecord>,
    pub environment: EnvironmentRecord,
    pub escalation: EscalationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<CriticalNotification>,
}

impl fmt::Display for SiteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let machines = self
            .machines
            .values()
            .map(|m| format!("{}:{}", m.machine_id, m.operating_mode.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        let workers = self
            .workers
            .values()
            .map(|w| format!("{}:CIS={:.2}", w.worker_id, w.cis_score))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "tick={} weather={:?} ambient={:.1}C escalation={} machines=[{}] workers=[{}]",
            self.tick,
            self.environment.weather,
            self.environment.ambient_temp_c,
            self.escalation.active,
            machines,
            workers
        )
    }
}

/// Round half away from zero to `places` decimals, the way records are published.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}
