//! Static per-machine-type physical constants.

use serde::Serialize;

/// Operating targets for one machine type. Read-only; shared by `&'static`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MachineProfile {
    pub machine_type: &'static str,
    pub idle_rpm: f64,
    pub work_rpm: f64,
    pub peak_rpm: f64,
    pub idle_load: f64,
    pub work_load: f64,
    pub peak_load: f64,
    pub idle_temp: f64,
    pub work_temp: f64,
    pub peak_temp: f64,
    /// Divides the net heat flow each tick; heavier engines warm and cool slower.
    pub thermal_inertia: f64,
    /// Fraction of the gap to the load target closed per tick.
    pub load_responsiveness: f64,
    pub vibration_base: f64,
    pub oil_pressure_base: f64,
}

pub const FALLBACK_MACHINE_TYPE: &str = "Truck";

pub static PROFILES: [MachineProfile; 5] = [
    MachineProfile {
        machine_type: "Excavator",
        idle_rpm: 750.0,
        work_rpm: 1800.0,
        peak_rpm: 2600.0,
        idle_load: 8.0,
        work_load: 55.0,
        peak_load: 95.0,
        idle_temp: 30.0,
        work_temp: 52.0,
        peak_temp: 95.0,
        thermal_inertia: 1.10,
        load_responsiveness: 0.08,
        vibration_base: 2.5,
        oil_pressure_base: 22.0,
    },
    MachineProfile {
        machine_type: "Bulldozer",
        idle_rpm: 700.0,
        work_rpm: 1600.0,
        peak_rpm: 2200.0,
        idle_load: 12.0,
        work_load: 60.0,
        peak_load: 98.0,
        idle_temp: 32.0,
        work_temp: 58.0,
        peak_temp: 105.0,
        thermal_inertia: 1.25,
        load_responsiveness: 0.06,
        vibration_base: 3.8,
        oil_pressure_base: 24.0,
    },
    MachineProfile {
        machine_type: "Crane",
        idle_rpm: 650.0,
        work_rpm: 1400.0,
        peak_rpm: 2000.0,
        idle_load: 5.0,
        work_load: 45.0,
        peak_load: 88.0,
        idle_temp: 26.0,
        work_temp: 42.0,
        peak_temp: 78.0,
        thermal_inertia: 0.90,
        load_responsiveness: 0.10,
        vibration_base: 1.2,
        oil_pressure_base: 20.0,
    },
    MachineProfile {
        machine_type: "Loader",
        idle_rpm: 780.0,
        work_rpm: 1900.0,
        peak_rpm: 2500.0,
        idle_load: 10.0,
        work_load: 50.0,
        peak_load: 92.0,
        idle_temp: 29.0,
        work_temp: 48.0,
        peak_temp: 88.0,
        thermal_inertia: 1.00,
        load_responsiveness: 0.09,
        vibration_base: 2.8,
        oil_pressure_base: 21.0,
    },
    MachineProfile {
        machine_type: "Truck",
        idle_rpm: 680.0,
        work_rpm: 1700.0,
        peak_rpm: 2400.0,
        idle_load: 6.0,
        work_load: 42.0,
        peak_load: 85.0,
        idle_temp: 27.0,
        work_temp: 44.0,
        peak_temp: 82.0,
        thermal_inertia: 0.95,
        load_responsiveness: 0.07,
        vibration_base: 2.0,
        oil_pressure_base: 19.0,
    },
];

/// Look up a registered profile.
pub fn lookup(machine_type: &str) -> Option<&'static MachineProfile> {
    PROFILES
        .iter()
        .find(|profile| profile.machine_type == machine_type)
}

/// Resolve a profile, falling back to the Truck constants for unregistered types.
pub fn profile_for(machine_type: &str) -> &'static MachineProfile {
    match lookup(machine_type) {
        Some(profile) => profile,
        None => {
            tracing::debug!(
                machine_type,
                fallback = FALLBACK_MACHINE_TYPE,
                "unregistered machine type"
            );
            fallback_profile()
        }
    }
}

fn fallback_profile() -> &'static MachineProfile {
    &PROFILES[PROFILES.len() - 1]
}
