//! Stochastic construction-site simulation: machines, workers and ambient
//! environment driven by per-entity profiles and mean-reverting noise, plus a
//! scripted risk-escalation scenario.

pub mod config;
pub mod environment;
pub mod error;
pub mod escalation;
pub mod machine;
pub mod noise;
pub mod profile;
pub mod seed;
pub mod site;
pub mod worker;

pub use config::{from_toml_str, load_config, validate, CONFIG_ENV_VAR};
pub use environment::SiteEnvironment;
pub use error::{ConfigError, SimError};
pub use escalation::{EscalationManager, EscalationTarget, EscalationTransition};
pub use machine::{MachineState, MachineTelemetry};
pub use profile::MachineProfile;
pub use site::{MachineSlot, Site, SiteLayout, WorkerSlot};
pub use worker::{composite_index, BioProfile, WorkerState, WorkerTelemetry};
