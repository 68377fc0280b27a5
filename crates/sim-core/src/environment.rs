//! Ambient site conditions: day/night cycle, Markov weather, hidden pressure,
//! and the coupling coefficients other models consume.

use std::f64::consts::PI;

use contracts::{round_to, EnvironmentRecord, Weather};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::noise::{gaussian, NoiseChannel};
use crate::seed::entity_rng;

pub const AMBIENT_MIN: f64 = 18.0;
pub const AMBIENT_MAX: f64 = 52.0;
pub const HUMIDITY_MIN: f64 = 20.0;
pub const HUMIDITY_MAX: f64 = 98.0;
pub const WIND_MAX: f64 = 80.0;

const ENVIRONMENT_ENTITY_ID: &str = "site-environment";

/// Per-tick transition probabilities, rows and columns in [`Weather::ALL`] order.
pub static WEATHER_TRANSITIONS: [[f64; 4]; 4] = [
    [0.960, 0.025, 0.010, 0.005],
    [0.030, 0.940, 0.025, 0.005],
    [0.020, 0.040, 0.940, 0.000],
    [0.030, 0.010, 0.000, 0.960],
];

const HOLD_MIN_TICKS: u32 = 40;
const HOLD_MAX_TICKS: u32 = 120;

const BASE_TEMP: f64 = 24.0;
const DAY_TEMP_SWING: f64 = 12.0;
const BASE_HUMIDITY: f64 = 70.0;
const DAY_HUMIDITY_SWING: f64 = 30.0;
const NOMINAL_PRESSURE: f64 = 1013.0;
const PRESSURE_MIN: f64 = 985.0;
const PRESSURE_MAX: f64 = 1035.0;
/// Humidity points gained per hPa below nominal pressure.
const LOW_PRESSURE_HUMIDITY_GAIN: f64 = 0.8;

const TEMP_SMOOTHING: f64 = 0.02;
const HUMIDITY_SMOOTHING: f64 = 0.05;
const WIND_SMOOTHING: f64 = 0.1;
const GUST_PROBABILITY: f64 = 0.02;

fn temp_offset(weather: Weather) -> f64 {
    match weather {
        Weather::Clear => 2.0,
        Weather::Overcast => -2.0,
        Weather::Rain => -5.0,
        Weather::Heatwave => 12.0,
    }
}

fn humidity_offset(weather: Weather) -> f64 {
    match weather {
        Weather::Clear => -5.0,
        Weather::Overcast => 5.0,
        Weather::Rain => 25.0,
        Weather::Heatwave => -15.0,
    }
}

fn base_wind(weather: Weather) -> f64 {
    match weather {
        Weather::Clear => 8.0,
        Weather::Overcast => 14.0,
        Weather::Rain => 20.0,
        Weather::Heatwave => 6.0,
    }
}

/// Extra machine heating per tick once ambient exceeds 30 °C. Machines add it
/// to their heat balance; it is also published with the environment record.
pub fn thermal_penalty(ambient_temp: f64) -> f64 {
    (ambient_temp - 30.0).max(0.0) * 0.05
}

/// Worker fatigue multiplier; 1.0 at or below 50 % humidity.
pub fn fatigue_multiplier(humidity: f64) -> f64 {
    1.0 + (humidity - 50.0).max(0.0) / 100.0
}

/// Radiator effectiveness. Rain > Clear > Overcast > Heatwave; wind helps a little.
pub fn cooling_efficiency(weather: Weather, wind_speed: f64) -> f64 {
    let base = match weather {
        Weather::Rain => 1.15,
        Weather::Clear => 1.0,
        Weather::Overcast => 0.95,
        Weather::Heatwave => 0.7,
    };
    base + (wind_speed.max(0.0) * 0.005).min(0.15)
}

/// Day phase in `[0, 1]`: 0 at the start of the cycle (night), 1 at mid-cycle.
pub fn day_fraction(tick: u64, cycle_ticks: u64) -> f64 {
    let cycle = cycle_ticks.max(1);
    let position = (tick % cycle) as f64 / cycle as f64;
    ((2.0 * PI * position - PI / 2.0).sin() + 1.0) / 2.0
}

#[derive(Debug, Clone)]
pub struct SiteEnvironment {
    ambient_temp: f64,
    humidity: f64,
    weather: Weather,
    wind_speed: f64,
    tick: u64,
    hold_ticks: u32,
    day_cycle_ticks: u64,
    pressure: f64,
    base_temp: f64,
    base_humidity: f64,
    base_wind: f64,
    temp_drift: NoiseChannel,
    humidity_drift: NoiseChannel,
    wind_noise: NoiseChannel,
    rng: ChaCha8Rng,
}

impl SiteEnvironment {
    pub fn new(site_seed: u64, day_cycle_ticks: u64, initial_weather: Weather) -> Self {
        let day_cycle_ticks = day_cycle_ticks.max(1);
        let day = day_fraction(0, day_cycle_ticks);
        let base_temp = target_temp(day, initial_weather);
        let base_humidity = target_humidity(day, initial_weather, NOMINAL_PRESSURE);
        let wind = base_wind(initial_weather);
        Self {
            ambient_temp: base_temp,
            humidity: base_humidity,
            weather: initial_weather,
            wind_speed: wind,
            tick: 0,
            hold_ticks: HOLD_MIN_TICKS,
            day_cycle_ticks,
            pressure: NOMINAL_PRESSURE,
            base_temp,
            base_humidity,
            base_wind: wind,
            temp_drift: NoiseChannel::new(0.05, 0.08),
            humidity_drift: NoiseChannel::new(0.05, 0.3),
            wind_noise: NoiseChannel::new(0.3, 0.6),
            rng: entity_rng(site_seed, ENVIRONMENT_ENTITY_ID),
        }
    }

    pub fn ambient_temp(&self) -> f64 {
        self.ambient_temp
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn hold_ticks(&self) -> u32 {
        self.hold_ticks
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn thermal_penalty(&self) -> f64 {
        thermal_penalty(self.ambient_temp)
    }

    pub fn fatigue_multiplier(&self) -> f64 {
        fatigue_multiplier(self.humidity)
    }

    pub fn cooling_efficiency(&self) -> f64 {
        cooling_efficiency(self.weather, self.wind_speed)
    }

    pub fn update(&mut self) {
        self.advance_weather();

        let day = day_fraction(self.tick, self.day_cycle_ticks);
        self.tick = self.tick.saturating_add(1);

        self.pressure += (NOMINAL_PRESSURE - self.pressure) * 0.01 + gaussian(&mut self.rng, 0.3);
        self.pressure = self.pressure.clamp(PRESSURE_MIN, PRESSURE_MAX);

        let temp_goal = target_temp(day, self.weather);
        let humidity_goal = target_humidity(day, self.weather, self.pressure);
        self.base_temp += (temp_goal - self.base_temp) * TEMP_SMOOTHING;
        self.base_humidity += (humidity_goal - self.base_humidity) * HUMIDITY_SMOOTHING;

        let temp_noise = self.temp_drift.advance(&mut self.rng) + gaussian(&mut self.rng, 0.05);
        let humidity_noise =
            self.humidity_drift.advance(&mut self.rng) + gaussian(&mut self.rng, 0.2);
        self.ambient_temp = (self.base_temp + temp_noise).clamp(AMBIENT_MIN, AMBIENT_MAX);
        self.humidity = (self.base_humidity + humidity_noise).clamp(HUMIDITY_MIN, HUMIDITY_MAX);

        self.base_wind += (base_wind(self.weather) - self.base_wind) * WIND_SMOOTHING;
        if self.rng.gen_bool(GUST_PROBABILITY) {
            self.base_wind += self.rng.gen_range(5.0..15.0);
        }
        self.wind_speed =
            (self.base_wind + self.wind_noise.advance(&mut self.rng)).clamp(0.0, WIND_MAX);
    }

    pub fn to_record(&self) -> EnvironmentRecord {
        EnvironmentRecord {
            ambient_temp_c: round_to(self.ambient_temp, 1),
            humidity_pct: round_to(self.humidity, 1),
            weather: self.weather,
            wind_speed_kmh: round_to(self.wind_speed, 1),
            thermal_penalty: round_to(self.thermal_penalty(), 3),
            fatigue_multiplier: round_to(self.fatigue_multiplier(), 3),
            cooling_efficiency: round_to(self.cooling_efficiency(), 3),
        }
    }

    fn advance_weather(&mut self) {
        if self.hold_ticks > 0 {
            self.hold_ticks -= 1;
            return;
        }
        let row = &WEATHER_TRANSITIONS[self.weather.index()];
        let draw: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        let mut next = self.weather;
        for (candidate, probability) in Weather::ALL.iter().zip(row.iter()) {
            cumulative += probability;
            if draw < cumulative {
                next = *candidate;
                break;
            }
        }
        if next != self.weather {
            self.hold_ticks = self.rng.gen_range(HOLD_MIN_TICKS..=HOLD_MAX_TICKS);
            tracing::debug!(
                from = ?self.weather,
                to = ?next,
                hold_ticks = self.hold_ticks,
                "weather transition"
            );
            self.weather = next;
        }
    }
}

fn target_temp(day: f64, weather: Weather) -> f64 {
    BASE_TEMP + DAY_TEMP_SWING * day + temp_offset(weather)
}

fn target_humidity(day: f64, weather: Weather, pressure: f64) -> f64 {
    let low_pressure_bonus = (NOMINAL_PRESSURE - pressure).max(0.0) * LOW_PRESSURE_HUMIDITY_GAIN;
    BASE_HUMIDITY - DAY_HUMIDITY_SWING * day + humidity_offset(weather) + low_pressure_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_rows_are_stochastic() {
        for row in &WEATHER_TRANSITIONS {
            let total: f64 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cooling_orders_rain_clear_overcast_heatwave() {
        let rain = cooling_efficiency(Weather::Rain, 0.0);
        let clear = cooling_efficiency(Weather::Clear, 0.0);
        let overcast = cooling_efficiency(Weather::Overcast, 0.0);
        let heatwave = cooling_efficiency(Weather::Heatwave, 0.0);
        assert!(rain > clear && clear > overcast && overcast > heatwave);
        assert!(cooling_efficiency(Weather::Rain, WIND_MAX) <= 1.3 + 1e-9);
        assert!(heatwave > 0.0);
    }

    #[test]
    fn coefficients_are_neutral_in_mild_conditions() {
        assert_eq!(thermal_penalty(25.0), 0.0);
        assert_eq!(fatigue_multiplier(40.0), 1.0);
        assert!(thermal_penalty(40.0) > 0.0);
        assert!((fatigue_multiplier(80.0) - 1.3).abs() < 1e-9);
    }

    #[test]
    fn day_fraction_peaks_mid_cycle() {
        assert!(day_fraction(0, 100) < 1e-9);
        assert!((day_fraction(50, 100) - 1.0).abs() < 1e-9);
        assert!((day_fraction(25, 100) - 0.5).abs() < 1e-9);
        assert_eq!(day_fraction(100, 100), day_fraction(0, 100));
    }

    #[test]
    fn weather_holds_after_each_transition() {
        let mut env = SiteEnvironment::new(3, 240, Weather::Clear);
        let mut last = env.weather();
        let mut ticks_since_change = u64::MAX;
        for _ in 0..20_000 {
            env.update();
            if env.weather() != last {
                assert!(ticks_since_change >= u64::from(HOLD_MIN_TICKS));
                assert!(env.hold_ticks() >= HOLD_MIN_TICKS && env.hold_ticks() <= HOLD_MAX_TICKS);
                last = env.weather();
                ticks_since_change = 0;
            } else {
                ticks_since_change = ticks_since_change.saturating_add(1);
            }
        }
    }

    #[test]
    fn channels_stay_in_bounds() {
        let mut env = SiteEnvironment::new(17, 120, Weather::Heatwave);
        for _ in 0..10_000 {
            env.update();
            assert!((AMBIENT_MIN..=AMBIENT_MAX).contains(&env.ambient_temp()));
            assert!((HUMIDITY_MIN..=HUMIDITY_MAX).contains(&env.humidity()));
            assert!((0.0..=WIND_MAX).contains(&env.wind_speed()));
            assert!((PRESSURE_MIN..=PRESSURE_MAX).contains(&env.pressure()));
        }
    }

    #[test]
    fn afternoon_is_warmer_than_night() {
        let mut env = SiteEnvironment::new(5, 2_000, Weather::Clear);
        let night = env.ambient_temp();
        for _ in 0..1_000 {
            env.update();
        }
        assert!(env.ambient_temp() > night, "noon={} night={night}", env.ambient_temp());
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let mut a = SiteEnvironment::new(99, 300, Weather::Overcast);
        let mut b = SiteEnvironment::new(99, 300, Weather::Overcast);
        for _ in 0..500 {
            a.update();
            b.update();
            assert_eq!(a.to_record(), b.to_record());
        }
    }
}
