//! Engine configuration: defaults, overridable from the environment.

use std::env;

use skycheck_core::{CorridorParams, ProfileParams};

#[derive(Debug, Clone)]
pub struct Config {
    /// Vertical corridor margin in feet.
    pub corridor_height_ft: f64,
    /// Lateral corridor margin in nautical miles.
    pub corridor_width_nm: f64,
    pub climb_rate_ftpm: f64,
    pub descent_rate_ftpm: f64,
    pub ground_speed_kt: f64,
    /// Assembled-geometry LRU entries.
    pub geometry_cache_size: usize,
    /// Per-call elevation lookup timeout, seconds.
    pub elevation_timeout_s: u64,
    /// Overall elevation budget per profile correction, seconds.
    pub elevation_budget_s: u64,
    /// Flight-path sampling step for crossing detection, kilometers.
    pub sample_distance_km: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corridor_height_ft: 1000.0,
            corridor_width_nm: 10.0,
            climb_rate_ftpm: 500.0,
            descent_rate_ftpm: 500.0,
            ground_speed_kt: 100.0,
            geometry_cache_size: 1024,
            elevation_timeout_s: 5,
            elevation_budget_s: 30,
            sample_distance_km: 5.0,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            corridor_height_ft: env_parse("SKYCHECK_CORRIDOR_HEIGHT_FT", defaults.corridor_height_ft),
            corridor_width_nm: env_parse("SKYCHECK_CORRIDOR_WIDTH_NM", defaults.corridor_width_nm),
            climb_rate_ftpm: env_parse("SKYCHECK_CLIMB_RATE_FTPM", defaults.climb_rate_ftpm),
            descent_rate_ftpm: env_parse("SKYCHECK_DESCENT_RATE_FTPM", defaults.descent_rate_ftpm),
            ground_speed_kt: env_parse("SKYCHECK_GROUND_SPEED_KT", defaults.ground_speed_kt),
            geometry_cache_size: env_parse("SKYCHECK_GEOMETRY_CACHE_SIZE", defaults.geometry_cache_size),
            elevation_timeout_s: env_parse("SKYCHECK_ELEVATION_TIMEOUT_S", defaults.elevation_timeout_s),
            elevation_budget_s: env_parse("SKYCHECK_ELEVATION_BUDGET_S", defaults.elevation_budget_s),
            sample_distance_km: env_parse("SKYCHECK_SAMPLE_DISTANCE_KM", defaults.sample_distance_km),
        }
    }

    pub fn corridor_params(&self) -> CorridorParams {
        CorridorParams {
            width_nm: self.corridor_width_nm,
            height_ft: self.corridor_height_ft,
        }
    }

    pub fn profile_params(&self) -> ProfileParams {
        ProfileParams {
            climb_rate_ftpm: self.climb_rate_ftpm,
            descent_rate_ftpm: self.descent_rate_ftpm,
            ground_speed_kt: self.ground_speed_kt,
        }
    }
}
