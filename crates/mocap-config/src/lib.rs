mod types;

pub use types::*;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Returns the config directory: `<platform config dir>/mocap-led/`
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("mocap-led");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Returns the config file path: `<platform config dir>/mocap-led/config.toml`
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from the default location, or return default if not found.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path()?)
}

/// Load config from `path`, or return default if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        info!(?path, "Loaded config");
        config
    } else {
        info!(?path, "No config found, using defaults");
        AppConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Save config to the default location.
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(config, &config_path()?)
}

/// Save config to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    info!(?path, "Saved config");
    Ok(())
}

impl AppConfig {
    /// Reject parameter combinations the trigger core cannot run with.
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.low_water_frame >= session.high_water_frame {
            bail!(
                "session.low_water_frame ({}) must be below session.high_water_frame ({})",
                session.low_water_frame,
                session.high_water_frame
            );
        }

        let speed = &self.speed;
        let periodic = &self.trigger.periodic;
        let threshold = &self.trigger.threshold;
        for (name, value) in [
            ("speed.noise_floor_low", speed.noise_floor_low),
            ("speed.noise_floor_high", speed.noise_floor_high),
            ("speed.attenuation", speed.attenuation),
            ("trigger.periodic.interval_s", periodic.interval_s),
            ("trigger.periodic.duration_s", periodic.duration_s),
            ("trigger.threshold.distance_threshold", threshold.distance_threshold),
            ("trigger.threshold.speed_threshold", threshold.speed_threshold),
            ("trigger.threshold.required_hold_time_s", threshold.required_hold_time_s),
            ("trigger.threshold.grace_time_s", threshold.grace_time_s),
        ] {
            if !value.is_finite() {
                bail!("{name} must be finite, got {value}");
            }
        }

        if speed.noise_floor_low < 0.0 || speed.noise_floor_low > speed.noise_floor_high {
            bail!(
                "speed noise floors must satisfy 0 <= low <= high, got low={} high={}",
                speed.noise_floor_low,
                speed.noise_floor_high
            );
        }
        if !(0.0..=1.0).contains(&speed.attenuation) {
            bail!("speed.attenuation must be in [0, 1], got {}", speed.attenuation);
        }

        if periodic.interval_s <= 0.0 || periodic.duration_s <= 0.0 {
            bail!(
                "trigger.periodic interval and duration must be positive, got interval={} duration={}",
                periodic.interval_s,
                periodic.duration_s
            );
        }
        if periodic.duration_s >= periodic.interval_s {
            bail!(
                "trigger.periodic.duration_s ({}) must be shorter than interval_s ({})",
                periodic.duration_s,
                periodic.interval_s
            );
        }

        for (name, value) in [
            ("distance_threshold", threshold.distance_threshold),
            ("speed_threshold", threshold.speed_threshold),
            ("required_hold_time_s", threshold.required_hold_time_s),
            ("grace_time_s", threshold.grace_time_s),
        ] {
            if value < 0.0 {
                bail!("trigger.threshold.{name} must be non-negative, got {value}");
            }
        }
        if !threshold.target_position.is_finite() {
            bail!("trigger.threshold.target_position must be finite");
        }

        Ok(())
    }
}
