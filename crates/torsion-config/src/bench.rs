//! Top-level bench configuration and persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use torsion_errors::ValidationError;
use tracing::{debug, info, warn};

use crate::sections::{
    AngleChannelConfig, MotorBackend, MotorConfig, RecorderConfig, RunDefaults, SafetyConfig,
    SamplingConfig, SimulationConfig, TorqueChannelConfig, validate_sections,
};

/// Current configuration schema identifier.
pub const SCHEMA_VERSION: &str = "torsion.config/1";

/// Complete bench configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Configuration schema version
    pub schema_version: String,
    /// Use the simulated bench instead of real hardware
    pub demo_mode: bool,
    /// Sampling loop timing
    pub sampling: SamplingConfig,
    /// Torque DAQ channel
    pub torque_channel: TorqueChannelConfig,
    /// Angle DAQ channel
    pub angle_channel: AngleChannelConfig,
    /// Motor controller
    pub motor: MotorConfig,
    /// Stop retry policy
    pub safety: SafetyConfig,
    /// Default run parameters
    pub run: RunDefaults,
    /// Run record output
    pub recorder: RecorderConfig,
    /// Simulated bench behaviour
    pub simulation: SimulationConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            demo_mode: true,
            sampling: SamplingConfig::default(),
            torque_channel: TorqueChannelConfig::default(),
            angle_channel: AngleChannelConfig::default(),
            motor: MotorConfig::default(),
            safety: SafetyConfig::default(),
            run: RunDefaults::default(),
            recorder: RecorderConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Configuration for the simulated bench with every default.
    pub fn demo() -> Self {
        Self::default()
    }

    /// Builder: replace the sampling section.
    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    /// Builder: replace the run defaults.
    pub fn with_run(mut self, run: RunDefaults) -> Self {
        self.run = run;
        self
    }

    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults, which are written to `path` so the
    /// operator has something to edit.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or does not validate.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found at {}, creating default", path.display());
            let config = Self::default();
            config.save_to_path(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: BenchConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory cannot be created or the file written.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate every section and the cross-section constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::invalid_format(
                "schema_version",
                format!("expected {SCHEMA_VERSION}, found {}", self.schema_version),
            ));
        }

        validate_sections(
            &self.sampling,
            &self.torque_channel,
            &self.angle_channel,
            &self.safety,
            &self.run,
            &self.simulation,
        )?;

        let max_velocity = self.sampling.max_trackable_velocity();
        if self.run.velocity_deg_s.abs() >= max_velocity {
            return Err(ValidationError::constraint(format!(
                "run.velocity_deg_s {} is too fast to unwrap at a {} ms period (limit {max_velocity} deg/s)",
                self.run.velocity_deg_s, self.sampling.period_ms
            )));
        }

        if self.demo_mode && self.motor.backend != MotorBackend::Simulated {
            warn!("demo_mode is set; the configured motor backend will not be used");
        }

        Ok(())
    }
}
