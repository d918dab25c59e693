use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// RNG seed; a fresh OS seed is drawn when absent.
    pub seed: Option<u64>,

    pub area: AreaConfig,
    pub hospital: HospitalConfig,
    pub population: PopulationConfig,
    pub model: ModelConfig,
}

/// Primary area the agents roam in.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    /// Width in meters.
    pub width: i32,
    /// Height in meters.
    pub height: i32,
}

/// Recovery area symptomatic agents travel toward.
///
/// `(x, y)` is the center of the rectangle, in primary-area coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct HospitalConfig {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents, one of which starts infected.
    pub n_agents: usize,
}

/// Physical and epidemiological model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Maximum walking speed in meters per minute; speeds are redrawn
    /// uniformly from `[0, max_speed)` after every move.
    pub max_speed: i32,
    /// Simulated minutes per step.
    pub time_delta: u32,
    /// Percent chance that an exposed susceptible agent becomes infected
    /// in a given step.
    pub infect_probability: u32,
    /// Minutes of infection after which an agent becomes symptomatic.
    pub incubation: u32,
    /// Percent of the population that must be infected for the run to stop.
    pub stop_percent: u32,
    /// Hard cap on the number of steps, in case the epidemic plateaus
    /// below the stopping threshold.
    pub max_steps: usize,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.area.width, 1..1_000_000).context("invalid area width")?;
        check_num(self.area.height, 1..1_000_000).context("invalid area height")?;
        if i64::from(self.area.width) * i64::from(self.area.height) > i64::from(i32::MAX) {
            bail!(
                "area of {} x {} cells is too large for the occupancy grid",
                self.area.width,
                self.area.height
            );
        }

        check_num(self.hospital.x, -1_000_000..1_000_000).context("invalid hospital x")?;
        check_num(self.hospital.y, -1_000_000..1_000_000).context("invalid hospital y")?;
        check_num(self.hospital.width, 1..1_000_000).context("invalid hospital width")?;
        check_num(self.hospital.height, 1..1_000_000).context("invalid hospital height")?;

        check_num(self.population.n_agents, 1..10_000_000).context("invalid number of agents")?;

        check_num(self.model.max_speed, 1..10_000).context("invalid maximum speed")?;
        check_num(self.model.time_delta, 1..10_000).context("invalid time delta")?;
        check_num(self.model.infect_probability, 0..=100)
            .context("invalid infection probability")?;
        check_num(self.model.stop_percent, 1..=100).context("invalid stopping percentage")?;
        check_num(self.model.max_steps, 1..).context("invalid maximum number of steps")?;

        // The recovery area must overlap the primary area, or symptomatic
        // agents could never reach it.
        let half_w = self.hospital.width / 2;
        let half_h = self.hospital.height / 2;
        if self.hospital.x + half_w < 0
            || self.hospital.x - half_w > self.area.width
            || self.hospital.y + half_h < 0
            || self.hospital.y - half_h > self.area.height
        {
            bail!("hospital area lies entirely outside the primary area");
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
