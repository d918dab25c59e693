//! Post-run analysis of recorded infection diagrams.

use crate::config::Config;
use crate::stats::Accumulator;
use anyhow::{Context, Result, bail};
use rmp_serde::encode;
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::Path,
};

/// Observable computed incrementally over one recorded infected-count series.
pub trait Obs {
    /// Consume the sample recorded at the end of `step` (zero-based).
    fn update(&mut self, step: usize, n_infected: u32) -> Result<()>;
    fn report(&self) -> Result<Value>;
}

fn named_report(name: &str, report: impl Serialize) -> Result<Value> {
    let mut map = BTreeMap::new();
    map.insert(Value::String(name.into()), serde_value::to_value(report)?);
    Ok(Value::Map(map))
}

/// Final outcome of a run: steps executed, final count, attack rate.
pub struct Outcome {
    n_agents: usize,
    n_steps: usize,
    final_infected: u32,
}

#[derive(Serialize)]
struct OutcomeReport {
    n_steps: usize,
    final_infected: u32,
    attack_rate: f64,
}

impl Outcome {
    pub fn new(cfg: &Config) -> Self {
        Self {
            n_agents: cfg.population.n_agents,
            n_steps: 0,
            final_infected: 0,
        }
    }
}

impl Obs for Outcome {
    fn update(&mut self, _step: usize, n_infected: u32) -> Result<()> {
        self.n_steps += 1;
        self.final_infected = n_infected;
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        named_report(
            "outcome",
            OutcomeReport {
                n_steps: self.n_steps,
                final_infected: self.final_infected,
                attack_rate: f64::from(self.final_infected) / self.n_agents as f64,
            },
        )
    }
}

/// First simulated minute at which given fractions of the population are
/// infected.
pub struct TimeToFraction {
    n_agents: usize,
    time_delta: u32,
    entries: Vec<(u32, Option<u64>)>,
}

#[derive(Serialize)]
struct FractionTime {
    percent: u32,
    minutes: Option<u64>,
}

impl TimeToFraction {
    const PERCENTS: [u32; 4] = [25, 50, 75, 90];

    pub fn new(cfg: &Config) -> Self {
        Self {
            n_agents: cfg.population.n_agents,
            time_delta: cfg.model.time_delta,
            entries: Self::PERCENTS.iter().map(|&pct| (pct, None)).collect(),
        }
    }
}

impl Obs for TimeToFraction {
    fn update(&mut self, step: usize, n_infected: u32) -> Result<()> {
        for (percent, minutes) in &mut self.entries {
            let reached =
                u64::from(n_infected) * 100 >= u64::from(*percent) * self.n_agents as u64;
            if minutes.is_none() && reached {
                *minutes = Some((step as u64 + 1) * u64::from(self.time_delta));
            }
        }
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        let times: Vec<_> = self
            .entries
            .iter()
            .map(|&(percent, minutes)| FractionTime { percent, minutes })
            .collect();
        named_report("time_to_fraction", times)
    }
}

/// Mean and spread of per-step new infections.
pub struct GrowthRate {
    prev: Option<u32>,
    acc: Accumulator,
}

impl GrowthRate {
    pub fn new() -> Self {
        Self {
            prev: None,
            acc: Accumulator::new(),
        }
    }
}

impl Obs for GrowthRate {
    fn update(&mut self, _step: usize, n_infected: u32) -> Result<()> {
        // The first sample has no predecessor to diff against. Decreasing
        // samples never come from `add_diagram`, but saturate rather than
        // underflow when fed directly.
        if let Some(prev) = self.prev {
            self.acc.add(f64::from(n_infected.saturating_sub(prev)));
        }
        self.prev = Some(n_infected);
        Ok(())
    }

    fn report(&self) -> Result<Value> {
        named_report("growth_rate", self.acc.report())
    }
}

/// Reads a run's recorded diagram and reduces it into observable reports.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Outcome::new(cfg)),
            Box::new(TimeToFraction::new(cfg)),
            Box::new(GrowthRate::new()),
        ];
        Self { obs_ptr_vec }
    }

    /// Feed every sample of a diagram file (one integer per line, in step
    /// order) to the observables.
    pub fn add_diagram<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let reader = BufReader::new(file);

        let mut prev = 0;
        for (step, line) in reader.lines().enumerate() {
            let line = line.context("failed to read line")?;
            let n_infected: u32 = line
                .trim()
                .parse()
                .with_context(|| format!("invalid sample at line {}", step + 1))?;
            if n_infected < prev {
                bail!("infected count decreases at line {}", step + 1);
            }
            prev = n_infected;

            for obs in &mut self.obs_ptr_vec {
                obs.update(step, n_infected)
                    .context("failed to update observable")?;
            }
        }
        Ok(())
    }

    /// Write all observable reports as a MessagePack-encoded list.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let reports = self
            .obs_ptr_vec
            .iter()
            .map(|obs| obs.report())
            .collect::<Result<Vec<_>>>()?;
        encode::write(&mut writer, &reports).context("failed to serialize reports")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AreaConfig, HospitalConfig, ModelConfig, PopulationConfig};

    fn test_config(n_agents: usize, time_delta: u32) -> Config {
        Config {
            seed: None,
            area: AreaConfig {
                width: 100,
                height: 100,
            },
            hospital: HospitalConfig {
                x: 50,
                y: 50,
                width: 10,
                height: 10,
            },
            population: PopulationConfig { n_agents },
            model: ModelConfig {
                max_speed: 50,
                time_delta,
                infect_probability: 50,
                incubation: 4320,
                stop_percent: 90,
                max_steps: 1_000_000,
            },
        }
    }

    fn feed(obs: &mut dyn Obs, series: &[u32]) {
        for (step, &val) in series.iter().enumerate() {
            obs.update(step, val).unwrap();
        }
    }

    #[test]
    fn outcome_tracks_final_state() {
        let mut obs = Outcome::new(&test_config(10, 1));
        feed(&mut obs, &[1, 1, 2, 5, 9]);
        assert_eq!(obs.n_steps, 5);
        assert_eq!(obs.final_infected, 9);
        obs.report().unwrap();
    }

    #[test]
    fn time_to_fraction_records_first_crossings() {
        let mut obs = TimeToFraction::new(&test_config(10, 2));
        feed(&mut obs, &[1, 3, 5, 5, 9, 10]);

        // 25% of 10 agents is first reached at step index 1, i.e. after two
        // steps of two minutes each.
        assert_eq!(obs.entries[0], (25, Some(4)));
        assert_eq!(obs.entries[1], (50, Some(6)));
        assert_eq!(obs.entries[2], (75, Some(10)));
        assert_eq!(obs.entries[3], (90, Some(10)));
    }

    #[test]
    fn time_to_fraction_leaves_unreached_levels_empty() {
        let mut obs = TimeToFraction::new(&test_config(10, 1));
        feed(&mut obs, &[1, 2, 3]);
        assert_eq!(obs.entries[0], (25, Some(3)));
        assert_eq!(obs.entries[1], (50, None));
        assert_eq!(obs.entries[3], (90, None));
    }

    #[test]
    fn growth_rate_averages_per_step_deltas() {
        let mut obs = GrowthRate::new();
        feed(&mut obs, &[1, 2, 4, 4]);
        let report = obs.acc.report();
        assert_eq!(report.count, 3);
        assert!((report.mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn growth_rate_saturates_on_decreasing_samples() {
        let mut obs = GrowthRate::new();
        feed(&mut obs, &[3, 1, 2]);
        let report = obs.acc.report();
        assert_eq!(report.count, 2);
        assert!((report.mean - 0.5).abs() < 1e-12);
    }
}
