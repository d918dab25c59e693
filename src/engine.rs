use crate::config::Config;
use crate::model::{Agent, Area, Motion, Population};
use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Simulation engine.
///
/// Owns the primary area, the hospital zone, the population and the recorded
/// infected-count series for the duration of one run, and drives the per-step
/// pipeline: reset grid, move agents, mark trails, resolve infections, sample,
/// check termination.
pub struct Engine {
    cfg: Config,
    area: Area,
    hospital: Area,
    population: Population,
    series: Vec<u32>,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with agents placed uniformly at random inside
    /// the primary area and exactly one of them seeded as infected.
    pub fn new(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let area = Area::with_grid(cfg.area.width, cfg.area.height);
        let hospital = Area::zone(
            cfg.hospital.x,
            cfg.hospital.y,
            cfg.hospital.width,
            cfg.hospital.height,
        );

        let x_dist = Uniform::new(0, cfg.area.width)?;
        let y_dist = Uniform::new(0, cfg.area.height)?;
        let speed_dist = Uniform::new(0, cfg.model.max_speed)?;
        let heading_dist = Uniform::new(0, 360)?;

        let mut agents = Vec::with_capacity(cfg.population.n_agents);
        for _ in 0..cfg.population.n_agents {
            agents.push(Agent::new(Motion::new(
                x_dist.sample(&mut rng),
                y_dist.sample(&mut rng),
                speed_dist.sample(&mut rng),
                heading_dist.sample(&mut rng),
            )));
        }
        if let Some(seed_agt) = agents.last_mut() {
            seed_agt.infect();
        }
        let population = Population::new(agents);

        Ok(Self {
            cfg,
            area,
            hospital,
            population,
            series: Vec::new(),
            rng,
        })
    }

    /// Run the simulation until the infected count reaches the stopping
    /// threshold, appending one sample per completed step.
    ///
    /// Stops early (with a warning) once `max_steps` steps have run, so a
    /// population that plateaus below the threshold cannot loop forever.
    pub fn run(&mut self) -> Result<()> {
        let stop = stop_threshold(self.population.len(), self.cfg.model.stop_percent);

        while self.population.n_infected() < stop {
            if self.series.len() >= self.cfg.model.max_steps {
                log::warn!(
                    "stopped after {} steps with {}/{} infected, below the stopping threshold",
                    self.series.len(),
                    self.population.n_infected(),
                    self.population.len()
                );
                return Ok(());
            }

            self.area.reset();
            self.move_agents();
            self.infect_agents();
            self.series.push(self.population.n_infected() as u32);

            self.log_progress();
        }

        let minutes = self.minutes_elapsed();
        log::info!(
            "reached {}/{} infected after {} steps ({}:{:02} simulated)",
            self.population.n_infected(),
            self.population.len(),
            self.series.len(),
            minutes / 60,
            minutes % 60
        );

        Ok(())
    }

    /// Infected count recorded at the end of each step, in step order.
    pub fn series(&self) -> &[u32] {
        &self.series
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Move every agent once and mark the trail cells of infected agents.
    ///
    /// Symptomatic agents head for the hospital: inside it they keep roaming
    /// within its walls, outside it they only reorient toward it this step.
    fn move_agents(&mut self) {
        let model = &self.cfg.model;
        for agt in self.population.agents_mut() {
            if agt.symptomatic(model.incubation) {
                if self.hospital.contains(agt.x(), agt.y()) {
                    agt.move_inside(&self.hospital, model, &mut self.rng);
                } else {
                    agt.move_toward(&self.hospital);
                }
            } else {
                agt.move_inside(&self.area, model, &mut self.rng);
            }
            if agt.infected() {
                self.area.mark(agt.x(), agt.y());
                agt.add_exposure(model.time_delta);
            }
        }
    }

    /// Probabilistically infect susceptible agents standing on marked cells.
    ///
    /// Runs strictly after all movement and marking of the step, so every
    /// trail written this step is visible to every exposure check.
    fn infect_agents(&mut self) {
        let prob = self.cfg.model.infect_probability;
        for idx in 0..self.population.len() {
            let agt = &self.population.agents()[idx];
            if agt.infected() || !self.area.occupied(agt.x(), agt.y()) {
                continue;
            }
            if self.rng.random_range(0..100) < prob {
                self.population.infect(idx);
            }
        }
    }

    fn minutes_elapsed(&self) -> u64 {
        self.series.len() as u64 * u64::from(self.cfg.model.time_delta)
    }

    fn log_progress(&self) {
        let minutes = self.minutes_elapsed();
        log::debug!(
            "time {}:{:02} {}/{} infected",
            minutes / 60,
            minutes % 60,
            self.population.n_infected(),
            self.population.len()
        );
        if minutes % 1440 == 0 {
            log::info!(
                "day {}: {}/{} infected",
                minutes / 1440,
                self.population.n_infected(),
                self.population.len()
            );
        }
    }
}

/// Smallest infected count at or above `stop_percent` percent of the
/// population, rounding up.
fn stop_threshold(n_agents: usize, stop_percent: u32) -> usize {
    (n_agents * stop_percent as usize).div_ceil(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AreaConfig, HospitalConfig, ModelConfig, PopulationConfig};

    fn test_config() -> Config {
        Config {
            seed: Some(42),
            area: AreaConfig {
                width: 60,
                height: 60,
            },
            hospital: HospitalConfig {
                x: 30,
                y: 30,
                width: 10,
                height: 10,
            },
            population: PopulationConfig { n_agents: 10 },
            model: ModelConfig {
                max_speed: 50,
                time_delta: 1,
                infect_probability: 50,
                incubation: 4320,
                stop_percent: 90,
                max_steps: 500_000,
            },
        }
    }

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(stop_threshold(10, 90), 9);
        assert_eq!(stop_threshold(11, 90), 10);
        assert_eq!(stop_threshold(1, 90), 1);
        assert_eq!(stop_threshold(10, 100), 10);
        assert_eq!(stop_threshold(1000, 90), 900);
    }

    #[test]
    fn setup_seeds_exactly_one_infection() {
        let engine = Engine::new(test_config()).unwrap();
        assert_eq!(engine.population().n_infected(), 1);

        let infected = engine
            .population()
            .agents()
            .iter()
            .filter(|agt| agt.infected())
            .count();
        assert_eq!(infected, 1);
    }

    #[test]
    fn setup_places_agents_inside_area() {
        let engine = Engine::new(test_config()).unwrap();
        for agt in engine.population().agents() {
            assert!((0..60).contains(&agt.x()));
            assert!((0..60).contains(&agt.y()));
        }
    }

    #[test]
    fn run_terminates_in_the_crossing_step() {
        let mut engine = Engine::new(test_config()).unwrap();
        engine.run().unwrap();

        let series = engine.series();
        assert!(!series.is_empty());
        assert!(series.len() < 500_000, "step cap reached");

        // Monotone, final sample equals the final count, and the threshold
        // is crossed exactly in the last step, never earlier or later.
        assert!(series.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*series.last().unwrap() as usize, engine.population().n_infected());
        assert!(*series.last().unwrap() >= 9);
        assert!(series[..series.len() - 1].iter().all(|&val| val < 9));
    }

    #[test]
    fn population_already_at_threshold_runs_zero_steps() {
        let mut cfg = test_config();
        cfg.population.n_agents = 1;
        let mut engine = Engine::new(cfg).unwrap();
        engine.run().unwrap();
        assert!(engine.series().is_empty());
        assert_eq!(engine.population().n_infected(), 1);
    }

    #[test]
    fn step_cap_bounds_a_plateaued_run() {
        let mut cfg = test_config();
        cfg.model.infect_probability = 0;
        cfg.model.max_steps = 50;
        let mut engine = Engine::new(cfg).unwrap();
        engine.run().unwrap();

        let series = engine.series();
        assert_eq!(series.len(), 50);
        assert!(series.iter().all(|&val| val == 1));
    }

    #[test]
    fn infected_count_never_decreases_across_seeds() {
        for seed in 0..5 {
            let mut cfg = test_config();
            cfg.seed = Some(seed);
            cfg.model.max_steps = 2_000;
            let mut engine = Engine::new(cfg).unwrap();
            engine.run().unwrap();
            assert!(engine.series().windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
