//! Core simulation types: areas, agent motion, agents and the population.

use crate::config::ModelConfig;
use rand::Rng;

/// Rectangular region of the simulation plane.
///
/// The primary area carries a dense occupancy grid (one byte per cell) used
/// to mark the cells infected agents passed through during the current step.
/// Secondary zones such as the hospital carry no grid and only serve as
/// membership tests and movement targets.
pub struct Area {
    x0: i32,
    y0: i32,
    width: i32,
    height: i32,
    cells: Option<Vec<u8>>,
}

impl Area {
    /// Create a grid-backed area spanning `[0, width] x [0, height]`,
    /// centered at `(width / 2, height / 2)`.
    pub fn with_grid(width: i32, height: i32) -> Self {
        Self {
            x0: width / 2,
            y0: height / 2,
            width,
            height,
            cells: Some(vec![0; width as usize * height as usize]),
        }
    }

    /// Create a gridless zone centered at `(x, y)`.
    pub fn zone(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x0: x,
            y0: y,
            width,
            height,
            cells: None,
        }
    }

    pub fn x0(&self) -> i32 {
        self.x0
    }

    pub fn y0(&self) -> i32 {
        self.y0
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Clear all trail marks from the previous step. No-op for gridless zones.
    pub fn reset(&mut self) {
        if let Some(cells) = &mut self.cells {
            cells.fill(0);
        }
    }

    /// Edge-inclusive membership test against the centered rectangle.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (x - self.x0).abs() <= self.width / 2 && (y - self.y0).abs() <= self.height / 2
    }

    /// Mark the cell at `(x, y)` as visited by an infected agent this step.
    /// No-op for gridless zones.
    pub fn mark(&mut self, x: i32, y: i32) {
        let idx = self.cell_index(x, y);
        if let Some(cells) = &mut self.cells {
            cells[idx] = 1;
        }
    }

    /// Whether the cell at `(x, y)` was visited by an infected agent this
    /// step. Always false for gridless zones.
    pub fn occupied(&self, x: i32, y: i32) -> bool {
        let idx = self.cell_index(x, y);
        self.cells.as_ref().is_some_and(|cells| cells[idx] != 0)
    }

    // Coordinates are clamped into the grid before indexing, so a position
    // on the inclusive boundary (or an out-of-range one) maps to the nearest
    // cell instead of indexing out of bounds.
    fn cell_index(&self, x: i32, y: i32) -> usize {
        let x = x.clamp(0, self.width - 1) as usize;
        let y = y.clamp(0, self.height - 1) as usize;
        y * self.width as usize + x
    }
}

/// Kinematic state of one agent: integer position, speed and heading.
#[derive(Clone, Copy)]
pub struct Motion {
    pub x: i32,
    pub y: i32,
    /// Speed in meters per minute, in `[0, max_speed)`.
    pub speed: i32,
    /// Heading in degrees, in `[0, 360)`.
    pub heading: i32,
}

impl Motion {
    pub fn new(x: i32, y: i32, speed: i32, heading: i32) -> Self {
        Self {
            x,
            y,
            speed,
            heading,
        }
    }

    /// Advance the position by `speed * dt` along the heading, truncating
    /// toward zero, then redraw the speed uniformly from `[0, max_speed)`.
    ///
    /// The walk does not conserve momentum: each step gets a fresh speed
    /// while the heading persists until a boundary reflection changes it.
    /// Boundary handling is the caller's responsibility.
    pub fn advance<R: Rng>(&mut self, dt: u32, max_speed: i32, rng: &mut R) {
        let dist = f64::from(self.speed) * f64::from(dt);
        let rad = f64::from(self.heading).to_radians();
        self.x += (dist * rad.cos()) as i32;
        self.y += (dist * rad.sin()) as i32;
        self.speed = rng.random_range(0..max_speed);
    }
}

/// One simulated person.
///
/// Infection is monotonic and permanent: there is no recovery or death
/// transition in this model.
pub struct Agent {
    infected: bool,
    /// Simulated minutes spent infected.
    exposure: u32,
    motion: Motion,
}

impl Agent {
    /// Create a susceptible agent with the given kinematic state.
    pub fn new(motion: Motion) -> Self {
        Self {
            infected: false,
            exposure: 0,
            motion,
        }
    }

    pub fn x(&self) -> i32 {
        self.motion.x
    }

    pub fn y(&self) -> i32 {
        self.motion.y
    }

    pub fn infected(&self) -> bool {
        self.infected
    }

    pub fn infect(&mut self) {
        self.infected = true;
    }

    pub fn add_exposure(&mut self, minutes: u32) {
        self.exposure = self.exposure.saturating_add(minutes);
    }

    /// Whether the agent has been infected longer than the incubation time
    /// and is therefore hospital-bound.
    pub fn symptomatic(&self, incubation: u32) -> bool {
        self.exposure > incubation
    }

    /// Advance the motion one step, reflecting off the walls of `area`.
    ///
    /// A coordinate ending up outside `[0, width]` (resp. `[0, height]`)
    /// flips the matching heading component and is mirrored back across the
    /// boundary, billiard style, so the speed is preserved. The final
    /// position is clamped as a last resort for areas smaller than one step
    /// of travel.
    pub fn move_inside<R: Rng>(&mut self, area: &Area, model: &ModelConfig, rng: &mut R) {
        self.motion.advance(model.time_delta, model.max_speed, rng);

        let (w, h) = (area.width(), area.height());
        let m = &mut self.motion;
        if m.x < 0 || m.x > w {
            m.heading = (180 - m.heading).rem_euclid(360);
        }
        if m.y < 0 || m.y > h {
            m.heading = (-m.heading).rem_euclid(360);
        }
        if m.x < 0 {
            m.x = -m.x;
        }
        if m.x > w {
            m.x = 2 * w - m.x;
        }
        if m.y < 0 {
            m.y = -m.y;
        }
        if m.y > h {
            m.y = 2 * h - m.y;
        }
        m.x = m.x.clamp(0, w);
        m.y = m.y.clamp(0, h);
    }

    /// Reorient toward the center of `area` without moving.
    ///
    /// Uses a full two-argument arctangent, so the heading points at the
    /// target from any quadrant.
    pub fn move_toward(&mut self, area: &Area) {
        let dx = f64::from(area.x0() - self.motion.x);
        let dy = f64::from(area.y0() - self.motion.y);
        self.motion.heading = (dy.atan2(dx).to_degrees().round() as i32).rem_euclid(360);
    }
}

/// Ordered, contiguously stored collection of agents plus the running
/// infected count.
///
/// The count is maintained incrementally: it is incremented exactly once, at
/// the moment an agent transitions from susceptible to infected, and always
/// equals the number of agents whose infected flag is set.
pub struct Population {
    agents: Vec<Agent>,
    n_infected: usize,
}

impl Population {
    pub fn new(agents: Vec<Agent>) -> Self {
        let n_infected = agents.iter().filter(|agt| agt.infected()).count();
        Self { agents, n_infected }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn n_infected(&self) -> usize {
        self.n_infected
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Transition the agent at `idx` to infected. Counts the transition only
    /// once; infecting an already infected agent is a no-op.
    pub fn infect(&mut self, idx: usize) {
        let agt = &mut self.agents[idx];
        if !agt.infected() {
            agt.infect();
            self.n_infected += 1;
        }
    }
}
