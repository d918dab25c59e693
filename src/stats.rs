use serde::{Deserialize, Serialize};

/// Streaming mean/variance accumulator (Welford's algorithm).
pub struct Accumulator {
    count: usize,
    mean: f64,
    m2: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.count += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.count as f64;

        let diff_b = val - self.mean;
        self.m2 += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            count: self.count,
            mean: if self.count > 0 { self.mean } else { f64::NAN },
            std_dev: if self.count > 1 {
                (self.m2 / (self.count as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}
