use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford) with extrema.
#[derive(Debug, Clone)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Standard error of the mean.
    pub sem: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn report(&self) -> AccumulatorReport {
        let (std_dev, sem) = if self.n_vals > 1 {
            let var = self.diff_2_sum / (self.n_vals as f64 - 1.0);
            (var.sqrt(), (var / self.n_vals as f64).sqrt())
        } else {
            (f64::NAN, f64::NAN)
        };
        let empty = self.n_vals == 0;
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if empty { f64::NAN } else { self.mean },
            std_dev,
            sem,
            min: if empty { f64::NAN } else { self.min },
            max: if empty { f64::NAN } else { self.max },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_two_pass_statistics() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut acc = Accumulator::new();
        vals.iter().for_each(|&val| acc.add(val));
        let report = acc.report();

        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|val| (val - mean).powi(2)).sum::<f64>() / 7.0;
        assert_eq!(report.n_vals, 8);
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - var.sqrt()).abs() < 1e-12);
        assert!((report.sem - (var / 8.0).sqrt()).abs() < 1e-12);
        assert_eq!(report.min, 2.0);
        assert_eq!(report.max, 9.0);
    }

    #[test]
    fn degenerate_samples() {
        let report = Accumulator::new().report();
        assert_eq!(report.n_vals, 0);
        assert!(report.mean.is_nan() && report.min.is_nan());

        let mut acc = Accumulator::new();
        acc.add(3.0);
        let report = acc.report();
        assert_eq!(report.mean, 3.0);
        assert!(report.std_dev.is_nan());
    }
}
