use serde::Serialize;

/// Rounds an estimated count the way the counting metrics compare it: ties go to even.
pub fn rounded_count(density: f64) -> f64 {
    density.round_ties_even()
}

/// Running counting accuracy over density-map predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DensityStats {
    pub images: usize,
    pub correct: usize,
    pub abs_error: f64,
}

impl DensityStats {
    /// Records one image; returns whether the rounded estimate hit the true count.
    pub fn observe(&mut self, density: f64, gt_count: usize) -> bool {
        let hit = rounded_count(density) == gt_count as f64;
        self.images += 1;
        if hit {
            self.correct += 1;
        }
        self.abs_error += (density - gt_count as f64).abs();
        hit
    }

    /// Share of images whose rounded estimate equals the true count.
    pub fn ratio(&self) -> Option<f64> {
        (self.images > 0).then(|| self.correct as f64 / self.images as f64)
    }

    /// Mean absolute error of the raw estimate.
    pub fn mae(&self) -> Option<f64> {
        (self.images > 0).then(|| self.abs_error / self.images as f64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ties_round_to_even() {
        assert_eq!(rounded_count(2.5), 2.0);
        assert_eq!(rounded_count(3.5), 4.0);
        assert_eq!(rounded_count(2.49), 2.0);
        assert_eq!(rounded_count(0.5), 0.0);
    }

    #[test]
    fn accumulates_ratio_and_mae() {
        let mut stats = DensityStats::default();
        assert_eq!(stats.ratio(), None);
        assert_eq!(stats.mae(), None);

        assert!(stats.observe(3.2, 3));
        assert!(!stats.observe(5.0, 4));
        assert!(!stats.observe(2.5, 3));
        assert!(stats.observe(0.25, 0));

        assert_eq!(stats.images, 4);
        assert_eq!(stats.correct, 2);
        assert_eq!(stats.ratio(), Some(0.5));
        let mae = stats.mae().unwrap();
        assert!((mae - (0.2 + 1.0 + 0.5 + 0.25) / 4.0).abs() < 1e-9);
    }
}
