use rand::Rng;
use rand_distr::{Normal, Distribution};

pub struct SimpleSamplers;
impl SimpleSamplers {
    /// Draws one uniform sample per (lower, upper) bound pair.  Degenerate
    /// bounds (lower == upper) sample to the bound itself.  Used to draw
    /// randomized seed states for the inverse-kinematics retry loop.
    pub fn uniform_samples(bounds: &Vec<(f64, f64)>) -> Vec<f64> {
        let mut out_vec = vec![];
        let mut rng = rand::thread_rng();
        for b in bounds {
            if b.0 == b.1 {
                out_vec.push(b.0);
            } else {
                out_vec.push(rng.gen_range(b.0..b.1));
            }
        }
        out_vec
    }
    pub fn normal_samples(means_and_standard_deviations: &Vec<(f64, f64)>) -> Vec<f64> {
        let mut out_vec = vec![];
        let mut rng = rand::thread_rng();
        for (mean, standard_deviation) in means_and_standard_deviations {
            let distribution = Normal::new(*mean, *standard_deviation).expect("error");
            out_vec.push(distribution.sample(&mut rng));
        }
        out_vec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_samples_respect_bounds() {
        let bounds = vec![(-1.0, 1.0), (0.5, 0.5), (-3.14, 3.14)];
        for _ in 0..50 {
            let s = SimpleSamplers::uniform_samples(&bounds);
            assert_eq!(s.len(), 3);
            assert!(s[0] >= -1.0 && s[0] < 1.0);
            assert_eq!(s[1], 0.5);
            assert!(s[2] >= -3.14 && s[2] < 3.14);
        }
    }
}
