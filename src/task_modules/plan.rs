use nalgebra::DVector;
use serde::{Serialize, Deserialize};

/// A single control applied for a duration (in seconds).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlStep {
    pub control: DVector<f64>,
    pub duration: f64
}
impl ControlStep {
    pub fn new(control: DVector<f64>, duration: f64) -> Self {
        Self { control, duration }
    }
}

/// An ordered sequence of control/duration steps.  Plans are the currency of
/// the whole task layer: motion planners produce them, the phase coordinator
/// stitches them, and the controller consumes them.
///
/// Plans support concatenation (`append`) for multi-phase stitching and
/// end-trimming (`trim_back`) for shaving the terminal gripper transient off a
/// regrasp or lift plan before execution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<ControlStep>
}
impl Plan {
    pub fn new_empty() -> Self {
        Self { steps: vec![] }
    }
    pub fn push(&mut self, step: ControlStep) {
        self.steps.push(step);
    }
    /// Moves all of `other`'s steps onto the back of this plan.
    pub fn append(&mut self, other: &mut Plan) {
        self.steps.append(&mut other.steps);
    }
    pub fn len(&self) -> usize {
        self.steps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
    pub fn clear(&mut self) {
        self.steps.clear();
    }
    pub fn steps(&self) -> &Vec<ControlStep> {
        &self.steps
    }
    pub fn first(&self) -> Option<&ControlStep> {
        self.steps.first()
    }
    pub fn last(&self) -> Option<&ControlStep> {
        self.steps.last()
    }
    /// Total duration of the plan in seconds.
    pub fn duration(&self) -> f64 {
        self.steps.iter().map(|s| s.duration).sum()
    }
    /// Subtracts `dt` from the final step's duration, saturating at zero.
    pub fn trim_back(&mut self, dt: f64) {
        if let Some(step) = self.steps.last_mut() {
            step.duration = (step.duration - dt).max(0.0);
        }
    }
}

/// A propagated state sequence, handed to the validity checker as a
/// consistency check after a grasp-and-retrieve plan is produced.
#[derive(Clone, Debug)]
pub struct StatePath {
    states: Vec<DVector<f64>>
}
impl StatePath {
    pub fn new_empty() -> Self {
        Self { states: vec![] }
    }
    pub fn push(&mut self, state: DVector<f64>) {
        self.states.push(state);
    }
    pub fn len(&self) -> usize {
        self.states.len()
    }
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
    pub fn states(&self) -> &Vec<DVector<f64>> {
        &self.states
    }
    pub fn last(&self) -> Option<&DVector<f64>> {
        self.states.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(v: f64, duration: f64) -> ControlStep {
        ControlStep::new(DVector::from_vec(vec![v; 3]), duration)
    }

    #[test]
    fn append_concatenates_in_order() {
        let mut a = Plan::new_empty();
        a.push(step(1.0, 0.5));
        a.push(step(2.0, 0.5));
        let mut b = Plan::new_empty();
        b.push(step(3.0, 1.0));
        a.append(&mut b);
        assert_eq!(a.len(), 3);
        assert!(b.is_empty());
        assert_eq!(a.steps()[2].control[0], 3.0);
        assert!((a.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn trim_back_shortens_final_step() {
        let mut p = Plan::new_empty();
        p.push(step(1.0, 0.5));
        p.push(step(2.0, 0.1));
        p.trim_back(0.02);
        assert!((p.last().unwrap().duration - 0.08).abs() < 1e-12);
    }

    #[test]
    fn trim_back_saturates_at_zero() {
        let mut p = Plan::new_empty();
        p.push(step(1.0, 0.01));
        p.trim_back(0.02);
        assert_eq!(p.last().unwrap().duration, 0.0);
    }
}
