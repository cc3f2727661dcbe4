use std::collections::BTreeSet;
use itertools::Itertools;
use nalgebra::DVector;
use serde::{Serialize, Deserialize};
use crate::task_modules::plan::Plan;
use crate::utils::utils_se3::SE3Pose;

/// Graph-search mode requested from a motion-planning context.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMode {
    Standard,
    /// Defer expensive edge validation until a candidate path is found.
    Lazy
}

/// Which planning phases a manipulation query spans.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManipulationMode {
    /// Ungrasped motion only (reach phase in isolation).
    Transit,
    /// Grasped motion only (transfer phase in isolation).
    Transfer,
    /// Reach, transfer, and retract sequenced into one aggregate plan.
    FullPath
}

/// Selection policy over multiple grasp-index candidates.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathQuality {
    /// Keep only the shortest aggregate plan across all candidates.
    BestPath,
    /// Stop at the first candidate that yields a valid aggregate.
    FirstPath,
    /// Keep every valid aggregate.
    AllPaths
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraspEvaluationMode {
    Greedy,
    Exhaustive
}

/// Indices of other objects whose placement a path's validity depends on.
/// Unioned across phases per candidate so that callers can later invalidate
/// the aggregate plan when any such object moves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    indices: BTreeSet<usize>
}
impl ConstraintSet {
    pub fn new_empty() -> Self {
        Self { indices: BTreeSet::new() }
    }
    pub fn insert(&mut self, idx: usize) {
        self.indices.insert(idx);
    }
    pub fn remove(&mut self, idx: usize) {
        self.indices.remove(&idx);
    }
    pub fn contains(&self, idx: usize) -> bool {
        self.indices.contains(&idx)
    }
    pub fn union_with(&mut self, other: &ConstraintSet) {
        for idx in &other.indices {
            self.indices.insert(*idx);
        }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
    pub fn clear(&mut self) {
        self.indices.clear();
    }
    pub fn print_string(&self) -> String {
        self.indices.iter().map(|i| i.to_string()).join(" , ")
    }
}

/// The request/response record exchanged with a motion-planning context.
/// One query object is reused across the sequential phase calls of a
/// manipulation task; `clear()` resets the produced plan, the constraint
/// accumulator, and the result flag between phases.
#[derive(Clone, Debug)]
pub struct ManipulationQuery {
    pub start_state: DVector<f64>,
    pub goal_state: Option<DVector<f64>>,
    pub goal_config: Option<SE3Pose>,
    pub search_mode: SearchMode,
    pub mode: ManipulationMode,
    pub path_quality: PathQuality,
    pub grasp_evaluation: GraspEvaluationMode,
    pub retract_config: Option<SE3Pose>,
    pub target_object: Option<String>,
    pub path_constraints: ConstraintSet,
    pub full_constraints: ConstraintSet,
    pub plan: Plan,
    pub found_path: bool,
    /// Cost of the produced plan, reported by the planning context.
    pub solution_cost: f64,
    /// Phase-local index at which the approach/retract sub-segment of the
    /// produced plan begins, reported by the planning context.
    pub retracted_point: i64
}
impl ManipulationQuery {
    pub fn new(start_state: DVector<f64>) -> Self {
        Self {
            start_state,
            goal_state: None,
            goal_config: None,
            search_mode: SearchMode::Lazy,
            mode: ManipulationMode::Transit,
            path_quality: PathQuality::BestPath,
            grasp_evaluation: GraspEvaluationMode::Greedy,
            retract_config: None,
            target_object: None,
            path_constraints: ConstraintSet::new_empty(),
            full_constraints: ConstraintSet::new_empty(),
            plan: Plan::new_empty(),
            found_path: false,
            solution_cost: 0.0,
            retracted_point: 0
        }
    }
    /// Plain state-to-state motion.
    pub fn setup_move(&mut self, start_state: DVector<f64>, goal_state: DVector<f64>) {
        self.start_state = start_state;
        self.goal_state = Some(goal_state);
        self.goal_config = None;
        self.mode = ManipulationMode::Transit;
    }
    /// Motion toward a workspace configuration (resolved by steering/IK on the
    /// planner side rather than a precomputed joint-space goal).
    pub fn setup_move_to_config(&mut self, start_state: DVector<f64>, goal_config: SE3Pose) {
        self.start_state = start_state;
        self.goal_state = None;
        self.goal_config = Some(goal_config);
        self.mode = ManipulationMode::Transit;
    }
    /// Full pick: grasp `object`, move to `goal_state`, retract along
    /// `retract_config`.
    pub fn setup_pick_and_move(&mut self, grasp_evaluation: GraspEvaluationMode, object: &str, retract_config: SE3Pose, start_state: DVector<f64>, goal_state: DVector<f64>) {
        self.start_state = start_state;
        self.goal_state = Some(goal_state);
        self.goal_config = None;
        self.grasp_evaluation = grasp_evaluation;
        self.target_object = Some(object.to_string());
        self.retract_config = Some(retract_config);
        self.mode = ManipulationMode::FullPath;
    }
    /// Resets the produced plan, accumulated constraints, and result flag so
    /// the query can be reissued against the next planning phase.
    pub fn clear(&mut self) {
        self.plan.clear();
        self.path_constraints.clear();
        self.full_constraints.clear();
        self.found_path = false;
        self.solution_cost = 0.0;
        self.retracted_point = 0;
    }
}

/// One aggregate planning result per grasp-index candidate.  A candidate whose
/// phases did not all succeed is recorded as a null path: empty plan, cost −1,
/// invalid reach/retract markers, empty constraint sets.
#[derive(Clone, Debug)]
pub struct ManipulationQueryOutput {
    pub plan: Plan,
    pub constraints: ConstraintSet,
    pub full_constraints: ConstraintSet,
    pub solution_cost: f64,
    pub reaching_point: i64,
    pub retracting_point: i64
}
impl ManipulationQueryOutput {
    pub fn new_null_path() -> Self {
        Self {
            plan: Plan::new_empty(),
            constraints: ConstraintSet::new_empty(),
            full_constraints: ConstraintSet::new_empty(),
            solution_cost: -1.0,
            reaching_point: -1,
            retracting_point: -1
        }
    }
    pub fn is_null_path(&self) -> bool {
        self.solution_cost < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_union_deduplicates() {
        let mut a = ConstraintSet::new_empty();
        a.insert(1);
        a.insert(4);
        let mut b = ConstraintSet::new_empty();
        b.insert(4);
        b.insert(7);
        a.union_with(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.print_string(), "1 , 4 , 7");
    }

    #[test]
    fn clear_resets_result_fields() {
        let mut q = ManipulationQuery::new(DVector::zeros(8));
        q.found_path = true;
        q.path_constraints.insert(2);
        q.plan.push(crate::task_modules::plan::ControlStep::new(DVector::zeros(8), 1.0));
        q.clear();
        assert!(!q.found_path);
        assert!(q.path_constraints.is_empty());
        assert!(q.plan.is_empty());
    }

    #[test]
    fn null_path_markers() {
        let out = ManipulationQueryOutput::new_null_path();
        assert!(out.is_null_path());
        assert_eq!(out.solution_cost, -1.0);
        assert_eq!(out.reaching_point, -1);
        assert_eq!(out.retracting_point, -1);
        assert!(out.constraints.is_empty());
    }
}
