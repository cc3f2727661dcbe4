use nalgebra::DVector;
use ordered_float::OrderedFloat;
use crate::planning_modules::planner_services::{GraspCandidate, MotionPlanner};
use crate::task_modules::manipulation_query::{ConstraintSet, ManipulationMode, ManipulationQuery, ManipulationQueryOutput, PathQuality};
use crate::task_modules::plan::Plan;
use crate::utils::utils_console::{binpick_print, PrintColor, PrintMode};
use crate::utils::utils_errors::BinpickError;

/// Sequences the three planning phases of a pick-transport task against three
/// separate planning contexts:
///
/// 1. **Reach**: from the query start (normally the safe configuration) to a
///    candidate ungrasped pre-grasp state, on the manipulator-only context.
/// 2. **Transfer**: while grasping, from the candidate grasped state to the
///    target grasped state, on the manipulator-with-object context.
/// 3. **Retract**: from the release state back to the safe configuration, on
///    the manipulator-only context again.
///
/// Phases may fail independently; a failed candidate becomes a null-path
/// output (empty plan, cost −1, invalid split markers) rather than an error.
/// Successful candidates are stitched reach+transfer+retract, their
/// constraint sets unioned, and the reach/retract split indices tracked so
/// callers can locate the grasp point inside the combined trajectory.
pub struct PhaseCoordinator {
    transit_planner: Box<dyn MotionPlanner>,
    transfer_planner: Box<dyn MotionPlanner>,
    retract_planner: Box<dyn MotionPlanner>,
    safe_state: DVector<f64>
}

struct PhaseOutcome {
    plan: Plan,
    constraints: ConstraintSet,
    full_constraints: ConstraintSet,
    solution_cost: f64,
    retracted_point: i64
}

impl PhaseCoordinator {
    pub fn new(transit_planner: Box<dyn MotionPlanner>, transfer_planner: Box<dyn MotionPlanner>, retract_planner: Box<dyn MotionPlanner>, safe_state: DVector<f64>) -> Self {
        Self { transit_planner, transfer_planner, retract_planner, safe_state }
    }

    pub fn safe_state(&self) -> &DVector<f64> {
        &self.safe_state
    }

    /// Resolves the query, returning one output per surviving candidate (see
    /// `PathQuality` for how many survive).  `query.found_path` is set to
    /// whether any non-null output was produced, and the winning plan is also
    /// copied back onto `query.plan`.
    pub fn resolve(&mut self, query: &mut ManipulationQuery, candidates: &Vec<GraspCandidate>) -> Result<Vec<ManipulationQueryOutput>, BinpickError> {
        let outputs = match query.mode {
            ManipulationMode::Transit => {
                let goal = self.single_phase_goal(query)?;
                let start = query.start_state.clone();
                let outcome = Self::run_phase(&mut self.transit_planner, query, &start, &goal)?;
                vec![Self::single_phase_output(outcome)]
            }
            ManipulationMode::Transfer => {
                let goal = self.single_phase_goal(query)?;
                let start = query.start_state.clone();
                let outcome = Self::run_phase(&mut self.transfer_planner, query, &start, &goal)?;
                vec![Self::single_phase_output(outcome)]
            }
            ManipulationMode::FullPath => {
                self.resolve_full_path(query, candidates)?
            }
        };

        query.found_path = outputs.iter().any(|o| !o.is_null_path());
        if let Some(best) = outputs.iter().find(|o| !o.is_null_path()) {
            query.plan = best.plan.clone();
        }
        return Ok(outputs);
    }

    fn single_phase_goal(&self, query: &ManipulationQuery) -> Result<DVector<f64>, BinpickError> {
        return match &query.goal_state {
            Some(g) => { Ok(g.clone()) }
            None => { Err(BinpickError::new_precondition_violation("single-phase manipulation query has no goal state", file!(), line!())) }
        }
    }

    fn single_phase_output(outcome: Option<PhaseOutcome>) -> ManipulationQueryOutput {
        return match outcome {
            None => { ManipulationQueryOutput::new_null_path() }
            Some(o) => {
                ManipulationQueryOutput {
                    plan: o.plan,
                    constraints: o.constraints,
                    full_constraints: o.full_constraints,
                    solution_cost: o.solution_cost,
                    reaching_point: o.retracted_point,
                    retracting_point: -1
                }
            }
        }
    }

    fn resolve_full_path(&mut self, query: &mut ManipulationQuery, candidates: &Vec<GraspCandidate>) -> Result<Vec<ManipulationQueryOutput>, BinpickError> {
        let mut outputs: Vec<ManipulationQueryOutput> = vec![];
        let mut best_key: Option<(usize, OrderedFloat<f64>)> = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            let aggregate = self.plan_candidate(query, candidate)?;
            let aggregate = match aggregate {
                Some(a) => { a }
                None => { continue; }
            };
            binpick_print(&format!("Candidate {}: plan size {}, constraints: {}", idx, aggregate.plan.len(), aggregate.constraints.print_string()), PrintMode::Println, PrintColor::Magenta, false);

            match query.path_quality {
                PathQuality::BestPath => {
                    let key = (aggregate.plan.len(), OrderedFloat(aggregate.solution_cost));
                    let better = match &best_key {
                        None => { true }
                        Some(best) => { key < *best }
                    };
                    if better {
                        best_key = Some(key);
                        outputs.clear();
                        outputs.push(aggregate);
                    }
                }
                PathQuality::FirstPath => {
                    outputs.push(aggregate);
                    break;
                }
                PathQuality::AllPaths => {
                    outputs.push(aggregate);
                }
            }
        }

        if outputs.is_empty() {
            outputs.push(ManipulationQueryOutput::new_null_path());
        }
        return Ok(outputs);
    }

    /// Runs reach, transfer, and retract for one candidate.  Returns `None`
    /// if any phase fails to produce a plan.
    fn plan_candidate(&mut self, query: &ManipulationQuery, candidate: &GraspCandidate) -> Result<Option<ManipulationQueryOutput>, BinpickError> {
        let reach = match Self::run_phase(&mut self.transit_planner, query, &query.start_state, &candidate.ungrasped_state)? {
            Some(o) => { o }
            None => { return Ok(None); }
        };
        let transfer = match Self::run_phase(&mut self.transfer_planner, query, &candidate.grasped_state, &candidate.target_grasped_state)? {
            Some(o) => { o }
            None => { return Ok(None); }
        };
        let safe_state = self.safe_state.clone();
        let mut retract = match Self::run_phase(&mut self.retract_planner, query, &candidate.release_state, &safe_state)? {
            Some(o) => { o }
            None => { return Ok(None); }
        };
        // The retract planner reports its split index from the front of its
        // phase plan; re-express it from the back, where the withdrawal
        // sub-segment actually begins.
        retract.retracted_point = retract.plan.len() as i64 - retract.retracted_point - 1;

        let reaching_point = reach.retracted_point;
        let retracting_point = reach.plan.len() as i64 + transfer.plan.len() as i64 + retract.retracted_point;
        let solution_cost = reach.solution_cost + transfer.solution_cost + retract.solution_cost;

        let mut plan = reach.plan;
        let mut transfer_plan = transfer.plan;
        let mut retract_plan = retract.plan;
        plan.append(&mut transfer_plan);
        plan.append(&mut retract_plan);

        let mut constraints = reach.constraints;
        constraints.union_with(&transfer.constraints);
        constraints.union_with(&retract.constraints);
        let mut full_constraints = reach.full_constraints;
        full_constraints.union_with(&transfer.full_constraints);
        full_constraints.union_with(&retract.full_constraints);

        return Ok(Some(ManipulationQueryOutput {
            plan,
            constraints,
            full_constraints,
            solution_cost,
            reaching_point,
            retracting_point
        }));
    }

    /// Issues one phase query against the given planning context.  Returns
    /// `None` when the context reports no path (an ordinary outcome).
    fn run_phase(planner: &mut Box<dyn MotionPlanner>, parent: &ManipulationQuery, start: &DVector<f64>, goal: &DVector<f64>) -> Result<Option<PhaseOutcome>, BinpickError> {
        let mut phase_query = ManipulationQuery::new(start.clone());
        phase_query.search_mode = parent.search_mode;
        phase_query.grasp_evaluation = parent.grasp_evaluation;
        phase_query.target_object = parent.target_object.clone();
        phase_query.setup_move(start.clone(), goal.clone());
        phase_query.clear();
        planner.resolve_query(&mut phase_query)?;

        if phase_query.plan.is_empty() {
            return Ok(None);
        }
        return Ok(Some(PhaseOutcome {
            plan: phase_query.plan,
            constraints: phase_query.path_constraints,
            full_constraints: phase_query.full_constraints,
            solution_cost: phase_query.solution_cost,
            retracted_point: phase_query.retracted_point
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_modules::plan::ControlStep;

    /// Scripted planning context: returns plans of the queued lengths in
    /// order; a queued length of zero means "no path".
    struct ScriptedPlanner {
        lengths: Vec<usize>,
        retracted_point: i64,
        constraint: Option<usize>,
        call_idx: usize
    }
    impl ScriptedPlanner {
        fn new(lengths: Vec<usize>, retracted_point: i64, constraint: Option<usize>) -> Self {
            Self { lengths, retracted_point, constraint, call_idx: 0 }
        }
    }
    impl MotionPlanner for ScriptedPlanner {
        fn resolve_query(&mut self, query: &mut ManipulationQuery) -> Result<(), BinpickError> {
            let len = self.lengths[self.call_idx % self.lengths.len()];
            self.call_idx += 1;
            for _ in 0..len {
                query.plan.push(ControlStep::new(DVector::zeros(4), 0.1));
            }
            if len > 0 {
                query.found_path = true;
                query.solution_cost = len as f64;
                query.retracted_point = self.retracted_point;
                if let Some(c) = self.constraint {
                    query.path_constraints.insert(c);
                    query.full_constraints.insert(c);
                }
            }
            Ok(())
        }
    }

    fn candidate() -> GraspCandidate {
        GraspCandidate {
            ungrasped_state: DVector::zeros(4),
            grasped_state: DVector::zeros(4),
            target_grasped_state: DVector::zeros(4),
            release_state: DVector::zeros(4)
        }
    }

    fn full_path_query() -> ManipulationQuery {
        let mut q = ManipulationQuery::new(DVector::zeros(4));
        q.mode = ManipulationMode::FullPath;
        q.path_quality = PathQuality::BestPath;
        q
    }

    #[test]
    fn phase_aggregation_lengths_and_split_indices() {
        // reach = 4 steps (approach begins at 2), transfer = 5, retract = 6
        // with phase-local index 2 from the front -> 6 - 2 - 1 = 3 from the
        // start of the retract segment.
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![4], 2, Some(1))),
            Box::new(ScriptedPlanner::new(vec![5], 0, Some(2))),
            Box::new(ScriptedPlanner::new(vec![6], 2, Some(3))),
            DVector::zeros(4)
        );
        let mut query = full_path_query();
        let outputs = coordinator.resolve(&mut query, &vec![candidate()]).unwrap();
        assert!(query.found_path);
        assert_eq!(outputs.len(), 1);
        let out = &outputs[0];
        assert_eq!(out.plan.len(), 4 + 5 + 6);
        assert_eq!(out.reaching_point, 2);
        assert_eq!(out.retracting_point, 4 + 5 + (6 - 2 - 1));
        // Constraints unioned across all three phases.
        assert_eq!(out.constraints.print_string(), "1 , 2 , 3");
    }

    #[test]
    fn best_path_keeps_the_shorter_aggregate() {
        // First candidate aggregates to 10 steps, second to 7.
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![4, 3], 0, None)),
            Box::new(ScriptedPlanner::new(vec![3, 2], 0, None)),
            Box::new(ScriptedPlanner::new(vec![3, 2], 0, None)),
            DVector::zeros(4)
        );
        let mut query = full_path_query();
        let outputs = coordinator.resolve(&mut query, &vec![candidate(), candidate()]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].plan.len(), 7);
        assert_eq!(query.plan.len(), 7);
    }

    #[test]
    fn null_path_when_a_phase_fails() {
        // Transfer phase produces no plan.
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![4], 0, Some(5))),
            Box::new(ScriptedPlanner::new(vec![0], 0, None)),
            Box::new(ScriptedPlanner::new(vec![6], 0, Some(6))),
            DVector::zeros(4)
        );
        let mut query = full_path_query();
        let outputs = coordinator.resolve(&mut query, &vec![candidate()]).unwrap();
        assert!(!query.found_path);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].is_null_path());
        assert_eq!(outputs[0].solution_cost, -1.0);
        assert!(outputs[0].constraints.is_empty());
        assert_eq!(outputs[0].reaching_point, -1);
        assert_eq!(outputs[0].retracting_point, -1);
    }

    #[test]
    fn first_path_stops_at_first_valid_candidate() {
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![2], 0, None)),
            Box::new(ScriptedPlanner::new(vec![2], 0, None)),
            Box::new(ScriptedPlanner::new(vec![2], 0, None)),
            DVector::zeros(4)
        );
        let mut query = full_path_query();
        query.path_quality = PathQuality::FirstPath;
        let outputs = coordinator.resolve(&mut query, &vec![candidate(), candidate(), candidate()]).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].plan.len(), 6);
    }

    #[test]
    fn all_paths_appends_every_valid_aggregate() {
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![2, 3], 0, None)),
            Box::new(ScriptedPlanner::new(vec![2, 3], 0, None)),
            Box::new(ScriptedPlanner::new(vec![2, 3], 0, None)),
            DVector::zeros(4)
        );
        let mut query = full_path_query();
        query.path_quality = PathQuality::AllPaths;
        let outputs = coordinator.resolve(&mut query, &vec![candidate(), candidate()]).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].plan.len(), 6);
        assert_eq!(outputs[1].plan.len(), 9);
    }

    #[test]
    fn transit_mode_runs_a_single_phase() {
        let mut coordinator = PhaseCoordinator::new(
            Box::new(ScriptedPlanner::new(vec![3], 1, Some(9))),
            Box::new(ScriptedPlanner::new(vec![0], 0, None)),
            Box::new(ScriptedPlanner::new(vec![0], 0, None)),
            DVector::zeros(4)
        );
        let mut query = ManipulationQuery::new(DVector::zeros(4));
        query.mode = ManipulationMode::Transit;
        query.setup_move(DVector::zeros(4), DVector::zeros(4));
        let outputs = coordinator.resolve(&mut query, &vec![]).unwrap();
        assert!(query.found_path);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].plan.len(), 3);
        assert_eq!(outputs[0].reaching_point, 1);
        assert_eq!(outputs[0].retracting_point, -1);
    }
}
