use nalgebra::DVector;
use crate::task_modules::manipulation_query::{GraspEvaluationMode, ManipulationQuery};
use crate::task_modules::plan::{Plan, StatePath};
use crate::task_modules::task_query::TaskQuery;
use crate::utils::utils_errors::BinpickError;
use crate::utils::utils_se3::SE3Pose;

/// The task-planning side as the execution automaton sees it: one blocking
/// request/response call per task query.  `TaskQueryResolver` is the in-crate
/// implementation; a host may substitute a remote planning node.
pub trait TaskPlanningService {
    fn resolve(&mut self, query: &mut TaskQuery) -> Result<(), BinpickError>;
}

/// A motion-planning context.  The phase coordinator owns three of these
/// (manipulator-only transit, manipulator-with-object transfer, and
/// manipulator-only retract); each call consumes the query's start/goal,
/// writes the produced plan, constraint set, cost, and phase-local retract
/// index back onto it, and sets `found_path`.  "No path" is an ordinary
/// outcome (`found_path == false`), never an `Err`.
pub trait MotionPlanner {
    fn resolve_query(&mut self, query: &mut ManipulationQuery) -> Result<(), BinpickError>;
}

/// Inverse-kinematics solve toward a workspace target from a seed state.
pub trait InverseKinematicsSolver {
    fn ik(&self, seed_state: &DVector<f64>, target: &SE3Pose) -> Option<DVector<f64>>;
}

/// Jacobian-guided steering directly toward a workspace configuration,
/// bypassing the roadmap planners.
pub trait JacobianSteering {
    fn steer(&self, start_state: &DVector<f64>, target: &SE3Pose) -> Option<Plan>;
}

/// World-model validity check over a propagated state path.
pub trait ValidityChecker {
    fn is_valid(&self, path: &StatePath) -> bool;
}

/// Forward-propagates a plan from a start state to the state path it induces.
pub trait PlanPropagator {
    fn propagate(&self, start_state: &DVector<f64>, plan: &Plan) -> StatePath;
}

/// One candidate grasp for the target object, expressed as the joint states
/// the three planning phases need: the ungrasped pre-grasp state, the grasped
/// state, the grasped state at the relocation target, and the state at which
/// the gripper releases.
#[derive(Clone, Debug)]
pub struct GraspCandidate {
    pub ungrasped_state: DVector<f64>,
    pub grasped_state: DVector<f64>,
    pub target_grasped_state: DVector<f64>,
    pub release_state: DVector<f64>
}

/// Grasp-database evaluation over the target object at its sensed pose.
/// Greedy mode returns candidates best-first and callers typically stop at
/// the first one that planning accepts.  The placement variant additionally
/// derives each candidate's target grasped state from the requested final
/// object pose (pick-and-place); the plain variant leaves it for the caller
/// to overwrite with a target arm configuration (pick-and-move).
pub trait GraspEvaluator {
    fn evaluate(&self, object: &str, object_pose: &SE3Pose, retract_config: &SE3Pose, mode: GraspEvaluationMode) -> Vec<GraspCandidate>;
    fn evaluate_for_placement(&self, object: &str, object_pose: &SE3Pose, final_object_pose: &SE3Pose, retract_config: &SE3Pose, mode: GraspEvaluationMode) -> Vec<GraspCandidate>;
}

/// Pose sensing and grasp-outcome sensing.
pub trait SensingService {
    /// Returns the per-object pose list, or an error on sensing failure.
    fn update_objects_pose(&mut self) -> Result<Vec<(String, SE3Pose)>, BinpickError>;
    fn estimate_shelf_position(&mut self) -> SE3Pose;
    /// Latest gripper-sensor verdict on whether the object is held.
    fn grasp_succeeded(&self) -> bool;
    /// True if the target object's pose has drifted past the servoing
    /// threshold since the reaching plan was issued.
    fn target_pose_changed(&self) -> bool;
    fn turn_off(&mut self);
}

/// The robot-side executor.
pub trait TrajectoryController {
    fn convert_and_copy_to_robot_plan(&mut self, plan: &Plan);
    fn set_robot_plan(&mut self);
    fn send_zero_control(&mut self);
    fn cancel_goal(&mut self);
}

/// Pre-recorded canned trajectories, requested by string key.
pub trait SavedTrajectoryStore {
    fn lookup(&self, key: &str) -> Option<Plan>;
}

/// Builds the lookup key for stage `stage_index` of the canned three-stage
/// approach for `arm` at `bin`.
pub fn three_stage_key(arm: &str, bin: char, stage_index: usize) -> String {
    format!("three_stage_traj_{}/{}_{}_{}", arm, arm, bin, stage_index)
}

/// Builds the lookup key for the canned bin-to-bin transition for `arm`.
pub fn bin_to_bin_key(arm: &str, from_bin: char, to_bin: char) -> String {
    format!("bin_to_bin_traj_{}/{}_{}_to_{}", arm, arm, from_bin, to_bin)
}

/// Which shelf surface an object is pressed against.  Which of these counts
/// as the bin's left or right boundary depends on the bin's column; that
/// mapping is the collision-offset resolver's business, not the sensor's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinSurface {
    Bottom,
    LeftSide,
    LeftDivider,
    RightDivider,
    RightSide
}

/// The narrow world-model window the collision-offset resolver needs: push a
/// candidate object pose in, read back which shelf surfaces it collides with.
pub trait BinCollisionSensor {
    fn apply_pose(&mut self, object: &str, pose: &SE3Pose);
    fn colliding_surfaces(&self, object: &str) -> Vec<BinSurface>;
}

/// Read access to the manipulator's joint states per planning context, the
/// sampling bounds used for IK seeding, and forward kinematics for composing
/// retract goals relative to the current end-effector pose.
pub trait ArmStateProvider {
    fn current_state(&self, context: &str) -> DVector<f64>;
    fn seed_bounds(&self, context: &str) -> Vec<(f64, f64)>;
    fn forward_kinematics(&self, context: &str, state: &DVector<f64>) -> SE3Pose;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_stage_key_format() {
        assert_eq!(three_stage_key("left", 'A', 0), "three_stage_traj_left/left_A_0");
        assert_eq!(three_stage_key("right", 'K', 2), "three_stage_traj_right/right_K_2");
    }

    #[test]
    fn bin_to_bin_key_format() {
        assert_eq!(bin_to_bin_key("right", 'C', 'F'), "bin_to_bin_traj_right/right_C_to_F");
    }
}
