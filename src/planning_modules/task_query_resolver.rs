use nalgebra::DVector;
use crate::planning_modules::phase_coordinator::PhaseCoordinator;
use crate::planning_modules::planner_services::{ArmStateProvider, GraspEvaluator, InverseKinematicsSolver, JacobianSteering, PlanPropagator, SavedTrajectoryStore, TaskPlanningService, ValidityChecker};
use crate::task_modules::examination::{ExaminationProfileTable, FIRST_STAGE_OFFSET, RGB_CAM_OFFSET};
use crate::task_modules::manipulation_query::{GraspEvaluationMode, ManipulationMode, ManipulationQuery, PathQuality};
use crate::task_modules::task_query::{TaskQuery, TaskStage};
use crate::utils::utils_console::{binpick_print, PrintColor, PrintMode};
use crate::utils::utils_errors::BinpickError;
use crate::utils::utils_sampling::SimpleSamplers;
use crate::utils::utils_se3::SE3Pose;

/// Joint epsilon deciding which arm the dual-arm move maneuver plans first.
pub const HOME_DIFFERENCE_EPSILON: f64 = 0.001;
/// Inverse-kinematics seed budget for camera-viewing maneuvers.
pub const MAX_IK_TRIES: usize = 20;
/// Vertical hop of the lift recovery maneuver, in meters.
pub const LIFT_OFFSET: f64 = 0.05;

/// The safe arm configuration above the order bin, per arm.  The grasped arm
/// is sent here after a successful pick so the retract phase always ends at
/// the same anchor.
pub const LEFT_ARM_ORDER_BIN: [f64; 8] = [-1.57, 1.5618822574615479, 0.6113936305046082, 0.0, -0.5987081527709961, -0.01734461449086666, -0.49032706022262573, 0.016362464055418968];
pub const RIGHT_ARM_ORDER_BIN: [f64; 8] = [1.57, 1.59486, 0.30705, 0.058093, -0.995599, 0.173795, -0.3270568, -0.361237];
pub const LEFT_ARM_HOME: [f64; 8] = [0.0, 1.57, 0.0, 0.0, -1.7, 0.0, 0.0, 0.0];
pub const RIGHT_ARM_HOME: [f64; 8] = [0.0, 1.57, 0.0, 0.0, -1.7, 0.0, 0.0, 0.0];

/// Planning-context names the resolver switches between, mirroring the way
/// the planning side keeps separate contexts per arm and per camera mount.
#[derive(Clone, Debug)]
pub struct ResolverContexts {
    pub left: String,
    pub right: String,
    pub left_camera: String,
    pub right_camera: String,
    pub left_camera_jac: String,
    pub right_camera_jac: String
}
impl ResolverContexts {
    pub fn standard() -> Self {
        Self {
            left: "left_full_arm".to_string(),
            right: "right_full_arm".to_string(),
            left_camera: "left_camera_arm".to_string(),
            right_camera: "right_camera_arm".to_string(),
            left_camera_jac: "left_camera_jac_arm".to_string(),
            right_camera_jac: "right_camera_jac_arm".to_string()
        }
    }
    /// "left"/"right" select the matching arm context; anything else is taken
    /// verbatim as an explicit context name.
    pub fn for_hand(&self, hand: &str) -> String {
        return match hand {
            "left" => { self.left.clone() }
            "right" => { self.right.clone() }
            other => { other.to_string() }
        }
    }
    pub fn camera_for_hand(&self, hand: &str) -> String {
        return if hand == "left" { self.left_camera.clone() } else { self.right_camera.clone() }
    }
    pub fn camera_jac_for_hand(&self, hand: &str) -> String {
        return if hand == "left" { self.left_camera_jac.clone() } else { self.right_camera_jac.clone() }
    }
}

/// Resolves task queries by dispatching on the stage tag to exactly one
/// maneuver handler and writing the handler's result into the query's
/// `found_solution` flag and plan buffers.
///
/// Recoverable planning failures (IK budget exhausted, no path found) leave
/// `found_solution == false` and are for the caller to react to; only
/// configuration defects (bad hand/context names, unknown bins) surface as
/// errors.
pub struct TaskQueryResolver {
    coordinator: PhaseCoordinator,
    ik_solver: Box<dyn InverseKinematicsSolver>,
    jac_steering: Box<dyn JacobianSteering>,
    validity_checker: Box<dyn ValidityChecker>,
    propagator: Box<dyn PlanPropagator>,
    grasp_evaluator: Box<dyn GraspEvaluator>,
    saved_trajectories: Box<dyn SavedTrajectoryStore>,
    arm_states: Box<dyn ArmStateProvider>,
    examination_profiles: ExaminationProfileTable,
    contexts: ResolverContexts,
    /// Zero out redundant joint axes of IK results before planning, keeping
    /// camera approaches compatible with the canned bin trajectories.
    bin_trajectories: bool,
    /// Replace roadmap queries with Jacobian-guided steering where possible.
    jac_steering_mode: bool
}
impl TaskQueryResolver {
    pub fn new(coordinator: PhaseCoordinator,
               ik_solver: Box<dyn InverseKinematicsSolver>,
               jac_steering: Box<dyn JacobianSteering>,
               validity_checker: Box<dyn ValidityChecker>,
               propagator: Box<dyn PlanPropagator>,
               grasp_evaluator: Box<dyn GraspEvaluator>,
               saved_trajectories: Box<dyn SavedTrajectoryStore>,
               arm_states: Box<dyn ArmStateProvider>,
               contexts: ResolverContexts,
               bin_trajectories: bool,
               jac_steering_mode: bool) -> Self {
        Self {
            coordinator,
            ik_solver,
            jac_steering,
            validity_checker,
            propagator,
            grasp_evaluator,
            saved_trajectories,
            arm_states,
            examination_profiles: ExaminationProfileTable::standard(),
            contexts,
            bin_trajectories,
            jac_steering_mode
        }
    }

    /// Dispatches the query to its maneuver handler.
    pub fn resolve_query(&mut self, query: &mut TaskQuery) -> Result<(), BinpickError> {
        binpick_print(&format!("@TASK_RESOLVER -> Current Task: {}", query.stage), PrintMode::Println, PrintColor::Magenta, false);
        query.found_solution = match query.stage {
            TaskStage::Move => { self.do_move(query)? }
            TaskStage::MoveAndDetect => { self.move_and_detect(query, false)? }
            TaskStage::MoveAndDetectTote => { self.move_and_detect(query, true)? }
            TaskStage::ThreeStageTrajectorySecond => { self.move_and_detect_staged(query, 0.10)? }
            TaskStage::ThreeStageTrajectoryThird => { self.move_and_detect_staged(query, -0.10)? }
            TaskStage::PerformGrasp => { self.grasp_and_retrieve(query, -0.025)? }
            TaskStage::RetryGrasp => { self.grasp_and_retrieve(query, -0.03)? }
            TaskStage::RemoveFromTote => { self.remove_from_tote(query)? }
            TaskStage::MoveToOrderBin => { self.move_to_order_bin(query)? }
            TaskStage::MoveToOtherBin => { self.move_to_other_bin(query)? }
            TaskStage::AdjustEndEffector => { self.adjust_end_effector(query)? }
            TaskStage::MoveOutsideBin => {
                let offset = self.retract_offset_for_hand(&query.hand);
                self.move_relative_to_gripper(query, offset)?
            }
            TaskStage::PlaceInsideBin => { self.place_inside_bin(query)? }
            TaskStage::Lift => {
                let offset = SE3Pose::new(0.0, 0.0, LIFT_OFFSET, 0.0, 0.0, 0.0, 1.0);
                self.move_relative_to_gripper(query, offset)?
            }
            TaskStage::ExecuteSavedTrajectory => { self.execute_saved_trajectory(query) }
        };
        if query.found_solution {
            binpick_print(&format!("Task {} resolved successfully", query.stage), PrintMode::Println, PrintColor::Green, false);
        } else {
            binpick_print(&format!("Task {} failed to resolve", query.stage), PrintMode::Println, PrintColor::Red, false);
        }
        return Ok(());
    }

    /// Dual-arm home repositioning.  Whichever arm differs from its home
    /// configuration by more than epsilon along any joint is planned first;
    /// the other arm's start state is then updated to reflect the first arm's
    /// completed motion, since one arm's motion changes the collision
    /// constraints relevant to the other.  Both sub-plans must succeed.
    fn do_move(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let left_state = self.arm_states.current_state(&self.contexts.left);
        let right_state = self.arm_states.current_state(&self.contexts.right);
        let left_dim = left_state.len();
        let right_dim = right_state.len();

        if query.goal_state.len() != left_dim + right_dim {
            return Err(BinpickError::new_precondition_violation(&format!("move goal state has {} entries, expected {}", query.goal_state.len(), left_dim + right_dim), file!(), line!()));
        }
        let left_goal = DVector::from_vec(query.goal_state[0..left_dim].to_vec());
        let right_goal = DVector::from_vec(query.goal_state[left_dim..].to_vec());

        let mut plan_for_left_first = false;
        for i in 0..left_dim.min(LEFT_ARM_HOME.len()) {
            if (LEFT_ARM_HOME[i] - left_state[i]).abs() > HOME_DIFFERENCE_EPSILON {
                plan_for_left_first = true;
                break;
            }
        }

        query.move_plan.clear();
        let (first, second) = if plan_for_left_first {
            binpick_print("Planning for Left hand and then for Right", PrintMode::Println, PrintColor::Cyan, false);
            ((left_state.clone(), left_goal.clone(), 0), (right_state.clone(), right_goal.clone(), left_dim))
        } else {
            binpick_print("Planning for Right hand and then for Left", PrintMode::Println, PrintColor::Cyan, false);
            ((right_state.clone(), right_goal.clone(), left_dim), (left_state.clone(), left_goal.clone(), 0))
        };

        // Both sub-plans run in the full dual-arm space so the second arm's
        // start state carries the first arm's goal.
        let mut full_start = DVector::zeros(left_dim + right_dim);
        full_start.rows_mut(0, left_dim).copy_from(&left_state);
        full_start.rows_mut(left_dim, right_dim).copy_from(&right_state);

        let mut full_goal_first = full_start.clone();
        full_goal_first.rows_mut(first.2, first.0.len()).copy_from(&first.1);

        match self.plan_transit(&full_start, &full_goal_first)? {
            Some(mut plan) => {
                query.move_plan.append(&mut plan);
            }
            None => {
                query.move_plan.clear();
                return Ok(false);
            }
        }

        let mut full_goal_second = full_goal_first.clone();
        full_goal_second.rows_mut(second.2, second.0.len()).copy_from(&second.1);

        match self.plan_transit(&full_goal_first, &full_goal_second)? {
            Some(mut plan) => {
                query.move_plan.append(&mut plan);
                return Ok(true);
            }
            None => {
                query.move_plan.clear();
                return Ok(false);
            }
        }
    }

    /// Camera-viewing maneuver near a bin (or the tote): look up the static
    /// examination profile, apply the per-bin/per-hand corrective offsets,
    /// find an IK solution within the seed budget (or steer directly in
    /// Jacobian mode), and plan to the resulting configuration.
    fn move_and_detect(&mut self, query: &mut TaskQuery, tote: bool) -> Result<bool, BinpickError> {
        let context = self.contexts.camera_for_hand(&query.hand);
        let bin = if tote { 'T' } else { query.bin };
        let profile = self.examination_profiles.profile(bin)?;

        let gripper_config = if tote {
            SE3Pose::new_from_parts(profile.focus.clone(), profile.base_viewpoint.clone())
        } else {
            let bin_a_offset = if query.hand == "left" && (query.bin == 'A' || query.bin == 'J') { 0.08 } else { 0.0 };
            let mut focus = profile.focus.clone();
            focus.x += FIRST_STAGE_OFFSET - bin_a_offset;
            focus.y += RGB_CAM_OFFSET + 0.10;
            SE3Pose::new_from_parts(focus, profile.base_viewpoint.clone())
        };

        let initial_state = self.arm_states.current_state(&context);

        if self.jac_steering_mode {
            return Ok(self.steer_into_buffer(query, &context, &initial_state, &gripper_config));
        }

        let result_state = match self.ik_with_retries(&context, &gripper_config) {
            Some(s) => { s }
            None => { return Ok(false); }
        };
        let result_state = self.zero_redundant_axes(result_state, &query.hand);

        match self.plan_transit(&initial_state, &result_state)? {
            Some(plan) => {
                query.move_gripper_to_bin = plan;
                return Ok(true);
            }
            None => { return Ok(false); }
        }
    }

    /// Second/third sensing stage: pure Jacobian steering toward the profile
    /// viewpoint with the stage-specific lateral offset.
    fn move_and_detect_staged(&mut self, query: &mut TaskQuery, y_offset: f64) -> Result<bool, BinpickError> {
        let context = self.contexts.camera_jac_for_hand(&query.hand);
        let profile = self.examination_profiles.profile(query.bin)?;

        let mut focus = profile.focus.clone();
        focus.x += FIRST_STAGE_OFFSET;
        focus.y += RGB_CAM_OFFSET + y_offset;
        let gripper_config = SE3Pose::new_from_parts(focus, profile.base_viewpoint.clone());

        let initial_state = self.arm_states.current_state(&context);
        return Ok(self.steer_into_buffer(query, &context, &initial_state, &gripper_config));
    }

    /// Grasp-and-retrieve: pick the target object and move the grasped arm to
    /// its order-bin configuration, retracting along a small negative local-z
    /// offset.  On success the plan is validated against the world model as a
    /// consistency check and written into the query's retrieval buffer.
    fn grasp_and_retrieve(&mut self, query: &mut TaskQuery, retract_z: f64) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let object = self.required_object(query)?;
        let object_pose = SE3Pose::new_from_vec(&query.object_state)?;
        let retract_config = SE3Pose::new(0.0, 0.0, retract_z, 0.0, 0.0, 0.0, 1.0);

        let initial_state = self.arm_states.current_state(&context);
        let final_state = self.order_bin_state_for_hand(&query.hand)?;

        let mut candidates = self.grasp_evaluator.evaluate(&object, &object_pose, &retract_config, GraspEvaluationMode::Greedy);
        for candidate in candidates.iter_mut() {
            candidate.target_grasped_state = final_state.clone();
        }

        let mut manipulation_query = ManipulationQuery::new(initial_state.clone());
        manipulation_query.setup_pick_and_move(GraspEvaluationMode::Greedy, &object, retract_config, initial_state.clone(), final_state);
        manipulation_query.path_quality = PathQuality::BestPath;
        manipulation_query.clear();

        let outputs = self.coordinator.resolve(&mut manipulation_query, &candidates)?;
        if !manipulation_query.found_path {
            return Ok(false);
        }

        let output = &outputs[0];
        let path = self.propagator.propagate(&initial_state, &output.plan);
        let valid = self.validity_checker.is_valid(&path);
        binpick_print(&format!("Checking validity of the computed plan: {}", valid), PrintMode::Println, PrintColor::Green, false);

        query.retrieve_object = output.plan.clone();
        query.reaching_point = output.reaching_point;
        query.retracting_point = output.retracting_point;
        return Ok(true);
    }

    /// Retrieve an item already held over the tote and present it to the head
    /// camera.  The presentation configuration is found by IK against a fixed
    /// pose; the torso joint is zeroed so the presentation does not twist the
    /// base.
    fn remove_from_tote(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let object = self.required_object(query)?;
        let object_pose = SE3Pose::new_from_vec(&query.object_state)?;
        let retract_config = self.retract_offset_for_hand(&query.hand);

        let camera_config = if query.hand.contains("left") {
            SE3Pose::new(0.5, 0.0, 1.4, 0.70711, 0.0, 0.0, 0.70711)
        } else if query.hand.contains("right") {
            SE3Pose::new(0.5, 0.0, 1.4, -0.70711, 0.0, 0.0, 0.70711)
        } else {
            return Err(BinpickError::new_precondition_violation(&format!("neither left nor right detected in context name: {}", query.hand), file!(), line!()));
        };

        let initial_state = self.arm_states.current_state(&context);
        let mut final_state = match self.ik_with_retries(&context, &camera_config) {
            Some(s) => { s }
            None => { return Ok(false); }
        };
        // Keep the torso still while presenting to the camera.
        final_state[0] = 0.0;

        let mut candidates = self.grasp_evaluator.evaluate(&object, &object_pose, &retract_config, GraspEvaluationMode::Greedy);
        for candidate in candidates.iter_mut() {
            candidate.target_grasped_state = final_state.clone();
        }

        let mut manipulation_query = ManipulationQuery::new(initial_state.clone());
        manipulation_query.setup_pick_and_move(GraspEvaluationMode::Greedy, &object, retract_config, initial_state, final_state);
        manipulation_query.clear();

        self.coordinator.resolve(&mut manipulation_query, &candidates)?;
        if !manipulation_query.found_path {
            return Ok(false);
        }
        query.retrieve_object = manipulation_query.plan.clone();
        return Ok(true);
    }

    /// Plain transit of the active arm to its order-bin configuration; the
    /// grasp is released by the controller at the end of the motion.
    fn move_to_order_bin(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let initial_state = self.arm_states.current_state(&context);
        let final_state = self.order_bin_state_for_hand(&query.hand)?;

        match self.plan_transit(&initial_state, &final_state)? {
            Some(plan) => {
                query.move_to_order_bin = plan;
                return Ok(true);
            }
            None => { return Ok(false); }
        }
    }

    /// Full pick-and-place of the target object toward its requested final
    /// pose (used to clear blocking items into another bin).
    fn move_to_other_bin(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let object = self.required_object(query)?;
        let object_pose = SE3Pose::new_from_vec(&query.object_state)?;
        let final_object_pose = SE3Pose::new_from_vec(&query.final_object_state)?;
        let retract_config = self.retract_offset_for_hand(&query.hand);

        let initial_state = self.arm_states.current_state(&context);
        let candidates = self.grasp_evaluator.evaluate_for_placement(&object, &object_pose, &final_object_pose, &retract_config, GraspEvaluationMode::Greedy);

        let mut manipulation_query = ManipulationQuery::new(initial_state.clone());
        manipulation_query.setup_pick_and_move(GraspEvaluationMode::Greedy, &object, retract_config, initial_state, self.coordinator.safe_state().clone());
        manipulation_query.clear();

        self.coordinator.resolve(&mut manipulation_query, &candidates)?;
        if !manipulation_query.found_path {
            return Ok(false);
        }
        query.retrieve_object = manipulation_query.plan.clone();
        return Ok(true);
    }

    /// Re-grasp correction: reach to a fresh pre-grasp state for the current
    /// object without a transfer phase.
    fn adjust_end_effector(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let object = self.required_object(query)?;
        let object_pose = SE3Pose::new_from_vec(&query.object_state)?;
        let retract_config = self.retract_offset_for_hand(&query.hand);

        let initial_state = self.arm_states.current_state(&context);
        let candidates = self.grasp_evaluator.evaluate(&object, &object_pose, &retract_config, GraspEvaluationMode::Greedy);

        for candidate in &candidates {
            if let Some(plan) = self.plan_transit(&initial_state, &candidate.ungrasped_state)? {
                query.retrieve_object = plan;
                return Ok(true);
            }
        }
        return Ok(false);
    }

    /// Places the held object inside the bin at its requested final pose by a
    /// grasped-motion query toward each placement candidate.
    fn place_inside_bin(&mut self, query: &mut TaskQuery) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let object = self.required_object(query)?;
        let object_pose = SE3Pose::new_from_vec(&query.object_state)?;
        let final_object_pose = SE3Pose::new_from_vec(&query.final_object_state)?;
        let retract_config = self.retract_offset_for_hand(&query.hand);

        let initial_state = self.arm_states.current_state(&context);
        let candidates = self.grasp_evaluator.evaluate_for_placement(&object, &object_pose, &final_object_pose, &retract_config, GraspEvaluationMode::Greedy);

        for candidate in &candidates {
            let mut manipulation_query = ManipulationQuery::new(initial_state.clone());
            manipulation_query.setup_move(initial_state.clone(), candidate.target_grasped_state.clone());
            manipulation_query.mode = ManipulationMode::Transfer;
            manipulation_query.clear();
            self.coordinator.resolve(&mut manipulation_query, &vec![])?;
            if manipulation_query.found_path {
                query.retrieve_object = manipulation_query.plan.clone();
                return Ok(true);
            }
        }
        return Ok(false);
    }

    /// Short end-effector-relative motion: the offset is expressed in the
    /// gripper's local frame at its current pose.  Serves both the
    /// move-outside-bin withdrawal and the lift recovery hop.
    fn move_relative_to_gripper(&mut self, query: &mut TaskQuery, local_offset: SE3Pose) -> Result<bool, BinpickError> {
        let context = self.contexts.for_hand(&query.hand);
        let initial_state = self.arm_states.current_state(&context);
        let current_ee = self.arm_states.forward_kinematics(&context, &initial_state);
        let target = current_ee.applied_local_offset(&local_offset);

        if self.jac_steering_mode {
            return match self.jac_steering.steer(&initial_state, &target) {
                Some(plan) => {
                    query.move_plan = plan;
                    Ok(true)
                }
                None => { Ok(false) }
            }
        }

        let result_state = match self.ik_with_retries(&context, &target) {
            Some(s) => { s }
            None => { return Ok(false); }
        };
        match self.plan_transit(&initial_state, &result_state)? {
            Some(plan) => {
                query.move_plan = plan;
                return Ok(true);
            }
            None => { return Ok(false); }
        }
    }

    /// Looks up a pre-recorded trajectory by its key.  A missing key is an
    /// ordinary failure; the caller decides whether to fall back.
    fn execute_saved_trajectory(&mut self, query: &mut TaskQuery) -> bool {
        return match self.saved_trajectories.lookup(&query.saved_plan_path) {
            Some(plan) => {
                query.move_plan = plan;
                true
            }
            None => {
                binpick_print(&format!("No saved trajectory under key {}", query.saved_plan_path), PrintMode::Println, PrintColor::Red, false);
                false
            }
        }
    }

    // -------- shared helpers --------

    fn plan_transit(&mut self, start: &DVector<f64>, goal: &DVector<f64>) -> Result<Option<crate::task_modules::plan::Plan>, BinpickError> {
        let mut manipulation_query = ManipulationQuery::new(start.clone());
        manipulation_query.setup_move(start.clone(), goal.clone());
        manipulation_query.clear();
        self.coordinator.resolve(&mut manipulation_query, &vec![])?;
        return if manipulation_query.found_path { Ok(Some(manipulation_query.plan)) } else { Ok(None) }
    }

    /// Runs the IK retry loop: the first attempt seeds from the current
    /// state, every following attempt from a fresh uniform sample, up to the
    /// seed budget.
    fn ik_with_retries(&self, context: &str, target: &SE3Pose) -> Option<DVector<f64>> {
        let mut seed_state = self.arm_states.current_state(context);
        let bounds = self.arm_states.seed_bounds(context);
        for i in 0..MAX_IK_TRIES {
            if let Some(result) = self.ik_solver.ik(&seed_state, target) {
                return Some(result);
            }
            binpick_print(&format!("IK seed retry, i = {}", i), PrintMode::Println, PrintColor::Yellow, false);
            seed_state = DVector::from_vec(SimpleSamplers::uniform_samples(&bounds));
        }
        return None;
    }

    fn steer_into_buffer(&mut self, query: &mut TaskQuery, _context: &str, initial_state: &DVector<f64>, target: &SE3Pose) -> bool {
        return match self.jac_steering.steer(initial_state, target) {
            Some(plan) => {
                query.move_gripper_to_bin = plan;
                true
            }
            None => { false }
        }
    }

    fn zero_redundant_axes(&self, mut state: DVector<f64>, hand: &str) -> DVector<f64> {
        if self.bin_trajectories {
            let last_index = state.len();
            if hand == "left" {
                state[last_index - 2] = 0.0;
                state[last_index - 3] = 0.0;
            } else {
                state[last_index - 2] = 0.0;
            }
        }
        state
    }

    fn order_bin_state_for_hand(&self, hand: &str) -> Result<DVector<f64>, BinpickError> {
        return if hand.contains("left") {
            Ok(DVector::from_vec(LEFT_ARM_ORDER_BIN.to_vec()))
        } else if hand.contains("right") {
            Ok(DVector::from_vec(RIGHT_ARM_ORDER_BIN.to_vec()))
        } else {
            Err(BinpickError::new_precondition_violation(&format!("neither left nor right detected in context name: {}", hand), file!(), line!()))
        }
    }

    fn retract_offset_for_hand(&self, hand: &str) -> SE3Pose {
        let z = if hand == "left" { -0.03 } else { -0.07 };
        SE3Pose::new(0.0, 0.0, z, 0.0, 0.0, 0.0, 1.0)
    }

    fn required_object(&self, query: &TaskQuery) -> Result<String, BinpickError> {
        return match &query.object {
            Some(o) => { Ok(o.clone()) }
            None => { Err(BinpickError::new_precondition_violation(&format!("task stage {} requires a target object", query.stage), file!(), line!())) }
        }
    }
}
impl TaskPlanningService for TaskQueryResolver {
    fn resolve(&mut self, query: &mut TaskQuery) -> Result<(), BinpickError> {
        self.resolve_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;
    use crate::planning_modules::planner_services::{GraspCandidate, MotionPlanner, SavedTrajectoryStore};
    use crate::task_modules::plan::{ControlStep, Plan, StatePath};

    fn step() -> ControlStep {
        ControlStep::new(DVector::zeros(16), 0.1)
    }

    /// Transit planner that always succeeds with a 2-step plan and records
    /// every (start, goal) pair it was asked to solve.
    struct RecordingPlanner {
        calls: Rc<RefCell<Vec<(DVector<f64>, DVector<f64>)>>>,
        succeed: bool
    }
    impl MotionPlanner for RecordingPlanner {
        fn resolve_query(&mut self, query: &mut ManipulationQuery) -> Result<(), BinpickError> {
            self.calls.borrow_mut().push((query.start_state.clone(), query.goal_state.clone().unwrap()));
            if self.succeed {
                query.plan.push(step());
                query.plan.push(step());
                query.found_path = true;
                query.solution_cost = 2.0;
            }
            Ok(())
        }
    }

    struct NeverIk;
    impl InverseKinematicsSolver for NeverIk {
        fn ik(&self, _seed_state: &DVector<f64>, _target: &SE3Pose) -> Option<DVector<f64>> {
            None
        }
    }
    struct AlwaysIk;
    impl InverseKinematicsSolver for AlwaysIk {
        fn ik(&self, _seed_state: &DVector<f64>, _target: &SE3Pose) -> Option<DVector<f64>> {
            Some(DVector::zeros(16))
        }
    }
    struct NoSteering;
    impl JacobianSteering for NoSteering {
        fn steer(&self, _start_state: &DVector<f64>, _target: &SE3Pose) -> Option<Plan> {
            None
        }
    }
    struct AlwaysValid;
    impl ValidityChecker for AlwaysValid {
        fn is_valid(&self, _path: &StatePath) -> bool {
            true
        }
    }
    struct NoopPropagator;
    impl PlanPropagator for NoopPropagator {
        fn propagate(&self, start_state: &DVector<f64>, _plan: &Plan) -> StatePath {
            let mut path = StatePath::new_empty();
            path.push(start_state.clone());
            path
        }
    }
    struct OneCandidate;
    impl GraspEvaluator for OneCandidate {
        fn evaluate(&self, _object: &str, _object_pose: &SE3Pose, _retract_config: &SE3Pose, _mode: GraspEvaluationMode) -> Vec<GraspCandidate> {
            vec![GraspCandidate {
                ungrasped_state: DVector::zeros(8),
                grasped_state: DVector::zeros(8),
                target_grasped_state: DVector::zeros(8),
                release_state: DVector::zeros(8)
            }]
        }
        fn evaluate_for_placement(&self, object: &str, object_pose: &SE3Pose, _final_object_pose: &SE3Pose, retract_config: &SE3Pose, mode: GraspEvaluationMode) -> Vec<GraspCandidate> {
            self.evaluate(object, object_pose, retract_config, mode)
        }
    }
    struct EmptyStore;
    impl SavedTrajectoryStore for EmptyStore {
        fn lookup(&self, _key: &str) -> Option<Plan> {
            None
        }
    }
    struct KeyedStore {
        plans: BTreeMap<String, Plan>
    }
    impl SavedTrajectoryStore for KeyedStore {
        fn lookup(&self, key: &str) -> Option<Plan> {
            self.plans.get(key).cloned()
        }
    }

    /// Arm-state provider with the left arm displaced from home.
    struct TestArms {
        left_displaced: bool
    }
    impl ArmStateProvider for TestArms {
        fn current_state(&self, context: &str) -> DVector<f64> {
            if context.contains("left") {
                let mut s = DVector::from_vec(LEFT_ARM_HOME.to_vec());
                if self.left_displaced {
                    s[2] += 0.5;
                }
                return s;
            }
            DVector::from_vec(RIGHT_ARM_HOME.to_vec())
        }
        fn seed_bounds(&self, _context: &str) -> Vec<(f64, f64)> {
            vec![(-3.14, 3.14); 16]
        }
        fn forward_kinematics(&self, _context: &str, _state: &DVector<f64>) -> SE3Pose {
            SE3Pose::new_identity()
        }
    }

    fn resolver_with(planner_calls: Rc<RefCell<Vec<(DVector<f64>, DVector<f64>)>>>, succeed: bool, ik: Box<dyn InverseKinematicsSolver>, left_displaced: bool) -> TaskQueryResolver {
        let coordinator = PhaseCoordinator::new(
            Box::new(RecordingPlanner { calls: planner_calls.clone(), succeed }),
            Box::new(RecordingPlanner { calls: planner_calls.clone(), succeed }),
            Box::new(RecordingPlanner { calls: planner_calls, succeed }),
            DVector::zeros(8)
        );
        TaskQueryResolver::new(
            coordinator,
            ik,
            Box::new(NoSteering),
            Box::new(AlwaysValid),
            Box::new(NoopPropagator),
            Box::new(OneCandidate),
            Box::new(EmptyStore),
            Box::new(TestArms { left_displaced }),
            ResolverContexts::standard(),
            false,
            false
        )
    }

    #[test]
    fn displaced_left_arm_is_planned_first() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls.clone(), true, Box::new(AlwaysIk), true);

        let mut goal = LEFT_ARM_HOME.to_vec();
        goal.extend_from_slice(&RIGHT_ARM_HOME);
        let mut query = TaskQuery::new_move(goal);
        resolver.resolve_query(&mut query).unwrap();
        assert!(query.found_solution);
        assert_eq!(query.move_plan.len(), 4);

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        // First call moves the displaced left arm home while the right arm
        // holds position.
        let (first_start, first_goal) = &calls[0];
        assert!((first_start[2] - (LEFT_ARM_HOME[2] + 0.5)).abs() < 1e-12);
        assert!((first_goal[2] - LEFT_ARM_HOME[2]).abs() < 1e-12);
        // Second call starts from the first arm's goal.
        let (second_start, _) = &calls[1];
        assert_eq!(second_start, first_goal);
    }

    #[test]
    fn right_arm_first_when_left_is_home() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls.clone(), true, Box::new(AlwaysIk), false);

        let mut goal = LEFT_ARM_HOME.to_vec();
        let mut right_goal = RIGHT_ARM_HOME.to_vec();
        right_goal[1] += 0.3;
        goal.extend_from_slice(&right_goal);
        let mut query = TaskQuery::new_move(goal);
        resolver.resolve_query(&mut query).unwrap();
        assert!(query.found_solution);

        let calls = calls.borrow();
        // The first planned motion changes a right-arm joint (index 8 + 1).
        let (first_start, first_goal) = &calls[0];
        assert!((first_goal[9] - first_start[9]).abs() > 0.2);
    }

    #[test]
    fn partial_dual_arm_failure_is_total_failure() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls, false, Box::new(AlwaysIk), true);

        let mut goal = LEFT_ARM_HOME.to_vec();
        goal.extend_from_slice(&RIGHT_ARM_HOME);
        let mut query = TaskQuery::new_move(goal);
        resolver.resolve_query(&mut query).unwrap();
        assert!(!query.found_solution);
        assert!(query.move_plan.is_empty());
    }

    #[test]
    fn detect_fails_after_ik_budget_exhausted() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls.clone(), true, Box::new(NeverIk), false);

        let mut query = TaskQuery::new_detect(TaskStage::MoveAndDetect, "left", 'B');
        resolver.resolve_query(&mut query).unwrap();
        assert!(!query.found_solution);
        // The maneuver never reached the planner.
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn grasp_and_retrieve_sets_split_indices() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls, true, Box::new(AlwaysIk), false);

        let mut query = TaskQuery::new_grasp(TaskStage::PerformGrasp, "right", 'D', "dove_beauty_bar", vec![0.8, 0.0, 1.3, 0.0, 0.0, 0.0, 1.0]);
        resolver.resolve_query(&mut query).unwrap();
        assert!(query.found_solution);
        // Three 2-step phases.
        assert_eq!(query.retrieve_object.len(), 6);
        assert_eq!(query.retracting_point, 2 + 2 + (2 - 0 - 1));
    }

    #[test]
    fn saved_trajectory_misses_are_ordinary_failures() {
        let calls = Rc::new(RefCell::new(vec![]));
        let mut resolver = resolver_with(calls, true, Box::new(AlwaysIk), false);
        let mut query = TaskQuery::new_saved_trajectory("left", "three_stage_traj_left/left_A_0");
        resolver.resolve_query(&mut query).unwrap();
        assert!(!query.found_solution);
    }

    #[test]
    fn saved_trajectory_hits_fill_the_move_plan() {
        let mut plans = BTreeMap::new();
        let mut plan = Plan::new_empty();
        plan.push(step());
        plans.insert("three_stage_traj_left/left_A_0".to_string(), plan);

        let coordinator = PhaseCoordinator::new(
            Box::new(RecordingPlanner { calls: Rc::new(RefCell::new(vec![])), succeed: true }),
            Box::new(RecordingPlanner { calls: Rc::new(RefCell::new(vec![])), succeed: true }),
            Box::new(RecordingPlanner { calls: Rc::new(RefCell::new(vec![])), succeed: true }),
            DVector::zeros(8)
        );
        let mut resolver = TaskQueryResolver::new(
            coordinator,
            Box::new(AlwaysIk),
            Box::new(NoSteering),
            Box::new(AlwaysValid),
            Box::new(NoopPropagator),
            Box::new(OneCandidate),
            Box::new(KeyedStore { plans }),
            Box::new(TestArms { left_displaced: false }),
            ResolverContexts::standard(),
            false,
            false
        );
        let mut query = TaskQuery::new_saved_trajectory("left", "three_stage_traj_left/left_A_0");
        resolver.resolve_query(&mut query).unwrap();
        assert!(query.found_solution);
        assert_eq!(query.move_plan.len(), 1);
    }
}
