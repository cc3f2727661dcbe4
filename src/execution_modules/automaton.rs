use std::path::PathBuf;
use nalgebra::DVector;
use strum_macros::{Display, EnumIter};
use crate::execution_modules::collision_resolution::CollisionOffsetResolver;
use crate::planning_modules::planner_services::{bin_to_bin_key, three_stage_key, ArmStateProvider, BinCollisionSensor, SensingService, TaskPlanningService, TrajectoryController};
use crate::task_modules::plan::{ControlStep, Plan};
use crate::task_modules::task_query::{TaskQuery, TaskStage};
use crate::task_modules::work_order::{ObjectPriorityList, PickTaskRecord};
use crate::utils::utils_console::{binpick_print, binpick_status, PrintColor, PrintMode};
use crate::utils::utils_errors::BinpickError;
use crate::utils::utils_se3::SE3Pose;
use crate::utils::utils_traits::SaveAndLoadable;

/// Grasp-correction retries allowed before escalating to the lift recovery.
pub const NR_GRASPING_FAILURES_CAP: u32 = 2;
/// Replans allowed after pose-change interrupts before stopping the robot.
pub const NR_EXECUTION_FAILURES_CAP: u32 = 3;
/// Consecutive sensing failures tolerated before falling back to home.
pub const SENSING_RETRY_CAP: u32 = 3;
/// Joint-space L2 distance under which the robot counts as being home.
pub const HOME_POSITION_TOLERANCE: f64 = 0.06;
/// Fraction of the reaching plan that must have elapsed before the servoing
/// interrupt is considered.
pub const SERVOING_CHECK_FRACTION: f64 = 0.2;
/// Shaved off the final step of regrasp and lift plans before execution.
pub const EXECUTION_END_TRIM: f64 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter)]
pub enum AutomatonState {
    Start,
    ShelfDetection,
    TargetSelection,
    MoveAndSense,
    MoveAndSenseTwo,
    MoveAndSenseThree,
    PoseEstimation,
    GraspPlanning,
    BlockingItemSelection,
    ExecuteReaching,
    EvaluateGrasp,
    RetryGrasp,
    ExecuteRegrasp,
    AdjustEndEffector,
    ExecuteGrasp,
    Lift,
    ExecuteLift,
    DisengageEndEffector,
    PlanForBlockingItem,
    PlanForTargetItem,
    ExecutePlacing,
    PlanForRetraction,
    StopRobot,
    TurnOffSensing,
    MoveToHome,
    End
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Running,
    Finished
}

/// Reaching/grasping/retracting segments of a resolved grasp plan, split at
/// the reach/retract indices the planning side reports.
#[derive(Clone, Debug, Default)]
struct GraspPlanSegments {
    reaching: Plan,
    grasping: Plan,
    retracting: Plan
}
impl GraspPlanSegments {
    fn from_grasp_query(query: &TaskQuery) -> Self {
        let steps = query.retrieve_object.steps();
        let reach_end = query.reaching_point.max(0).min(steps.len() as i64) as usize;
        let retract_start = query.retracting_point.max(reach_end as i64).min(steps.len() as i64) as usize;

        let mut reaching = Plan::new_empty();
        let mut grasping = Plan::new_empty();
        let mut retracting = Plan::new_empty();
        for (i, step) in steps.iter().enumerate() {
            if i < reach_end {
                reaching.push(step.clone());
            } else if i < retract_start {
                grasping.push(step.clone());
            } else {
                retracting.push(step.clone());
            }
        }
        Self { reaching, grasping, retracting }
    }
}

/// Host-level configuration of the automaton.
#[derive(Clone, Debug)]
pub struct AutomatonConfig {
    /// Full dual-arm home joint configuration.
    pub home_position: Vec<f64>,
    /// Planning-context name of the full dual-arm state space.
    pub full_arm_context: String,
    /// Clear blocking items to other bins instead of failing outright.
    pub rearrangement_enabled: bool,
    /// Where to rewrite the task record after each successful placement.
    /// `None` disables persistence.
    pub output_record_path: Option<PathBuf>
}

/// The frame-polled execution automaton driving the pick-and-place cycle:
/// target selection, staged sensing approaches, pose estimation, grasp
/// planning, execution with bounded retries, lift recovery, placement into
/// the tote, and a uniform recovery path back to home.
///
/// The automaton advances exactly one step per `frame` call.  While a
/// trajectory is executing, frames only advance execution-time bookkeeping
/// and check the single servoing interrupt; state transitions resume once
/// the trajectory completes or is cancelled.
pub struct PickAutomaton {
    state: AutomatonState,
    config: AutomatonConfig,

    planner: Box<dyn TaskPlanningService>,
    controller: Box<dyn TrajectoryController>,
    sensing: Box<dyn SensingService>,
    collision_sensor: Box<dyn BinCollisionSensor>,
    arm_states: Box<dyn ArmStateProvider>,
    collision_resolver: CollisionOffsetResolver,

    record: PickTaskRecord,
    priorities: ObjectPriorityList,

    current_bin: char,
    last_bin: char,
    current_target: String,
    current_arm: String,
    current_order_index: usize,
    target_object_pose: Option<SE3Pose>,

    current_result: GraspPlanSegments,
    regrasp_plan: Plan,
    lift_plan: Plan,

    executing_trajectory: bool,
    reaching_in_flight: bool,
    execution_time: f64,
    plan_duration: f64,

    nr_grasping_failures: u32,
    nr_execution_failures: u32,
    sensing_counter: u32,

    currently_in_home_position: bool,
    shelf_detection_done: bool,
    move_to_next_bin: bool
}
impl PickAutomaton {
    pub fn new(config: AutomatonConfig,
               planner: Box<dyn TaskPlanningService>,
               controller: Box<dyn TrajectoryController>,
               sensing: Box<dyn SensingService>,
               collision_sensor: Box<dyn BinCollisionSensor>,
               arm_states: Box<dyn ArmStateProvider>,
               record: PickTaskRecord,
               priorities: ObjectPriorityList) -> Self {
        Self {
            state: AutomatonState::Start,
            config,
            planner,
            controller,
            sensing,
            collision_sensor,
            arm_states,
            collision_resolver: CollisionOffsetResolver::new_default(),
            record,
            priorities,
            current_bin: 'A',
            last_bin: 'A',
            current_target: String::new(),
            current_arm: String::new(),
            current_order_index: 0,
            target_object_pose: None,
            current_result: GraspPlanSegments::default(),
            regrasp_plan: Plan::new_empty(),
            lift_plan: Plan::new_empty(),
            executing_trajectory: false,
            reaching_in_flight: false,
            execution_time: 0.0,
            plan_duration: 0.0,
            nr_grasping_failures: 0,
            nr_execution_failures: 0,
            sensing_counter: 0,
            currently_in_home_position: true,
            shelf_detection_done: false,
            move_to_next_bin: false
        }
    }

    pub fn state(&self) -> AutomatonState {
        self.state
    }
    pub fn record(&self) -> &PickTaskRecord {
        &self.record
    }
    pub fn is_executing_trajectory(&self) -> bool {
        self.executing_trajectory
    }

    /// Advances the automaton by one simulation/control frame.
    pub fn frame(&mut self, sim_step: f64) -> Result<FrameOutcome, BinpickError> {
        if self.executing_trajectory {
            self.execution_frame(sim_step);
            return Ok(FrameOutcome::Running);
        }

        binpick_print(&format!("Current State: {}", self.state), PrintMode::Println, PrintColor::Cyan, false);
        match self.state {
            AutomatonState::Start => { self.on_start(); }
            AutomatonState::ShelfDetection => { self.on_shelf_detection(); }
            AutomatonState::TargetSelection => { self.on_target_selection()?; }
            AutomatonState::MoveAndSense => { self.on_move_and_sense(0, AutomatonState::MoveAndSenseTwo)?; }
            AutomatonState::MoveAndSenseTwo => { self.on_move_and_sense(1, AutomatonState::MoveAndSenseThree)?; }
            AutomatonState::MoveAndSenseThree => { self.on_move_and_sense(2, AutomatonState::PoseEstimation)?; }
            AutomatonState::PoseEstimation => { self.on_pose_estimation()?; }
            AutomatonState::GraspPlanning => { self.on_grasp_planning()?; }
            AutomatonState::BlockingItemSelection => { self.state = AutomatonState::PlanForBlockingItem; }
            AutomatonState::ExecuteReaching => { self.on_execute_reaching(); }
            AutomatonState::EvaluateGrasp => { self.on_evaluate_grasp(); }
            AutomatonState::RetryGrasp => { self.on_retry_grasp()?; }
            AutomatonState::ExecuteRegrasp => { self.on_execute_regrasp(); }
            AutomatonState::AdjustEndEffector => { self.on_adjust_end_effector()?; }
            AutomatonState::ExecuteGrasp => { self.on_execute_grasp(); }
            AutomatonState::Lift => { self.on_lift()?; }
            AutomatonState::ExecuteLift => { self.on_execute_lift(); }
            AutomatonState::DisengageEndEffector => { self.on_disengage_end_effector(); }
            AutomatonState::PlanForBlockingItem => { self.on_plan_for_blocking_item()?; }
            AutomatonState::PlanForTargetItem => { self.on_plan_for_target_item()?; }
            AutomatonState::ExecutePlacing => { self.on_execute_placing()?; }
            AutomatonState::PlanForRetraction => { self.on_plan_for_retraction()?; }
            AutomatonState::StopRobot => {
                self.controller.send_zero_control();
                self.state = AutomatonState::TurnOffSensing;
            }
            AutomatonState::TurnOffSensing => {
                self.sensing.turn_off();
                self.state = AutomatonState::MoveToHome;
            }
            AutomatonState::MoveToHome => { self.on_move_to_home()?; }
            AutomatonState::End => {
                binpick_print("Finished every item!", PrintMode::Println, PrintColor::Green, true);
                return Ok(FrameOutcome::Finished);
            }
        }
        return Ok(FrameOutcome::Running);
    }

    /// While a trajectory runs the automaton only advances its execution
    /// clock; the one exception is the servoing interrupt, which cancels a
    /// reaching motion when the target object's pose has drifted.
    fn execution_frame(&mut self, sim_step: f64) {
        if self.reaching_in_flight
            && self.execution_time > self.plan_duration * SERVOING_CHECK_FRACTION
            && self.sensing.target_pose_changed() {
            self.controller.cancel_goal();
            self.plan_duration = 0.0;
            self.execution_time = 0.0;
            self.executing_trajectory = false;
            self.reaching_in_flight = false;
            if self.nr_execution_failures < NR_EXECUTION_FAILURES_CAP {
                self.nr_execution_failures += 1;
                self.state = AutomatonState::GraspPlanning;
            } else {
                self.state = AutomatonState::StopRobot;
            }
            binpick_print("target object pose changed, will replan", PrintMode::Println, PrintColor::Yellow, false);
            return;
        }
        if self.execution_time < self.plan_duration {
            binpick_status(&format!("Executing Trajectory {:.2}/{:.2}", self.execution_time, self.plan_duration), PrintColor::Cyan);
            self.execution_time += 2.0 * sim_step;
        } else {
            self.plan_duration = 0.0;
            self.execution_time = 0.0;
            self.executing_trajectory = false;
            self.reaching_in_flight = false;
            binpick_print("Trajectory executed", PrintMode::Println, PrintColor::Cyan, false);
        }
    }

    fn on_start(&mut self) {
        let state = self.arm_states.current_state(&self.config.full_arm_context);
        let home = DVector::from_vec(self.config.home_position.clone());
        if state.len() == home.len() {
            let diff_norm = (state - home).norm();
            self.currently_in_home_position = diff_norm <= HOME_POSITION_TOLERANCE;
        }

        if !self.currently_in_home_position {
            self.state = AutomatonState::MoveToHome;
        } else if !self.shelf_detection_done {
            self.state = AutomatonState::ShelfDetection;
        } else {
            self.state = AutomatonState::TargetSelection;
        }
    }

    fn on_shelf_detection(&mut self) {
        let shelf_pose = self.sensing.estimate_shelf_position();
        binpick_print(&format!("Estimated shelf position: {:?}", shelf_pose.position()), PrintMode::Println, PrintColor::Green, false);
        self.shelf_detection_done = true;
        self.state = AutomatonState::TargetSelection;
    }

    fn on_target_selection(&mut self) -> Result<(), BinpickError> {
        self.nr_execution_failures = 0;
        self.nr_grasping_failures = 0;

        match self.priorities.select_target(&self.record.work_order)? {
            Some(selection) => {
                binpick_print(&format!("CurrentBin: {}  CurrentTarget: {}  CurrentArm: {}", selection.bin, selection.item, selection.arm), PrintMode::Println, PrintColor::Green, false);
                self.current_bin = selection.bin;
                self.current_target = selection.item;
                self.current_arm = selection.arm;
                self.current_order_index = selection.order_index;
                self.state = AutomatonState::MoveAndSense;
            }
            None => {
                self.state = AutomatonState::End;
            }
        }
        return Ok(());
    }

    /// Issues one stage of the canned sensing approach (or the bin-to-bin
    /// transition for the second stage).  Advances only if a plan of nonzero
    /// length comes back; otherwise the same stage is retried next frame.
    fn on_move_and_sense(&mut self, stage_index: usize, next: AutomatonState) -> Result<(), BinpickError> {
        let key = if stage_index == 1 && self.move_to_next_bin {
            self.move_to_next_bin = false;
            bin_to_bin_key(&self.current_arm, self.last_bin, self.current_bin)
        } else {
            three_stage_key(&self.current_arm, self.current_bin, stage_index)
        };
        binpick_print(&key, PrintMode::Println, PrintColor::Yellow, false);

        let mut query = TaskQuery::new_saved_trajectory(&self.current_arm, &key);
        self.planner.resolve(&mut query)?;
        if query.found_solution && query.move_plan.len() > 0 {
            binpick_print("Received Plan Successfully...", PrintMode::Println, PrintColor::Cyan, false);
            self.execute_plan(&query.move_plan);
            self.state = next;
        }
        return Ok(());
    }

    fn on_pose_estimation(&mut self) -> Result<(), BinpickError> {
        match self.sensing.update_objects_pose() {
            Ok(poses) => {
                let target_pose = poses.iter().find(|(name, _)| name == &self.current_target).map(|(_, p)| p.clone());
                match target_pose {
                    Some(mut pose) => {
                        self.collision_sensor.apply_pose(&self.current_target, &pose);
                        let resolved = self.collision_resolver.resolve(self.collision_sensor.as_mut(), &self.current_target, self.current_bin, &mut pose)?;
                        if !resolved {
                            binpick_print("target item in collision, could not resolve", PrintMode::Println, PrintColor::Red, false);
                            self.state = AutomatonState::MoveToHome;
                            return Ok(());
                        }
                        self.target_object_pose = Some(pose);
                        self.sensing_counter = 0;
                        if self.config.rearrangement_enabled {
                            self.state = AutomatonState::BlockingItemSelection;
                        } else {
                            self.state = AutomatonState::GraspPlanning;
                        }
                    }
                    None => { self.sensing_failure(); }
                }
            }
            Err(_) => { self.sensing_failure(); }
        }
        return Ok(());
    }

    fn sensing_failure(&mut self) {
        if self.sensing_counter < SENSING_RETRY_CAP {
            binpick_print(&format!("sensing failed, counter: {}", self.sensing_counter), PrintMode::Println, PrintColor::Red, false);
            self.sensing_counter += 1;
            self.state = AutomatonState::PoseEstimation;
        } else {
            binpick_print("Sensing failed, will try next item", PrintMode::Println, PrintColor::Red, false);
            self.sensing_counter = 0;
            self.state = AutomatonState::MoveToHome;
        }
    }

    fn on_grasp_planning(&mut self) -> Result<(), BinpickError> {
        let mut query = self.grasp_query(TaskStage::PerformGrasp)?;
        self.planner.resolve(&mut query)?;

        if query.found_solution {
            self.current_result = GraspPlanSegments::from_grasp_query(&query);
            self.state = AutomatonState::ExecuteReaching;
        } else if self.config.rearrangement_enabled {
            binpick_print("Engaging Rearrangement Mode...", PrintMode::Println, PrintColor::Cyan, false);
            self.state = AutomatonState::BlockingItemSelection;
        } else {
            binpick_print("Grasp Planning Failed...", PrintMode::Println, PrintColor::Cyan, false);
            self.state = AutomatonState::StopRobot;
        }
        return Ok(());
    }

    fn on_execute_reaching(&mut self) {
        let plan = self.current_result.reaching.clone();
        self.execute_plan(&plan);
        self.reaching_in_flight = true;
        self.state = AutomatonState::ExecuteGrasp;
    }

    fn on_execute_grasp(&mut self) {
        let plan = self.current_result.grasping.clone();
        self.execute_plan(&plan);
        self.nr_grasping_failures = 0;
        self.state = AutomatonState::EvaluateGrasp;
    }

    fn on_evaluate_grasp(&mut self) {
        let grasp_success = self.sensing.grasp_succeeded();
        binpick_print(&format!("grasp_success: {}", grasp_success), PrintMode::Println, PrintColor::Green, false);
        if grasp_success {
            if self.nr_grasping_failures > 0 {
                self.state = AutomatonState::Lift;
            } else {
                self.state = AutomatonState::ExecutePlacing;
            }
        } else if self.nr_grasping_failures < NR_GRASPING_FAILURES_CAP {
            self.nr_grasping_failures += 1;
            self.state = AutomatonState::RetryGrasp;
        } else {
            self.state = AutomatonState::Lift;
        }
    }

    fn on_retry_grasp(&mut self) -> Result<(), BinpickError> {
        let mut query = self.grasp_query(TaskStage::RetryGrasp)?;
        self.planner.resolve(&mut query)?;

        if query.found_solution {
            self.regrasp_plan = query.retrieve_object.clone();
            self.state = AutomatonState::ExecuteRegrasp;
        } else if self.nr_grasping_failures > 1 {
            self.state = AutomatonState::Lift;
        } else if self.config.rearrangement_enabled {
            binpick_print("Engaging Rearrangement Mode...", PrintMode::Println, PrintColor::Cyan, false);
            self.state = AutomatonState::BlockingItemSelection;
        } else {
            self.state = AutomatonState::StopRobot;
        }
        return Ok(());
    }

    fn on_execute_regrasp(&mut self) {
        let mut plan = self.regrasp_plan.clone();
        plan.trim_back(EXECUTION_END_TRIM);
        self.execute_plan(&plan);
        self.state = AutomatonState::EvaluateGrasp;
    }

    /// End-effector correction hook.  The adjustment maneuver is issued when
    /// servoing deems the grasp correctable; failure stops the robot.
    fn on_adjust_end_effector(&mut self) -> Result<(), BinpickError> {
        let mut query = self.grasp_query(TaskStage::AdjustEndEffector)?;
        self.planner.resolve(&mut query)?;
        if query.found_solution {
            self.state = AutomatonState::ExecuteGrasp;
        } else {
            self.state = AutomatonState::StopRobot;
        }
        return Ok(());
    }

    fn on_lift(&mut self) -> Result<(), BinpickError> {
        let mut query = self.grasp_query(TaskStage::Lift)?;
        self.planner.resolve(&mut query)?;

        if query.found_solution {
            self.lift_plan = query.move_plan.clone();
            self.state = AutomatonState::ExecuteLift;
        } else {
            binpick_print("Lift planning failed...", PrintMode::Println, PrintColor::Cyan, false);
            self.state = AutomatonState::StopRobot;
        }
        return Ok(());
    }

    fn on_execute_lift(&mut self) {
        let mut plan = self.lift_plan.clone();
        plan.trim_back(EXECUTION_END_TRIM);
        self.execute_plan(&plan);

        let grasp_success = self.sensing.grasp_succeeded();
        if grasp_success {
            if self.nr_grasping_failures > 1 {
                self.state = AutomatonState::Lift;
            } else {
                self.state = AutomatonState::ExecutePlacing;
            }
        } else {
            if self.nr_grasping_failures > 1 {
                self.state = AutomatonState::Lift;
            } else {
                self.state = AutomatonState::DisengageEndEffector;
            }
        }
        self.nr_grasping_failures = 0;
    }

    /// Opens the gripper by a direct control step; no planning involved.
    fn on_disengage_end_effector(&mut self) {
        let mut control = DVector::zeros(20);
        control[16] = 1.0;
        control[17] = 1.0;
        control[18] = 1.0;
        control[19] = 1.0;
        let mut plan = Plan::new_empty();
        plan.push(ControlStep::new(control, 0.1));

        self.controller.convert_and_copy_to_robot_plan(&plan);
        self.controller.set_robot_plan();
        self.state = AutomatonState::MoveToHome;
    }

    fn on_plan_for_blocking_item(&mut self) -> Result<(), BinpickError> {
        let object_state = self.target_pose_vec()?;
        // Clear the blocking item toward the shelf centerline.
        let mut final_state = object_state.clone();
        final_state[1] = 0.0;

        let mut query = TaskQuery::new_place(TaskStage::MoveToOtherBin, &self.current_arm, &self.current_target, final_state);
        query.object_state = object_state;
        self.planner.resolve(&mut query)?;

        if query.found_solution {
            self.current_result = GraspPlanSegments::from_grasp_query(&query);
            self.state = AutomatonState::ExecuteReaching;
        } else {
            self.state = AutomatonState::StopRobot;
        }
        return Ok(());
    }

    fn on_plan_for_target_item(&mut self) -> Result<(), BinpickError> {
        let object_state = self.target_pose_vec()?;
        let mut final_state = object_state.clone();
        final_state[0] = 0.2;
        final_state[1] = 0.0;
        final_state[2] = 0.2;

        let mut query = TaskQuery::new_place(TaskStage::MoveToOrderBin, &self.current_arm, &self.current_target, final_state);
        query.object_state = object_state;
        self.planner.resolve(&mut query)?;

        if query.found_solution {
            self.current_result = GraspPlanSegments::from_grasp_query(&query);
            self.state = AutomatonState::ExecutePlacing;
        } else {
            binpick_print("Cannot find a plan to the tote, disengaging...", PrintMode::Println, PrintColor::Cyan, false);
            self.state = AutomatonState::DisengageEndEffector;
        }
        return Ok(());
    }

    /// Executes the stored retract-to-tote plan and commits the placement:
    /// the work-order entry flips to done, the bin slot is vacated, the item
    /// is appended to the tote, and the record is rewritten to disk.
    fn on_execute_placing(&mut self) -> Result<(), BinpickError> {
        let plan = self.current_result.retracting.clone();
        self.execute_plan(&plan);

        self.record.complete_placement(self.current_order_index)?;
        if let Some(path) = &self.config.output_record_path {
            self.record.save_to_path(path)?;
        }
        self.state = AutomatonState::TurnOffSensing;
        return Ok(());
    }

    /// Withdraws the gripper from the bin after a disengage so the next
    /// sensing pass starts from a clear view.
    fn on_plan_for_retraction(&mut self) -> Result<(), BinpickError> {
        let mut query = TaskQuery::new_detect(TaskStage::MoveAndDetect, &self.current_arm, self.current_bin);
        self.planner.resolve(&mut query)?;

        if query.found_solution && query.move_gripper_to_bin.len() > 0 {
            binpick_print("Received Plan Successfully...", PrintMode::Println, PrintColor::Cyan, false);
            self.execute_plan(&query.move_gripper_to_bin);
            self.state = AutomatonState::PoseEstimation;
        } else {
            self.state = AutomatonState::MoveToHome;
        }
        return Ok(());
    }

    fn on_move_to_home(&mut self) -> Result<(), BinpickError> {
        let mut query = TaskQuery::new_move(self.config.home_position.clone());
        self.planner.resolve(&mut query)?;

        if query.found_solution && query.move_plan.len() > 0 {
            binpick_print("Received Plan Successfully...", PrintMode::Println, PrintColor::Cyan, false);
            self.execute_plan(&query.move_plan);
            self.currently_in_home_position = true;
        } else if query.found_solution {
            binpick_print("Already in queried position", PrintMode::Println, PrintColor::Cyan, false);
            self.currently_in_home_position = true;
        } else {
            binpick_print("Planning failed to provide a plan!", PrintMode::Println, PrintColor::Red, false);
        }
        self.state = AutomatonState::Start;
        return Ok(());
    }

    // -------- shared helpers --------

    fn execute_plan(&mut self, plan: &Plan) {
        self.controller.convert_and_copy_to_robot_plan(plan);
        self.controller.set_robot_plan();
        self.plan_duration = plan.duration();
        self.execution_time = 0.0;
        self.executing_trajectory = true;
        self.currently_in_home_position = false;
        binpick_print(&format!("Executing Plan... {:.2}", self.plan_duration), PrintMode::Println, PrintColor::Cyan, false);
    }

    fn grasp_query(&self, stage: TaskStage) -> Result<TaskQuery, BinpickError> {
        let object_state = self.target_pose_vec()?;
        return Ok(TaskQuery::new_grasp(stage, &self.current_arm, self.current_bin, &self.current_target, object_state));
    }

    fn target_pose_vec(&self) -> Result<Vec<f64>, BinpickError> {
        return match &self.target_object_pose {
            Some(p) => { Ok(p.to_vec()) }
            None => { Err(BinpickError::new_precondition_violation("no target object pose has been estimated", file!(), line!())) }
        }
    }
}
