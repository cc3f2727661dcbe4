use serde::{Serialize, Deserialize};
use strum_macros::{Display, EnumIter};
use crate::task_modules::plan::Plan;
use crate::utils::utils_errors::BinpickError;

/// The maneuver a task query requests.  The numeric codes are the wire values
/// used by host applications when filling in a query goal; they are decoded
/// through `from_code`, and any code outside the table is a precondition
/// violation, not a recoverable fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
pub enum TaskStage {
    Move,
    MoveAndDetect,
    PerformGrasp,
    MoveToOrderBin,
    MoveAndDetectTote,
    ExecuteSavedTrajectory,
    RemoveFromTote,
    MoveToOtherBin,
    ThreeStageTrajectorySecond,
    ThreeStageTrajectoryThird,
    AdjustEndEffector,
    MoveOutsideBin,
    PlaceInsideBin,
    RetryGrasp,
    Lift
}
impl TaskStage {
    pub fn from_code(code: u8) -> Result<Self, BinpickError> {
        return match code {
            0 => { Ok(Self::Move) }
            1 => { Ok(Self::MoveAndDetect) }
            2 => { Ok(Self::PerformGrasp) }
            3 => { Ok(Self::MoveToOrderBin) }
            4 => { Ok(Self::MoveAndDetectTote) }
            5 => { Ok(Self::ExecuteSavedTrajectory) }
            6 => { Ok(Self::RemoveFromTote) }
            7 => { Ok(Self::MoveToOtherBin) }
            8 => { Ok(Self::ThreeStageTrajectorySecond) }
            9 => { Ok(Self::ThreeStageTrajectoryThird) }
            10 => { Ok(Self::AdjustEndEffector) }
            11 => { Ok(Self::MoveOutsideBin) }
            12 => { Ok(Self::PlaceInsideBin) }
            13 => { Ok(Self::RetryGrasp) }
            14 => { Ok(Self::Lift) }
            _ => { Err(BinpickError::new_precondition_violation(&format!("invalid task query stage code: {}", code), file!(), line!())) }
        }
    }
    pub fn to_code(&self) -> u8 {
        return match self {
            TaskStage::Move => { 0 }
            TaskStage::MoveAndDetect => { 1 }
            TaskStage::PerformGrasp => { 2 }
            TaskStage::MoveToOrderBin => { 3 }
            TaskStage::MoveAndDetectTote => { 4 }
            TaskStage::ExecuteSavedTrajectory => { 5 }
            TaskStage::RemoveFromTote => { 6 }
            TaskStage::MoveToOtherBin => { 7 }
            TaskStage::ThreeStageTrajectorySecond => { 8 }
            TaskStage::ThreeStageTrajectoryThird => { 9 }
            TaskStage::AdjustEndEffector => { 10 }
            TaskStage::MoveOutsideBin => { 11 }
            TaskStage::PlaceInsideBin => { 12 }
            TaskStage::RetryGrasp => { 13 }
            TaskStage::Lift => { 14 }
        }
    }
}

/// A single task request plus its output plan buffers.
///
/// A query is created per task request, consumed exactly once by the resolver
/// (which writes `found_solution` and at most one of the plan buffers), and
/// discarded after the caller extracts the plan.  Which input fields are
/// meaningful depends on the stage; the per-maneuver constructors set only the
/// relevant ones.
#[derive(Clone, Debug)]
pub struct TaskQuery {
    pub stage: TaskStage,
    /// "left", "right", or an explicit planning-context name.
    pub hand: String,
    /// 'A'..='L', or 'T' for the tote.
    pub bin: char,
    pub object: Option<String>,
    /// Current object pose as `[x, y, z, qx, qy, qz, qw]`.
    pub object_state: Vec<f64>,
    /// Target object pose for placement maneuvers.
    pub final_object_state: Vec<f64>,
    /// Full dual-arm joint goal for `Move`.
    pub goal_state: Vec<f64>,
    /// Lookup key for `ExecuteSavedTrajectory`.
    pub saved_plan_path: String,

    pub move_plan: Plan,
    pub move_gripper_to_bin: Plan,
    pub retrieve_object: Plan,
    pub move_to_order_bin: Plan,
    /// Step index in `retrieve_object` at which the grasp approach begins.
    pub reaching_point: i64,
    /// Step index in `retrieve_object` at which the withdrawal begins.
    pub retracting_point: i64,
    pub found_solution: bool
}
impl TaskQuery {
    fn new(stage: TaskStage) -> Self {
        Self {
            stage,
            hand: String::new(),
            bin: 'A',
            object: None,
            object_state: vec![],
            final_object_state: vec![],
            goal_state: vec![],
            saved_plan_path: String::new(),
            move_plan: Plan::new_empty(),
            move_gripper_to_bin: Plan::new_empty(),
            retrieve_object: Plan::new_empty(),
            move_to_order_bin: Plan::new_empty(),
            reaching_point: -1,
            retracting_point: -1,
            found_solution: false
        }
    }
    /// Dual-arm repositioning to the given full manipulator state.
    pub fn new_move(goal_state: Vec<f64>) -> Self {
        let mut out_self = Self::new(TaskStage::Move);
        out_self.goal_state = goal_state;
        out_self
    }
    pub fn new_grasp(stage: TaskStage, hand: &str, bin: char, object: &str, object_state: Vec<f64>) -> Self {
        let mut out_self = Self::new(stage);
        out_self.hand = hand.to_string();
        out_self.bin = bin;
        out_self.object = Some(object.to_string());
        out_self.object_state = object_state;
        out_self
    }
    pub fn new_detect(stage: TaskStage, hand: &str, bin: char) -> Self {
        let mut out_self = Self::new(stage);
        out_self.hand = hand.to_string();
        out_self.bin = bin;
        out_self
    }
    pub fn new_place(stage: TaskStage, hand: &str, object: &str, final_object_state: Vec<f64>) -> Self {
        let mut out_self = Self::new(stage);
        out_self.hand = hand.to_string();
        out_self.object = Some(object.to_string());
        out_self.final_object_state = final_object_state;
        out_self
    }
    pub fn new_saved_trajectory(hand: &str, saved_plan_path: &str) -> Self {
        let mut out_self = Self::new(TaskStage::ExecuteSavedTrajectory);
        out_self.hand = hand.to_string();
        out_self.saved_plan_path = saved_plan_path.to_string();
        out_self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn stage_codes_round_trip() {
        for stage in TaskStage::iter() {
            assert_eq!(TaskStage::from_code(stage.to_code()).unwrap(), stage);
        }
    }

    #[test]
    fn observed_wire_codes_are_stable() {
        assert_eq!(TaskStage::Move.to_code(), 0);
        assert_eq!(TaskStage::PerformGrasp.to_code(), 2);
        assert_eq!(TaskStage::MoveToOrderBin.to_code(), 3);
        assert_eq!(TaskStage::ExecuteSavedTrajectory.to_code(), 5);
        assert_eq!(TaskStage::MoveToOtherBin.to_code(), 7);
        assert_eq!(TaskStage::RetryGrasp.to_code(), 13);
        assert_eq!(TaskStage::Lift.to_code(), 14);
    }

    #[test]
    fn unknown_stage_code_is_a_precondition_violation() {
        for code in [15u8, 99, 255] {
            let err = TaskStage::from_code(code).unwrap_err();
            assert!(err.is_fatal());
        }
    }
}
