use nalgebra::Vector3;
use crate::planning_modules::planner_services::{BinCollisionSensor, BinSurface};
use crate::utils::utils_errors::BinpickError;
use crate::utils::utils_se3::SE3Pose;

/// Fixed nudge applied per colliding axis, in length units.
pub const OFFSET_INCREMENT: f64 = 0.01;
/// Budget each axis accumulator may spend before the resolution gives up.
pub const DEFAULT_OFFSET_THRESHOLD: f64 = 0.04;

/// Resolves a sensed/assumed object pose out of collision with the bin
/// boundary surfaces by nudging it along up to three independent axes
/// (vertical, left-lateral, right-lateral) in fixed increments, recursing
/// depth-first per axis until clear or an axis exhausts its offset budget.
///
/// Exceeding the budget on any axis immediately declares failure and resets
/// the accumulators; composite success requires all three axes clear.  Which
/// physical divider/side acts as a bin's left or right boundary depends on
/// the bin's column on the shelf.
pub struct CollisionOffsetResolver {
    offset_threshold: f64,
    z_axis_offset: f64,
    left_offset: f64,
    right_offset: f64
}
impl CollisionOffsetResolver {
    pub fn new(offset_threshold: f64) -> Self {
        Self { offset_threshold, z_axis_offset: 0.0, left_offset: 0.0, right_offset: 0.0 }
    }
    pub fn new_default() -> Self {
        Self::new(DEFAULT_OFFSET_THRESHOLD)
    }

    /// Adjusts `pose` in place.  Returns `Ok(true)` if the object ended up
    /// clear of all three boundary surfaces within the offset budget.
    pub fn resolve(&mut self, sensor: &mut dyn BinCollisionSensor, object: &str, bin: char, pose: &mut SE3Pose) -> Result<bool, BinpickError> {
        self.z_axis_offset = 0.0;
        self.left_offset = 0.0;
        self.right_offset = 0.0;
        return self.resolve_at_depth(sensor, object, bin, pose, 0);
    }

    fn resolve_at_depth(&mut self, sensor: &mut dyn BinCollisionSensor, object: &str, bin: char, pose: &mut SE3Pose, depth: u32) -> Result<bool, BinpickError> {
        let (left_boundary, right_boundary) = Self::boundary_surfaces(bin)?;

        if self.z_axis_offset >= self.offset_threshold || self.left_offset >= self.offset_threshold || self.right_offset >= self.offset_threshold {
            self.z_axis_offset = 0.0;
            self.left_offset = 0.0;
            self.right_offset = 0.0;
            return Ok(false);
        }

        let mut top = true;
        let mut left = true;
        let mut right = true;

        let mut collision_with_bin_bottom = false;
        if self.z_axis_offset < self.offset_threshold {
            if sensor.colliding_surfaces(object).contains(&BinSurface::Bottom) {
                collision_with_bin_bottom = true;
                self.z_axis_offset += OFFSET_INCREMENT;
                *pose = pose.applied_translation(&Vector3::new(0.0, 0.0, OFFSET_INCREMENT));
                sensor.apply_pose(object, pose);
                top = self.resolve_at_depth(sensor, object, bin, pose, depth + 1)?;
            }
        }
        if depth == 0 && top && collision_with_bin_bottom {
            // Extra clearance above the resolved contact.
            *pose = pose.applied_translation(&Vector3::new(0.0, 0.0, OFFSET_INCREMENT));
            sensor.apply_pose(object, pose);
        }

        let mut collision_with_left_side = false;
        if self.left_offset < self.offset_threshold {
            if sensor.colliding_surfaces(object).contains(&left_boundary) {
                collision_with_left_side = true;
                self.left_offset += OFFSET_INCREMENT;
                *pose = pose.applied_translation(&Vector3::new(0.0, -OFFSET_INCREMENT, 0.0));
                sensor.apply_pose(object, pose);
                left = self.resolve_at_depth(sensor, object, bin, pose, depth + 1)?;
            }
        }
        if depth == 0 && left && collision_with_left_side {
            *pose = pose.applied_translation(&Vector3::new(0.0, -OFFSET_INCREMENT, 0.0));
            sensor.apply_pose(object, pose);
        }

        let mut collision_with_right_side = false;
        if self.right_offset < self.offset_threshold {
            if sensor.colliding_surfaces(object).contains(&right_boundary) {
                collision_with_right_side = true;
                self.right_offset += OFFSET_INCREMENT;
                *pose = pose.applied_translation(&Vector3::new(0.0, OFFSET_INCREMENT, 0.0));
                sensor.apply_pose(object, pose);
                right = self.resolve_at_depth(sensor, object, bin, pose, depth + 1)?;
            }
        }
        if depth == 0 && right && collision_with_right_side {
            *pose = pose.applied_translation(&Vector3::new(0.0, OFFSET_INCREMENT, 0.0));
            sensor.apply_pose(object, pose);
        }

        self.z_axis_offset = 0.0;
        self.left_offset = 0.0;
        self.right_offset = 0.0;

        return Ok(left && right && top);
    }

    /// Which physical surfaces bound the given bin on its left and right.
    /// Bins in the leftmost shelf column are walled by the shelf side on the
    /// left and the left divider on the right; middle-column bins sit between
    /// the two dividers; rightmost-column bins between the right divider and
    /// the shelf side.
    fn boundary_surfaces(bin: char) -> Result<(BinSurface, BinSurface), BinpickError> {
        return match bin {
            'A' | 'D' | 'G' | 'J' => { Ok((BinSurface::LeftSide, BinSurface::LeftDivider)) }
            'B' | 'E' | 'H' | 'K' => { Ok((BinSurface::LeftDivider, BinSurface::RightDivider)) }
            'C' | 'F' | 'I' | 'L' => { Ok((BinSurface::RightDivider, BinSurface::RightSide)) }
            _ => { Err(BinpickError::new_precondition_violation(&format!("unknown bin '{}'", bin), file!(), line!())) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// World-model stand-in: the object collides with a surface until the
    /// pose crosses the scripted clearance along that surface's axis.
    struct ThresholdSensor {
        pose: SE3Pose,
        bottom_clear_z: Option<f64>,
        left_clear_below_y: Option<f64>,
        right_clear_above_y: Option<f64>,
        applied_poses: usize
    }
    impl ThresholdSensor {
        fn new(pose: SE3Pose) -> Self {
            Self { pose, bottom_clear_z: None, left_clear_below_y: None, right_clear_above_y: None, applied_poses: 0 }
        }
    }
    impl BinCollisionSensor for ThresholdSensor {
        fn apply_pose(&mut self, _object: &str, pose: &SE3Pose) {
            self.pose = pose.clone();
            self.applied_poses += 1;
        }
        fn colliding_surfaces(&self, _object: &str) -> Vec<BinSurface> {
            let mut out = vec![];
            if let Some(z) = self.bottom_clear_z {
                if self.pose.position().z < z { out.push(BinSurface::Bottom); }
            }
            if let Some(y) = self.left_clear_below_y {
                if self.pose.position().y > y { out.push(BinSurface::LeftSide); }
            }
            if let Some(y) = self.right_clear_above_y {
                if self.pose.position().y < y { out.push(BinSurface::LeftDivider); }
            }
            out
        }
    }

    #[test]
    fn clear_object_resolves_without_nudging() {
        let mut sensor = ThresholdSensor::new(SE3Pose::new(0.8, 0.0, 1.3, 0.0, 0.0, 0.0, 1.0));
        let mut resolver = CollisionOffsetResolver::new_default();
        let mut pose = SE3Pose::new(0.8, 0.0, 1.3, 0.0, 0.0, 0.0, 1.0);
        assert!(resolver.resolve(&mut sensor, "item", 'A', &mut pose).unwrap());
        assert_eq!(sensor.applied_poses, 0);
    }

    #[test]
    fn small_offsets_resolve_within_budget() {
        // Needs 0.02 of vertical lift and 0.02 of rightward shift; both are
        // below the 0.04 budget.
        let mut sensor = ThresholdSensor::new(SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0));
        sensor.bottom_clear_z = Some(1.315);
        sensor.right_clear_above_y = Some(0.015);
        let mut resolver = CollisionOffsetResolver::new_default();
        let mut pose = SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0);
        assert!(resolver.resolve(&mut sensor, "item", 'A', &mut pose).unwrap());
        assert!(pose.position().z >= 1.315);
        assert!(pose.position().y >= 0.015);
    }

    #[test]
    fn recursion_depth_is_bounded_by_budget_over_increment() {
        // Clearance far beyond the budget: resolution must fail after at most
        // threshold/increment nudges along the axis, not recurse forever.
        let mut sensor = ThresholdSensor::new(SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0));
        sensor.bottom_clear_z = Some(2.0);
        let mut resolver = CollisionOffsetResolver::new_default();
        let mut pose = SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0);
        assert!(!resolver.resolve(&mut sensor, "item", 'A', &mut pose).unwrap());
        let nudges = ((pose.position().z - 1.30) / OFFSET_INCREMENT).round() as usize;
        assert!(nudges <= (DEFAULT_OFFSET_THRESHOLD / OFFSET_INCREMENT) as usize);
    }

    #[test]
    fn failure_resets_accumulators_for_the_next_run() {
        let mut sensor = ThresholdSensor::new(SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0));
        sensor.bottom_clear_z = Some(2.0);
        let mut resolver = CollisionOffsetResolver::new_default();
        let mut pose = SE3Pose::new(0.8, 0.0, 1.30, 0.0, 0.0, 0.0, 1.0);
        assert!(!resolver.resolve(&mut sensor, "item", 'A', &mut pose).unwrap());

        // A clear object afterwards resolves immediately; stale accumulators
        // would have failed it.
        let mut clear_sensor = ThresholdSensor::new(SE3Pose::new(0.8, 0.0, 1.3, 0.0, 0.0, 0.0, 1.0));
        let mut clear_pose = SE3Pose::new(0.8, 0.0, 1.3, 0.0, 0.0, 0.0, 1.0);
        assert!(resolver.resolve(&mut clear_sensor, "item", 'B', &mut clear_pose).unwrap());
    }

    #[test]
    fn unknown_bin_is_fatal() {
        let mut sensor = ThresholdSensor::new(SE3Pose::new_identity());
        let mut resolver = CollisionOffsetResolver::new_default();
        let mut pose = SE3Pose::new_identity();
        let err = resolver.resolve(&mut sensor, "item", 'Q', &mut pose).unwrap_err();
        assert!(err.is_fatal());
    }
}
