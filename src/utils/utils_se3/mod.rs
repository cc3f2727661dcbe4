use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::BinpickError;

/// An SE(3) pose used for object states, gripper configurations, and
/// camera-viewing targets: a 3D position plus a unit quaternion orientation.
///
/// The orientation is normalized on every construction path; a quaternion that
/// reaches an IK solver or a goal target un-normalized is a defect, so there is
/// deliberately no constructor that skips the normalization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SE3Pose {
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>
}
impl SE3Pose {
    pub fn new(x: f64, y: f64, z: f64, qx: f64, qy: f64, qz: f64, qw: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            orientation: UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz))
        }
    }
    pub fn new_from_parts(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self { position, orientation }
    }
    pub fn new_identity() -> Self {
        Self { position: Vector3::zeros(), orientation: UnitQuaternion::identity() }
    }
    /// Expects `[x, y, z, qx, qy, qz, qw]`.
    pub fn new_from_vec(v: &Vec<f64>) -> Result<Self, BinpickError> {
        if v.len() != 7 {
            return Err(BinpickError::new_generic_error_str(&format!("pose vector must have 7 entries, had {}", v.len()), file!(), line!()));
        }
        return Ok(Self::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6]));
    }
    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }
    pub fn orientation(&self) -> &UnitQuaternion<f64> {
        &self.orientation
    }
    /// Returns `[x, y, z, qx, qy, qz, qw]`.
    pub fn to_vec(&self) -> Vec<f64> {
        let q = self.orientation.quaternion();
        vec![self.position.x, self.position.y, self.position.z, q.i, q.j, q.k, q.w]
    }
    /// Applies an offset expressed in this pose's local frame and returns the
    /// resulting global pose.  This is how a retract configuration (a small
    /// negative local-z offset) is turned into a world-frame goal.
    pub fn applied_local_offset(&self, offset: &SE3Pose) -> SE3Pose {
        let position = self.position + self.orientation * offset.position;
        let orientation = self.orientation * offset.orientation;
        SE3Pose { position, orientation }
    }
    /// Applies a world-frame translation.
    pub fn applied_translation(&self, t: &Vector3<f64>) -> SE3Pose {
        SE3Pose { position: self.position + t, orientation: self.orientation.clone() }
    }
    /// L2 norm over the element-wise difference of the two 7-vectors.  This is
    /// the magnitude the servoing interrupt compares against its threshold.
    pub fn difference_norm(&self, other: &SE3Pose) -> f64 {
        let a = self.to_vec();
        let b = other.to_vec();
        let mut accum = 0.0;
        for (x, y) in a.iter().zip(b.iter()) {
            accum += (x - y) * (x - y);
        }
        accum.sqrt()
    }
}
