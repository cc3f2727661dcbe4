use std::collections::BTreeMap;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Serialize, Deserialize};
use crate::utils::utils_errors::BinpickError;

/// Distance by which the first sensing stage hangs back from the bin face.
pub const FIRST_STAGE_OFFSET: f64 = 0.24;
/// Lateral offset between the camera lens and the gripper frame.
pub const LENS_OFFSET: f64 = 0.18;
/// Lateral offset of the RGB camera relative to the depth camera.
pub const RGB_CAM_OFFSET: f64 = 0.08;

/// Per-bin camera-viewing parameters: the point the camera should focus on,
/// the base viewpoint orientation for the gripper, and the approach distance.
/// Established once at initialization and read-only thereafter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExaminationProfile {
    pub focus: Vector3<f64>,
    pub base_viewpoint: UnitQuaternion<f64>,
    pub distance: f64
}
impl ExaminationProfile {
    fn new(focus: [f64; 3], viewpoint: [f64; 4]) -> Self {
        // UnitQuaternion normalizes; the raw viewpoint constants are not unit.
        let base_viewpoint = UnitQuaternion::from_quaternion(Quaternion::new(viewpoint[3], viewpoint[0], viewpoint[1], viewpoint[2]));
        Self {
            focus: Vector3::new(focus[0], focus[1], focus[2]),
            base_viewpoint,
            distance: 0.3
        }
    }
}

/// The static camera-viewing table, keyed by bin letter 'A'..='L' plus 'T'
/// for the tote.  Focus points already account for the first-stage standoff
/// (x) and the lens offset (y); the detect maneuvers add their stage-specific
/// corrections on top.
#[derive(Clone, Debug)]
pub struct ExaminationProfileTable {
    profiles: BTreeMap<char, ExaminationProfile>
}
impl ExaminationProfileTable {
    pub fn standard() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert('A', ExaminationProfile::new([0.769 - FIRST_STAGE_OFFSET, 0.218 + LENS_OFFSET, 1.515], [-0.546, 0.567, -0.447, 0.424]));
        profiles.insert('B', ExaminationProfile::new([0.777 - FIRST_STAGE_OFFSET, -0.079 + LENS_OFFSET, 1.511], [-0.546, 0.567, -0.447, 0.424]));
        profiles.insert('C', ExaminationProfile::new([0.796 - FIRST_STAGE_OFFSET, -0.274 + LENS_OFFSET, 1.527], [-0.546, 0.567, -0.447, 0.424]));
        profiles.insert('D', ExaminationProfile::new([0.762 - FIRST_STAGE_OFFSET, 0.220 + LENS_OFFSET, 1.304], [-0.560, 0.600, -0.431, 0.375]));
        profiles.insert('E', ExaminationProfile::new([0.755 - FIRST_STAGE_OFFSET, -0.062 + LENS_OFFSET, 1.305], [-0.560, 0.600, -0.431, 0.375]));
        profiles.insert('F', ExaminationProfile::new([0.758 - FIRST_STAGE_OFFSET, -0.344 + LENS_OFFSET, 1.295], [-0.560, 0.600, -0.431, 0.375]));
        profiles.insert('G', ExaminationProfile::new([0.758 - FIRST_STAGE_OFFSET, 0.236 + LENS_OFFSET, 1.069], [-0.567, 0.608, -0.420, 0.364]));
        profiles.insert('H', ExaminationProfile::new([0.752 - FIRST_STAGE_OFFSET, -0.047 + LENS_OFFSET, 1.072], [-0.558, 0.599, -0.434, 0.377]));
        profiles.insert('I', ExaminationProfile::new([0.755 - FIRST_STAGE_OFFSET, -0.344 + LENS_OFFSET, 1.071], [-0.558, 0.599, -0.434, 0.377]));
        profiles.insert('J', ExaminationProfile::new([0.75 - FIRST_STAGE_OFFSET, 0.236 + LENS_OFFSET, 0.860], [-0.582, 0.626, -0.393, 0.339]));
        profiles.insert('K', ExaminationProfile::new([0.760 - FIRST_STAGE_OFFSET, -0.058 + LENS_OFFSET, 0.867], [-0.582, 0.626, -0.393, 0.339]));
        profiles.insert('L', ExaminationProfile::new([0.766 - FIRST_STAGE_OFFSET, -0.386 + LENS_OFFSET, 0.861], [-0.582, 0.626, -0.393, 0.339]));
        profiles.insert('T', ExaminationProfile::new([0.40, 0.0, 0.80], [0.0, 0.0, -0.70711, 0.70711]));
        Self { profiles }
    }
    pub fn profile(&self, bin: char) -> Result<&ExaminationProfile, BinpickError> {
        return match self.profiles.get(&bin) {
            Some(p) => { Ok(p) }
            None => { Err(BinpickError::new_precondition_violation(&format!("no examination profile for bin '{}'", bin), file!(), line!())) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bin_and_the_tote_have_a_profile() {
        let table = ExaminationProfileTable::standard();
        for bin in 'A'..='L' {
            assert!(table.profile(bin).is_ok());
        }
        assert!(table.profile('T').is_ok());
    }

    #[test]
    fn viewpoints_are_unit_normalized() {
        let table = ExaminationProfileTable::standard();
        for bin in 'A'..='L' {
            let p = table.profile(bin).unwrap();
            assert!((p.base_viewpoint.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unknown_bin_is_fatal() {
        let table = ExaminationProfileTable::standard();
        assert!(table.profile('Z').unwrap_err().is_fatal());
    }
}
