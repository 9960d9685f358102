//! One-time derivation of the adjustment rotation that aligns the tracked
//! hand basis with a target skeleton's bind-pose wrist basis.

use crate::bone::BoneId;
use crate::mapping::MappingTable;
use crate::math::{snap_to_dominant_axis, Quat, Vec3, EPSILON};
use crate::skeleton::SkeletonQuery;

/// Tracked hand points down this axis
pub const CANONICAL_FORWARD: Vec3 = Vec3::X;

/// Tracked hand's right-hand side
pub const CANONICAL_RIGHT: Vec3 = Vec3::Y;

/// Adjustment rotation from three bind-pose landmark positions.
///
/// # Arguments
/// * `wrist` - Component-space position of the wrist
/// * `index` - Component-space position of the index finger's first joint
/// * `pinky` - Component-space position of the pinky finger's first joint
///
/// Returns `None` when the landmarks are degenerate (coincident points or
/// collinear snapped axes).
pub fn adjustment_from_landmarks(wrist: Vec3, index: Vec3, pinky: Vec3) -> Option<Quat> {
    // Bind poses are assumed axis-aligned; snapping strips authoring noise
    let forward = snap_to_dominant_axis(pinky - wrist).try_normalize()?;
    let up = snap_to_dominant_axis(index - pinky).try_normalize()?;

    let right = up.cross(forward);
    if right.length_squared() < EPSILON {
        return None;
    }
    let right = right.normalize();

    let forward_adjustment = Quat::from_rotation_arc(CANONICAL_FORWARD, forward);
    let rotated_right = (forward_adjustment * CANONICAL_RIGHT).normalize();
    let twist_adjustment = Quat::from_rotation_arc(rotated_right, right);

    Some((twist_adjustment * forward_adjustment).normalize())
}

/// Calibrate `mapping` against the bind pose of `skeleton`.
///
/// Falls back to identity, with a warning, when the wrist, index or pinky
/// landmark is not mapped or the bind pose is degenerate. Calling it again on
/// the same skeleton yields the same rotation.
pub fn calibrate<S: SkeletonQuery + ?Sized>(mapping: &MappingTable, skeleton: &S) -> Quat {
    let landmark = |bone: BoneId| {
        mapping
            .target_index_of(bone)
            .and_then(|index| skeleton.bind_pose_component_transform(index))
            .map(|transform| transform.translation)
    };

    let (Some(wrist), Some(index), Some(pinky)) = (
        landmark(BoneId::Wrist),
        landmark(BoneId::Index1),
        landmark(BoneId::Pinky1),
    ) else {
        log::warn!(
            "Calibration skipped for {}: wrist, index or pinky bone is not mapped",
            skeleton.asset_id()
        );
        return Quat::IDENTITY;
    };

    match adjustment_from_landmarks(wrist, index, pinky) {
        Some(adjustment) => {
            log::debug!("Adjustment for {}: {:?}", skeleton.asset_id(), adjustment);
            adjustment
        }
        None => {
            log::warn!(
                "Calibration skipped for {}: degenerate bind pose landmarks",
                skeleton.asset_id()
            );
            Quat::IDENTITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::HandSide;
    use crate::mapping::SkeletonConvention;
    use crate::math::BoneTransform;
    use crate::skeleton::{ReferenceSkeleton, SkeletonBone};

    fn hand_rig(asset_id: &str, index: Vec3, pinky: Vec3) -> ReferenceSkeleton {
        let bone = |name: &str, parent: Option<usize>, translation: Vec3| SkeletonBone {
            name: name.to_string(),
            parent,
            local: BoneTransform::from_translation(translation),
        };
        ReferenceSkeleton::new(
            asset_id,
            vec![
                bone("hand_r", None, Vec3::ZERO),
                bone("index_01_r", Some(0), index),
                bone("pinky_01_r", Some(0), pinky),
            ],
        )
        .unwrap()
    }

    fn mapped(skeleton: &ReferenceSkeleton) -> MappingTable {
        let mut table = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);
        table.resolve(skeleton);
        table
    }

    #[test]
    fn test_aligned_rig_needs_no_adjustment() {
        // Pinky straight down +X from the wrist, index on the +Z side
        let adjustment =
            adjustment_from_landmarks(Vec3::ZERO, Vec3::new(0.1, 0.0, 0.04), Vec3::new(0.1, 0.0, 0.0))
                .unwrap();
        // up = +Z, forward = +X, right = Z x X = +Y
        assert!(adjustment.abs_diff_eq(Quat::IDENTITY, 1e-5));
    }

    #[test]
    fn test_adjustment_maps_canonical_basis_onto_rig() {
        // Rig points down +Y with the index toward -X
        let wrist = Vec3::ZERO;
        let pinky = Vec3::new(0.01, 0.1, 0.0);
        let index = Vec3::new(-0.05, 0.1, 0.005);
        let adjustment = adjustment_from_landmarks(wrist, index, pinky).unwrap();

        let forward = Vec3::Y;
        let up = Vec3::NEG_X;
        let right = up.cross(forward).normalize();

        assert!((adjustment * CANONICAL_FORWARD).abs_diff_eq(forward, 1e-5));
        assert!((adjustment * CANONICAL_RIGHT).abs_diff_eq(right, 1e-5));
        assert!((adjustment.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_landmarks() {
        assert!(adjustment_from_landmarks(Vec3::ZERO, Vec3::X, Vec3::ZERO).is_none());
        // Index directly past the pinky along the same axis: up parallel to forward
        assert!(adjustment_from_landmarks(Vec3::ZERO, Vec3::new(0.2, 0.0, 0.0), Vec3::new(0.1, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_calibration_is_idempotent() {
        let skeleton = hand_rig("rig", Vec3::new(0.09, 0.03, 0.02), Vec3::new(0.08, -0.04, 0.0));
        let mapping = mapped(&skeleton);

        let first = calibrate(&mapping, &skeleton);
        let second = calibrate(&mapping, &skeleton);
        assert_eq!(first.to_array(), second.to_array());
    }

    #[test]
    fn test_missing_landmark_falls_back_to_identity() {
        let skeleton = ReferenceSkeleton::new(
            "no_pinky",
            vec![
                SkeletonBone {
                    name: "hand_r".into(),
                    parent: None,
                    local: BoneTransform::IDENTITY,
                },
                SkeletonBone {
                    name: "index_01_r".into(),
                    parent: Some(0),
                    local: BoneTransform::from_translation(Vec3::X),
                },
            ],
        )
        .unwrap();
        let mapping = mapped(&skeleton);

        assert!(mapping.is_initialized());
        assert_eq!(calibrate(&mapping, &skeleton), Quat::IDENTITY);
    }
}
