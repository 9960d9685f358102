//! Per-hand retargeting node: owns the mapping for one bound skeleton and
//! the evaluation plan selected from its policy.

use crate::bone::{HandSide, PoseBuffer};
use crate::calibration::calibrate;
use crate::evaluator::{evaluate, BonePairs, EvaluationMode, EvaluationPlan, EvaluationPolicy};
use crate::frame::{HandFrame, SourceFrame};
use crate::mapping::{BoneMappingEntry, MappingTable, SkeletonConvention};
use crate::skeleton::SkeletonQuery;
use serde::{Deserialize, Serialize};

/// Static node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub convention: SkeletonConvention,
    pub side: HandSide,
    /// The hand is part of a larger rig; leave its root-most bone alone
    pub skip_root_bone: bool,
    /// Stop after the wrist
    pub only_wrist: bool,
}

/// Retargets one hand's tracking frames onto one target skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct HandRetargetNode {
    settings: NodeSettings,
    mapping: MappingTable,
    policy: EvaluationPolicy,
    plan: EvaluationPlan,
}

impl Default for HandRetargetNode {
    fn default() -> Self {
        Self::new(NodeSettings::default())
    }
}

impl HandRetargetNode {
    pub fn new(settings: NodeSettings) -> Self {
        let policy = EvaluationPolicy::default();
        Self {
            settings,
            mapping: MappingTable::new(settings.side),
            plan: EvaluationPlan::new(&policy, settings.only_wrist),
            policy,
        }
    }

    /// Node with a hand-authored mapping instead of the convention defaults
    pub fn with_mapping(settings: NodeSettings, entries: Vec<BoneMappingEntry>) -> Self {
        let mut node = Self::new(settings);
        node.mapping.merge_root_and_wrist = settings.convention.merges_root_and_wrist();
        node.set_mapping_entries(entries);
        node
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    pub fn policy(&self) -> &EvaluationPolicy {
        &self.policy
    }

    pub fn plan(&self) -> &EvaluationPlan {
        &self.plan
    }

    pub fn mode(&self) -> EvaluationMode {
        self.plan.mode
    }

    /// Replace the mapping entries; the next bind resolves them again
    pub fn set_mapping_entries(&mut self, entries: Vec<BoneMappingEntry>) {
        self.mapping.entries = entries;
        self.mapping.invalidate();
    }

    /// Change the policy. The evaluation mode is chosen here, once, and not
    /// per bone.
    pub fn set_policy(&mut self, policy: EvaluationPolicy) {
        self.policy = policy;
        self.plan = EvaluationPlan::new(&policy, self.settings.only_wrist);
        log::debug!("{:?} hand evaluation mode: {:?}", self.settings.side, self.plan.mode);
    }

    /// Bind to `skeleton`: build default entries if there are none, resolve
    /// them and calibrate.
    ///
    /// A no-op when the mapping is already built for the same asset. Returns
    /// whether the node can evaluate afterwards.
    pub fn initialize_bone_references<S: SkeletonQuery + ?Sized>(&mut self, skeleton: &S) -> bool {
        if !self.mapping.needs_rebuild(skeleton) {
            return true;
        }

        if self.mapping.entries.is_empty() {
            self.mapping
                .construct_default_mappings(self.settings.convention, self.settings.skip_root_bone);
        } else {
            self.mapping.invalidate();
        }

        self.mapping.resolve(skeleton);
        if self.mapping.is_initialized() {
            self.mapping.adjustment = calibrate(&self.mapping, skeleton);
        }

        self.mapping.is_initialized()
    }

    #[inline]
    pub fn is_valid_to_evaluate(&self) -> bool {
        self.mapping.is_initialized()
    }

    /// Retarget one frame onto `pose`
    pub fn evaluate<P: PoseBuffer + ?Sized>(&self, frame: &SourceFrame, pose: &mut P, alpha: f32) -> BonePairs {
        evaluate(&self.mapping, &self.plan, frame, pose, alpha)
    }

    /// Retarget an acquired hand frame; invalid frames pass the pose through
    pub fn evaluate_hand<P: PoseBuffer + ?Sized>(&self, hand: &HandFrame, pose: &mut P, alpha: f32) -> BonePairs {
        if hand.valid && hand.side == self.settings.side {
            self.evaluate(&hand.bones, pose, alpha)
        } else {
            self.evaluate(&SourceFrame::empty(), pose, alpha)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::{BoneId, ComponentPose};
    use crate::math::{BoneTransform, Quat, Vec3};
    use crate::skeleton::ReferenceSkeleton;

    const RIG: &str = include_str!("../assets/skeletons/humanoid_hand_r.json");

    fn rig() -> ReferenceSkeleton {
        ReferenceSkeleton::from_json(RIG).unwrap()
    }

    #[test]
    fn test_initialize_builds_and_calibrates() {
        let skeleton = rig();
        let mut node = HandRetargetNode::new(NodeSettings::default());
        assert!(!node.is_valid_to_evaluate());

        assert!(node.initialize_bone_references(&skeleton));
        assert!(node.is_valid_to_evaluate());
        assert_eq!(node.mapping().entries.len(), 16);
        assert!(node.mapping().merge_root_and_wrist);

        // Fingers point down +Y with the index toward +X
        let adjustment = node.mapping().adjustment;
        assert!((adjustment * Vec3::X).abs_diff_eq(Vec3::Y, 1e-5));
    }

    #[test]
    fn test_initialize_is_noop_for_same_asset() {
        let skeleton = rig();
        let mut node = HandRetargetNode::new(NodeSettings::default());
        node.initialize_bone_references(&skeleton);

        let before = node.clone();
        assert!(node.initialize_bone_references(&skeleton));
        assert_eq!(node, before);
    }

    #[test]
    fn test_rebind_to_new_asset() {
        let skeleton = rig();
        let mut node = HandRetargetNode::new(NodeSettings::default());
        node.initialize_bone_references(&skeleton);

        let stranger = ReferenceSkeleton::new(
            "prop",
            vec![crate::skeleton::SkeletonBone {
                name: "lid".into(),
                parent: None,
                local: BoneTransform::IDENTITY,
            }],
        )
        .unwrap();
        assert!(!node.initialize_bone_references(&stranger));
        assert!(!node.is_valid_to_evaluate());
        assert_eq!(node.mapping().adjustment, Quat::IDENTITY);
    }

    #[test]
    fn test_skip_root_bone_drops_wrist_entry() {
        let settings = NodeSettings {
            skip_root_bone: true,
            ..NodeSettings::default()
        };
        let mut node = HandRetargetNode::new(settings);
        node.initialize_bone_references(&rig());

        assert_eq!(node.mapping().entries.len(), 15);
        assert!(node.mapping().entry_for_bone(BoneId::Wrist).is_none());
    }

    #[test]
    fn test_set_policy_selects_mode_once() {
        let mut node = HandRetargetNode::default();
        assert_eq!(node.mode(), EvaluationMode::DeformingModelSpace);

        node.set_policy(EvaluationPolicy {
            allow_deforming_mesh: false,
            source_is_parent_space: true,
            ..EvaluationPolicy::default()
        });
        assert_eq!(node.mode(), EvaluationMode::RigidParentSpace);
        assert!(!node.policy().allow_deforming_mesh);
    }

    #[test]
    fn test_invalid_or_foreign_hand_passes_through() {
        let skeleton = rig();
        let mut node = HandRetargetNode::new(NodeSettings::default());
        node.initialize_bone_references(&skeleton);

        let mut pose = ComponentPose::from_skeleton(&skeleton);
        let before = pose.clone();

        let invalid = HandFrame::invalid(HandSide::Right);
        let pairs = node.evaluate_hand(&invalid, &mut pose, 1.0);
        assert_eq!(pairs.len(), 16);
        assert_eq!(pose, before);

        let left = HandFrame {
            side: HandSide::Left,
            bones: SourceFrame::identity(),
            valid: true,
            ..HandFrame::default()
        };
        node.evaluate_hand(&left, &mut pose, 1.0);
        assert_eq!(pose, before);
    }

    #[test]
    fn test_custom_mapping_entries() {
        let settings = NodeSettings::default();
        let entries = vec![
            BoneMappingEntry::new(BoneId::Wrist, "hand_r"),
            BoneMappingEntry::new(BoneId::Index1, "index_01_r"),
        ];
        let mut node = HandRetargetNode::with_mapping(settings, entries);
        assert!(node.initialize_bone_references(&rig()));
        assert_eq!(node.mapping().entries.len(), 2);

        let mut pose = ComponentPose::from_skeleton(&rig());
        let pairs = node.evaluate(&SourceFrame::identity(), &mut pose, 1.0);
        let targets: Vec<usize> = pairs.iter().map(|(target, _)| *target).collect();
        assert_eq!(targets, vec![0, 4]);
    }
}
