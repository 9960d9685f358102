//! Per-frame retargeting of tracked hand bones onto a target pose.
//!
//! The policy flags are folded into an `EvaluationMode` once, when the policy
//! is set, so the per-bone loop branches on a single closed set of modes.
//!
//! Composition uses glam order throughout: `parent * child`, the right-hand
//! operand applied first.

use crate::bone::{BoneId, ParentCache, PoseBuffer};
use crate::frame::SourceFrame;
use crate::hand_constants::DEFAULT_ADDITION_YAW_PITCH_ROLL_DEG;
use crate::mapping::MappingTable;
use crate::math::{quat_from_yaw_pitch_roll_deg, Axis, BoneTransform};
use serde::{Deserialize, Serialize};

/// Target bone index paired with its corrected component-space transform
pub type BonePairs = Vec<(usize, BoneTransform)>;

/// User-facing evaluation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPolicy {
    /// Drive bone translation as well as rotation
    pub allow_deforming_mesh: bool,
    /// Reflect the whole hand, to reuse one mesh for both hands
    pub mirror_hand: bool,
    /// Feed this hand from the opposite hand's stream. Applied at acquisition.
    pub mirror_left_right: bool,
    /// Source transforms are relative to their parent bone
    pub source_is_parent_space: bool,
    /// Tracking bone space to target bone space, for every non-root bone
    pub addition_transform: BoneTransform,
    /// Same correction for the root-most mapped bone
    pub root_addition_transform: BoneTransform,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            allow_deforming_mesh: true,
            mirror_hand: false,
            mirror_left_right: false,
            source_is_parent_space: false,
            addition_transform: BoneTransform::from_rotation(quat_from_yaw_pitch_roll_deg(
                DEFAULT_ADDITION_YAW_PITCH_ROLL_DEG,
            )),
            root_addition_transform: BoneTransform::IDENTITY,
        }
    }
}

/// When finished bones are blended into the pose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// Each bone is committed before the next one is read
    PerBone,
    /// All bones are committed together after the loop
    Batched,
}

/// Mesh and source-space combination, chosen once per policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationMode {
    DeformingModelSpace,
    DeformingParentSpace,
    RigidModelSpace,
    RigidParentSpace,
}

impl EvaluationMode {
    pub const fn from_policy(policy: &EvaluationPolicy) -> Self {
        match (policy.allow_deforming_mesh, policy.source_is_parent_space) {
            (true, false) => EvaluationMode::DeformingModelSpace,
            (true, true) => EvaluationMode::DeformingParentSpace,
            (false, false) => EvaluationMode::RigidModelSpace,
            (false, true) => EvaluationMode::RigidParentSpace,
        }
    }

    /// Translation follows the tracker; rigid meshes keep bind-pose lengths
    #[inline]
    pub const fn writes_translation(self) -> bool {
        matches!(
            self,
            EvaluationMode::DeformingModelSpace | EvaluationMode::DeformingParentSpace
        )
    }

    /// Parents come from this pass's finished bones
    #[inline]
    pub const fn reads_parent_cache(self) -> bool {
        matches!(
            self,
            EvaluationMode::DeformingParentSpace | EvaluationMode::RigidParentSpace
        )
    }

    /// The calibrated adjustment is only meaningful for model-space input
    #[inline]
    pub const fn applies_adjustment(self) -> bool {
        !self.reads_parent_cache()
    }

    /// Deforming model-space bones never read each other back, so they can
    /// be committed in one batch.
    #[inline]
    pub const fn commit_strategy(self) -> CommitStrategy {
        match self {
            EvaluationMode::DeformingModelSpace => CommitStrategy::Batched,
            _ => CommitStrategy::PerBone,
        }
    }
}

/// Everything the evaluator needs besides the mapping, resolved from a
/// policy ahead of time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationPlan {
    pub mode: EvaluationMode,
    pub mirror_hand: bool,
    pub only_wrist: bool,
    /// Per-bone correction, already mirrored when `mirror_hand` is set
    pub addition: BoneTransform,
    pub root_addition: BoneTransform,
}

impl Default for EvaluationPlan {
    fn default() -> Self {
        Self::new(&EvaluationPolicy::default(), false)
    }
}

impl EvaluationPlan {
    pub fn new(policy: &EvaluationPolicy, only_wrist: bool) -> Self {
        let addition = if policy.mirror_hand {
            policy.addition_transform.mirror(Axis::X, Axis::Y)
        } else {
            policy.addition_transform
        };

        Self {
            mode: EvaluationMode::from_policy(policy),
            mirror_hand: policy.mirror_hand,
            only_wrist,
            addition,
            root_addition: policy.root_addition_transform,
        }
    }
}

/// Source transform for `bone`, with fused joints pre-composed.
fn source_transform(mapping: &MappingTable, frame: &SourceFrame, bone: BoneId) -> Option<BoneTransform> {
    let own = *frame.bone(bone)?;

    if !mapping.merge_root_and_wrist {
        return Some(own);
    }

    if bone == BoneId::Root || bone == BoneId::Wrist {
        // Root and wrist both take the fused pair, root applied first
        return match (frame.bone(BoneId::Root), frame.bone(BoneId::Wrist)) {
            (Some(root), Some(wrist)) => Some(*wrist * *root),
            _ => Some(own),
        };
    }

    if bone.is_proximal() {
        // The rig has no metacarpal: apply it ahead of the proximal joint
        let metacarpal = frame.get(bone.index() - 1).copied()?;
        return Some(metacarpal * own);
    }

    Some(own)
}

/// Emit the pose's current transform for every mapped bone, writing nothing
fn pass_through<P: PoseBuffer + ?Sized>(mapping: &MappingTable, pose: &P) -> BonePairs {
    mapping
        .entries
        .iter()
        .filter_map(|entry| entry.target_index)
        .filter(|&target| target < pose.bone_count())
        .map(|target| (target, pose.component_transform(target)))
        .collect()
}

/// Retarget one frame of tracking data onto `pose`.
///
/// # Arguments
/// * `mapping` - Resolved mapping; nothing happens unless it is initialized
/// * `plan` - Evaluation mode and corrections
/// * `frame` - This tick's source transforms; empty means "no data"
/// * `pose` - Component-space pose, blended into in place
/// * `alpha` - Blend weight, clamped to [0, 1]
///
/// Returns the corrected transform of every bone that was processed, in
/// mapping order.
pub fn evaluate<P: PoseBuffer + ?Sized>(
    mapping: &MappingTable,
    plan: &EvaluationPlan,
    frame: &SourceFrame,
    pose: &mut P,
    alpha: f32,
) -> BonePairs {
    if !mapping.is_initialized() {
        return BonePairs::new();
    }

    if frame.is_empty() {
        return pass_through(mapping, pose);
    }

    let alpha = alpha.clamp(0.0, 1.0);
    let mode = plan.mode;
    let bone_count = pose.bone_count();

    let mut parents = if mode.reads_parent_cache() {
        ParentCache::with_bone_count(bone_count)
    } else {
        ParentCache::default()
    };
    let mut output = BonePairs::with_capacity(mapping.entries.len());
    let mut batch = BonePairs::new();

    for entry in &mapping.entries {
        let bone = entry.catalog_bone;

        let Some(target) = entry.target_index else {
            continue;
        };
        if bone.index() >= frame.len() || target >= bone_count {
            log::trace!("Skipping {:?} (target {})", bone, target);
            continue;
        }

        let mut t = pose.component_transform(target);

        let parent = match (mode.reads_parent_cache(), entry.parent_index) {
            (true, Some(parent_index)) => parents
                .get(parent_index)
                .copied()
                .unwrap_or_else(|| pose.component_transform(parent_index))
                .with_unit_scale(),
            _ => BoneTransform::IDENTITY,
        };

        let Some(mut source) = source_transform(mapping, frame, bone) else {
            continue;
        };
        if plan.mirror_hand {
            source = source.mirror(Axis::X, Axis::Z);
        }

        let temp = parent * source;
        t.rotation = temp.rotation;
        if mode.writes_translation() {
            t.translation = temp.translation;
        }

        if mode.reads_parent_cache() {
            parents.insert(target, t);
        }

        let addition = if mapping.is_root_like(bone) {
            &plan.root_addition
        } else {
            &plan.addition
        };
        let adjust = bone == BoneId::Wrist && mode.applies_adjustment();

        if mode.writes_translation() {
            t = t * *addition;
            if adjust {
                t.translation = mapping.adjustment * t.translation;
                t.rotation = (mapping.adjustment * t.rotation).normalize();
            }
        } else {
            t.concatenate_rotation(addition.rotation);
            if adjust {
                t.rotation = (mapping.adjustment * t.rotation).normalize();
            }
        }

        output.push((target, t));

        match mode.commit_strategy() {
            CommitStrategy::PerBone => pose.blend_write(target, &t, alpha),
            CommitStrategy::Batched => batch.push((target, t)),
        }

        if plan.only_wrist && bone == BoneId::Wrist {
            break;
        }
    }

    if !batch.is_empty() {
        pose.blend_many(&batch, alpha);
    }

    output
}
