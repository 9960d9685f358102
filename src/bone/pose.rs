use crate::math::{BoneTransform, PackedBoneTransform};
use crate::skeleton::ReferenceSkeleton;

/// Component-space pose storage the evaluator reads from and blends into.
///
/// Implementations own their storage; the evaluator holds `&mut` for the
/// whole pass so no other writer can interleave.
pub trait PoseBuffer {
    fn bone_count(&self) -> usize;

    /// Current component-space transform of `index`.
    /// Out-of-range indices read as identity.
    fn component_transform(&self, index: usize) -> BoneTransform;

    /// Blend `transform` over the stored value by `weight` (clamped to [0, 1])
    fn blend_write(&mut self, index: usize, transform: &BoneTransform, weight: f32);

    /// Commit a batch of finished bones with one weight
    fn blend_many(&mut self, transforms: &[(usize, BoneTransform)], weight: f32) {
        for (index, transform) in transforms {
            self.blend_write(*index, transform, weight);
        }
    }
}

/// Vec-backed component-space pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentPose {
    transforms: Vec<BoneTransform>,
}

impl ComponentPose {
    pub fn from_transforms(transforms: Vec<BoneTransform>) -> Self {
        Self { transforms }
    }

    /// Pose initialised to the skeleton's bind pose
    pub fn from_skeleton(skeleton: &ReferenceSkeleton) -> Self {
        Self {
            transforms: skeleton.component_bind_pose().to_vec(),
        }
    }

    pub fn transforms(&self) -> &[BoneTransform] {
        &self.transforms
    }

    /// Reset every bone to the given skeleton's bind pose
    pub fn reset_to(&mut self, skeleton: &ReferenceSkeleton) {
        self.transforms.clear();
        self.transforms
            .extend_from_slice(skeleton.component_bind_pose());
    }

    /// Flat copy for JS/GPU consumers
    pub fn to_packed(&self) -> Vec<PackedBoneTransform> {
        self.transforms.iter().map(PackedBoneTransform::from).collect()
    }
}

impl PoseBuffer for ComponentPose {
    fn bone_count(&self) -> usize {
        self.transforms.len()
    }

    fn component_transform(&self, index: usize) -> BoneTransform {
        self.transforms
            .get(index)
            .copied()
            .unwrap_or(BoneTransform::IDENTITY)
    }

    fn blend_write(&mut self, index: usize, transform: &BoneTransform, weight: f32) {
        let weight = weight.clamp(0.0, 1.0);
        if weight.is_nan() || weight <= 0.0 {
            return;
        }
        if let Some(slot) = self.transforms.get_mut(index) {
            *slot = BoneTransform::blend(slot, transform, weight);
        }
    }
}
