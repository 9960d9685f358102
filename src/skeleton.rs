//! Target skeleton description and the query surface used while building
//! mappings and calibrating.
//!
//! Bones are stored flat and topologically sorted: every bone's parent index
//! is smaller than its own index, so bind-pose component transforms are
//! composed in a single forward pass.

use crate::error::{Error, Result};
use crate::math::{BoneTransform, EulerAngles, Vec3};
use serde::{Deserialize, Serialize};

/// Read-only queries against a bound skeleton asset
pub trait SkeletonQuery {
    /// Identity of the asset, used to detect when a mapping is stale
    fn asset_id(&self) -> &str;

    fn bone_count(&self) -> usize;

    /// Index of the bone called `name`, if the skeleton has one
    fn resolve_bone_index(&self, name: &str) -> Option<usize>;

    /// Parent of `index`; `None` for the root or an out-of-range index
    fn parent_index(&self, index: usize) -> Option<usize>;

    /// Bind-pose transform of `index` relative to the skeleton root
    fn bind_pose_component_transform(&self, index: usize) -> Option<BoneTransform>;
}

/// One bone of a reference skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone {
    pub name: String,
    pub parent: Option<usize>,
    /// Bind-pose transform in parent space
    pub local: BoneTransform,
}

/// A bone as authored in JSON (Euler degrees, parent by name)
#[derive(Debug, Clone, Deserialize, Serialize)]
struct SkeletonBoneJson {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    translation: [f32; 3],
    #[serde(default)]
    rotation: EulerAngles,
    #[serde(default = "unit_scale")]
    scale: [f32; 3],
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ReferenceSkeletonJson {
    asset_id: String,
    bones: Vec<SkeletonBoneJson>,
}

/// Flat, topologically ordered skeleton with cached bind-pose component
/// transforms.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSkeleton {
    asset_id: String,
    bones: Vec<SkeletonBone>,
    component_bind_pose: Vec<BoneTransform>,
}

impl ReferenceSkeleton {
    /// Build a skeleton, rejecting parents that do not precede their child
    pub fn new(asset_id: impl Into<String>, bones: Vec<SkeletonBone>) -> Result<Self> {
        let asset_id = asset_id.into();

        for (i, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= i {
                    return Err(Error::InvalidSkeleton(format!(
                        "bone {} ({}) has parent {} which does not precede it",
                        i, bone.name, parent
                    )));
                }
            }
        }

        let mut component_bind_pose: Vec<BoneTransform> = Vec::with_capacity(bones.len());
        for bone in &bones {
            let component = match bone.parent {
                Some(parent) => component_bind_pose[parent] * bone.local,
                None => bone.local,
            };
            component_bind_pose.push(component);
        }

        Ok(Self {
            asset_id,
            bones,
            component_bind_pose,
        })
    }

    /// Parse a skeleton description.
    ///
    /// ```json
    /// { "asset_id": "hand_rig",
    ///   "bones": [ { "name": "hand_r" },
    ///              { "name": "index_01_r", "parent": "hand_r",
    ///                "translation": [0.09, 0.02, 0.0], "rotation": { "z": 10 } } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: ReferenceSkeletonJson = serde_json::from_str(json)?;

        let mut bones: Vec<SkeletonBone> = Vec::with_capacity(parsed.bones.len());
        for raw in parsed.bones {
            let parent = match &raw.parent {
                Some(parent_name) => Some(
                    bones
                        .iter()
                        .position(|b| &b.name == parent_name)
                        .ok_or_else(|| {
                            Error::InvalidSkeleton(format!(
                                "bone {} references unknown or later parent {}",
                                raw.name, parent_name
                            ))
                        })?,
                ),
                None => None,
            };

            bones.push(SkeletonBone {
                name: raw.name,
                parent,
                local: BoneTransform::new(
                    Vec3::from_array(raw.translation),
                    raw.rotation.to_quat(),
                    Vec3::from_array(raw.scale),
                ),
            });
        }

        Self::new(parsed.asset_id, bones)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let json = ReferenceSkeletonJson {
            asset_id: self.asset_id.clone(),
            bones: self
                .bones
                .iter()
                .map(|bone| SkeletonBoneJson {
                    name: bone.name.clone(),
                    parent: bone.parent.map(|p| self.bones[p].name.clone()),
                    translation: bone.local.translation.to_array(),
                    rotation: EulerAngles::from_quat(bone.local.rotation),
                    scale: bone.local.scale.to_array(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&json)?)
    }

    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    pub fn bone_name(&self, index: usize) -> Option<&str> {
        self.bones.get(index).map(|b| b.name.as_str())
    }

    /// Bind pose of every bone, in component space
    pub fn component_bind_pose(&self) -> &[BoneTransform] {
        &self.component_bind_pose
    }
}

impl SkeletonQuery for ReferenceSkeleton {
    fn asset_id(&self) -> &str {
        &self.asset_id
    }

    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn resolve_bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    fn parent_index(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|b| b.parent)
    }

    fn bind_pose_component_transform(&self, index: usize) -> Option<BoneTransform> {
        self.component_bind_pose.get(index).copied()
    }
}
